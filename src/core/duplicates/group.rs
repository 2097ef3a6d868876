//! Duplicate groups and representative selection.

use super::identifier::Identifier;
use super::settings::KeepPolicy;
use crate::core::source::SourceFile;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Two or more files judged equivalent.
///
/// Membership changes go through [`add_file`](Self::add_file) and
/// [`remove_file`](Self::remove_file) so the representative always reflects
/// the keep policy and a group never shrinks below two files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: Uuid,
    files: Vec<SourceFile>,
    /// Identifier of the seed file
    pub identifier: Identifier,
    keep_policy: KeepPolicy,
    /// Index into `files`
    representative: usize,
}

impl DuplicateGroup {
    /// Build a group; `None` for fewer than two files
    pub fn new(files: Vec<SourceFile>, identifier: Identifier, keep_policy: KeepPolicy) -> Option<Self> {
        if files.len() < 2 {
            return None;
        }
        let mut group = Self {
            id: Uuid::new_v4(),
            files,
            identifier,
            keep_policy,
            representative: 0,
        };
        group.recompute_representative();
        Some(group)
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Always equal to `files().len()`
    pub fn size(&self) -> usize {
        self.files.len()
    }

    pub fn keep_policy(&self) -> KeepPolicy {
        self.keep_policy
    }

    /// The file to keep
    pub fn representative(&self) -> &SourceFile {
        &self.files[self.representative]
    }

    /// Every member except the representative
    pub fn duplicates(&self) -> impl Iterator<Item = &SourceFile> {
        let keep = self.representative;
        self.files
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != keep)
            .map(|(_, f)| f)
    }

    /// Bytes freed by deleting every non-representative member
    pub fn potential_savings(&self) -> u64 {
        self.duplicates().map(|f| f.byte_size).sum()
    }

    pub fn add_file(&mut self, file: SourceFile) {
        self.files.push(file);
        self.recompute_representative();
    }

    /// Remove a member by id.
    ///
    /// Refused (returns `None`) when the file is absent or the group would be
    /// left with a single file; dissolve the group with
    /// [`into_files`](Self::into_files) instead.
    pub fn remove_file(&mut self, file_id: &str) -> Option<SourceFile> {
        if self.files.len() <= 2 {
            return None;
        }
        let index = self.files.iter().position(|f| f.id == file_id)?;
        let removed = self.files.remove(index);
        self.recompute_representative();
        Some(removed)
    }

    pub fn into_files(self) -> Vec<SourceFile> {
        self.files
    }

    /// Re-select the representative according to the keep policy.
    ///
    /// Ties go to the earliest member. `Manual` keeps the first file as a
    /// placeholder since nothing is removed automatically.
    pub fn recompute_representative(&mut self) {
        let pick = |better: fn(&SourceFile, &SourceFile) -> bool| {
            let mut best = 0;
            for (i, file) in self.files.iter().enumerate().skip(1) {
                if better(file, &self.files[best]) {
                    best = i;
                }
            }
            best
        };

        self.representative = match self.keep_policy {
            KeepPolicy::First | KeepPolicy::Manual => 0,
            KeepPolicy::Largest => pick(|a, b| a.byte_size > b.byte_size),
            KeepPolicy::Smallest => pick(|a, b| a.byte_size < b.byte_size),
            KeepPolicy::Newest => pick(|a, b| a.last_modified > b.last_modified),
        };
    }
}
