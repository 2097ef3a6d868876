//! Duplicate detection settings.

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What makes two files duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareBy {
    /// Cryptographic hash of the bytes, exact match
    Hash,
    /// Normalized file name, edit-distance similarity
    Name,
    /// Byte size, exact match
    Size,
    /// Perceptual hash, similarity against the threshold
    Content,
}

impl CompareBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareBy::Hash => "hash",
            CompareBy::Name => "name",
            CompareBy::Size => "size",
            CompareBy::Content => "content",
        }
    }

    /// Whether the threshold takes part in matching
    pub fn uses_threshold(&self) -> bool {
        matches!(self, CompareBy::Name | CompareBy::Content)
    }
}

impl std::fmt::Display for CompareBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareBy {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hash" => Ok(CompareBy::Hash),
            "name" => Ok(CompareBy::Name),
            "size" => Ok(CompareBy::Size),
            "content" => Ok(CompareBy::Content),
            _ => Err(SettingsError::UnknownValue {
                field: "compare_by",
                value: s.to_string(),
            }),
        }
    }
}

/// Which group member is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepPolicy {
    /// Earliest in submission order
    First,
    Largest,
    Smallest,
    /// Most recently modified
    Newest,
    /// The user decides; nothing is marked for removal
    Manual,
}

impl FromStr for KeepPolicy {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(KeepPolicy::First),
            "largest" => Ok(KeepPolicy::Largest),
            "smallest" => Ok(KeepPolicy::Smallest),
            "newest" => Ok(KeepPolicy::Newest),
            "manual" => Ok(KeepPolicy::Manual),
            _ => Err(SettingsError::UnknownValue {
                field: "keep_policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Settings for one detection run.
///
/// Invalid settings are rejected by [`validate`](Self::validate); the only
/// way to get defaults is [`apply_default_settings`](Self::apply_default_settings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSettings {
    /// When false every file is reported unique
    pub enabled: bool,
    pub compare_by: CompareBy,
    /// Minimum similarity (0-1) for `name` and `content`
    pub threshold: f64,
    /// Mark non-representatives for removal
    pub auto_remove: bool,
    pub keep_policy: KeepPolicy,
}

impl DuplicateSettings {
    pub fn new(compare_by: CompareBy) -> Self {
        Self {
            compare_by,
            ..Self::apply_default_settings()
        }
    }

    /// Enabled, hash comparison, threshold 0.9, no auto-remove, keep first
    pub fn apply_default_settings() -> Self {
        Self {
            enabled: true,
            compare_by: CompareBy::Hash,
            threshold: 0.9,
            auto_remove: false,
            keep_policy: KeepPolicy::First,
        }
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn keep_policy(mut self, keep_policy: KeepPolicy) -> Self {
        self.keep_policy = keep_policy;
        self
    }

    pub fn auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(SettingsError::InvalidThreshold {
                value: self.threshold,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = DuplicateSettings::apply_default_settings();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.compare_by, CompareBy::Hash);
        assert_eq!(settings.keep_policy, KeepPolicy::First);
        assert_eq!(settings.threshold, 0.9);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        for value in [-0.1, 1.01, f64::NAN] {
            let settings = DuplicateSettings::new(CompareBy::Name).threshold(value);
            assert!(matches!(
                settings.validate(),
                Err(SettingsError::InvalidThreshold { .. })
            ));
        }
        assert!(DuplicateSettings::new(CompareBy::Name).threshold(0.0).validate().is_ok());
        assert!(DuplicateSettings::new(CompareBy::Name).threshold(1.0).validate().is_ok());
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("Content".parse::<CompareBy>().unwrap(), CompareBy::Content);
        assert_eq!("newest".parse::<KeepPolicy>().unwrap(), KeepPolicy::Newest);
        assert!("pixels".parse::<CompareBy>().is_err());
    }

    #[test]
    fn settings_serialize_lowercase() {
        let json = serde_json::to_string(&DuplicateSettings::new(CompareBy::Size)).unwrap();
        assert!(json.contains("\"compare_by\":\"size\""));
        assert!(json.contains("\"keep_policy\":\"first\""));
    }
}
