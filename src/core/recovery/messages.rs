//! User-facing explanations for classified errors.

use crate::error::{Classify, ErrorClass};
use serde::{Deserialize, Serialize};

/// A message a non-technical user can act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    /// Failure class the message was built from
    pub class: ErrorClass,
    /// Short headline
    pub title: String,
    /// What happened, in plain words
    pub message: String,
    /// What to try next
    pub suggestion: Option<String>,
    /// Underlying error text, for "show details"
    pub detail: Option<String>,
}

impl UserMessage {
    /// Build the message for a failure class
    pub fn for_class(class: ErrorClass) -> Self {
        let (title, message, suggestion) = match class {
            ErrorClass::Memory => (
                "Not enough memory",
                "This image is too large to process with the memory currently available.",
                Some("Try fewer files at once, or resize very large images first."),
            ),
            ErrorClass::Compatibility => (
                "Format not supported",
                "The selected output format cannot be produced on this device.",
                Some("Choose JPEG or PNG, which are always available."),
            ),
            ErrorClass::Corruption => (
                "File could not be read",
                "This file does not look like a valid image.",
                Some("The file may be corrupted. Try a different source."),
            ),
            ErrorClass::Network => (
                "Connection problem",
                "The file could not be fetched after several attempts.",
                Some("Check your connection and try again."),
            ),
            ErrorClass::Timeout => (
                "Processing took too long",
                "The image did not finish processing in time.",
                Some("Try a smaller image or fewer files at once."),
            ),
            ErrorClass::Generic => (
                "Something went wrong",
                "The image could not be processed.",
                Some("Try again. If it keeps failing, try a different file."),
            ),
        };

        Self {
            class,
            title: title.to_string(),
            message: message.to_string(),
            suggestion: suggestion.map(str::to_string),
            detail: None,
        }
    }

    /// Build the message for a concrete error, keeping its text as detail
    pub fn for_error<E>(error: &E) -> Self
    where
        E: Classify + std::fmt::Display,
    {
        let mut message = Self::for_class(error.class());
        message.detail = Some(error.to_string());
        message
    }
}

impl std::fmt::Display for UserMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " {}", suggestion)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;

    #[test]
    fn every_class_has_a_suggestion() {
        for class in [
            ErrorClass::Memory,
            ErrorClass::Compatibility,
            ErrorClass::Corruption,
            ErrorClass::Network,
            ErrorClass::Timeout,
            ErrorClass::Generic,
        ] {
            let message = UserMessage::for_class(class);
            assert!(message.suggestion.is_some(), "{class} has no suggestion");
            assert!(!message.message.is_empty());
        }
    }

    #[test]
    fn raw_error_text_is_detail_not_message() {
        let error = ConversionError::Corrupt {
            name: "scan.png".to_string(),
            reason: "CRC mismatch in IDAT".to_string(),
        };

        let message = UserMessage::for_error(&error);

        assert!(!message.message.contains("CRC"));
        assert!(message.detail.unwrap().contains("CRC mismatch"));
        assert!(message.suggestion.unwrap().contains("corrupted"));
    }

    #[test]
    fn memory_message_suggests_fewer_files() {
        let message = UserMessage::for_class(ErrorClass::Memory);
        assert!(message.to_string().contains("fewer files"));
    }
}
