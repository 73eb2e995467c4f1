//! Input validation shared by the storage and CLI layers.

use thiserror::Error;

/// Minimum document content length, in characters.
pub const MIN_CONTENT_CHARS: usize = 10;

/// Valid task priority range (1 = highest).
pub const PRIORITY_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

/// A caller-supplied value violated an input policy.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("content must be at least {MIN_CONTENT_CHARS} characters (got {0})")]
    ContentTooShort(usize),

    #[error("priority must be between 1 and 5 (got {0})")]
    PriorityOutOfRange(i32),

    #[error("epic key must not be empty")]
    EmptyEpicKey,
}

/// Validates and trims a document or task title.
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(trimmed.to_owned())
}

/// Validates document content against the minimum-length policy.
pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    let len = content.chars().count();
    if len < MIN_CONTENT_CHARS {
        return Err(ValidationError::ContentTooShort(len));
    }
    Ok(())
}

/// Validates a task priority.
pub fn validate_priority(priority: i32) -> Result<(), ValidationError> {
    if !PRIORITY_RANGE.contains(&priority) {
        return Err(ValidationError::PriorityOutOfRange(priority));
    }
    Ok(())
}

/// Validates an epic key.
pub fn validate_epic_key(key: &str) -> Result<String, ValidationError> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyEpicKey);
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_trimmed() {
        assert_eq!(validate_title("  Async Patterns  ").unwrap(), "Async Patterns");
    }

    #[test]
    fn empty_title_rejected() {
        assert!(matches!(
            validate_title("   "),
            Err(ValidationError::EmptyTitle)
        ));
    }

    #[test]
    fn short_content_rejected() {
        assert!(matches!(
            validate_content("too short"),
            Err(ValidationError::ContentTooShort(9))
        ));
        assert!(validate_content("just long enough").is_ok());
    }

    #[test]
    fn content_length_counts_chars_not_bytes() {
        // Ten multi-byte characters pass the ten-character policy.
        assert!(validate_content("éééééééééé").is_ok());
    }

    #[test]
    fn priority_bounds() {
        assert!(validate_priority(1).is_ok());
        assert!(validate_priority(5).is_ok());
        assert!(validate_priority(0).is_err());
        assert!(validate_priority(6).is_err());
    }
}
