// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Ambia prediction pipeline.

use thiserror::Error;

/// Maximum length of an error message persisted on a job row.
pub const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// The primary error type used across all Ambia adapter traits and pipeline stages.
#[derive(Debug, Error)]
pub enum AmbiaError {
    /// Configuration errors (invalid TOML, missing required fields, bad thresholds).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, row decoding).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transient failure of the generation function (network, rate limit, 5xx).
    #[error("generation error: {message}")]
    Generation {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The generation function returned a document outside the component schema.
    #[error("schema validation error: {0}")]
    SchemaValidation(String),

    /// A job that can never succeed (user deleted, malformed job row).
    #[error("permanent job error for {job_id}: {reason}")]
    PermanentJob { job_id: String, reason: String },

    /// The black-box pattern model failed or answered with garbage.
    #[error("reasoner error: {message}")]
    Reasoner {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// An on-demand generation failed; the caller gets no stale or partial data.
    #[error("generation failed for cache key {cache_key}: {reason}")]
    GenerationFailed { cache_key: String, reason: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AmbiaError {
    /// Wraps any error as a storage error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AmbiaError::Storage {
            source: Box::new(err),
        }
    }

    /// Whether a job failing with this error should be re-queued (subject to the attempt cap).
    ///
    /// Transient generation failures, timeouts and schema violations are retryable
    /// because a re-prompt may succeed. Permanent job errors are not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AmbiaError::PermanentJob { .. } | AmbiaError::Config(_))
    }

    /// Renders the error for persistence, truncated to [`MAX_ERROR_MESSAGE_LEN`] characters.
    pub fn truncated_message(&self) -> String {
        truncate_message(&self.to_string(), MAX_ERROR_MESSAGE_LEN)
    }
}

/// Truncates `message` to at most `max_chars` characters on a char boundary.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_errors_are_not_retryable() {
        let err = AmbiaError::PermanentJob {
            job_id: "job-1".into(),
            reason: "user deleted".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_and_schema_errors_are_retryable() {
        let timeout = AmbiaError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let schema = AmbiaError::SchemaValidation("unknown component kind `map`".into());
        let network = AmbiaError::Generation {
            message: "connection reset".into(),
            source: None,
        };
        assert!(timeout.is_retryable());
        assert!(schema.is_retryable());
        assert!(network.is_retryable());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(600);
        let truncated = truncate_message(&long, MAX_ERROR_MESSAGE_LEN);
        assert_eq!(truncated.chars().count(), MAX_ERROR_MESSAGE_LEN);

        assert_eq!(truncate_message("short", 10), "short");
    }

    #[test]
    fn truncated_message_includes_variant_prefix() {
        let err = AmbiaError::SchemaValidation("x".repeat(1000));
        let msg = err.truncated_message();
        assert!(msg.starts_with("schema validation error: "));
        assert_eq!(msg.chars().count(), MAX_ERROR_MESSAGE_LEN);
    }
}
