use crate::models::validation::{Rule, ValidationResult};
use crate::probe::ProbeError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures reported by the reconciliation core. None of them leave state
/// behind: the next call starts from scratch.
#[derive(Debug, Error)]
pub enum AirlockError {
    #[error("bucket name `{name}` is invalid: {}", describe_rules(.result))]
    InvalidBucketName {
        name: String,
        result: ValidationResult,
    },

    #[error("object key `{key}` for {} {}", .path.display(), describe_collision(.previous.as_deref()))]
    DuplicateObjectKey {
        key: String,
        path: PathBuf,
        /// The other selected file mapping to `key`, or `None` when the key
        /// collides with an object already in the caller's selection.
        previous: Option<PathBuf>,
    },

    #[error("could not determine which objects already exist in bucket `{bucket}`")]
    ProbeUnavailable {
        bucket: String,
        #[source]
        source: ProbeError,
    },

    #[error("unusable file {}: {reason}", .path.display())]
    MalformedFileDescriptor { path: PathBuf, reason: String },

    #[error("naming policy is invalid: {0}")]
    InvalidPolicy(String),
}

pub type AirlockResult<T> = Result<T, AirlockError>;

impl AirlockError {
    pub(crate) fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        AirlockError::MalformedFileDescriptor {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

fn describe_rules(result: &ValidationResult) -> String {
    let failing = result.failing_rules();
    if failing.is_empty() {
        return "validation has not completed".into();
    }
    failing
        .into_iter()
        .map(Rule::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_collision(previous: Option<&Path>) -> String {
    match previous {
        Some(other) => format!("is also derived from {}", other.display()),
        None => "is already part of the current selection".into(),
    }
}
