use std::io;

use thiserror::Error;

/// Failure surface shared by every storage adapter.
///
/// Adapters never retry internally; they classify the failure and hand it up.
/// `Network` is the only retryable variant. `NotFound` means the remote
/// dataset has not been created yet and is treated as empty state by callers,
/// not as a fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("dataset not found")]
    NotFound,
    #[error("invalid dataset payload: {0}")]
    Validation(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Network(_))
    }

    pub(crate) fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound,
            io::ErrorKind::PermissionDenied => StorageError::Auth(err.to_string()),
            _ => StorageError::Network(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Network(err.to_string())
    }
}

/// Clip an error message for operator-facing display.
pub(crate) fn truncate_message(message: &str, limit: usize) -> String {
    if message.len() <= limit {
        return message.to_string();
    }
    let mut cut = limit;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &message[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_dataset_missing() {
        let err = StorageError::from_io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err, StorageError::NotFound);
    }

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(StorageError::Network("timeout".into()).is_retryable());
        assert!(!StorageError::Auth("bad key".into()).is_retryable());
        assert!(!StorageError::NotFound.is_retryable());
        assert!(!StorageError::Validation("truncated".into()).is_retryable());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let msg = "aaaé".repeat(100);
        let clipped = truncate_message(&msg, 10);
        assert!(clipped.chars().count() <= 11);
        assert!(clipped.ends_with('…'));
        assert_eq!(truncate_message("short", 200), "short");
    }
}
