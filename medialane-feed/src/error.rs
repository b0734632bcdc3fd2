use std::io::{self, ErrorKind};

use thiserror::Error;

/// Failure surfaced in a feed's view-state. Cloneable so every snapshot can
/// carry it; an empty filtered result is not an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Fetch failed; retried only by an explicit refresh or load-more.
    #[error("failed to load activity: {0}")]
    Network(String),
    /// The request itself was rejected, e.g. a malformed cursor.
    #[error("invalid feed request: {0}")]
    InvalidRequest(String),
}

impl From<io::Error> for FeedError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidInput => FeedError::InvalidRequest(e.to_string()),
            _ => FeedError::Network(e.to_string()),
        }
    }
}

#[test]
fn test_from_io_error() {
    let err = FeedError::from(io::Error::new(ErrorKind::Other, "connection reset"));
    assert_eq!(err, FeedError::Network("connection reset".to_owned()));
    assert_eq!(err.to_string(), "failed to load activity: connection reset");

    let err = FeedError::from(io::Error::new(ErrorKind::InvalidInput, "bad cursor"));
    assert!(matches!(err, FeedError::InvalidRequest(_)));
}
