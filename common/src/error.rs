use std::net::Ipv4Addr;
use std::path::PathBuf;

use thiserror::Error;

/// Raised while turning user input into a sweep target, before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("no target given")]
    Empty,

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid CIDR prefix /{0}")]
    InvalidPrefix(u8),

    #[error("range start {start} is after end {end}")]
    ReversedRange { start: Ipv4Addr, end: Ipv4Addr },

    #[error("target expands to {count} addresses, limit is {limit}")]
    TooLarge { count: usize, limit: usize },
}

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("cannot access inventory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("inventory {path} is not valid: {source}")]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
}
