use std::net::SocketAddr;

use camfleet_common::deployment::{LifecycleStep, TransitionError};
use camfleet_protocols::digest::DigestError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{address} is unreachable: {detail}")]
    Unreachable { address: SocketAddr, detail: String },

    #[error("exchange with {address} failed: {detail}")]
    Transport { address: SocketAddr, detail: String },

    #[error("{address} answered 401 without a digest challenge")]
    AuthChallengeMissing { address: SocketAddr },

    #[error("{address} offered an unusable challenge: {source}")]
    AuthChallengeUnsupported {
        address: SocketAddr,
        source: DigestError,
    },

    #[error("{address} rejected the credentials")]
    AuthRejected { address: SocketAddr },

    #[error("{step} failed: {source}")]
    LifecycleStepFailed {
        step: LifecycleStep,
        source: Box<Error>,
    },

    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("{operation} returned HTTP {status}")]
    UnexpectedStatus { operation: String, status: u16 },

    #[error("invalid response to {operation}: {detail}")]
    InvalidResponse { operation: String, detail: String },

    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn at_step(self, step: LifecycleStep) -> Self {
        match self {
            already @ Error::LifecycleStepFailed { .. } => already,
            other => Error::LifecycleStepFailed {
                step,
                source: Box::new(other),
            },
        }
    }

    /// The lifecycle sub-step this error is attributed to, if any.
    pub fn step(&self) -> Option<LifecycleStep> {
        match self {
            Error::LifecycleStepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::LifecycleStepFailed { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Failures that look the same as a host that is not there.
    pub fn is_silence(&self) -> bool {
        matches!(self, Error::Unreachable { .. } | Error::Timeout { .. })
    }

    pub fn is_auth(&self) -> bool {
        match self {
            Error::AuthChallengeMissing { .. }
            | Error::AuthChallengeUnsupported { .. }
            | Error::AuthRejected { .. } => true,
            Error::LifecycleStepFailed { source, .. } => source.is_auth(),
            _ => false,
        }
    }
}
