// src/error.rs
use thiserror::Error;

/// Failure reported by the tag transport itself (reader gone, frame rejected, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportFault(pub String);

impl From<pcsc::Error> for TransportFault {
    fn from(err: pcsc::Error) -> Self {
        TransportFault(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("text record cannot be encoded: {0}")]
    Encoding(String),
    #[error("authentication rejected for sector {sector} (block {block})")]
    Authentication { sector: u16, block: u16 },
    #[error("payload needs {needed} bytes but the layout only holds {available}")]
    Capacity { needed: usize, available: usize },
    #[error("transport failed at unit {unit}: {reason}")]
    Transport { unit: u16, reason: String },
    #[error("tag did not acknowledge write of unit {unit}")]
    Write { unit: u16 },
    #[error("no tag present on the reader")]
    NoTag,
}

impl TagError {
    /// The unit a failure is pinned to, when there is one.
    pub fn unit(&self) -> Option<u16> {
        match self {
            TagError::Authentication { block, .. } => Some(*block),
            TagError::Transport { unit, .. } | TagError::Write { unit } => Some(*unit),
            _ => None,
        }
    }

    pub(crate) fn transport(unit: u16, fault: TransportFault) -> Self {
        TagError::Transport {
            unit,
            reason: fault.0,
        }
    }
}

/// Structural damage inside an NDEF message. Foreign record types are not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NdefError {
    #[error("record truncated while reading {0}")]
    Truncated(&'static str),
    #[error("chunked records are not supported")]
    Chunked,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var,
            reason: reason.into(),
        }
    }
}
