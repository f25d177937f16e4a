//! Error taxonomy for the reduce engine.
//!
//! Every error here is fatal for the enclosing task: the engine never retries
//! and never skips a record. Protocol misuse (asking for the current key outside
//! a group, traversing a group twice) is *not* an error; those calls return
//! empty results instead.

use std::error::Error;
use std::fmt;

/// Reserved label used when a write does not name one.
pub const DEFAULT_LABEL: &str = "__default__";

/// Label carried by records framed for a chained downstream stage.
pub const INNER_OUTPUT_LABEL: &str = "__inner__";

/// Errors surfaced by a reduce session.
#[derive(Debug)]
pub enum ReduceError {
    /// Invalid task wiring detected while building a session.
    Config(String),
    /// An upstream tuple whose width does not match the key/value schema split.
    MalformedTuple { expected: usize, actual: usize },
    /// A row written under inner framing does not fit its slot.
    FramedPayloadTooWide { slot: usize, actual: usize },
    /// A write named a label that was not declared for the task.
    UnknownLabel(String),
    /// The partitioner returned an index outside `[0, total)`.
    InvalidPartition { partition: i64, total: u32 },
    /// A re-partitioned emit was attempted from a terminal stage.
    UnsupportedInPipelineTerminal,
    /// A column type with no wire representation.
    UnsupportedType(String),
    /// The upstream pull source failed.
    Source(anyhow::Error),
    /// The output sink rejected a record.
    Sink(anyhow::Error),
}

impl ReduceError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True for errors that can only be raised while wiring a session.
    #[must_use]
    pub fn is_fatal_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::UnsupportedType(_))
    }
}

impl fmt::Display for ReduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid reduce configuration: {msg}"),
            Self::MalformedTuple { expected, actual } => write!(
                f,
                "malformed input tuple: expected {expected} fields, got {actual}"
            ),
            Self::FramedPayloadTooWide { slot, actual } => write!(
                f,
                "framed output row has {actual} fields but its slot holds {slot}"
            ),
            Self::UnknownLabel(label) => write!(f, "no such output label: {label}"),
            Self::InvalidPartition { partition, total } => write!(
                f,
                "partitioner returned invalid partition value {partition} (total partitions: {total})"
            ),
            Self::UnsupportedInPipelineTerminal => write!(
                f,
                "key/value output is only allowed when the reducer feeds a further stage"
            ),
            Self::UnsupportedType(ty) => write!(f, "unsupported column type: {ty}"),
            Self::Source(e) => write!(f, "upstream source failed: {e}"),
            Self::Sink(e) => write!(f, "output sink failed: {e}"),
        }
    }
}

impl Error for ReduceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(e) | Self::Sink(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ReduceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type ReduceResult<T> = Result<T, ReduceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_value() {
        let e = ReduceError::InvalidPartition {
            partition: 5,
            total: 4,
        };
        assert!(e.to_string().contains("invalid partition value 5"));
        assert!(ReduceError::UnknownLabel("extra".into())
            .to_string()
            .ends_with("extra"));
    }

    #[test]
    fn only_wiring_errors_are_config_fatal() {
        assert!(ReduceError::config("x").is_fatal_config());
        assert!(ReduceError::UnsupportedType("STRUCT".into()).is_fatal_config());
        assert!(!ReduceError::UnsupportedInPipelineTerminal.is_fatal_config());
        assert!(!ReduceError::FramedPayloadTooWide { slot: 1, actual: 2 }.is_fatal_config());
    }

    #[test]
    fn collaborator_errors_keep_their_source() {
        let e = ReduceError::Sink(anyhow::anyhow!("disk full"));
        assert_eq!(e.source().map(ToString::to_string), Some("disk full".into()));
    }
}
