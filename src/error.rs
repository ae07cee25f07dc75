//! Error types for channel setup and teardown.
//!
//! Only channel lifecycle conditions surface as errors: a duplicate creator,
//! an attach before the creator has published, or a raw OS failure. All
//! match-time conditions (budget overruns, timeout, cancellation, crashes)
//! resolve into the final [`Verdict`](crate::verdict::Verdict) instead.

use std::fmt;

/// Errors raised while creating, attaching, or validating a shared channel.
#[derive(Debug)]
pub enum ChannelError {
    /// A region with this name is already live; at most one creator per name.
    AlreadyExists(String),
    /// No creator has published a region with this name yet.
    NotFound(String),
    /// The region exists but its header does not carry the expected magic
    /// and layout version.
    Incompatible {
        /// Region name as given to `attach`.
        name: String,
        /// Layout version found in the header (0 if the magic was wrong).
        found: u32,
    },
    /// The region name cannot be used as a shared-memory object name.
    InvalidName(String),
    /// An underlying OS call failed.
    Os {
        /// The syscall or operation that failed.
        op: &'static str,
        /// The OS-level error.
        source: std::io::Error,
    },
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists(name) => {
                write!(f, "channel region already exists: {name}")
            }
            Self::NotFound(name) => write!(f, "channel region not found: {name}"),
            Self::Incompatible { name, found } => {
                write!(f, "channel region {name} has incompatible layout (version {found})")
            }
            Self::InvalidName(name) => write!(f, "invalid channel name: {name:?}"),
            Self::Os { op, source } => write!(f, "channel {op} failed: {source}"),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Os { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for channel lifecycle operations.
pub type ChannelResult<T> = Result<T, ChannelError>;
