use thiserror::Error;

/// Errors surfaced by this crate.
///
/// Storage and remote failures never appear here: those tiers degrade to
/// "absent" internally and the synchronizer continues with whatever tier is
/// left. The only hard failures are contract violations by the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrefError {
    /// The setter was called with a value outside the preference's value set.
    #[error("{value:?} is not a valid value for preference {name:?}")]
    InvalidValue { name: String, value: String },

    /// A provider for this preference name is already running in this
    /// process. Two providers would race duplicate remote fetches against
    /// each other.
    #[error("a provider for preference {0:?} is already active")]
    AlreadyActive(String),
}
