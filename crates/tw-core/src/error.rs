use crate::entity::EntityId;
use crate::modifier::ModifierId;

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while building or restoring a world state.
///
/// Lookup misses during a tick are not errors: the world state answers them
/// with `None` or a zero delta. These variants cover malformed input only.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A resource with the same identifier is already registered.
    #[error("resource already exists: \"{0}\"")]
    DuplicateResource(String),

    /// A resource was declared with inconsistent bounds or replenishment.
    #[error("invalid resource \"{id}\": {reason}")]
    InvalidResource {
        /// The offending resource identifier.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A modifier window where `start_period >= end_period`.
    #[error("modifier \"{name}\" has an empty window: start {start} must be before end {end}")]
    InvalidWindow {
        /// The modifier's display name.
        name: String,
        /// Declared start period.
        start: i32,
        /// Declared (exclusive) end period.
        end: i32,
    },

    /// A modifier field is out of its allowed range.
    #[error("invalid modifier \"{name}\": {reason}")]
    InvalidModifier {
        /// The modifier's display name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A modifier with the same identifier is already stored.
    #[error("modifier already exists: {0}")]
    DuplicateModifier(ModifierId),

    /// An entity with the same identifier is already stored.
    #[error("entity already exists: {0}")]
    DuplicateEntity(EntityId),

    /// A behavior module identifier was registered twice.
    #[error("module already registered: \"{0}\"")]
    DuplicateModule(String),

    /// A frequency label that is not one of hourly/daily/weekly/monthly/yearly.
    #[error("unknown frequency: \"{0}\"")]
    UnknownFrequency(String),

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot encoding failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// A snapshot was written by an incompatible format version.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    SnapshotVersion {
        /// Version found in the snapshot.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },
}
