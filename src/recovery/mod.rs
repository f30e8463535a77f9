/// Crash recovery
///
/// Autosave records capture the grid as structure plus source paths:
/// - Record format (record.rs)
/// - Grid <-> record conversion (serializer.rs)
/// - Atomic on-disk storage (store.rs)
/// - Save scheduling, retries and startup recovery (autosave.rs)

pub mod autosave;
pub mod record;
pub mod serializer;
pub mod store;

pub use autosave::{AutosaveTrigger, Autosaver, Recovery};
pub use record::{CellRecord, RecoveryRecord, RECORD_VERSION};
pub use serializer::{deserialize, serialize, serialize_snapshot};
pub use store::{FsRecoveryStore, RecoveryStore};
