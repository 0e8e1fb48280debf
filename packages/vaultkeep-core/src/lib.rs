/// Vaultkeep core: section-preserving note synchronization and task analytics
/// for a PARA-organised markdown vault.
pub mod config;
pub mod sections;
pub mod storage;
pub mod sync;
pub mod tasks;
pub mod template;
pub mod types;
pub mod vault;

pub use config::{ParaLocation, VaultConfig};
pub use storage::{NoteStore, VaultError};
pub use sync::{SyncEngine, SyncOutcome, SyncRequest};
pub use vault::Vault;
