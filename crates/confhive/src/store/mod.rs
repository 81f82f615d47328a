//! File-backed native store.
//!
//! One TOML document per configuration level. The store offers per-file
//! leases and whole-file replacement, nothing more; transactional behavior
//! is layered on top in the transaction module.

mod document;
mod error;
mod local;
mod traits;

pub use document::{LevelDocument, check_representable};
pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
pub use traits::{ConfigStore, WriteLease};

/// Level file name inside every site or application directory.
pub const LEVEL_FILE_NAME: &str = "web.toml";

/// Level file of the global (web-server) level.
pub const HOST_FILE: &str = "host.toml";

/// Load a level document, treating a missing file as empty.
pub async fn load_document(store: &dyn ConfigStore, file: &str) -> StoreResult<LevelDocument> {
    match store.read(file).await? {
        Some(content) => LevelDocument::parse(file, &content),
        None => Ok(LevelDocument::default()),
    }
}
