pub mod error;
pub mod memory;
pub mod preferences;
pub mod response;
pub mod sqlite;
pub mod store;

pub use error::CacheError;
pub use memory::MemoryStore;
pub use preferences::PreferenceStore;
pub use response::ResponseCache;
pub use sqlite::SqliteStore;
pub use store::KeyValueStore;
