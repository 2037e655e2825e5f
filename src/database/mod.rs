pub mod error;
pub mod memory;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{DataStore, IsolatedStore};
