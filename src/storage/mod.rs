mod database;
mod local_store;
mod memory;


pub use database::Database;
pub use local_store::LocalStore;
pub use memory::MemoryStore;
