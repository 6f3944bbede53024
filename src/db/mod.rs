pub mod memory;
pub mod pool;
pub mod postgres;
pub mod queries;
pub mod store;

pub use memory::{MemoryStore, DEMO_ADMIN_ID, DEMO_USER_ID};
pub use pool::create_pool;
pub use postgres::PgStore;
pub use store::Store;
