pub mod database;
pub mod generation;
pub mod memory_store;
pub mod metrics;
pub mod providers;
pub mod repository;

pub use database::Database;
pub use memory_store::InMemoryRepository;
pub use providers::ProviderGateway;
pub use repository::ContentRepository;
