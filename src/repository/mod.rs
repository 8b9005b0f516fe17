pub mod database;
pub mod models;
pub mod token_repository;

pub use database::Database;
pub use models::PersistedToken;
pub use token_repository::{HourlyCount, TokenRepository, TokenStats, UpsertOutcome};
