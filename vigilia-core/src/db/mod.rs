//! Database layer: schema migrations and the repository of typed queries.

pub mod repo;
pub mod schema;

pub use repo::Database;
