//! Database layer: connection pool, migrations, and repositories.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
