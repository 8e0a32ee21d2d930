//! Database layer
//!
//! SQLite (default, single-binary deployment) or MySQL behind the
//! `DatabasePool` trait, code-embedded migrations, repositories and
//! demo-content seeding.
//!
//! ```ignore
//! use devstudio::config::DatabaseConfig;
//! use devstudio::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod seed;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
