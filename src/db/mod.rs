//! Database layer
//!
//! SQLite is the default backend; MySQL is selected through
//! `database.driver`. Schema changes live in [`migrations`] and are applied at
//! startup, and each table has a repository trait in [`repositories`].

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
