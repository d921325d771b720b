pub mod pagination;

use std::str::FromStr;

use sqlx::{
    SqlitePool,
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::error::Result;

pub use pagination::{Page, Pagination, paginate};

pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Open the pool and bring the schema up to date.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let database = SqlitePoolOptions::new().connect_with(options).await?;
    MIGRATOR.run(&database).await?;
    info!("database ready at {}", url);
    Ok(database)
}

/// A unique-index violation, e.g. a second enrollment for the same (course, user).
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}
