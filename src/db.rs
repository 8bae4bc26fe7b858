use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sql_types::Text;

use crate::error::DbError;

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

diesel::define_sql_function! {
    /// Unicode-aware lowercase. SQLite's built-in `lower` only folds ASCII.
    fn unicode_lower(text: Text) -> Text;
}

const SCHEMA: &str = include_str!("schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Applied to every connection the pool hands out. Foreign keys are off by
/// default in SQLite and the dish -> allergen cascade depends on them.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        configure_connection(conn, self.busy_timeout).map_err(r2d2::Error::QueryError)
    }
}

fn configure_connection(conn: &mut SqliteConnection, busy_timeout: Duration) -> QueryResult<()> {
    conn.batch_execute(&format!(
        "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
        busy_timeout.as_millis()
    ))?;
    unicode_lower_utils::register_impl(conn, |text: String| text.to_lowercase())
}

/// Creates the tables if they are missing. Safe to run on every start.
pub fn create_schema(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(SCHEMA)
}

/// Builds the connection pool and makes sure the schema exists.
pub fn init_pool(database_url: &str, max_size: u32) -> Result<DbPool, DbError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout: BUSY_TIMEOUT,
        }))
        .build(manager)?;

    let mut conn = pool.get()?;
    create_schema(&mut conn)?;
    log::info!("database ready at {database_url} (pool size {max_size})");

    Ok(pool)
}

/// Opens a single configured connection outside the pool.
pub fn establish(database_url: &str) -> Result<SqliteConnection, DbError> {
    let mut conn = SqliteConnection::establish(database_url)?;
    configure_connection(&mut conn, BUSY_TIMEOUT)?;
    create_schema(&mut conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::sql_types::Integer;

    #[derive(QueryableByName)]
    struct Pragma {
        #[diesel(sql_type = Integer)]
        foreign_keys: i32,
    }

    #[test]
    fn established_connection_enforces_foreign_keys() {
        let mut conn = establish(":memory:").unwrap();
        let pragma: Pragma = diesel::sql_query("PRAGMA foreign_keys")
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(pragma.foreign_keys, 1);
    }

    #[test]
    fn schema_creation_is_idempotent() {
        let mut conn = establish(":memory:").unwrap();
        create_schema(&mut conn).unwrap();
        create_schema(&mut conn).unwrap();
    }

    #[test]
    fn pooled_connections_are_configured() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("pool.db");
        let pool = init_pool(url.to_str().unwrap(), 2).unwrap();

        let mut conn = pool.get().unwrap();
        let pragma: Pragma = diesel::sql_query("PRAGMA foreign_keys")
            .get_result(&mut *conn)
            .unwrap();
        assert_eq!(pragma.foreign_keys, 1);
    }
}
