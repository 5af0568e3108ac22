use crate::config::AppConfig;
use crate::types::ApiError;
use diesel::connection::SimpleConnection;
use diesel::r2d2::ConnectionManager;
use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;
use r2d2::CustomizeConnection;
use rocket::http::Status;
use rocket::outcome::{try_outcome, Outcome};
use rocket::request::{self, FromRequest};
use rocket::{Request, State};
use std::ops::{Deref, DerefMut};

pub mod schema;

static MIGRATION: &str = include_str!("../../migrations/2018-06-01-000000_create_conduit/up.sql");

// Applied to every connection; sqlite keeps these per connection, not per file.
static CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

// An alias to the type for a pool of Diesel SQLite connections.
pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub struct DbConnection(pub r2d2::PooledConnection<ConnectionManager<SqliteConnection>>);

error_chain! {
    foreign_links {
        R2D2(r2d2::Error);
        Diesel(DieselError);
    }
}

#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> ::std::result::Result<(), diesel::r2d2::Error> {
        configure(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Attempts to retrieve a single connection from the managed database pool. If
/// no pool is currently managed, fails with an `InternalServerError` status. If
/// no connections are available, fails with a `ServiceUnavailable` status.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<DbConnection, ()> {
        let pool = try_outcome!(request.guard::<&State<Pool>>().await).inner().clone();
        match rocket::tokio::task::spawn_blocking(move || pool.get()).await {
            Ok(Ok(conn)) => Outcome::Success(DbConnection(conn)),
            Ok(Err(e)) => {
                log::warn!("no database connection available: {}", e);
                Outcome::Error((Status::ServiceUnavailable, ()))
            }
            Err(e) => {
                log::error!("connection checkout panicked: {}", e);
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

impl DbConnection {
    /// Runs `f` against the connection on the blocking thread pool, keeping
    /// sqlite's lock waits off the async workers.
    pub async fn run<F, R>(mut self, f: F) -> ::std::result::Result<R, ApiError>
    where
        F: FnOnce(&mut SqliteConnection) -> R + Send + 'static,
        R: Send + 'static,
    {
        rocket::tokio::task::spawn_blocking(move || f(&mut self.0))
            .await
            .map_err(|e| {
                log::error!("database task panicked: {}", e);
                ApiError::Internal
            })
    }
}

// For the convenience of using an &mut DbConnection as an &mut SqliteConnection.
impl Deref for DbConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

pub fn init_pool(config: &AppConfig) -> Result<Pool> {
    let manager = ConnectionManager::<SqliteConnection>::new(config.database_url.as_str());
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)?;
    Ok(pool)
}

pub fn configure(conn: &mut SqliteConnection) -> ::std::result::Result<(), DieselError> {
    conn.batch_execute(CONNECTION_PRAGMAS)
}

/// Creates the schema if it is missing. Every statement is idempotent, so this
/// runs on each start.
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    conn.batch_execute(MIGRATION)?;
    Ok(())
}

#[cfg(test)]
pub fn test_connection() -> SqliteConnection {
    use diesel::Connection;

    let mut conn = SqliteConnection::establish(":memory:").unwrap();
    configure(&mut conn).unwrap();
    run_migrations(&mut conn).unwrap();
    conn
}
