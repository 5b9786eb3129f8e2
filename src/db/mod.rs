mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use jwt_simple::algorithms::HS256Key;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::payments::MidtransConfig;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool and configuration.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Payment gateway credentials and endpoint.
    pub midtrans: MidtransConfig,
    /// Key for signing/verifying auth tokens.
    pub jwt_key: HS256Key,
    /// Shared HTTP client (gateway API, push webhook).
    pub http_client: reqwest::Client,
    /// Optional push-delivery webhook; notifications are skipped when unset.
    pub push_webhook_url: Option<String>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
