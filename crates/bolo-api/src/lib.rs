//! REST side of Bolo: accounts, contacts, history, read receipts, uploads,
//! health, and the startup bootstrap of the bot account.

pub mod auth;
pub mod bootstrap;
pub mod contacts;
pub mod files;
pub mod health;
pub mod messages;
pub mod middleware;

use std::sync::Arc;

use axum::http::StatusCode;
use tracing::error;

use bolo_db::Database;

/// Run a blocking DB closure off the async runtime, logging failures.
pub(crate) async fn run_db<F, T>(db: &Arc<Database>, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("DB error: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
