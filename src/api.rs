use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use eyre::eyre;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::task;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::db::{self, DateRange};
use crate::models::AccountDocument;

#[derive(Debug, Default, Deserialize)]
pub struct AccountQuery {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

/// JSON error body; every failure is reported as a 500 carrying the error chain
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
}

impl From<eyre::Report> for ApiError {
    fn from(e: eyre::Report) -> Self {
        Self {
            message: format!("{e:#}"),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("API request failed: {}", self.message);
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

pub fn router(conn: Arc<Mutex<Connection>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/test", get(|| async { "Everything Is Fine :)" }))
        .route("/accounts/:address", get(get_account))
        .layer(cors)
        .with_state(conn)
}

pub async fn serve(cfg: Config, conn: Arc<Mutex<Connection>>) -> eyre::Result<()> {
    let app = router(conn);

    let addr = SocketAddr::from(([127, 0, 0, 1], cfg.port));
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn get_account(
    State(conn): State<Arc<Mutex<Connection>>>,
    Path(address): Path<String>,
    Query(q): Query<AccountQuery>,
) -> Result<Json<AccountDocument>, ApiError> {
    let range = DateRange {
        start: q.start,
        end: q.end,
    };

    let doc = task::spawn_blocking(move || {
        let db = conn.lock().map_err(|_| eyre!("database mutex poisoned"))?;
        db::load_account(&db, &address, range)
    })
    .await
    .map_err(|e| eyre!("database task failed: {}", e))??;

    Ok(Json(doc))
}
