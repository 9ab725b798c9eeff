//! Assembles the Bolo server: shared state, REST routes, the `/gateway`
//! WebSocket and static uploads.

pub mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use bolo_api::auth::{self, AppState, AppStateInner};
use bolo_api::middleware::require_auth;
use bolo_api::{bootstrap, contacts, files, health, messages};
use bolo_db::Database;
use bolo_gateway::auth::Authenticator;
use bolo_gateway::bot::BotResponder;
use bolo_gateway::connection;
use bolo_gateway::generator::{OfflineGenerator, OpenAiGenerator, ReplyGenerator};
use bolo_gateway::pipeline::Pipeline;
use bolo_gateway::rooms::Rooms;
use bolo_gateway::store::SqliteStore;

use crate::config::Config;

/// Open the database and wire every service from `config`.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let db = Arc::new(Database::open(&config.db_path)?);

    let generator: Arc<dyn ReplyGenerator> = match &config.openai_api_key {
        Some(key) => {
            info!("Bot replies via {} ({})", config.openai_base_url, config.openai_model);
            Arc::new(OpenAiGenerator::new(
                key,
                &config.openai_base_url,
                &config.openai_model,
            )?)
        }
        None => {
            warn!("OPENAI_API_KEY not set, bot will answer with a canned reply");
            Arc::new(OfflineGenerator)
        }
    };

    assemble(db, config, generator).await
}

/// Wire services around an already open database. Resolves (or creates)
/// the bot account before anything can accept traffic.
pub async fn assemble(
    db: Arc<Database>,
    config: &Config,
    generator: Arc<dyn ReplyGenerator>,
) -> anyhow::Result<AppState> {
    let identity = bootstrap::ensure_bot(db.clone()).await?;
    let bot = BotResponder::new(identity, generator, config.bot_reply_delay);
    let store = Arc::new(SqliteStore::new(db.clone()));
    let pipeline = Pipeline::new(store, Rooms::new(), bot);

    Ok(Arc::new(AppStateInner {
        db,
        auth: Authenticator::new(&config.jwt_secret),
        pipeline,
        upload_dir: config.upload_dir.clone(),
        public_url: config.public_url.clone(),
    }))
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/api/health", get(health::health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/avatar", post(auth::set_avatar))
        .route("/api/users", get(contacts::list_contacts))
        .route("/api/messages/{other_id}", get(messages::get_messages))
        .route(
            "/api/messages/read/{from_user_id}",
            post(messages::mark_read),
        )
        .route(
            "/api/upload",
            post(files::upload_file).layer(DefaultBodyLimit::max(files::MAX_FILE_SIZE)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .nest_service("/uploads", ServeDir::new(&state.upload_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

/// Authenticate before upgrading: a bad token gets a plain 401 and never
/// reaches the gateway.
async fn ws_upgrade(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = bearer
        .as_ref()
        .map(|TypedHeader(Authorization(b))| b.token())
        .or(query.token.as_deref());

    let claims = match state.auth.authenticate(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!("Gateway upgrade rejected: {}", e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    let pipeline = state.pipeline.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, pipeline, claims.sub))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    async fn test_router() -> Router {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let config = Config::from_lookup(|_| None).unwrap();
        let state = assemble(db, &config, Arc::new(OfflineGenerator))
            .await
            .unwrap();
        router(state)
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = test_router().await;
        for uri in ["/health", "/api/health"] {
            let res = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = test_router().await;
        let res = app
            .clone()
            .oneshot(Request::get("/api/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .oneshot(
                Request::get("/api/users")
                    .header("authorization", "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
