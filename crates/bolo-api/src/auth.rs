use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};
use uuid::Uuid;

use bolo_db::Database;
use bolo_db::models::{NewUser, UserRow};
use bolo_gateway::auth::Authenticator;
use bolo_gateway::pipeline::Pipeline;
use bolo_types::api::{
    AuthResponse, Claims, LoginRequest, RegisterRequest, SetAvatarRequest, SetAvatarResponse,
};
use bolo_types::models::User;

use crate::run_db;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub auth: Authenticator,
    pub pipeline: Pipeline,
    /// Where uploads are written and served from
    pub upload_dir: PathBuf,
    /// Base for URLs handed back by the upload endpoint, no trailing slash
    pub public_url: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();

    // Validate input
    if username.len() < 3 || username.len() > 32 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if !email.contains('@') || req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if username.eq_ignore_ascii_case(&state.pipeline.bot().identity().username) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let password = req.password;
    let (uname, mail) = (username.clone(), email.clone());
    let created = run_db(&state.db, move |db| {
        if db.get_user_by_email(&mail)?.is_some() || db.get_user_by_username(&uname)?.is_some() {
            return Ok(None);
        }

        let user = NewUser {
            id: Uuid::new_v4().to_string(),
            username: uname,
            email: mail,
            password: hash_password(&password)?,
            avatar_image: String::new(),
            about: String::new(),
        };
        // A concurrent registration can still win between the check and here
        if !db.create_user(&user)? {
            return Ok(None);
        }
        Ok(db.get_user_by_id(&user.id)?)
    })
    .await?
    .ok_or(StatusCode::CONFLICT)?;

    let token = state.auth.issue(&created.id, &created.username).map_err(|e| {
        error!("Failed to issue token: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!("Registered {} ({})", created.username, created.id);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: to_user(created),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let email = req.email.trim().to_lowercase();
    let password = req.password;
    let user = run_db(&state.db, move |db| {
        let Some(user) = db.get_user_by_email(&email)? else {
            return Ok(None);
        };
        Ok(verify_password(&password, &user.password).then_some(user))
    })
    .await?
    .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = state.auth.issue(&user.id, &user.username).map_err(|e| {
        error!("Failed to issue token: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(AuthResponse {
        token,
        user: to_user(user),
    }))
}

pub async fn set_avatar(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetAvatarRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let image = req.image;
    let stored = image.clone();
    let updated = run_db(&state.db, move |db| db.set_avatar(&claims.sub, &stored)).await?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(SetAvatarResponse {
        is_set: true,
        image,
    }))
}

pub fn to_user(row: UserRow) -> User {
    User {
        id: row.id,
        username: row.username,
        email: row.email,
        avatar_image: row.avatar_image,
        about: row.about,
    }
}

/// Argon2id with a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
