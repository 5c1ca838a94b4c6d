use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use rollcall_db::Database;
use rollcall_registry::RegistrationEngine;
use rollcall_types::api::{Claims, LoginRequest, LoginResponse, MeResponse, RegisterRequest, RegisterResponse};
use rollcall_types::models::Role;

use crate::error::{ApiError, blocking};
use crate::extract::ApiJson;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub engine: RegistrationEngine,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    let username_len = req.username.chars().count();
    if !(3..=32).contains(&username_len) {
        return Err(ApiError::BadRequest("Username must be 3 to 32 characters"));
    }
    if req.password.chars().count() < 8 {
        return Err(ApiError::BadRequest("Password must be at least 8 characters"));
    }

    let user_id = Uuid::new_v4();
    let username = req.username.clone();
    let db = state.db.clone();
    blocking(move || {
        // Check if username is taken
        if db.get_user_by_username(&req.username)?.is_some() {
            return Err(ApiError::Conflict("Username is already taken"));
        }
        let password_hash = hash_password(&req.password)?;
        db.create_user(&user_id.to_string(), &req.username, &password_hash, Role::User)?;
        Ok(())
    })
    .await?;

    let token = create_token(&state.jwt_secret, user_id, &username, Role::User)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user = blocking(move || {
        let row = db
            .get_user_by_username(&req.username)?
            .ok_or(ApiError::Unauthorized)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&row.password)
            .map_err(|e| anyhow::anyhow!("Corrupt password hash for {}: {}", row.id, e))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(row.into_user()?)
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.username, user.role)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        role: user.role,
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user = blocking(move || {
        let row = db
            .get_user_by_id(&claims.sub.to_string())?
            .ok_or(ApiError::Unauthorized)?;
        Ok(row.into_user()?)
    })
    .await?;

    Ok(Json(MeResponse {
        id: user.id,
        username: user.username,
        role: user.role,
    }))
}

/// Create the admin account if no user with that name exists yet.
/// Returns true when a new account was created.
pub fn ensure_admin(db: &Database, username: &str, password: &str) -> anyhow::Result<bool> {
    if db.get_user_by_username(username)?.is_some() {
        return Ok(false);
    }
    let password_hash = hash_password(password)?;
    db.create_user(&Uuid::new_v4().to_string(), username, &password_hash, Role::Admin)?;
    info!("Created admin account '{}'", username);
    Ok(true)
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
