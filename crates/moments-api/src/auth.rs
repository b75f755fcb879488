use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use moments_db::Database;
use moments_types::api::{Claims, LoginRequest, LoginResponse};
use moments_types::models::{User, UserId};
use moments_types::roster::{participant, participant_by_email};

use crate::error::ApiError;
use crate::{AppState, run_blocking};

/// Tokens stay valid for 30 days.
const TOKEN_LIFETIME_DAYS: i64 = 30;

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Allow-list first: unknown emails never reach the credential check
    let participant = participant_by_email(&req.email).ok_or_else(|| {
        warn!("Login attempt with unlisted email");
        ApiError::UnauthorizedIdentity
    })?;

    let db = state.db.clone();
    let account = run_blocking(move || db.get_account_by_user_id(participant.id.as_str()))
        .await?
        .ok_or_else(|| {
            warn!("No credentials provisioned for {}", participant.id);
            ApiError::AuthenticationFailed
        })?;

    let parsed_hash = PasswordHash::new(&account.password_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {}", e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::AuthenticationFailed)?;

    let uid = account.parse_uid()?;
    let token = create_token(&state.jwt_secret, uid, participant.id, participant.username)?;

    info!("{} signed in", participant.username);

    Ok(Json(LoginResponse {
        user: User {
            uid,
            id: participant.id,
            username: participant.username.to_string(),
            partner_id: participant.partner,
            email: participant.email.to_string(),
        },
        token,
    }))
}

pub fn create_token(
    secret: &str,
    uid: Uuid,
    user_id: UserId,
    username: &str,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: uid,
        user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Hash a password with Argon2id into a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Make `user_id` able to sign in with the password behind `password_hash`.
/// The account keeps its uid if it already exists.
pub fn provision_account(db: &Database, user_id: UserId, password_hash: &str) -> anyhow::Result<()> {
    PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash for {}: {}", user_id, e))?;

    let p = participant(user_id);
    db.upsert_account(
        &Uuid::new_v4().to_string(),
        user_id.as_str(),
        p.email,
        password_hash,
    )?;

    info!("Provisioned account for {} ({})", p.username, user_id);
    Ok(())
}
