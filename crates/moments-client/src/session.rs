use reqwest::{Client, StatusCode};
use tracing::{info, warn};

use moments_types::api::{LoginRequest, LoginResponse};
use moments_types::models::User;
use moments_types::roster::{Participant, participant_by_email};

use crate::error::ViewError;

/// A signed-in participant and the bearer token for the server.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Allow-list check. Runs before anything touches the network.
pub fn check_allowed(email: &str) -> Result<&'static Participant, ViewError> {
    participant_by_email(email).ok_or(ViewError::UnauthorizedIdentity)
}

/// Sign in with email and password against the server at `server_url`.
pub async fn sign_in(
    http: &Client,
    server_url: &str,
    email: &str,
    password: &str,
) -> Result<Session, ViewError> {
    let participant = check_allowed(email)?;

    let response = http
        .post(format!("{}/auth/login", server_url.trim_end_matches('/')))
        .json(&LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        })
        .send()
        .await
        .map_err(|e| ViewError::SignInFailed(e.to_string()))?;

    match response.status() {
        status if status.is_success() => {
            let body: LoginResponse = response
                .json()
                .await
                .map_err(|e| ViewError::SignInFailed(e.to_string()))?;
            info!("Signed in as {}", participant.username);
            Ok(Session {
                user: body.user,
                token: body.token,
            })
        }
        StatusCode::FORBIDDEN => Err(ViewError::UnauthorizedIdentity),
        StatusCode::UNAUTHORIZED => Err(ViewError::AuthenticationFailed),
        status => {
            warn!("Login returned {}", status);
            Err(ViewError::SignInFailed(format!("server returned {status}")))
        }
    }
}
