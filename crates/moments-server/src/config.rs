use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::info;

use moments_types::models::UserId;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// Argon2 PHC hash per participant; a participant without one cannot sign in.
    pub password_hashes: Vec<(UserId, String)>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let jwt_secret = env::var("MOMENTS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MOMENTS_JWT_SECRET is unset or still a placeholder");
        }

        let port = try_load("MOMENTS_PORT", "3000")
            .parse()
            .context("MOMENTS_PORT must be a port number")?;

        let password_hashes = [
            (UserId::User1, "MOMENTS_USER1_PASSWORD_HASH"),
            (UserId::User2, "MOMENTS_USER2_PASSWORD_HASH"),
        ]
        .into_iter()
        .filter_map(|(user_id, key)| {
            env::var(key)
                .ok()
                .filter(|hash| !hash.trim().is_empty())
                .map(|hash| (user_id, hash))
        })
        .collect();

        Ok(Self {
            host: try_load("MOMENTS_HOST", "0.0.0.0"),
            port,
            db_path: try_load("MOMENTS_DB_PATH", "moments.db").into(),
            jwt_secret,
            password_hashes,
        })
    }
}

fn try_load(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}
