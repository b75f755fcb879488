use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{User, UserId};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the gateway upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account uid.
    pub sub: Uuid,
    pub user_id: UserId,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

// -- Records --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRecordRequest {
    pub image_url: String,
    pub question: String,
    pub question_by: Option<UserId>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveAnswerRequest {
    pub answer: String,
}

// -- Chat --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendChatRequest {
    pub message: String,
}

/// Body returned for any 4xx/5xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
