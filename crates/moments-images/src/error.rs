use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    /// One step of the chain could not deliver. The chain recovers by moving on.
    #[error("{provider} unavailable: {reason}")]
    Unavailable { provider: &'static str, reason: String },

    #[error("all image sources exhausted")]
    Exhausted,
}

impl ImageError {
    pub fn unavailable(provider: &'static str, reason: impl ToString) -> Self {
        ImageError::Unavailable {
            provider,
            reason: reason.to_string(),
        }
    }
}
