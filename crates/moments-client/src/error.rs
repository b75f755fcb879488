use thiserror::Error;

/// Failures reported by a [`crate::store::RecordStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    Conflict,

    #[error("not signed in")]
    Unauthorized,

    #[error("not allowed")]
    Forbidden,

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("subscription closed")]
    Closed,
}

/// Everything that can go wrong in the signed-in view or at sign-in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("email address is not on the roster")]
    UnauthorizedIdentity,

    #[error("wrong email or password")]
    AuthenticationFailed,

    #[error("sign-in failed: {0}")]
    SignInFailed(String),

    #[error("failed to load record: {0}")]
    RecordFetchFailed(String),

    #[error("failed to create record: {0}")]
    RecordCreateFailed(String),

    #[error("record creation timed out")]
    CreationTimedOut,

    #[error("no image source could deliver")]
    ImageUnavailable,

    #[error("failed to send chat message: {0}")]
    ChatSendFailed(String),

    #[error("failed to save answer: {0}")]
    AnswerSaveFailed(String),

    #[error("realtime connection lost: {0}")]
    RealtimeConnectionLost(String),

    #[error("there is no record for today yet")]
    NoRecordForToday,

    #[error("chat is only open for yesterday")]
    ChatClosed,

    #[error("it is not your turn to choose the question")]
    NotYourTurn,

    #[error("text is empty")]
    EmptyInput,

    #[error("text exceeds {max} characters")]
    TooLong { max: usize },
}

impl ViewError {
    /// Short message shown to the participant.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnauthorizedIdentity => "E-mailadres niet toegestaan".into(),
            Self::AuthenticationFailed => "E-mail of wachtwoord onjuist".into(),
            Self::SignInFailed(_) => "Inloggen mislukt. Probeer het later opnieuw.".into(),
            Self::RecordFetchFailed(_) => {
                "Er is iets misgegaan bij het laden van jullie dagelijkse moment.".into()
            }
            Self::RecordCreateFailed(_) => "Kon het dagelijkse moment niet aanmaken.".into(),
            Self::CreationTimedOut => {
                "Het duurt te lang om een nieuw moment te creëren. Probeer het opnieuw.".into()
            }
            Self::ImageUnavailable => "Er kon geen afbeelding voor vandaag worden gevonden.".into(),
            Self::ChatSendFailed(_) => "Versturen mislukt".into(),
            Self::AnswerSaveFailed(_) => "Opslaan mislukt".into(),
            Self::RealtimeConnectionLost(_) => {
                "Er is een probleem met de real-time verbinding. Probeer de pagina te vernieuwen."
                    .into()
            }
            Self::NoRecordForToday => "Het moment van vandaag is nog niet klaar.".into(),
            Self::ChatClosed => "Je kunt alleen over gisteren chatten.".into(),
            Self::NotYourTurn => "Vandaag kiest je partner de vraag.".into(),
            Self::EmptyInput => "Vul eerst iets in.".into(),
            Self::TooLong { max } => format!("Maximaal {max} tekens."),
        }
    }

    /// Whether the same action may succeed when tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RecordFetchFailed(_)
                | Self::RecordCreateFailed(_)
                | Self::CreationTimedOut
                | Self::ImageUnavailable
                | Self::ChatSendFailed(_)
                | Self::AnswerSaveFailed(_)
                | Self::SignInFailed(_)
        )
    }
}
