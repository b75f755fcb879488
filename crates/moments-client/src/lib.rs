//! Client side of Moments: the identity gate, the record store adapters and
//! the daily turn orchestrator that drives one signed-in view.

pub mod clock;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod turn;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ClientConfig;
pub use error::{StoreError, ViewError};
pub use orchestrator::{DateLabel, Navigate, Orchestrator, Phase, Update, ViewState};
pub use session::Session;
pub use store::{RecordStore, Subscription};
