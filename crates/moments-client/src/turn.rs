use chrono::{Datelike, NaiveDate};
use rand::Rng;
use rand::seq::IndexedRandom;

use moments_types::models::UserId;
use moments_types::questions::DAILY_QUESTIONS;
use moments_types::roster::{Turn, turn_for};

/// What the signed-in user has to do when today has no record yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodayPlan {
    /// Prompt me for a question.
    MyChoice,
    /// Wait for the partner's question.
    PartnerChoice,
    /// Create the record with a question from the bank.
    Automatic,
}

pub fn plan_for(me: UserId, today: NaiveDate) -> TodayPlan {
    match turn_for(today.weekday()) {
        Turn::Chooses(id) if id == me => TodayPlan::MyChoice,
        Turn::Chooses(_) => TodayPlan::PartnerChoice,
        Turn::Automatic => TodayPlan::Automatic,
    }
}

pub fn random_question<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    DAILY_QUESTIONS.choose(rng).copied().unwrap_or(DAILY_QUESTIONS[0])
}
