//! The fixed two-person roster and the weekday turn rule.

use chrono::Weekday;

use crate::models::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    pub id: UserId,
    pub email: &'static str,
    pub username: &'static str,
    pub partner: UserId,
    /// The weekday on which this participant chooses the question.
    pub choice_weekday: Weekday,
}

pub static ROSTER: [Participant; 2] = [
    Participant {
        id: UserId::User1,
        email: "marty.vandenberk@gmail.com",
        username: "Marty",
        partner: UserId::User2,
        choice_weekday: Weekday::Fri,
    },
    Participant {
        id: UserId::User2,
        email: "mariekevanderdennen@gmail.com",
        username: "Marieke",
        partner: UserId::User1,
        choice_weekday: Weekday::Sat,
    },
];

pub fn participant(id: UserId) -> &'static Participant {
    match id {
        UserId::User1 => &ROSTER[0],
        UserId::User2 => &ROSTER[1],
    }
}

/// Case-insensitive allow-list lookup.
pub fn participant_by_email(email: &str) -> Option<&'static Participant> {
    let email = email.trim();
    ROSTER.iter().find(|p| p.email.eq_ignore_ascii_case(email))
}

/// Who supplies the question on a given weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Chooses(UserId),
    Automatic,
}

pub fn turn_for(weekday: Weekday) -> Turn {
    ROSTER
        .iter()
        .find(|p| p.choice_weekday == weekday)
        .map_or(Turn::Automatic, |p| Turn::Chooses(p.id))
}
