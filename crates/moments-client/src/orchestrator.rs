//! The daily turn orchestrator: makes sure today has a record, decides who
//! picks today's question, and keeps the signed-in view in sync with the store.
//!
//! One orchestrator drives one view from a single task. Intents are `&mut self`
//! methods; store pushes are pulled in with [`Orchestrator::next_update`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};

use moments_images::{DailyImageSource, ImageSupply};
use moments_types::models::{
    ANSWER_MAX_LENGTH, CHAT_MAX_LENGTH, ChatMessage, DailyRecord, NewChatMessage,
    QUESTION_MAX_LENGTH, User, UserId,
};
use moments_types::roster::{Participant, participant};

use crate::clock::{Clock, SystemClock};
use crate::config::{CREATION_TIMEOUT, ClientConfig};
use crate::error::{StoreError, ViewError};
use crate::session::Session;
use crate::store::{RecordStore, RemoteStore, Subscription, merge_chat_message};
use crate::turn::{TodayPlan, plan_for, random_question};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    /// No record yet and it is my day to choose.
    AwaitingMyChoice,
    /// No record yet and the partner chooses today.
    AwaitingPartnerChoice,
    /// No record yet and the question comes from the bank.
    AutoCreating,
    /// Today's record exists.
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigate {
    Prev,
    Next,
}

/// What [`Orchestrator::next_update`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Record(NaiveDate),
    Chat(NaiveDate),
    ConnectionLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLabel {
    Today,
    Yesterday,
    Other(NaiveDate),
}

const WEEKDAYS_NL: [&str; 7] = [
    "maandag", "dinsdag", "woensdag", "donderdag", "vrijdag", "zaterdag", "zondag",
];

const MONTHS_NL: [&str; 12] = [
    "januari", "februari", "maart", "april", "mei", "juni", "juli", "augustus", "september",
    "oktober", "november", "december",
];

impl fmt::Display for DateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => f.write_str("Vandaag"),
            Self::Yesterday => f.write_str("Gisteren"),
            Self::Other(date) => write!(
                f,
                "{} {} {}",
                WEEKDAYS_NL[date.weekday().num_days_from_monday() as usize],
                date.day(),
                MONTHS_NL[date.month0() as usize]
            ),
        }
    }
}

/// Everything the view renders. Rebuilt on sign-in and on date rollover.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub today: NaiveDate,
    pub yesterday: NaiveDate,
    pub viewing_date: NaiveDate,
    /// Records of `today` and `viewing_date`, as last pushed by their feeds.
    pub records: BTreeMap<NaiveDate, DailyRecord>,
    /// Chat of `viewing_date`, ordered by server timestamp.
    pub chat_messages: Vec<ChatMessage>,
    pub available_dates: BTreeSet<NaiveDate>,
    pub answer_draft: String,
    pub chat_draft: String,
    pub loading: bool,
    pub waiting_for_partner: bool,
    pub show_question_choice: bool,
    pub show_calendar: bool,
    pub show_emoji_picker: bool,
    pub saving_answer: bool,
    pub sending_chat: bool,
    pub creating: bool,
    pub error: Option<ViewError>,
    /// Set when a live feed fails. Only a new initialization clears it.
    pub connection_problem: bool,
}

impl ViewState {
    fn new(today: NaiveDate) -> Self {
        let yesterday = today.pred_opt().unwrap_or(today);
        Self {
            today,
            yesterday,
            viewing_date: yesterday,
            records: BTreeMap::new(),
            chat_messages: Vec::new(),
            available_dates: BTreeSet::new(),
            answer_draft: String::new(),
            chat_draft: String::new(),
            loading: true,
            waiting_for_partner: false,
            show_question_choice: false,
            show_calendar: false,
            show_emoji_picker: false,
            saving_answer: false,
            sending_chat: false,
            creating: false,
            error: None,
            connection_problem: false,
        }
    }
}

enum Feed {
    Viewed(Option<Result<Option<DailyRecord>, StoreError>>),
    Today(Option<Result<Option<DailyRecord>, StoreError>>),
    Chat(Option<Result<Vec<ChatMessage>, StoreError>>),
}

pub struct Orchestrator {
    user: User,
    store: Arc<dyn RecordStore>,
    images: Arc<dyn DailyImageSource>,
    clock: Arc<dyn Clock>,
    creation_timeout: Duration,
    phase: Phase,
    state: ViewState,
    viewed_sub: Option<Subscription<Option<DailyRecord>>>,
    today_sub: Option<Subscription<Option<DailyRecord>>>,
    chat_sub: Option<Subscription<Vec<ChatMessage>>>,
}

impl Orchestrator {
    pub fn new(
        user: User,
        store: Arc<dyn RecordStore>,
        images: Arc<dyn DailyImageSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let today = clock.today();
        Self {
            user,
            store,
            images,
            clock,
            creation_timeout: CREATION_TIMEOUT,
            phase: Phase::Initializing,
            state: ViewState::new(today),
            viewed_sub: None,
            today_sub: None,
            chat_sub: None,
        }
    }

    /// Orchestrator for a server session, with the full image chain.
    pub fn connect(config: &ClientConfig, session: Session) -> Result<Self, ViewError> {
        let images = ImageSupply::from_config(&config.images).map_err(|e| {
            warn!("Image supply unavailable: {}", e);
            ViewError::ImageUnavailable
        })?;
        let store = RemoteStore::new(reqwest::Client::new(), &config.server_url, &session);

        Ok(Self::new(session.user, Arc::new(store), Arc::new(images), Arc::new(SystemClock))
            .with_creation_timeout(config.creation_timeout))
    }

    pub fn with_creation_timeout(mut self, timeout: Duration) -> Self {
        self.creation_timeout = timeout;
        self
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    // -- Lifecycle --

    /// Derive the view for today from scratch: subscribe, then make sure a
    /// record for today exists or is being waited for.
    pub async fn initialize(&mut self) {
        let today = self.clock.today();
        self.release_subscriptions();
        self.state = ViewState::new(today);
        self.phase = Phase::Initializing;
        info!("{} initializing view for {}", self.user.username, today);

        self.subscribe_current().await;

        match self.store.list_available_dates().await {
            Ok(dates) => self.state.available_dates.extend(dates),
            Err(e) => warn!("Failed to list available dates: {}", e),
        }

        let existing = match self.store.read(today).await {
            Ok(existing) => existing,
            Err(e) => {
                self.state.loading = false;
                self.reject(ViewError::RecordFetchFailed(e.to_string()));
                return;
            }
        };

        if let Some(record) = existing {
            self.apply_record(record);
            return;
        }

        match plan_for(self.user.id, today) {
            TodayPlan::MyChoice => {
                debug!("No record for {}, my turn to choose", today);
                self.phase = Phase::AwaitingMyChoice;
                self.state.show_question_choice = true;
                self.state.loading = false;
            }
            TodayPlan::PartnerChoice => {
                debug!("No record for {}, waiting for partner", today);
                self.phase = Phase::AwaitingPartnerChoice;
                self.state.waiting_for_partner = true;
                self.state.loading = false;
            }
            TodayPlan::Automatic => {
                self.phase = Phase::AutoCreating;
                let question = random_question(&mut rand::rng()).to_string();
                // Failure is recorded in the view state
                let _ = self.create_today(question, None).await;
            }
        }
    }

    /// Re-initialize when the calendar date has moved on. Returns whether it did.
    pub async fn on_clock_tick(&mut self) -> bool {
        let today = self.clock.today();
        if today == self.state.today {
            return false;
        }
        info!("Date rolled over from {} to {}", self.state.today, today);
        self.initialize().await;
        true
    }

    /// End the session, releasing every live feed.
    pub fn sign_out(mut self) {
        self.release_subscriptions();
        info!("{} signed out", self.user.username);
    }

    // -- Question choice --

    /// Create today's record with my own question.
    pub async fn choose_question(&mut self, question: &str) -> Result<(), ViewError> {
        self.ensure_my_choice()?;
        let question = validate(question, QUESTION_MAX_LENGTH).map_err(|e| self.reject(e))?;
        self.create_today(question, Some(self.user.id)).await
    }

    /// Create today's record with a bank question picked for me.
    pub async fn generate_question(&mut self) -> Result<(), ViewError> {
        self.ensure_my_choice()?;
        let question = random_question(&mut rand::rng()).to_string();
        self.create_today(question, Some(self.user.id)).await
    }

    fn ensure_my_choice(&mut self) -> Result<(), ViewError> {
        if self.phase == Phase::AwaitingMyChoice {
            Ok(())
        } else {
            Err(self.reject(ViewError::NotYourTurn))
        }
    }

    async fn create_today(
        &mut self,
        question: String,
        question_by: Option<UserId>,
    ) -> Result<(), ViewError> {
        let today = self.state.today;
        self.state.creating = true;
        self.state.loading = true;
        self.state.error = None;

        let attempt = tokio::spawn(create_record(
            self.store.clone(),
            self.images.clone(),
            today,
            question,
            question_by,
        ));

        // On timeout the handle is dropped: the attempt keeps running detached
        // and its outcome never reaches the view.
        let outcome = match tokio::time::timeout(self.creation_timeout, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ViewError::RecordCreateFailed(e.to_string())),
            Err(_) => {
                warn!("Creating the record for {} timed out", today);
                Err(ViewError::CreationTimedOut)
            }
        };

        self.state.creating = false;
        match outcome {
            Ok(record) => {
                info!("Record for {} is ready", today);
                self.state.show_question_choice = false;
                self.apply_record(record);
                Ok(())
            }
            Err(e) => {
                self.state.loading = false;
                Err(self.reject(e))
            }
        }
    }

    // -- Answers and chat --

    pub fn set_answer_draft(&mut self, text: impl Into<String>) {
        self.state.answer_draft = text.into();
    }

    pub fn set_chat_draft(&mut self, text: impl Into<String>) {
        self.state.chat_draft = text.into();
    }

    pub fn toggle_emoji_picker(&mut self) {
        self.state.show_emoji_picker = !self.state.show_emoji_picker;
    }

    pub fn select_emoji(&mut self, emoji: &str) {
        self.state.chat_draft.push_str(emoji);
    }

    /// Save the answer draft as my answer for today, replacing any earlier one.
    pub async fn save_answer(&mut self) -> Result<(), ViewError> {
        let today = self.state.today;
        if !self.state.records.contains_key(&today) {
            return Err(self.reject(ViewError::NoRecordForToday));
        }
        let answer = validate(&self.state.answer_draft, ANSWER_MAX_LENGTH).map_err(|e| self.reject(e))?;

        self.state.saving_answer = true;
        let result = self.store.upsert_answer(today, self.user.id, &answer).await;
        self.state.saving_answer = false;

        match result {
            Ok(record) => {
                debug!("Saved answer for {}", today);
                self.state.error = None;
                self.apply_record(record);
                Ok(())
            }
            Err(e) => Err(self.reject(ViewError::AnswerSaveFailed(e.to_string()))),
        }
    }

    /// Send the chat draft. Chat is open only while viewing yesterday.
    pub async fn send_chat(&mut self) -> Result<(), ViewError> {
        if !self.is_viewing_yesterday() {
            return Err(self.reject(ViewError::ChatClosed));
        }
        let text = validate(&self.state.chat_draft, CHAT_MAX_LENGTH).map_err(|e| self.reject(e))?;

        let date = self.state.yesterday;
        let message = NewChatMessage {
            user_id: self.user.id,
            username: self.user.username.clone(),
            message: text,
        };

        self.state.sending_chat = true;
        let result = self.store.append_chat_message(date, message).await;
        self.state.sending_chat = false;

        match result {
            Ok(stored) => {
                if self.state.viewing_date == date {
                    merge_chat_message(&mut self.state.chat_messages, stored);
                }
                self.state.chat_draft.clear();
                self.state.show_emoji_picker = false;
                self.state.error = None;
                Ok(())
            }
            Err(e) => Err(self.reject(ViewError::ChatSendFailed(e.to_string()))),
        }
    }

    // -- Navigation --

    /// Move one day. Returns whether the view moved.
    pub async fn navigate(&mut self, direction: Navigate) -> bool {
        let current = self.state.viewing_date;
        let target = match direction {
            Navigate::Prev => current.pred_opt(),
            Navigate::Next => current.succ_opt(),
        };
        match target {
            Some(date) => self.view_date(date).await,
            None => false,
        }
    }

    pub fn toggle_calendar(&mut self) {
        self.state.show_calendar = !self.state.show_calendar;
    }

    /// Jump to a date picked in the calendar. Returns whether the view moved.
    pub async fn select_date(&mut self, date: NaiveDate) -> bool {
        let moved = self.view_date(date).await;
        if moved {
            self.state.show_calendar = false;
        }
        moved
    }

    pub fn can_view(&self, date: NaiveDate) -> bool {
        date == self.state.today
            || (date < self.state.today && self.state.available_dates.contains(&date))
    }

    async fn view_date(&mut self, date: NaiveDate) -> bool {
        if !self.can_view(date) {
            debug!("Cannot view {}", date);
            return false;
        }
        if date == self.state.viewing_date {
            return true;
        }
        self.state.viewing_date = date;
        self.state.chat_messages.clear();
        self.subscribe_current().await;
        true
    }

    // -- Live updates --

    /// Wait for the next push from the store and fold it into the view.
    /// `None` when no feed is left.
    pub async fn next_update(&mut self) -> Option<Update> {
        if self.viewed_sub.is_none() && self.today_sub.is_none() && self.chat_sub.is_none() {
            return None;
        }

        let feed = tokio::select! {
            item = next_item(&mut self.viewed_sub) => Feed::Viewed(item),
            item = next_item(&mut self.today_sub) => Feed::Today(item),
            item = next_item(&mut self.chat_sub) => Feed::Chat(item),
        };

        match feed {
            Feed::Viewed(Some(Ok(record))) => {
                let date = self.state.viewing_date;
                Some(self.record_pushed(date, record))
            }
            Feed::Today(Some(Ok(record))) => {
                let date = self.state.today;
                Some(self.record_pushed(date, record))
            }
            Feed::Chat(Some(Ok(messages))) => {
                self.state.chat_messages = messages;
                Some(Update::Chat(self.state.viewing_date))
            }
            Feed::Viewed(item) => {
                self.viewed_sub = None;
                Some(self.connection_lost(feed_error(item)))
            }
            Feed::Today(item) => {
                self.today_sub = None;
                Some(self.connection_lost(feed_error(item)))
            }
            Feed::Chat(item) => {
                self.chat_sub = None;
                Some(self.connection_lost(feed_error(item)))
            }
        }
    }

    /// Fold a record pushed by the feed for `date`.
    fn record_pushed(&mut self, date: NaiveDate, record: Option<DailyRecord>) -> Update {
        if let Some(record) = record {
            self.apply_record(record);
        }
        Update::Record(date)
    }

    async fn subscribe_current(&mut self) {
        self.release_subscriptions();
        let viewed = self.state.viewing_date;
        let today = self.state.today;
        self.state.records.retain(|&date, _| date == viewed || date == today);

        let result = self.store.subscribe(viewed).await;
        self.viewed_sub = self.keep(result);

        if viewed != today {
            let result = self.store.subscribe(today).await;
            self.today_sub = self.keep(result);
        }

        let result = self.store.subscribe_chat(viewed).await;
        self.chat_sub = self.keep(result);
    }

    fn keep<T>(&mut self, result: Result<Subscription<T>, StoreError>) -> Option<Subscription<T>> {
        match result {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                self.connection_lost(e);
                None
            }
        }
    }

    fn release_subscriptions(&mut self) {
        self.viewed_sub = None;
        self.today_sub = None;
        self.chat_sub = None;
    }

    fn connection_lost(&mut self, e: StoreError) -> Update {
        warn!("Live feed failed: {}", e);
        self.state.connection_problem = true;
        self.reject(ViewError::RealtimeConnectionLost(e.to_string()));
        Update::ConnectionLost
    }

    fn apply_record(&mut self, record: DailyRecord) {
        let date = record.date;
        if date == self.state.today {
            self.state.loading = false;
            self.state.waiting_for_partner = false;
            if !self.state.creating {
                self.state.show_question_choice = false;
            }
            self.phase = Phase::Ready;
        }
        self.state.available_dates.insert(date);
        self.state.records.insert(date, record);
    }

    fn reject(&mut self, e: ViewError) -> ViewError {
        self.state.error = Some(e.clone());
        e
    }

    // -- Derived view --

    pub fn viewed_record(&self) -> Option<&DailyRecord> {
        self.state.records.get(&self.state.viewing_date)
    }

    pub fn today_record(&self) -> Option<&DailyRecord> {
        self.state.records.get(&self.state.today)
    }

    pub fn partner(&self) -> &'static Participant {
        participant(self.user.partner_id)
    }

    pub fn my_answer(&self) -> Option<&str> {
        self.viewed_record()?
            .answer_of(self.user.id)
            .map(|a| a.answer.as_str())
    }

    /// The partner's answer becomes visible the day after.
    pub fn partner_answer(&self) -> Option<&str> {
        if self.state.viewing_date == self.state.today {
            return None;
        }
        self.viewed_record()?
            .answer_of(self.user.partner_id)
            .map(|a| a.answer.as_str())
    }

    pub fn has_submitted_today(&self) -> bool {
        self.today_record()
            .is_some_and(|r| r.answer_of(self.user.id).is_some())
    }

    pub fn is_viewing_yesterday(&self) -> bool {
        self.state.viewing_date == self.state.yesterday
    }

    pub fn date_label(&self) -> DateLabel {
        let date = self.state.viewing_date;
        if date == self.state.today {
            DateLabel::Today
        } else if date == self.state.yesterday {
            DateLabel::Yesterday
        } else {
            DateLabel::Other(date)
        }
    }

    pub fn image_for_view(&self) -> Option<&str> {
        self.viewed_record().map(|r| r.image_url.as_str())
    }
}

/// Resolve an image and write today's record. A record that already exists is
/// adopted instead.
async fn create_record(
    store: Arc<dyn RecordStore>,
    images: Arc<dyn DailyImageSource>,
    date: NaiveDate,
    question: String,
    question_by: Option<UserId>,
) -> Result<DailyRecord, ViewError> {
    let image = images.resolve().await.map_err(|e| {
        warn!("No image for {}: {}", date, e);
        ViewError::ImageUnavailable
    })?;
    debug!("Image for {} from {}", date, image.provider);

    let record = DailyRecord::new(date, image.data_url, question, question_by);
    match store.create(record).await {
        Ok(record) => Ok(record),
        Err(StoreError::Conflict) => {
            info!("Record for {} already exists, adopting it", date);
            store
                .read(date)
                .await
                .map_err(|e| ViewError::RecordCreateFailed(e.to_string()))?
                .ok_or_else(|| ViewError::RecordCreateFailed("record vanished after conflict".into()))
        }
        Err(e) => Err(ViewError::RecordCreateFailed(e.to_string())),
    }
}

async fn next_item<T>(sub: &mut Option<Subscription<T>>) -> Option<Result<T, StoreError>> {
    match sub {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

fn feed_error<T>(item: Option<Result<T, StoreError>>) -> StoreError {
    match item {
        Some(Err(e)) => e,
        _ => StoreError::Closed,
    }
}

/// Trim and bound user text.
fn validate(text: &str, max: usize) -> Result<String, ViewError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ViewError::EmptyInput);
    }
    if trimmed.chars().count() > max {
        return Err(ViewError::TooLong { max });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use moments_images::{ImageError, ResolvedImage};
    use moments_types::questions::is_bank_question;
    use moments_types::roster::ROSTER;
    use uuid::Uuid;

    const IMAGE: &str = "data:image/jpeg;base64,/9j/4AAQ";

    struct StubImages {
        fail: bool,
    }

    #[async_trait]
    impl DailyImageSource for StubImages {
        async fn resolve(&self) -> Result<ResolvedImage, ImageError> {
            if self.fail {
                return Err(ImageError::Exhausted);
            }
            Ok(ResolvedImage {
                data_url: IMAGE.to_string(),
                provider: "curated",
                source_url: "https://curated/1.jpg".to_string(),
            })
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    // 2024-06-10 is a Monday, 06-14 a Friday, 06-15 a Saturday
    const MONDAY: u32 = 10;
    const FRIDAY: u32 = 14;
    const SATURDAY: u32 = 15;

    fn user(id: UserId) -> User {
        let p = participant(id);
        User {
            uid: Uuid::new_v4(),
            id,
            username: p.username.to_string(),
            partner_id: p.partner,
            email: p.email.to_string(),
        }
    }

    fn orchestrator(id: UserId, store: &MemoryStore, day: u32) -> Orchestrator {
        orchestrator_with(id, store, Arc::new(FixedClock::at_date(date(day))), false)
    }

    fn orchestrator_with(
        id: UserId,
        store: &MemoryStore,
        clock: Arc<FixedClock>,
        images_fail: bool,
    ) -> Orchestrator {
        Orchestrator::new(
            user(id),
            Arc::new(store.clone()),
            Arc::new(StubImages { fail: images_fail }),
            clock,
        )
    }

    /// Pump live updates until `done` holds.
    async fn pump_until(o: &mut Orchestrator, done: impl Fn(&Orchestrator) -> bool) {
        let wait = async {
            while !done(o) {
                if o.next_update().await.is_none() {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("condition not reached");
        assert!(done(o));
    }

    /// Feed tasks exit on their own after cancellation.
    async fn wait_for_feeds(store: &MemoryStore, expected: usize) {
        let wait = async {
            while store.live_feeds() != expected {
                tokio::task::yield_now().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("feeds not released");
    }

    async fn seed(store: &MemoryStore, day: u32, question_by: Option<UserId>) -> DailyRecord {
        let record = DailyRecord::new(date(day), IMAGE.into(), "Wat was mooi?".into(), question_by);
        store.create(record).await.unwrap()
    }

    #[tokio::test]
    async fn weekday_creates_record_automatically() {
        let store = MemoryStore::new();
        let mut marty = orchestrator(UserId::User1, &store, MONDAY);
        marty.initialize().await;

        assert_eq!(marty.phase(), Phase::Ready);
        let state = marty.state();
        assert!(!state.loading);
        assert!(!state.show_question_choice);
        assert!(!state.waiting_for_partner);
        assert_eq!(state.viewing_date, date(9));

        let record = store.read(date(MONDAY)).await.unwrap().unwrap();
        assert_eq!(record.question_by, None);
        assert!(is_bank_question(&record.question));
        assert_eq!(record.image_url, IMAGE);
        assert!(record.answers.is_empty());
        assert_eq!(marty.today_record(), Some(&record));
    }

    #[tokio::test]
    async fn choice_day_prompts_only_the_chooser() {
        let store = MemoryStore::new();

        let mut marty = orchestrator(UserId::User1, &store, FRIDAY);
        marty.initialize().await;
        assert_eq!(marty.phase(), Phase::AwaitingMyChoice);
        assert!(marty.state().show_question_choice);
        assert!(!marty.state().loading);

        let mut marieke = orchestrator(UserId::User2, &store, FRIDAY);
        marieke.initialize().await;
        assert_eq!(marieke.phase(), Phase::AwaitingPartnerChoice);
        assert!(marieke.state().waiting_for_partner);
        assert!(!marieke.state().show_question_choice);

        assert_eq!(store.read(date(FRIDAY)).await.unwrap(), None);
        assert_eq!(
            marieke.choose_question("Mijn vraag?").await,
            Err(ViewError::NotYourTurn)
        );
    }

    #[tokio::test]
    async fn partner_creation_ends_the_wait() {
        let store = MemoryStore::new();
        let mut marty = orchestrator(UserId::User1, &store, FRIDAY);
        let mut marieke = orchestrator(UserId::User2, &store, FRIDAY);
        marty.initialize().await;
        marieke.initialize().await;

        marty.choose_question("  Wat gaf je vandaag energie?  ").await.unwrap();
        assert_eq!(marty.phase(), Phase::Ready);
        assert!(!marty.state().show_question_choice);

        let record = store.read(date(FRIDAY)).await.unwrap().unwrap();
        assert_eq!(record.question, "Wat gaf je vandaag energie?");
        assert_eq!(record.question_by, Some(UserId::User1));

        pump_until(&mut marieke, |o| !o.state().waiting_for_partner).await;
        assert_eq!(marieke.phase(), Phase::Ready);
        assert_eq!(marieke.today_record(), Some(&record));
    }

    #[tokio::test]
    async fn generated_question_is_attributed_to_the_chooser() {
        let store = MemoryStore::new();
        let mut marieke = orchestrator(UserId::User2, &store, SATURDAY);
        marieke.initialize().await;
        assert_eq!(marieke.phase(), Phase::AwaitingMyChoice);

        marieke.generate_question().await.unwrap();
        let record = marieke.today_record().unwrap();
        assert_eq!(record.question_by, Some(UserId::User2));
        assert!(is_bank_question(&record.question));
        assert!(!marieke.state().show_question_choice);
    }

    #[tokio::test]
    async fn create_conflict_adopts_stored_record() {
        let store = MemoryStore::new();
        let mut marty = orchestrator(UserId::User1, &store, FRIDAY);
        marty.initialize().await;

        let stored = seed(&store, FRIDAY, Some(UserId::User1)).await;
        marty.choose_question("Een andere vraag?").await.unwrap();

        assert_eq!(marty.today_record(), Some(&stored));
        assert_eq!(marty.state().error, None);
        assert!(!marty.state().show_question_choice);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_creation_times_out_and_can_be_retried() {
        let store = MemoryStore::new();
        let mut marty = orchestrator(UserId::User1, &store, FRIDAY);
        marty.initialize().await;

        store.set_create_delay(Some(Duration::from_secs(60)));
        let result = marty.choose_question("Eerste poging?").await;
        assert_eq!(result, Err(ViewError::CreationTimedOut));

        let state = marty.state();
        assert!(!state.loading);
        assert!(!state.creating);
        assert!(state.show_question_choice);
        assert_eq!(state.error, Some(ViewError::CreationTimedOut));
        assert_eq!(marty.phase(), Phase::AwaitingMyChoice);

        store.set_create_delay(None);
        marty.choose_question("Tweede poging?").await.unwrap();
        assert_eq!(marty.today_record().unwrap().question, "Tweede poging?");
        assert!(!marty.state().show_question_choice);
    }

    #[tokio::test]
    async fn exhausted_images_surface_an_error() {
        let store = MemoryStore::new();
        let clock = Arc::new(FixedClock::at_date(date(MONDAY)));
        let mut marty = orchestrator_with(UserId::User1, &store, clock, true);
        marty.initialize().await;

        assert_eq!(marty.phase(), Phase::AutoCreating);
        assert!(!marty.state().loading);
        assert_eq!(marty.state().error, Some(ViewError::ImageUnavailable));
        assert_eq!(store.read(date(MONDAY)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn saving_twice_keeps_one_answer() {
        let store = MemoryStore::new();
        let mut marty = orchestrator(UserId::User1, &store, MONDAY);
        marty.initialize().await;

        marty.set_answer_draft("Peaceful.");
        marty.save_answer().await.unwrap();
        marty.set_answer_draft("Peaceful, truly.");
        marty.save_answer().await.unwrap();

        let record = store.read(date(MONDAY)).await.unwrap().unwrap();
        assert_eq!(record.answers.len(), 1);
        assert_eq!(record.answers[0].answer, "Peaceful, truly.");
        assert!(marty.has_submitted_today());
    }

    #[tokio::test]
    async fn answers_need_a_record_and_text() {
        let store = MemoryStore::new();
        let mut marieke = orchestrator(UserId::User2, &store, FRIDAY);
        marieke.initialize().await;

        marieke.set_answer_draft("Iets moois");
        assert_eq!(marieke.save_answer().await, Err(ViewError::NoRecordForToday));

        let mut marty = orchestrator(UserId::User1, &store, MONDAY);
        marty.initialize().await;
        marty.set_answer_draft("   ");
        assert_eq!(marty.save_answer().await, Err(ViewError::EmptyInput));
        marty.set_answer_draft("x".repeat(ANSWER_MAX_LENGTH + 1));
        assert_eq!(
            marty.save_answer().await,
            Err(ViewError::TooLong { max: ANSWER_MAX_LENGTH })
        );
        assert_eq!(marty.state().error, Some(ViewError::TooLong { max: ANSWER_MAX_LENGTH }));
    }

    #[tokio::test]
    async fn chat_is_only_open_for_yesterday() {
        let store = MemoryStore::new();
        seed(&store, 8, None).await;
        seed(&store, 9, None).await;
        let mut marieke = orchestrator(UserId::User2, &store, MONDAY);
        marieke.initialize().await;
        assert!(marieke.is_viewing_yesterday());

        marieke.toggle_emoji_picker();
        marieke.set_chat_draft("Hi ");
        marieke.select_emoji("🌙");
        marieke.send_chat().await.unwrap();
        assert_eq!(marieke.state().chat_messages.len(), 1);
        assert_eq!(marieke.state().chat_messages[0].message, "Hi 🌙");
        assert!(marieke.state().chat_draft.is_empty());
        assert!(!marieke.state().show_emoji_picker);

        assert!(marieke.navigate(Navigate::Next).await);
        marieke.set_chat_draft("Hallo");
        assert_eq!(marieke.send_chat().await, Err(ViewError::ChatClosed));

        assert!(marieke.select_date(date(8)).await);
        assert_eq!(marieke.send_chat().await, Err(ViewError::ChatClosed));
        assert_eq!(marieke.state().chat_draft, "Hallo");
    }

    #[tokio::test]
    async fn navigation_stays_within_available_dates() {
        let store = MemoryStore::new();
        seed(&store, 7, None).await;
        let mut marty = orchestrator(UserId::User1, &store, MONDAY);
        marty.initialize().await;

        // Yesterday (the 9th) has no record and is not available
        assert_eq!(marty.state().viewing_date, date(9));
        assert!(!marty.navigate(Navigate::Prev).await);
        assert!(marty.navigate(Navigate::Next).await);
        assert_eq!(marty.date_label(), DateLabel::Today);
        assert!(!marty.navigate(Navigate::Next).await);
        assert_eq!(marty.state().viewing_date, date(MONDAY));

        marty.toggle_calendar();
        assert!(!marty.select_date(date(11)).await);
        assert!(marty.state().show_calendar);
        assert!(marty.select_date(date(7)).await);
        assert!(!marty.state().show_calendar);
        assert_eq!(marty.date_label().to_string(), "vrijdag 7 juni");

        // The record for the 7th arrives through the new feed
        pump_until(&mut marty, |o| o.viewed_record().is_some()).await;
        assert_eq!(marty.image_for_view(), Some(IMAGE));
        let cached: Vec<NaiveDate> = marty.state().records.keys().copied().collect();
        assert_eq!(cached, [date(7), date(MONDAY)]);
    }

    #[tokio::test]
    async fn date_change_and_sign_out_release_feeds() {
        let store = MemoryStore::new();
        seed(&store, 7, None).await;
        seed(&store, 9, None).await;
        let mut marty = orchestrator(UserId::User1, &store, MONDAY);
        marty.initialize().await;
        assert_eq!(marty.state().viewing_date, date(9));
        // Viewed record, today's record and the chat of the viewed date
        assert_eq!(store.live_feeds(), 3);

        assert!(marty.navigate(Navigate::Next).await);
        wait_for_feeds(&store, 2).await;

        assert!(marty.select_date(date(7)).await);
        wait_for_feeds(&store, 3).await;

        marty.sign_out();
        wait_for_feeds(&store, 0).await;
    }

    #[tokio::test]
    async fn empty_today_feed_reports_today() {
        let store = MemoryStore::new();
        seed(&store, 9, None).await;
        let mut marty = orchestrator(UserId::User1, &store, SATURDAY);
        marty.initialize().await;
        assert_eq!(marty.phase(), Phase::AwaitingPartnerChoice);
        assert!(marty.select_date(date(9)).await);

        let mut updates = Vec::new();
        for _ in 0..3 {
            let update = tokio::time::timeout(Duration::from_secs(5), marty.next_update())
                .await
                .unwrap()
                .unwrap();
            updates.push(update);
        }
        assert!(updates.contains(&Update::Record(date(SATURDAY))));
        assert!(updates.contains(&Update::Record(date(9))));
    }

    #[tokio::test]
    async fn partner_answer_is_hidden_until_tomorrow() {
        let store = MemoryStore::new();
        seed(&store, 9, None).await;
        store.upsert_answer(date(9), UserId::User1, "Mijn antwoord").await.unwrap();
        store.upsert_answer(date(9), UserId::User2, "Haar antwoord").await.unwrap();

        let mut marty = orchestrator(UserId::User1, &store, MONDAY);
        marty.initialize().await;
        pump_until(&mut marty, |o| o.viewed_record().is_some()).await;
        assert_eq!(marty.date_label(), DateLabel::Yesterday);
        assert_eq!(marty.my_answer(), Some("Mijn antwoord"));
        assert_eq!(marty.partner_answer(), Some("Haar antwoord"));
        assert_eq!(marty.partner().username, ROSTER[1].username);

        store
            .upsert_answer(date(MONDAY), UserId::User2, "Vandaag")
            .await
            .unwrap();
        assert!(marty.navigate(Navigate::Next).await);
        pump_until(&mut marty, |o| {
            o.today_record().is_some_and(|r| r.answers.len() == 1)
        })
        .await;
        assert_eq!(marty.partner_answer(), None);
        assert!(!marty.has_submitted_today());
    }

    #[tokio::test]
    async fn feed_failure_sets_a_lasting_connection_problem() {
        let store = MemoryStore::new();
        store.break_subscriptions(true);
        let mut marty = orchestrator(UserId::User1, &store, MONDAY);
        marty.initialize().await;

        pump_until(&mut marty, |o| o.state().connection_problem).await;
        assert!(matches!(
            marty.state().error,
            Some(ViewError::RealtimeConnectionLost(_))
        ));

        marty.set_answer_draft("Toch opgeslagen");
        marty.save_answer().await.unwrap();
        assert!(marty.state().connection_problem);
        assert_eq!(marty.state().error, None);

        store.break_subscriptions(false);
        marty.initialize().await;
        assert!(!marty.state().connection_problem);
    }

    #[tokio::test]
    async fn clock_rollover_starts_a_new_day() {
        let store = MemoryStore::new();
        let clock = Arc::new(FixedClock::at_date(date(MONDAY)));
        let mut marty = orchestrator_with(UserId::User1, &store, clock.clone(), false);
        marty.initialize().await;
        assert!(!marty.on_clock_tick().await);

        clock.advance(chrono::Duration::days(1));
        assert!(marty.on_clock_tick().await);
        assert_eq!(marty.state().today, date(11));
        assert_eq!(marty.state().viewing_date, date(MONDAY));
        assert!(marty.state().available_dates.contains(&date(MONDAY)));
        assert!(store.read(date(11)).await.unwrap().is_some());
    }

    #[test]
    fn validate_trims_and_bounds() {
        assert_eq!(validate("  hoi ", 10), Ok("hoi".to_string()));
        assert_eq!(validate("", 10), Err(ViewError::EmptyInput));
        assert_eq!(validate("ééé", 3), Ok("ééé".to_string()));
        assert_eq!(validate("éééé", 3), Err(ViewError::TooLong { max: 3 }));
    }
}
