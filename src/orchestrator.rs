//! Conversation orchestrator for Calchat
//!
//! Owns the turn lifecycle: one user input becomes a chain of
//! single-shot generation calls (classify intent, resolve dates or
//! extract fields, produce output) with live status streamed into the
//! transcript's pending entry. At most one turn is in flight at a
//! time; new input while a turn runs is dropped, not queued, and the
//! user can cancel mid-stream at any point.

use crate::calendar::{CalendarEvent, CalendarStore};
use crate::config::AssistantConfig;
use crate::error::Result;
use crate::generator::Generator;
use crate::parser::{self, ParsedEventData};
use crate::prompts;
use crate::recognizer::TextRecognizer;
use crate::transcript::{ImageRef, Transcript, TranscriptEntry};

use chrono::{NaiveDateTime, NaiveTime};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Classified purpose of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Question,
    CreateEvent,
    DeleteEvent,
}

impl Intent {
    /// Scans a raw model reply for an intent digit
    ///
    /// Checks for "1", then "2", then "3"; a reply containing several
    /// digits resolves to the lowest-numbered one. Returns `None` when
    /// no digit is present so the caller can apply its default.
    pub fn from_reply(reply: &str) -> Option<Self> {
        if reply.contains('1') {
            Some(Self::Question)
        } else if reply.contains('2') {
            Some(Self::CreateEvent)
        } else if reply.contains('3') {
            Some(Self::DeleteEvent)
        } else {
            None
        }
    }
}

/// Where the active turn currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    ClassifyingIntent,
    AnsweringQuestion,
    ExtractingCreateFields,
    IdentifyingDeleteTarget,
}

/// How streamed chunks are mirrored into the pending entry
enum StreamEcho {
    /// Chunks accumulate internally only
    Silent,
    /// Pending text is replaced with the accumulated reply
    Replace,
    /// Pending text shows "Analyzing: " plus the accumulated reply
    Analyzing,
}

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Turn state machine driving the calendar conversation
///
/// All methods take `&self`: the orchestrator is shared behind an
/// `Arc` so cancellation can arrive while a turn is awaiting chunks.
/// Locks guard the transcript and turn bookkeeping and are never held
/// across an await.
pub struct Orchestrator {
    generator: Arc<dyn Generator>,
    calendar: Arc<dyn CalendarStore>,
    recognizer: Arc<dyn TextRecognizer>,
    assistant: AssistantConfig,
    transcript: Mutex<Transcript>,
    in_flight: Mutex<Option<CancellationToken>>,
    state: Mutex<TurnState>,
    pending_event: Mutex<Option<ParsedEventData>>,
    delete_candidate: Mutex<Option<String>>,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn Generator>,
        calendar: Arc<dyn CalendarStore>,
        recognizer: Arc<dyn TextRecognizer>,
        assistant: AssistantConfig,
    ) -> Self {
        Self {
            generator,
            calendar,
            recognizer,
            assistant,
            transcript: Mutex::new(Transcript::new()),
            in_flight: Mutex::new(None),
            state: Mutex::new(TurnState::Idle),
            pending_event: Mutex::new(None),
            delete_candidate: Mutex::new(None),
            clock: Box::new(|| chrono::Local::now().naive_local()),
        }
    }

    /// Replaces the wall-clock source, for deterministic tests
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Submits one user turn of free text, optionally with an image
    ///
    /// Returns false without touching the transcript when the input is
    /// empty or another turn is already in flight. Otherwise runs the
    /// full turn to completion (or cancellation) before returning.
    pub async fn submit_text(&self, text: &str, image: Option<ImageRef>) -> bool {
        let trimmed = text.trim().to_string();
        if trimmed.is_empty() && image.is_none() {
            return false;
        }

        let token = match self.try_acquire_turn() {
            Some(token) => token,
            None => {
                tracing::debug!("Turn rejected, generation already in flight");
                return false;
            }
        };

        tracing::info!("Turn started: {:?}", trimmed);
        self.with_transcript(|t| {
            t.push(TranscriptEntry::user(trimmed.clone(), image));
            t.begin_pending("Thinking...");
        });
        self.set_state(TurnState::ClassifyingIntent);

        if let Err(e) = self.run_text_turn(&trimmed, &token).await {
            self.report_turn_error(e);
        }
        self.release_turn();
        true
    }

    /// Submits a scanned image, skipping intent classification
    ///
    /// Image intake always means "create event": recognized text goes
    /// straight through the field-extraction flow and the result is
    /// staged for confirmation like any other draft.
    pub async fn submit_image(&self, image: ImageRef) -> bool {
        let token = match self.try_acquire_turn() {
            Some(token) => token,
            None => {
                tracing::debug!("Image turn rejected, generation already in flight");
                return false;
            }
        };

        tracing::info!("Image turn started: {}", image.display());
        self.with_transcript(|t| {
            t.push(TranscriptEntry::user("", Some(image.clone())));
            t.begin_pending("Scanning document...");
        });
        self.set_state(TurnState::ExtractingCreateFields);

        let recognized = self.recognizer.recognize_text(&image);
        tracing::debug!("Recognized {} bytes of text", recognized.len());
        self.with_transcript(|t| t.update_pending("Interpreting details..."));

        let today = (self.clock)().date();
        let prompt = prompts::image_extraction(&recognized, today);
        if let Err(e) = self.extract_event(&prompt, &token).await {
            self.report_turn_error(e);
        }
        self.release_turn();
        true
    }

    /// Cancels the in-flight turn, if any
    ///
    /// The chunk loop observes the token at its next suspension point;
    /// the pending entry is finalized with a terminal stopped message.
    /// Side effects already committed by earlier steps are kept.
    pub fn cancel(&self) {
        let token = self.lock(&self.in_flight).clone();
        if let Some(token) = token {
            tracing::info!("Generation stopped by user");
            token.cancel();
            self.with_transcript(|t| t.finalize_pending("Generation stopped."));
        }
    }

    /// True while a turn is running
    pub fn is_busy(&self) -> bool {
        self.lock(&self.in_flight).is_some()
    }

    pub fn turn_state(&self) -> TurnState {
        *self.lock(&self.state)
    }

    /// Snapshot of the current transcript entries
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.with_transcript(|t| t.entries().to_vec())
    }

    /// Subscribe to transcript snapshots
    pub fn subscribe(&self) -> watch::Receiver<Vec<TranscriptEntry>> {
        self.with_transcript(|t| t.subscribe())
    }

    /// The event draft awaiting confirmation, if any
    pub fn pending_event(&self) -> Option<ParsedEventData> {
        self.lock(&self.pending_event).clone()
    }

    /// The deletion candidate awaiting confirmation, if any
    pub fn delete_candidate(&self) -> Option<String> {
        self.lock(&self.delete_candidate).clone()
    }

    /// Saves the staged event draft to the calendar
    ///
    /// Returns false when no draft is staged or a turn is in flight;
    /// the running turn owns the pending entry, so confirmations wait
    /// like any other submission. A calendar failure is reported in the
    /// transcript; the draft is consumed either way.
    pub fn confirm_pending_event(&self) -> bool {
        if self.is_busy() {
            tracing::debug!("Confirm rejected, generation in flight");
            return false;
        }
        let data = match self.lock(&self.pending_event).take() {
            Some(data) => data,
            None => return false,
        };

        let end = data.date + chrono::Duration::minutes(self.assistant.event_duration_minutes);
        let event = CalendarEvent::new(&data.title, data.date, end, &data.location, &data.notes);

        match self.calendar.add_event(event) {
            Ok(()) => {
                tracing::info!("Event saved: {} at {}", data.title, data.date);
                self.with_transcript(|t| {
                    t.push(TranscriptEntry::assistant(format!(
                        "Added '{}' to your calendar.",
                        data.title
                    )));
                });
            }
            Err(e) => {
                tracing::error!("Failed to save event: {}", e);
                self.with_transcript(|t| {
                    t.push(TranscriptEntry::system(format!("Error: {}", e)));
                });
            }
        }
        true
    }

    /// Drops the staged event draft without saving
    ///
    /// Rejected while a turn is in flight, like [`Self::confirm_pending_event`].
    pub fn discard_pending_event(&self) -> bool {
        if self.is_busy() {
            tracing::debug!("Discard rejected, generation in flight");
            return false;
        }
        if self.lock(&self.pending_event).take().is_none() {
            return false;
        }
        self.with_transcript(|t| {
            t.push(TranscriptEntry::assistant("Discarded the event draft."));
        });
        true
    }

    /// Deletes the staged deletion candidate from the calendar
    ///
    /// Returns false when no candidate is staged or a turn is in
    /// flight.
    pub fn confirm_delete(&self) -> bool {
        if self.is_busy() {
            tracing::debug!("Confirm rejected, generation in flight");
            return false;
        }
        let title = match self.lock(&self.delete_candidate).take() {
            Some(title) => title,
            None => return false,
        };

        let now = (self.clock)();
        let reply = match self.calendar.delete_event(&title, now) {
            Ok(true) => format!("Deleted '{}'.", title),
            Ok(false) => format!("I couldn't find an upcoming event called '{}'.", title),
            Err(e) => {
                tracing::error!("Failed to delete event: {}", e);
                self.with_transcript(|t| {
                    t.push(TranscriptEntry::system(format!("Error: {}", e)));
                });
                return true;
            }
        };
        self.with_transcript(|t| t.push(TranscriptEntry::assistant(reply)));
        true
    }

    /// Drops the staged deletion candidate
    ///
    /// Rejected while a turn is in flight, like [`Self::confirm_delete`].
    pub fn discard_delete(&self) -> bool {
        if self.is_busy() {
            tracing::debug!("Discard rejected, generation in flight");
            return false;
        }
        if self.lock(&self.delete_candidate).take().is_none() {
            return false;
        }
        self.with_transcript(|t| {
            t.push(TranscriptEntry::assistant("Okay, I won't delete anything."));
        });
        true
    }

    /// Events starting within the configured upcoming window
    pub fn upcoming_events(&self) -> Vec<CalendarEvent> {
        self.calendar
            .upcoming_events((self.clock)(), self.assistant.upcoming_window_days)
    }

    async fn run_text_turn(&self, user_prompt: &str, token: &CancellationToken) -> Result<()> {
        let prompt = prompts::intent_classification(user_prompt);
        let reply = self.run_generation(&prompt, token, StreamEcho::Silent).await?;
        if token.is_cancelled() {
            return Ok(());
        }

        let intent = Intent::from_reply(&reply);
        tracing::debug!("Classified intent: {:?} (raw: {:?})", intent, reply);

        match intent {
            Some(Intent::Question) => {
                self.with_transcript(|t| t.update_pending("Checking schedule..."));
                self.answer_question(user_prompt, token).await
            }
            Some(Intent::CreateEvent) => {
                self.with_transcript(|t| t.update_pending("Preparing to create event..."));
                self.set_state(TurnState::ExtractingCreateFields);
                let today = (self.clock)().date();
                let prompt = prompts::event_extraction(user_prompt, today);
                self.extract_event(&prompt, token).await
            }
            Some(Intent::DeleteEvent) => {
                self.with_transcript(|t| t.update_pending("Finding event to delete..."));
                self.identify_delete_target(user_prompt, token).await
            }
            None => {
                self.with_transcript(|t| t.update_pending("Processing question..."));
                self.answer_question(user_prompt, token).await
            }
        }
    }

    async fn answer_question(&self, user_prompt: &str, token: &CancellationToken) -> Result<()> {
        self.set_state(TurnState::AnsweringQuestion);

        let now = (self.clock)();
        let today = now.date();
        let prompt = prompts::date_range_resolution(user_prompt, today);
        let reply = self.run_generation(&prompt, token, StreamEcho::Silent).await?;
        if token.is_cancelled() {
            return Ok(());
        }

        let dates = parser::parse_date_or_range(&reply);
        tracing::debug!("Resolved dates: {:?}", dates);

        let (start, end) = match dates.as_slice() {
            [day] => {
                self.with_transcript(|t| {
                    t.update_pending(format!(
                        "Checking events on {}...",
                        prompts::format_abbreviated_date(*day)
                    ))
                });
                (*day, *day + chrono::Duration::days(1))
            }
            [first, second] => {
                self.with_transcript(|t| {
                    t.update_pending(format!(
                        "Checking events from {} to {}...",
                        prompts::format_abbreviated_date(*first),
                        prompts::format_abbreviated_date(*second)
                    ))
                });
                (*first, *second)
            }
            _ => {
                self.with_transcript(|t| t.update_pending("Checking today's events..."));
                (today, today + chrono::Duration::days(1))
            }
        };

        let context = self
            .calendar
            .events_summary(start.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN));

        let prompt = prompts::final_answer(&context, user_prompt);
        let answer = self
            .run_generation(&prompt, token, StreamEcho::Replace)
            .await?;
        if token.is_cancelled() {
            return Ok(());
        }

        self.with_transcript(|t| t.finalize_pending(answer));
        Ok(())
    }

    async fn extract_event(&self, prompt: &str, token: &CancellationToken) -> Result<()> {
        let reply = self
            .run_generation(prompt, token, StreamEcho::Analyzing)
            .await?;
        if token.is_cancelled() {
            return Ok(());
        }

        let parsed = parser::parse_event_fields(&reply, (self.clock)());
        tracing::info!("Extracted event draft: {} at {}", parsed.title, parsed.date);
        *self.lock(&self.pending_event) = Some(parsed);

        self.with_transcript(|t| t.finalize_pending("I've opened the event editor for you."));
        Ok(())
    }

    async fn identify_delete_target(
        &self,
        user_prompt: &str,
        token: &CancellationToken,
    ) -> Result<()> {
        self.set_state(TurnState::IdentifyingDeleteTarget);

        let prompt = prompts::deletion_target(user_prompt);
        let reply = self.run_generation(&prompt, token, StreamEcho::Silent).await?;
        if token.is_cancelled() {
            return Ok(());
        }

        let title = reply.trim().to_string();
        tracing::info!("Deletion candidate: {:?}", title);
        *self.lock(&self.delete_candidate) = Some(title.clone());

        self.with_transcript(|t| {
            t.finalize_pending(format!("I'll help you delete '{}'. Please confirm.", title))
        });
        Ok(())
    }

    /// Runs one reset-and-stream generation call to completion
    ///
    /// Accumulates chunks into a single reply, mirroring progress into
    /// the pending entry per `echo`. When the turn token fires the
    /// underlying handle is cancelled and the partial reply returned;
    /// callers check the token before using it.
    async fn run_generation(
        &self,
        prompt: &str,
        token: &CancellationToken,
        echo: StreamEcho,
    ) -> Result<String> {
        if token.is_cancelled() {
            return Ok(String::new());
        }
        self.generator.reset().await?;
        let mut handle = self.generator.stream_prompt(prompt).await?;
        let mut full = String::new();

        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => {
                    handle.cancel();
                    return Ok(full);
                }
                chunk = handle.next_chunk() => chunk,
            };

            match chunk {
                Some(Ok(text)) => {
                    full.push_str(&text);
                    match echo {
                        StreamEcho::Silent => {}
                        StreamEcho::Replace => {
                            self.with_transcript(|t| t.update_pending(full.clone()))
                        }
                        StreamEcho::Analyzing => self.with_transcript(|t| {
                            t.update_pending(format!("Analyzing: {}", full))
                        }),
                    }
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }
        Ok(full)
    }

    fn try_acquire_turn(&self) -> Option<CancellationToken> {
        let mut slot = self.lock(&self.in_flight);
        if slot.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Some(token)
    }

    fn release_turn(&self) {
        *self.lock(&self.in_flight) = None;
        self.set_state(TurnState::Idle);
    }

    fn report_turn_error(&self, error: anyhow::Error) {
        tracing::error!("Turn failed: {}", error);
        self.with_transcript(|t| {
            t.drop_pending();
            t.push(TranscriptEntry::system(format!("Error: {}", error)));
        });
    }

    fn set_state(&self, state: TurnState) {
        *self.lock(&self.state) = state;
    }

    fn with_transcript<R>(&self, f: impl FnOnce(&mut Transcript) -> R) -> R {
        let mut guard = self.lock(&self.transcript);
        f(&mut guard)
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        // Locks are only held for short, non-awaiting sections; a
        // poisoned guard still holds structurally valid data.
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MemoryCalendar;
    use crate::generator::ScriptedGenerator;
    use crate::recognizer::StaticRecognizer;
    use crate::transcript::Role;
    use chrono::NaiveDate;

    fn monday_morning() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn orchestrator_with(replies: Vec<&str>) -> Orchestrator {
        Orchestrator::new(
            Arc::new(ScriptedGenerator::new(replies)),
            Arc::new(MemoryCalendar::new()),
            Arc::new(StaticRecognizer::new("")),
            AssistantConfig::default(),
        )
        .with_clock(monday_morning)
    }

    #[test]
    fn test_intent_from_reply() {
        assert_eq!(Intent::from_reply("2"), Some(Intent::CreateEvent));
        assert_eq!(Intent::from_reply("3"), Some(Intent::DeleteEvent));
        assert_eq!(Intent::from_reply("The answer is 3."), Some(Intent::DeleteEvent));
        // Lowest digit wins when several appear
        assert_eq!(Intent::from_reply("1 or 2"), Some(Intent::Question));
        assert_eq!(Intent::from_reply("maybe 3, maybe 2"), Some(Intent::CreateEvent));
        assert_eq!(Intent::from_reply("no digit here"), None);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let orch = orchestrator_with(vec![]);
        assert!(!orch.submit_text("   ", None).await);
        assert!(orch.entries().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_generation_call() {
        let generator = Arc::new(ScriptedGenerator::new(vec!["never streamed"]));
        let orch = Orchestrator::new(
            generator.clone(),
            Arc::new(MemoryCalendar::new()),
            Arc::new(StaticRecognizer::new("")),
            AssistantConfig::default(),
        )
        .with_clock(monday_morning);

        let token = CancellationToken::new();
        token.cancel();

        // No model call once the turn is cancelled, not even an
        // immediately abandoned one
        let reply = orch
            .run_generation("classify this", &token, StreamEcho::Silent)
            .await
            .unwrap();
        assert_eq!(reply, "");
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_question_turn() {
        let orch = orchestrator_with(vec![
            "1",
            "2025-06-02",
            "You have nothing scheduled today.",
        ]);

        assert!(orch.submit_text("am I free today?", None).await);

        let entries = orch.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].text, "You have nothing scheduled today.");
        assert!(!entries[1].is_pending);
        assert!(!orch.is_busy());
        assert_eq!(orch.turn_state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn test_unparsable_intent_defaults_to_question() {
        let orch = orchestrator_with(vec![
            "I cannot classify that.",
            "no dates either",
            "Nothing on your calendar today.",
        ]);

        assert!(orch.submit_text("hmm", None).await);
        let entries = orch.entries();
        assert_eq!(entries[1].text, "Nothing on your calendar today.");
    }

    #[tokio::test]
    async fn test_creation_turn_stages_draft() {
        let orch = orchestrator_with(vec![
            "2",
            "Title: Dentist\nDate: 2025-06-10 09:00\nLocation: Clinic\nDescription: Checkup",
        ]);

        assert!(orch.submit_text("book the dentist", None).await);

        let draft = orch.pending_event().unwrap();
        assert_eq!(draft.title, "Dentist");
        assert_eq!(
            draft.date,
            NaiveDate::from_ymd_opt(2025, 6, 10)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
        );

        let entries = orch.entries();
        assert_eq!(entries[1].text, "I've opened the event editor for you.");
        // Nothing saved until confirmation
        assert!(orch.upcoming_events().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_pending_event_saves() {
        let orch = orchestrator_with(vec![
            "2",
            "Title: Dentist\nDate: 2025-06-10 09:00\nLocation: None\nDescription: None",
        ]);
        orch.submit_text("book the dentist", None).await;

        assert!(orch.confirm_pending_event());
        assert!(orch.pending_event().is_none());

        let upcoming = orch.upcoming_events();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].title, "Dentist");
        // Default one-hour duration
        assert_eq!(
            upcoming[0].end - upcoming[0].start,
            chrono::Duration::minutes(60)
        );

        assert!(!orch.confirm_pending_event());
    }

    #[tokio::test]
    async fn test_deletion_turn_trims_candidate() {
        let orch = orchestrator_with(vec!["3", "  Team Sync  "]);

        assert!(orch.submit_text("cancel the team sync", None).await);

        assert_eq!(orch.delete_candidate().as_deref(), Some("Team Sync"));
        let entries = orch.entries();
        assert_eq!(
            entries[1].text,
            "I'll help you delete 'Team Sync'. Please confirm."
        );
    }

    #[tokio::test]
    async fn test_discard_delete() {
        let orch = orchestrator_with(vec!["3", "Standup"]);
        orch.submit_text("remove standup", None).await;

        assert!(orch.discard_delete());
        assert!(orch.delete_candidate().is_none());
        assert!(!orch.discard_delete());
    }

    #[tokio::test]
    async fn test_generation_failure_posts_system_entry() {
        let generator = ScriptedGenerator::new(vec![]);
        generator.enqueue_failure(vec![], "model exploded");
        let orch = Orchestrator::new(
            Arc::new(generator),
            Arc::new(MemoryCalendar::new()),
            Arc::new(StaticRecognizer::new("")),
            AssistantConfig::default(),
        )
        .with_clock(monday_morning);

        assert!(orch.submit_text("anything", None).await);

        let entries = orch.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].role, Role::System);
        assert!(entries[1].text.contains("model exploded"));
        // A failed turn must release the slot
        assert!(!orch.is_busy());
    }

    #[tokio::test]
    async fn test_image_turn_uses_recognized_text() {
        let generator = ScriptedGenerator::new(vec![
            "Title: Concert\nDate: 2025-06-15 19:00\nLocation: Arena\nDescription: None",
        ]);
        let orch = Orchestrator::new(
            Arc::new(generator),
            Arc::new(MemoryCalendar::new()),
            Arc::new(StaticRecognizer::new("CONCERT\nJune 15 7pm\nArena")),
            AssistantConfig::default(),
        )
        .with_clock(monday_morning);

        assert!(orch.submit_image("poster.png".into()).await);

        let draft = orch.pending_event().unwrap();
        assert_eq!(draft.title, "Concert");

        let entries = orch.entries();
        assert_eq!(entries[0].role, Role::User);
        assert!(entries[0].attached_image.is_some());
        assert_eq!(entries[1].text, "I've opened the event editor for you.");
    }
}
