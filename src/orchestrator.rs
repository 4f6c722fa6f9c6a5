//! Dialogue orchestration
//!
//! One call to [`Orchestrator::process_command`] handles one spoken turn.
//! The cascade decides first and acts second: [`Orchestrator::route_turn`]
//! produces a [`ClassifierResult`] and a single match carries it out. Local
//! checks come before any oracle call, so exit phrases and clock questions
//! never wait on the network.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::Result;
use crate::db::UserRepo;
use crate::events::{AssistantEvent, EventBus};
use crate::local::{LocalOutcome, LocalTools};
use crate::nlu::{Classify, ClassifierResult, RouteDecision, TaskCommand, TaskContext};
use crate::prompt::search_prompt;
use crate::respond::{ANSWER_FALLBACK, ResponseGenerator, say};
use crate::search::{CONTEXT_RESULTS, SearchBackend, format_context};
use crate::session::{DialogueState, Session};
use crate::tasks::{TaskExecution, TaskExecutor};
use crate::voice::Speaker;

/// Asked once per activation while the speaker is unknown
pub const IDENTITY_PROMPT: &str = "Hello. Who is speaking?";

/// Spoken when a search fails or finds nothing
pub const SEARCH_FAILURE_REPLY: &str = "Sorry, I had a problem searching the web.";

/// Whether the conversation goes on after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnResult {
    Exit,
    Continue,
}

/// Result of one turn, with the speaker as now known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub result: TurnResult,
    pub user: Option<String>,
}

/// Runs the per-turn cascade over injected collaborators
pub struct Orchestrator {
    local: LocalTools,
    classifier: Arc<dyn Classify>,
    executor: TaskExecutor,
    responder: ResponseGenerator,
    search: Option<Arc<dyn SearchBackend>>,
    users: UserRepo,
    events: EventBus,
    default_user: String,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        local: LocalTools,
        classifier: Arc<dyn Classify>,
        executor: TaskExecutor,
        responder: ResponseGenerator,
        users: UserRepo,
    ) -> Self {
        Self {
            local,
            classifier,
            executor,
            responder,
            search: None,
            users,
            events: EventBus::default(),
            default_user: String::new(),
            clock: local_now,
        }
    }

    /// Enable web search; without it search requests are answered as chat
    #[must_use]
    pub fn with_search(mut self, search: Arc<dyn SearchBackend>) -> Self {
        self.search = Some(search);
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// User that task commands apply to while nobody is identified
    #[must_use]
    pub fn with_default_user(mut self, name: impl Into<String>) -> Self {
        self.default_user = name.into();
        self
    }

    #[must_use]
    pub const fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Begin a new activation after the wake word
    pub fn activate(&self, session: &mut Session, now: Instant) {
        session.activate(now);
        tracing::info!("session activated");
        self.publish_state(session);
    }

    /// End the session if it sat idle past the follow-up timeout
    ///
    /// Returns true when the session was ended.
    pub fn expire_if_idle(&self, session: &mut Session, now: Instant) -> bool {
        if !session.is_expired(now) {
            return false;
        }

        tracing::info!(
            timeout_secs = session.follow_up_timeout().as_secs(),
            "follow-up timeout, returning to wake word"
        );
        session.end();
        self.publish_state(session);
        true
    }

    /// Ask who is speaking, once per activation
    ///
    /// Returns true when the question was spoken.
    pub async fn prompt_identity(&self, session: &mut Session, speaker: &dyn Speaker) -> bool {
        if !session.is_active() || session.current_user().is_some() {
            return false;
        }
        if !session.take_identity_prompt() {
            return false;
        }

        self.speak(speaker, IDENTITY_PROMPT).await;
        session.touch(Instant::now());
        true
    }

    /// Handle one utterance within an active session
    pub async fn process_command(
        &self,
        session: &mut Session,
        utterance: &str,
        speaker: &dyn Speaker,
    ) -> TurnOutcome {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Self::outcome(session, TurnResult::Continue);
        }

        tracing::info!(utterance, user = session.current_user(), "processing command");

        let decision = self.route_turn(session, utterance).await;
        tracing::debug!(?decision, "turn decision");

        let result = self.act(session, utterance, decision, speaker).await;

        if result == TurnResult::Continue {
            session.touch(Instant::now());
        }

        Self::outcome(session, result)
    }

    /// Decide what to do with an utterance
    ///
    /// Order: exit phrase, local clock, identity (only while the speaker is
    /// unknown), task, then search-or-chat routing.
    pub async fn route_turn(&self, session: &Session, utterance: &str) -> ClassifierResult {
        if let Some(LocalOutcome::Exit(reply)) = self.local.check_exit(utterance) {
            return ClassifierResult::Exit(reply);
        }

        let now = (self.clock)();
        if let Some(LocalOutcome::Answered(reply)) = self.local.check_clock(utterance, now) {
            return ClassifierResult::LocalHandled(reply);
        }

        let known_users = self.known_users();

        if session.current_user().is_none() {
            match self.classifier.identify_user(utterance, &known_users).await {
                Some(name) => return ClassifierResult::Identified(name),
                None => tracing::debug!("speaker not recognised, treating as a general command"),
            }
        }

        let active_user = session
            .current_user()
            .unwrap_or(self.default_user.as_str());
        let ctx = TaskContext {
            known_users: &known_users,
            active_user,
            today: now.date(),
        };

        if let Some(command) = self.classifier.classify_task(utterance, &ctx).await {
            return ClassifierResult::Task(command);
        }

        match self
            .classifier
            .route(utterance, &session.history().messages())
            .await
        {
            RouteDecision::Search { query } => ClassifierResult::Search(query),
            RouteDecision::Chat => ClassifierResult::Chat,
        }
    }

    async fn act(
        &self,
        session: &mut Session,
        utterance: &str,
        decision: ClassifierResult,
        speaker: &dyn Speaker,
    ) -> TurnResult {
        match decision {
            ClassifierResult::Exit(reply) => {
                self.speak(speaker, &reply).await;
                session.end();
                self.publish_state(session);
                return TurnResult::Exit;
            }
            ClassifierResult::LocalHandled(reply) => {
                self.speak(speaker, &reply).await;
            }
            ClassifierResult::Identified(name) => {
                tracing::info!(user = %name, "speaker identified");
                session.set_user(name.clone());
                self.events
                    .publish(AssistantEvent::UserIdentified { name: name.clone() });
                self.publish_state(session);
                self.speak(speaker, &format!("Got it. Hi {name}. How can I help you?"))
                    .await;
            }
            ClassifierResult::Task(command) => {
                self.handle_task(&command, speaker).await;
            }
            ClassifierResult::Search(query) => {
                self.handle_search(session, utterance, &query, speaker).await;
            }
            ClassifierResult::Chat => {
                self.answer(session, utterance, utterance, speaker).await;
            }
        }

        TurnResult::Continue
    }

    async fn handle_task(&self, command: &TaskCommand, speaker: &dyn Speaker) {
        let outcome = match self.executor.execute(command) {
            TaskExecution::Direct(reply) => {
                self.speak(speaker, &reply).await;
                return;
            }
            TaskExecution::Outcome(outcome) => outcome,
        };

        let today = (self.clock)().date();
        let reply = self.responder.task_response(&outcome, today).await;

        if let Some(report) = reply.report {
            tracing::info!(intent = %outcome.intent, report = %report, "task report");
            self.events.publish(AssistantEvent::TaskReport {
                intent: outcome.intent,
                report,
            });
        }

        match self.executor.pending(outcome.user_id) {
            Ok(reminders) => self.events.publish(AssistantEvent::TasksChanged {
                user: outcome.user.clone(),
                reminders,
            }),
            Err(e) => tracing::warn!(error = %e, user = %outcome.user, "could not refresh task list"),
        }

        self.speak(speaker, &reply.speech).await;
    }

    async fn handle_search(
        &self,
        session: &mut Session,
        utterance: &str,
        query: &str,
        speaker: &dyn Speaker,
    ) {
        let Some(search) = &self.search else {
            tracing::info!(query, "no search provider configured, answering from chat");
            self.answer(session, utterance, utterance, speaker).await;
            return;
        };

        tracing::info!(query, provider = search.name(), "searching the web");

        let context = match search.search(query, CONTEXT_RESULTS).await {
            Ok(results) => format_context(&results),
            Err(e) => {
                tracing::warn!(error = %e, query, "web search failed");
                None
            }
        };

        let Some(context) = context else {
            self.speak(speaker, SEARCH_FAILURE_REPLY).await;
            return;
        };

        let prompt = search_prompt(&context, session.current_user(), utterance);
        self.answer(session, utterance, &prompt, speaker).await;
    }

    /// Generate and speak an answer, recording the raw utterance in history
    async fn answer(
        &self,
        session: &mut Session,
        utterance: &str,
        prompt: &str,
        speaker: &dyn Speaker,
    ) {
        let messages = self.responder.chat_messages(
            session.current_user(),
            &session.history().messages(),
            prompt,
        );

        let announcing = Announcing {
            inner: speaker,
            events: &self.events,
        };

        let Some(reply) = self.responder.converse(&messages, &announcing).await else {
            self.speak(speaker, ANSWER_FALLBACK).await;
            return;
        };

        if !reply.spoken {
            self.speak(speaker, &reply.text).await;
        }

        session.history_mut().push_exchange(utterance, &reply.text);
    }

    fn known_users(&self) -> Vec<String> {
        self.users.list_names().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not load known users");
            Vec::new()
        })
    }

    async fn speak(&self, speaker: &dyn Speaker, text: &str) {
        let announcing = Announcing {
            inner: speaker,
            events: &self.events,
        };
        say(&announcing, text).await;
    }

    fn publish_state(&self, session: &Session) {
        let state: DialogueState = session.state();
        tracing::debug!(?state, "dialogue state");
        self.events.publish(AssistantEvent::StateChanged { state });
    }

    fn outcome(session: &Session, result: TurnResult) -> TurnOutcome {
        TurnOutcome {
            result,
            user: session.current_user().map(str::to_string),
        }
    }
}

/// Publishes a [`AssistantEvent::Speaking`] event before each utterance
struct Announcing<'a> {
    inner: &'a dyn Speaker,
    events: &'a EventBus,
}

#[async_trait]
impl Speaker for Announcing<'_> {
    async fn speak(&self, text: &str) -> Result<()> {
        self.events.publish(AssistantEvent::Speaking {
            text: text.to_string(),
        });
        self.inner.speak(text).await
    }
}
