//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use futures::stream;

use mico_assistant::db::{ReminderRepo, UserRepo};
use mico_assistant::local::LocalTools;
use mico_assistant::nlu::{Classify, RouteDecision, TaskCommand, TaskContext};
use mico_assistant::oracle::{ChatMessage, Oracle, SamplingOptions, TextStream};
use mico_assistant::respond::ResponseGenerator;
use mico_assistant::search::{SearchBackend, SearchResult};
use mico_assistant::tasks::TaskExecutor;
use mico_assistant::voice::Speaker;
use mico_assistant::{DbPool, Error, Orchestrator, Result, db};

/// Users every test database starts with
pub const USERS: &[&str] = &["Patrick", "Surya", "Mohamed"];

/// Fixed "today" for tests: a Monday
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

/// Fixed wall clock for tests: 9:05 PM on [`today`]
pub fn now() -> NaiveDateTime {
    today().and_hms_opt(21, 5, 0).unwrap()
}

/// Set up an in-memory test database with the default users
#[must_use]
pub fn setup_test_db() -> DbPool {
    let pool = db::init_memory().expect("failed to init test db");
    UserRepo::new(pool.clone())
        .seed(USERS)
        .expect("failed to seed users");
    pool
}

/// Reminder repository pinned to [`today`]
pub fn reminders(pool: &DbPool) -> ReminderRepo {
    ReminderRepo::new(pool.clone()).with_clock(today)
}

/// Orchestrator over the given collaborators, pinned to [`now`]
pub fn orchestrator(
    pool: &DbPool,
    classifier: Arc<dyn Classify>,
    oracle: Arc<dyn Oracle>,
) -> Orchestrator {
    build_orchestrator(pool, classifier, ResponseGenerator::new(oracle, "Mico"))
}

/// Like [`orchestrator`], but answers are spoken sentence by sentence
pub fn streaming_orchestrator(
    pool: &DbPool,
    classifier: Arc<dyn Classify>,
    oracle: Arc<dyn Oracle>,
) -> Orchestrator {
    build_orchestrator(
        pool,
        classifier,
        ResponseGenerator::new(oracle, "Mico").with_stream_speech(true),
    )
}

fn build_orchestrator(
    pool: &DbPool,
    classifier: Arc<dyn Classify>,
    responder: ResponseGenerator,
) -> Orchestrator {
    let users = UserRepo::new(pool.clone());
    Orchestrator::new(
        LocalTools::with_defaults().unwrap(),
        classifier,
        TaskExecutor::new(users.clone(), reminders(pool)),
        responder,
        users,
    )
    .with_default_user("Patrick")
    .with_clock(now)
}

/// Oracle that replays scripted replies and records what it was asked
///
/// A `None` entry fails that call; an exhausted script fails every call.
#[derive(Default)]
pub struct FakeOracle {
    generate_replies: Mutex<VecDeque<Option<String>>>,
    chat_replies: Mutex<VecDeque<Option<String>>>,
    stream: Mutex<Option<Vec<Option<String>>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_generate(self, reply: &str) -> Self {
        self.generate_replies
            .lock()
            .unwrap()
            .push_back(Some(reply.to_string()));
        self
    }

    pub fn on_chat(self, reply: &str) -> Self {
        self.chat_replies
            .lock()
            .unwrap()
            .push_back(Some(reply.to_string()));
        self
    }

    /// Stream these deltas from `chat_stream`; a `None` breaks the stream
    pub fn on_stream(self, deltas: &[Option<&str>]) -> Self {
        *self.stream.lock().unwrap() = Some(
            deltas
                .iter()
                .map(|d| d.map(ToString::to_string))
                .collect(),
        );
        self
    }

    pub fn failing_chat(self) -> Self {
        self.chat_replies.lock().unwrap().push_back(None);
        self
    }

    /// Every prompt or final chat message seen, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(queue: &Mutex<VecDeque<Option<String>>>) -> Result<String> {
        match queue.lock().unwrap().pop_front() {
            Some(Some(reply)) => Ok(reply),
            Some(None) => Err(Error::Oracle("scripted failure".into())),
            None => Err(Error::OracleUnavailable("script exhausted".into())),
        }
    }
}

#[async_trait]
impl Oracle for FakeOracle {
    async fn generate(&self, prompt: &str, _options: SamplingOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Self::next(&self.generate_replies)
    }

    async fn chat(&self, messages: &[ChatMessage], _options: SamplingOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(last) = messages.last() {
            self.prompts.lock().unwrap().push(last.content.clone());
        }
        Self::next(&self.chat_replies)
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: SamplingOptions,
    ) -> Result<TextStream> {
        let scripted = self.stream.lock().unwrap().take();
        let Some(deltas) = scripted else {
            let text = self.chat(messages, options).await?;
            return Ok(Box::pin(stream::once(async move { Ok(text) })));
        };

        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(last) = messages.last() {
            self.prompts.lock().unwrap().push(last.content.clone());
        }

        let items: Vec<Result<String>> = deltas
            .into_iter()
            .map(|d| d.ok_or_else(|| Error::Oracle("stream interrupted".into())))
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }

    fn model(&self) -> &str {
        "fake"
    }
}

/// Classifier returning fixed decisions and counting calls
pub struct FakeClassifier {
    pub identity: Option<String>,
    pub task: Option<TaskCommand>,
    pub route: RouteDecision,
    pub calls: AtomicUsize,
}

impl Default for FakeClassifier {
    fn default() -> Self {
        Self {
            identity: None,
            task: None,
            route: RouteDecision::Chat,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeClassifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classify for FakeClassifier {
    async fn identify_user(&self, _utterance: &str, _known_users: &[String]) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.identity.clone()
    }

    async fn classify_task(&self, _utterance: &str, _ctx: &TaskContext<'_>) -> Option<TaskCommand> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.task.clone()
    }

    async fn route(&self, _utterance: &str, _history: &[ChatMessage]) -> RouteDecision {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.route.clone()
    }
}

/// Search backend with canned results; `None` fails every query
pub struct FakeSearch {
    results: Option<Vec<SearchResult>>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn with_results(results: Vec<SearchResult>) -> Self {
        Self {
            results: Some(results),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            results: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for FakeSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        self.results
            .as_ref()
            .map(|r| r.iter().take(limit).cloned().collect())
            .ok_or_else(|| Error::Search("scripted failure".into()))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Speaker that remembers everything it was asked to say
#[derive(Default)]
pub struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeaker {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.spoken.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
