//! Turn cascade integration tests
//!
//! Every collaborator is faked: no network, no audio.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mico_assistant::daemon::{Listening, listen_step};
use mico_assistant::db::UserRepo;
use mico_assistant::events::AssistantEvent;
use mico_assistant::local::EXIT_REPLY;
use mico_assistant::nlu::{OracleClassifier, RouteDecision, TaskAction, TaskCommand};
use mico_assistant::oracle::{Oracle, UnavailableOracle};
use mico_assistant::orchestrator::{IDENTITY_PROMPT, SEARCH_FAILURE_REPLY};
use mico_assistant::respond::ANSWER_FALLBACK;
use mico_assistant::search::SearchResult;
use mico_assistant::session::{DialogueState, HISTORY_LIMIT};
use mico_assistant::voice::{CommandRecorder, RecorderSettings, RecordingStatus, SAMPLE_RATE};
use mico_assistant::{Session, TurnResult};

mod common;

use common::{
    FakeClassifier, FakeOracle, FakeSearch, RecordingSpeaker, orchestrator, reminders,
    streaming_orchestrator,
};

fn active_session(user: Option<&str>) -> Session {
    let mut session = Session::new(Duration::from_secs(8));
    session.activate(Instant::now());
    if let Some(user) = user {
        session.set_user(user);
    }
    session
}

fn task(user: &str, action: TaskAction) -> Option<TaskCommand> {
    Some(TaskCommand {
        user: user.to_string(),
        action,
    })
}

#[tokio::test]
async fn test_exit_phrase_makes_no_remote_call() {
    let pool = common::setup_test_db();
    let classifier = Arc::new(FakeClassifier::default());
    let oracle = Arc::new(FakeOracle::new());
    let orchestrator = orchestrator(&pool, classifier.clone(), oracle.clone());
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Surya"));

    let outcome = orchestrator
        .process_command(&mut session, "Okay, thanks. That'll be all!", &speaker)
        .await;

    assert_eq!(outcome.result, TurnResult::Exit);
    assert_eq!(outcome.user, None);
    assert_eq!(speaker.spoken(), vec![EXIT_REPLY]);
    assert_eq!(classifier.calls(), 0);
    assert_eq!(oracle.calls(), 0);
    assert_eq!(session.state(), DialogueState::WakeListening);
}

#[tokio::test]
async fn test_clock_question_answered_before_identity() {
    let pool = common::setup_test_db();
    let classifier = Arc::new(FakeClassifier::default());
    let orchestrator = orchestrator(&pool, classifier.clone(), Arc::new(FakeOracle::new()));
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(None);

    let outcome = orchestrator
        .process_command(&mut session, "What time is it?", &speaker)
        .await;

    assert_eq!(outcome.result, TurnResult::Continue);
    assert_eq!(
        speaker.last().as_deref(),
        Some("Oh sure! It's currently 9:05 PM over here.")
    );
    assert_eq!(classifier.calls(), 0);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_unavailable_oracle_still_speaks() {
    let pool = common::setup_test_db();
    let oracle: Arc<dyn Oracle> = Arc::new(UnavailableOracle::new("not configured"));
    let classifier = Arc::new(OracleClassifier::new(Arc::clone(&oracle)));
    let orchestrator = orchestrator(&pool, classifier, oracle);
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(None);

    let outcome = orchestrator
        .process_command(&mut session, "tell me something about volcanoes", &speaker)
        .await;

    assert_eq!(outcome.result, TurnResult::Continue);
    assert_eq!(outcome.user, None);
    assert_eq!(speaker.spoken(), vec![ANSWER_FALLBACK]);
    assert!(session.is_active());
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_identification_greets_and_publishes() {
    let pool = common::setup_test_db();
    let classifier = Arc::new(FakeClassifier {
        identity: Some("Surya".into()),
        ..FakeClassifier::default()
    });
    let orchestrator = orchestrator(&pool, classifier, Arc::new(FakeOracle::new()));
    let mut events = orchestrator.events().subscribe();
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(None);

    let outcome = orchestrator
        .process_command(&mut session, "it's surya", &speaker)
        .await;

    assert_eq!(outcome.user.as_deref(), Some("Surya"));
    assert_eq!(session.state(), DialogueState::Conversing);
    assert_eq!(
        speaker.spoken(),
        vec!["Got it. Hi Surya. How can I help you?"]
    );
    assert_eq!(
        events.recv().await.unwrap(),
        AssistantEvent::UserIdentified {
            name: "Surya".into()
        }
    );
}

#[tokio::test]
async fn test_identity_only_asked_while_unknown() {
    let pool = common::setup_test_db();
    let classifier = Arc::new(FakeClassifier::default());
    let orchestrator = orchestrator(
        &pool,
        classifier.clone(),
        Arc::new(FakeOracle::new().on_chat("Sure.")),
    );
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Patrick"));

    orchestrator
        .process_command(&mut session, "how are you", &speaker)
        .await;

    // task + route, no identity call
    assert_eq!(classifier.calls(), 2);
}

#[tokio::test]
async fn test_add_task_resolves_tomorrow() {
    let pool = common::setup_test_db();
    let oracle = Arc::new(
        FakeOracle::new()
            .on_generate(
                r#"{"intent": "ADD_TASK", "user_name": "Mohamed", "task_description": "order parts", "due_date": "tomorrow", "keywords": null}"#,
            )
            .on_generate(
                "```json\n{\"structured_text\": \"ACTION: ADDED TASK\\nTask: order parts\\nDue: 2026-10-20\", \
                 \"conversational_speech\": \"Done! I've added order parts for October 20th, 2026.\"}\n```",
            ),
    );
    let classifier = Arc::new(OracleClassifier::new(oracle.clone()));
    let orchestrator = orchestrator(&pool, classifier, oracle.clone());
    let mut events = orchestrator.events().subscribe();
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Mohamed"));

    orchestrator
        .process_command(&mut session, "remind me to order parts tomorrow", &speaker)
        .await;

    let mohamed = UserRepo::new(pool.clone())
        .get_user_id("Mohamed")
        .unwrap()
        .unwrap();
    let stored = reminders(&pool).list_reminders(mohamed).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].task, "order parts");
    assert_eq!(stored[0].due_date.as_deref(), Some("2026-10-20"));

    // The reply prompt carries the resolved date
    let prompts = oracle.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains(r#""due_date":"2026-10-20""#));

    let spoken = speaker.last().unwrap();
    assert!(spoken.contains("October 20th, 2026"));
    assert!(!spoken.contains("tomorrow"));

    // Task turns stay out of chat history
    assert!(session.history().is_empty());

    assert!(matches!(
        events.recv().await.unwrap(),
        AssistantEvent::TaskReport { report, .. } if report.starts_with("ACTION: ADDED TASK")
    ));
}

#[tokio::test]
async fn test_empty_list_is_caught_up_without_oracle() {
    let pool = common::setup_test_db();
    let classifier = Arc::new(FakeClassifier {
        task: task("Patrick", TaskAction::List),
        ..FakeClassifier::default()
    });
    let oracle = Arc::new(FakeOracle::new());
    let orchestrator = orchestrator(&pool, classifier, oracle.clone());
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Patrick"));

    orchestrator
        .process_command(&mut session, "what are my tasks", &speaker)
        .await;

    assert_eq!(
        speaker.spoken(),
        vec!["You're all caught up, Patrick! There's nothing on your list right now."]
    );
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn test_unknown_keyword_changes_nothing() {
    let pool = common::setup_test_db();
    let store = reminders(&pool);
    let surya = UserRepo::new(pool.clone())
        .get_user_id("Surya")
        .unwrap()
        .unwrap();
    store
        .add_reminder(surya, "Test the camera integration", Some("2026-11-01"))
        .unwrap();

    let classifier = Arc::new(FakeClassifier {
        task: task(
            "Surya",
            TaskAction::Complete {
                keyword: Some("%dentist%".into()),
            },
        ),
        ..FakeClassifier::default()
    });
    let oracle = Arc::new(FakeOracle::new());
    let orchestrator = orchestrator(&pool, classifier, oracle.clone());
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Surya"));

    orchestrator
        .process_command(&mut session, "I went to the dentist", &speaker)
        .await;

    let spoken = speaker.last().unwrap();
    assert!(spoken.contains("couldn't find a task matching dentist"));
    assert_eq!(oracle.calls(), 0);

    let pending = store.list_reminders(surya).unwrap();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].completed);
}

#[tokio::test]
async fn test_unknown_user_task_is_apologised() {
    let pool = common::setup_test_db();
    let classifier = Arc::new(FakeClassifier {
        task: task("Gerald", TaskAction::List),
        ..FakeClassifier::default()
    });
    let orchestrator = orchestrator(&pool, classifier, Arc::new(FakeOracle::new()));
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Patrick"));

    orchestrator
        .process_command(&mut session, "what's on gerald's list", &speaker)
        .await;

    assert!(
        speaker
            .last()
            .unwrap()
            .contains("can't seem to find a user named Gerald")
    );
}

#[tokio::test]
async fn test_history_keeps_last_five_exchanges() {
    let pool = common::setup_test_db();
    let mut oracle = FakeOracle::new();
    for i in 0..7 {
        oracle = oracle.on_chat(&format!("answer {i}"));
    }
    let orchestrator = orchestrator(
        &pool,
        Arc::new(FakeClassifier::default()),
        Arc::new(oracle),
    );
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Patrick"));

    for i in 0..7 {
        orchestrator
            .process_command(&mut session, &format!("question {i}"), &speaker)
            .await;
    }

    let history = session.history().messages();
    assert_eq!(history.len(), HISTORY_LIMIT);
    assert_eq!(history[0].content, "question 2");
    assert_eq!(history[9].content, "answer 6");
    assert_eq!(speaker.last().as_deref(), Some("answer 6"));
}

#[tokio::test]
async fn test_search_without_provider_answers_as_chat() {
    let pool = common::setup_test_db();
    let classifier = Arc::new(FakeClassifier {
        route: RouteDecision::Search {
            query: "weather toronto".into(),
        },
        ..FakeClassifier::default()
    });
    let oracle = Arc::new(FakeOracle::new().on_chat("Probably chilly."));
    let orchestrator = orchestrator(&pool, classifier, oracle.clone());
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Patrick"));

    orchestrator
        .process_command(&mut session, "what's the weather in toronto", &speaker)
        .await;

    assert_eq!(speaker.spoken(), vec!["Probably chilly."]);
    assert_eq!(oracle.prompts(), vec!["what's the weather in toronto"]);
}

#[tokio::test]
async fn test_search_answers_from_results() {
    let pool = common::setup_test_db();
    let classifier = Arc::new(FakeClassifier {
        route: RouteDecision::Search {
            query: "time in tokyo".into(),
        },
        ..FakeClassifier::default()
    });
    let oracle = Arc::new(FakeOracle::new().on_chat("It's 11 AM in Tokyo."));
    let search = Arc::new(FakeSearch::with_results(vec![SearchResult {
        title: "Tokyo time".into(),
        url: "https://example.com/tokyo".into(),
        snippet: "Current local time in Tokyo is 11:00".into(),
    }]));
    let orchestrator =
        orchestrator(&pool, classifier, oracle.clone()).with_search(search.clone());
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Patrick"));

    orchestrator
        .process_command(&mut session, "what time is it in tokyo", &speaker)
        .await;

    assert_eq!(search.queries(), vec!["time in tokyo"]);
    let prompt = &oracle.prompts()[0];
    assert!(prompt.contains("Current local time in Tokyo is 11:00"));
    assert!(prompt.contains("User's Question: what time is it in tokyo"));
    assert_eq!(speaker.spoken(), vec!["It's 11 AM in Tokyo."]);

    // History keeps the raw question, not the augmented prompt
    assert_eq!(
        session.history().messages()[0].content,
        "what time is it in tokyo"
    );
}

#[tokio::test]
async fn test_failed_search_apologises() {
    let pool = common::setup_test_db();
    let classifier = Arc::new(FakeClassifier {
        route: RouteDecision::Search {
            query: "news".into(),
        },
        ..FakeClassifier::default()
    });
    let oracle = Arc::new(FakeOracle::new());
    let orchestrator = orchestrator(&pool, classifier, oracle.clone())
        .with_search(Arc::new(FakeSearch::failing()));
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Patrick"));

    let outcome = orchestrator
        .process_command(&mut session, "what's in the news", &speaker)
        .await;

    assert_eq!(outcome.result, TurnResult::Continue);
    assert_eq!(speaker.spoken(), vec![SEARCH_FAILURE_REPLY]);
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn test_failed_chat_is_not_recorded() {
    let pool = common::setup_test_db();
    let orchestrator = orchestrator(
        &pool,
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeOracle::new().failing_chat()),
    );
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Patrick"));

    orchestrator
        .process_command(&mut session, "tell me a story", &speaker)
        .await;

    assert_eq!(speaker.spoken(), vec![ANSWER_FALLBACK]);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_identity_prompt_once_per_activation() {
    let pool = common::setup_test_db();
    let orchestrator = orchestrator(
        &pool,
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeOracle::new()),
    );
    let speaker = RecordingSpeaker::default();
    let mut session = Session::new(Duration::from_secs(8));

    // Not active yet
    assert!(!orchestrator.prompt_identity(&mut session, &speaker).await);

    orchestrator.activate(&mut session, Instant::now());
    assert!(orchestrator.prompt_identity(&mut session, &speaker).await);
    assert!(!orchestrator.prompt_identity(&mut session, &speaker).await);
    assert_eq!(speaker.spoken(), vec![IDENTITY_PROMPT]);

    // A new activation asks again
    orchestrator.activate(&mut session, Instant::now());
    assert!(orchestrator.prompt_identity(&mut session, &speaker).await);
}

#[tokio::test]
async fn test_idle_session_expires() {
    let pool = common::setup_test_db();
    let orchestrator = orchestrator(
        &pool,
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeOracle::new()),
    );
    let mut session = Session::new(Duration::from_secs(8));
    let start = Instant::now();

    orchestrator.activate(&mut session, start);
    session.set_user("Patrick");

    assert!(!orchestrator.expire_if_idle(&mut session, start + Duration::from_secs(5)));
    assert!(orchestrator.expire_if_idle(&mut session, start + Duration::from_secs(9)));
    assert_eq!(session.state(), DialogueState::WakeListening);
    assert_eq!(session.current_user(), None);
}

#[tokio::test]
async fn test_streamed_answer_spoken_once_per_sentence() {
    let pool = common::setup_test_db();
    let oracle = Arc::new(FakeOracle::new().on_stream(&[
        Some("Volcanoes form where magma "),
        Some("reaches the surface. "),
        Some("Most sit along "),
        Some("plate boundaries! They "),
        None,
    ]));
    let orchestrator =
        streaming_orchestrator(&pool, Arc::new(FakeClassifier::default()), oracle.clone());
    let mut events = orchestrator.events().subscribe();
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Patrick"));

    let outcome = orchestrator
        .process_command(&mut session, "how do volcanoes form", &speaker)
        .await;

    assert_eq!(outcome.result, TurnResult::Continue);
    assert_eq!(
        speaker.spoken(),
        vec![
            "Volcanoes form where magma reaches the surface.",
            "Most sit along plate boundaries! They",
        ]
    );
    assert_eq!(oracle.calls(), 1);

    // The partial answer is kept for context
    let history = session.history().messages();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "how do volcanoes form");
    assert_eq!(
        history[1].content,
        "Volcanoes form where magma reaches the surface. Most sit along plate boundaries! They"
    );

    assert_eq!(
        events.recv().await.unwrap(),
        AssistantEvent::Speaking {
            text: "Volcanoes form where magma reaches the surface.".into()
        }
    );
}

#[tokio::test]
async fn test_empty_stream_falls_back() {
    let pool = common::setup_test_db();
    let oracle = Arc::new(FakeOracle::new().on_stream(&[None]));
    let orchestrator =
        streaming_orchestrator(&pool, Arc::new(FakeClassifier::default()), oracle);
    let speaker = RecordingSpeaker::default();
    let mut session = active_session(Some("Patrick"));

    orchestrator
        .process_command(&mut session, "tell me a joke", &speaker)
        .await;

    assert_eq!(speaker.spoken(), vec![ANSWER_FALLBACK]);
    assert!(session.history().is_empty());
}

fn half_second(amplitude: f32) -> Vec<f32> {
    vec![amplitude; SAMPLE_RATE as usize / 2]
}

#[test]
fn test_timeout_waits_for_command_in_progress() {
    let pool = common::setup_test_db();
    let orchestrator = orchestrator(
        &pool,
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeOracle::new()),
    );
    let mut recorder = CommandRecorder::new(RecorderSettings::default(), SAMPLE_RATE);
    let mut session = Session::new(Duration::from_secs(8));
    let start = Instant::now();
    orchestrator.activate(&mut session, start);
    session.set_user("Surya");

    let at = |ms: u64| start + Duration::from_millis(ms);

    // Speech begins just before the timeout and runs past it
    assert_eq!(
        listen_step(&orchestrator, &mut session, &mut recorder, &half_second(0.1), at(7_900)),
        Listening::Recorder(RecordingStatus::Recording)
    );
    assert_eq!(
        listen_step(&orchestrator, &mut session, &mut recorder, &half_second(0.1), at(8_400)),
        Listening::Recorder(RecordingStatus::Recording)
    );
    assert_eq!(
        listen_step(&orchestrator, &mut session, &mut recorder, &half_second(0.0), at(8_900)),
        Listening::Recorder(RecordingStatus::Recording)
    );
    assert!(session.is_active());

    let finished = listen_step(
        &orchestrator,
        &mut session,
        &mut recorder,
        &half_second(0.0),
        at(9_400),
    );
    match finished {
        Listening::Recorder(RecordingStatus::Complete(samples)) => {
            assert_eq!(samples.len(), SAMPLE_RATE as usize);
        }
        other => panic!("expected the finished command, got {other:?}"),
    }
    assert_eq!(session.current_user(), Some("Surya"));

    // Silence afterwards ends the session
    assert_eq!(
        listen_step(&orchestrator, &mut session, &mut recorder, &half_second(0.0), at(9_900)),
        Listening::Expired
    );
    assert_eq!(session.state(), DialogueState::WakeListening);
    assert!(!recorder.is_speaking());
}

#[test]
fn test_timeout_ends_silent_session() {
    let pool = common::setup_test_db();
    let orchestrator = orchestrator(
        &pool,
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeOracle::new()),
    );
    let mut recorder = CommandRecorder::new(RecorderSettings::default(), SAMPLE_RATE);
    let mut session = Session::new(Duration::from_secs(8));
    let start = Instant::now();
    orchestrator.activate(&mut session, start);

    assert_eq!(
        listen_step(
            &orchestrator,
            &mut session,
            &mut recorder,
            &half_second(0.0),
            start + Duration::from_secs(5)
        ),
        Listening::Recorder(RecordingStatus::Waiting)
    );
    assert_eq!(
        listen_step(
            &orchestrator,
            &mut session,
            &mut recorder,
            &half_second(0.0),
            start + Duration::from_secs(9)
        ),
        Listening::Expired
    );
    assert!(!session.is_active());
}
