//! Reminder store tests through the task executor

use mico_assistant::db::{self, ReminderRepo, UserRepo};
use mico_assistant::nlu::{TaskAction, TaskCommand, TaskIntentKind};
use mico_assistant::tasks::{TaskExecution, TaskExecutor, TaskPayload};
use tempfile::TempDir;

mod common;

use common::{reminders, setup_test_db, today};

fn executor(pool: &mico_assistant::DbPool) -> TaskExecutor {
    TaskExecutor::new(UserRepo::new(pool.clone()), reminders(pool))
}

fn command(user: &str, action: TaskAction) -> TaskCommand {
    TaskCommand {
        user: user.to_string(),
        action,
    }
}

fn payload(execution: TaskExecution) -> TaskPayload {
    match execution {
        TaskExecution::Outcome(outcome) => outcome.payload,
        TaskExecution::Direct(text) => panic!("expected a store outcome, got reply: {text}"),
    }
}

#[test]
fn test_reminders_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("mico.db");

    {
        let pool = db::init(&path).unwrap();
        let users = UserRepo::new(pool.clone());
        users.seed(common::USERS).unwrap();
        let surya = users.get_user_id("surya").unwrap().unwrap();
        ReminderRepo::new(pool)
            .with_clock(today)
            .add_reminder(surya, "Renew the car insurance", Some("next week"))
            .unwrap();
    }

    let pool = db::init(&path).unwrap();
    let surya = UserRepo::new(pool.clone())
        .get_user_id("Surya")
        .unwrap()
        .unwrap();
    let stored = ReminderRepo::new(pool).list_reminders(surya).unwrap();

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].task, "Renew the car insurance");
    assert_eq!(stored[0].due_date.as_deref(), Some("2026-10-26"));
}

#[test]
fn test_list_shows_dated_reminders_first() {
    let pool = setup_test_db();
    let store = reminders(&pool);
    let patrick = UserRepo::new(pool.clone())
        .get_user_id("Patrick")
        .unwrap()
        .unwrap();

    store.add_reminder(patrick, "Water the plants", None).unwrap();
    store
        .add_reminder(patrick, "Book the flights", Some("2026-12-01"))
        .unwrap();
    store
        .add_reminder(patrick, "Call the plumber", Some("tomorrow"))
        .unwrap();

    let listed = payload(executor(&pool).execute(&command("Patrick", TaskAction::List)));
    let TaskPayload::Listed { reminders } = listed else {
        panic!("expected a listing, got {listed:?}");
    };

    let tasks: Vec<&str> = reminders.iter().map(|r| r.task.as_str()).collect();
    assert_eq!(
        tasks,
        vec!["Call the plumber", "Book the flights", "Water the plants"]
    );
}

#[test]
fn test_completed_reminder_cannot_be_completed_again() {
    let pool = setup_test_db();
    let store = reminders(&pool);
    let mohamed = UserRepo::new(pool.clone())
        .get_user_id("Mohamed")
        .unwrap()
        .unwrap();
    store
        .add_reminder(mohamed, "Order the replacement parts", Some("tomorrow"))
        .unwrap();

    let executor = executor(&pool);
    let complete = command(
        "mohamed",
        TaskAction::Complete {
            keyword: Some("%replacement%parts%".into()),
        },
    );

    assert_eq!(
        payload(executor.execute(&complete)),
        TaskPayload::Completed {
            description: "Order the replacement parts".into()
        }
    );
    assert_eq!(
        payload(executor.execute(&complete)),
        TaskPayload::NotFound {
            intent: TaskIntentKind::CompleteTask,
            keyword: "replacement parts".into()
        }
    );

    assert!(store.list_reminders(mohamed).unwrap().is_empty());
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_reschedule_keeps_unresolved_phrase() {
    let pool = setup_test_db();
    let store = reminders(&pool);
    let surya = UserRepo::new(pool.clone())
        .get_user_id("Surya")
        .unwrap()
        .unwrap();
    store
        .add_reminder(surya, "Test the camera integration", Some("today"))
        .unwrap();

    let moved = payload(executor(&pool).execute(&command(
        "Surya",
        TaskAction::Reschedule {
            keyword: Some("%camera%".into()),
            due_date: Some("next Tuesday".into()),
        },
    )));

    assert_eq!(
        moved,
        TaskPayload::Rescheduled {
            description: "Test the camera integration".into(),
            old_date: Some("2026-10-19".into()),
            new_date: Some("next Tuesday".into()),
        }
    );
}
