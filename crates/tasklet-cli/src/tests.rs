use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use tasklet_core::changes::BatchUpdate;
use tasklet_core::config::AppConfig;
use tasklet_core::{StoreUpdate, Task, TaskId, TaskService};

use crate::commands::add::run_add;
use crate::commands::common::{
    apply_edit, describe_update, format_date, format_task_lines, normalize_name, open_session,
    parse_task_id, resolve_task, task_to_list_item,
};
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::toggle::run_toggle;
use crate::error::CliError;
use crate::presenter::is_yes;

fn offline_config(db_path: PathBuf) -> AppConfig {
    AppConfig {
        database_path: Some(db_path),
        ..AppConfig::default()
    }
}

#[test]
fn normalize_name_trims_and_rejects_empty() {
    assert_eq!(normalize_name("  buy milk ").unwrap(), "buy milk");
    assert!(matches!(normalize_name(" \t "), Err(CliError::EmptyName)));
}

#[test]
fn parse_task_id_accepts_padded_numbers() {
    assert_eq!(parse_task_id(" 42 ").unwrap(), TaskId::new(42));
    assert!(matches!(
        parse_task_id("abc"),
        Err(CliError::InvalidTaskId(raw)) if raw == "abc"
    ));
}

#[test]
fn apply_edit_requires_a_field() {
    let task = Task::new(TaskId::new(1), "old", "desc");

    assert!(matches!(
        apply_edit(&task, None, None),
        Err(CliError::NothingToEdit)
    ));
    assert!(matches!(
        apply_edit(&task, Some("  "), None),
        Err(CliError::EmptyName)
    ));

    let edited = apply_edit(&task, None, Some(" new desc ")).unwrap();
    assert_eq!(edited.name, "old");
    assert_eq!(edited.description, "new desc");
    assert_eq!(edited.id, task.id);
}

#[test]
fn format_task_lines_marks_completed_and_aligns_ids() {
    let tasks = vec![
        Task::new(TaskId::new(2), "Walk dog", ""),
        Task::new(TaskId::new(10), "Buy milk", "2 litres").with_completed(true),
    ];

    assert_eq!(
        format_task_lines(&tasks),
        vec![
            "[ ]  2  Walk dog".to_string(),
            "[x] 10  Buy milk  (2 litres)".to_string(),
        ]
    );
}

#[test]
fn task_to_list_item_includes_iso_date() {
    let mut task = Task::new(TaskId::new(3), "Read", "");
    task.date = 0;

    let item = task_to_list_item(&task);
    assert_eq!(item.id, 3);
    assert_eq!(item.date_iso, "1970-01-01 00:00:00 UTC");
    assert_eq!(format_date(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn describe_update_lists_every_kind() {
    let update = StoreUpdate::from_changes(
        BTreeSet::from([0]),
        BTreeSet::from([4]),
        BTreeSet::from([2]),
        HashSet::new(),
    );
    let line = describe_update(&update);

    assert!(line.contains("inserted={0}"));
    assert!(line.contains("deleted={4}"));
    assert!(line.contains("updated={2}"));
    assert!(line.contains("moved=[]"));
}

#[test]
fn retry_prompt_accepts_yes() {
    assert!(is_yes("y\n"));
    assert!(is_yes(" YES "));
    assert!(!is_yes(""));
    assert!(!is_yes("no"));
}

#[tokio::test(flavor = "multi_thread")]
async fn commands_round_trip_through_store() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("tasks.db");
    let service = open_session(&offline_config(db_path.clone()), None, true)
        .await
        .unwrap();

    run_add(&["Buy".to_string(), "milk".to_string()], "", &service)
        .await
        .unwrap();
    run_add(&["Walk dog".to_string()], "  around the park ", &service)
        .await
        .unwrap();

    let duplicate = run_add(&["Buy milk".to_string()], "", &service).await;
    assert!(matches!(duplicate, Err(CliError::DuplicateName(name)) if name == "Buy milk"));

    run_toggle("1", &service).await.unwrap();
    run_edit("2", Some("Walk the dog"), None, &service)
        .await
        .unwrap();

    let tasks = service.list_tasks().await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks[0].completed);
    assert_eq!(tasks[1].name, "Walk the dog");
    assert_eq!(tasks[1].description, "around the park");

    run_delete("1", &service).await.unwrap();
    assert!(matches!(
        resolve_task("1", &service).await,
        Err(CliError::TaskNotFound(_))
    ));
    assert!(matches!(
        run_delete("1", &service).await,
        Err(CliError::Core(tasklet_core::Error::NotFound(_)))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn explicit_db_path_wins_over_config() {
    let tmp = tempfile::tempdir().unwrap();
    let configured = tmp.path().join("configured.db");
    let explicit = tmp.path().join("explicit.db");

    let service = open_session(&offline_config(configured.clone()), Some(&explicit), true)
        .await
        .unwrap();

    assert_eq!(service.db_path(), Some(explicit.as_path()));
    assert!(explicit.exists());
    assert!(!configured.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_session_does_not_claim_first_launch() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("tasks.db");

    let service: TaskService = open_session(&offline_config(db_path), None, true)
        .await
        .unwrap();

    assert!(!service
        .load_flag(tasklet_core::sync::LAUNCH_FLAG_KEY)
        .await
        .unwrap());
    assert!(service.list_tasks().await.unwrap().is_empty());
}
