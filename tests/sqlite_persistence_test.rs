//! File-backed database tests: persistence across pools and CLI dispatch.

mod common;

use clap::Parser;
use tempfile::TempDir;
use trellis::adapters::sqlite::initialize_database;
use trellis::cli::{dispatch, Cli, CliContext};
use trellis::domain::models::{Config, TaskStatus};
use trellis::services::NewTask;

fn temp_config() -> (TempDir, Config) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = Config::default();
    config.database.path = dir
        .path()
        .join("nested")
        .join("trellis.db")
        .to_string_lossy()
        .into_owned();
    (dir, config)
}

#[tokio::test]
async fn test_committed_changes_survive_reopen() {
    let (_dir, config) = temp_config();
    let actor = common::actor();

    let created = {
        let ctx = CliContext::open(&config).await.unwrap();
        let created = ctx
            .service
            .create_task(NewTask::new("Persisted").with_checklists(["Only"]), &actor)
            .await
            .unwrap();
        ctx.service
            .toggle_checklist(created.checklists[0].id, true, &actor)
            .await
            .unwrap();
        ctx.pool.close().await;
        created
    };

    let ctx = CliContext::open(&config).await.unwrap();
    let task = ctx.service.get_task(created.task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    let history = ctx.service.history(created.task.id).await.unwrap();
    assert!(history.len() >= 2, "creation and completion are both audited");
}

#[tokio::test]
async fn test_migrations_are_applied_once() {
    let (_dir, config) = temp_config();
    let pool = initialize_database(&config.database).await.unwrap();
    pool.close().await;

    let pool = initialize_database(&config.database).await.unwrap();
    let (applied,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn test_cli_commands_drive_the_service() {
    let (_dir, config) = temp_config();
    let ctx = CliContext::open(&config).await.unwrap();

    let create = Cli::try_parse_from([
        "trellis", "task", "create", "From CLI", "--checklist", "Step", "--actor", "cli-user",
    ])
    .unwrap();
    dispatch(create, &ctx).await.unwrap();

    let (task_id,): (String,) = sqlx::query_as("SELECT id FROM tasks WHERE name = 'From CLI'")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    let (checklist_id,): (String,) = sqlx::query_as("SELECT id FROM checklists WHERE name = 'Step'")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();

    let toggle = Cli::try_parse_from([
        "trellis",
        "--json",
        "checklist",
        "toggle",
        &checklist_id[..8],
        "--done",
        "--actor",
        "cli-user",
    ])
    .unwrap();
    dispatch(toggle, &ctx).await.unwrap();

    let audit = Cli::try_parse_from(["trellis", "audit", &task_id[..8]]).unwrap();
    dispatch(audit, &ctx).await.unwrap();

    let task = ctx
        .service
        .get_task(task_id.parse().unwrap())
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.created_by.as_str(), "cli-user");

    let update = Cli::try_parse_from([
        "trellis", "task", "update", &task_id[..8], "--name", "Renamed", "--assignee", "helper",
        "--actor", "cli-user",
    ])
    .unwrap();
    dispatch(update, &ctx).await.unwrap();
    let rename = Cli::try_parse_from([
        "trellis", "checklist", "rename", &checklist_id[..8], "Step one", "--actor", "helper",
    ])
    .unwrap();
    dispatch(rename, &ctx).await.unwrap();
    let list = Cli::try_parse_from(["trellis", "task", "list", "--assigned", "--actor", "helper"])
        .unwrap();
    dispatch(list, &ctx).await.unwrap();

    let stranger = Cli::try_parse_from([
        "trellis", "checklist", "toggle", &checklist_id, "--undone", "--actor", "stranger",
    ])
    .unwrap();
    let err = dispatch(stranger, &ctx).await.unwrap_err();
    assert_eq!(trellis::cli::exit_code(&err), 6);

    let renamed = ctx.service.get_task(task_id.parse().unwrap()).await.unwrap();
    assert_eq!(renamed.name, "Renamed");
    assert_eq!(renamed.assigned_to.as_ref().map(|a| a.as_str()), Some("helper"));
    let step = ctx
        .service
        .get_checklist(checklist_id.parse().unwrap())
        .await
        .unwrap();
    assert_eq!(step.name, "Step one");
    assert!(step.is_completed);

    let delete = Cli::try_parse_from([
        "trellis", "delete", "--task", &task_id, "--dry-run", "--actor", "cli-user",
    ])
    .unwrap();
    dispatch(delete, &ctx).await.unwrap();
    assert!(!ctx.service.get_task(task.id).await.unwrap().is_deleted);
}
