use sea_orm::DatabaseConnection;
use taskboard_server::task::{TaskService, TaskServiceError};
use taskboard_server::user::UserService;

mod common;

async fn setup_with_users(identities: &[&str]) -> DatabaseConnection {
    let db = common::setup_db().await.expect("Failed to setup test database");
    let user_service = UserService::new(&db);
    for identity in identities {
        user_service
            .register(identity, identity, "secret1")
            .await
            .expect("Failed to register user");
    }
    db
}

#[tokio::test]
async fn can_create_task() {
    let db = setup_with_users(&["alice"]).await;
    let task_service = TaskService::new(&db);

    let task = task_service
        .create("alice", "Buy milk", Some("2 litres"))
        .await
        .expect("Failed to create task");

    assert_eq!(task.owner(), "alice");
    assert_eq!(task.title(), "Buy milk");
    assert_eq!(task.description(), Some("2 litres"));
}

#[tokio::test]
async fn can_store_blank_description_as_absent() {
    let db = setup_with_users(&["alice"]).await;
    let task_service = TaskService::new(&db);

    let task = task_service
        .create("alice", "Buy milk", Some("   "))
        .await
        .unwrap();

    assert_eq!(task.description(), None);
}

#[tokio::test]
async fn can_reject_empty_title() {
    let db = setup_with_users(&["alice"]).await;
    let task_service = TaskService::new(&db);

    let result = task_service.create("alice", "   ", None).await;

    assert!(matches!(result, Err(TaskServiceError::Validation(_))));
    assert!(task_service.list_for_owner("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn can_reject_task_for_unknown_owner() {
    let db = setup_with_users(&[]).await;
    let task_service = TaskService::new(&db);

    let result = task_service.create("ghost", "Haunt", None).await;

    assert!(matches!(result, Err(TaskServiceError::UnknownOwner(_))));
}

#[tokio::test]
async fn can_list_only_own_tasks_newest_first() {
    let db = setup_with_users(&["alice", "bob"]).await;
    let task_service = TaskService::new(&db);
    let first = task_service.create("alice", "First", None).await.unwrap();
    task_service.create("bob", "Bob's task", None).await.unwrap();
    let second = task_service.create("alice", "Second", None).await.unwrap();

    let alice_tasks = task_service.list_for_owner("alice").await.unwrap();
    let bob_tasks = task_service.list_for_owner("bob").await.unwrap();

    assert_eq!(alice_tasks, vec![second, first]);
    assert_eq!(bob_tasks.len(), 1);
    assert!(bob_tasks.iter().all(|task| task.owner() == "bob"));
}

#[tokio::test]
async fn can_search_within_own_tasks() {
    let db = setup_with_users(&["alice", "bob"]).await;
    let task_service = TaskService::new(&db);
    task_service.create("alice", "Buy milk", None).await.unwrap();
    task_service.create("alice", "Walk dog", None).await.unwrap();
    task_service.create("bob", "Buy MILK too", None).await.unwrap();

    let found = task_service.search_for_owner("alice", "MiLk").await.unwrap();
    let everything = task_service.search_for_owner("alice", "").await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title(), "Buy milk");
    assert_eq!(everything.len(), 2);
}

#[tokio::test]
async fn can_delete_own_task() {
    let db = setup_with_users(&["alice"]).await;
    let task_service = TaskService::new(&db);
    let task = task_service.create("alice", "Buy milk", None).await.unwrap();

    let deleted = task_service.delete_by_id("alice", task.id()).await.unwrap();

    assert_eq!(deleted, task);
    assert!(task_service.list_for_owner("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn can_refuse_deleting_foreign_task() {
    let db = setup_with_users(&["alice", "bob"]).await;
    let task_service = TaskService::new(&db);
    let task = task_service.create("alice", "Buy milk", None).await.unwrap();

    let result = task_service.delete_by_id("bob", task.id()).await;

    assert!(matches!(result, Err(TaskServiceError::Forbidden(id)) if id == task.id()));
    assert_eq!(task_service.list_for_owner("alice").await.unwrap(), vec![task]);
}

#[tokio::test]
async fn can_report_missing_task_on_delete() {
    let db = setup_with_users(&["alice"]).await;
    let task_service = TaskService::new(&db);

    let result = task_service.delete_by_id("alice", 4242).await;

    assert!(matches!(result, Err(TaskServiceError::NotFound(4242))));
}

#[tokio::test]
async fn can_report_out_of_range_id_as_missing() {
    let db = setup_with_users(&["alice"]).await;
    let task_service = TaskService::new(&db);
    task_service.create("alice", "Buy milk", None).await.unwrap();

    let result = task_service.delete_by_id("alice", u32::MAX).await;

    assert!(matches!(result, Err(TaskServiceError::NotFound(u32::MAX))));
    assert_eq!(task_service.list_for_owner("alice").await.unwrap().len(), 1);
}

#[tokio::test]
async fn can_keep_deleted_task_gone() {
    let db = setup_with_users(&["alice"]).await;
    let task_service = TaskService::new(&db);
    let task = task_service.create("alice", "Buy milk", None).await.unwrap();
    task_service.delete_by_id("alice", task.id()).await.unwrap();

    let result = task_service.delete_by_id("alice", task.id()).await;

    assert!(matches!(result, Err(TaskServiceError::NotFound(_))));
}
