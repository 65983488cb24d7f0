use taskdeck_core::db::open_db_in_memory;
use taskdeck_core::{
    NewTask, SqliteTaskRepository, TaskListQuery, TaskService, TaskServiceError,
    TaskValidationError,
};
use uuid::Uuid;

#[test]
fn bulk_create_persists_all_or_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    let created = service
        .bulk_create(vec![
            NewTask::titled("First of batch"),
            NewTask::titled("Second of batch"),
            NewTask::titled("Third of batch"),
        ])
        .unwrap();
    assert_eq!(created.len(), 3);

    let page = service.list_tasks(&TaskListQuery::default()).unwrap();
    assert_eq!(page.meta.total_items, 3);
}

#[test]
fn bulk_create_with_one_invalid_item_creates_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    let err = service
        .bulk_create(vec![
            NewTask::titled("Valid one"),
            NewTask::titled("Valid two"),
            NewTask::titled("ab"),
        ])
        .unwrap_err();

    match err {
        TaskServiceError::BulkItemInvalid { index, source } => {
            assert_eq!(index, 2);
            assert_eq!(source, TaskValidationError::TitleLength { length: 2 });
        }
        other => panic!("unexpected error: {other}"),
    }

    let page = service.list_tasks(&TaskListQuery::default()).unwrap();
    assert_eq!(page.meta.total_items, 0);
}

#[test]
fn bulk_create_rejects_empty_and_oversized_batches() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    let err = service.bulk_create(Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::InvalidBatchSize { size: 0 }
    ));

    let oversized = (0..101)
        .map(|i| NewTask::titled(format!("Batch item {i}")))
        .collect::<Vec<_>>();
    let err = service.bulk_create(oversized).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::InvalidBatchSize { size: 101 }
    ));

    let page = service.list_tasks(&TaskListQuery::default()).unwrap();
    assert_eq!(page.meta.total_items, 0);
}

#[test]
fn bulk_delete_skips_unknown_ids_and_reports_counts() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    let existing = service.create_task(NewTask::titled("Delete target")).unwrap();
    let unknown = Uuid::new_v4();

    let outcome = service.bulk_delete(&[existing.uuid, unknown]).unwrap();
    assert_eq!(outcome.requested, 2);
    assert_eq!(outcome.deleted, 1);

    let err = service.get_task(existing.uuid).unwrap_err();
    assert!(matches!(err, TaskServiceError::TaskNotFound(_)));
}

#[test]
fn bulk_delete_rejects_out_of_range_batches() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    let err = service.bulk_delete(&[]).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::InvalidBatchSize { size: 0 }
    ));

    let too_many = (0..101).map(|_| Uuid::new_v4()).collect::<Vec<_>>();
    let err = service.bulk_delete(&too_many).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::InvalidBatchSize { size: 101 }
    ));
}

#[test]
fn delete_completed_removes_only_completed_tasks() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    // Nothing completed yet: zero is a valid outcome, not an error.
    assert_eq!(service.delete_completed().unwrap(), 0);

    let done_a = service.create_task(NewTask::titled("Done already")).unwrap();
    let done_b = service.create_task(NewTask::titled("Also done")).unwrap();
    let open_task = service.create_task(NewTask::titled("Still open")).unwrap();
    service.toggle_task(done_a.uuid).unwrap();
    service.toggle_task(done_b.uuid).unwrap();

    assert_eq!(service.delete_completed().unwrap(), 2);

    let page = service.list_tasks(&TaskListQuery::default()).unwrap();
    assert_eq!(page.meta.total_items, 1);
    assert_eq!(page.items[0].uuid, open_task.uuid);
}

#[test]
fn bulk_create_serializes_tags_per_task() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    let created = service
        .bulk_create(vec![
            NewTask {
                tags: Some(vec!["alpha".to_string(), "beta".to_string()]),
                ..NewTask::titled("Tagged one")
            },
            NewTask {
                tags: Some(vec!["gamma".to_string()]),
                ..NewTask::titled("Tagged two")
            },
        ])
        .unwrap();

    assert_eq!(created[0].tags, vec!["alpha".to_string(), "beta".to_string()]);
    assert_eq!(created[1].tags, vec!["gamma".to_string()]);
}
