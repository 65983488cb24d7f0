use rusqlite::Connection;
use taskdeck_core::db::open_db_in_memory;
use taskdeck_core::{
    NewTask, Priority, SortField, SortOrder, SqliteTaskRepository, StatusFilter, TaskListQuery,
    TaskService, TaskServiceError,
};

#[test]
fn unfiltered_list_counts_everything() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    for i in 0..3 {
        service
            .create_task(NewTask::titled(format!("Task number {i}")))
            .unwrap();
    }

    let page = service.list_tasks(&TaskListQuery::default()).unwrap();
    assert_eq!(page.meta.total_items, 3);
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.meta.items_per_page, 50);
    assert_eq!(page.meta.total_pages, 1);
}

#[test]
fn status_and_priority_filters_compose() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    let high_active = service
        .create_task(NewTask {
            priority: Some(Priority::High),
            ..NewTask::titled("High active")
        })
        .unwrap();
    let high_done = service
        .create_task(NewTask {
            priority: Some(Priority::High),
            ..NewTask::titled("High done")
        })
        .unwrap();
    service.toggle_task(high_done.uuid).unwrap();
    service
        .create_task(NewTask {
            priority: Some(Priority::Low),
            ..NewTask::titled("Low active")
        })
        .unwrap();

    let query = TaskListQuery {
        status: StatusFilter::Active,
        priority: Some(Priority::High),
        ..TaskListQuery::default()
    };
    let page = service.list_tasks(&query).unwrap();
    assert_eq!(page.meta.total_items, 1);
    assert_eq!(page.items[0].uuid, high_active.uuid);

    let completed = TaskListQuery {
        status: StatusFilter::Completed,
        ..TaskListQuery::default()
    };
    let page = service.list_tasks(&completed).unwrap();
    assert_eq!(page.meta.total_items, 1);
    assert_eq!(page.items[0].uuid, high_done.uuid);
}

#[test]
fn search_matches_title_or_description_case_insensitively() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    let by_title = service.create_task(NewTask::titled("Groceries run")).unwrap();
    let by_description = service
        .create_task(NewTask {
            description: Some("pick up groceries after work".to_string()),
            ..NewTask::titled("Evening errand")
        })
        .unwrap();
    service.create_task(NewTask::titled("Unrelated chore")).unwrap();

    let query = TaskListQuery {
        search: Some("GROCERIES".to_string()),
        ..TaskListQuery::default()
    };
    let page = service.list_tasks(&query).unwrap();
    assert_eq!(page.meta.total_items, 2);
    let ids: Vec<_> = page.items.iter().map(|task| task.uuid).collect();
    assert!(ids.contains(&by_title.uuid));
    assert!(ids.contains(&by_description.uuid));
}

#[test]
fn search_treats_like_wildcards_literally() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    let literal = service
        .create_task(NewTask {
            description: Some("progress at 100% today".to_string()),
            ..NewTask::titled("Percent report")
        })
        .unwrap();
    service
        .create_task(NewTask {
            description: Some("progress at 100x speed".to_string()),
            ..NewTask::titled("Speed report")
        })
        .unwrap();

    let query = TaskListQuery {
        search: Some("100%".to_string()),
        ..TaskListQuery::default()
    };
    let page = service.list_tasks(&query).unwrap();
    assert_eq!(page.meta.total_items, 1);
    assert_eq!(page.items[0].uuid, literal.uuid);
}

#[test]
fn tags_filter_uses_or_semantics_and_ignores_case() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    let work = service
        .create_task(NewTask {
            tags: Some(vec!["Work".to_string()]),
            ..NewTask::titled("Work item")
        })
        .unwrap();
    let home = service
        .create_task(NewTask {
            tags: Some(vec!["Home".to_string()]),
            ..NewTask::titled("Home item")
        })
        .unwrap();
    service
        .create_task(NewTask {
            tags: Some(vec!["Hobby".to_string()]),
            ..NewTask::titled("Hobby item")
        })
        .unwrap();

    let query = TaskListQuery {
        tags: vec!["WORK".to_string(), "home".to_string()],
        ..TaskListQuery::default()
    };
    let page = service.list_tasks(&query).unwrap();
    assert_eq!(page.meta.total_items, 2);
    let ids: Vec<_> = page.items.iter().map(|task| task.uuid).collect();
    assert!(ids.contains(&work.uuid));
    assert!(ids.contains(&home.uuid));
}

#[test]
fn priority_sort_orders_by_urgency_rank() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    for (title, priority) in [
        ("First low", Priority::Low),
        ("Then high", Priority::High),
        ("Then medium", Priority::Medium),
    ] {
        service
            .create_task(NewTask {
                priority: Some(priority),
                ..NewTask::titled(title)
            })
            .unwrap();
    }

    let ascending = TaskListQuery {
        sort_field: SortField::Priority,
        sort_order: SortOrder::Asc,
        ..TaskListQuery::default()
    };
    let page = service.list_tasks(&ascending).unwrap();
    let priorities: Vec<_> = page.items.iter().map(|task| task.priority).collect();
    assert_eq!(
        priorities,
        vec![Priority::High, Priority::Medium, Priority::Low]
    );

    let descending = TaskListQuery {
        sort_order: SortOrder::Desc,
        ..ascending
    };
    let page = service.list_tasks(&descending).unwrap();
    let priorities: Vec<_> = page.items.iter().map(|task| task.priority).collect();
    assert_eq!(
        priorities,
        vec![Priority::Low, Priority::Medium, Priority::High]
    );
}

#[test]
fn due_date_sort_places_undated_tasks_last() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let mut service = TaskService::new(repo);

    let later = service
        .create_task(NewTask {
            due_date: Some("2031-01-01".to_string()),
            ..NewTask::titled("Due later")
        })
        .unwrap();
    let undated = service.create_task(NewTask::titled("No due date")).unwrap();
    let sooner = service
        .create_task(NewTask {
            due_date: Some("2030-01-01".to_string()),
            ..NewTask::titled("Due sooner")
        })
        .unwrap();

    let query = TaskListQuery {
        sort_field: SortField::DueDate,
        sort_order: SortOrder::Asc,
        ..TaskListQuery::default()
    };
    let page = service.list_tasks(&query).unwrap();
    let ids: Vec<_> = page.items.iter().map(|task| task.uuid).collect();
    assert_eq!(ids, vec![sooner.uuid, later.uuid, undated.uuid]);

    let reversed = TaskListQuery {
        sort_order: SortOrder::Desc,
        ..query
    };
    let page = service.list_tasks(&reversed).unwrap();
    let ids: Vec<_> = page.items.iter().map(|task| task.uuid).collect();
    assert_eq!(ids, vec![later.uuid, sooner.uuid, undated.uuid]);
}

#[test]
fn pagination_walks_the_collection_without_gaps() {
    let mut conn = open_db_in_memory().unwrap();
    seed_with_fixed_created_at(&mut conn, 5);

    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let service = TaskService::new(repo);

    let page_one = service
        .list_tasks(&TaskListQuery {
            page: 1,
            page_size: 2,
            ..TaskListQuery::default()
        })
        .unwrap();
    assert_eq!(page_one.items.len(), 2);
    assert_eq!(page_one.meta.total_pages, 3);
    assert!(page_one.meta.has_next_page);
    assert!(!page_one.meta.has_previous_page);

    let page_three = service
        .list_tasks(&TaskListQuery {
            page: 3,
            page_size: 2,
            ..TaskListQuery::default()
        })
        .unwrap();
    assert_eq!(page_three.items.len(), 1);
    assert!(!page_three.meta.has_next_page);
    assert!(page_three.meta.has_previous_page);

    // Walking every page yields exactly total_items distinct records.
    let mut seen = Vec::new();
    for page in 1..=3 {
        let result = service
            .list_tasks(&TaskListQuery {
                page,
                page_size: 2,
                ..TaskListQuery::default()
            })
            .unwrap();
        seen.extend(result.items.into_iter().map(|task| task.uuid));
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len() as u64, page_one.meta.total_items);
}

#[test]
fn page_beyond_total_returns_empty_data_with_true_metadata() {
    let mut conn = open_db_in_memory().unwrap();
    seed_with_fixed_created_at(&mut conn, 5);

    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let service = TaskService::new(repo);

    let page = service
        .list_tasks(&TaskListQuery {
            page: 9,
            page_size: 2,
            ..TaskListQuery::default()
        })
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.meta.total_items, 5);
    assert_eq!(page.meta.total_pages, 3);
    assert_eq!(page.meta.current_page, 9);
    assert!(!page.meta.has_next_page);
    assert!(page.meta.has_previous_page);
}

#[test]
fn rerunning_the_same_query_returns_identical_order() {
    let mut conn = open_db_in_memory().unwrap();
    seed_with_fixed_created_at(&mut conn, 8);

    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let service = TaskService::new(repo);

    let query = TaskListQuery {
        sort_field: SortField::Priority,
        sort_order: SortOrder::Asc,
        ..TaskListQuery::default()
    };
    let first: Vec<_> = service
        .list_tasks(&query)
        .unwrap()
        .items
        .into_iter()
        .map(|task| task.uuid)
        .collect();
    let second: Vec<_> = service
        .list_tasks(&query)
        .unwrap()
        .items
        .into_iter()
        .map(|task| task.uuid)
        .collect();
    assert_eq!(first, second);
}

#[test]
fn invalid_pagination_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&mut conn).unwrap();
    let service = TaskService::new(repo);

    let err = service
        .list_tasks(&TaskListQuery {
            page: 0,
            ..TaskListQuery::default()
        })
        .unwrap_err();
    assert!(matches!(err, TaskServiceError::InvalidQuery(_)));

    let err = service
        .list_tasks(&TaskListQuery {
            page_size: 500,
            ..TaskListQuery::default()
        })
        .unwrap_err();
    assert!(matches!(err, TaskServiceError::InvalidQuery(_)));
}

/// Seeds `count` tasks and pins `created_at` to distinct fixed values so
/// createdAt ordering is independent of wall-clock resolution.
fn seed_with_fixed_created_at(conn: &mut Connection, count: usize) {
    let ids = {
        let repo = SqliteTaskRepository::try_new(conn).unwrap();
        let mut service = TaskService::new(repo);
        (0..count)
            .map(|i| {
                service
                    .create_task(NewTask::titled(format!("Seeded task {i}")))
                    .unwrap()
                    .uuid
            })
            .collect::<Vec<_>>()
    };
    for (i, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE tasks SET created_at = ?1 WHERE uuid = ?2;",
            rusqlite::params![1_000_000 + i as i64, id.to_string()],
        )
        .unwrap();
    }
}
