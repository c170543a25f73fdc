use futures::stream;
use pgbulk::test_utils::database::spawn_database;
use pgbulk::test_utils::mapping::{SampleUser, sample_user_mapping_in, sample_user_table_ddl};
use pgbulk::{BulkImporter, ErrorKind, ImportConfig, NullMode};
use telemetry::tracing::init_test_tracing;

use crate::read_users;

#[tokio::test(flavor = "multi_thread")]
async fn insert_loads_every_entity() {
    init_test_tracing();
    let mut database = spawn_database().await;
    database.run_sql(&sample_user_table_ddl("test")).await;

    let users = vec![
        SampleUser::new(1, "ada@example.com", Some("Ada"), 10),
        SampleUser::new(2, "alan@example.com", None, 20),
        SampleUser::new(3, "grace@example.com", Some("Grace, \"Amazing\""), 30),
    ];

    let importer = BulkImporter::new(ImportConfig::default());
    let rows = importer
        .insert(database.client_mut(), &sample_user_mapping_in("test"), users.clone())
        .await
        .unwrap();

    assert_eq!(rows, 3);
    assert_eq!(read_users(database.client()).await, users);
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_with_null_sentinel() {
    init_test_tracing();
    let mut database = spawn_database().await;
    database.run_sql(&sample_user_table_ddl("test")).await;

    let users = vec![
        SampleUser::new(1, "ada@example.com", Some(""), 10),
        SampleUser::new(2, "alan@example.com", None, 20),
    ];

    let importer = BulkImporter::new(
        ImportConfig::builder()
            .null_mode(NullMode::Sentinel)
            .build()
            .unwrap(),
    );
    importer
        .insert(database.client_mut(), &sample_user_mapping_in("test"), users.clone())
        .await
        .unwrap();

    assert_eq!(read_users(database.client()).await, users);
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_streams_large_lazy_input() {
    init_test_tracing();
    let mut database = spawn_database().await;
    database.run_sql(&sample_user_table_ddl("test")).await;

    let count = 100_000;
    let users = (0..count).map(|id| SampleUser::new(id, &format!("user{id}@example.com"), None, 1));

    let importer = BulkImporter::new(ImportConfig::default());
    let rows = importer
        .insert(database.client_mut(), &sample_user_mapping_in("test"), users)
        .await
        .unwrap();

    assert_eq!(rows, count as u64);
    let stored: i64 = database
        .client()
        .query_one("select count(*) from test.users", &[])
        .await
        .unwrap()
        .get(0);
    assert_eq!(stored, count);
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_from_stream() {
    init_test_tracing();
    let mut database = spawn_database().await;
    database.run_sql(&sample_user_table_ddl("test")).await;

    let users = vec![
        SampleUser::new(1, "ada@example.com", Some("Ada"), 10),
        SampleUser::new(2, "alan@example.com", None, 20),
    ];

    let importer = BulkImporter::new(ImportConfig::default());
    let rows = importer
        .insert_stream(
            database.client_mut(),
            &sample_user_mapping_in("test"),
            stream::iter(users.clone()),
        )
        .await
        .unwrap();

    assert_eq!(rows, 2);
    assert_eq!(read_users(database.client()).await, users);
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_inside_transaction_is_rolled_back() {
    init_test_tracing();
    let mut database = spawn_database().await;
    database.run_sql(&sample_user_table_ddl("test")).await;

    let importer = BulkImporter::new(ImportConfig::default());
    let mapping = sample_user_mapping_in("test");
    {
        let mut transaction = database.client_mut().transaction().await.unwrap();
        let rows = importer
            .insert(
                &mut transaction,
                &mapping,
                vec![SampleUser::new(1, "ada@example.com", None, 1)],
            )
            .await
            .unwrap();
        assert_eq!(rows, 1);
        transaction.rollback().await.unwrap();
    }

    assert!(read_users(database.client()).await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn constraint_violation_fails_the_load() {
    init_test_tracing();
    let mut database = spawn_database().await;
    database.run_sql(&sample_user_table_ddl("test")).await;

    let users = vec![
        SampleUser::new(1, "ada@example.com", None, 1),
        SampleUser::new(1, "other@example.com", None, 1),
    ];

    let importer = BulkImporter::new(ImportConfig::default());
    let err = importer
        .insert(database.client_mut(), &sample_user_mapping_in("test"), users)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LoadFailed);
    assert!(read_users(database.client()).await.is_empty());
}
