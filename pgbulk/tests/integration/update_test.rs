use futures::stream;
use pgbulk::test_utils::database::spawn_database;
use pgbulk::test_utils::mapping::{SampleUser, sample_user_mapping_in, sample_user_table_ddl};
use pgbulk::{BulkImporter, ErrorKind, ImportConfig};
use postgres::tokio::test_utils::PgDatabase;
use telemetry::tracing::init_test_tracing;

use crate::{read_users, staging_relations};

async fn seeded_database() -> PgDatabase {
    let database = spawn_database().await;
    database.run_sql(&sample_user_table_ddl("test")).await;
    database
        .run_sql(
            "insert into test.users (id, email, name, score) values
                (1, 'ada@example.com', 'Ada', 10),
                (2, 'alan@example.com', 'Alan', 20),
                (3, 'grace@example.com', 'Grace', 30)",
        )
        .await;

    database
}

#[tokio::test(flavor = "multi_thread")]
async fn update_matches_on_identifiers() {
    init_test_tracing();
    let mut database = seeded_database().await;

    let changes = vec![
        SampleUser::new(1, "ada@example.com", Some("Countess"), 11),
        SampleUser::new(3, "grace@example.com", None, 33),
        SampleUser::new(4, "nobody@example.com", None, 0),
    ];

    let importer = BulkImporter::new(ImportConfig::default());
    let rows = importer
        .update(database.client_mut(), &sample_user_mapping_in("test"), changes)
        .await
        .unwrap();

    assert_eq!(rows, 2);
    assert_eq!(
        read_users(database.client()).await,
        vec![
            SampleUser::new(1, "ada@example.com", Some("Countess"), 11),
            SampleUser::new(2, "alan@example.com", Some("Alan"), 20),
            SampleUser::new(3, "grace@example.com", None, 33),
        ]
    );
    assert_eq!(staging_relations(database.client()).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_matches_on_configured_columns() {
    init_test_tracing();
    let mut database = seeded_database().await;

    // The id carried by the entity is ignored: rows match on email.
    let changes = vec![SampleUser::new(99, "alan@example.com", Some("ignored"), 21)];

    let importer = BulkImporter::new(
        ImportConfig::builder()
            .match_columns(["email"])
            .update_columns(["score"])
            .index_staging(true)
            .build()
            .unwrap(),
    );
    let rows = importer
        .update(database.client_mut(), &sample_user_mapping_in("test"), changes)
        .await
        .unwrap();

    assert_eq!(rows, 1);
    assert_eq!(
        read_users(database.client()).await[1],
        SampleUser::new(2, "alan@example.com", Some("Alan"), 21)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn update_from_stream() {
    init_test_tracing();
    let mut database = seeded_database().await;

    let importer = BulkImporter::new(ImportConfig::default());
    let rows = importer
        .update_stream(
            database.client_mut(),
            &sample_user_mapping_in("test"),
            stream::iter(vec![SampleUser::new(2, "alan@example.com", None, 0)]),
        )
        .await
        .unwrap();

    assert_eq!(rows, 1);
    assert_eq!(
        read_users(database.client()).await[1],
        SampleUser::new(2, "alan@example.com", None, 0)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_update_leaves_no_staging_behind() {
    init_test_tracing();
    let mut database = seeded_database().await;

    // Violates the unique constraint on email.
    let changes = vec![SampleUser::new(1, "alan@example.com", None, 0)];

    let importer = BulkImporter::new(ImportConfig::default());
    let err = importer
        .update(database.client_mut(), &sample_user_mapping_in("test"), changes)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReconciliationFailed);
    assert_eq!(staging_relations(database.client()).await, 0);
    assert_eq!(
        read_users(database.client()).await[0],
        SampleUser::new(1, "ada@example.com", Some("Ada"), 10)
    );
}
