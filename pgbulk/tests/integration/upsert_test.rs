use pgbulk::test_utils::database::spawn_database;
use pgbulk::test_utils::mapping::{SampleUser, sample_user_mapping_in, sample_user_table_ddl};
use pgbulk::{BulkImporter, ConflictMode, ErrorKind, ImportConfig, StagingKind};
use postgres::tokio::test_utils::PgDatabase;
use telemetry::tracing::init_test_tracing;

use crate::{read_users, staging_relations};

async fn seeded_database() -> PgDatabase {
    let database = spawn_database().await;
    database.run_sql(&sample_user_table_ddl("test")).await;
    database
        .run_sql(
            "insert into test.users (id, email, name, score) values
                (1, 'ada@example.com', 'Ada', 10)",
        )
        .await;

    database
}

fn incoming() -> Vec<SampleUser> {
    vec![
        SampleUser::new(1, "ada@example.com", Some("Countess"), 99),
        SampleUser::new(2, "alan@example.com", Some("Alan"), 20),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn fail_mode_rejects_conflicts() {
    init_test_tracing();
    let mut database = seeded_database().await;

    let importer = BulkImporter::new(ImportConfig::default());
    let err = importer
        .upsert(database.client_mut(), &sample_user_mapping_in("test"), incoming())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReconciliationFailed);
    assert_eq!(read_users(database.client()).await.len(), 1);
    assert_eq!(staging_relations(database.client()).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn fail_mode_inserts_without_conflicts() {
    init_test_tracing();
    let mut database = seeded_database().await;

    let importer = BulkImporter::new(ImportConfig::default());
    let rows = importer
        .upsert(
            database.client_mut(),
            &sample_user_mapping_in("test"),
            vec![SampleUser::new(5, "new@example.com", None, 5)],
        )
        .await
        .unwrap();

    assert_eq!(rows, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn skip_mode_keeps_existing_rows() {
    init_test_tracing();
    let mut database = seeded_database().await;

    let importer = BulkImporter::new(
        ImportConfig::builder()
            .conflict_mode(ConflictMode::Skip)
            .build()
            .unwrap(),
    );
    let rows = importer
        .upsert(database.client_mut(), &sample_user_mapping_in("test"), incoming())
        .await
        .unwrap();

    assert_eq!(rows, 1);
    assert_eq!(
        read_users(database.client()).await,
        vec![
            SampleUser::new(1, "ada@example.com", Some("Ada"), 10),
            SampleUser::new(2, "alan@example.com", Some("Alan"), 20),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn replace_all_refreshes_every_column() {
    init_test_tracing();
    let mut database = seeded_database().await;

    let importer = BulkImporter::new(
        ImportConfig::builder()
            .conflict_mode(ConflictMode::ReplaceAll)
            .conflict_columns(["id"])
            .build()
            .unwrap(),
    );
    let rows = importer
        .upsert(database.client_mut(), &sample_user_mapping_in("test"), incoming())
        .await
        .unwrap();

    assert_eq!(rows, 2);
    assert_eq!(read_users(database.client()).await, incoming());
}

#[tokio::test(flavor = "multi_thread")]
async fn replace_specified_refreshes_listed_columns() {
    init_test_tracing();
    let mut database = seeded_database().await;

    let importer = BulkImporter::new(
        ImportConfig::builder()
            .conflict_mode(ConflictMode::ReplaceSpecified)
            .conflict_columns(["email"])
            .update_columns(["name"])
            .staging_kind(StagingKind::Unlogged)
            .index_staging(true)
            .build()
            .unwrap(),
    );
    let rows = importer
        .upsert(database.client_mut(), &sample_user_mapping_in("test"), incoming())
        .await
        .unwrap();

    assert_eq!(rows, 2);
    assert_eq!(
        read_users(database.client()).await,
        vec![
            SampleUser::new(1, "ada@example.com", Some("Countess"), 10),
            SampleUser::new(2, "alan@example.com", Some("Alan"), 20),
        ]
    );
    assert_eq!(staging_relations(database.client()).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn upsert_inside_transaction_commits() {
    init_test_tracing();
    let mut database = seeded_database().await;

    let importer = BulkImporter::new(
        ImportConfig::builder()
            .conflict_mode(ConflictMode::ReplaceAll)
            .conflict_columns(["id"])
            .build()
            .unwrap(),
    );
    let mapping = sample_user_mapping_in("test");

    let mut transaction = database.client_mut().transaction().await.unwrap();
    let rows = importer
        .upsert(&mut transaction, &mapping, incoming())
        .await
        .unwrap();
    transaction.commit().await.unwrap();

    assert_eq!(rows, 2);
    assert_eq!(read_users(database.client()).await, incoming());
}
