use config::SecretString;
use config::shared::{PgConnectionConfig, TlsConfig};
use postgres::tokio::test_utils::PgDatabase;
use postgres::types::TableName;
use uuid::Uuid;

/// Schema every test relation is created in.
pub const TEST_DATABASE_SCHEMA: &str = "test";

/// Returns `name` qualified with [`TEST_DATABASE_SCHEMA`].
pub fn test_table_name(name: &str) -> TableName {
    TableName::new(Some(TEST_DATABASE_SCHEMA.to_string()), name.to_string())
}

/// Connection settings for a uniquely named database on the local test server.
///
/// Read from `TESTS_DATABASE_HOST`, `TESTS_DATABASE_PORT`, `TESTS_DATABASE_USERNAME` and, if set,
/// `TESTS_DATABASE_PASSWORD`.
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(SecretString::new),
        tls: TlsConfig {
            trusted_root_certs: String::new(),
            enabled: false,
        },
    }
}

/// Creates a fresh database containing an empty [`TEST_DATABASE_SCHEMA`].
///
/// # Panics
///
/// Panics if the database or the schema cannot be created.
pub async fn spawn_database() -> PgDatabase {
    let database = PgDatabase::new(local_pg_connection_config()).await;
    database
        .run_sql(&format!("create schema {TEST_DATABASE_SCHEMA}"))
        .await;

    database
}
