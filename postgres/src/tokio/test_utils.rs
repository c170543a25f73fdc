use config::shared::{IntoConnectOptions, PgConnectionConfig};
use tokio::runtime::Handle;
use tokio_postgres::{Client, NoTls};
use tracing::{info, warn};

/// A throwaway Postgres database that lives as long as this value.
///
/// The database is created on construction and dropped, together with every connection to it,
/// when the value is dropped.
pub struct PgDatabase {
    pub config: PgConnectionConfig,
    pub client: Option<Client>,
    destroy_on_drop: bool,
}

impl PgDatabase {
    /// Creates a new database named after `config.name` and connects to it.
    pub async fn new(config: PgConnectionConfig) -> Self {
        let client = create_pg_database(&config).await;

        Self {
            config,
            client: Some(client),
            destroy_on_drop: true,
        }
    }

    /// Opens another connection to the same database.
    ///
    /// The returned value never drops the database.
    pub async fn duplicate(&self) -> Self {
        let client = connect_to_pg_database(&self.config).await;

        Self {
            config: self.config.clone(),
            client: Some(client),
            destroy_on_drop: false,
        }
    }

    /// Returns the connected client.
    pub fn client(&self) -> &Client {
        self.client.as_ref().expect("client is only taken on drop")
    }

    /// Returns the connected client mutably, for operations that need exclusive access.
    pub fn client_mut(&mut self) -> &mut Client {
        self.client.as_mut().expect("client is only taken on drop")
    }

    /// Runs a batch of statements.
    pub async fn run_sql(&self, sql: &str) {
        self.client()
            .batch_execute(sql)
            .await
            .expect("Failed to run sql");
    }
}

impl Drop for PgDatabase {
    fn drop(&mut self) {
        // The client has to be gone before the database can be dropped.
        drop(self.client.take());

        if self.destroy_on_drop {
            tokio::task::block_in_place(move || {
                Handle::current().block_on(async move { drop_pg_database(&self.config).await });
            });
        }
    }
}

/// Connects to the server and spawns the connection driver.
async fn connect(config: tokio_postgres::Config) -> Client {
    let (client, connection) = config
        .connect(NoTls)
        .await
        .expect("Failed to connect to Postgres");

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            info!("test database connection closed: {err}");
        }
    });

    client
}

/// Creates a new Postgres database and returns a client connected to it.
///
/// # Panics
/// Panics if connection or database creation fails.
pub async fn create_pg_database(config: &PgConnectionConfig) -> Client {
    let client = connect(config.without_db()).await;
    client
        .execute(
            &format!(
                "create database {}",
                pg_escape::quote_identifier(&config.name)
            ),
            &[],
        )
        .await
        .expect("Failed to create database");

    connect_to_pg_database(config).await
}

/// Connects to an existing Postgres database.
pub async fn connect_to_pg_database(config: &PgConnectionConfig) -> Client {
    connect(config.with_db()).await
}

/// Terminates every connection to the database and drops it.
///
/// Errors are logged and ignored so cleanup never fails a test.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let (client, connection) = match config.without_db().connect(NoTls).await {
        Ok(result) => result,
        Err(err) => {
            warn!("failed to connect to Postgres for cleanup: {err}");
            return;
        }
    };
    tokio::spawn(connection);

    if let Err(err) = client
        .execute(
            "select pg_terminate_backend(pid) from pg_stat_activity \
             where datname = $1 and pid <> pg_backend_pid()",
            &[&config.name],
        )
        .await
    {
        warn!(
            "failed to terminate connections for database {}: {err}",
            config.name
        );
    }

    if let Err(err) = client
        .execute(
            &format!(
                "drop database if exists {}",
                pg_escape::quote_identifier(&config.name)
            ),
            &[],
        )
        .await
    {
        warn!("failed to drop database {}: {err}", config.name);
    }
}
