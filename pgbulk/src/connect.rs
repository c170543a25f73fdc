//! Opening sessions from a [`PgConnectionConfig`].

use std::io::BufReader;

use config::shared::{IntoConnectOptions, PgConnectionConfig};
use rustls::ClientConfig;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{Client, Config, Connection, NoTls, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, error, info};

use crate::error::BulkResult;

/// Spawns a background task driving a Postgres connection until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        match connection.await {
            Err(err) => error!("an error occurred during the postgres connection: {}", err),
            Ok(()) => info!("postgres connection terminated successfully"),
        }
    }
    .instrument(span);

    // The connection ends once its `Client` is dropped.
    tokio::spawn(task);
}

/// Connects to the configured database, using TLS when enabled.
///
/// The returned [`Client`] implements [`crate::session::BulkSession`] directly and can open
/// transactions that do as well.
pub async fn connect(pg_connection_config: &PgConnectionConfig) -> BulkResult<Client> {
    pg_connection_config.validate()?;

    match pg_connection_config.tls.enabled {
        true => connect_tls(pg_connection_config).await,
        false => connect_no_tls(pg_connection_config).await,
    }
}

async fn connect_no_tls(pg_connection_config: &PgConnectionConfig) -> BulkResult<Client> {
    let config: Config = pg_connection_config.with_db();
    let (client, connection) = config.connect(NoTls).await?;
    spawn_postgres_connection::<NoTls>(connection);

    info!(host = %pg_connection_config.host, "connected to postgres without tls");

    Ok(client)
}

async fn connect_tls(pg_connection_config: &PgConnectionConfig) -> BulkResult<Client> {
    let config: Config = pg_connection_config.with_db();

    let mut root_store = rustls::RootCertStore::empty();
    let mut root_certs_reader =
        BufReader::new(pg_connection_config.tls.trusted_root_certs.as_bytes());
    for cert in rustls_pemfile::certs(&mut root_certs_reader) {
        root_store.add(cert?)?;
    }

    let tls_config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let (client, connection) = config.connect(MakeRustlsConnect::new(tls_config)).await?;
    spawn_postgres_connection::<MakeRustlsConnect>(connection);

    info!(host = %pg_connection_config.host, "connected to postgres with tls");

    Ok(client)
}

#[cfg(test)]
mod tests {
    use config::shared::TlsConfig;

    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn tls_without_certificates_is_rejected() {
        let config = PgConnectionConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "postgres".to_string(),
            username: "postgres".to_string(),
            password: None,
            tls: TlsConfig {
                trusted_root_certs: String::new(),
                enabled: true,
            },
        };

        let err = connect(&config).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
