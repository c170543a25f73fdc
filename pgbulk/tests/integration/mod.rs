mod insert_test;
mod types_test;
mod update_test;
mod upsert_test;

use pgbulk::test_utils::mapping::SampleUser;
use tokio_postgres::Client;

/// Reads every row of `test.users` ordered by id.
pub async fn read_users(client: &Client) -> Vec<SampleUser> {
    client
        .query("select id, email, name, score from test.users order by id", &[])
        .await
        .unwrap()
        .into_iter()
        .map(|row| SampleUser {
            id: row.get(0),
            email: row.get(1),
            name: row.get(2),
            score: row.get(3),
        })
        .collect()
}

/// Number of relations in `pg_temp` whose name starts with the default staging prefix.
pub async fn staging_relations(client: &Client) -> i64 {
    client
        .query_one(
            "select count(*) from pg_class where relname like 'bulk\\_staging\\_%'",
            &[],
        )
        .await
        .unwrap()
        .get(0)
}
