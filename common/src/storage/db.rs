use crate::{error::AppError, utils::config::AppConfig};

use super::types::{RecordKey, StoredObject};
use serde::Serialize;
use std::{ops::Deref, sync::Arc, time::Duration};
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Surreal,
};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{info, warn};

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}
pub trait ProvidesDb {
    fn db(&self) -> &Arc<SurrealDbClient>;
}

impl SurrealDbClient {
    /// # Initialize a new database client
    ///
    /// # Arguments
    /// * `address` - Engine address, e.g. `ws://localhost:8000`
    /// * `username`, `password` - Root credentials
    /// * `namespace`, `database` - Where the inventory lives
    ///
    /// # Returns
    /// * `SurrealDbClient` initialized
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        // Sign in to database
        db.signin(Root { username, password }).await?;

        // Set namespace
        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Connects using the configured credentials, trying at most
    /// `db_connect_attempts` times with exponential backoff in between.
    pub async fn connect_with_retry(config: &AppConfig) -> Result<Self, Error> {
        let max_attempts = config.db_connect_attempts.max(1);
        let retry_strategy = ExponentialBackoff::from_millis(2)
            .factor(500)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(max_attempts.saturating_sub(1));

        let mut attempt: usize = 0;
        Retry::spawn(retry_strategy, || {
            attempt = attempt.saturating_add(1);
            let current = attempt;
            async move {
                let result = Self::new(
                    &config.surrealdb_address,
                    &config.surrealdb_username,
                    &config.surrealdb_password,
                    &config.surrealdb_namespace,
                    &config.surrealdb_database,
                )
                .await;
                match &result {
                    Ok(_) => info!(attempt = current, "Connected to database"),
                    Err(e) => warn!(
                        attempt = current,
                        max_attempts,
                        error = %e,
                        "Database connection attempt failed"
                    ),
                }
                result
            }
        })
        .await
    }

    /// Defines the inventory tables and their lookup indexes. Safe to run on
    /// every startup.
    pub async fn ensure_initialized(&self) -> Result<(), AppError> {
        self.client
            .query(
                "DEFINE TABLE IF NOT EXISTS site SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_site_department ON site FIELDS department;
                DEFINE INDEX IF NOT EXISTS idx_site_primary_url ON site FIELDS primary_url;
                DEFINE TABLE IF NOT EXISTS contact SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_contact_department ON contact FIELDS department;",
            )
            .await?
            .check()?;
        Ok(())
    }

    /// Retrieves a single record by its integer key.
    pub async fn get_item<T>(&self, id: i64) -> Result<Option<T>, Error>
    where
        T: StoredObject,
    {
        self.client
            .query("SELECT * FROM type::thing($table, $id)")
            .bind(("table", T::table_name()))
            .bind(("id", id))
            .await?
            .take(0)
    }

    /// Retrieves every record of a table, ordered by key.
    pub async fn get_all_stored_items<T>(&self) -> Result<Vec<T>, Error>
    where
        T: StoredObject,
    {
        self.client
            .query("SELECT * FROM type::table($table) ORDER BY id")
            .bind(("table", T::table_name()))
            .await?
            .take(0)
    }

    /// Deletes a single record, returning it as it was before deletion.
    pub async fn delete_item<T>(&self, id: i64) -> Result<Option<T>, Error>
    where
        T: StoredObject,
    {
        self.client
            .query("DELETE type::thing($table, $id) RETURN BEFORE")
            .bind(("table", T::table_name()))
            .bind(("id", id))
            .await?
            .take(0)
    }

    /// Next free integer key of a table: one past the largest key in use,
    /// or 1 for an empty table.
    pub async fn next_record_id<T>(&self) -> Result<i64, Error>
    where
        T: StoredObject,
    {
        let keys: Vec<RecordKey> = self
            .client
            .query("SELECT id FROM type::table($table)")
            .bind(("table", T::table_name()))
            .await?
            .take(0)?;

        Ok(keys
            .iter()
            .map(|key| key.id)
            .max()
            .map_or(1, |max| max.saturating_add(1)))
    }

    /// Creates a record under the next free integer key. When a concurrent
    /// writer takes that key first, the key is recomputed and the create
    /// tried again, up to `CREATE_ATTEMPTS` times.
    pub async fn create_with_next_id<T, C>(&self, content: C) -> Result<T, AppError>
    where
        T: StoredObject,
        C: Serialize + Clone + Send + 'static,
    {
        for attempt in 1..=CREATE_ATTEMPTS {
            let id = self.next_record_id::<T>().await?;
            match self.create_record::<T, C>(id, content.clone()).await {
                Ok(Some(record)) => return Ok(record),
                Ok(None) => break,
                Err(e) if is_key_conflict(&e) && attempt < CREATE_ATTEMPTS => {
                    warn!(
                        table = T::table_name(),
                        id, attempt, "Key taken by a concurrent create, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::InternalError(format!(
            "Failed to create a {} record",
            T::table_name()
        )))
    }

    async fn create_record<T, C>(&self, id: i64, content: C) -> Result<Option<T>, Error>
    where
        T: StoredObject,
        C: Serialize + Send + 'static,
    {
        self.client
            .query("CREATE type::thing($table, $id) CONTENT $content")
            .bind(("table", T::table_name()))
            .bind(("id", id))
            .bind(("content", content))
            .await?
            .take(0)
    }
}

const CREATE_ATTEMPTS: usize = 5;

/// Whether a failed create lost a race for its key, either to a record
/// that already exists or to a conflicting transaction.
fn is_key_conflict(err: &Error) -> bool {
    let message = err.to_string();
    message.contains("already exists") || message.contains("conflict")
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// A batch of statements sent as one `BEGIN … COMMIT` query. Either every
/// statement is applied or none is.
#[derive(Debug, Default)]
pub struct Transaction {
    statements: Vec<String>,
    bindings: serde_json::Map<String, serde_json::Value>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    /// Binds a parameter referenced as `$name` by the pushed statements.
    pub fn bind<V: Serialize>(&mut self, name: impl Into<String>, value: V) -> Result<(), AppError> {
        let value = serde_json::to_value(value)
            .map_err(|e| AppError::InternalError(format!("Failed to bind parameter: {e}")))?;
        self.bindings.insert(name.into(), value);
        Ok(())
    }

    /// Sends the batch. An empty batch performs no round trip.
    pub async fn commit(self, db: &SurrealDbClient) -> Result<(), AppError> {
        if self.statements.is_empty() {
            return Ok(());
        }

        let mut query = String::from("BEGIN TRANSACTION;\n");
        for statement in &self.statements {
            query.push_str(statement.trim_end_matches(';'));
            query.push_str(";\n");
        }
        query.push_str("COMMIT TRANSACTION;");

        db.client
            .query(query)
            .bind(self.bindings)
            .await?
            .check()?;

        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}

#[cfg(test)]
mod tests {
    use crate::stored_object;

    use super::*;
    use uuid::Uuid;

    stored_object!(Dummy, "dummy", {
        name: String
    });

    async fn memory_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_initialized()
            .await
            .expect("Failed to initialize schema");
        db
    }

    async fn insert_dummy(db: &SurrealDbClient, id: i64, name: &str) {
        db.client
            .query("CREATE type::thing('dummy', $id) SET name = $name")
            .bind(("id", id))
            .bind(("name", name.to_string()))
            .await
            .expect("create dummy")
            .check()
            .expect("create dummy statement");
    }

    #[tokio::test]
    async fn test_initialization_is_repeatable() {
        let db = memory_db().await;
        db.ensure_initialized()
            .await
            .expect("Second initialization should succeed");
    }

    #[tokio::test]
    async fn test_crud_with_integer_keys() {
        let db = memory_db().await;

        assert_eq!(db.next_record_id::<Dummy>().await.expect("next id"), 1);

        insert_dummy(&db, 1, "first").await;
        insert_dummy(&db, 10, "tenth").await;
        insert_dummy(&db, 2, "second").await;

        let fetched: Option<Dummy> = db.get_item(10).await.expect("get item");
        assert_eq!(
            fetched,
            Some(Dummy {
                id: 10,
                name: "tenth".to_string()
            })
        );

        let all: Vec<Dummy> = db.get_all_stored_items().await.expect("get all");
        let ids: Vec<i64> = all.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2, 10]);

        assert_eq!(db.next_record_id::<Dummy>().await.expect("next id"), 11);

        let deleted: Option<Dummy> = db.delete_item(2).await.expect("delete");
        assert_eq!(deleted.map(|d| d.name), Some("second".to_string()));

        let missing: Option<Dummy> = db.get_item(2).await.expect("get deleted");
        assert!(missing.is_none());
    }

    #[derive(Clone, Serialize)]
    struct NewDummy {
        name: String,
    }

    fn new_dummy(name: &str) -> NewDummy {
        NewDummy {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_with_next_id_skips_past_largest_key() {
        let db = memory_db().await;
        insert_dummy(&db, 7, "seventh").await;

        let created: Dummy = db
            .create_with_next_id(new_dummy("eighth"))
            .await
            .expect("create");
        assert_eq!(created.id, 8);
        assert_eq!(created.name, "eighth");
    }

    #[tokio::test]
    async fn test_taken_key_is_a_conflict() {
        let db = memory_db().await;
        insert_dummy(&db, 1, "first").await;

        let err = db
            .create_record::<Dummy, _>(1, new_dummy("again"))
            .await
            .expect_err("key 1 is taken");
        assert!(is_key_conflict(&err), "unexpected error: {err}");

        let kept: Option<Dummy> = db.get_item(1).await.expect("get item");
        assert_eq!(kept.map(|d| d.name), Some("first".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_keys() {
        let db = memory_db().await;

        let (a, b, c) = tokio::join!(
            db.create_with_next_id::<Dummy, _>(new_dummy("a")),
            db.create_with_next_id::<Dummy, _>(new_dummy("b")),
            db.create_with_next_id::<Dummy, _>(new_dummy("c")),
        );
        let mut ids = vec![
            a.expect("create a").id,
            b.expect("create b").id,
            c.expect("create c").id,
        ];
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);

        let all: Vec<Dummy> = db.get_all_stored_items().await.expect("get all");
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_stored_object_columns() {
        assert_eq!(Dummy::columns(), &["id", "name"]);
        assert_eq!(Dummy::table_name(), "dummy");
    }

    #[tokio::test]
    async fn test_transaction_commits_all_statements() {
        let db = memory_db().await;
        insert_dummy(&db, 1, "a").await;
        insert_dummy(&db, 2, "b").await;

        let mut tx = Transaction::new();
        for (index, id) in [1_i64, 2].iter().enumerate() {
            tx.push(format!("UPDATE type::thing('dummy', $id_{index}) SET name = 'renamed'"));
            tx.bind(format!("id_{index}"), id).expect("bind");
        }
        tx.commit(&db).await.expect("commit");

        let all: Vec<Dummy> = db.get_all_stored_items().await.expect("get all");
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|d| d.name == "renamed"));
    }

    #[tokio::test]
    async fn test_failed_transaction_leaves_store_unchanged() {
        let db = memory_db().await;
        insert_dummy(&db, 1, "original").await;

        let mut tx = Transaction::new();
        tx.push("UPDATE dummy:1 SET name = 'changed'");
        tx.push("THROW 'boom'");
        let result = tx.commit(&db).await;
        assert!(result.is_err());

        let fetched: Option<Dummy> = db.get_item(1).await.expect("get item");
        assert_eq!(fetched.map(|d| d.name), Some("original".to_string()));
    }

    #[tokio::test]
    async fn test_empty_transaction_is_noop() {
        let db = memory_db().await;
        Transaction::new()
            .commit(&db)
            .await
            .expect("empty commit");
    }

    #[tokio::test]
    async fn test_connect_with_retry_gives_up_after_attempts() {
        let config = AppConfig {
            surrealdb_address: "ws://127.0.0.1:1".to_string(),
            db_connect_attempts: 2,
            ..AppConfig::default()
        };

        let result = SurrealDbClient::connect_with_retry(&config).await;
        assert!(result.is_err());
    }
}
