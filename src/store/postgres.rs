// PostgreSQL-backed document store.
//
// Documents live in a single JSONB table keyed by (collection, key). Conditional
// creation relies on the primary key (`ON CONFLICT DO NOTHING`), increments are
// single UPDATE statements, and writes publish the collection name on a NOTIFY
// channel so every process sharing the database sees changes.

use super::{stamp_created_at, ChangeFeed, Collection, CreateOutcome, DocumentStore, NewDocument, StoredDocument};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions};
use sqlx::Row;
use std::sync::Arc;
use tokio::sync::watch;
use log::{debug, error, info, warn};

const NOTIFY_CHANNEL: &str = "documents_changed";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    key        TEXT NOT NULL,
    body       JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (collection, key)
)"#;

const INSERT_IF_ABSENT: &str =
    "INSERT INTO documents (collection, key, body) VALUES ($1, $2, $3) ON CONFLICT (collection, key) DO NOTHING";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    feed: Arc<ChangeFeed>,
}

impl PostgresStore {
    /// Connects, creates the schema if needed and starts the change listener.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        info!("Connected to document database");

        let store = Self {
            pool,
            feed: Arc::new(ChangeFeed::new()),
        };
        store.spawn_listener().await?;
        Ok(store)
    }

    async fn spawn_listener(&self) -> Result<()> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(NOTIFY_CHANNEL).await?;
        let feed = self.feed.clone();

        tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => match Collection::parse(notification.payload()) {
                        Some(collection) => feed.notify(collection),
                        None => warn!("Ignoring change notification for '{}'", notification.payload()),
                    },
                    Err(e) => {
                        // PgListener reconnects on the next recv; changes missed meanwhile
                        // are picked up by the next delivered notification.
                        error!("Change listener error: {}", e);
                        for collection in Collection::ALL {
                            feed.notify(collection);
                        }
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });
        Ok(())
    }

    async fn publish(&self, collection: Collection) {
        let result = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(collection.as_str())
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            warn!("Failed to publish change for {}: {}", collection, e);
            // Local subscribers still see the write.
            self.feed.notify(collection);
        }
    }
}

/// Proper prefixes of `path`, shortest first.
fn parent_paths(path: &[&str]) -> Vec<Vec<String>> {
    (1..path.len())
        .map(|len| path[..len].iter().map(|segment| segment.to_string()).collect())
        .collect()
}

fn not_found(collection: Collection, key: &str) -> Error {
    Error::NotFound {
        collection: collection.to_string(),
        key: key.to_string(),
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn create_if_absent(&self, collection: Collection, key: &str, mut body: Value) -> Result<bool> {
        stamp_created_at(&mut body);
        let result = sqlx::query(INSERT_IF_ABSENT)
            .bind(collection.as_str())
            .bind(key)
            .bind(body)
            .execute(&self.pool)
            .await?;

        let created = result.rows_affected() == 1;
        if created {
            self.publish(collection).await;
        } else {
            debug!("{}/{} already exists", collection, key);
        }
        Ok(created)
    }

    async fn create_all_if_absent(&self, documents: Vec<NewDocument>) -> Result<CreateOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut touched = Vec::new();

        for mut doc in documents {
            stamp_created_at(&mut doc.body);
            let result = sqlx::query(INSERT_IF_ABSENT)
                .bind(doc.collection.as_str())
                .bind(&doc.key)
                .bind(doc.body)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(CreateOutcome::Conflict {
                    collection: doc.collection,
                    key: doc.key,
                });
            }
            if !touched.contains(&doc.collection) {
                touched.push(doc.collection);
            }
        }
        tx.commit().await?;

        for collection in touched {
            self.publish(collection).await;
        }
        Ok(CreateOutcome::Created)
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND key = $2")
            .bind(collection.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get::<Value, _>("body")?)),
            None => Ok(None),
        }
    }

    async fn list(&self, collection: Collection) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query("SELECT key, body FROM documents WHERE collection = $1 ORDER BY created_at DESC")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StoredDocument {
                    key: row.try_get("key")?,
                    body: row.try_get("body")?,
                })
            })
            .collect()
    }

    async fn atomic_increment(&self, collection: Collection, key: &str, field: &str, delta: i64) -> Result<i64> {
        let row = sqlx::query(
            "UPDATE documents \
             SET body = jsonb_set(body, ARRAY[$3::text], to_jsonb(COALESCE((body->>$3)::bigint, 0) + $4), true) \
             WHERE collection = $1 AND key = $2 \
             RETURNING (body->>$3)::bigint AS value",
        )
        .bind(collection.as_str())
        .bind(key)
        .bind(field)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(collection, key))?;

        let value: i64 = row.try_get("value")?;
        self.publish(collection).await;
        Ok(value)
    }

    async fn set_field(&self, collection: Collection, key: &str, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            return Err(Error::InvalidInput("empty field path".to_string()));
        }
        // jsonb_set only creates the last path segment, so missing parents are seeded first.
        let mut tx = self.pool.begin().await?;
        for parent in parent_paths(path) {
            sqlx::query(
                "UPDATE documents \
                 SET body = jsonb_set(body, $3::text[], COALESCE(body #> $3::text[], '{}'::jsonb), true) \
                 WHERE collection = $1 AND key = $2",
            )
            .bind(collection.as_str())
            .bind(key)
            .bind(parent)
            .execute(&mut *tx)
            .await?;
        }

        let full_path: Vec<String> = path.iter().map(|segment| segment.to_string()).collect();
        let row = sqlx::query(
            "UPDATE documents SET body = jsonb_set(body, $3::text[], $4, true) \
             WHERE collection = $1 AND key = $2 \
             RETURNING (body #> $3::text[]) = $4 AS applied",
        )
        .bind(collection.as_str())
        .bind(key)
        .bind(full_path)
        .bind(value)
        .fetch_optional(&mut *tx)
        .await?;

        let applied: bool = match row {
            Some(row) => row.try_get("applied")?,
            None => {
                tx.rollback().await?;
                return Err(not_found(collection, key));
            }
        };
        if !applied {
            // A parent exists but is not an object.
            tx.rollback().await?;
            return Err(Error::CorruptDocument {
                collection: collection.to_string(),
                key: key.to_string(),
                reason: format!("cannot set {}", path.join(".")),
            });
        }
        tx.commit().await?;

        self.publish(collection).await;
        Ok(())
    }

    fn changes(&self, collection: Collection) -> watch::Receiver<u64> {
        self.feed.subscribe(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_paths_cover_every_missing_level() {
        assert!(parent_paths(&["lastLogin"]).is_empty());
        assert_eq!(parent_paths(&["votes", "Mint1"]), vec![vec!["votes".to_string()]]);
        assert_eq!(
            parent_paths(&["a", "b", "c"]),
            vec![vec!["a".to_string()], vec!["a".to_string(), "b".to_string()]]
        );
    }
}
