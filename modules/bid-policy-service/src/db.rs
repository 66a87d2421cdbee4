//! SQLite document store for bid policies.
//!
//! Rule trees are kept in their persisted document form as JSON text and are
//! decoded with the trusting document codec on every read.

use async_trait::async_trait;
use bid_policy_types::{DocumentError, Policy, document};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OptionalExtension;

use crate::error::RepositoryError;
use crate::repository::PolicyRepository;

type DbConn = PooledConnection<SqliteConnectionManager>;

#[derive(Clone)]
pub struct Db {
    pool: Pool<SqliteConnectionManager>,
}

impl Db {
    pub fn open(path: &str, pool_size: u32) -> Result<Self, RepositoryError> {
        let init = |conn: &mut rusqlite::Connection| {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
        };

        let pool = if path == ":memory:" {
            // Each in-memory connection is its own database, so keep exactly
            // one and never recycle it.
            Pool::builder()
                .max_size(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .build(SqliteConnectionManager::memory().with_init(init))?
        } else {
            Pool::builder()
                .max_size(pool_size.max(1))
                .build(SqliteConnectionManager::file(path).with_init(init))?
        };

        let db = Self { pool };
        db.create_tables()?;
        Ok(db)
    }

    pub(crate) fn conn(&self) -> Result<DbConn, RepositoryError> {
        Ok(self.pool.get()?)
    }

    /// Runs blocking SQLite work on the blocking thread pool so callers can
    /// put a deadline on it.
    async fn blocking<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Db) -> Result<T, RepositoryError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| RepositoryError::Backend(format!("blocking task: {}", e)))?
    }

    fn create_tables(&self) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS policies (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                marketplace TEXT NOT NULL,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                rules TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_policies_owner_marketplace
             ON policies(user_id, marketplace)",
            [],
        )?;
        Ok(())
    }

    fn get_policy(&self, owner_id: &str, id: &str) -> Result<Option<Policy>, RepositoryError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, user_id, marketplace, name, type, rules
                 FROM policies
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, owner_id],
                |row| row_to_policy(row),
            )
            .optional()?;
        row.map(PolicyRow::into_policy).transpose()
    }

    fn insert_policy(&self, policy: &Policy) -> Result<String, RepositoryError> {
        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO policies (id, user_id, marketplace, name, type, rules)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                id,
                policy.user_id,
                policy.marketplace,
                policy.name,
                policy.policy_type,
                encode_rules(policy),
            ],
        )?;
        log::debug!("[POLICY_DB] Created policy {} for {}", id, policy.user_id);
        Ok(id)
    }

    fn list_policies(
        &self,
        owner_id: &str,
        marketplace: Option<&str>,
    ) -> Result<Vec<Policy>, RepositoryError> {
        let conn = self.conn()?;
        let marketplace = marketplace.map(str::trim).filter(|m| !m.is_empty());

        let rows: Vec<PolicyRow> = match marketplace {
            Some(m) => {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, marketplace, name, type, rules
                     FROM policies
                     WHERE user_id = ?1 AND marketplace = ?2
                     ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![owner_id, m], |row| row_to_policy(row))?
                    .collect::<Result<_, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, marketplace, name, type, rules
                     FROM policies
                     WHERE user_id = ?1
                     ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![owner_id], |row| row_to_policy(row))?
                    .collect::<Result<_, _>>()?;
                rows
            }
        };

        rows.into_iter().map(PolicyRow::into_policy).collect()
    }

    fn update_policy(&self, owner_id: &str, policy: &Policy) -> Result<bool, RepositoryError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE policies
             SET name = ?1,
                 rules = ?2,
                 updated_at = datetime('now')
             WHERE id = ?3 AND user_id = ?4",
            rusqlite::params![policy.name, encode_rules(policy), policy.id, owner_id],
        )?;
        Ok(changed > 0)
    }

    fn delete_policy(&self, owner_id: &str, id: &str) -> Result<Option<Policy>, RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let row = tx
            .query_row(
                "SELECT id, user_id, marketplace, name, type, rules
                 FROM policies
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, owner_id],
                |row| row_to_policy(row),
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        tx.execute(
            "DELETE FROM policies WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id, owner_id],
        )?;
        tx.commit()?;
        row.into_policy().map(Some)
    }
}

#[async_trait]
impl PolicyRepository for Db {
    async fn get(&self, owner_id: &str, id: &str) -> Result<Option<Policy>, RepositoryError> {
        let (owner_id, id) = (owner_id.to_string(), id.to_string());
        self.blocking(move |db| db.get_policy(&owner_id, &id)).await
    }

    async fn create(&self, policy: &Policy) -> Result<String, RepositoryError> {
        let policy = policy.clone();
        self.blocking(move |db| db.insert_policy(&policy)).await
    }

    async fn list(
        &self,
        owner_id: &str,
        marketplace: Option<&str>,
    ) -> Result<Vec<Policy>, RepositoryError> {
        let owner_id = owner_id.to_string();
        let marketplace = marketplace.map(str::to_string);
        self.blocking(move |db| db.list_policies(&owner_id, marketplace.as_deref()))
            .await
    }

    async fn update(&self, owner_id: &str, policy: &Policy) -> Result<bool, RepositoryError> {
        let (owner_id, policy) = (owner_id.to_string(), policy.clone());
        self.blocking(move |db| db.update_policy(&owner_id, &policy)).await
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<Option<Policy>, RepositoryError> {
        let (owner_id, id) = (owner_id.to_string(), id.to_string());
        self.blocking(move |db| db.delete_policy(&owner_id, &id)).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.blocking(|db| {
            let conn = db.conn()?;
            conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}

fn encode_rules(policy: &Policy) -> Option<String> {
    policy
        .rules
        .as_ref()
        .map(|rules| document::encode(rules).to_string())
}

/// A stored row whose rule document has not been decoded yet.
struct PolicyRow {
    id: String,
    user_id: String,
    marketplace: String,
    name: String,
    policy_type: String,
    rules: Option<String>,
}

impl PolicyRow {
    fn into_policy(self) -> Result<Policy, RepositoryError> {
        let rules = match self.rules.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => {
                let corrupt = |source: DocumentError| RepositoryError::CorruptDocument {
                    id: self.id.clone(),
                    source,
                };
                let doc: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                    corrupt(DocumentError::Malformed {
                        kind: "document",
                        cause: e.to_string(),
                    })
                })?;
                document::decode_optional(Some(&doc)).map_err(corrupt)?
            }
        };

        Ok(Policy {
            id: self.id,
            user_id: self.user_id,
            marketplace: self.marketplace,
            name: self.name,
            policy_type: self.policy_type,
            rules,
        })
    }
}

fn row_to_policy(row: &rusqlite::Row) -> rusqlite::Result<PolicyRow> {
    Ok(PolicyRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        marketplace: row.get(2)?,
        name: row.get(3)?,
        policy_type: row.get(4)?,
        rules: row.get(5)?,
    })
}
