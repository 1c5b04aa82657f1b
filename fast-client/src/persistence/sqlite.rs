//! SQLite persistence backend.
//!
//! One row per preference key. Values are stored as text next to a type
//! tag so a row written by a newer build (or edited by hand) can fail to
//! decode on its own without affecting other keys.

use super::{Persistence, PersistenceError, PrefValue, Preferences, Transform};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// SQLite-backed preferences.
///
/// Uses WAL mode so a CLI `watch` and a concurrent `start` can share the file.
#[derive(Debug, Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Open (or create) the database at `path`.
    pub async fn new(path: &Path) -> Result<Self, PersistenceError> {
        let location = path
            .to_str()
            .ok_or_else(|| PersistenceError::Io(format!("non-UTF-8 path: {}", path.display())))?;
        let options = SqliteConnectOptions::from_str(location)
            .map_err(map_sqlx_error)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        let persistence = Self { pool };
        persistence.run_migrations().await?;
        Ok(persistence)
    }

    /// Create an in-memory database (for testing).
    pub async fn in_memory() -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(":memory:").map_err(map_sqlx_error)?;

        // A single connection that never recycles; each new connection would
        // otherwise see a fresh, empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        let persistence = Self { pool };
        persistence.run_migrations().await?;
        Ok(persistence)
    }

    async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value_type TEXT NOT NULL,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    /// Write a raw row, bypassing type encoding (for testing decode failures).
    #[cfg(test)]
    async fn write_raw(&self, key: &str, value_type: &str, value: &str) {
        sqlx::query("INSERT OR REPLACE INTO preferences (key, value_type, value) VALUES (?1, ?2, ?3)")
            .bind(key)
            .bind(value_type)
            .bind(value)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

async fn read_all(conn: &mut SqliteConnection) -> Result<Preferences, PersistenceError> {
    let rows = sqlx::query_as::<_, (String, String, String)>(
        "SELECT key, value_type, value FROM preferences",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    let mut prefs = Preferences::new();
    for (key, value_type, raw) in rows {
        match decode_value(&value_type, &raw) {
            Ok(value) => prefs.set(&key, value),
            Err(reason) => {
                let err = PersistenceError::Decode {
                    key: key.clone(),
                    reason,
                };
                prefs.mark_unreadable(&key, err);
            }
        }
    }
    Ok(prefs)
}

fn decode_value(value_type: &str, raw: &str) -> Result<PrefValue, String> {
    match value_type {
        "bool" => match raw {
            "true" => Ok(PrefValue::Bool(true)),
            "false" => Ok(PrefValue::Bool(false)),
            other => Err(format!("invalid bool {:?}", other)),
        },
        "long" => raw
            .parse::<i64>()
            .map(PrefValue::Long)
            .map_err(|e| format!("invalid long {:?}: {}", raw, e)),
        "text" => Ok(PrefValue::Text(raw.to_string())),
        other => Err(format!("unknown value type {:?}", other)),
    }
}

fn encode_value(value: &PrefValue) -> String {
    match value {
        PrefValue::Bool(b) => b.to_string(),
        PrefValue::Long(n) => n.to_string(),
        PrefValue::Text(s) => s.clone(),
    }
}

/// Classify a sqlx error.
///
/// Lock contention and I/O are worth retrying; anything about the schema or
/// the SQL itself is a defect.
fn map_sqlx_error(err: sqlx::Error) -> PersistenceError {
    match err {
        sqlx::Error::Io(e) => PersistenceError::Io(e.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            PersistenceError::Io(err.to_string())
        }
        sqlx::Error::ColumnDecode { index, source } => PersistenceError::Decode {
            key: index,
            reason: source.to_string(),
        },
        sqlx::Error::Database(ref db) if is_busy(db.code().as_deref()) => {
            PersistenceError::Io(err.to_string())
        }
        other => PersistenceError::Contract(other.to_string()),
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes.
fn is_busy(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| matches!(c & 0xFF, 5 | 6))
        .unwrap_or(false)
}

#[async_trait]
impl Persistence for SqlitePersistence {
    async fn load(&self) -> Result<Preferences, PersistenceError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        read_all(&mut conn).await
    }

    async fn update(&self, transform: Transform) -> Result<Preferences, PersistenceError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let before = read_all(&mut tx).await?;
        let mut after = before.clone();
        transform(&mut after);

        for (key, value) in after.values() {
            if before.get(key).ok().flatten() == Some(value) {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO preferences (key, value_type, value)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET value_type = excluded.value_type, value = excluded.value
                "#,
            )
            .bind(key)
            .bind(value.type_name())
            .bind(encode_value(value))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        for key in before.keys() {
            if !after.contains_key(key) {
                sqlx::query("DELETE FROM preferences WHERE key = ?1")
                    .bind(key)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            }
        }

        let committed = read_all(&mut tx).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn in_memory_update_and_load() {
        let db = SqlitePersistence::in_memory().await.unwrap();
        let prefs = db
            .update(Box::new(|prefs| {
                prefs.set("is_fasting", PrefValue::Bool(true));
                prefs.set("start_time", PrefValue::Long(1_705_000_000_000));
                prefs.set("fasting_goal_id", PrefValue::Text("18:6".into()));
            }))
            .await
            .unwrap();
        assert_eq!(prefs.get_bool("is_fasting").unwrap(), Some(true));

        let loaded = db.load().await.unwrap();
        assert_eq!(loaded, prefs);
        assert_eq!(loaded.get_long("start_time").unwrap(), Some(1_705_000_000_000));
        assert_eq!(loaded.get_text("fasting_goal_id").unwrap(), Some("18:6".into()));
    }

    #[tokio::test]
    async fn corrupt_row_is_unreadable_alone() {
        let db = SqlitePersistence::in_memory().await.unwrap();
        db.write_raw("start_time", "long", "not-a-number").await;
        db.write_raw("is_fasting", "bool", "true").await;

        let prefs = db.load().await.unwrap();
        let err = prefs.get_long("start_time").unwrap_err();
        assert!(matches!(err, PersistenceError::Decode { .. }));
        assert_eq!(prefs.get_bool("is_fasting").unwrap(), Some(true));
    }

    #[tokio::test]
    async fn update_leaves_unreadable_rows_untouched() {
        let db = SqlitePersistence::in_memory().await.unwrap();
        db.write_raw("fasting_goal_id", "mystery", "x").await;

        db.update(Box::new(|prefs| prefs.set("is_fasting", PrefValue::Bool(false))))
            .await
            .unwrap();

        let prefs = db.load().await.unwrap();
        assert!(prefs.get_text("fasting_goal_id").is_err());
        assert_eq!(prefs.get_bool("is_fasting").unwrap(), Some(false));
    }

    #[tokio::test]
    async fn removed_keys_are_deleted() {
        let db = SqlitePersistence::in_memory().await.unwrap();
        db.update(Box::new(|prefs| prefs.set("k", PrefValue::Long(1))))
            .await
            .unwrap();
        db.update(Box::new(|prefs| prefs.remove("k"))).await.unwrap();
        assert!(db.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_database_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("onefast.db");

        {
            let db = SqlitePersistence::new(&path).await.unwrap();
            db.update(Box::new(|prefs| prefs.set("last_updated", PrefValue::Long(99))))
                .await
                .unwrap();
        }

        let db = SqlitePersistence::new(&path).await.unwrap();
        let prefs = db.load().await.unwrap();
        assert_eq!(prefs.get_long("last_updated").unwrap(), Some(99));
    }

    #[test]
    fn busy_codes_are_recognised() {
        assert!(is_busy(Some("5")));
        assert!(is_busy(Some("517")));
        assert!(is_busy(Some("6")));
        assert!(!is_busy(Some("19")));
        assert!(!is_busy(None));
    }

    #[test]
    fn values_encode_to_their_tag() {
        for value in [
            PrefValue::Bool(true),
            PrefValue::Long(-1),
            PrefValue::Text("circadian".into()),
        ] {
            let raw = encode_value(&value);
            assert_eq!(decode_value(value.type_name(), &raw).unwrap(), value);
        }
    }
}
