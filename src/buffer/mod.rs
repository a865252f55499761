pub mod models;
pub mod schema;

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;

use crate::error::{DaemonError, DaemonResult};
use models::{LocalLogEntry, NewFact, NewLocalLogEntry};
use schema::{facts, logs};

type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

/// Embedded, single-writer durable queue for staged observations and logs.
///
/// Backed by `diesel`'s synchronous SQLite backend; every call dispatches
/// its blocking diesel work onto a blocking thread via `spawn_blocking` so
/// the async scheduler never stalls on file I/O (§4.4).
pub struct LocalBuffer {
    pool: SqlitePool,
}

impl LocalBuffer {
    pub fn connect(path: &str) -> DaemonResult<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DaemonError::LocalBufferError(e.to_string()))?;
            }
        }

        let manager = ConnectionManager::<SqliteConnection>::new(path);
        let pool = Pool::builder()
            .build(manager)
            .map_err(|e| DaemonError::LocalBufferError(e.to_string()))?;

        let mut conn = pool.get()?;
        create_tables(&mut conn)?;

        Ok(LocalBuffer { pool })
    }

    fn conn(&self) -> DaemonResult<PooledConnection<ConnectionManager<SqliteConnection>>> {
        Ok(self.pool.get()?)
    }

    pub async fn insert_facts(&self, rows: Vec<NewFact>) -> DaemonResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        tokio::task::spawn_blocking(move || {
            diesel::insert_into(facts::table)
                .values(&rows)
                .on_conflict_do_nothing()
                .execute(&mut conn)
        })
        .await??;
        Ok(())
    }

    pub async fn insert_log(&self, entry: NewLocalLogEntry) -> DaemonResult<()> {
        let mut conn = self.conn()?;
        tokio::task::spawn_blocking(move || {
            diesel::insert_into(logs::table)
                .values(&entry)
                .execute(&mut conn)
        })
        .await??;
        Ok(())
    }

    /// Returns every staged fact with `time <= cutoff` without removing it.
    pub async fn facts_until(&self, cutoff: NaiveDateTime) -> DaemonResult<Vec<NewFact>> {
        let mut conn = self.conn()?;
        let rows = tokio::task::spawn_blocking(move || {
            facts::table
                .filter(facts::time.le(cutoff))
                .select((facts::tag_id, facts::time, facts::val))
                .load::<NewFact>(&mut conn)
        })
        .await??;
        Ok(rows)
    }

    pub async fn delete_facts_until(&self, cutoff: NaiveDateTime) -> DaemonResult<usize> {
        let mut conn = self.conn()?;
        let deleted = tokio::task::spawn_blocking(move || {
            diesel::delete(facts::table.filter(facts::time.le(cutoff))).execute(&mut conn)
        })
        .await??;
        Ok(deleted)
    }

    pub async fn logs_until(&self, cutoff: NaiveDateTime) -> DaemonResult<Vec<LocalLogEntry>> {
        let mut conn = self.conn()?;
        let rows = tokio::task::spawn_blocking(move || {
            logs::table
                .filter(logs::time.le(cutoff))
                .load::<LocalLogEntry>(&mut conn)
        })
        .await??;
        Ok(rows)
    }

    pub async fn delete_logs_until(&self, cutoff: NaiveDateTime) -> DaemonResult<usize> {
        let mut conn = self.conn()?;
        let deleted = tokio::task::spawn_blocking(move || {
            diesel::delete(logs::table.filter(logs::time.le(cutoff))).execute(&mut conn)
        })
        .await??;
        Ok(deleted)
    }
}

fn create_tables(conn: &mut SqliteConnection) -> DaemonResult<()> {
    diesel::sql_query(
        "CREATE TABLE IF NOT EXISTS facts (
            tag_id INTEGER NOT NULL,
            time TIMESTAMP NOT NULL,
            val DOUBLE NOT NULL,
            PRIMARY KEY (tag_id, time)
        )",
    )
    .execute(conn)?;

    diesel::sql_query(
        "CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            time TIMESTAMP NOT NULL,
            message TEXT NOT NULL,
            level TEXT NOT NULL,
            daemon_id INTEGER NOT NULL
        )",
    )
    .execute(conn)?;

    Ok(())
}

pub fn now_naive() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_buffer() -> (LocalBuffer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let buffer = LocalBuffer::connect(path.to_str().unwrap()).unwrap();
        (buffer, dir)
    }

    #[tokio::test]
    async fn insert_and_drain_facts() {
        let (buffer, _dir) = temp_buffer();
        let now = now_naive();
        buffer
            .insert_facts(vec![
                NewFact { tag_id: 1, time: now, val: 3.14 },
                NewFact { tag_id: 2, time: now, val: 0.0 },
            ])
            .await
            .unwrap();

        let staged = buffer.facts_until(now).await.unwrap();
        assert_eq!(staged.len(), 2);

        let deleted = buffer.delete_facts_until(now).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(buffer.facts_until(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_fact_insert_is_ignored() {
        let (buffer, _dir) = temp_buffer();
        let now = now_naive();
        let row = NewFact { tag_id: 1, time: now, val: 1.0 };
        buffer.insert_facts(vec![row.clone()]).await.unwrap();
        buffer.insert_facts(vec![row]).await.unwrap();

        let staged = buffer.facts_until(now).await.unwrap();
        assert_eq!(staged.len(), 1);
    }
}
