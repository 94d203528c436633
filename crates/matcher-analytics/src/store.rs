use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use matcher_core::{Error, WorkerId};

use crate::summary::{AnalyticsSummary, DateRange};
use crate::types::{EventLevel, NewQueryLog, QueryLogEntry, TrainingRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS query_logs (
    id TEXT PRIMARY KEY,
    query_text TEXT NOT NULL,
    processed_query TEXT NOT NULL,
    strategy TEXT NOT NULL,
    result_worker_ids TEXT NOT NULL,
    performance_ms REAL NOT NULL,
    cache_hit INTEGER NOT NULL,
    requester_id TEXT,
    created_at INTEGER NOT NULL,
    clicked_worker_id INTEGER,
    click_position INTEGER,
    clicked_at INTEGER,
    converted_worker_id INTEGER,
    converted_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_query_logs_created_at ON query_logs(created_at);

CREATE TABLE IF NOT EXISTS engine_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    query_text TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_engine_events_level_time ON engine_events(level, created_at);

CREATE TABLE IF NOT EXISTS model_trainings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trained_at INTEGER NOT NULL,
    corpus_size INTEGER NOT NULL,
    vocabulary_size INTEGER NOT NULL,
    training_ms REAL NOT NULL,
    corpus_fingerprint TEXT NOT NULL,
    forced INTEGER NOT NULL
);
";

const ENTRY_COLUMNS: &str = "id, query_text, processed_query, strategy, result_worker_ids, performance_ms, cache_hit, \
     requester_id, created_at, clicked_worker_id, click_position, clicked_at, converted_worker_id, converted_at";

fn to_millis(at: DateTime<Utc>) -> i64 { at.timestamp_millis() }

fn from_millis(ms: i64) -> DateTime<Utc> { Utc.timestamp_millis_opt(ms).single().unwrap_or_default() }

fn worker_id(v: Option<i64>) -> Option<WorkerId> { v.and_then(|v| u64::try_from(v).ok()) }

/// Append-only search log; only the engagement columns are ever updated.
pub struct QueryLogStore {
    conn: Mutex<Connection>,
}

impl QueryLogStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let conn = Connection::open(path).with_context(|| format!("opening analytics db {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> { Self::init(Connection::open_in_memory()?) }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("creating analytics schema")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("analytics connection lock poisoned"))
    }

    /// Insert a log row and return its id.
    pub fn record(&self, log: &NewQueryLog) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let ids = serde_json::to_string(&log.result_worker_ids)?;
        self.conn()?.execute(
            "INSERT INTO query_logs (id, query_text, processed_query, strategy, result_worker_ids, performance_ms,
                                     cache_hit, requester_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                log.query_text,
                log.processed_query,
                log.strategy.as_str(),
                ids,
                log.performance_ms,
                log.cache_hit,
                log.requester_id,
                to_millis(Utc::now()),
            ],
        )?;
        debug!(log_id = %id, strategy = %log.strategy, results = log.result_worker_ids.len(), "query logged");
        Ok(id)
    }

    pub fn get(&self, log_id: &str) -> Result<Option<QueryLogEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM query_logs WHERE id = ?1");
        let conn = self.conn()?;
        let raw = conn.query_row(&sql, params![log_id], RawEntry::from_row).optional()?;
        raw.map(RawEntry::decode).transpose()
    }

    /// Store the clicked worker and its 1-based position in the result list.
    pub fn record_click(&self, log_id: &str, worker_id: WorkerId) -> Result<u32> {
        let entry = self.get(log_id)?.ok_or_else(|| Error::NotFound(format!("query log {log_id}")))?;
        let position = entry
            .result_worker_ids
            .iter()
            .position(|id| *id == worker_id)
            .ok_or_else(|| Error::Validation(format!("worker {worker_id} was not in the results of {log_id}")))?;
        let position = u32::try_from(position + 1)?;
        self.conn()?.execute(
            "UPDATE query_logs SET clicked_worker_id = ?1, click_position = ?2, clicked_at = ?3 WHERE id = ?4",
            params![i64::try_from(worker_id)?, position, to_millis(Utc::now()), log_id],
        )?;
        info!(log_id, worker_id, position, "click recorded");
        Ok(position)
    }

    pub fn record_conversion(&self, log_id: &str, worker_id: WorkerId) -> Result<()> {
        let changed = self.conn()?.execute(
            "UPDATE query_logs SET converted_worker_id = ?1, converted_at = ?2 WHERE id = ?3",
            params![i64::try_from(worker_id)?, to_millis(Utc::now()), log_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("query log {log_id}")).into());
        }
        info!(log_id, worker_id, "conversion recorded");
        Ok(())
    }

    pub fn entries(&self, range: &DateRange) -> Result<Vec<QueryLogEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM query_logs WHERE created_at >= ?1 AND created_at < ?2 ORDER BY created_at"
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![to_millis(range.from), to_millis(range.to)], RawEntry::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?);
        }
        Ok(out)
    }

    pub fn aggregate(&self, range: &DateRange) -> Result<AnalyticsSummary> {
        let entries = self.entries(range)?;
        Ok(AnalyticsSummary::from_entries(*range, &entries))
    }

    /// Mean latency of the `n` most recent queries.
    pub fn recent_avg_response_ms(&self, n: usize) -> Result<Option<f64>> {
        let avg = self.conn()?.query_row(
            "SELECT AVG(performance_ms) FROM
               (SELECT performance_ms FROM query_logs ORDER BY created_at DESC LIMIT ?1)",
            params![i64::try_from(n)?],
            |row| row.get::<_, Option<f64>>(0),
        )?;
        Ok(avg)
    }

    pub fn last_query_at(&self) -> Result<Option<DateTime<Utc>>> {
        let ms: Option<i64> = self.conn()?.query_row("SELECT MAX(created_at) FROM query_logs", [], |row| row.get(0))?;
        Ok(ms.map(from_millis))
    }

    pub fn record_event(&self, level: EventLevel, message: &str, query_text: Option<&str>) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO engine_events (level, message, query_text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![level.as_str(), message, query_text, to_millis(Utc::now())],
        )?;
        Ok(())
    }

    pub fn count_events_since(&self, level: EventLevel, since: DateTime<Utc>) -> Result<u64> {
        let n: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM engine_events WHERE level = ?1 AND created_at >= ?2",
            params![level.as_str(), to_millis(since)],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(n)?)
    }

    pub fn record_training(&self, record: &TrainingRecord) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO model_trainings (trained_at, corpus_size, vocabulary_size, training_ms, corpus_fingerprint, forced)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                to_millis(record.trained_at),
                i64::try_from(record.corpus_size)?,
                i64::try_from(record.vocabulary_size)?,
                record.training_ms,
                record.corpus_fingerprint,
                record.forced,
            ],
        )?;
        Ok(())
    }

    pub fn latest_training(&self) -> Result<Option<TrainingRecord>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT trained_at, corpus_size, vocabulary_size, training_ms, corpus_fingerprint, forced
                 FROM model_trainings ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, bool>(5)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(at, corpus, vocab, ms, fingerprint, forced)| {
            Ok(TrainingRecord {
                trained_at: from_millis(at),
                corpus_size: usize::try_from(corpus)?,
                vocabulary_size: usize::try_from(vocab)?,
                training_ms: ms,
                corpus_fingerprint: fingerprint,
                forced,
            })
        })
        .transpose()
    }

    pub fn training_count(&self) -> Result<u64> {
        let n: i64 = self.conn()?.query_row("SELECT COUNT(*) FROM model_trainings", [], |row| row.get(0))?;
        Ok(u64::try_from(n)?)
    }
}

struct RawEntry {
    id: String,
    query_text: String,
    processed_query: String,
    strategy: String,
    result_worker_ids: String,
    performance_ms: f64,
    cache_hit: bool,
    requester_id: Option<String>,
    created_at: i64,
    clicked_worker_id: Option<i64>,
    click_position: Option<u32>,
    clicked_at: Option<i64>,
    converted_worker_id: Option<i64>,
    converted_at: Option<i64>,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            query_text: row.get(1)?,
            processed_query: row.get(2)?,
            strategy: row.get(3)?,
            result_worker_ids: row.get(4)?,
            performance_ms: row.get(5)?,
            cache_hit: row.get(6)?,
            requester_id: row.get(7)?,
            created_at: row.get(8)?,
            clicked_worker_id: row.get(9)?,
            click_position: row.get(10)?,
            clicked_at: row.get(11)?,
            converted_worker_id: row.get(12)?,
            converted_at: row.get(13)?,
        })
    }

    fn decode(self) -> Result<QueryLogEntry> {
        Ok(QueryLogEntry {
            id: self.id,
            query_text: self.query_text,
            processed_query: self.processed_query,
            strategy: self.strategy.parse()?,
            result_worker_ids: serde_json::from_str(&self.result_worker_ids)
                .context("decoding result_worker_ids")?,
            performance_ms: self.performance_ms,
            cache_hit: self.cache_hit,
            requester_id: self.requester_id,
            created_at: from_millis(self.created_at),
            clicked_worker_id: worker_id(self.clicked_worker_id),
            click_position: self.click_position,
            clicked_at: self.clicked_at.map(from_millis),
            converted_worker_id: worker_id(self.converted_worker_id),
            converted_at: self.converted_at.map(from_millis),
        })
    }
}
