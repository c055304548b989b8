//! Shared durable store.
//!
//! Every server instance opens the same SQLite file. Round and table
//! documents are JSON rows guarded by a `version` column: a save is a
//! compare-and-swap against the version that was loaded, so only one
//! logical action can apply to a given version of a document.
//!
//! The `rounds` row also carries the columns the sweeps query on (`phase`,
//! `timeout_at`, `warned`), kept in step with the document on every write.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use gambit_engine::logger::RoundRecord;
use gambit_engine::round::CombatRound;
use gambit_engine::table::WageringTable;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS rounds (
    encounter_id TEXT NOT NULL PRIMARY KEY,
    character_id TEXT NOT NULL,
    opponent TEXT NOT NULL,
    phase TEXT NOT NULL,
    timeout_at INTEGER,
    warned INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL,
    doc TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rounds_due ON rounds (phase, timeout_at, encounter_id);
CREATE INDEX IF NOT EXISTS idx_rounds_warned ON rounds (phase, warned, timeout_at);

CREATE TABLE IF NOT EXISTS tables (
    table_id TEXT NOT NULL PRIMARY KEY,
    version INTEGER NOT NULL,
    doc TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS job_locks (
    job TEXT NOT NULL PRIMARY KEY,
    holder TEXT NOT NULL,
    acquired_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS job_runs (
    job TEXT NOT NULL PRIMARY KEY,
    holder TEXT NOT NULL,
    last_run_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS round_archive (
    encounter_id TEXT NOT NULL,
    round_number INTEGER NOT NULL,
    record TEXT NOT NULL,
    PRIMARY KEY (encounter_id, round_number)
);
";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} `{id}` already exists")]
    AlreadyExists { kind: &'static str, id: String },
    #[error("{kind} `{id}` was changed by another writer (expected version {expected})")]
    VersionConflict {
        kind: &'static str,
        id: String,
        expected: i64,
    },
    #[error("Store connection lock poisoned")]
    Poisoned,
}

/// A round document with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRound {
    pub round: CombatRound,
    /// Name of the opponent supplier the encounter plays against
    pub opponent: String,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTable {
    pub table: WageringTable,
    pub version: i64,
}

/// Encounter ids picked up by one sweep, earliest deadline first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DueBatch {
    pub encounter_ids: Vec<String>,
    pub has_more: bool,
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Private to this process; for tests and one-off tools.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "store opened");
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn insert_round(
        &self,
        round: &CombatRound,
        opponent: &str,
    ) -> Result<StoredRound, StoreError> {
        let doc = serde_json::to_string(round)?;
        let cols = RoundColumns::of(round);
        let inserted = self.conn()?.execute(
            "INSERT INTO rounds
                (encounter_id, character_id, opponent, phase, timeout_at, warned, version, doc, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)
             ON CONFLICT(encounter_id) DO NOTHING",
            params![
                round.encounter_id,
                round.character_id,
                opponent,
                cols.phase,
                cols.timeout_at,
                cols.warned,
                doc,
                Utc::now().timestamp_millis(),
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists {
                kind: "encounter",
                id: round.encounter_id.clone(),
            });
        }
        Ok(StoredRound {
            round: round.clone(),
            opponent: opponent.to_string(),
            version: 1,
        })
    }

    pub fn load_round(&self, encounter_id: &str) -> Result<StoredRound, StoreError> {
        let row = self
            .conn()?
            .query_row(
                "SELECT doc, opponent, version FROM rounds WHERE encounter_id = ?1",
                params![encounter_id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;
        let (doc, opponent, version) = row.ok_or_else(|| StoreError::NotFound {
            kind: "encounter",
            id: encounter_id.to_string(),
        })?;
        Ok(StoredRound {
            round: serde_json::from_str(&doc)?,
            opponent,
            version,
        })
    }

    /// Writes `round` if the stored version is still `expected`; returns the new version.
    pub fn save_round(&self, round: &CombatRound, expected: i64) -> Result<i64, StoreError> {
        let doc = serde_json::to_string(round)?;
        let cols = RoundColumns::of(round);
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE rounds
             SET character_id = ?2, phase = ?3, timeout_at = ?4, warned = ?5,
                 version = version + 1, doc = ?6, updated_at = ?7
             WHERE encounter_id = ?1 AND version = ?8",
            params![
                round.encounter_id,
                round.character_id,
                cols.phase,
                cols.timeout_at,
                cols.warned,
                doc,
                Utc::now().timestamp_millis(),
                expected,
            ],
        )?;
        if updated == 1 {
            return Ok(expected + 1);
        }
        let exists = conn
            .query_row(
                "SELECT 1 FROM rounds WHERE encounter_id = ?1",
                params![round.encounter_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            Err(StoreError::VersionConflict {
                kind: "encounter",
                id: round.encounter_id.clone(),
                expected,
            })
        } else {
            Err(StoreError::NotFound {
                kind: "encounter",
                id: round.encounter_id.clone(),
            })
        }
    }

    pub fn delete_round(&self, encounter_id: &str) -> Result<bool, StoreError> {
        let deleted = self.conn()?.execute(
            "DELETE FROM rounds WHERE encounter_id = ?1",
            params![encounter_id],
        )?;
        Ok(deleted > 0)
    }

    /// Holding rounds whose deadline is at or before `now`.
    ///
    /// Earliest deadline first, ties by encounter id. Reads one row past
    /// `limit` to tell whether more are waiting.
    pub fn overdue_rounds(&self, now: DateTime<Utc>, limit: usize) -> Result<DueBatch, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT encounter_id FROM rounds
             WHERE phase = 'hold' AND timeout_at <= ?1
             ORDER BY timeout_at ASC, encounter_id ASC
             LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(params![now.timestamp_millis(), fetch_limit(limit)], |r| {
                r.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DueBatch::from_rows(ids, limit))
    }

    /// Holding rounds not yet warned whose deadline falls in `(now, now + lead]`.
    pub fn warning_candidates(
        &self,
        now: DateTime<Utc>,
        lead: Duration,
        limit: usize,
    ) -> Result<DueBatch, StoreError> {
        let now_ms = now.timestamp_millis();
        let horizon = now_ms.saturating_add(duration_ms(lead));
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT encounter_id FROM rounds
             WHERE phase = 'hold' AND warned = 0 AND timeout_at > ?1 AND timeout_at <= ?2
             ORDER BY timeout_at ASC, encounter_id ASC
             LIMIT ?3",
        )?;
        let ids = stmt
            .query_map(params![now_ms, horizon, fetch_limit(limit)], |r| {
                r.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DueBatch::from_rows(ids, limit))
    }

    /// Idempotent: archiving the same round twice keeps one record.
    pub fn archive_round(&self, record: &RoundRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        self.conn()?.execute(
            "INSERT INTO round_archive (encounter_id, round_number, record) VALUES (?1, ?2, ?3)
             ON CONFLICT(encounter_id, round_number) DO UPDATE SET record = excluded.record",
            params![record.encounter_id, record.round_number, json],
        )?;
        Ok(())
    }

    pub fn archived_rounds(&self, encounter_id: &str) -> Result<Vec<RoundRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT record FROM round_archive WHERE encounter_id = ?1 ORDER BY round_number",
        )?;
        let rows = stmt
            .query_map(params![encounter_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }

    pub fn insert_table(&self, table: &WageringTable) -> Result<StoredTable, StoreError> {
        let doc = serde_json::to_string(table)?;
        let inserted = self.conn()?.execute(
            "INSERT INTO tables (table_id, version, doc, updated_at) VALUES (?1, 1, ?2, ?3)
             ON CONFLICT(table_id) DO NOTHING",
            params![table.table_id(), doc, Utc::now().timestamp_millis()],
        )?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists {
                kind: "table",
                id: table.table_id().to_string(),
            });
        }
        Ok(StoredTable {
            table: table.clone(),
            version: 1,
        })
    }

    pub fn load_table(&self, table_id: &str) -> Result<StoredTable, StoreError> {
        let row = self
            .conn()?
            .query_row(
                "SELECT doc, version FROM tables WHERE table_id = ?1",
                params![table_id],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)),
            )
            .optional()?;
        let (doc, version) = row.ok_or_else(|| StoreError::NotFound {
            kind: "table",
            id: table_id.to_string(),
        })?;
        Ok(StoredTable {
            table: serde_json::from_str(&doc)?,
            version,
        })
    }

    pub fn save_table(&self, table: &WageringTable, expected: i64) -> Result<i64, StoreError> {
        let doc = serde_json::to_string(table)?;
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE tables SET version = version + 1, doc = ?2, updated_at = ?3
             WHERE table_id = ?1 AND version = ?4",
            params![
                table.table_id(),
                doc,
                Utc::now().timestamp_millis(),
                expected
            ],
        )?;
        if updated == 1 {
            return Ok(expected + 1);
        }
        let exists = conn
            .query_row(
                "SELECT 1 FROM tables WHERE table_id = ?1",
                params![table.table_id()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        let id = table.table_id().to_string();
        if exists {
            Err(StoreError::VersionConflict {
                kind: "table",
                id,
                expected,
            })
        } else {
            Err(StoreError::NotFound { kind: "table", id })
        }
    }

    /// Takes the advisory lock for `job` unless an unexpired holder has it.
    ///
    /// A single upsert, so two instances racing for the lock cannot both win.
    pub fn try_acquire_lock(
        &self,
        job: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now_ms = now.timestamp_millis();
        let expires_at = now_ms.saturating_add(duration_ms(ttl));
        let changed = self.conn()?.execute(
            "INSERT INTO job_locks (job, holder, acquired_at, expires_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(job) DO UPDATE
                SET holder = excluded.holder,
                    acquired_at = excluded.acquired_at,
                    expires_at = excluded.expires_at
                WHERE job_locks.expires_at <= ?3",
            params![job, holder, now_ms, expires_at],
        )?;
        Ok(changed == 1)
    }

    /// Releases the lock if `holder` still owns it.
    pub fn release_lock(&self, job: &str, holder: &str) -> Result<bool, StoreError> {
        let deleted = self.conn()?.execute(
            "DELETE FROM job_locks WHERE job = ?1 AND holder = ?2",
            params![job, holder],
        )?;
        Ok(deleted > 0)
    }

    /// Current unexpired holder of the lock for `job`.
    pub fn lock_holder(&self, job: &str, now: DateTime<Utc>) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT holder FROM job_locks WHERE job = ?1 AND expires_at > ?2",
                params![job, now.timestamp_millis()],
                |r| r.get(0),
            )
            .optional()?)
    }

    pub fn record_job_run(
        &self,
        job: &str,
        holder: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO job_runs (job, holder, last_run_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(job) DO UPDATE SET holder = excluded.holder, last_run_at = excluded.last_run_at",
            params![job, holder, at.timestamp_millis()],
        )?;
        Ok(())
    }

    /// When any instance last ran `job`.
    pub fn last_job_run(&self, job: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let ms: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT last_run_at FROM job_runs WHERE job = ?1",
                params![job],
                |r| r.get(0),
            )
            .optional()?;
        Ok(ms.and_then(DateTime::from_timestamp_millis))
    }
}

struct RoundColumns {
    phase: &'static str,
    timeout_at: Option<i64>,
    warned: bool,
}

impl RoundColumns {
    fn of(round: &CombatRound) -> Self {
        let holding = round.holding();
        Self {
            phase: round.phase().as_str(),
            timeout_at: holding.map(|h| h.timeout_at.timestamp_millis()),
            warned: holding.is_some_and(|h| h.warned_at.is_some()),
        }
    }
}

impl DueBatch {
    fn from_rows(mut ids: Vec<String>, limit: usize) -> Self {
        let has_more = ids.len() > limit;
        ids.truncate(limit);
        Self {
            encounter_ids: ids,
            has_more,
        }
    }
}

fn fetch_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX - 1) + 1
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gambit_engine::deck::Deck;
    use gambit_engine::round::{HpPools, RoundConfig};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn round_dealt_at(id: &str, at: DateTime<Utc>) -> CombatRound {
        let mut round = CombatRound::drawing(
            id,
            "hero",
            1,
            RoundConfig::default(),
            HpPools {
                player: 100,
                opponent: 100,
            },
            Deck::new_with_seed(7),
        );
        round.deal(at, 11).unwrap();
        round
    }

    #[test]
    fn insert_load_and_compare_and_swap() {
        let store = SqliteStore::open_in_memory().unwrap();
        let round = round_dealt_at("enc-1", t0());
        let stored = store.insert_round(&round, "normal").unwrap();
        assert_eq!(stored.version, 1);
        assert!(matches!(
            store.insert_round(&round, "normal"),
            Err(StoreError::AlreadyExists { .. })
        ));

        let loaded = store.load_round("enc-1").unwrap();
        assert_eq!(loaded.round, round);
        assert_eq!(loaded.opponent, "normal");

        let mut changed = loaded.round.clone();
        changed.toggle_hold(0).unwrap();
        assert_eq!(store.save_round(&changed, 1).unwrap(), 2);
        // a writer still holding version 1 loses
        assert!(matches!(
            store.save_round(&round, 1),
            Err(StoreError::VersionConflict { expected: 1, .. })
        ));
        assert_eq!(store.load_round("enc-1").unwrap().round, changed);
    }

    #[test]
    fn missing_documents_are_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.load_round("nope"),
            Err(StoreError::NotFound { kind: "encounter", .. })
        ));
        assert!(matches!(
            store.save_round(&round_dealt_at("nope", t0()), 1),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.load_table("nope"),
            Err(StoreError::NotFound { kind: "table", .. })
        ));
    }

    #[test]
    fn overdue_rounds_come_earliest_deadline_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        let base = t0();
        store
            .insert_round(&round_dealt_at("c", base), "easy")
            .unwrap();
        store
            .insert_round(&round_dealt_at("a", base + chrono::Duration::seconds(5)), "easy")
            .unwrap();
        store
            .insert_round(&round_dealt_at("b", base), "easy")
            .unwrap();
        store
            .insert_round(&round_dealt_at("late", base + chrono::Duration::hours(1)), "easy")
            .unwrap();

        let now = base + chrono::Duration::seconds(60);
        let all = store.overdue_rounds(now, 10).unwrap();
        assert_eq!(all.encounter_ids, vec!["b", "c", "a"]);
        assert!(!all.has_more);

        let first = store.overdue_rounds(now, 2).unwrap();
        assert_eq!(first.encounter_ids, vec!["b", "c"]);
        assert!(first.has_more);
    }

    #[test]
    fn warning_candidates_skip_warned_and_expired_rounds() {
        let store = SqliteStore::open_in_memory().unwrap();
        let base = t0();
        // deadlines at base+30s
        store.insert_round(&round_dealt_at("soon", base), "easy").unwrap();
        let mut warned = round_dealt_at("warned", base);
        warned.mark_warned(base).unwrap();
        store.insert_round(&warned, "easy").unwrap();

        let now = base + chrono::Duration::seconds(25);
        let lead = Duration::from_secs(10);
        let due = store.warning_candidates(now, lead, 10).unwrap();
        assert_eq!(due.encounter_ids, vec!["soon"]);

        let too_early = store
            .warning_candidates(base, lead, 10)
            .unwrap();
        assert!(too_early.encounter_ids.is_empty());

        let past = store
            .warning_candidates(base + chrono::Duration::seconds(31), lead, 10)
            .unwrap();
        assert!(past.encounter_ids.is_empty());
    }

    #[test]
    fn lock_is_exclusive_until_released_or_expired() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ttl = Duration::from_secs(30);
        let now = t0();
        assert!(store.try_acquire_lock("sweep", "a", now, ttl).unwrap());
        assert!(!store.try_acquire_lock("sweep", "b", now, ttl).unwrap());
        assert_eq!(store.lock_holder("sweep", now).unwrap().as_deref(), Some("a"));

        // only the holder can release
        assert!(!store.release_lock("sweep", "b").unwrap());
        assert!(store.release_lock("sweep", "a").unwrap());
        assert!(store.try_acquire_lock("sweep", "b", now, ttl).unwrap());

        // a crashed holder's lock lapses
        let later = now + chrono::Duration::seconds(31);
        assert!(store.try_acquire_lock("sweep", "c", later, ttl).unwrap());
        assert_eq!(store.lock_holder("sweep", later).unwrap().as_deref(), Some("c"));
    }

    #[test]
    fn job_runs_are_shared_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.last_job_run("sweep").unwrap(), None);
        store.record_job_run("sweep", "a", t0()).unwrap();
        store
            .record_job_run("sweep", "b", t0() + chrono::Duration::seconds(5))
            .unwrap();
        assert_eq!(
            store.last_job_run("sweep").unwrap(),
            Some(t0() + chrono::Duration::seconds(5))
        );
    }

    #[test]
    fn table_documents_round_trip_with_versions() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut table = WageringTable::new("t1");
        store.insert_table(&table).unwrap();
        table.seat_player("p0", 100).unwrap();
        assert_eq!(store.save_table(&table, 1).unwrap(), 2);
        assert!(matches!(
            store.save_table(&table, 1),
            Err(StoreError::VersionConflict { kind: "table", .. })
        ));
        let loaded = store.load_table("t1").unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.table, table);
    }
}
