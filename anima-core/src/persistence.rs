//! SQLite persistence for persona snapshots.
//!
//! Personas live in process memory; this store is the opt-in way to keep
//! them across restarts. Each [`PersonaSnapshot`] is serialised to JSON and
//! stored in a single table:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS persona_snapshots (
//!     persona_id TEXT PRIMARY KEY,
//!     name       TEXT NOT NULL,
//!     data       BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! ```
//!
//! JSON inside a BLOB keeps the schema stable when persona fields change.
//! An optional CRC-32 detects corruption; a mismatching row is refused.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::{AnimaError, Result};
use crate::types::{PersonaId, PersonaSnapshot};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS persona_snapshots (
    persona_id TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    data       BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT
);";

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32_compute(data))
}

/// CRC-32 (ISO 3309 / ITU-T V.42), bitwise.
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// PersonaStore
// ---------------------------------------------------------------------------

/// Handle to an open SQLite database of [`PersonaSnapshot`]s.
///
/// ```no_run
/// # use anima_core::persistence::PersonaStore;
/// # use anima_core::config::PersistenceConfig;
/// let store = PersonaStore::open("personas.db", &PersistenceConfig::default())?;
/// for id in store.list_ids()? {
///     let snapshot = store.load(&id)?;
///     # let _ = snapshot;
/// }
/// # Ok::<(), anima_core::error::AnimaError>(())
/// ```
pub struct PersonaStore {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for PersonaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PersonaStore {
    /// Open (or create) a snapshot database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Persona store opened"
        );

        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open the store at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Database`] on SQLite failures.
    pub fn open_configured(config: &PersistenceConfig) -> Result<Self> {
        Self::open(&config.path, config)
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Save (upsert) a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Serialization`] if JSON encoding fails, or
    /// [`AnimaError::Database`] on SQLite failures.
    pub fn save(&self, snapshot: &PersonaSnapshot) -> Result<()> {
        let start = Instant::now();

        let json =
            serde_json::to_vec(snapshot).map_err(|e| AnimaError::Serialization(e.to_string()))?;

        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&json));
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO persona_snapshots (persona_id, name, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(persona_id) DO UPDATE SET
                name = excluded.name,
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![snapshot.id.to_string(), snapshot.identity.name, json, now, checksum],
        )?;

        debug!(
            persona = %snapshot.identity.name,
            id = %snapshot.id,
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved persona snapshot"
        );

        Ok(())
    }

    /// Load a snapshot. `None` if the persona was never saved.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Corrupted`] on a checksum mismatch,
    /// [`AnimaError::Serialization`] if JSON decoding fails, or
    /// [`AnimaError::Database`] on SQLite failures.
    pub fn load(&self, id: &PersonaId) -> Result<Option<PersonaSnapshot>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data, checksum FROM persona_snapshots WHERE persona_id = ?1")?;

        let row: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![id.to_string()], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((data, stored_checksum)) = row else {
            return Ok(None);
        };

        if self.config.checksum_enabled {
            if let Some(expected) = stored_checksum.as_deref() {
                let actual = crc32_hex(&data);
                if expected != actual {
                    warn!(
                        id = %id,
                        expected = %expected,
                        actual = %actual,
                        "Checksum mismatch, refusing snapshot"
                    );
                    return Err(AnimaError::Corrupted(format!(
                        "checksum mismatch for persona {id}"
                    )));
                }
            }
        }

        let snapshot: PersonaSnapshot =
            serde_json::from_slice(&data).map_err(|e| AnimaError::Serialization(e.to_string()))?;
        Ok(Some(snapshot))
    }

    /// Delete a snapshot. Returns `true` if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Database`] on SQLite failures.
    pub fn delete(&self, id: &PersonaId) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM persona_snapshots WHERE persona_id = ?1",
            params![id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    /// IDs of every stored persona. Rows with unparsable IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Database`] on SQLite failures.
    pub fn list_ids(&self) -> Result<Vec<PersonaId>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT persona_id FROM persona_snapshots ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            let id_str = row?;
            match uuid::Uuid::parse_str(&id_str) {
                Ok(uuid) => ids.push(PersonaId(uuid)),
                Err(_) => warn!(id = %id_str, "Skipping row with invalid UUID"),
            }
        }
        Ok(ids)
    }

    /// Number of stored personas.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Database`] on SQLite failures.
    pub fn count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM persona_snapshots", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::MoodState;
    use crate::personality::TraitProfile;
    use crate::style::StyleCorpus;
    use crate::types::{Originality, PersonaIdentity, PersonaPhase};

    fn sample_snapshot(name: &str) -> PersonaSnapshot {
        PersonaSnapshot {
            id: PersonaId::new(),
            identity: PersonaIdentity::new(name, "female", Originality::Existing),
            phase: PersonaPhase::StyleReady,
            profile: TraitProfile::new(0.8, 0.6, 0.2, 0.4, 0.7).with_labels(["aloof", "loyal"]),
            mood: MoodState::new(-0.3, 0.4, 0.1),
            style: StyleCorpus::from_examples(["[calm] Fine. (flat)"]),
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn round_trip_save_load() {
        let store = PersonaStore::open_in_memory(&PersistenceConfig::default()).expect("open");
        let snapshot = sample_snapshot("Rei");
        store.save(&snapshot).expect("save");

        let loaded = store.load(&snapshot.id).expect("load").expect("Some");
        assert_eq!(loaded.identity, snapshot.identity);
        assert_eq!(loaded.phase, PersonaPhase::StyleReady);
        assert_eq!(loaded.profile, snapshot.profile);
        assert_eq!(loaded.mood, snapshot.mood);
        assert_eq!(loaded.style, snapshot.style);
    }

    #[test]
    fn load_unknown_returns_none() {
        let store = PersonaStore::open_in_memory(&PersistenceConfig::default()).expect("open");
        assert!(store.load(&PersonaId::new()).expect("load").is_none());
    }

    #[test]
    fn upsert_overwrites() {
        let store = PersonaStore::open_in_memory(&PersistenceConfig::default()).expect("open");
        let mut snapshot = sample_snapshot("Rei");
        store.save(&snapshot).expect("save");

        snapshot.mood.apply_stimulus(1.0, 0.0, 0.0);
        store.save(&snapshot).expect("save again");

        let loaded = store.load(&snapshot.id).expect("load").expect("Some");
        assert!((loaded.mood.pleasure() - 0.7).abs() < 1e-6);
        assert_eq!(store.count().expect("count"), 1);
    }

    #[test]
    fn delete_and_list() {
        let store = PersonaStore::open_in_memory(&PersistenceConfig::default()).expect("open");
        let a = sample_snapshot("Asuka");
        let b = sample_snapshot("Shinji");
        store.save(&a).expect("save a");
        store.save(&b).expect("save b");

        assert_eq!(store.list_ids().expect("list"), vec![a.id, b.id]);
        assert!(store.delete(&a.id).expect("delete"));
        assert!(!store.delete(&a.id).expect("delete again"));
        assert_eq!(store.count().expect("count"), 1);
    }

    #[test]
    fn checksum_mismatch_is_refused() {
        let store = PersonaStore::open_in_memory(&PersistenceConfig::default()).expect("open");
        let snapshot = sample_snapshot("Rei");
        store.save(&snapshot).expect("save");

        store
            .conn
            .execute(
                "UPDATE persona_snapshots SET checksum = 'deadbeef' WHERE persona_id = ?1",
                params![snapshot.id.to_string()],
            )
            .expect("corrupt checksum");

        assert!(matches!(store.load(&snapshot.id), Err(AnimaError::Corrupted(_))));
    }

    #[test]
    fn checksum_disabled_skips_verification() {
        let config = PersistenceConfig {
            checksum_enabled: false,
            ..PersistenceConfig::default()
        };
        let store = PersonaStore::open_in_memory(&config).expect("open");
        let snapshot = sample_snapshot("Rei");
        store.save(&snapshot).expect("save");
        assert!(store.load(&snapshot.id).expect("load").is_some());
    }

    #[test]
    fn out_of_range_rows_load_clamped() {
        let store = PersonaStore::open_in_memory(&PersistenceConfig {
            checksum_enabled: false,
            ..PersistenceConfig::default()
        })
        .expect("open");
        let snapshot = sample_snapshot("Rei");
        store.save(&snapshot).expect("save");

        let mut raw: serde_json::Value =
            serde_json::to_value(&snapshot).expect("to value");
        raw["mood"]["pleasure"] = serde_json::json!(7.5);
        raw["profile"]["openness"] = serde_json::json!(-2.0);
        raw["style"]["entries"] = serde_json::json!([]);
        store
            .conn
            .execute(
                "UPDATE persona_snapshots SET data = ?1 WHERE persona_id = ?2",
                params![serde_json::to_vec(&raw).expect("bytes"), snapshot.id.to_string()],
            )
            .expect("tamper");

        let loaded = store.load(&snapshot.id).expect("load").expect("Some");
        assert_eq!(loaded.mood.pleasure(), 1.0);
        assert_eq!(loaded.profile.openness(), 0.0);
        assert!(loaded.style.is_placeholder());
    }

    #[test]
    fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("personas.db");
        let config = PersistenceConfig::default();
        let snapshot = sample_snapshot("Rei");

        {
            let store = PersonaStore::open(&path, &config).expect("open");
            store.save(&snapshot).expect("save");
        }

        let reopened = PersonaStore::open(&path, &config).expect("reopen");
        assert!(reopened.load(&snapshot.id).expect("load").is_some());
        assert_eq!(reopened.db_path(), path.as_path());
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(crc32_compute(b"123456789"), 0xCBF4_3926);
    }
}
