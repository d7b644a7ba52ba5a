use chrono::{DateTime, Utc};
use disco_core::System;
use fs2::FileExt;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod aggregate;

pub const DISCO_SCHEMA_VERSION: i64 = 2;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
    #[error("store {} is held by another writer", .0.display())]
    Locked(PathBuf),
    #[error("store is closed")]
    Closed,
}

/// Byte offset reached in one journal file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalCheckpoint {
    pub journal_path: String,
    pub cursor: u64,
    pub updated_at: DateTime<Utc>,
}

/// Path of the advisory lock file guarding `db_path`.
pub fn lock_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(db_path: &Path) -> Result<Self, StorageError> {
        let path = lock_path(db_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(path));
        }
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// The single writer session over the local discovery database.
pub struct DiscoStore {
    conn: Option<Connection>,
    lock: Option<StoreLock>,
}

impl DiscoStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock = StoreLock::acquire(path)?;
        let conn = Connection::open(path)?;
        Self::with_connection(conn, Some(lock))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, lock: Option<StoreLock>) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self {
            conn: Some(conn),
            lock,
        };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> Result<&Connection, StorageError> {
        self.conn.as_ref().ok_or(StorageError::Closed)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection, StorageError> {
        self.conn.as_mut().ok_or(StorageError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Closes the session and releases the writer lock. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), StorageError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        let closed = conn.close().map_err(|(_, err)| StorageError::Sqlite(err));
        self.lock = None;
        closed
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn()?
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let mut current = self.schema_version()?;
        if current > DISCO_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: DISCO_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_disco_schema.sql");
            conn.execute_batch(sql)?;
            conn.execute("PRAGMA user_version = 1", []).map(|_| ())?;
            current = 1;
        }

        if current < 2 {
            let sql = include_str!("../migrations/0002_ingestion_checkpoints.sql");
            conn.execute_batch(sql)?;
            conn.execute("PRAGMA user_version = 2", []).map(|_| ())?;
        }

        Ok(())
    }

    pub fn find_system_by_address(
        &self,
        system_address: u64,
    ) -> Result<Option<System>, StorageError> {
        aggregate::load_by_address(self.conn()?, system_address)
    }

    /// Case-insensitive; the most recently updated system wins on duplicate names.
    pub fn find_system_by_name(&self, name: &str) -> Result<Option<System>, StorageError> {
        aggregate::load_by_name(self.conn()?, name)
    }

    /// Writes the whole aggregate in one transaction and records the row ids
    /// back onto it.
    pub fn save_system(&mut self, system: &mut System) -> Result<(), StorageError> {
        let tx = self.conn_mut()?.transaction()?;
        aggregate::save(&tx, system)?;
        tx.commit()?;
        Ok(())
    }

    pub fn system_count(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn()?
            .query_row("SELECT COUNT(*) FROM systems", [], |row| row.get(0))?)
    }

    pub fn body_count(&self, system_address: u64) -> Result<i64, StorageError> {
        Ok(self.conn()?.query_row(
            "
            SELECT COUNT(*)
            FROM bodies b
            JOIN systems s ON s.id = b.system_id
            WHERE s.system_address = ?1
            ",
            [system_address as i64],
            |row| row.get(0),
        )?)
    }

    pub fn upsert_checkpoint(&self, checkpoint: &JournalCheckpoint) -> Result<(), StorageError> {
        self.conn()?.execute(
            "
            INSERT INTO ingestion_checkpoints (journal_path, cursor, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(journal_path) DO UPDATE SET
                cursor=excluded.cursor,
                updated_at=excluded.updated_at
            ",
            params![
                checkpoint.journal_path,
                checkpoint.cursor as i64,
                checkpoint.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    pub fn checkpoint(&self, journal_path: &str) -> Result<Option<JournalCheckpoint>, StorageError> {
        let row = self
            .conn()?
            .query_row(
                "
                SELECT journal_path, cursor, updated_at
                FROM ingestion_checkpoints
                WHERE journal_path = ?1
                ",
                [journal_path],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(journal_path, cursor, updated_at)| {
            Ok(JournalCheckpoint {
                journal_path,
                cursor: cursor as u64,
                updated_at: parse_timestamp(&updated_at)?,
            })
        })
        .transpose()
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool, StorageError> {
        let exists = self
            .conn()?
            .query_row(
                "
                SELECT 1
                FROM sqlite_master
                WHERE type='table' AND name = ?1
                LIMIT 1
                ",
                [table_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(exists.is_some())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| StorageError::Timestamp(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use disco_core::{
        Body, CodexEntry, Genus, GenusScan, Signal, StarPos, SystemFeatures,
    };

    fn sample_system() -> System {
        let mut star = Body::new(0);
        star.name = "Test A".to_string();
        star.features.body_type = Some("Star".to_string());
        star.features.star_type = Some("K".to_string());
        star.features.subclass = Some(4);
        star.features.discovered = true;
        star.features.discovered_first = true;

        let mut planet = Body::new(4);
        planet.name = "Test A 1".to_string();
        planet.features.body_type = Some("Planet".to_string());
        planet.features.planet_class = Some("Rocky body".to_string());
        planet.features.landable = Some(true);
        planet.features.distance_ls = Some(512.25);
        planet.features.mapped = true;
        planet.features.discovered = true;
        planet.signals.entries.push(Signal {
            signal_type: "$SAA_SignalType_Biological;".to_string(),
            type_localised: Some("Biological".to_string()),
            count: 3,
        });
        planet.genuses.entries.push(Genus {
            genus: "$Codex_Ent_Bacterial_Genus_Name;".to_string(),
            genus_localised: "Bacterium".to_string(),
            scans: vec![GenusScan {
                species: "$Codex_Ent_Bacterial_01_Name;".to_string(),
                species_localised: "Bacterium Aurasus".to_string(),
                count: 2,
                ..GenusScan::default()
            }],
        });
        planet.codexes.entries.push(CodexEntry {
            name: "$Codex_Ent_IceFumarole_Name;".to_string(),
            name_localised: "Ice Fumarole".to_string(),
            latitude: Some(-12.5),
            ..CodexEntry::default()
        });

        System {
            id: None,
            system_address: 1000,
            name: "Test".to_string(),
            position: StarPos { x: 1.0, y: 2.0, z: 3.0 },
            body_count: 12,
            non_body_count: 3,
            last_update: 1_672_531_200,
            features: SystemFeatures {
                allegiance: Some("Federation".to_string()),
                security: Some("High Security".to_string()),
                population: 1200,
            },
            bodies: vec![star, planet],
        }
    }

    #[test]
    fn migration_creates_disco_tables() {
        let db = DiscoStore::open_in_memory().expect("open db");

        for table in [
            "systems",
            "system_features",
            "bodies",
            "body_features",
            "signals",
            "genuses",
            "genus_scans",
            "codex_entries",
            "ingestion_checkpoints",
        ] {
            assert!(db.table_exists(table).expect("table check"));
        }

        assert_eq!(
            db.schema_version().expect("schema version"),
            DISCO_SCHEMA_VERSION
        );
    }

    #[test]
    fn aggregate_roundtrip_restores_every_collection() {
        let mut db = DiscoStore::open_in_memory().expect("open db");
        let mut system = sample_system();
        db.save_system(&mut system).expect("save");

        assert!(system.id.is_some());
        assert!(system.bodies.iter().all(|body| body.id.is_some()));

        let loaded = db
            .find_system_by_address(1000)
            .expect("query")
            .expect("system present");
        assert_eq!(loaded, system);
    }

    #[test]
    fn saving_twice_keeps_natural_keys_unique() {
        let mut db = DiscoStore::open_in_memory().expect("open db");
        let mut system = sample_system();
        db.save_system(&mut system).expect("first save");
        let first_id = system.id;

        system.bodies[1].signals.entries[0].count = 5;
        system.bodies[1].genuses.entries[0].scans[0].done = true;
        system.bodies.push(Body::placeholder(2, 0, "Null"));
        db.save_system(&mut system).expect("second save");

        assert_eq!(system.id, first_id);
        assert_eq!(db.system_count().expect("systems"), 1);
        assert_eq!(db.body_count(1000).expect("bodies"), 3);

        let loaded = db
            .find_system_by_address(1000)
            .expect("query")
            .expect("system present");
        let planet = loaded.body(4).expect("planet");
        assert_eq!(planet.signals.entries.len(), 1);
        assert_eq!(planet.signals.count_bio_signals(), 5);
        assert!(planet.genuses.entries[0].scans[0].done);
        assert_eq!(
            loaded.body(2).and_then(|body| body.features.body_type.as_deref()),
            Some("Null")
        );
    }

    #[test]
    fn name_lookup_ignores_case() {
        let mut db = DiscoStore::open_in_memory().expect("open db");
        db.save_system(&mut sample_system()).expect("save");

        let found = db.find_system_by_name("tEsT").expect("query");
        assert_eq!(found.map(|system| system.system_address), Some(1000));
        assert!(db.find_system_by_name("Sol").expect("query").is_none());
        assert!(db.find_system_by_address(42).expect("query").is_none());
    }

    #[test]
    fn checkpoint_roundtrip() {
        let db = DiscoStore::open_in_memory().expect("open db");
        let updated_at = Utc
            .with_ymd_and_hms(2023, 1, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp");
        let checkpoint = JournalCheckpoint {
            journal_path: "/journals/Journal.2023-01-01T000000.01.log".to_string(),
            cursor: 4096,
            updated_at,
        };
        db.upsert_checkpoint(&checkpoint).expect("upsert");
        db.upsert_checkpoint(&JournalCheckpoint {
            cursor: 8192,
            ..checkpoint.clone()
        })
        .expect("upsert again");

        let loaded = db
            .checkpoint(&checkpoint.journal_path)
            .expect("query")
            .expect("checkpoint present");
        assert_eq!(loaded.cursor, 8192);
        assert_eq!(loaded.updated_at, updated_at);
        assert!(db.checkpoint("missing").expect("query").is_none());
    }

    #[test]
    fn close_is_idempotent_and_blocks_further_use() {
        let mut db = DiscoStore::open_in_memory().expect("open db");
        db.close().expect("close");
        db.close().expect("close twice");
        assert!(db.is_closed());
        assert!(matches!(db.system_count(), Err(StorageError::Closed)));
        assert!(matches!(
            db.save_system(&mut sample_system()),
            Err(StorageError::Closed)
        ));
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("disco.db");

        let mut db = DiscoStore::open(&path).expect("open db");
        db.save_system(&mut sample_system()).expect("save");
        db.close().expect("close");

        let db = DiscoStore::open(&path).expect("reopen db");
        let loaded = db
            .find_system_by_name("Test")
            .expect("query")
            .expect("system present");
        assert_eq!(loaded.bodies.len(), 2);
        assert_eq!(loaded.features.population, 1200);
    }

    #[test]
    fn second_writer_is_rejected_until_close() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("disco.db");

        let mut first = DiscoStore::open(&path).expect("open db");
        assert!(matches!(
            DiscoStore::open(&path),
            Err(StorageError::Locked(locked)) if locked == lock_path(&path)
        ));

        first.close().expect("close");
        DiscoStore::open(&path).expect("open after close");
    }

    #[test]
    fn newer_schema_is_refused() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        {
            let conn = Connection::open(file.path()).expect("open raw");
            conn.execute_batch("PRAGMA user_version = 99;")
                .expect("bump version");
        }

        assert!(matches!(
            DiscoStore::open(file.path()),
            Err(StorageError::UnsupportedSchemaVersion {
                found: 99,
                supported: DISCO_SCHEMA_VERSION
            })
        ));
    }
}
