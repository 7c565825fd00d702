use super::record::{NewRun, Run, RunStatus};
use crate::shared::now_iso_seconds;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Columns added after the first release; each is created on demand.
const OPTIONAL_COLUMNS: &[&str] = &["env_json", "argv_json"];

const SELECT_COLUMNS: &str = "
    pid, command, cwd, status, started_at, ended_at, returncode,
    stdout_path, stderr_path, env_json, argv_json
";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create registry database parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite statement failed: {source}")]
    Sql {
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to encode run metadata: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    #[error("runs database not found at {path}")]
    MissingDatabase { path: String },
    #[error("failed to prepare backup directory {path}: {source}")]
    BackupDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Durable store of run metadata. Every operation opens its own connection.
#[derive(Debug, Clone)]
pub struct RunRegistry {
    db_path: PathBuf,
}

impl RunRegistry {
    pub fn open(db_path: &Path) -> Result<Self, RegistryError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RegistryError::CreateParent {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let registry = Self {
            db_path: db_path.to_path_buf(),
        };
        let _ = registry.connect()?;
        Ok(registry)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Creates the table, adds optional columns missing from older stores and
    /// backfills empty start timestamps. Safe to run repeatedly.
    pub fn ensure_schema(&self) -> Result<(), RegistryError> {
        let connection = self.connect()?;
        ensure_schema_on(&connection)
    }

    pub fn add_run(&self, run: &NewRun) -> Result<(), RegistryError> {
        let connection = self.connect_initialized()?;
        let started_at = run.started_at.clone().unwrap_or_else(now_iso_seconds);
        let env_json = run
            .extra_env
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| RegistryError::Encode { source })?;
        let argv_json = run
            .argv
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| RegistryError::Encode { source })?;

        connection
            .execute(
                "
                INSERT OR REPLACE INTO runs (
                    pid, command, cwd, status, started_at, ended_at, returncode,
                    stdout_path, stderr_path, env_json, argv_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6, ?7, ?8, ?9)
                ",
                params![
                    run.pid,
                    run.command,
                    run.cwd.clone().unwrap_or_default(),
                    RunStatus::Running.as_str(),
                    started_at,
                    run.stdout_path,
                    run.stderr_path,
                    env_json,
                    argv_json,
                ],
            )
            .map_err(|source| RegistryError::Sql { source })?;
        Ok(())
    }

    /// Returns the number of rows touched; a missing pid updates nothing.
    pub fn update_status(
        &self,
        pid: u32,
        status: RunStatus,
        returncode: Option<i32>,
        ended_at: Option<&str>,
    ) -> Result<usize, RegistryError> {
        let connection = self.connect_initialized()?;
        let ended_at = ended_at
            .map(str::to_string)
            .unwrap_or_else(now_iso_seconds);
        connection
            .execute(
                "UPDATE runs SET status = ?1, returncode = ?2, ended_at = ?3 WHERE pid = ?4",
                params![status.as_str(), returncode, ended_at, pid],
            )
            .map_err(|source| RegistryError::Sql { source })
    }

    pub fn get_run(&self, pid: u32) -> Result<Option<Run>, RegistryError> {
        let connection = self.connect_initialized()?;
        let raw = connection
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM runs WHERE pid = ?1"),
                params![pid],
                RawRun::from_row,
            )
            .optional()
            .map_err(|source| RegistryError::Sql { source })?;
        Ok(raw.map(RawRun::into_run))
    }

    /// Most recently started first.
    pub fn list_runs(&self, active_only: bool) -> Result<Vec<Run>, RegistryError> {
        let connection = self.connect_initialized()?;
        let filter = if active_only {
            "WHERE status = 'running'"
        } else {
            ""
        };
        let mut statement = connection
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM runs {filter} ORDER BY started_at DESC, pid DESC"
            ))
            .map_err(|source| RegistryError::Sql { source })?;
        let rows = statement
            .query_map([], RawRun::from_row)
            .map_err(|source| RegistryError::Sql { source })?;

        let mut out = Vec::new();
        for row in rows {
            let raw = row.map_err(|source| RegistryError::Sql { source })?;
            out.push(raw.into_run());
        }
        Ok(out)
    }

    pub fn column_names(&self) -> Result<Vec<String>, RegistryError> {
        let connection = self.connect()?;
        table_columns(&connection)
    }

    fn connect_initialized(&self) -> Result<Connection, RegistryError> {
        let connection = self.connect()?;
        ensure_schema_on(&connection)?;
        Ok(connection)
    }

    fn connect(&self) -> Result<Connection, RegistryError> {
        let connection =
            Connection::open(&self.db_path).map_err(|source| RegistryError::Open {
                path: self.db_path.display().to_string(),
                source,
            })?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(|source| RegistryError::Sql { source })?;
        Ok(connection)
    }
}

fn ensure_schema_on(connection: &Connection) -> Result<(), RegistryError> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS runs (
                pid INTEGER PRIMARY KEY,
                command TEXT,
                cwd TEXT,
                status TEXT,
                started_at TEXT,
                ended_at TEXT,
                returncode INTEGER,
                stdout_path TEXT,
                stderr_path TEXT,
                env_json TEXT,
                argv_json TEXT
            );
            ",
        )
        .map_err(|source| RegistryError::Sql { source })?;

    let existing = table_columns(connection)?;
    for column in OPTIONAL_COLUMNS {
        if !existing.iter().any(|name| name == column) {
            connection
                .execute_batch(&format!("ALTER TABLE runs ADD COLUMN {column} TEXT;"))
                .map_err(|source| RegistryError::Sql { source })?;
        }
    }

    connection
        .execute(
            "UPDATE runs SET started_at = ?1 WHERE started_at IS NULL OR started_at = ''",
            params![now_iso_seconds()],
        )
        .map_err(|source| RegistryError::Sql { source })?;
    Ok(())
}

fn table_columns(connection: &Connection) -> Result<Vec<String>, RegistryError> {
    let mut statement = connection
        .prepare("PRAGMA table_info(runs)")
        .map_err(|source| RegistryError::Sql { source })?;
    let rows = statement
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|source| RegistryError::Sql { source })?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row.map_err(|source| RegistryError::Sql { source })?);
    }
    Ok(names)
}

struct RawRun {
    pid: u32,
    command: Option<String>,
    cwd: Option<String>,
    status: Option<String>,
    started_at: Option<String>,
    ended_at: Option<String>,
    returncode: Option<i32>,
    stdout_path: Option<String>,
    stderr_path: Option<String>,
    env_json: Option<String>,
    argv_json: Option<String>,
}

impl RawRun {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pid: row.get(0)?,
            command: row.get(1)?,
            cwd: row.get(2)?,
            status: row.get(3)?,
            started_at: row.get(4)?,
            ended_at: row.get(5)?,
            returncode: row.get(6)?,
            stdout_path: row.get(7)?,
            stderr_path: row.get(8)?,
            env_json: row.get(9)?,
            argv_json: row.get(10)?,
        })
    }

    fn into_run(self) -> Run {
        // Rows written by other tools may carry any status text; those are
        // listed as terminal so reconciliation leaves them alone.
        let status = self
            .status
            .as_deref()
            .and_then(RunStatus::parse)
            .unwrap_or(RunStatus::Unknown);
        // Environment and argv snapshots are opaque; unreadable values are
        // reported as absent rather than failing the whole row.
        let extra_env = self
            .env_json
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| serde_json::from_str::<BTreeMap<String, String>>(raw).ok());
        let argv = self
            .argv_json
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok());

        Run {
            pid: self.pid,
            command: self.command.unwrap_or_default(),
            cwd: self.cwd.filter(|value| !value.is_empty()),
            status,
            started_at: self.started_at.unwrap_or_default(),
            ended_at: self.ended_at.filter(|value| !value.is_empty()),
            returncode: self.returncode,
            stdout_path: self.stdout_path.unwrap_or_default(),
            stderr_path: self.stderr_path.unwrap_or_default(),
            extra_env,
            argv,
        }
    }
}
