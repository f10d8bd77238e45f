//! Local Credential Store
//!
//! Durable single-table persistence for [`Credential`] records in an embedded
//! `SQLite` file.
//!
//! # Location
//! `<home>/.redis_pass.db`, where `<home>` is `$HOME`, then `$home`, then the
//! platform default for Linux, macOS and Windows. The path and table name are
//! carried in a [`StoreConfig`] so callers (and tests) can point elsewhere.
//!
//! # Stateless Design
//! Every operation opens a fresh connection, runs one transaction, commits and
//! closes. Concurrent writers from separate processes rely on `SQLite` locking
//! and the table's uniqueness constraint; there is no application-level lock.

use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::credential::Credential;
use crate::error::{RedlineError, Result};
use crate::schema::{Field, FieldValue, FIELDS};

/// Table holding the credentials
pub const DEFAULT_TABLE: &str = "redis_pass";

/// Store file name, relative to the home directory
pub const STORE_FILE_NAME: &str = ".redis_pass.db";

/// Where the credential store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path to the `SQLite` file (created on first use)
    pub path: PathBuf,

    /// Table name; must be a plain identifier
    pub table: String,
}

impl StoreConfig {
    /// Store at `path` with a custom table name
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        let is_identifier = table
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !is_identifier {
            return Err(RedlineError::config_error(format!(
                "'{table}' is not a valid credential table name"
            )));
        }

        Ok(Self {
            path: path.into(),
            table,
        })
    }

    /// Store at `path` using the default table
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Store in the user's home directory
    pub fn from_env() -> Result<Self> {
        Ok(Self::at(home_dir()?.join(STORE_FILE_NAME)))
    }
}

/// Resolve the user's home directory
///
/// `HOME` wins, then lowercase `home`, then the platform default. Platforms
/// other than Linux, macOS and Windows are rejected.
pub fn home_dir() -> Result<PathBuf> {
    resolve_home(std::env::var_os("HOME"), std::env::var_os("home"), std::env::consts::OS)
}

fn resolve_home(home: Option<OsString>, home_lower: Option<OsString>, os: &str) -> Result<PathBuf> {
    let non_empty = |value: &OsString| !value.is_empty();
    if let Some(explicit) = home.filter(non_empty).or_else(|| home_lower.filter(non_empty)) {
        return Ok(PathBuf::from(explicit));
    }

    match os {
        "linux" | "macos" | "windows" => dirs::home_dir().ok_or_else(|| {
            RedlineError::config_error("Could not determine the user's home directory")
        }),
        other => Err(RedlineError::config_error(format!(
            "'{other}' is not a supported OS. Please submit a ticket."
        ))),
    }
}

/// Handle on the credential store
///
/// Holds only configuration; connections are opened per operation.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    config: StoreConfig,
}

impl CredentialStore {
    #[must_use]
    pub const fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// Store at the default per-user location
    pub fn from_env() -> Result<Self> {
        StoreConfig::from_env().map(Self::new)
    }

    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Open the store, creating the file and table if absent
    pub fn open(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(&self.config.path, flags).map_err(|e| {
            RedlineError::store_error(format!(
                "Failed to open credential store '{}': {e}",
                self.config.path.display()
            ))
        })?;

        conn.execute_batch(&self.creation_script())?;

        Ok(conn)
    }

    /// `CREATE TABLE IF NOT EXISTS` statement derived from the field schema
    #[must_use]
    pub fn creation_script(&self) -> String {
        let mut columns: Vec<String> = FIELDS
            .iter()
            .map(|spec| match spec.default.sql_literal() {
                Some(default) => format!("    {} {} DEFAULT {default}", spec.name, spec.sql_type),
                None => format!("    {} {}", spec.name, spec.sql_type),
            })
            .collect();

        let identity: Vec<&str> = Field::IDENTITY.iter().map(|field| field.name()).collect();
        columns.push(format!("    UNIQUE({})", identity.join(", ")));

        format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n);", self.config.table, columns.join(",\n"))
    }

    /// Load every stored credential, in insertion order
    ///
    /// Each column is routed through the field schema. A column without a
    /// matching field is a lookup error; a value that does not fit its field is a
    /// validation error. Either aborts the whole load.
    pub fn load_all(&self) -> Result<Vec<Credential>> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare(&format!("SELECT * FROM {} ORDER BY rowid", self.config.table))?;

        let fields = stmt
            .column_names()
            .into_iter()
            .map(Field::from_name)
            .collect::<Result<Vec<_>>>()?;

        let mut rows = stmt.query([])?;
        let mut credentials = Vec::new();

        while let Some(row) = rows.next()? {
            let mut credential = Credential::default();
            for (index, field) in fields.iter().enumerate() {
                let raw: SqlValue = row.get(index)?;
                credential.set(*field, from_sql(raw, *field)?)?;
            }
            credentials.push(credential);
        }

        debug!(count = credentials.len(), path = %self.config.path.display(), "loaded credentials");
        Ok(credentials)
    }

    /// Insert or replace a credential, keyed by its identity fields
    ///
    /// `SQLite` treats NULLs as distinct inside `UNIQUE`, so a profile without a
    /// username would never collide with itself. Rows with the same identity are
    /// removed with NULL-aware `IS` comparisons first, in the same transaction.
    pub fn upsert(&self, credential: &Credential) -> Result<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;

        let identity_clause: Vec<String> =
            Field::IDENTITY.iter().map(|field| format!("{} IS ?", field.name())).collect();
        tx.execute(
            &format!("DELETE FROM {} WHERE {}", self.config.table, identity_clause.join(" AND ")),
            params_from_iter(Field::IDENTITY.iter().map(|field| credential.get(*field))),
        )?;

        let columns: Vec<&str> = FIELDS.iter().map(|spec| spec.name).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO {} ({}) VALUES ({placeholders})",
                self.config.table,
                columns.join(", ")
            ),
            params_from_iter(FIELDS.iter().map(|spec| credential.get(spec.field))),
        )?;

        tx.commit()?;

        debug!(uri = %credential, "saved credential");
        Ok(())
    }
}

fn from_sql(raw: SqlValue, field: Field) -> Result<FieldValue> {
    match raw {
        SqlValue::Null => Ok(FieldValue::Null),
        SqlValue::Integer(i) => Ok(FieldValue::Integer(i)),
        SqlValue::Real(f) => Ok(FieldValue::Float(f)),
        SqlValue::Text(s) => Ok(FieldValue::Text(s)),
        SqlValue::Blob(_) => Err(RedlineError::validation_failed(format!(
            "'Credential.{field}' cannot be loaded from binary data"
        ))),
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqlValue::Null),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Self::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Self::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
        })
    }
}
