//! SQLite-based registration storage
//!
//! Schema:
//!   - sources: Submitting parties and their authority
//!   - registrations: Submitted records, `data` as JSON text
//!   - subscription_requests: Enrolments handed to the messaging service
//!   - hooks: Webhook subscriptions registered at runtime

use chrono::{DateTime, Utc};
use famreg_core::{
    Authority, Registration, RegistrationError, RegistrationStore, Source, Stage,
    SubscriptionRequest,
};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::Value as SqlValue};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StoreError};

/// Fixed-width UTC timestamps so text comparison orders them.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

const REGISTRATION_COLUMNS: &str =
    "id, stage, mother_id, source_id, data, validated, created_at, updated_at";

fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Filters for [`SqliteStore::list_registrations`]. Unset fields match all.
#[derive(Debug, Clone, Default)]
pub struct RegistrationFilter {
    pub stage: Option<Stage>,
    pub mother_id: Option<String>,
    pub validated: Option<bool>,
    pub source: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Webhook subscription registered through the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub event: String,
    pub target: String,
    /// Source that registered the hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn read_hook(row: &rusqlite::Row<'_>) -> rusqlite::Result<Hook> {
    Ok(Hook {
        id: Some(row.get(0)?),
        event: row.get(1)?,
        target: row.get(2)?,
        source: row.get(3)?,
        created_at: Some(row.get(4)?),
    })
}

/// Why a conditional registration update touched no row.
fn unchanged_registration(conn: &Connection, id: &str) -> Result<StoreError> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM registrations WHERE id = ?",
            params![id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(if exists {
        StoreError::AlreadyValidated { id: id.to_string() }
    } else {
        StoreError::NotFound { id: id.to_string() }
    })
}

fn insert_request_row(
    conn: &Connection,
    request: &SubscriptionRequest,
) -> Result<SubscriptionRequest> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = timestamp(Utc::now());

    conn.execute(
        "INSERT INTO subscription_requests (id, contact, messageset, next_sequence_number, lang, schedule, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            request.contact,
            request.messageset,
            request.next_sequence_number,
            request.lang,
            request.schedule,
            now
        ],
    )?;

    Ok(SubscriptionRequest {
        id: Some(id),
        created_at: Some(now),
        ..request.clone()
    })
}

type RegistrationRow = (String, String, String, String, String, bool, String, String);

fn read_registration_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RegistrationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn registration_from_row(row: RegistrationRow) -> Result<Registration> {
    let (id, stage, mother_id, source, data, validated, created_at, updated_at) = row;
    let stage: Stage = stage.parse().map_err(StoreError::Corrupt)?;
    let data = serde_json::from_str(&data)?;
    Ok(Registration {
        id,
        stage,
        mother_id,
        source,
        data,
        validated,
        created_at: Some(created_at),
        updated_at: Some(updated_at),
    })
}

/// SQLite-based registration store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

#[allow(clippy::result_large_err)]
impl SqliteStore {
    /// Open the store (create if not exists)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for read-write concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sources (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                authority TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS registrations (
                id TEXT PRIMARY KEY,
                stage TEXT NOT NULL,
                mother_id TEXT NOT NULL,
                source_id TEXT NOT NULL,
                data TEXT NOT NULL,
                validated INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS subscription_requests (
                id TEXT PRIMARY KEY,
                contact TEXT NOT NULL,
                messageset INTEGER NOT NULL,
                next_sequence_number INTEGER NOT NULL,
                lang TEXT NOT NULL,
                schedule INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS hooks (
                id TEXT PRIMARY KEY,
                event TEXT NOT NULL,
                target TEXT NOT NULL,
                source_id TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_registrations_mother ON registrations(mother_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_registrations_created ON registrations(created_at)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_subscription_requests_contact ON subscription_requests(contact)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Insert or update a source
    pub fn upsert_source(&self, source: &Source) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sources (id, name, authority) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, authority = excluded.authority",
            params![source.id, source.name, source.authority.as_str()],
        )?;
        Ok(())
    }

    /// Get a source
    pub fn get_source(&self, id: &str) -> Result<Option<Source>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, name, authority FROM sources WHERE id = ?",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, name, authority)| {
            let authority: Authority = authority.parse().map_err(StoreError::Corrupt)?;
            Ok(Source {
                id,
                name,
                authority,
            })
        })
        .transpose()
    }

    /// Store a new registration, stamping its timestamps
    pub fn insert_registration(&self, registration: &Registration) -> Result<Registration> {
        let now = timestamp(Utc::now());
        let data = serde_json::to_string(&registration.data)?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO registrations (id, stage, mother_id, source_id, data, validated, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                registration.id,
                registration.stage.as_str(),
                registration.mother_id,
                registration.source,
                data,
                registration.validated,
                now,
                now
            ],
        )?;

        let mut stored = registration.clone();
        stored.created_at = Some(now.clone());
        stored.updated_at = Some(now);
        Ok(stored)
    }

    /// Get a registration
    pub fn get_registration(&self, id: &str) -> Result<Option<Registration>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM registrations WHERE id = ?", REGISTRATION_COLUMNS),
                params![id],
                read_registration_row,
            )
            .optional()?;
        row.map(registration_from_row).transpose()
    }

    /// Update `data` and `validated` of a registration that is not yet
    /// validated.
    pub fn update_registration(&self, registration: &Registration) -> Result<()> {
        let data = serde_json::to_string(&registration.data)?;
        let conn = self.conn()?;

        let rows = conn.execute(
            "UPDATE registrations SET data = ?, validated = ?, updated_at = ?
             WHERE id = ? AND validated = 0",
            params![
                data,
                registration.validated,
                timestamp(Utc::now()),
                registration.id
            ],
        )?;
        if rows > 0 {
            return Ok(());
        }
        Err(unchanged_registration(&conn, &registration.id)?)
    }

    /// Mark a registration validated and store its subscription request in
    /// one transaction. Nothing is written if the row is already validated.
    pub fn complete_validation(
        &self,
        registration: &Registration,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionRequest> {
        let data = serde_json::to_string(&registration.data)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE registrations SET data = ?, validated = 1, updated_at = ?
             WHERE id = ? AND validated = 0",
            params![data, timestamp(Utc::now()), registration.id],
        )?;
        if rows == 0 {
            return Err(unchanged_registration(&tx, &registration.id)?);
        }

        let created = insert_request_row(&tx, request)?;
        tx.commit()?;
        Ok(created)
    }

    /// List registrations matching a filter, oldest first
    pub fn list_registrations(&self, filter: &RegistrationFilter) -> Result<Vec<Registration>> {
        let mut sql = format!("SELECT {} FROM registrations WHERE 1 = 1", REGISTRATION_COLUMNS);
        let mut args: Vec<SqlValue> = Vec::new();

        if let Some(stage) = filter.stage {
            sql.push_str(" AND stage = ?");
            args.push(SqlValue::Text(stage.as_str().to_string()));
        }
        if let Some(mother_id) = &filter.mother_id {
            sql.push_str(" AND mother_id = ?");
            args.push(SqlValue::Text(mother_id.clone()));
        }
        if let Some(validated) = filter.validated {
            sql.push_str(" AND validated = ?");
            args.push(SqlValue::Integer(validated as i64));
        }
        if let Some(source) = &filter.source {
            sql.push_str(" AND source_id = ?");
            args.push(SqlValue::Text(source.clone()));
        }
        if let Some(after) = filter.created_after {
            sql.push_str(" AND created_at >= ?");
            args.push(SqlValue::Text(timestamp(after)));
        }
        if let Some(before) = filter.created_before {
            sql.push_str(" AND created_at <= ?");
            args.push(SqlValue::Text(timestamp(before)));
        }
        sql.push_str(" ORDER BY created_at, id");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), read_registration_row)?;

        let mut registrations = Vec::new();
        for row in rows {
            registrations.push(registration_from_row(row?)?);
        }
        Ok(registrations)
    }

    /// Store a subscription request under a fresh id
    pub fn insert_subscription_request(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionRequest> {
        let conn = self.conn()?;
        insert_request_row(&conn, request)
    }

    /// List subscription requests, optionally for one contact
    pub fn list_subscription_requests(
        &self,
        contact: Option<&str>,
    ) -> Result<Vec<SubscriptionRequest>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, contact, messageset, next_sequence_number, lang, schedule, created_at
             FROM subscription_requests
             WHERE ?1 IS NULL OR contact = ?1
             ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![contact], |row| {
            Ok(SubscriptionRequest {
                id: Some(row.get(0)?),
                contact: row.get(1)?,
                messageset: row.get(2)?,
                next_sequence_number: row.get(3)?,
                lang: row.get(4)?,
                schedule: row.get(5)?,
                created_at: Some(row.get(6)?),
            })
        })?;

        let mut requests = Vec::new();
        for request in rows {
            requests.push(request?);
        }
        Ok(requests)
    }

    /// All sources, by id
    pub fn list_sources(&self) -> Result<Vec<Source>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, authority FROM sources ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut sources = Vec::new();
        for row in rows {
            let (id, name, authority) = row?;
            sources.push(Source {
                id,
                name,
                authority: authority.parse().map_err(StoreError::Corrupt)?,
            });
        }
        Ok(sources)
    }

    /// Register a webhook under a fresh id
    pub fn insert_hook(&self, hook: &Hook) -> Result<Hook> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp(Utc::now());
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO hooks (id, event, target, source_id, created_at) VALUES (?, ?, ?, ?, ?)",
            params![id, hook.event, hook.target, hook.source, now],
        )?;
        Ok(Hook {
            id: Some(id),
            created_at: Some(now),
            ..hook.clone()
        })
    }

    pub fn get_hook(&self, id: &str) -> Result<Option<Hook>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT id, event, target, source_id, created_at FROM hooks WHERE id = ?",
                params![id],
                read_hook,
            )
            .optional()?)
    }

    /// List hooks, optionally only those for one event
    pub fn list_hooks(&self, event: Option<&str>) -> Result<Vec<Hook>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, event, target, source_id, created_at FROM hooks
             WHERE ?1 IS NULL OR event = ?1
             ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![event], read_hook)?;

        let mut hooks = Vec::new();
        for hook in rows {
            hooks.push(hook?);
        }
        Ok(hooks)
    }

    /// Change a hook's event and target. Returns None if there was none.
    pub fn update_hook(&self, id: &str, event: &str, target: &str) -> Result<Option<Hook>> {
        {
            let conn = self.conn()?;
            let rows = conn.execute(
                "UPDATE hooks SET event = ?, target = ? WHERE id = ?",
                params![event, target, id],
            )?;
            if rows == 0 {
                return Ok(None);
            }
        }
        self.get_hook(id)
    }

    /// Delete a hook. Returns false if there was none.
    pub fn delete_hook(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM hooks WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => RegistrationError::NotFound { id },
            StoreError::AlreadyValidated { id } => RegistrationError::AlreadyValidated { id },
            other => RegistrationError::storage(other),
        }
    }
}

impl RegistrationStore for SqliteStore {
    fn load(&self, id: &str) -> famreg_core::Result<Registration> {
        self.get_registration(id)?
            .ok_or_else(|| RegistrationError::NotFound { id: id.to_string() })
    }

    fn save(&self, registration: &Registration) -> famreg_core::Result<()> {
        Ok(self.update_registration(registration)?)
    }

    fn authority_of(&self, source_id: &str) -> famreg_core::Result<Authority> {
        self.get_source(source_id)?
            .map(|source| source.authority)
            .ok_or_else(|| RegistrationError::SourceNotFound {
                id: source_id.to_string(),
            })
    }

    fn complete_validation(
        &self,
        registration: &Registration,
        request: &SubscriptionRequest,
    ) -> famreg_core::Result<SubscriptionRequest> {
        Ok(SqliteStore::complete_validation(self, registration, request)?)
    }
}
