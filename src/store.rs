use crate::db;
use chrono::{Local, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Stored timestamp layout. Lexicographic order on this format equals
/// chronological order, which the append path relies on.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinEvent {
    pub id: String,
    pub name: String,
    pub morale: i64,
    pub understanding: i64,
    pub submitted_at: String,
}

impl CheckinEvent {
    /// `YYYY-MM-DD` portion of the stamp, the grouping key for all rollups.
    pub fn date_key(&self) -> &str {
        if self.submitted_at.len() >= 10 {
            &self.submitted_at[..10]
        } else {
            &self.submitted_at
        }
    }

    pub fn submitted_at_dt(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.submitted_at, TIMESTAMP_FORMAT).ok()
    }
}

#[derive(Debug)]
pub enum StoreError {
    GateClosed,
    InvalidEvent {
        field: &'static str,
        message: String,
    },
    Io(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::GateClosed => "gate_closed",
            StoreError::InvalidEvent { .. } => "invalid_event",
            StoreError::Io(_) => "store_failed",
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        StoreError::InvalidEvent {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::GateClosed => write!(f, "check-in is currently closed"),
            StoreError::InvalidEvent { field, message } => write!(f, "{}: {}", field, message),
            // Persistence internals stay out of caller-facing text.
            StoreError::Io(_) => write!(f, "the check-in store is unavailable"),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Trim, then title-case each whitespace-delimited token. Two raw spellings
/// that normalize to the same string are the same identity; nothing beyond
/// this is folded.
pub fn normalize_identity(raw: &str) -> String {
    raw.split_whitespace()
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Append-only check-in store plus the instructor session gate, both backed by
/// the workspace database. One mutex serializes every mutation; readers take
/// the same lock briefly and always see a complete snapshot.
pub struct EventStore {
    conn: Mutex<Connection>,
}

impl EventStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        let conn = db::open_db(workspace)?;
        Ok(EventStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Io("store lock poisoned".to_string()))
    }

    pub fn is_open(&self) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let open: i64 = conn.query_row("SELECT is_open FROM session_state WHERE id = 1", [], |r| {
            r.get(0)
        })?;
        Ok(open != 0)
    }

    /// Idempotent; returns the (new) gate state.
    pub fn open_session(&self) -> Result<bool, StoreError> {
        self.set_gate(true)
    }

    /// Idempotent; returns the (new) gate state.
    pub fn close_session(&self) -> Result<bool, StoreError> {
        self.set_gate(false)
    }

    fn set_gate(&self, open: bool) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE session_state SET is_open = ? WHERE id = 1",
            [i64::from(open)],
        )?;
        Ok(open)
    }

    /// The full submission path: gate check, identity normalization, score
    /// validation, server-side stamp, append. The whole sequence runs under
    /// the store lock so a gate toggle or a second submit can never interleave,
    /// and the insert itself is transactional. No partial effects on failure.
    pub fn submit(
        &self,
        raw_name: &str,
        morale: i64,
        understanding: i64,
    ) -> Result<CheckinEvent, StoreError> {
        // Gate first: a closed gate answers before the payload is examined.
        let conn = self.lock()?;
        let gate_open: i64 =
            conn.query_row("SELECT is_open FROM session_state WHERE id = 1", [], |r| {
                r.get(0)
            })?;
        if gate_open == 0 {
            return Err(StoreError::GateClosed);
        }

        let name = normalize_identity(raw_name);
        if name.is_empty() {
            return Err(StoreError::invalid("name", "name must not be empty"));
        }
        if !(1..=10).contains(&morale) {
            return Err(StoreError::invalid(
                "morale",
                "morale must be between 1 and 10",
            ));
        }
        if !(1..=10).contains(&understanding) {
            return Err(StoreError::invalid(
                "understanding",
                "understanding must be between 1 and 10",
            ));
        }

        // Stamp with the current server time, clamped so stamps never run
        // backwards relative to the last accepted event.
        let mut submitted_at = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
        let last: Option<String> = conn
            .query_row(
                "SELECT submitted_at FROM checkins ORDER BY seq DESC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(last) = last {
            if last > submitted_at {
                submitted_at = last;
            }
        }

        let event = CheckinEvent {
            id: Uuid::new_v4().to_string(),
            name,
            morale,
            understanding,
            submitted_at,
        };
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO checkins(id, name, morale, understanding, submitted_at)
             VALUES(?, ?, ?, ?, ?)",
            (
                &event.id,
                &event.name,
                event.morale,
                event.understanding,
                &event.submitted_at,
            ),
        )?;
        tx.commit()?;
        Ok(event)
    }

    /// Consistent snapshot of every accepted event, in append order (which
    /// coincides with `submitted_at` order).
    pub fn read_all(&self) -> Result<Vec<CheckinEvent>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, morale, understanding, submitted_at
             FROM checkins
             ORDER BY seq",
        )?;
        let events = stmt
            .query_map([], |r| {
                Ok(CheckinEvent {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    morale: r.get(2)?,
                    understanding: r.get(3)?,
                    submitted_at: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }
}
