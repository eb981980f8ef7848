use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use tracing::debug;

use super::{NewRequest, RecordStore};
use crate::entity::{
    EvaluationRecord, FiledRequest, Incident, ParticipantId, RequestFilter, RequestId,
    RequestStatus,
};
use crate::error::{CountersignError, Result};

/// Bumped whenever the table layout changes.
pub const STORE_SCHEMA_VERSION: &str = "1";

const REQUEST_COLUMNS: &str = "id, request_path, applicant_id, evaluation, status, version, \
                               incident_id, archived, created_at, updated_at";

/// SQLite-backed request store.
///
/// Each process (or thread) opens its own connection; concurrent writers on
/// the same record are arbitrated by the `version` column.
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self {
            conn,
            path: path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS incidents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                employee_id TEXT NOT NULL,
                description TEXT NOT NULL,
                acted_upon INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_path TEXT NOT NULL,
                applicant_id TEXT NOT NULL,
                evaluation TEXT NOT NULL,
                status TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                incident_id INTEGER REFERENCES incidents(id),
                archived INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_requests_status ON requests(status);
            CREATE INDEX IF NOT EXISTS idx_requests_applicant ON requests(applicant_id);
            CREATE INDEX IF NOT EXISTS idx_requests_path ON requests(request_path);
            ",
        )?;

        let stored: Option<String> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| {
                row.get(0)
            })
            .optional()?;

        match stored.as_deref() {
            None => {
                self.conn.execute(
                    "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
                    [STORE_SCHEMA_VERSION],
                )?;
            }
            Some(STORE_SCHEMA_VERSION) => {}
            Some(other) => {
                return Err(CountersignError::Persistence(format!(
                    "database schema version {} does not match {}",
                    other, STORE_SCHEMA_VERSION
                )));
            }
        }

        Ok(())
    }

    fn begin_immediate(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl RecordStore for SqliteStore {
    fn insert_request(&self, request: &NewRequest) -> Result<FiledRequest> {
        request.record.validate()?;
        let evaluation = request.record.to_wire()?;
        let status = request.record.status();
        let now = Utc::now();

        let tx = self.begin_immediate()?;

        if let Some(incident_id) = request.incident_id {
            let flagged = tx.execute(
                "UPDATE incidents SET acted_upon = 1 WHERE id = ?1",
                [incident_id],
            )?;
            if flagged == 0 {
                return Err(CountersignError::IncidentNotFound(incident_id));
            }
        }

        tx.execute(
            "INSERT INTO requests
             (request_path, applicant_id, evaluation, status, version, incident_id, archived, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, 0, ?6, ?6)",
            params![
                request.request_path,
                request.applicant_id.as_str(),
                evaluation,
                status.to_string(),
                request.incident_id,
                now.to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(request_id = id, %status, "inserted request");

        Ok(FiledRequest {
            id,
            request_path: request.request_path.clone(),
            applicant_id: request.applicant_id.clone(),
            status,
            version: 1,
            incident_id: request.incident_id,
            archived: false,
            created_at: now,
            updated_at: now,
            record: request.record.clone(),
        })
    }

    fn load_request(&self, id: RequestId) -> Result<Option<FiledRequest>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM requests WHERE id = ?1", REQUEST_COLUMNS),
                [id],
                RequestRow::from_row,
            )
            .optional()?;

        row.map(RequestRow::into_filed).transpose()
    }

    fn update_record(
        &self,
        id: RequestId,
        expected_version: i64,
        record: &EvaluationRecord,
    ) -> Result<Option<i64>> {
        record.validate()?;
        let evaluation = record.to_wire()?;
        let status = record.status();

        let tx = self.begin_immediate()?;

        let updated = tx.execute(
            "UPDATE requests
             SET evaluation = ?1, status = ?2, version = version + 1, updated_at = ?3
             WHERE id = ?4 AND version = ?5 AND archived = 0",
            params![
                evaluation,
                status.to_string(),
                Utc::now().to_rfc3339(),
                id,
                expected_version
            ],
        )?;

        if updated == 0 {
            let archived: Option<bool> = tx
                .query_row("SELECT archived FROM requests WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            tx.rollback()?;
            return match archived {
                None => Err(CountersignError::RequestNotFound(id)),
                Some(true) => Err(CountersignError::RequestArchived(id)),
                Some(false) => {
                    debug!(request_id = id, expected_version, "version conflict");
                    Ok(None)
                }
            };
        }

        // Deciding on an action marks its source incident as handled
        tx.execute(
            "UPDATE incidents SET acted_upon = 1
             WHERE id = (SELECT incident_id FROM requests WHERE id = ?1)",
            [id],
        )?;

        tx.commit()?;
        Ok(Some(expected_version + 1))
    }

    fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<FiledRequest>> {
        let mut sql = format!("SELECT {} FROM requests WHERE archived = 0", REQUEST_COLUMNS);
        let mut values: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            values.push(status.to_string());
            sql.push_str(&format!(" AND status = ?{}", values.len()));
        }
        if let Some(path) = &filter.request_path {
            values.push(path.clone());
            sql.push_str(&format!(" AND request_path = ?{}", values.len()));
        }
        if let Some(applicant) = &filter.applicant {
            values.push(applicant.to_string());
            sql.push_str(&format!(" AND applicant_id = ?{}", values.len()));
        }
        if filter.awaiting.is_some() {
            // An undecided slot implies the request is still open or rejected
            sql.push_str(" AND status != 'approved'");
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), RequestRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut requests = Vec::new();
        for row in rows {
            let request = row.into_filed()?;
            if !filter.matches_record(&request.record) {
                continue;
            }
            requests.push(request);
            if filter.limit.is_some_and(|limit| requests.len() >= limit) {
                break;
            }
        }
        Ok(requests)
    }

    fn archive_request(&self, id: RequestId) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE requests SET archived = 1, version = version + 1, updated_at = ?1
             WHERE id = ?2 AND archived = 0",
            params![Utc::now().to_rfc3339(), id],
        )?;
        if updated == 0 && self.load_request(id)?.is_none() {
            return Err(CountersignError::RequestNotFound(id));
        }
        Ok(updated > 0)
    }

    fn insert_incident(&self, employee_id: &ParticipantId, description: &str) -> Result<Incident> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO incidents (employee_id, description, acted_upon, created_at)
             VALUES (?1, ?2, 0, ?3)",
            params![employee_id.as_str(), description, now.to_rfc3339()],
        )?;

        Ok(Incident {
            id: self.conn.last_insert_rowid(),
            employee_id: employee_id.clone(),
            description: description.to_string(),
            acted_upon: false,
            created_at: now,
        })
    }

    fn load_incident(&self, id: i64) -> Result<Option<Incident>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, employee_id, description, acted_upon, created_at
                 FROM incidents WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, employee_id, description, acted_upon, created_at)| {
            Ok(Incident {
                id,
                employee_id: ParticipantId::from(employee_id),
                description,
                acted_upon,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }
}

/// Raw request row before the record is parsed and validated.
struct RequestRow {
    id: i64,
    request_path: String,
    applicant_id: String,
    evaluation: String,
    status: String,
    version: i64,
    incident_id: Option<i64>,
    archived: bool,
    created_at: String,
    updated_at: String,
}

impl RequestRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            request_path: row.get(1)?,
            applicant_id: row.get(2)?,
            evaluation: row.get(3)?,
            status: row.get(4)?,
            version: row.get(5)?,
            incident_id: row.get(6)?,
            archived: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_filed(self) -> Result<FiledRequest> {
        let record = EvaluationRecord::from_wire(&self.evaluation)?;
        let status: RequestStatus = self
            .status
            .parse()
            .map_err(CountersignError::Persistence)?;

        Ok(FiledRequest {
            id: self.id,
            request_path: self.request_path,
            applicant_id: ParticipantId::from(self.applicant_id),
            status,
            version: self.version,
            incident_id: self.incident_id,
            archived: self.archived,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            record,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CountersignError::Persistence(format!("bad timestamp '{}': {}", value, e)))
}

impl From<rusqlite::Error> for CountersignError {
    fn from(e: rusqlite::Error) -> Self {
        CountersignError::Persistence(format!("SQLite error: {}", e))
    }
}
