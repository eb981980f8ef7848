use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Notifier, NotifyError};
use crate::entity::{Participant, ParticipantId};
use crate::error::Result;

/// A queued notification awaiting delivery by an external mailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub recipient_id: ParticipantId,
    pub recipient_email: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Appends notifications to an `outbox` table.
///
/// Uses its own connection so a queued message never shares a transaction
/// with the workflow write that triggered it.
pub struct OutboxNotifier {
    conn: Connection,
}

impl OutboxNotifier {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS outbox (
                id TEXT PRIMARY KEY,
                recipient_id TEXT NOT NULL,
                recipient_email TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self { conn })
    }

    /// Queued messages, oldest first.
    pub fn messages(&self, limit: Option<usize>) -> Result<Vec<OutboxMessage>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            "SELECT id, recipient_id, recipient_email, subject, body, created_at
             FROM outbox ORDER BY created_at, rowid LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut messages = Vec::with_capacity(rows.len());
        for (id, recipient_id, recipient_email, subject, body, created_at) in rows {
            // Skip rows an external tool may have mangled
            let (Ok(id), Ok(created_at)) = (
                Uuid::parse_str(&id),
                DateTime::parse_from_rfc3339(&created_at),
            ) else {
                tracing::warn!(id = %id, "skipping malformed outbox row");
                continue;
            };
            messages.push(OutboxMessage {
                id,
                recipient_id: ParticipantId::from(recipient_id),
                recipient_email,
                subject,
                body,
                created_at: created_at.with_timezone(&Utc),
            });
        }
        Ok(messages)
    }

    /// Remove a message once delivered. Returns false when it was not queued.
    pub fn acknowledge(&self, id: Uuid) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM outbox WHERE id = ?1", [id.to_string()])?;
        Ok(removed > 0)
    }
}

impl Notifier for OutboxNotifier {
    fn notify(
        &self,
        recipient: &Participant,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), NotifyError> {
        if recipient.email.is_empty() {
            return Err(NotifyError::NoAddress(recipient.id.clone()));
        }
        self.conn.execute(
            "INSERT INTO outbox (id, recipient_id, recipient_email, subject, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::new_v4().to_string(),
                recipient.id.as_str(),
                recipient.email,
                subject,
                body,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
