use crate::error::{Result, WagerError};
use crate::storage::Storage;
use crate::types::{Action, Address, TxHash, TxReceipt};
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalStatus {
    Pending,
    Confirmed,
    Failed,
}

impl JournalStatus {
    fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::Pending => "pending",
            JournalStatus::Confirmed => "confirmed",
            JournalStatus::Failed => "failed",
        }
    }

    fn from_db(s: &str) -> Self {
        match s {
            "confirmed" => JournalStatus::Confirmed,
            "failed" => JournalStatus::Failed,
            _ => JournalStatus::Pending,
        }
    }
}

impl std::fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted write as the client saw it. Informational only: the
/// session never reads the journal back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub identity: Address,
    pub action: Action,
    pub tx_hash: Option<TxHash>,
    pub status: JournalStatus,
    pub error: Option<String>,
    pub block_number: Option<u64>,
    pub submitted_at: chrono::DateTime<Utc>,
    pub finalized_at: Option<chrono::DateTime<Utc>>,
}

pub struct ActionJournal {
    storage: Arc<Storage>,
}

impl ActionJournal {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Record an action before it is handed to the wallet.
    pub async fn record_submitted(&self, identity: &Address, action: &Action) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let action_json = serde_json::to_string(action)?;
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO actions (id, identity, action, status, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                identity.as_str().to_lowercase(),
                action_json,
                JournalStatus::Pending.as_str(),
                Utc::now().timestamp_millis(),
            ],
        )?;

        tracing::debug!("Journaled {} as {}", action.name(), id);
        Ok(id)
    }

    pub async fn attach_tx(&self, id: &str, tx: &TxHash) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE actions SET tx_hash = ?1 WHERE id = ?2",
            params![tx.0, id],
        )?;
        Ok(())
    }

    pub async fn mark_confirmed(&self, id: &str, receipt: &TxReceipt) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let updated = conn.execute(
            "UPDATE actions SET status = ?1, tx_hash = ?2, block_number = ?3, finalized_at = ?4
             WHERE id = ?5",
            params![
                JournalStatus::Confirmed.as_str(),
                receipt.tx_hash.0,
                receipt.block_number as i64,
                Utc::now().timestamp_millis(),
                id,
            ],
        )?;
        if updated == 0 {
            return Err(WagerError::internal(format!("No journal entry {}", id)));
        }
        Ok(())
    }

    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let updated = conn.execute(
            "UPDATE actions SET status = ?1, error = ?2, finalized_at = ?3 WHERE id = ?4",
            params![
                JournalStatus::Failed.as_str(),
                error,
                Utc::now().timestamp_millis(),
                id,
            ],
        )?;
        if updated == 0 {
            return Err(WagerError::internal(format!("No journal entry {}", id)));
        }
        Ok(())
    }

    /// Most recent entries for an identity, newest first.
    pub async fn recent(&self, identity: &Address, limit: usize) -> Result<Vec<JournalEntry>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, identity, action, tx_hash, status, error, block_number,
                    submitted_at, finalized_at
             FROM actions WHERE identity = ?1
             ORDER BY submitted_at DESC, rowid DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(
            params![identity.as_str().to_lowercase(), limit as i64],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, Option<i64>>(8)?,
                ))
            },
        )?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, identity, action, tx_hash, status, error, block, submitted, finalized) = row?;
            entries.push(JournalEntry {
                id,
                identity: Address::parse(&identity)?,
                action: serde_json::from_str(&action)?,
                tx_hash: tx_hash.map(TxHash),
                status: JournalStatus::from_db(&status),
                error,
                block_number: block.map(|b| b as u64),
                submitted_at: chrono::DateTime::from_timestamp_millis(submitted)
                    .unwrap_or_else(Utc::now),
                finalized_at: finalized.and_then(chrono::DateTime::from_timestamp_millis),
            });
        }

        Ok(entries)
    }
}
