//! In-memory record of send attempts

use chrono::{DateTime, Duration, Utc};
use m365mail_graph::{DispatchResult, OutboundMessage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Outcome stored with a delivery record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One send attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub from_email: String,
    /// Primary recipients joined with ", "
    pub to_emails: String,
    pub subject: String,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    /// Serialized dispatch result
    pub response_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Describe the dispatch of `message` that produced `result`
    pub fn from_result(
        message: &OutboundMessage,
        result: &DispatchResult,
        created_at: DateTime<Utc>,
    ) -> Self {
        let to_emails = message
            .to
            .iter()
            .map(|addr| addr.trim())
            .filter(|addr| !addr.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let (status, error_message) = match result.as_failure() {
            Some(failure) => (DeliveryStatus::Failed, Some(failure.message.clone())),
            None => (DeliveryStatus::Success, None),
        };

        Self {
            id: Uuid::new_v4(),
            from_email: message.from.trim().to_string(),
            to_emails,
            subject: message.subject.clone(),
            status,
            error_message,
            response_data: serde_json::to_value(result).ok(),
            created_at,
        }
    }
}

/// Thread-safe delivery history, newest first on read
#[derive(Debug, Default)]
pub struct DeliveryLog {
    records: RwLock<Vec<DeliveryRecord>>,
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: DeliveryRecord) {
        debug!(
            "Delivery log: {} {} -> {}",
            record.status, record.from_email, record.to_emails
        );
        self.write().push(record);
    }

    /// Page through records, newest first, optionally filtered by status
    pub fn list(
        &self,
        limit: usize,
        offset: usize,
        status: Option<DeliveryStatus>,
    ) -> Vec<DeliveryRecord> {
        let records = self.read();
        let mut matching: Vec<&DeliveryRecord> = records
            .iter()
            .rev()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect();
        // Stable sort keeps insertion order (newest first) for equal timestamps
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn count(&self, status: Option<DeliveryStatus>) -> usize {
        self.read()
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .count()
    }

    pub fn get(&self, id: Uuid) -> Option<DeliveryRecord> {
        self.read().iter().find(|r| r.id == id).cloned()
    }

    /// Remove records created more than `retention_days` before `now`.
    /// A retention of zero or less, or one reaching past the representable
    /// time range, keeps everything. Returns the number removed.
    pub fn cleanup_older_than(&self, retention_days: i64, now: DateTime<Utc>) -> usize {
        if retention_days <= 0 {
            return 0;
        }
        let Some(cutoff) = Duration::try_days(retention_days)
            .and_then(|retention| now.checked_sub_signed(retention))
        else {
            return 0;
        };
        let mut records = self.write();
        let before = records.len();
        records.retain(|r| r.created_at >= cutoff);
        let removed = before - records.len();
        if removed > 0 {
            debug!("Delivery log: removed {} record(s) older than {}", removed, cutoff);
        }
        removed
    }

    /// Remove one record; false when it does not exist
    pub fn delete(&self, id: Uuid) -> bool {
        let mut records = self.write();
        let before = records.len();
        records.retain(|r| r.id != id);
        records.len() != before
    }

    /// Remove every record, returning how many there were
    pub fn clear(&self) -> usize {
        let mut records = self.write();
        let removed = records.len();
        records.clear();
        removed
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<DeliveryRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<DeliveryRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}
