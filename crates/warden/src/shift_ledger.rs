//! Shift clock ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WardenError;
use crate::types::ExternalId;

/// One recorded shift. `end_time` is `None` while the shift is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub id: i64,
    pub external_id: ExternalId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ShiftRecord {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// How an `end_shift` call was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftEnd {
    /// The most recent open shift was closed.
    Closed { id: i64 },
    /// No shift was open; a zero-length shift was recorded instead.
    RecordedEmpty { id: i64 },
}

/// Storage backend for shift records.
#[async_trait]
pub trait ShiftLedger: Send + Sync {
    /// Open a new shift starting now.
    async fn start_shift(&self, external_id: &ExternalId) -> Result<i64, WardenError>;

    /// Close the member's most recent open shift.
    ///
    /// When no shift is open, a shift with equal start and end times is
    /// recorded so the end event is never lost.
    async fn end_shift(&self, external_id: &ExternalId) -> Result<ShiftEnd, WardenError>;

    /// All shifts, newest start first.
    async fn list_shifts(&self) -> Result<Vec<ShiftRecord>, WardenError>;
}
