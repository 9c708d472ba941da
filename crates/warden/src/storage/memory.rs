use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::account_link::{AccountLinkStore, LinkedAccount};
use crate::error::WardenError;
use crate::shift_ledger::{ShiftEnd, ShiftLedger, ShiftRecord};
use crate::types::{ExternalId, GameId};

/// In-memory account link storage for testing.
#[derive(Default)]
pub struct MemoryAccountLinkStore {
    inner: Mutex<LinkInner>,
}

#[derive(Default)]
struct LinkInner {
    links: HashMap<ExternalId, (LinkedAccount, u64)>,
    /// Monotonic link counter; the latest link for a game id wins lookups.
    next_seq: u64,
}

impl MemoryAccountLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored links.
    pub fn len(&self) -> usize {
        self.inner.lock().links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AccountLinkStore for MemoryAccountLinkStore {
    async fn lookup_by_game_id(
        &self,
        game_id: &GameId,
    ) -> Result<Option<LinkedAccount>, WardenError> {
        let inner = self.inner.lock();
        Ok(inner
            .links
            .values()
            .filter(|(account, _)| &account.game_id == game_id)
            .max_by_key(|(_, seq)| *seq)
            .map(|(account, _)| account.clone()))
    }

    async fn lookup_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<LinkedAccount>, WardenError> {
        let inner = self.inner.lock();
        Ok(inner.links.get(external_id).map(|(account, _)| account.clone()))
    }

    async fn upsert(
        &self,
        external_id: &ExternalId,
        game_id: &GameId,
        display_name: &str,
    ) -> Result<(), WardenError> {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.links.insert(
            external_id.clone(),
            (
                LinkedAccount {
                    external_id: external_id.clone(),
                    game_id: game_id.clone(),
                    game_display_name: display_name.to_string(),
                },
                seq,
            ),
        );
        Ok(())
    }
}

/// In-memory shift ledger for testing.
#[derive(Default)]
pub struct MemoryShiftLedger {
    shifts: Mutex<Vec<ShiftRecord>>,
}

impl MemoryShiftLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShiftLedger for MemoryShiftLedger {
    async fn start_shift(&self, external_id: &ExternalId) -> Result<i64, WardenError> {
        let mut shifts = self.shifts.lock();
        let id = shifts.len() as i64 + 1;
        shifts.push(ShiftRecord {
            id,
            external_id: external_id.clone(),
            start_time: Utc::now(),
            end_time: None,
        });
        Ok(id)
    }

    async fn end_shift(&self, external_id: &ExternalId) -> Result<ShiftEnd, WardenError> {
        let mut shifts = self.shifts.lock();
        let now = Utc::now();
        let open = shifts
            .iter_mut()
            .filter(|s| &s.external_id == external_id && s.is_open())
            .max_by_key(|s| (s.start_time, s.id));
        if let Some(shift) = open {
            shift.end_time = Some(now);
            return Ok(ShiftEnd::Closed { id: shift.id });
        }
        let id = shifts.len() as i64 + 1;
        shifts.push(ShiftRecord {
            id,
            external_id: external_id.clone(),
            start_time: now,
            end_time: Some(now),
        });
        Ok(ShiftEnd::RecordedEmpty { id })
    }

    async fn list_shifts(&self) -> Result<Vec<ShiftRecord>, WardenError> {
        let mut shifts = self.shifts.lock().clone();
        shifts.sort_by(|a, b| (b.start_time, b.id).cmp(&(a.start_time, a.id)));
        Ok(shifts)
    }
}
