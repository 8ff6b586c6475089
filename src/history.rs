//! Round journal: settled rounds persisted in the key-value store.
//!
//! Records live under `round:record:<uuid>`. A newest-first index keyed by an
//! inverted sequence number supports cursor pagination, and running totals
//! are kept under `round:stats`.

use crate::errors::{PlazaResult, StorageError};
use crate::games::types::{GameKind, RoundRecord};
use crate::storage::KvStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const RECORD_PREFIX: &str = "round:record:";
const RECENT_INDEX_PREFIX: &[u8] = b"round:index:recent:";
const SEQUENCE_KEY: &[u8] = b"round:seq";
const STATS_KEY: &[u8] = b"round:stats";

/// Totals across every journaled round
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalStats {
    pub rounds: u64,
    pub total_staked: u64,
    pub total_paid_out: u64,
    pub per_game: HashMap<GameKind, GameTotals>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameTotals {
    pub rounds: u64,
    pub staked: u64,
    pub paid_out: u64,
}

fn record_key(round_id: &Uuid) -> Vec<u8> {
    format!("{}{}", RECORD_PREFIX, round_id).into_bytes()
}

fn recent_index_key(sequence: u64) -> Vec<u8> {
    // Newest first: prefix | inverted sequence (big-endian)
    let mut key = Vec::with_capacity(RECENT_INDEX_PREFIX.len() + 8);
    key.extend_from_slice(RECENT_INDEX_PREFIX);
    key.extend_from_slice(&(u64::MAX - sequence).to_be_bytes());
    key
}

fn parse_u64_be(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}

/// Handle to the persisted journal; clones share the same store and lock
#[derive(Clone)]
pub struct RoundJournal {
    store: Arc<dyn KvStore>,
    lock: Arc<Mutex<()>>,
}

impl RoundJournal {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Persist a settled round; returns its sequence number
    pub fn append(&self, record: &RoundRecord) -> PlazaResult<u64> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let sequence = self
            .store
            .get(SEQUENCE_KEY)?
            .and_then(|b| parse_u64_be(&b))
            .unwrap_or(0)
            + 1;

        let bytes = serde_json::to_vec(record).map_err(|e| {
            StorageError::WriteFailed(format!("Failed to encode round {}: {}", record.round_id, e))
        })?;

        let mut stats = self.load_stats()?;
        stats.rounds += 1;
        stats.total_staked = stats.total_staked.saturating_add(record.stake);
        stats.total_paid_out = stats.total_paid_out.saturating_add(record.payout);
        let totals = stats.per_game.entry(record.game).or_default();
        totals.rounds += 1;
        totals.staked = totals.staked.saturating_add(record.stake);
        totals.paid_out = totals.paid_out.saturating_add(record.payout);
        let stats_bytes = serde_json::to_vec(&stats)
            .map_err(|e| StorageError::WriteFailed(format!("Failed to encode journal stats: {}", e)))?;

        self.store.batch_write(&[
            (record_key(&record.round_id), bytes),
            (recent_index_key(sequence), record.round_id.as_bytes().to_vec()),
            (SEQUENCE_KEY.to_vec(), sequence.to_be_bytes().to_vec()),
            (STATS_KEY.to_vec(), stats_bytes),
        ])?;

        tracing::debug!(
            round_id = %record.round_id,
            game = %record.game,
            sequence,
            "Round journaled"
        );
        Ok(sequence)
    }

    pub fn load(&self, round_id: &Uuid) -> PlazaResult<Option<RoundRecord>> {
        let Some(bytes) = self.store.get(&record_key(round_id))? else {
            return Ok(None);
        };

        let record = serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::CorruptedData(format!("Failed to decode round {}: {}", round_id, e))
        })?;
        Ok(Some(record))
    }

    /// Newest-first page of records. Pass the returned cursor back to get the
    /// next page; `None` means there is nothing further.
    pub fn recent(
        &self,
        cursor_hex: Option<&str>,
        limit: usize,
    ) -> PlazaResult<(Vec<RoundRecord>, Option<String>)> {
        let cursor = match cursor_hex {
            Some(c) => Some(
                hex::decode(c)
                    .map_err(|e| StorageError::CorruptedData(format!("Invalid cursor hex: {}", e)))?,
            ),
            None => None,
        };

        let limit = limit.max(1);
        let rows = self
            .store
            .scan_prefix(RECENT_INDEX_PREFIX, cursor.as_deref(), limit)?;
        let full_page = rows.len() == limit;

        let mut records = Vec::with_capacity(rows.len());
        let mut next_cursor = None;
        for (key, value) in rows {
            next_cursor = Some(hex::encode(&key));

            let Ok(round_id) = Uuid::from_slice(&value) else {
                tracing::warn!(key = %hex::encode(&key), "Skipping malformed journal index entry");
                continue;
            };
            match self.load(&round_id)? {
                Some(record) => records.push(record),
                None => tracing::warn!(%round_id, "Journal index points at a missing record"),
            }
        }

        Ok((records, if full_page { next_cursor } else { None }))
    }

    pub fn load_stats(&self) -> PlazaResult<JournalStats> {
        match self.store.get(STATS_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::CorruptedData(format!("Failed to decode journal stats: {}", e)).into()
            }),
            None => Ok(JournalStats::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::RoundSeed;
    use crate::games::crash::RiskTier;
    use crate::games::types::{GameOutcome, RoundDetail};
    use crate::storage::MemoryStore;

    fn record(game: GameKind, stake: u64, payout: u64) -> RoundRecord {
        RoundRecord {
            round_id: Uuid::new_v4(),
            game,
            stake,
            payout,
            outcome: GameOutcome::from_amounts(stake, payout),
            fairness: RoundSeed::from_bytes([1u8; 32]).reveal(),
            settled_at: chrono::Utc::now(),
            detail: RoundDetail::Crash {
                risk: RiskTier::Low,
                crash_point: 3.5,
                cashed_out_at: None,
            },
        }
    }

    #[test]
    fn test_append_and_load() {
        let journal = RoundJournal::new(Arc::new(MemoryStore::new()));
        let rec = record(GameKind::Crash, 100, 0);

        assert_eq!(journal.append(&rec).unwrap(), 1);
        assert_eq!(journal.load(&rec.round_id).unwrap(), Some(rec));
        assert_eq!(journal.load(&Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn test_recent_is_newest_first_and_paginates() {
        let journal = RoundJournal::new(Arc::new(MemoryStore::new()));
        let ids: Vec<Uuid> = (0..5)
            .map(|i| {
                let rec = record(GameKind::Slots, 10 + i, 0);
                journal.append(&rec).unwrap();
                rec.round_id
            })
            .collect();

        let (first, cursor) = journal.recent(None, 2).unwrap();
        assert_eq!(first.iter().map(|r| r.round_id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);
        let cursor = cursor.expect("more pages");

        let (second, cursor) = journal.recent(Some(&cursor), 2).unwrap();
        assert_eq!(second.iter().map(|r| r.round_id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);

        let (last, cursor) = journal.recent(cursor.as_deref(), 2).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].round_id, ids[0]);
        assert!(cursor.is_none());
    }

    #[test]
    fn test_stats_accumulate() {
        let journal = RoundJournal::new(Arc::new(MemoryStore::new()));
        journal.append(&record(GameKind::Mines, 100, 250)).unwrap();
        journal.append(&record(GameKind::Mines, 50, 0)).unwrap();
        journal.append(&record(GameKind::Roulette, 10, 20)).unwrap();

        let stats = journal.load_stats().unwrap();
        assert_eq!(stats.rounds, 3);
        assert_eq!(stats.total_staked, 160);
        assert_eq!(stats.total_paid_out, 270);
        assert_eq!(stats.per_game[&GameKind::Mines].rounds, 2);
        assert_eq!(stats.per_game[&GameKind::Roulette].paid_out, 20);
    }

    #[test]
    fn test_bad_cursor_is_rejected() {
        let journal = RoundJournal::new(Arc::new(MemoryStore::new()));
        assert!(journal.recent(Some("not-hex"), 5).is_err());
    }
}
