//! Shared round lifecycle.
//!
//! Every controller walks the same path: `Idle --start--> Active --settle-->
//! Settled --reset--> Idle`, with player actions looping on `Active`.
//! `RoundStatus::apply` is the single place that decides whether a step is
//! legal; controllers call it before touching their own state or the wallet.

use crate::errors::{PlazaResult, RoundError};
use crate::fairness::RoundSeed;
use crate::games::types::{GameKind, GameOutcome, RoundDetail, RoundRecord, RoundStatus};
use crate::history::RoundJournal;
use crate::wallet::{Balance, Wallet};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Lifecycle step requested by a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    /// Player or timer action that keeps the round open or exposes its end
    Act(&'static str),
    Settle,
    Reset,
}

impl RoundStatus {
    /// Next status after `transition`, or the reason it is not allowed
    pub fn apply(self, game: GameKind, transition: Transition) -> Result<RoundStatus, RoundError> {
        use RoundStatus::*;

        match (self, transition) {
            // Starting from Settled is the "new round" request: reset, then stake.
            (Idle | Settled, Transition::Start) => Ok(Active),
            (Active, Transition::Act(_)) => Ok(Active),
            (Active, Transition::Settle) => Ok(Settled),
            (Idle | Settled, Transition::Reset) => Ok(Idle),
            (from, transition) => Err(RoundError::InvalidTransition {
                game,
                from,
                action: match transition {
                    Transition::Start => "start a round",
                    Transition::Act(action) => action,
                    Transition::Settle => "settle",
                    Transition::Reset => "reset",
                },
            }),
        }
    }
}

/// Where round seeds come from
#[derive(Clone)]
pub enum SeedSource {
    /// Operating-system entropy
    Os,
    /// Deterministic stream, for reproducible sessions and tests
    Deterministic(Arc<Mutex<StdRng>>),
}

impl SeedSource {
    pub fn deterministic(seed: u64) -> Self {
        SeedSource::Deterministic(Arc::new(Mutex::new(StdRng::seed_from_u64(seed))))
    }

    pub fn next_seed(&self) -> RoundSeed {
        match self {
            SeedSource::Os => RoundSeed::generate(),
            SeedSource::Deterministic(rng) => {
                let mut rng = rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                RoundSeed::from_rng(&mut *rng)
            }
        }
    }
}

/// Stake taken for one round
#[derive(Debug, Clone)]
pub struct Stake {
    pub round_id: Uuid,
    pub game: GameKind,
    pub amount: Balance,
    seed: RoundSeed,
}

impl Stake {
    /// Commitment to the round seed, public from the start of the round
    pub fn commitment(&self) -> String {
        self.seed.commitment()
    }

    pub fn seed(&self) -> &RoundSeed {
        &self.seed
    }
}

/// Shared services every controller holds: the one wallet, the journal and
/// the seed source
#[derive(Clone)]
pub struct Table {
    wallet: Wallet,
    journal: Option<RoundJournal>,
    seeds: SeedSource,
}

impl Table {
    pub fn new(wallet: Wallet, journal: Option<RoundJournal>, seeds: SeedSource) -> Self {
        Self {
            wallet,
            journal,
            seeds,
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn journal(&self) -> Option<&RoundJournal> {
        self.journal.as_ref()
    }

    /// Validate and debit a stake in one step. On error nothing was debited.
    pub fn stake(&self, game: GameKind, amount: Balance) -> PlazaResult<Stake> {
        if amount == 0 {
            tracing::warn!(%game, "Rejected empty stake");
            return Err(RoundError::InvalidStake.into());
        }

        let balance = self.wallet.debit(amount)?;
        let stake = Stake {
            round_id: Uuid::new_v4(),
            game,
            amount,
            seed: self.seeds.next_seed(),
        };

        tracing::info!(
            %game,
            round_id = %stake.round_id,
            stake = amount,
            balance,
            commitment = %stake.commitment(),
            "Stake taken"
        );
        Ok(stake)
    }

    /// Debit `count` equal stakes as one wallet operation. Each returned stake
    /// is its own round and settles independently.
    pub fn stake_many(&self, game: GameKind, amount: Balance, count: u32) -> PlazaResult<Vec<Stake>> {
        if amount == 0 || count == 0 {
            tracing::warn!(%game, amount, count, "Rejected empty stake");
            return Err(RoundError::InvalidStake.into());
        }
        let total = amount
            .checked_mul(count as Balance)
            .ok_or_else(|| RoundError::InvalidInput("Stake too large".to_string()))?;

        let balance = self.wallet.debit(total)?;
        let stakes: Vec<Stake> = (0..count)
            .map(|_| Stake {
                round_id: Uuid::new_v4(),
                game,
                amount,
                seed: self.seeds.next_seed(),
            })
            .collect();

        tracing::info!(%game, stake = amount, count, total, balance, "Stakes taken");
        Ok(stakes)
    }

    /// Credit the payout (if any) and journal the round.
    ///
    /// The wallet is the source of truth: a journal failure is logged and
    /// does not undo the credit.
    pub fn settle(&self, stake: &Stake, payout: Balance, detail: RoundDetail) -> PlazaResult<RoundRecord> {
        let balance = if payout > 0 {
            self.wallet.credit(payout)?
        } else {
            self.wallet.balance()?
        };

        let record = RoundRecord {
            round_id: stake.round_id,
            game: stake.game,
            stake: stake.amount,
            payout,
            outcome: GameOutcome::from_amounts(stake.amount, payout),
            fairness: stake.seed.reveal(),
            settled_at: chrono::Utc::now(),
            detail,
        };

        tracing::info!(
            game = %record.game,
            round_id = %record.round_id,
            stake = record.stake,
            payout,
            outcome = ?record.outcome,
            balance,
            "Round settled"
        );

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&record) {
                tracing::warn!(round_id = %record.round_id, error = %e, "Failed to journal settled round");
            }
        }

        Ok(record)
    }
}

/// Operations every round controller supports
pub trait RoundController {
    fn game(&self) -> GameKind;

    fn status(&self) -> RoundStatus;

    /// Re-arm for the next stake. Refused while a round is in flight.
    fn reset(&mut self) -> Result<(), RoundError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::WalletConfig;
    use crate::storage::MemoryStore;

    /// In-memory table with a deterministic seed stream
    pub fn table_with_balance(balance: Balance, seed: u64) -> Table {
        let store = Arc::new(MemoryStore::new());
        let wallet = Wallet::new(store.clone(), &WalletConfig::default());
        wallet.set(balance).unwrap();
        Table::new(wallet, Some(RoundJournal::new(store)), SeedSource::deterministic(seed))
    }
}
