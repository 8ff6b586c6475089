//! Shared round vocabulary: game kinds, round status, outcomes and the
//! settled-round record every controller produces.

use crate::fairness::SeedReveal;
use crate::games::blackjack::BlackjackOutcome;
use crate::games::cards::Card;
use crate::games::crash::RiskTier;
use crate::games::roulette::{PocketColor, RouletteBet};
use crate::games::slots::{LineWin, PaylineMode, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Casino games that stake against the shared wallet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Mines,
    Roulette,
    Plinko,
    Blackjack,
    Slots,
    Crash,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKind::Mines => write!(f, "mines"),
            GameKind::Roulette => write!(f, "roulette"),
            GameKind::Plinko => write!(f, "plinko"),
            GameKind::Blackjack => write!(f, "blackjack"),
            GameKind::Slots => write!(f, "slots"),
            GameKind::Crash => write!(f, "crash"),
        }
    }
}

/// Lifecycle shared by every round controller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    /// Accepting a new stake
    Idle,
    /// Stake debited, outcome not yet settled
    Active,
    /// Payout credited; nothing changes until the next round
    Settled,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundStatus::Idle => write!(f, "idle"),
            RoundStatus::Active => write!(f, "active"),
            RoundStatus::Settled => write!(f, "settled"),
        }
    }
}

/// Win or loss relative to the stake
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    Win,
    Push,
    Loss,
}

impl GameOutcome {
    pub fn from_amounts(stake: u64, payout: u64) -> Self {
        match payout.cmp(&stake) {
            std::cmp::Ordering::Greater => GameOutcome::Win,
            std::cmp::Ordering::Equal => GameOutcome::Push,
            std::cmp::Ordering::Less => GameOutcome::Loss,
        }
    }
}

/// Settled round as stored in the journal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundRecord {
    pub round_id: Uuid,
    pub game: GameKind,
    pub stake: u64,
    pub payout: u64,
    pub outcome: GameOutcome,
    pub fairness: SeedReveal,
    pub settled_at: DateTime<Utc>,

    // Game-specific data
    pub detail: RoundDetail,
}

impl RoundRecord {
    /// Payout minus stake
    pub fn net(&self) -> i128 {
        self.payout as i128 - self.stake as i128
    }
}

/// Game-specific data (discriminated union)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "game_data", rename_all = "lowercase")]
pub enum RoundDetail {
    Mines {
        mines: u8,
        revealed: Vec<u8>,
        mine_positions: Vec<u8>,
        hit_mine: bool,
        multiplier: f64,
    },
    Roulette {
        pocket: u8,
        color: PocketColor,
        bets: Vec<RouletteBet>,
    },
    Plinko {
        start_column: f64,
        slot: usize,
        multiplier_tenths: u64,
    },
    Blackjack {
        player: Vec<Card>,
        dealer: Vec<Card>,
        player_total: u8,
        dealer_total: u8,
        outcome: BlackjackOutcome,
    },
    Slots {
        mode: PaylineMode,
        grid: [[Symbol; 3]; 3],
        wins: Vec<LineWin>,
    },
    Crash {
        risk: RiskTier,
        crash_point: f64,
        cashed_out_at: Option<f64>,
    },
}
