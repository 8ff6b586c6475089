//! Three-reel, three-row slot machine.
//!
//! Each cell is drawn from a weighted symbol bag. A payline with three equal
//! symbols pays `bet × symbol multiplier`; any two equal symbols on a line pay
//! a flat `bet × 2`. The stake is one bet per spin whichever line mode is
//! played, and every winning line pays on its own.

use crate::errors::{PlazaResult, RoundError};
use crate::games::round::{RoundController, Stake, Table, Transition};
use crate::games::types::{GameKind, RoundDetail, RoundRecord, RoundStatus};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const REELS: usize = 3;
pub const ROWS: usize = 3;
pub const PAIR_MULTIPLIER: u64 = 2;

/// Cells indexed `[row][reel]`
pub type Grid = [[Symbol; REELS]; ROWS];

// (base, spread) in milliseconds for each reel, measured from the previous stop
const REEL_STOP_MS: [(u64, u64); REELS] = [(500, 200), (350, 200), (300, 200)];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    Diamond,
    Star,
    Bell,
    Cherry,
    Lemon,
    Clover,
}

impl Symbol {
    pub const ALL: [Symbol; 6] = [
        Symbol::Diamond,
        Symbol::Star,
        Symbol::Bell,
        Symbol::Cherry,
        Symbol::Lemon,
        Symbol::Clover,
    ];

    /// Copies of the symbol in the bag; higher is more common
    pub fn weight(self) -> u32 {
        match self {
            Symbol::Diamond => 2,
            Symbol::Star => 4,
            Symbol::Bell => 6,
            Symbol::Cherry => 10,
            Symbol::Lemon => 12,
            Symbol::Clover => 14,
        }
    }

    /// Payout multiplier for three on a line
    pub fn multiplier(self) -> u64 {
        match self {
            Symbol::Diamond => 50,
            Symbol::Star => 25,
            Symbol::Bell => 10,
            Symbol::Cherry => 5,
            Symbol::Lemon => 4,
            Symbol::Clover => 3,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Symbol::Diamond => "💎",
            Symbol::Star => "⭐",
            Symbol::Bell => "🔔",
            Symbol::Cherry => "🍒",
            Symbol::Lemon => "🍋",
            Symbol::Clover => "🍀",
        }
    }

    pub fn bag_size() -> u32 {
        Self::ALL.iter().map(|s| s.weight()).sum()
    }

    /// One draw from the weighted bag
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut ticket = rng.gen_range(0..Self::bag_size());
        for symbol in Self::ALL {
            if ticket < symbol.weight() {
                return symbol;
            }
            ticket -= symbol.weight();
        }
        Symbol::Clover
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

/// Which rows are evaluated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaylineMode {
    #[default]
    Middle,
    /// Top, middle and bottom
    All,
}

impl PaylineMode {
    pub fn rows(self) -> &'static [usize] {
        match self {
            PaylineMode::Middle => &[1],
            PaylineMode::All => &[0, 1, 2],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineWin {
    pub row: usize,
    pub symbol: Symbol,
    /// 3 for a full line, 2 for a pair
    pub matched: u8,
    pub multiplier: u64,
    pub amount: u64,
}

fn line_win(row: usize, line: &[Symbol; REELS], bet: u64) -> Option<LineWin> {
    let [a, b, c] = *line;
    let (symbol, matched, multiplier) = if a == b && b == c {
        (a, 3, a.multiplier())
    } else if a == b || a == c {
        (a, 2, PAIR_MULTIPLIER)
    } else if b == c {
        (b, 2, PAIR_MULTIPLIER)
    } else {
        return None;
    };

    Some(LineWin {
        row,
        symbol,
        matched,
        multiplier,
        amount: bet.saturating_mul(multiplier),
    })
}

/// Winning lines for a finished grid
pub fn evaluate(grid: &Grid, mode: PaylineMode, bet: u64) -> Vec<LineWin> {
    mode.rows()
        .iter()
        .filter_map(|&row| line_win(row, &grid[row], bet))
        .collect()
}

pub fn total_win(wins: &[LineWin]) -> u64 {
    wins.iter().map(|w| w.amount).sum()
}

/// Fill the grid reel by reel, top to bottom
pub fn draw_grid<R: Rng + ?Sized>(rng: &mut R) -> Grid {
    let mut grid = [[Symbol::Clover; REELS]; ROWS];
    for reel in 0..REELS {
        for row in grid.iter_mut() {
            row[reel] = Symbol::draw(rng);
        }
    }
    grid
}

/// Time after the spin starts at which each reel stops, in order
pub fn reel_stop_times<R: Rng + ?Sized>(rng: &mut R) -> [Duration; REELS] {
    let mut at = Duration::ZERO;
    REEL_STOP_MS.map(|(base, spread)| {
        at += Duration::from_millis(base + rng.gen_range(0..=spread));
        at
    })
}

/// Where a spin stands
#[derive(Debug, Clone, PartialEq)]
pub enum SpinProgress {
    Spinning { stopped_reels: usize },
    Done(RoundRecord),
}

#[derive(Debug)]
struct ActiveSpin {
    stake: Stake,
    mode: PaylineMode,
    grid: Grid,
    stops: [Duration; REELS],
    elapsed: Duration,
}

impl ActiveSpin {
    fn stopped_reels(&self) -> usize {
        self.stops.iter().filter(|&&at| at <= self.elapsed).count()
    }
}

#[derive(Debug)]
enum SlotsState {
    Idle,
    Spinning(ActiveSpin),
    Settled(RoundRecord),
}

/// Round controller for the reels
pub struct SlotsGame {
    table: Table,
    state: SlotsState,
}

impl SlotsGame {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            state: SlotsState::Idle,
        }
    }

    /// Debit one bet and start the reels. The grid is drawn now; the reels
    /// only reveal it.
    pub fn spin(&mut self, bet: u64, mode: PaylineMode) -> PlazaResult<[Duration; REELS]> {
        self.status().apply(GameKind::Slots, Transition::Start)?;
        let stake = self.table.stake(GameKind::Slots, bet)?;

        let mut rng = stake.seed().rng();
        let grid = draw_grid(&mut rng);
        let stops = reel_stop_times(&mut rng);

        self.state = SlotsState::Spinning(ActiveSpin {
            stake,
            mode,
            grid,
            stops,
            elapsed: Duration::ZERO,
        });
        Ok(stops)
    }

    /// Let `dt` pass; settles once the last reel stops
    pub fn advance(&mut self, dt: Duration) -> PlazaResult<SpinProgress> {
        self.status().apply(GameKind::Slots, Transition::Act("advance the reels"))?;
        let SlotsState::Spinning(spin) = &mut self.state else {
            unreachable!("status checked above");
        };

        let before = spin.stopped_reels();
        spin.elapsed += dt;
        let stopped_reels = spin.stopped_reels();
        for reel in before..stopped_reels {
            tracing::debug!(round_id = %spin.stake.round_id, reel, "Reel stopped");
        }

        if stopped_reels < REELS {
            return Ok(SpinProgress::Spinning { stopped_reels });
        }
        self.settle().map(SpinProgress::Done)
    }

    /// Stop every reel now
    pub fn finish(&mut self) -> PlazaResult<RoundRecord> {
        self.status().apply(GameKind::Slots, Transition::Act("stop the reels"))?;
        self.settle()
    }

    /// Symbols on reels that have stopped; `None` for reels still spinning
    pub fn visible(&self) -> [[Option<Symbol>; REELS]; ROWS] {
        let mut out = [[None; REELS]; ROWS];
        let (grid, stopped) = match &self.state {
            SlotsState::Spinning(spin) => (&spin.grid, spin.stopped_reels()),
            SlotsState::Settled(RoundRecord {
                detail: RoundDetail::Slots { grid, .. },
                ..
            }) => (grid, REELS),
            _ => return out,
        };
        for (row, cells) in out.iter_mut().enumerate() {
            for reel in 0..stopped {
                cells[reel] = Some(grid[row][reel]);
            }
        }
        out
    }

    pub fn last_round(&self) -> Option<&RoundRecord> {
        match &self.state {
            SlotsState::Settled(record) => Some(record),
            _ => None,
        }
    }

    fn settle(&mut self) -> PlazaResult<RoundRecord> {
        self.status().apply(GameKind::Slots, Transition::Settle)?;
        let SlotsState::Spinning(spin) = std::mem::replace(&mut self.state, SlotsState::Idle) else {
            unreachable!("status checked above");
        };

        let wins = evaluate(&spin.grid, spin.mode, spin.stake.amount);
        let payout = total_win(&wins);
        let detail = RoundDetail::Slots {
            mode: spin.mode,
            grid: spin.grid,
            wins,
        };

        match self.table.settle(&spin.stake, payout, detail) {
            Ok(record) => {
                self.state = SlotsState::Settled(record.clone());
                Ok(record)
            }
            Err(e) => {
                self.state = SlotsState::Spinning(spin);
                Err(e)
            }
        }
    }
}

impl RoundController for SlotsGame {
    fn game(&self) -> GameKind {
        GameKind::Slots
    }

    fn status(&self) -> RoundStatus {
        match self.state {
            SlotsState::Idle => RoundStatus::Idle,
            SlotsState::Spinning(_) => RoundStatus::Active,
            SlotsState::Settled(_) => RoundStatus::Settled,
        }
    }

    fn reset(&mut self) -> Result<(), RoundError> {
        self.status().apply(GameKind::Slots, Transition::Reset)?;
        self.state = SlotsState::Idle;
        Ok(())
    }
}
