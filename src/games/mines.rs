//! Treasure grid (mines).
//!
//! `M` mines are hidden among `N` tiles. Each safe reveal raises the cash-out
//! multiplier to the reciprocal of the chance of having survived that many
//! picks, so the game carries no house edge:
//!
//! ```text
//! multiplier(k) = 1 / Π_{i=0}^{k-1} (N - M - i) / (N - i)
//! ```

use crate::errors::{PlazaResult, RoundError};
use crate::games::round::{RoundController, Stake, Table, Transition};
use crate::games::types::{GameKind, RoundDetail, RoundRecord, RoundStatus};
use rand::seq::index::sample;
use std::collections::BTreeSet;

/// Fair cash-out multiplier after `picks` safe reveals with `mines` mines on
/// a grid of `tiles` tiles
pub fn multiplier_for(tiles: u8, mines: u8, picks: u8) -> f64 {
    let n = tiles as f64;
    let m = mines as f64;

    let survival = (0..picks).fold(1.0, |p, i| {
        let i = i as f64;
        p * ((n - m - i) / (n - i))
    });
    1.0 / survival
}

/// Payout for cashing out `stake` after `picks` safe reveals
pub fn cash_out_value(stake: u64, tiles: u8, mines: u8, picks: u8) -> u64 {
    (stake as f64 * multiplier_for(tiles, mines, picks)).floor() as u64
}

/// Result of revealing one tile
#[derive(Debug, Clone, PartialEq)]
pub enum Reveal {
    /// Safe tile; the round stays open
    Safe { picks: u8, multiplier: f64, cash_out_value: u64 },
    /// Tile was already open; nothing changed
    AlreadyRevealed,
    /// Mine: stake forfeited, round settled
    Mine(RoundRecord),
}

#[derive(Debug)]
struct ActiveRound {
    stake: Stake,
    mines: u8,
    layout: BTreeSet<u8>,
    revealed: Vec<u8>,
}

impl ActiveRound {
    fn picks(&self) -> u8 {
        self.revealed.len() as u8
    }
}

#[derive(Debug)]
enum MinesState {
    Idle,
    Active(ActiveRound),
    Settled(RoundRecord),
}

/// Round controller for the mines grid
pub struct MinesGame {
    table: Table,
    tiles: u8,
    state: MinesState,
}

impl MinesGame {
    pub fn new(table: Table, tiles: u8) -> Self {
        Self {
            table,
            tiles,
            state: MinesState::Idle,
        }
    }

    pub fn tiles(&self) -> u8 {
        self.tiles
    }

    /// Debit the stake and hide `mines` mines
    pub fn start(&mut self, stake: u64, mines: u8) -> PlazaResult<()> {
        self.status().apply(GameKind::Mines, Transition::Start)?;
        if mines == 0 || mines >= self.tiles {
            return Err(RoundError::InvalidInput(format!(
                "Mine count must be between 1 and {}",
                self.tiles - 1
            ))
            .into());
        }

        let stake = self.table.stake(GameKind::Mines, stake)?;
        let mut rng = stake.seed().rng();
        let layout = sample(&mut rng, self.tiles as usize, mines as usize)
            .into_iter()
            .map(|i| i as u8)
            .collect();

        self.state = MinesState::Active(ActiveRound {
            stake,
            mines,
            layout,
            revealed: Vec::new(),
        });
        Ok(())
    }

    /// Open one tile
    pub fn reveal(&mut self, tile: u8) -> PlazaResult<Reveal> {
        self.status().apply(GameKind::Mines, Transition::Act("reveal a tile"))?;
        if tile >= self.tiles {
            return Err(RoundError::InvalidInput(format!("Tile must be below {}", self.tiles)).into());
        }

        let MinesState::Active(round) = &mut self.state else {
            unreachable!("status checked above");
        };
        if round.revealed.contains(&tile) {
            return Ok(Reveal::AlreadyRevealed);
        }
        round.revealed.push(tile);

        if round.layout.contains(&tile) {
            tracing::debug!(round_id = %round.stake.round_id, tile, "Mine hit");
            let record = self.settle(0, true)?;
            return Ok(Reveal::Mine(record));
        }

        let picks = round.picks();
        let multiplier = multiplier_for(self.tiles, round.mines, picks);
        let value = cash_out_value(round.stake.amount, self.tiles, round.mines, picks);
        tracing::debug!(round_id = %round.stake.round_id, tile, picks, multiplier, "Safe tile");

        Ok(Reveal::Safe {
            picks,
            multiplier,
            cash_out_value: value,
        })
    }

    /// Take the current multiplier; needs at least one safe pick
    pub fn cash_out(&mut self) -> PlazaResult<RoundRecord> {
        self.status().apply(GameKind::Mines, Transition::Act("cash out"))?;
        let MinesState::Active(round) = &self.state else {
            unreachable!("status checked above");
        };
        if round.picks() == 0 {
            return Err(RoundError::NothingToCashOut.into());
        }

        let payout = cash_out_value(round.stake.amount, self.tiles, round.mines, round.picks());
        self.settle(payout, false)
    }

    /// Safe picks so far in the open round
    pub fn picks(&self) -> u8 {
        match &self.state {
            MinesState::Active(round) => round.picks(),
            _ => 0,
        }
    }

    /// Value of cashing out now (0 before the first safe pick)
    pub fn current_cash_out(&self) -> u64 {
        match &self.state {
            MinesState::Active(round) if round.picks() > 0 => {
                cash_out_value(round.stake.amount, self.tiles, round.mines, round.picks())
            }
            _ => 0,
        }
    }

    /// Record of the last settled round
    pub fn last_round(&self) -> Option<&RoundRecord> {
        match &self.state {
            MinesState::Settled(record) => Some(record),
            _ => None,
        }
    }

    fn settle(&mut self, payout: u64, hit_mine: bool) -> PlazaResult<RoundRecord> {
        self.status().apply(GameKind::Mines, Transition::Settle)?;
        let MinesState::Active(round) = std::mem::replace(&mut self.state, MinesState::Idle) else {
            unreachable!("status checked above");
        };

        let detail = RoundDetail::Mines {
            mines: round.mines,
            multiplier: if hit_mine {
                0.0
            } else {
                multiplier_for(self.tiles, round.mines, round.picks())
            },
            revealed: round.revealed.clone(),
            mine_positions: round.layout.iter().copied().collect(),
            hit_mine,
        };

        match self.table.settle(&round.stake, payout, detail) {
            Ok(record) => {
                self.state = MinesState::Settled(record.clone());
                Ok(record)
            }
            Err(e) => {
                self.state = MinesState::Active(round);
                Err(e)
            }
        }
    }
}

impl RoundController for MinesGame {
    fn game(&self) -> GameKind {
        GameKind::Mines
    }

    fn status(&self) -> RoundStatus {
        match self.state {
            MinesState::Idle => RoundStatus::Idle,
            MinesState::Active(_) => RoundStatus::Active,
            MinesState::Settled(_) => RoundStatus::Settled,
        }
    }

    fn reset(&mut self) -> Result<(), RoundError> {
        self.status().apply(GameKind::Mines, Transition::Reset)?;
        self.state = MinesState::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PlazaError;
    use crate::games::round::testing::table_with_balance;

    const N: u8 = 25;

    fn binomial(n: u64, k: u64) -> f64 {
        (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
    }

    fn layout_of(game: &MinesGame) -> BTreeSet<u8> {
        match &game.state {
            MinesState::Active(round) => round.layout.clone(),
            _ => panic!("no active round"),
        }
    }

    #[test]
    fn test_multiplier_starts_at_one() {
        for m in 1..N {
            assert_eq!(multiplier_for(N, m, 0), 1.0);
        }
    }

    #[test]
    fn test_multiplier_strictly_increasing() {
        for m in 1..N {
            for k in 1..=(N - m) {
                assert!(multiplier_for(N, m, k) > multiplier_for(N, m, k - 1), "m={} k={}", m, k);
            }
        }
    }

    #[test]
    fn test_clearing_the_board_pays_inverse_probability() {
        for m in [1u8, 2, 3, 5, 10, 24] {
            // P(all N-M safe tiles first) = 1 / C(N, M)
            let expected = binomial(N as u64, m as u64);
            let actual = multiplier_for(N, m, N - m);
            assert!((actual - expected).abs() / expected < 1e-9, "m={}: {} vs {}", m, actual, expected);
        }
        assert!((multiplier_for(N, 24, 1) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_cash_out_after_safe_picks() {
        let mut game = MinesGame::new(table_with_balance(1_000, 11), N);
        game.start(100, 3).unwrap();
        assert_eq!(game.table.wallet().balance().unwrap(), 900);

        let layout = layout_of(&game);
        assert_eq!(layout.len(), 3);
        let safe: Vec<u8> = (0..N).filter(|t| !layout.contains(t)).take(2).collect();

        for (i, &tile) in safe.iter().enumerate() {
            match game.reveal(tile).unwrap() {
                Reveal::Safe { picks, .. } => assert_eq!(picks as usize, i + 1),
                other => panic!("expected safe, got {:?}", other),
            }
        }
        assert_eq!(game.reveal(safe[0]).unwrap(), Reveal::AlreadyRevealed);
        assert_eq!(game.picks(), 2);

        let expected = (100.0 * multiplier_for(N, 3, 2)).floor() as u64;
        assert_eq!(game.current_cash_out(), expected);

        let record = game.cash_out().unwrap();
        assert_eq!(record.payout, expected);
        assert_eq!(game.status(), RoundStatus::Settled);
        assert_eq!(game.table.wallet().balance().unwrap(), 900 + expected);
    }

    #[test]
    fn test_mine_forfeits_stake() {
        let mut game = MinesGame::new(table_with_balance(500, 12), N);
        game.start(200, 5).unwrap();
        let mine = *layout_of(&game).iter().next().unwrap();

        let Reveal::Mine(record) = game.reveal(mine).unwrap() else {
            panic!("expected a mine");
        };
        assert_eq!(record.payout, 0);
        assert_eq!(game.table.wallet().balance().unwrap(), 300);

        // Settled is terminal until reset
        assert!(game.reveal(0).is_err());
        assert!(game.cash_out().is_err());
        assert_eq!(game.table.wallet().balance().unwrap(), 300);
    }

    #[test]
    fn test_cash_out_needs_a_pick() {
        let mut game = MinesGame::new(table_with_balance(500, 13), N);
        game.start(100, 2).unwrap();
        let err = game.cash_out().unwrap_err();
        assert!(matches!(err, PlazaError::Round(RoundError::NothingToCashOut)));
        assert_eq!(game.status(), RoundStatus::Active);
    }

    #[test]
    fn test_start_rejections() {
        let mut game = MinesGame::new(table_with_balance(50, 14), N);

        assert!(game.start(51, 2).is_err());
        assert!(game.start(10, 0).is_err());
        assert!(game.start(10, 25).is_err());
        assert_eq!(game.status(), RoundStatus::Idle);
        assert_eq!(game.table.wallet().balance().unwrap(), 50);

        game.start(10, 2).unwrap();
        assert!(game.start(10, 2).is_err());
        assert!(game.reset().is_err());
        assert!(game.reveal(N).is_err());
        assert_eq!(game.table.wallet().balance().unwrap(), 40);
    }
}
