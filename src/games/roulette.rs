//! European single-zero roulette.
//!
//! The winning pocket is drawn uniformly from the round seed when the stake
//! is taken. The wheel then gets a random launch speed that decelerates frame
//! by frame, with the total travel stretched or shrunk by less than half a turn
//! so the wheel comes to rest with that pocket under the pointer. Where the
//! wheel starts has no bearing on which pocket wins.
//!
//! Payouts are credited on top of the debited stake: a straight hit credits
//! 35× the bet, an outside hit credits 2× (stake back plus even money).

use crate::errors::{PlazaResult, RoundError};
use crate::games::round::{RoundController, Stake, Table, Transition};
use crate::games::types::{GameKind, RoundDetail, RoundRecord, RoundStatus};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::{PI, TAU};
use std::fmt;

/// Pockets in wheel order, clockwise from zero
pub const WHEEL_ORDER: [u8; 37] = [
    0, 32, 15, 19, 4, 21, 2, 25, 17, 34, 6, 27, 13, 36, 11, 30, 8, 23, 10, 5, 24, 16, 33, 1, 20, 14,
    31, 9, 22, 18, 29, 7, 28, 12, 35, 3, 26,
];

/// Red numbers on a roulette wheel.
const RED_NUMBERS: [u8; 18] = [1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36];

pub const STRAIGHT_PAYOUT: u64 = 35;
pub const OUTSIDE_PAYOUT: u64 = 2;

// Wheel physics, in radians per animation frame
const POINTER_ANGLE: f64 = -PI / 2.0;
const MIN_LAUNCH_SPEED: f64 = 0.35;
const LAUNCH_SPEED_SPREAD: f64 = 0.15;
const DECELERATION: f64 = 0.985;
const STOP_SPEED: f64 = 0.002;

const HISTORY_LEN: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PocketColor {
    Green,
    Red,
    Black,
}

impl fmt::Display for PocketColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PocketColor::Green => write!(f, "green"),
            PocketColor::Red => write!(f, "red"),
            PocketColor::Black => write!(f, "black"),
        }
    }
}

pub fn pocket_color(number: u8) -> PocketColor {
    if number == 0 {
        PocketColor::Green
    } else if RED_NUMBERS.contains(&number) {
        PocketColor::Red
    } else {
        PocketColor::Black
    }
}

/// Even-money bets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutsideBet {
    Red,
    Black,
    Even,
    Odd,
    /// 1-18
    Low,
    /// 19-36
    High,
}

impl OutsideBet {
    /// Zero loses every outside bet
    pub fn covers(self, number: u8) -> bool {
        if number == 0 {
            return false;
        }
        match self {
            OutsideBet::Red => pocket_color(number) == PocketColor::Red,
            OutsideBet::Black => pocket_color(number) == PocketColor::Black,
            OutsideBet::Even => number % 2 == 0,
            OutsideBet::Odd => number % 2 == 1,
            OutsideBet::Low => (1..=18).contains(&number),
            OutsideBet::High => (19..=36).contains(&number),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "bet", rename_all = "lowercase")]
pub enum RouletteBet {
    Straight { number: u8, amount: u64 },
    Outside { kind: OutsideBet, amount: u64 },
}

impl RouletteBet {
    pub fn amount(&self) -> u64 {
        match self {
            RouletteBet::Straight { amount, .. } | RouletteBet::Outside { amount, .. } => *amount,
        }
    }

    /// Amount credited if `pocket` comes up (0 when the bet loses)
    pub fn payout(&self, pocket: u8) -> u64 {
        match *self {
            RouletteBet::Straight { number, amount } if number == pocket => amount.saturating_mul(STRAIGHT_PAYOUT),
            RouletteBet::Outside { kind, amount } if kind.covers(pocket) => amount.saturating_mul(OUTSIDE_PAYOUT),
            _ => 0,
        }
    }
}

/// Sum of the payouts of every bet, each judged on its own
pub fn total_payout(bets: &[RouletteBet], pocket: u8) -> u64 {
    bets.iter().fold(0u64, |sum, bet| sum.saturating_add(bet.payout(pocket)))
}

fn segment_width() -> f64 {
    TAU / WHEEL_ORDER.len() as f64
}

/// Pocket under the pointer for a given wheel angle
pub fn pocket_under_pointer(angle: f64) -> u8 {
    let local = (POINTER_ANGLE - angle.rem_euclid(TAU) + TAU).rem_euclid(TAU);
    WHEEL_ORDER[(local / segment_width()) as usize % WHEEL_ORDER.len()]
}

/// A wheel angle that puts `fraction` of the way through the segment at
/// `index` under the pointer
fn angle_for_segment(index: usize, fraction: f64) -> f64 {
    (POINTER_ANGLE - (index as f64 + fraction) * segment_width()).rem_euclid(TAU)
}

/// Frames for a free-running wheel launched at `speed` to drop below the stop speed
fn frames_to_stop(speed: f64) -> u32 {
    if speed < STOP_SPEED {
        return 1;
    }
    ((STOP_SPEED / speed).ln() / DECELERATION.ln()).floor() as u32 + 1
}

/// Distance covered in `frames` frames by a wheel launched at `speed`
fn travel(speed: f64, frames: u32) -> f64 {
    speed * (1.0 - DECELERATION.powi(frames as i32)) / (1.0 - DECELERATION)
}

/// A fully planned spin
#[derive(Debug, Clone, PartialEq)]
pub struct WheelSpin {
    pub start_angle: f64,
    pub launch_speed: f64,
    /// Frames until the wheel stops
    pub frames: u32,
    pub final_angle: f64,
    pub pocket: u8,
}

impl WheelSpin {
    /// Plan a spin from `start_angle` that stops with the segment at `index`
    /// under the pointer. `nominal_speed` sets the frame count; the launch
    /// speed is then adjusted so the travel ends `fraction` of the way
    /// through the target segment.
    pub fn toward(start_angle: f64, nominal_speed: f64, index: usize, fraction: f64) -> Self {
        let frames = frames_to_stop(nominal_speed);
        let coast = travel(nominal_speed, frames);

        let target = angle_for_segment(index, fraction);
        let mut correction = (target - (start_angle + coast)).rem_euclid(TAU);
        if correction > PI {
            correction -= TAU;
        }
        let distance = coast + correction;

        Self {
            start_angle,
            launch_speed: distance * (1.0 - DECELERATION) / (1.0 - DECELERATION.powi(frames as i32)),
            frames,
            final_angle: start_angle + distance,
            pocket: WHEEL_ORDER[index],
        }
    }

    /// Uniform pocket and random launch from `start_angle`
    pub fn launch<R: Rng + ?Sized>(start_angle: f64, rng: &mut R) -> Self {
        let index = rng.gen_range(0..WHEEL_ORDER.len());
        let fraction = rng.gen_range(0.15..0.85);
        let speed = MIN_LAUNCH_SPEED + rng.gen::<f64>() * LAUNCH_SPEED_SPREAD;
        Self::toward(start_angle, speed, index, fraction)
    }

    /// Wheel angle after `frame` frames
    pub fn angle_at(&self, frame: u32) -> f64 {
        if frame >= self.frames {
            return self.final_angle;
        }
        self.start_angle + travel(self.launch_speed, frame)
    }
}

/// Where the spin animation stands
#[derive(Debug, Clone, PartialEq)]
pub enum SpinFrame {
    Turning { angle: f64 },
    Stopped(RoundRecord),
}

#[derive(Debug)]
struct ActiveSpin {
    stake: Stake,
    bets: Vec<RouletteBet>,
    spin: WheelSpin,
    frame: u32,
}

#[derive(Debug)]
enum RouletteState {
    Idle,
    Spinning(ActiveSpin),
    Settled(RoundRecord),
}

/// Round controller for the wheel
pub struct RouletteGame {
    table: Table,
    angle: f64,
    history: VecDeque<u8>,
    state: RouletteState,
}

impl RouletteGame {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            angle: 0.0,
            history: VecDeque::new(),
            state: RouletteState::Idle,
        }
    }

    /// Take the combined stake of `bets` and launch the wheel
    pub fn spin(&mut self, bets: Vec<RouletteBet>) -> PlazaResult<&WheelSpin> {
        self.status().apply(GameKind::Roulette, Transition::Start)?;

        if bets.is_empty() {
            return Err(RoundError::InvalidStake.into());
        }
        for bet in &bets {
            if let RouletteBet::Straight { number, .. } = bet {
                if *number > 36 {
                    return Err(RoundError::InvalidInput("Enter a number 0–36.".to_string()).into());
                }
            }
            if bet.amount() == 0 {
                return Err(RoundError::InvalidStake.into());
            }
        }
        let total = bets
            .iter()
            .try_fold(0u64, |sum, bet| sum.checked_add(bet.amount()))
            .ok_or_else(|| RoundError::InvalidInput("Stake too large".to_string()))?;

        let stake = self.table.stake(GameKind::Roulette, total)?;
        let spin = WheelSpin::launch(self.angle, &mut stake.seed().rng());
        tracing::debug!(
            round_id = %stake.round_id,
            frames = spin.frames,
            pocket = spin.pocket,
            "Wheel launched"
        );

        self.state = RouletteState::Spinning(ActiveSpin {
            stake,
            bets,
            spin,
            frame: 0,
        });
        match &self.state {
            RouletteState::Spinning(active) => Ok(&active.spin),
            _ => unreachable!("just set"),
        }
    }

    /// Advance the animation by one frame; settles on the last frame
    pub fn advance_frame(&mut self) -> PlazaResult<SpinFrame> {
        self.status().apply(GameKind::Roulette, Transition::Act("advance the wheel"))?;
        let RouletteState::Spinning(active) = &mut self.state else {
            unreachable!("status checked above");
        };

        active.frame += 1;
        if active.frame < active.spin.frames {
            return Ok(SpinFrame::Turning {
                angle: active.spin.angle_at(active.frame),
            });
        }
        self.settle().map(SpinFrame::Stopped)
    }

    /// Skip the rest of the animation and settle
    pub fn finish(&mut self) -> PlazaResult<RoundRecord> {
        self.status().apply(GameKind::Roulette, Transition::Act("finish the spin"))?;
        self.settle()
    }

    /// Current wheel angle; carries over from one spin to the next
    pub fn angle(&self) -> f64 {
        match &self.state {
            RouletteState::Spinning(active) => active.spin.angle_at(active.frame),
            _ => self.angle,
        }
    }

    /// Winning numbers, newest first
    pub fn history(&self) -> impl Iterator<Item = u8> + '_ {
        self.history.iter().copied()
    }

    pub fn last_round(&self) -> Option<&RoundRecord> {
        match &self.state {
            RouletteState::Settled(record) => Some(record),
            _ => None,
        }
    }

    fn settle(&mut self) -> PlazaResult<RoundRecord> {
        self.status().apply(GameKind::Roulette, Transition::Settle)?;
        let RouletteState::Spinning(active) = std::mem::replace(&mut self.state, RouletteState::Idle) else {
            unreachable!("status checked above");
        };

        let pocket = active.spin.pocket;
        let payout = total_payout(&active.bets, pocket);
        let detail = RoundDetail::Roulette {
            pocket,
            color: pocket_color(pocket),
            bets: active.bets.clone(),
        };

        match self.table.settle(&active.stake, payout, detail) {
            Ok(record) => {
                self.angle = active.spin.final_angle.rem_euclid(TAU);
                self.history.push_front(pocket);
                self.history.truncate(HISTORY_LEN);
                self.state = RouletteState::Settled(record.clone());
                Ok(record)
            }
            Err(e) => {
                self.state = RouletteState::Spinning(active);
                Err(e)
            }
        }
    }
}

impl RoundController for RouletteGame {
    fn game(&self) -> GameKind {
        GameKind::Roulette
    }

    fn status(&self) -> RoundStatus {
        match self.state {
            RouletteState::Idle => RoundStatus::Idle,
            RouletteState::Spinning(_) => RoundStatus::Active,
            RouletteState::Settled(_) => RoundStatus::Settled,
        }
    }

    fn reset(&mut self) -> Result<(), RoundError> {
        self.status().apply(GameKind::Roulette, Transition::Reset)?;
        self.state = RouletteState::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PlazaError;
    use crate::games::round::testing::table_with_balance;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_wheel_layout() {
        let mut sorted = WHEEL_ORDER.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..=36).collect::<Vec<u8>>());

        assert_eq!(pocket_color(0), PocketColor::Green);
        assert_eq!(pocket_color(17), PocketColor::Black);
        assert_eq!(pocket_color(32), PocketColor::Red);
        assert_eq!((1..=36).filter(|&n| pocket_color(n) == PocketColor::Red).count(), 18);
    }

    #[test]
    fn test_straight_pays_35x() {
        let bet = RouletteBet::Straight { number: 17, amount: 10 };
        assert_eq!(bet.payout(17), 350);
        assert_eq!(bet.payout(18), 0);
    }

    #[test]
    fn test_red_pays_stake_plus_winnings() {
        let bet = RouletteBet::Outside {
            kind: OutsideBet::Red,
            amount: 10,
        };
        assert_eq!(bet.payout(32), 20);
        assert_eq!(bet.payout(17), 0);
        assert_eq!(bet.payout(0), 0);
    }

    #[test]
    fn test_zero_loses_outside_bets() {
        for kind in [
            OutsideBet::Red,
            OutsideBet::Black,
            OutsideBet::Even,
            OutsideBet::Odd,
            OutsideBet::Low,
            OutsideBet::High,
        ] {
            assert!(!kind.covers(0), "{:?}", kind);
        }
        assert!(OutsideBet::Low.covers(18));
        assert!(OutsideBet::High.covers(19));
        assert!(OutsideBet::Even.covers(36));
        assert!(OutsideBet::Odd.covers(35));
    }

    #[test]
    fn test_bets_are_summed_independently() {
        let bets = [
            RouletteBet::Straight { number: 17, amount: 10 },
            RouletteBet::Outside {
                kind: OutsideBet::Odd,
                amount: 10,
            },
            RouletteBet::Outside {
                kind: OutsideBet::Red,
                amount: 10,
            },
        ];
        // 17 is black and odd
        assert_eq!(total_payout(&bets, 17), 350 + 20);
    }

    #[test]
    fn test_pointer_reads_top_segment() {
        let segment = segment_width();
        // With the wheel unrotated, the segment starting at -π/2 sits under the pointer.
        let index = ((POINTER_ANGLE + TAU) / segment) as usize;
        assert_eq!(pocket_under_pointer(0.0), WHEEL_ORDER[index]);
        // Rotating by a whole turn changes nothing
        assert_eq!(pocket_under_pointer(TAU), pocket_under_pointer(0.0));
    }

    #[test]
    fn test_huge_bets_saturate() {
        let straight = RouletteBet::Straight {
            number: 5,
            amount: u64::MAX / 2,
        };
        let red = RouletteBet::Outside {
            kind: OutsideBet::Red,
            amount: u64::MAX,
        };
        assert_eq!(straight.payout(5), u64::MAX);
        assert_eq!(red.payout(5), u64::MAX);
        assert_eq!(total_payout(&[straight, red], 5), u64::MAX);
        assert_eq!(total_payout(&[straight, red], 6), 0);
    }

    #[test]
    fn test_spin_stops_on_requested_segment() {
        for (i, start) in [0.0, 1.0, -2.5, 40.0].into_iter().enumerate() {
            for index in 0..WHEEL_ORDER.len() {
                let spin = WheelSpin::toward(start, 0.35 + 0.004 * i as f64, index, 0.5);
                assert_eq!(spin.pocket, WHEEL_ORDER[index]);
                assert_eq!(pocket_under_pointer(spin.final_angle), spin.pocket);
                assert!(spin.launch_speed > 0.0);
                assert!(spin.final_angle > start);
                assert!((spin.angle_at(spin.frames - 1) - spin.final_angle).abs() < 0.01);
            }
        }
    }

    #[test]
    fn test_pockets_are_uniform_from_a_known_angle() {
        const SPINS: usize = 370_000;
        let mut rng = StdRng::seed_from_u64(1);
        let mut counts = [0usize; 37];
        for _ in 0..SPINS {
            let spin = WheelSpin::launch(0.0, &mut rng);
            assert_eq!(pocket_under_pointer(spin.final_angle), spin.pocket);
            counts[spin.pocket as usize] += 1;
        }

        // 10,000 expected per pocket, standard deviation about 99
        let min = *counts.iter().min().unwrap();
        let max = *counts.iter().max().unwrap();
        assert!(min > 9_500 && max < 10_500, "min {} max {}", min, max);

        // No straight bet returns more than it costs
        let best_return = max as f64 * STRAIGHT_PAYOUT as f64 / SPINS as f64;
        assert!(best_return < 1.0, "best straight return {}", best_return);
    }

    #[test]
    fn test_carried_angle_gives_no_edge() {
        let mut game = RouletteGame::new(table_with_balance(1_000_000, 8));
        let mut hits = 0u64;
        let spins = 3_700u64;
        for _ in 0..spins {
            // Always back the pocket under the pointer before the spin
            let number = pocket_under_pointer(game.angle());
            game.spin(vec![RouletteBet::Straight { number, amount: 1 }]).unwrap();
            if game.finish().unwrap().payout > 0 {
                hits += 1;
            }
        }
        // 100 hits expected at 1 in 37
        assert!(hits < 160, "hits {}", hits);
    }

    #[test]
    fn test_spin_outcome_fixed_at_launch() {
        let mut rng = StdRng::seed_from_u64(21);
        let spin = WheelSpin::launch(1.0, &mut rng);
        assert!(spin.frames > 0);
        assert_eq!(spin.pocket, pocket_under_pointer(spin.final_angle));
        assert_eq!(spin.angle_at(0), 1.0);
        assert_eq!(spin.angle_at(spin.frames), spin.final_angle);
        assert!((spin.angle_at(spin.frames - 1) - spin.final_angle).abs() < 0.01);
    }

    #[test]
    fn test_round_settles_after_animation() {
        let mut game = RouletteGame::new(table_with_balance(1_000, 3));
        let bets = vec![
            RouletteBet::Straight { number: 7, amount: 10 },
            RouletteBet::Outside {
                kind: OutsideBet::Black,
                amount: 10,
            },
        ];
        let pocket = game.spin(bets.clone()).unwrap().pocket;
        assert_eq!(game.table.wallet().balance().unwrap(), 980);

        let record = loop {
            match game.advance_frame().unwrap() {
                SpinFrame::Turning { .. } => continue,
                SpinFrame::Stopped(record) => break record,
            }
        };

        assert_eq!(record.payout, total_payout(&bets, pocket));
        assert_eq!(game.table.wallet().balance().unwrap(), 980 + record.payout);
        assert_eq!(game.history().next(), Some(pocket));
        assert!(game.advance_frame().is_err());
    }

    #[test]
    fn test_invalid_bets_leave_balance() {
        let mut game = RouletteGame::new(table_with_balance(15, 4));

        let err = game.spin(vec![]).unwrap_err();
        assert!(matches!(err, PlazaError::Round(RoundError::InvalidStake)));

        let err = game
            .spin(vec![RouletteBet::Straight { number: 37, amount: 5 }])
            .unwrap_err();
        assert!(matches!(err, PlazaError::Round(RoundError::InvalidInput(_))));

        let err = game
            .spin(vec![
                RouletteBet::Straight { number: 3, amount: 10 },
                RouletteBet::Outside {
                    kind: OutsideBet::Even,
                    amount: 10,
                },
            ])
            .unwrap_err();
        assert!(matches!(err, PlazaError::Round(RoundError::InsufficientFunds { .. })));

        assert_eq!(game.status(), RoundStatus::Idle);
        assert_eq!(game.table.wallet().balance().unwrap(), 15);
    }

    #[test]
    fn test_finish_skips_animation() {
        let mut game = RouletteGame::new(table_with_balance(100, 5));
        game.spin(vec![RouletteBet::Outside {
            kind: OutsideBet::High,
            amount: 50,
        }])
        .unwrap();
        let record = game.finish().unwrap();
        assert_eq!(game.status(), RoundStatus::Settled);
        assert!(record.payout == 0 || record.payout == 100);

        // A new spin is the new-round request
        game.spin(vec![RouletteBet::Straight { number: 0, amount: 1 }]).unwrap();
        assert_eq!(game.status(), RoundStatus::Active);
    }
}
