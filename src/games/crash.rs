//! Rising-multiplier crash game.
//!
//! The multiplier grows as `m(t) = e^(k·t)`. A hidden crash point is drawn
//! when the stake is taken; the player cashes out at the current readout any
//! time before the curve reaches it, or loses the stake when it does.

use crate::config::CrashConfig;
use crate::errors::{PlazaResult, RoundError};
use crate::games::round::{RoundController, Stake, Table, Transition};
use crate::games::types::{GameKind, RoundDetail, RoundRecord, RoundStatus};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const RARE_MIN: f64 = 8.0;
const RARE_SPREAD: f64 = 12.0;

/// Shape of the crash-point distribution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    /// 1..8, skewed high
    Low,
    /// 1..6
    #[default]
    Medium,
    /// 1..4, skewed toward an early crash
    High,
}

impl RiskTier {
    fn curve(self) -> (f64, f64) {
        // (exponent, span)
        match self {
            RiskTier::Low => (0.65, 7.0),
            RiskTier::Medium => (1.2, 5.0),
            RiskTier::High => (2.2, 3.0),
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
        }
    }
}

/// Draw the hidden crash point for a round
pub fn sample_crash_point<R: Rng + ?Sized>(risk: RiskTier, config: &CrashConfig, rng: &mut R) -> f64 {
    let (exponent, span) = risk.curve();
    let u: f64 = rng.gen();
    let mut point = 1.0 + u.powf(exponent) * span;
    if rng.gen::<f64>() < config.rare_probability {
        point = RARE_MIN + rng.gen::<f64>() * RARE_SPREAD;
    }
    point.min(config.max_crash)
}

/// Live multiplier after `elapsed`
pub fn multiplier_at(growth_rate: f64, elapsed: Duration) -> f64 {
    (growth_rate * elapsed.as_secs_f64()).exp()
}

/// Time for the curve to reach `multiplier`
pub fn time_to_reach(growth_rate: f64, multiplier: f64) -> Duration {
    Duration::from_secs_f64(multiplier.max(1.0).ln() / growth_rate)
}

// Absorbs float noise from nanosecond-truncated durations
const READOUT_EPSILON: f64 = 1e-6;

/// Multiplier as shown to the player, in hundredths (2.00× is 200).
/// Truncated, so the readout never runs ahead of the live curve.
pub fn readout_hundredths(multiplier: f64) -> u64 {
    (multiplier * 100.0 + READOUT_EPSILON).floor() as u64
}

/// `floor(stake × readout)`
pub fn cash_out_value(stake: u64, readout_hundredths: u64) -> u64 {
    (stake as u128 * readout_hundredths as u128 / 100).min(u64::MAX as u128) as u64
}

/// Result of letting time pass
#[derive(Debug, Clone, PartialEq)]
pub enum CrashTick {
    Rising { multiplier: f64, readout_hundredths: u64 },
    Crashed(RoundRecord),
}

#[derive(Debug)]
struct Curve {
    stake: Stake,
    risk: RiskTier,
    crash_point: f64,
    elapsed: Duration,
}

#[derive(Debug)]
enum CrashState {
    Idle,
    Rising(Curve),
    Settled(RoundRecord),
}

/// Round controller for the crash curve
pub struct CrashGame {
    table: Table,
    config: CrashConfig,
    state: CrashState,
}

impl CrashGame {
    pub fn new(table: Table, config: CrashConfig) -> Self {
        Self {
            table,
            config,
            state: CrashState::Idle,
        }
    }

    pub fn growth_rate(&self) -> f64 {
        self.config.growth_rate
    }

    /// Debit the stake, draw the crash point and start the curve at 1.00×
    pub fn start(&mut self, bet: u64, risk: RiskTier) -> PlazaResult<()> {
        self.status().apply(GameKind::Crash, Transition::Start)?;
        let stake = self.table.stake(GameKind::Crash, bet)?;
        let crash_point = sample_crash_point(risk, &self.config, &mut stake.seed().rng());
        self.begin(stake, risk, crash_point);
        Ok(())
    }

    fn begin(&mut self, stake: Stake, risk: RiskTier, crash_point: f64) {
        tracing::debug!(round_id = %stake.round_id, %risk, "Curve started");
        self.state = CrashState::Rising(Curve {
            stake,
            risk,
            crash_point,
            elapsed: Duration::ZERO,
        });
    }

    /// Let `dt` pass; crashes the round if the curve reaches the crash point
    pub fn advance(&mut self, dt: Duration) -> PlazaResult<CrashTick> {
        self.status().apply(GameKind::Crash, Transition::Act("advance the curve"))?;
        let CrashState::Rising(curve) = &mut self.state else {
            unreachable!("status checked above");
        };

        curve.elapsed += dt;
        let multiplier = multiplier_at(self.config.growth_rate, curve.elapsed);
        if multiplier >= curve.crash_point {
            return self.settle(None).map(CrashTick::Crashed);
        }
        Ok(CrashTick::Rising {
            multiplier,
            readout_hundredths: readout_hundredths(multiplier),
        })
    }

    /// Lock in the current readout. If the curve has already reached the
    /// crash point the round settles as a loss instead.
    pub fn cash_out(&mut self) -> PlazaResult<RoundRecord> {
        self.status().apply(GameKind::Crash, Transition::Act("cash out"))?;
        let CrashState::Rising(curve) = &self.state else {
            unreachable!("status checked above");
        };

        let multiplier = multiplier_at(self.config.growth_rate, curve.elapsed);
        if multiplier >= curve.crash_point {
            return self.settle(None);
        }
        self.settle(Some(readout_hundredths(multiplier)))
    }

    /// Live multiplier, or 1.0 with no curve running
    pub fn multiplier(&self) -> f64 {
        match &self.state {
            CrashState::Rising(curve) => multiplier_at(self.config.growth_rate, curve.elapsed),
            _ => 1.0,
        }
    }

    pub fn last_round(&self) -> Option<&RoundRecord> {
        match &self.state {
            CrashState::Settled(record) => Some(record),
            _ => None,
        }
    }

    fn settle(&mut self, cashed_out_hundredths: Option<u64>) -> PlazaResult<RoundRecord> {
        self.status().apply(GameKind::Crash, Transition::Settle)?;
        let CrashState::Rising(curve) = std::mem::replace(&mut self.state, CrashState::Idle) else {
            unreachable!("status checked above");
        };

        let payout = cashed_out_hundredths.map_or(0, |h| cash_out_value(curve.stake.amount, h));
        let detail = RoundDetail::Crash {
            risk: curve.risk,
            crash_point: curve.crash_point,
            cashed_out_at: cashed_out_hundredths.map(|h| h as f64 / 100.0),
        };

        match self.table.settle(&curve.stake, payout, detail) {
            Ok(record) => {
                self.state = CrashState::Settled(record.clone());
                Ok(record)
            }
            Err(e) => {
                self.state = CrashState::Rising(curve);
                Err(e)
            }
        }
    }

    #[cfg(test)]
    fn start_with_crash_point(&mut self, bet: u64, risk: RiskTier, crash_point: f64) -> PlazaResult<()> {
        self.status().apply(GameKind::Crash, Transition::Start)?;
        let stake = self.table.stake(GameKind::Crash, bet)?;
        self.begin(stake, risk, crash_point);
        Ok(())
    }
}

impl RoundController for CrashGame {
    fn game(&self) -> GameKind {
        GameKind::Crash
    }

    fn status(&self) -> RoundStatus {
        match self.state {
            CrashState::Idle => RoundStatus::Idle,
            CrashState::Rising(_) => RoundStatus::Active,
            CrashState::Settled(_) => RoundStatus::Settled,
        }
    }

    fn reset(&mut self) -> Result<(), RoundError> {
        self.status().apply(GameKind::Crash, Transition::Reset)?;
        self.state = CrashState::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::round::testing::table_with_balance;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn game(balance: u64, seed: u64) -> CrashGame {
        CrashGame::new(table_with_balance(balance, seed), CrashConfig::default())
    }

    #[test]
    fn test_crash_points_stay_in_range() {
        let config = CrashConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        for risk in [RiskTier::Low, RiskTier::Medium, RiskTier::High] {
            let (_, span) = risk.curve();
            for _ in 0..2_000 {
                let point = sample_crash_point(risk, &config, &mut rng);
                let regular = (1.0..=1.0 + span).contains(&point);
                let rare = (RARE_MIN..RARE_MIN + RARE_SPREAD).contains(&point);
                assert!(regular || rare, "{} crash point {}", risk, point);
            }
        }
    }

    #[test]
    fn test_tiers_are_ordered() {
        let config = CrashConfig {
            rare_probability: 0.0,
            ..CrashConfig::default()
        };
        let mean = |risk| {
            let mut rng = StdRng::seed_from_u64(2);
            (0..5_000).map(|_| sample_crash_point(risk, &config, &mut rng)).sum::<f64>() / 5_000.0
        };
        assert!(mean(RiskTier::Low) > mean(RiskTier::Medium));
        assert!(mean(RiskTier::Medium) > mean(RiskTier::High));
    }

    #[test]
    fn test_cap_applies() {
        let config = CrashConfig {
            rare_probability: 1.0,
            max_crash: 9.0,
            ..CrashConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            assert!(sample_crash_point(RiskTier::Low, &config, &mut rng) <= 9.0);
        }
    }

    #[test]
    fn test_curve_and_readout() {
        assert_eq!(multiplier_at(0.35, Duration::ZERO), 1.0);
        let t = time_to_reach(0.35, 2.0);
        assert_eq!(readout_hundredths(multiplier_at(0.35, t)), 200);
        assert_eq!(cash_out_value(100, 200), 200);
        assert_eq!(cash_out_value(33, 157), 51);
    }

    #[test]
    fn test_readout_never_exceeds_live_multiplier() {
        assert_eq!(readout_hundredths(1.996), 199);
        assert_eq!(readout_hundredths(1.0), 100);
        assert_eq!(readout_hundredths(2.349_999), 234);

        for ms in (0..5_000).step_by(37) {
            let multiplier = multiplier_at(0.35, Duration::from_millis(ms));
            let readout = readout_hundredths(multiplier);
            assert!(readout as f64 / 100.0 <= multiplier + 1e-7, "{} at {}ms", readout, ms);
        }
    }

    #[test]
    fn test_cash_out_just_below_crash_point_pays_truncated_readout() {
        let mut game = game(1_000, 9);
        game.start_with_crash_point(100, RiskTier::Medium, 1.5).unwrap();

        // 1.4999x reads 1.49x, not 1.50x
        let just_before = time_to_reach(game.growth_rate(), 1.4999);
        let tick = game.advance(just_before).unwrap();
        assert!(matches!(tick, CrashTick::Rising { readout_hundredths: 149, .. }));

        let record = game.cash_out().unwrap();
        assert_eq!(record.payout, 149);
        assert_eq!(game.table.wallet().balance().unwrap(), 1_049);
    }

    #[test]
    fn test_cash_out_at_two_then_curve_moves_on() {
        let mut game = game(1_000, 5);
        game.start_with_crash_point(100, RiskTier::Low, 3.0).unwrap();
        assert_eq!(game.table.wallet().balance().unwrap(), 900);

        let tick = game.advance(time_to_reach(game.growth_rate(), 2.0)).unwrap();
        assert!(matches!(tick, CrashTick::Rising { readout_hundredths: 200, .. }));

        let record = game.cash_out().unwrap();
        assert_eq!(record.payout, 200);
        assert_eq!(game.table.wallet().balance().unwrap(), 1_100);

        // Past the crash point: settled rounds do not move
        assert!(game.advance(Duration::from_secs(10)).is_err());
        assert!(game.cash_out().is_err());
        assert_eq!(game.table.wallet().balance().unwrap(), 1_100);
    }

    #[test]
    fn test_reaching_crash_point_loses_stake() {
        let mut game = game(500, 6);
        game.start_with_crash_point(100, RiskTier::High, 1.5).unwrap();

        assert!(matches!(
            game.advance(Duration::from_millis(500)).unwrap(),
            CrashTick::Rising { .. }
        ));
        let CrashTick::Crashed(record) = game.advance(Duration::from_secs(2)).unwrap() else {
            panic!("curve should have crashed");
        };
        assert_eq!(record.payout, 0);
        assert!(matches!(
            record.detail,
            RoundDetail::Crash { cashed_out_at: None, .. }
        ));
        assert_eq!(game.table.wallet().balance().unwrap(), 400);
    }

    #[test]
    fn test_immediate_crash_at_one() {
        let mut game = game(100, 7);
        game.start_with_crash_point(10, RiskTier::High, 1.0).unwrap();
        let record = game.cash_out().unwrap();
        assert_eq!(record.payout, 0);
        assert_eq!(game.table.wallet().balance().unwrap(), 90);
    }

    #[test]
    fn test_sampled_round_settles() {
        let mut game = game(100, 8);
        game.start(10, RiskTier::Medium).unwrap();
        let record = loop {
            match game.advance(Duration::from_millis(100)).unwrap() {
                CrashTick::Rising { .. } => continue,
                CrashTick::Crashed(record) => break record,
            }
        };
        assert_eq!(record.payout, 0);
        assert_eq!(game.status(), RoundStatus::Settled);
        game.reset().unwrap();
        assert_eq!(game.status(), RoundStatus::Idle);
    }
}
