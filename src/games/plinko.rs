//! Ball drop (plinko).
//!
//! Balls fall through a staggered peg board under simple sub-stepped physics
//! and land in one of 13 slots, each with a fixed multiplier. A drop debits
//! `bet × count` once; every ball is then its own round and credits its own
//! payout when it lands. Each ball's whole path is simulated when the drop is
//! taken, so animation only replays a fixed trajectory.

use crate::config::PlinkoConfig;
use crate::errors::{PlazaResult, RoundError};
use crate::games::round::{RoundController, Stake, Table, Transition};
use crate::games::types::{GameKind, RoundDetail, RoundRecord, RoundStatus};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Slot multipliers in tenths, edges high and centre low
pub const PLINKO_MULTIPLIERS_TENTHS: [u64; 13] = [160, 90, 40, 20, 10, 7, 5, 7, 10, 20, 40, 90, 160];

const START_JITTER: f64 = 0.35;
const SPAWN_LIFT: f64 = 8.0;
const PEG_ROW_REACH: f64 = 8.0;
const DEFLECT_X: f64 = 0.12;
const DEFLECT_Y: f64 = 0.04;

pub fn multiplier(slot: usize) -> f64 {
    PLINKO_MULTIPLIERS_TENTHS[slot] as f64 / 10.0
}

/// `floor(bet × multiplier)` for the given slot
pub fn payout(bet: u64, slot: usize) -> u64 {
    bet.saturating_mul(PLINKO_MULTIPLIERS_TENTHS[slot]) / 10
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy)]
struct Ball {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

/// Precomputed trajectory of one ball, one point per animation frame
#[derive(Debug, Clone, PartialEq)]
pub struct BallPath {
    pub start_column: f64,
    pub points: Vec<Point>,
    pub slot: usize,
}

impl BallPath {
    /// Frames from spawn to landing
    pub fn frames(&self) -> usize {
        self.points.len().saturating_sub(1)
    }
}

/// Peg layout and physics for one board
#[derive(Debug, Clone)]
pub struct Board {
    config: PlinkoConfig,
    offset_x: f64,
    floor_y: f64,
    pegs: Vec<Vec<Point>>,
}

impl Board {
    pub fn new(config: PlinkoConfig) -> Self {
        let columns = config.slots - 1;
        let offset_x = (config.board_width - config.spacing_x * columns as f64) / 2.0;
        let floor_y = config.board_height - config.floor_margin;

        let pegs = (0..config.rows)
            .map(|row| {
                let shift = if row % 2 == 1 { config.spacing_x / 2.0 } else { 0.0 };
                let y = config.top_margin + (row + 1) as f64 * config.spacing_y;
                (0..columns)
                    .map(|c| Point {
                        x: offset_x + c as f64 * config.spacing_x + shift,
                        y,
                    })
                    .collect()
            })
            .collect();

        Self {
            config,
            offset_x,
            floor_y,
            pegs,
        }
    }

    pub fn config(&self) -> &PlinkoConfig {
        &self.config
    }

    pub fn pegs(&self) -> impl Iterator<Item = &Point> {
        self.pegs.iter().flatten()
    }

    /// Horizontal centre of a (possibly fractional) column
    pub fn column_x(&self, column: f64) -> f64 {
        self.offset_x + column * self.config.spacing_x
    }

    /// Nearest slot to `x`, clamped onto the board
    pub fn slot_at(&self, x: f64) -> usize {
        let index = ((x - self.offset_x) / self.config.spacing_x).round();
        index.clamp(0.0, (self.config.slots - 1) as f64) as usize
    }

    /// Drop one ball from `column` and follow it to the floor
    pub fn simulate<R: Rng + ?Sized>(&self, column: f64, rng: &mut R) -> BallPath {
        let max_column = (self.config.slots - 1) as f64;
        let jitter = rng.gen::<f64>() * START_JITTER - START_JITTER / 2.0;
        let start_column = (column + jitter).clamp(0.0, max_column);

        let mut ball = Ball {
            x: self.column_x(start_column),
            y: self.config.top_margin - SPAWN_LIFT,
            vx: 0.0,
            vy: 0.0,
        };
        let mut points = vec![Point { x: ball.x, y: ball.y }];

        let landing_y = self.floor_y - self.config.ball_radius;
        let mut landed = false;
        while !landed && points.len() <= self.config.max_frames as usize {
            landed = self.step(&mut ball, rng);
            points.push(Point { x: ball.x, y: ball.y });
        }
        if !landed {
            tracing::debug!(x = ball.x, y = ball.y, "Ball stalled; landing in place");
            ball.y = landing_y;
            if let Some(last) = points.last_mut() {
                last.y = landing_y;
            }
        }

        BallPath {
            start_column,
            points,
            slot: self.slot_at(ball.x),
        }
    }

    /// One animation frame; true once the ball reaches the floor
    fn step<R: Rng + ?Sized>(&self, ball: &mut Ball, rng: &mut R) -> bool {
        let c = &self.config;
        let substeps = c.substeps as f64;
        let min_x = self.offset_x - c.spacing_x / 2.0 + c.ball_radius;
        let max_x = self.column_x((c.slots - 1) as f64) + c.spacing_x / 2.0 - c.ball_radius;

        for _ in 0..c.substeps {
            ball.vy += c.gravity / substeps;
            ball.x += ball.vx / substeps;
            ball.y += ball.vy / substeps;

            for row in &self.pegs {
                let near = row.first().is_some_and(|p| (p.y - ball.y).abs() <= c.spacing_y + PEG_ROW_REACH);
                if near {
                    for peg in row {
                        self.collide(ball, peg, rng);
                    }
                }
            }

            if ball.x < min_x {
                ball.x = min_x;
                ball.vx = ball.vx.abs() * c.bounce;
            }
            if ball.x > max_x {
                ball.x = max_x;
                ball.vx = -ball.vx.abs() * c.bounce;
            }

            ball.vx = ball.vx.clamp(-c.max_velocity, c.max_velocity);
            ball.vy = ball.vy.clamp(-c.max_velocity, c.max_velocity);

            if ball.y >= self.floor_y - c.ball_radius {
                ball.y = self.floor_y - c.ball_radius;
                return true;
            }
        }
        false
    }

    fn collide<R: Rng + ?Sized>(&self, ball: &mut Ball, peg: &Point, rng: &mut R) {
        let dx = ball.x - peg.x;
        let dy = ball.y - peg.y;
        let dist = dx.hypot(dy);
        let min_dist = self.config.peg_radius + self.config.ball_radius;
        if dist >= min_dist {
            return;
        }

        let d = if dist == 0.0 { 1.0 } else { dist };
        let (nx, ny) = (dx / d, dy / d);
        let overlap = min_dist - dist + 0.01;
        ball.x += nx * overlap;
        ball.y += ny * overlap;

        // Reflect about the contact normal, then nudge so paths diverge
        let dot = ball.vx * nx + ball.vy * ny;
        ball.vx = (ball.vx - 2.0 * dot * nx) * self.config.drag + (rng.gen::<f64>() - 0.5) * DEFLECT_X;
        ball.vy = (ball.vy - 2.0 * dot * ny) * self.config.drag + (rng.gen::<f64>() - 0.5) * DEFLECT_Y;
    }
}

#[derive(Debug)]
struct BallFlight {
    stake: Stake,
    path: BallPath,
    frame: usize,
}

impl BallFlight {
    fn position(&self) -> Point {
        self.path.points[self.frame.min(self.path.frames())]
    }
}

/// Round controller for the ball drop. Any number of balls may be in flight;
/// the controller is `Active` until the last one lands.
pub struct PlinkoGame {
    table: Table,
    board: Board,
    in_flight: Vec<BallFlight>,
    last_landing: Option<RoundRecord>,
    /// Credited landings not yet returned because a later ball failed to settle
    unreported: Vec<RoundRecord>,
}

impl PlinkoGame {
    pub fn new(table: Table, config: PlinkoConfig) -> Self {
        Self {
            table,
            board: Board::new(config),
            in_flight: Vec::new(),
            last_landing: None,
            unreported: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Debit `bet × count` and launch `count` balls from `column`. Allowed
    /// while earlier balls are still falling.
    pub fn drop_balls(&mut self, bet: u64, count: u32, column: usize) -> PlazaResult<usize> {
        let transition = if self.in_flight.is_empty() {
            Transition::Start
        } else {
            Transition::Act("drop more balls")
        };
        self.status().apply(GameKind::Plinko, transition)?;

        let config = self.board.config();
        if count == 0 || count > config.max_balls_per_drop {
            return Err(RoundError::InvalidInput(format!(
                "Drop between 1 and {} balls",
                config.max_balls_per_drop
            ))
            .into());
        }
        if column >= config.slots {
            return Err(RoundError::InvalidInput(format!("Column must be 0–{}", config.slots - 1)).into());
        }

        let stakes = self.table.stake_many(GameKind::Plinko, bet, count)?;
        if self.in_flight.is_empty() {
            self.last_landing = None;
        }
        for stake in stakes {
            let path = self.board.simulate(column as f64, &mut stake.seed().rng());
            tracing::debug!(
                round_id = %stake.round_id,
                start_column = path.start_column,
                slot = path.slot,
                frames = path.frames(),
                "Ball dropped"
            );
            self.in_flight.push(BallFlight { stake, path, frame: 0 });
        }
        Ok(self.in_flight.len())
    }

    /// Advance every ball one frame and settle the ones that land
    pub fn advance_frame(&mut self) -> PlazaResult<Vec<RoundRecord>> {
        self.status().apply(GameKind::Plinko, Transition::Act("advance the balls"))?;
        for flight in &mut self.in_flight {
            flight.frame += 1;
        }
        self.settle_landed()
    }

    /// Land every ball in flight
    pub fn finish(&mut self) -> PlazaResult<Vec<RoundRecord>> {
        self.status().apply(GameKind::Plinko, Transition::Act("finish the drop"))?;
        for flight in &mut self.in_flight {
            flight.frame = flight.path.frames();
        }
        self.settle_landed()
    }

    /// Current position of every ball in flight
    pub fn positions(&self) -> Vec<Point> {
        self.in_flight.iter().map(BallFlight::position).collect()
    }

    pub fn balls_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn last_landing(&self) -> Option<&RoundRecord> {
        self.last_landing.as_ref()
    }

    /// Settle every ball at the end of its path. If one fails, balls already
    /// credited are returned by the next call instead of being lost.
    fn settle_landed(&mut self) -> PlazaResult<Vec<RoundRecord>> {
        let mut landed = std::mem::take(&mut self.unreported);
        let mut i = 0;
        while i < self.in_flight.len() {
            if self.in_flight[i].frame < self.in_flight[i].path.frames() {
                i += 1;
                continue;
            }

            if self.in_flight.len() == 1 {
                self.status().apply(GameKind::Plinko, Transition::Settle)?;
            }
            let flight = self.in_flight.remove(i);

            let slot = flight.path.slot;
            let detail = RoundDetail::Plinko {
                start_column: flight.path.start_column,
                slot,
                multiplier_tenths: PLINKO_MULTIPLIERS_TENTHS[slot],
            };
            match self.table.settle(&flight.stake, payout(flight.stake.amount, slot), detail) {
                Ok(record) => {
                    tracing::debug!(round_id = %record.round_id, slot, payout = record.payout, "Ball landed");
                    self.last_landing = Some(record.clone());
                    landed.push(record);
                }
                Err(e) => {
                    tracing::warn!(
                        round_id = %flight.stake.round_id,
                        credited = landed.len(),
                        error = %e,
                        "Ball failed to settle"
                    );
                    self.in_flight.insert(i, flight);
                    self.unreported = landed;
                    return Err(e);
                }
            }
        }
        Ok(landed)
    }
}

impl RoundController for PlinkoGame {
    fn game(&self) -> GameKind {
        GameKind::Plinko
    }

    fn status(&self) -> RoundStatus {
        if !self.in_flight.is_empty() {
            RoundStatus::Active
        } else if self.last_landing.is_some() {
            RoundStatus::Settled
        } else {
            RoundStatus::Idle
        }
    }

    fn reset(&mut self) -> Result<(), RoundError> {
        self.status().apply(GameKind::Plinko, Transition::Reset)?;
        self.last_landing = None;
        Ok(())
    }
}
