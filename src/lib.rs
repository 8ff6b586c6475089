//! Plaza - shared virtual wallet and fair-payout casino games
//!
//! One persisted balance is shared by six round controllers (mines, roulette,
//! plinko, blackjack, slots, crash). Every round debits its stake up front,
//! draws its outcome from a committed per-round seed, and credits its payout
//! when it settles.

pub mod config;
pub mod errors;
pub mod factory;
pub mod fairness;
pub mod games;
pub mod history;
pub mod storage;
pub mod wallet;

pub use config::{ConfigBuilder, ConfigLoader, PlazaConfig};
pub use errors::{PlazaError, PlazaResult, RoundError};
pub use factory::Plaza;
pub use games::{GameKind, RoundController, RoundRecord, RoundStatus};
pub use wallet::{Balance, Wallet};
