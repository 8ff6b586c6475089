pub mod types;
pub mod round;
pub mod cards;
pub mod mines;
pub mod roulette;
pub mod plinko;
pub mod blackjack;
pub mod slots;
pub mod crash;

pub use types::*;
pub use round::{RoundController, SeedSource, Stake, Table, Transition};
pub use mines::MinesGame;
pub use roulette::RouletteGame;
pub use plinko::PlinkoGame;
pub use blackjack::BlackjackGame;
pub use slots::SlotsGame;
pub use crash::CrashGame;
