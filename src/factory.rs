//! Wiring for a plaza session
//!
//! Builds the store, the shared wallet and the round journal from a
//! `PlazaConfig`, then hands out round controllers that all hold the same
//! wallet handle.

use crate::{
    config::PlazaConfig,
    errors::PlazaResult,
    games::{BlackjackGame, CrashGame, MinesGame, PlinkoGame, RouletteGame, SeedSource, SlotsGame, Table},
    history::RoundJournal,
    storage::{open_store, KvStore},
    wallet::Wallet,
};
use std::sync::Arc;

/// One wallet, one journal, and a controller per game on demand
pub struct Plaza {
    config: PlazaConfig,
    table: Table,
}

impl Plaza {
    /// Open storage and build the shared services
    pub fn open(config: PlazaConfig) -> PlazaResult<Self> {
        let store = open_store(&config.storage)?;
        Ok(Self::with_store(config, store, SeedSource::Os))
    }

    /// Build on an existing store with the given seed source
    pub fn with_store(config: PlazaConfig, store: Arc<dyn KvStore>, seeds: SeedSource) -> Self {
        let wallet = Wallet::new(store.clone(), &config.wallet);
        let journal = RoundJournal::new(store);
        tracing::info!(
            backend = ?config.storage.backend,
            wallet_key = %config.wallet.storage_key,
            "Plaza ready"
        );

        Self {
            table: Table::new(wallet, Some(journal), seeds),
            config,
        }
    }

    pub fn config(&self) -> &PlazaConfig {
        &self.config
    }

    pub fn wallet(&self) -> &Wallet {
        self.table.wallet()
    }

    pub fn journal(&self) -> Option<&RoundJournal> {
        self.table.journal()
    }

    pub fn mines(&self) -> MinesGame {
        MinesGame::new(self.table.clone(), self.config.mines.grid_size)
    }

    pub fn roulette(&self) -> RouletteGame {
        RouletteGame::new(self.table.clone())
    }

    pub fn plinko(&self) -> PlinkoGame {
        PlinkoGame::new(self.table.clone(), self.config.plinko.clone())
    }

    pub fn blackjack(&self) -> BlackjackGame {
        BlackjackGame::new(self.table.clone())
    }

    pub fn slots(&self) -> SlotsGame {
        SlotsGame::new(self.table.clone())
    }

    pub fn crash(&self) -> CrashGame {
        CrashGame::new(self.table.clone(), self.config.crash.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::games::mines::Reveal;
    use crate::storage::MemoryStore;

    #[test]
    fn test_controllers_share_one_wallet() {
        let config = ConfigBuilder::new().in_memory().default_balance(1_000).build();
        let plaza = Plaza::with_store(config, Arc::new(MemoryStore::new()), SeedSource::deterministic(4));

        let mut mines = plaza.mines();
        let mut slots = plaza.slots();
        mines.start(100, 2).unwrap();
        assert_eq!(plaza.wallet().balance().unwrap(), 900);

        // Edits from anywhere are seen everywhere
        plaza.wallet().set(500).unwrap();
        let err = slots.spin(501, Default::default()).unwrap_err();
        assert!(err.is_user_error());

        slots.spin(100, Default::default()).unwrap();
        assert_eq!(plaza.wallet().balance().unwrap(), 400);

        let record = slots.finish().unwrap();
        assert_eq!(plaza.wallet().balance().unwrap(), 400 + record.payout);

        for tile in 0..25 {
            match mines.reveal(tile).unwrap() {
                Reveal::Mine(_) => break,
                Reveal::Safe { .. } => {
                    mines.cash_out().unwrap();
                    break;
                }
                Reveal::AlreadyRevealed => unreachable!(),
            }
        }

        let stats = plaza.journal().unwrap().load_stats().unwrap();
        assert_eq!(stats.rounds, 2);
    }
}
