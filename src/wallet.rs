//! The shared Plaza wallet
//!
//! One balance, persisted under one key, shared by every casino game. The
//! wallet never caches: each read goes to the store, so a change made through
//! any handle is visible through every other handle immediately. All
//! read-modify-write operations run under one lock, and the balance can never
//! go negative because `debit` refuses instead of underflowing.

use crate::config::WalletConfig;
use crate::errors::{PlazaResult, RoundError};
use crate::storage::KvStore;
use std::sync::{Arc, Mutex, MutexGuard};

/// Balance in shillings
pub type Balance = u64;

/// Handle to the shared balance. Cloning yields another handle to the same balance.
#[derive(Clone)]
pub struct Wallet {
    store: Arc<dyn KvStore>,
    key: Arc<str>,
    default_balance: Balance,
    lock: Arc<Mutex<()>>,
}

impl Wallet {
    pub fn new(store: Arc<dyn KvStore>, config: &WalletConfig) -> Self {
        Self {
            store,
            key: Arc::from(config.storage_key.as_str()),
            default_balance: config.default_balance,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn default_balance(&self) -> Balance {
        self.default_balance
    }

    /// Current balance, or the default when nothing has been persisted yet
    pub fn balance(&self) -> PlazaResult<Balance> {
        let _guard = self.guard();
        self.read()
    }

    /// Overwrite the balance
    pub fn set(&self, value: Balance) -> PlazaResult<()> {
        let _guard = self.guard();
        self.write(value)?;
        tracing::info!(balance = value, "Wallet balance set");
        Ok(())
    }

    /// Restore the default balance
    pub fn reset(&self) -> PlazaResult<Balance> {
        self.set(self.default_balance)?;
        Ok(self.default_balance)
    }

    /// Take `amount` from the balance. Fails without touching the balance
    /// when it would go negative. Returns the new balance.
    pub fn debit(&self, amount: Balance) -> PlazaResult<Balance> {
        let _guard = self.guard();
        let available = self.read()?;
        if amount > available {
            tracing::warn!(needed = amount, available, "Debit refused: insufficient funds");
            return Err(RoundError::InsufficientFunds {
                needed: amount,
                available,
            }
            .into());
        }

        let next = available - amount;
        self.write(next)?;
        tracing::debug!(amount, balance = next, "Wallet debited");
        Ok(next)
    }

    /// Add `amount` to the balance. Returns the new balance.
    pub fn credit(&self, amount: Balance) -> PlazaResult<Balance> {
        let _guard = self.guard();
        let next = self.read()?.saturating_add(amount);
        self.write(next)?;
        tracing::debug!(amount, balance = next, "Wallet credited");
        Ok(next)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> PlazaResult<Balance> {
        let Some(bytes) = self.store.get(self.key.as_bytes())? else {
            return Ok(self.default_balance);
        };

        match std::str::from_utf8(&bytes).ok().and_then(|s| s.trim().parse::<Balance>().ok()) {
            Some(balance) => Ok(balance),
            None => {
                tracing::warn!(
                    key = %self.key,
                    raw = %String::from_utf8_lossy(&bytes),
                    "Persisted balance is not a number; falling back to default"
                );
                Ok(self.default_balance)
            }
        }
    }

    fn write(&self, value: Balance) -> PlazaResult<()> {
        self.store.put(self.key.as_bytes(), value.to_string().as_bytes())
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("key", &self.key)
            .field("default_balance", &self.default_balance)
            .finish()
    }
}
