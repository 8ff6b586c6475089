//! Single-deck blackjack ("21").
//!
//! The player plays one hand against the dealer. A two-card 21 settles at
//! once and pays 3:2; otherwise the player hits until standing or busting,
//! and the dealer then draws to 17. The dealer's hole card stays hidden until
//! the round settles.

use crate::errors::{PlazaResult, RoundError};
use crate::games::cards::{Card, Deck, Rank};
use crate::games::round::{RoundController, Stake, Table, Transition};
use crate::games::types::{GameKind, RoundDetail, RoundRecord, RoundStatus};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BLACKJACK: u8 = 21;
pub const DEALER_STANDS_ON: u8 = 17;

/// Best total for a hand: every ace counts 11, then drops to 1 one at a time
/// while the hand would bust.
pub fn hand_value(cards: &[Card]) -> u8 {
    let mut total: u32 = cards.iter().map(|c| c.rank.points() as u32).sum();
    let mut soft_aces = cards.iter().filter(|c| c.rank == Rank::Ace).count();

    while total > BLACKJACK as u32 && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    total.min(u8::MAX as u32) as u8
}

/// Two-card 21
pub fn is_natural(cards: &[Card]) -> bool {
    cards.len() == 2 && hand_value(cards) == BLACKJACK
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlackjackOutcome {
    /// Natural on the deal, pays 3:2
    Blackjack,
    Win,
    DealerBust,
    Push,
    Lose,
    Bust,
}

impl BlackjackOutcome {
    /// Amount credited for a settled hand
    pub fn payout(self, stake: u64) -> u64 {
        match self {
            BlackjackOutcome::Blackjack => stake.saturating_mul(5) / 2,
            BlackjackOutcome::Win | BlackjackOutcome::DealerBust => stake.saturating_mul(2),
            BlackjackOutcome::Push => stake,
            BlackjackOutcome::Lose | BlackjackOutcome::Bust => 0,
        }
    }

    /// Compare finished hands after the dealer has drawn
    pub fn judge(player: u8, dealer: u8) -> Self {
        if player > BLACKJACK {
            BlackjackOutcome::Bust
        } else if dealer > BLACKJACK {
            BlackjackOutcome::DealerBust
        } else if player > dealer {
            BlackjackOutcome::Win
        } else if player < dealer {
            BlackjackOutcome::Lose
        } else {
            BlackjackOutcome::Push
        }
    }
}

impl fmt::Display for BlackjackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlackjackOutcome::Blackjack => write!(f, "blackjack"),
            BlackjackOutcome::Win => write!(f, "win"),
            BlackjackOutcome::DealerBust => write!(f, "dealer bust"),
            BlackjackOutcome::Push => write!(f, "push"),
            BlackjackOutcome::Lose => write!(f, "lose"),
            BlackjackOutcome::Bust => write!(f, "bust"),
        }
    }
}

/// What the player faces after a deal or a hit
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// Player to act: hit or stand
    Player { total: u8 },
    /// Hand over
    Over(RoundRecord),
}

#[derive(Debug)]
struct Hand {
    stake: Stake,
    rng: StdRng,
    deck: Deck,
    player: Vec<Card>,
    dealer: Vec<Card>,
}

impl Hand {
    fn draw(&mut self) -> Card {
        loop {
            if let Some(card) = self.deck.draw() {
                return card;
            }
            self.deck = Deck::shuffled(&mut self.rng);
        }
    }
}

#[derive(Debug)]
enum BlackjackState {
    Idle,
    Playing(Hand),
    Settled(RoundRecord),
}

/// Round controller for blackjack
pub struct BlackjackGame {
    table: Table,
    state: BlackjackState,
}

impl BlackjackGame {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            state: BlackjackState::Idle,
        }
    }

    /// Debit the stake, shuffle a fresh deck and deal two cards each
    pub fn deal(&mut self, stake: u64) -> PlazaResult<Turn> {
        self.status().apply(GameKind::Blackjack, Transition::Start)?;
        let stake = self.table.stake(GameKind::Blackjack, stake)?;

        let mut rng = stake.seed().rng();
        let deck = Deck::shuffled(&mut rng);
        let mut hand = Hand {
            stake,
            rng,
            deck,
            player: Vec::with_capacity(5),
            dealer: Vec::with_capacity(5),
        };
        // Player, player, dealer up, dealer hole
        for _ in 0..2 {
            let card = hand.draw();
            hand.player.push(card);
        }
        for _ in 0..2 {
            let card = hand.draw();
            hand.dealer.push(card);
        }

        let natural = is_natural(&hand.player);
        let total = hand_value(&hand.player);
        self.state = BlackjackState::Playing(hand);

        if natural {
            return self.settle(BlackjackOutcome::Blackjack).map(Turn::Over);
        }
        Ok(Turn::Player { total })
    }

    /// Draw one card for the player; busting settles the hand
    pub fn hit(&mut self) -> PlazaResult<Turn> {
        self.status().apply(GameKind::Blackjack, Transition::Act("hit"))?;
        let BlackjackState::Playing(hand) = &mut self.state else {
            unreachable!("status checked above");
        };

        let card = hand.draw();
        hand.player.push(card);
        let total = hand_value(&hand.player);
        tracing::debug!(round_id = %hand.stake.round_id, %card, total, "Player hit");

        if total > BLACKJACK {
            return self.settle(BlackjackOutcome::Bust).map(Turn::Over);
        }
        Ok(Turn::Player { total })
    }

    /// Stand; the dealer draws to 17 and the hand settles
    pub fn stand(&mut self) -> PlazaResult<RoundRecord> {
        self.status().apply(GameKind::Blackjack, Transition::Act("stand"))?;
        let BlackjackState::Playing(hand) = &mut self.state else {
            unreachable!("status checked above");
        };

        while hand_value(&hand.dealer) < DEALER_STANDS_ON {
            let card = hand.draw();
            hand.dealer.push(card);
        }
        let outcome = BlackjackOutcome::judge(hand_value(&hand.player), hand_value(&hand.dealer));
        self.settle(outcome)
    }

    pub fn player_hand(&self) -> &[Card] {
        match &self.state {
            BlackjackState::Playing(hand) => &hand.player,
            BlackjackState::Settled(RoundRecord {
                detail: RoundDetail::Blackjack { player, .. },
                ..
            }) => player,
            _ => &[],
        }
    }

    /// Dealer cards the player may see: the up card only while the hand is
    /// in play, everything once settled
    pub fn dealer_visible(&self) -> &[Card] {
        match &self.state {
            BlackjackState::Playing(hand) => &hand.dealer[..1],
            BlackjackState::Settled(RoundRecord {
                detail: RoundDetail::Blackjack { dealer, .. },
                ..
            }) => dealer,
            _ => &[],
        }
    }

    pub fn last_round(&self) -> Option<&RoundRecord> {
        match &self.state {
            BlackjackState::Settled(record) => Some(record),
            _ => None,
        }
    }

    fn settle(&mut self, outcome: BlackjackOutcome) -> PlazaResult<RoundRecord> {
        self.status().apply(GameKind::Blackjack, Transition::Settle)?;
        let BlackjackState::Playing(hand) = std::mem::replace(&mut self.state, BlackjackState::Idle) else {
            unreachable!("status checked above");
        };

        let detail = RoundDetail::Blackjack {
            player: hand.player.clone(),
            dealer: hand.dealer.clone(),
            player_total: hand_value(&hand.player),
            dealer_total: hand_value(&hand.dealer),
            outcome,
        };

        match self.table.settle(&hand.stake, outcome.payout(hand.stake.amount), detail) {
            Ok(record) => {
                self.state = BlackjackState::Settled(record.clone());
                Ok(record)
            }
            Err(e) => {
                self.state = BlackjackState::Playing(hand);
                Err(e)
            }
        }
    }
}

impl RoundController for BlackjackGame {
    fn game(&self) -> GameKind {
        GameKind::Blackjack
    }

    fn status(&self) -> RoundStatus {
        match self.state {
            BlackjackState::Idle => RoundStatus::Idle,
            BlackjackState::Playing(_) => RoundStatus::Active,
            BlackjackState::Settled(_) => RoundStatus::Settled,
        }
    }

    fn reset(&mut self) -> Result<(), RoundError> {
        self.status().apply(GameKind::Blackjack, Transition::Reset)?;
        self.state = BlackjackState::Idle;
        Ok(())
    }
}
