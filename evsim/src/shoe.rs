use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};

use crate::EngineError;

const MOD: u128 = 3817949514078926267; // A prime number with 62 bits.
const BASE: u128 = 211;
const POW_BASE: [u128; 10] = get_powers_of_base();

const fn get_powers_of_base() -> [u128; 10] {
    let mut ret: [u128; 10] = [0; 10];
    ret[0] = 1;

    let mut i = 1;
    while i < ret.len() {
        ret[i] = ret[i - 1] * BASE % MOD;
        i += 1;
    }

    ret
}

/// One of the 10 blackjack ranks. All ten-valued cards (10, J, Q, K)
/// collapse into [`Rank::Ten`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Rank {
    #[strum(to_string = "A", serialize = "1")]
    Ace,
    #[strum(to_string = "2")]
    Two,
    #[strum(to_string = "3")]
    Three,
    #[strum(to_string = "4")]
    Four,
    #[strum(to_string = "5")]
    Five,
    #[strum(to_string = "6")]
    Six,
    #[strum(to_string = "7")]
    Seven,
    #[strum(to_string = "8")]
    Eight,
    #[strum(to_string = "9")]
    Nine,
    #[strum(to_string = "T", serialize = "10", serialize = "J", serialize = "Q", serialize = "K")]
    Ten,
}

impl Rank {
    pub fn index(self) -> usize {
        self as usize
    }

    /// The card value counting an Ace as 1.
    pub fn low_value(self) -> u16 {
        self as u16 + 1
    }

    /// Parses a rank symbol, mapping 10/J/Q/K onto the ten group.
    /// Unrecognized symbols are an [`EngineError::UnknownRank`].
    pub fn parse(symbol: &str) -> Result<Rank, EngineError> {
        Rank::from_str(symbol.trim()).map_err(|_| EngineError::UnknownRank(symbol.to_string()))
    }
}

/// The multiset of undealt cards, tracked as one count per rank.
///
/// The composition key is maintained incrementally on every card
/// removal so that memo tables can index states in O(1).
#[derive(Debug, Clone, PartialEq)]
pub struct Shoe {
    counts: [u16; 10],
    total: u16,
    hash: u128,
}

impl Shoe {
    pub fn new(counts: &[u16; 10]) -> Shoe {
        let mut shoe = Shoe {
            counts: *counts,
            total: 0,
            hash: 0,
        };
        shoe.propagate_counts();
        shoe
    }

    /// A fresh shoe: 4 cards per rank per deck, 16 for the ten group.
    pub fn with_decks(decks: u8) -> Shoe {
        let mut counts = [(decks as u16) * 4; 10];
        counts[Rank::Ten.index()] = (decks as u16) * 16;
        Shoe::new(&counts)
    }

    pub fn count(&self, rank: Rank) -> u16 {
        self.counts[rank.index()]
    }

    pub fn total(&self) -> u16 {
        self.total
    }

    /// Probability of drawing the given rank from this shoe.
    pub fn proportion(&self, rank: Rank) -> f64 {
        self.count(rank) as f64 / self.total as f64
    }

    /// Stable key identifying this composition, shared by equal
    /// compositions however they were reached.
    pub fn composition_key(&self) -> u128 {
        self.hash
    }

    /// Removes one card of the given rank. Fails when that rank is
    /// already exhausted; the caller must treat this as fatal.
    pub fn remove(&mut self, rank: Rank) -> Result<(), EngineError> {
        if self.counts[rank.index()] == 0 {
            return Err(EngineError::RankExhausted(rank));
        }
        self.take(rank);
        Ok(())
    }

    /// Removes one card without checking the count. Callers must have
    /// verified `count(rank) > 0`.
    pub(crate) fn take(&mut self, rank: Rank) {
        let index = rank.index();
        debug_assert!(self.counts[index] > 0);
        self.counts[index] -= 1;
        self.hash = (self.hash + MOD - POW_BASE[index]) % MOD;
        self.total -= 1;
    }

    /// Puts one card of the given rank back.
    pub(crate) fn untake(&mut self, rank: Rank) {
        let index = rank.index();
        self.counts[index] += 1;
        self.hash = (self.hash + POW_BASE[index]) % MOD;
        self.total += 1;
    }

    fn propagate_counts(&mut self) {
        self.hash = 0;
        self.total = 0;
        for i in 0..self.counts.len() {
            self.hash += (self.counts[i] as u128) * POW_BASE[i];
            self.total += self.counts[i];
        }
        self.hash %= MOD;
    }
}
