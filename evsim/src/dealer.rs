use std::collections::HashMap;

use strum::IntoEnumIterator;

use crate::{EngineError, Rank, Rules, Shoe};

/// Dealer terminal results, in distribution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealerResult {
    Seventeen,
    Eighteen,
    Nineteen,
    Twenty,
    TwentyOne,
    Bust,
    Blackjack,
}

const ALL_RESULTS: [DealerResult; 7] = [
    DealerResult::Seventeen,
    DealerResult::Eighteen,
    DealerResult::Nineteen,
    DealerResult::Twenty,
    DealerResult::TwentyOne,
    DealerResult::Bust,
    DealerResult::Blackjack,
];

impl DealerResult {
    /// The dealer's standing total, or None for bust and blackjack.
    pub fn total(self) -> Option<u16> {
        match self {
            DealerResult::Seventeen => Some(17),
            DealerResult::Eighteen => Some(18),
            DealerResult::Nineteen => Some(19),
            DealerResult::Twenty => Some(20),
            DealerResult::TwentyOne => Some(21),
            DealerResult::Bust | DealerResult::Blackjack => None,
        }
    }

    fn from_stand_total(total: u16) -> DealerResult {
        match total {
            17 => DealerResult::Seventeen,
            18 => DealerResult::Eighteen,
            19 => DealerResult::Nineteen,
            20 => DealerResult::Twenty,
            21 => DealerResult::TwentyOne,
            _ => DealerResult::Bust,
        }
    }

    fn slot(self) -> usize {
        match self {
            DealerResult::Seventeen => 0,
            DealerResult::Eighteen => 1,
            DealerResult::Nineteen => 2,
            DealerResult::Twenty => 3,
            DealerResult::TwentyOne => 4,
            DealerResult::Bust => 5,
            DealerResult::Blackjack => 6,
        }
    }
}

/// Exact probability distribution over dealer terminal results.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DealerOutcomes {
    probabilities: [f64; 7],
}

impl DealerOutcomes {
    pub fn probability(&self, result: DealerResult) -> f64 {
        self.probabilities[result.slot()]
    }

    pub fn entries(&self) -> impl Iterator<Item = (DealerResult, f64)> + '_ {
        ALL_RESULTS
            .iter()
            .map(move |result| (*result, self.probabilities[result.slot()]))
    }

    pub fn sum(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    fn add(&mut self, result: DealerResult, probability: f64) {
        self.probabilities[result.slot()] += probability;
    }

    fn add_assign_with_p(&mut self, rhs: &DealerOutcomes, probability: f64) {
        for i in 0..self.probabilities.len() {
            self.probabilities[i] += rhs.probabilities[i] * probability;
        }
    }

    fn terminal(result: DealerResult) -> DealerOutcomes {
        let mut outcomes = DealerOutcomes::default();
        outcomes.add(result, 1.0);
        outcomes
    }
}

/// Adds one card to a running dealer total, demoting a soft Ace when
/// the total goes over 21.
fn add_card(total: u16, soft: bool, rank: Rank) -> (u16, bool) {
    let (mut total, mut soft) = if rank == Rank::Ace {
        if total + 11 <= 21 {
            (total + 11, true)
        } else {
            (total + 1, soft)
        }
    } else {
        (total + rank.low_value(), soft)
    };
    if total > 21 && soft {
        total -= 10;
        soft = false;
    }
    (total, soft)
}

fn must_stand(total: u16, soft: bool, rules: &Rules) -> bool {
    total > 17 || (total == 17 && !(soft && rules.hit_soft17))
}

/// Computes the dealer's exact terminal distribution for a given shoe
/// and up-card, drawing without replacement.
///
/// When the up-card is an Ace or ten-group card, a two-card 21 is an
/// immediate blackjack result. Under `peek` the blackjack hole card is
/// excluded instead and the remaining outcomes are renormalized: the
/// dealer checked and did not have it.
///
/// Probabilities sum to 1 within floating error; under peek the
/// blackjack entry is exactly zero and the rest still sum to 1.
pub fn dealer_outcomes(
    shoe: &Shoe,
    up: Rank,
    rules: &Rules,
) -> Result<DealerOutcomes, EngineError> {
    let mut shoe = shoe.clone();
    let mut memo: HashMap<(u128, u16, bool), DealerOutcomes> = HashMap::new();
    let mut outcomes = DealerOutcomes::default();

    let natural_possible = up == Rank::Ace || up == Rank::Ten;
    let excluded = if rules.peek && natural_possible {
        if up == Rank::Ace {
            Some(Rank::Ten)
        } else {
            Some(Rank::Ace)
        }
    } else {
        None
    };

    let cards_left = shoe.total();
    let hole_cards_left = cards_left - excluded.map_or(0, |rank| shoe.count(rank));
    if hole_cards_left == 0 {
        return Err(EngineError::EmptyShoe);
    }

    let (up_total, up_soft) = add_card(0, false, up);

    for rank in Rank::iter() {
        if Some(rank) == excluded || shoe.count(rank) == 0 {
            continue;
        }
        let probability = shoe.count(rank) as f64 / hole_cards_left as f64;

        shoe.take(rank);
        let (total, soft) = add_card(up_total, up_soft, rank);
        if natural_possible && total == 21 {
            // Peek is impossible here: the blackjack hole card was excluded.
            outcomes.add(DealerResult::Blackjack, probability);
        } else {
            let sub = draw_dealer(total, soft, &mut shoe, rules, &mut memo)?;
            outcomes.add_assign_with_p(&sub, probability);
        }
        shoe.untake(rank);
    }

    Ok(outcomes)
}

fn draw_dealer(
    total: u16,
    soft: bool,
    shoe: &mut Shoe,
    rules: &Rules,
    memo: &mut HashMap<(u128, u16, bool), DealerOutcomes>,
) -> Result<DealerOutcomes, EngineError> {
    if must_stand(total, soft, rules) {
        let result = if total > 21 {
            DealerResult::Bust
        } else {
            DealerResult::from_stand_total(total)
        };
        return Ok(DealerOutcomes::terminal(result));
    }

    let key = (shoe.composition_key(), total, soft);
    if let Some(hit) = memo.get(&key) {
        return Ok(*hit);
    }

    let cards_left = shoe.total();
    if cards_left == 0 {
        return Err(EngineError::EmptyShoe);
    }

    let mut outcomes = DealerOutcomes::default();
    for rank in Rank::iter() {
        let count = shoe.count(rank);
        if count == 0 {
            continue;
        }
        let probability = count as f64 / cards_left as f64;

        shoe.take(rank);
        let (next_total, next_soft) = add_card(total, soft, rank);
        let sub = draw_dealer(next_total, next_soft, shoe, rules, memo)?;
        shoe.untake(rank);

        outcomes.add_assign_with_p(&sub, probability);
    }

    memo.insert(key, outcomes);
    Ok(outcomes)
}

/// Bounded cache of dealer distributions keyed by shoe composition and
/// up-card, shared across the settlement calls of one search. Overflow
/// clears the whole cache.
#[derive(Debug)]
pub(crate) struct DealerCache {
    map: HashMap<(u128, Rank), DealerOutcomes>,
    capacity: usize,
}

impl DealerCache {
    pub(crate) fn new(capacity: usize) -> DealerCache {
        DealerCache {
            map: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn outcomes(
        &mut self,
        shoe: &Shoe,
        up: Rank,
        rules: &Rules,
    ) -> Result<DealerOutcomes, EngineError> {
        let key = (shoe.composition_key(), up);
        if let Some(outcomes) = self.map.get(&key) {
            return Ok(*outcomes);
        }
        let outcomes = dealer_outcomes(shoe, up, rules)?;
        if self.map.len() >= self.capacity {
            tracing::debug!(entries = self.map.len(), "dealer cache full, clearing");
            self.map.clear();
        }
        self.map.insert(key, outcomes);
        Ok(outcomes)
    }
}
