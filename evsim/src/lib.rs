pub mod dealer;
pub mod hand;
pub mod memo;
pub mod precompute;
pub mod rules;
mod search;
mod settle;
pub mod shoe;

use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

pub use dealer::{dealer_outcomes, DealerOutcomes, DealerResult};
pub use hand::{Hand, HandTotal};
pub use memo::{EvMemo, SearchConfig};
pub use rules::{build_rule_tag, DoubleRule, RawRules, Rules, Surrender, DEFAULT_DECKS};
pub use shoe::{Rank, Shoe};

use search::{EvSearch, PlayerState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("unknown rank symbol: {0:?}")]
    UnknownRank(String),
    #[error("no {0} left in the shoe")]
    RankExhausted(Rank),
    #[error("the shoe has no cards left to draw")]
    EmptyShoe,
    #[error("splitting requires a pair")]
    NotAPair,
}

/// A player decision. Display and parsing use the uppercase wire
/// spelling (`HIT`, `STAND`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Action {
    Hit,
    Stand,
    Double,
    Split,
    Surrender,
}

/// Per-action expectations for one starting hand. An action that is
/// not legal (or not requested) in the situation is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActionEvs {
    pub hit: Option<f64>,
    pub stand: Option<f64>,
    pub double: Option<f64>,
    pub split: Option<f64>,
    pub surrender: Option<f64>,
}

impl ActionEvs {
    /// Present actions with their values, in the fixed action order.
    pub fn entries(&self) -> impl Iterator<Item = (Action, f64)> {
        [
            (Action::Hit, self.hit),
            (Action::Stand, self.stand),
            (Action::Double, self.double),
            (Action::Split, self.split),
            (Action::Surrender, self.surrender),
        ]
        .into_iter()
        .filter_map(|(action, value)| value.map(|value| (action, value)))
    }

    /// Highest-EV action. Ties go to the earlier action in the fixed
    /// order.
    pub fn best(&self) -> Option<(Action, f64)> {
        let mut best: Option<(Action, f64)> = None;
        for (action, value) in self.entries() {
            match best {
                Some((_, current)) if value <= current => {}
                _ => best = Some((action, value)),
            }
        }
        best
    }
}

/// Where the SPLIT figure of [`compute_all_actions_ev`] comes from: a
/// fresh in-process search, a precomputed table value, or nowhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitSource {
    Compute,
    Precomputed(f64),
    Unavailable,
}

/// Expectation of every legal action for a two-card hand against a
/// dealer up-card, dealt from a fresh shoe of `rules.decks` decks with
/// the three visible cards removed.
pub fn compute_all_actions_ev(
    first: Rank,
    second: Rank,
    dealer_up: Rank,
    rules: &Rules,
    config: &SearchConfig,
    split: SplitSource,
) -> Result<ActionEvs, EngineError> {
    let mut shoe = Shoe::with_decks(rules.decks);
    shoe.remove(first)?;
    shoe.remove(second)?;
    shoe.remove(dealer_up)?;
    compute_with_shoe(shoe, first, second, dealer_up, rules, config, split)
}

pub(crate) fn compute_with_shoe(
    shoe: Shoe,
    first: Rank,
    second: Rank,
    dealer_up: Rank,
    rules: &Rules,
    config: &SearchConfig,
    split: SplitSource,
) -> Result<ActionEvs, EngineError> {
    let mut memo = EvMemo::new(config);
    let mut search = EvSearch::new(rules, dealer_up, &mut memo, config);
    let mut state = PlayerState {
        shoe,
        hands: vec![Hand::initial(first, second)],
        index: 0,
    };

    let mut evs = ActionEvs::default();
    for action in search.available_actions(&state) {
        match action {
            Action::Hit => evs.hit = Some(search.evaluate_action(&mut state, action)?),
            Action::Stand => evs.stand = Some(search.evaluate_action(&mut state, action)?),
            Action::Double => evs.double = Some(search.evaluate_action(&mut state, action)?),
            Action::Split => {
                evs.split = match split {
                    SplitSource::Compute => Some(search.evaluate_action(&mut state, action)?),
                    SplitSource::Precomputed(ev) => Some(ev),
                    SplitSource::Unavailable => None,
                };
            }
            Action::Surrender => {}
        }
    }
    if rules.surrender == Surrender::Late {
        evs.surrender = Some(search.evaluate_action(&mut state, Action::Surrender)?);
    }
    Ok(evs)
}

/// SPLIT expectation for a pair against a dealer up-card, dealt from a
/// fresh shoe. The memo is caller-owned so a precompute run can share
/// it across the up-cards of one pair rank.
pub fn compute_split_ev(
    first: Rank,
    second: Rank,
    dealer_up: Rank,
    rules: &Rules,
    config: &SearchConfig,
    memo: &mut EvMemo,
) -> Result<f64, EngineError> {
    if first != second {
        return Err(EngineError::NotAPair);
    }
    let mut shoe = Shoe::with_decks(rules.decks);
    shoe.remove(first)?;
    shoe.remove(second)?;
    shoe.remove(dealer_up)?;
    split_ev_with_shoe(shoe, first, dealer_up, rules, config, memo)
}

pub(crate) fn split_ev_with_shoe(
    shoe: Shoe,
    pair: Rank,
    dealer_up: Rank,
    rules: &Rules,
    config: &SearchConfig,
    memo: &mut EvMemo,
) -> Result<f64, EngineError> {
    let mut search = EvSearch::new(rules, dealer_up, memo, config);
    let mut state = PlayerState {
        shoe,
        hands: vec![Hand::initial(pair, pair)],
        index: 0,
    };
    search.evaluate_action(&mut state, Action::Split)
}
