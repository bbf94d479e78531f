use strum::IntoEnumIterator;

use crate::dealer::DealerCache;
use crate::memo::{EvMemo, Fnv1a, SearchConfig};
use crate::rules::Surrender;
use crate::settle::settle_hands;
use crate::{Action, DoubleRule, EngineError, Hand, Rank, Rules, Shoe};

/// The player's side of the table mid-round: the undealt shoe, every
/// hand in play (1 to 4 after splits), and which hand acts next.
#[derive(Debug, Clone)]
pub(crate) struct PlayerState {
    pub shoe: Shoe,
    pub hands: Vec<Hand>,
    pub index: usize,
}

/// Optimal-play expectation search for one dealer up-card. The state
/// is mutated on the way down and restored on the way back up, so a
/// single shoe and hand vector serve the whole traversal.
pub(crate) struct EvSearch<'a> {
    rules: &'a Rules,
    dealer_up: Rank,
    memo: &'a mut EvMemo,
    dealer_cache: DealerCache,
}

impl<'a> EvSearch<'a> {
    pub(crate) fn new(
        rules: &'a Rules,
        dealer_up: Rank,
        memo: &'a mut EvMemo,
        config: &SearchConfig,
    ) -> EvSearch<'a> {
        EvSearch {
            rules,
            dealer_up,
            memo,
            dealer_cache: DealerCache::new(config.dealer_cache_capacity),
        }
    }

    /// Best achievable expectation from this state onward, over every
    /// legal action of the current and all later hands.
    pub(crate) fn best_ev(&mut self, state: &mut PlayerState) -> Result<f64, EngineError> {
        if state.index >= state.hands.len() {
            return settle_hands(
                &state.hands,
                &state.shoe,
                self.dealer_up,
                self.rules,
                &mut self.dealer_cache,
            );
        }
        let key = self.state_key(state);
        if let Some(hit) = self.memo.get(key) {
            return Ok(hit);
        }
        let value = self.best_ev_uncached(state)?;
        self.memo.insert(key, value);
        Ok(value)
    }

    fn best_ev_uncached(&mut self, state: &mut PlayerState) -> Result<f64, EngineError> {
        if state.hands[state.index].done {
            state.index += 1;
            let value = self.best_ev(state)?;
            state.index -= 1;
            return Ok(value);
        }
        if state.hands[state.index].total().value > 21 {
            // Drawing marks busts itself; this only catches arbitrary
            // starting states.
            let saved = state.hands[state.index].clone();
            state.hands[state.index].done = true;
            state.hands[state.index].bust = true;
            state.index += 1;
            let value = self.best_ev(state)?;
            state.index -= 1;
            state.hands[state.index] = saved;
            return Ok(value);
        }

        let mut best = f64::NEG_INFINITY;
        for action in self.available_actions(state) {
            let value = self.evaluate_action(state, action)?;
            if value > best {
                best = value;
            }
        }
        if let Some(value) = self.surrender_ev(&state.hands[state.index]) {
            if value > best {
                best = value;
            }
        }
        Ok(best)
    }

    /// Legal actions for the current hand. Surrender is handled apart
    /// from this list since it is an offer, not a play on the cards.
    pub(crate) fn available_actions(&self, state: &PlayerState) -> Vec<Action> {
        let hand = &state.hands[state.index];
        if hand.done || hand.total().value > 21 {
            return Vec::new();
        }
        let hands_count = state.hands.len();

        if hand.is_split_aces {
            // Split Aces receive one card and stand, unless the card
            // pairs up and re-splitting Aces is allowed.
            if hand.card_count() == 1 {
                return vec![Action::Hit];
            }
            let mut actions = Vec::new();
            if self.can_split(hand, hands_count) {
                actions.push(Action::Split);
            }
            actions.push(Action::Stand);
            return actions;
        }

        if hand.card_count() == 1 {
            return vec![Action::Hit];
        }

        let mut actions = vec![Action::Hit, Action::Stand];
        if self.can_split(hand, hands_count) {
            actions.push(Action::Split);
        }
        if self.can_double(hand) {
            actions.push(Action::Double);
        }
        actions
    }

    pub(crate) fn evaluate_action(
        &mut self,
        state: &mut PlayerState,
        action: Action,
    ) -> Result<f64, EngineError> {
        match action {
            Action::Hit => self.draw_ev(state, false),
            Action::Double => self.draw_ev(state, true),
            Action::Stand => {
                let saved_done = state.hands[state.index].done;
                state.hands[state.index].done = true;
                state.index += 1;
                let value = self.best_ev(state)?;
                state.index -= 1;
                state.hands[state.index].done = saved_done;
                Ok(value)
            }
            Action::Split => {
                let hand = &state.hands[state.index];
                let rank = hand.pair_rank().ok_or(EngineError::NotAPair)?;
                let bet = hand.bet;
                let from_aces = rank == Rank::Ace;

                let saved = state.hands[state.index].clone();
                state.hands[state.index] = Hand::split_child(rank, bet, from_aces);
                state
                    .hands
                    .insert(state.index + 1, Hand::split_child(rank, bet, from_aces));
                let value = self.best_ev(state)?;
                state.hands.remove(state.index + 1);
                state.hands[state.index] = saved;
                Ok(value)
            }
            Action::Surrender => Ok(-0.5 * state.hands[state.index].bet as f64),
        }
    }

    /// Expectation of drawing one card, either as a plain hit or as a
    /// double down that also doubles the bet and ends the hand.
    fn draw_ev(&mut self, state: &mut PlayerState, double: bool) -> Result<f64, EngineError> {
        let cards_left = state.shoe.total();
        if cards_left == 0 {
            return Err(EngineError::EmptyShoe);
        }
        let mut expected = 0.0;
        for rank in Rank::iter() {
            let count = state.shoe.count(rank);
            if count == 0 {
                continue;
            }
            let probability = count as f64 / cards_left as f64;

            state.shoe.take(rank);
            let saved = state.hands[state.index].clone();
            {
                let hand = &mut state.hands[state.index];
                hand.push_card(rank);
                let busted = hand.total().value > 21;
                if double {
                    hand.bet *= 2;
                    hand.done = true;
                    hand.bust = busted;
                } else if busted {
                    hand.done = true;
                    hand.bust = true;
                }
            }
            let finished = state.hands[state.index].done;
            if finished {
                state.index += 1;
            }
            let value = self.best_ev(state)?;
            if finished {
                state.index -= 1;
            }
            state.hands[state.index] = saved;
            state.shoe.untake(rank);

            expected += probability * value;
        }
        Ok(expected)
    }

    /// Late surrender forfeits half the bet, offered only at the very
    /// first decision of an original two-card hand.
    fn surrender_ev(&self, hand: &Hand) -> Option<f64> {
        if self.rules.surrender == Surrender::Late
            && hand.card_count() == 2
            && hand.blackjack_eligible
            && !hand.is_split_hand
        {
            Some(-0.5 * hand.bet as f64)
        } else {
            None
        }
    }

    fn can_double(&self, hand: &Hand) -> bool {
        if hand.is_split_aces || hand.card_count() != 2 {
            return false;
        }
        if hand.is_split_hand && !self.rules.double_after_split {
            return false;
        }
        let total = hand.total().value;
        match self.rules.double_rule {
            DoubleRule::AnyTwo => true,
            DoubleRule::NineTen => (9..=10).contains(&total),
            DoubleRule::NineEleven => (9..=11).contains(&total),
            DoubleRule::TenEleven => (10..=11).contains(&total),
        }
    }

    fn can_split(&self, hand: &Hand, hands_count: usize) -> bool {
        let rank = match hand.pair_rank() {
            Some(rank) => rank,
            None => return false,
        };
        if hands_count >= 4 {
            return false;
        }
        // Re-splitting Aces is a separate rule from the first split.
        !(rank == Rank::Ace && hand.is_split_aces && !self.rules.resplit_aces)
    }

    /// Canonical memo key. Sibling hands are keyed as a sorted multiset
    /// so that states differing only in hand order share an entry.
    fn state_key(&self, state: &PlayerState) -> u64 {
        let mut hasher = Fnv1a::new();
        hasher.write_u128(state.shoe.composition_key());
        hasher.write_u8(self.dealer_up as u8);
        hasher.write_u64(state.hands[state.index].key());

        let mut siblings: Vec<u64> = state
            .hands
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != state.index)
            .map(|(_, hand)| hand.key())
            .collect();
        siblings.sort_unstable();
        hasher.write_u8(siblings.len() as u8);
        for key in siblings {
            hasher.write_u64(key);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shoe_with(pairs: &[(Rank, u16)]) -> Shoe {
        let mut counts = [0u16; 10];
        for (rank, count) in pairs {
            counts[rank.index()] = *count;
        }
        Shoe::new(&counts)
    }

    fn initial_state(first: Rank, second: Rank, shoe: Shoe) -> PlayerState {
        PlayerState {
            shoe,
            hands: vec![Hand::initial(first, second)],
            index: 0,
        }
    }

    fn search_over<'a>(
        rules: &'a Rules,
        dealer_up: Rank,
        memo: &'a mut EvMemo,
    ) -> EvSearch<'a> {
        EvSearch::new(rules, dealer_up, memo, &SearchConfig::default())
    }

    #[test]
    fn rigged_shoe_gives_exact_action_values() {
        // Player 19 against up-card T with only Sixes left: the dealer
        // reaches 16 and busts with the next Six, so standing always
        // wins. Hitting busts the player, doubling busts twice the bet.
        let rules = Rules::default();
        let mut memo = EvMemo::new(&SearchConfig::default());
        let mut search = search_over(&rules, Rank::Ten, &mut memo);
        let mut state = initial_state(Rank::Ten, Rank::Nine, shoe_with(&[(Rank::Six, 3)]));

        let stand = search.evaluate_action(&mut state, Action::Stand).unwrap();
        let hit = search.evaluate_action(&mut state, Action::Hit).unwrap();
        let double = search.evaluate_action(&mut state, Action::Double).unwrap();
        assert!((stand - 1.0).abs() < 1e-12);
        assert!((hit + 1.0).abs() < 1e-12);
        assert!((double + 2.0).abs() < 1e-12);

        let best = search.best_ev(&mut state).unwrap();
        assert!((best - 1.0).abs() < 1e-12);
    }

    #[test]
    fn state_is_restored_after_a_search() {
        let rules = Rules::default();
        let mut memo = EvMemo::new(&SearchConfig::default());
        let mut search = search_over(&rules, Rank::Ten, &mut memo);
        let mut state = initial_state(Rank::Ten, Rank::Nine, shoe_with(&[(Rank::Six, 3)]));
        let snapshot = state.clone();

        search.best_ev(&mut state).unwrap();
        assert_eq!(state.shoe, snapshot.shoe);
        assert_eq!(state.hands, snapshot.hands);
        assert_eq!(state.index, snapshot.index);
    }

    #[test]
    fn splitting_aces_draws_one_card_per_hand() {
        // (A,A) vs up-card T with a shoe of {8, 8, 9}. Working the
        // three deals out by hand gives a split expectation of exactly
        // 4/3 in bet units.
        let rules = Rules::default();
        let mut memo = EvMemo::new(&SearchConfig::default());
        let mut search = search_over(&rules, Rank::Ten, &mut memo);
        let mut state = initial_state(
            Rank::Ace,
            Rank::Ace,
            shoe_with(&[(Rank::Eight, 2), (Rank::Nine, 1)]),
        );

        let split = search.evaluate_action(&mut state, Action::Split).unwrap();
        assert!((split - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn one_card_hands_are_forced_to_hit() {
        let rules = Rules::default();
        let memo = &mut EvMemo::new(&SearchConfig::default());
        let search = search_over(&rules, Rank::Ten, memo);

        let state = PlayerState {
            shoe: shoe_with(&[(Rank::Ten, 4)]),
            hands: vec![
                Hand::split_child(Rank::Eight, 1, false),
                Hand::split_child(Rank::Eight, 1, false),
            ],
            index: 0,
        };
        assert_eq!(search.available_actions(&state), vec![Action::Hit]);
    }

    #[test]
    fn split_aces_stand_after_one_card_unless_resplitting() {
        let rules = Rules::default();
        let memo = &mut EvMemo::new(&SearchConfig::default());
        let search = search_over(&rules, Rank::Ten, memo);

        let mut drew_a_five = Hand::split_child(Rank::Ace, 1, true);
        drew_a_five.push_card(Rank::Five);
        let state = PlayerState {
            shoe: shoe_with(&[(Rank::Ten, 4)]),
            hands: vec![drew_a_five, Hand::split_child(Rank::Ace, 1, true)],
            index: 0,
        };
        assert_eq!(search.available_actions(&state), vec![Action::Stand]);

        // Pairing up again offers a re-split when the rules allow it.
        let mut drew_an_ace = Hand::split_child(Rank::Ace, 1, true);
        drew_an_ace.push_card(Rank::Ace);
        let state = PlayerState {
            shoe: shoe_with(&[(Rank::Ten, 4)]),
            hands: vec![drew_an_ace, Hand::split_child(Rank::Ace, 1, true)],
            index: 0,
        };
        assert_eq!(
            search.available_actions(&state),
            vec![Action::Split, Action::Stand]
        );

        let no_resplit = Rules {
            resplit_aces: false,
            ..Rules::default()
        };
        let memo = &mut EvMemo::new(&SearchConfig::default());
        let search = search_over(&no_resplit, Rank::Ten, memo);
        assert_eq!(search.available_actions(&state), vec![Action::Stand]);
    }

    #[test]
    fn double_rule_gates_on_the_best_total() {
        let memo = &mut EvMemo::new(&SearchConfig::default());
        let nine_eleven = Rules {
            double_rule: DoubleRule::NineEleven,
            ..Rules::default()
        };
        let search = search_over(&nine_eleven, Rank::Ten, memo);

        let eleven = initial_state(Rank::Five, Rank::Six, shoe_with(&[(Rank::Ten, 4)]));
        assert!(search.available_actions(&eleven).contains(&Action::Double));

        let soft_eighteen = initial_state(Rank::Ace, Rank::Seven, shoe_with(&[(Rank::Ten, 4)]));
        assert!(!search
            .available_actions(&soft_eighteen)
            .contains(&Action::Double));

        let any_two = Rules::default();
        let memo = &mut EvMemo::new(&SearchConfig::default());
        let search = search_over(&any_two, Rank::Ten, memo);
        assert!(search
            .available_actions(&soft_eighteen)
            .contains(&Action::Double));
    }

    #[test]
    fn doubling_after_a_split_needs_das() {
        let mut split_hand = Hand::split_child(Rank::Eight, 1, false);
        split_hand.push_card(Rank::Two);
        let state = PlayerState {
            shoe: shoe_with(&[(Rank::Ten, 4)]),
            hands: vec![split_hand, Hand::split_child(Rank::Eight, 1, false)],
            index: 0,
        };

        let das = Rules::default();
        let memo = &mut EvMemo::new(&SearchConfig::default());
        let search = search_over(&das, Rank::Ten, memo);
        assert!(search.available_actions(&state).contains(&Action::Double));

        let no_das = Rules {
            double_after_split: false,
            ..Rules::default()
        };
        let memo = &mut EvMemo::new(&SearchConfig::default());
        let search = search_over(&no_das, Rank::Ten, memo);
        assert!(!search.available_actions(&state).contains(&Action::Double));
    }

    #[test]
    fn late_surrender_caps_a_hopeless_hand_at_minus_half() {
        // Player 16 against up-card T with only Tens left: standing
        // loses to a dealer 20 and hitting busts, so both are -1.
        let late = Rules {
            surrender: Surrender::Late,
            ..Rules::default()
        };
        let mut memo = EvMemo::new(&SearchConfig::default());
        let mut search = search_over(&late, Rank::Ten, &mut memo);
        let mut state = initial_state(Rank::Ten, Rank::Six, shoe_with(&[(Rank::Ten, 3)]));
        let best = search.best_ev(&mut state).unwrap();
        assert!((best + 0.5).abs() < 1e-12);

        // Without the offer the same spot is a full loss.
        let none = Rules::default();
        let mut memo = EvMemo::new(&SearchConfig::default());
        let mut search = search_over(&none, Rank::Ten, &mut memo);
        let best = search.best_ev(&mut state).unwrap();
        assert!((best + 1.0).abs() < 1e-12);
    }

    #[test]
    fn sibling_hand_order_does_not_change_the_memo_key() {
        let rules = Rules::default();
        let memo = &mut EvMemo::new(&SearchConfig::default());
        let search = search_over(&rules, Rank::Ten, memo);

        let mut first = Hand::split_child(Rank::Eight, 1, false);
        first.push_card(Rank::Ten);
        first.done = true;
        let mut second = Hand::split_child(Rank::Eight, 1, false);
        second.push_card(Rank::Two);
        second.done = true;
        let current = Hand::split_child(Rank::Eight, 1, false);

        let shoe = shoe_with(&[(Rank::Five, 4)]);
        let forward = PlayerState {
            shoe: shoe.clone(),
            hands: vec![first.clone(), second.clone(), current.clone()],
            index: 2,
        };
        let swapped = PlayerState {
            shoe,
            hands: vec![second, first, current],
            index: 2,
        };
        assert_eq!(search.state_key(&forward), search.state_key(&swapped));
    }
}
