use crate::dealer::{DealerCache, DealerResult};
use crate::{EngineError, Hand, Rank, Rules, Shoe};

/// Payoff for one hand against one dealer result, in bet units.
fn hand_payoff(hand: &Hand, result: DealerResult) -> f64 {
    let bet = hand.bet as f64;
    if hand.bust {
        return -bet;
    }
    if result == DealerResult::Blackjack {
        // A natural pushes against a dealer blackjack; everything else
        // loses.
        return if hand.is_natural() { 0.0 } else { -bet };
    }
    if hand.is_natural() {
        // 3:2 bonus, even against a dealer 21 made with three or more
        // cards.
        return 1.5 * bet;
    }
    let player = hand.total().value;
    match result.total() {
        None => bet, // dealer bust
        Some(dealer) => {
            if player > dealer {
                bet
            } else if player < dealer {
                -bet
            } else {
                0.0
            }
        }
    }
}

/// Expected total payoff of a finished set of hands: the dealer plays
/// out the remaining shoe and every hand is settled against each
/// terminal result, weighted by its probability.
///
/// When every hand has busted the dealer never draws, so the payoff is
/// settled directly.
pub(crate) fn settle_hands(
    hands: &[Hand],
    shoe: &Shoe,
    up: Rank,
    rules: &Rules,
    cache: &mut DealerCache,
) -> Result<f64, EngineError> {
    if hands.iter().all(|hand| hand.bust) {
        return Ok(hands.iter().map(|hand| -(hand.bet as f64)).sum());
    }

    let outcomes = cache.outcomes(shoe, up, rules)?;
    let mut ev = 0.0;
    for (result, probability) in outcomes.entries() {
        if probability == 0.0 {
            continue;
        }
        let payoff: f64 = hands.iter().map(|hand| hand_payoff(hand, result)).sum();
        ev += probability * payoff;
    }
    Ok(ev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SearchConfig;

    fn cache() -> DealerCache {
        DealerCache::new(SearchConfig::default().dealer_cache_capacity)
    }

    fn shoe_with(pairs: &[(Rank, u16)]) -> Shoe {
        let mut counts = [0u16; 10];
        for (rank, count) in pairs {
            counts[rank.index()] = *count;
        }
        Shoe::new(&counts)
    }

    #[test]
    fn busted_hands_lose_without_drawing_the_dealer() {
        let mut hand = Hand::initial(Rank::Ten, Rank::Six);
        hand.push_card(Rank::Ten);
        hand.bust = true;
        hand.done = true;

        // The shoe is empty; settlement must not need a dealer draw.
        let shoe = shoe_with(&[]);
        let ev = settle_hands(&[hand], &shoe, Rank::Ten, &Rules::default(), &mut cache()).unwrap();
        assert_eq!(ev, -1.0);
    }

    #[test]
    fn doubled_bets_scale_the_payoff() {
        let mut hand = Hand::initial(Rank::Ten, Rank::Six);
        hand.push_card(Rank::Ten);
        hand.bust = true;
        hand.done = true;
        hand.bet = 2;

        let shoe = shoe_with(&[]);
        let ev = settle_hands(&[hand], &shoe, Rank::Ten, &Rules::default(), &mut cache()).unwrap();
        assert_eq!(ev, -2.0);
    }

    #[test]
    fn nineteen_against_half_blackjack_half_seventeen_is_even() {
        // Dealer up T with shoe {A, 7}: blackjack and 17, each at 1/2.
        // A standing 19 loses one and wins the other.
        let mut hand = Hand::initial(Rank::Ten, Rank::Nine);
        hand.done = true;

        let shoe = shoe_with(&[(Rank::Ace, 1), (Rank::Seven, 1)]);
        let ev = settle_hands(
            std::slice::from_ref(&hand),
            &shoe,
            Rank::Ten,
            &Rules::default(),
            &mut cache(),
        )
        .unwrap();
        assert!(ev.abs() < 1e-12);

        // Peek removes the blackjack branch: the 19 always wins.
        let peek = Rules {
            peek: true,
            ..Rules::default()
        };
        let ev = settle_hands(&[hand], &shoe, Rank::Ten, &peek, &mut cache()).unwrap();
        assert!((ev - 1.0).abs() < 1e-12);
    }

    #[test]
    fn a_natural_pays_three_to_two_against_any_non_blackjack() {
        // Up-card 9 cannot make a dealer blackjack, so the natural pays
        // exactly 1.5 whatever the dealer draws.
        let mut hand = Hand::initial(Rank::Ace, Rank::Ten);
        hand.done = true;

        let mut shoe = Shoe::with_decks(6);
        shoe.remove(Rank::Ace).unwrap();
        shoe.remove(Rank::Ten).unwrap();
        shoe.remove(Rank::Nine).unwrap();

        let ev = settle_hands(&[hand], &shoe, Rank::Nine, &Rules::default(), &mut cache()).unwrap();
        assert!((ev - 1.5).abs() < 1e-12);
    }

    #[test]
    fn a_natural_pushes_against_a_dealer_blackjack() {
        // Dealer up T with only Aces left: the hole card is always an
        // Ace, so the dealer has blackjack with certainty.
        let mut hand = Hand::initial(Rank::Ace, Rank::Ten);
        hand.done = true;

        let shoe = shoe_with(&[(Rank::Ace, 2)]);
        let ev = settle_hands(
            std::slice::from_ref(&hand),
            &shoe,
            Rank::Ten,
            &Rules::default(),
            &mut cache(),
        )
        .unwrap();
        assert_eq!(ev, 0.0);

        // A drawn 21 is not a natural and loses outright.
        let mut drawn = Hand::initial(Rank::Five, Rank::Six);
        drawn.push_card(Rank::Ten);
        drawn.done = true;
        let ev = settle_hands(&[drawn], &shoe, Rank::Ten, &Rules::default(), &mut cache()).unwrap();
        assert_eq!(ev, -1.0);
    }

    #[test]
    fn split_twenty_one_wins_as_a_plain_twenty_one() {
        // A split Ace that draws a T totals 21 but is not a natural:
        // it beats a dealer 20 by exactly one bet, not 1.5.
        let mut hand = Hand::split_child(Rank::Ace, 1, true);
        hand.push_card(Rank::Ten);
        hand.done = true;

        // Dealer up T, shoe of a single T: dealer always stands on 20.
        let shoe = shoe_with(&[(Rank::Ten, 1)]);
        let ev = settle_hands(&[hand], &shoe, Rank::Ten, &Rules::default(), &mut cache()).unwrap();
        assert!((ev - 1.0).abs() < 1e-12);
    }
}
