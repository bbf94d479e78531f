use crate::memo::Fnv1a;
use crate::Rank;

/// A hand's resolved total. `soft` means an Ace is still counted as 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandTotal {
    pub value: u16,
    pub soft: bool,
}

/// One player hand. Hands are value objects: the total, pair-ness and
/// blackjack-ness are always derived from the cards, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    cards: Vec<Rank>,
    /// Bet multiplier: 1 normally, 2 after a double down.
    pub bet: u16,
    /// This hand came from splitting a pair of Aces.
    pub is_split_aces: bool,
    /// This hand came from any split, which disqualifies the natural
    /// blackjack bonus.
    pub is_split_hand: bool,
    /// Cleared as soon as a card is drawn beyond the original two.
    pub blackjack_eligible: bool,
    pub done: bool,
    pub bust: bool,
}

impl Hand {
    /// The original two-card hand dealt to the player.
    pub fn initial(first: Rank, second: Rank) -> Hand {
        Hand {
            cards: vec![first, second],
            bet: 1,
            is_split_aces: false,
            is_split_hand: false,
            blackjack_eligible: true,
            done: false,
            bust: false,
        }
    }

    /// A one-card hand created by splitting a pair.
    pub fn split_child(rank: Rank, bet: u16, from_aces: bool) -> Hand {
        Hand {
            cards: vec![rank],
            bet,
            is_split_aces: from_aces,
            is_split_hand: true,
            blackjack_eligible: false,
            done: false,
            bust: false,
        }
    }

    pub fn cards(&self) -> &[Rank] {
        &self.cards
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    pub fn push_card(&mut self, rank: Rank) {
        self.cards.push(rank);
        self.blackjack_eligible = false;
    }

    /// Best total with soft/hard Ace resolution: Aces count as 11,
    /// demoting one at a time while the total is over 21.
    pub fn total(&self) -> HandTotal {
        let mut value: u16 = 0;
        let mut aces: u16 = 0;
        for card in &self.cards {
            if *card == Rank::Ace {
                aces += 1;
                value += 11;
            } else {
                value += card.low_value();
            }
        }
        while value > 21 && aces > 0 {
            value -= 10;
            aces -= 1;
        }
        HandTotal {
            value,
            soft: aces > 0,
        }
    }

    /// Exactly two cards of equal rank.
    pub fn is_pair(&self) -> bool {
        self.cards.len() == 2 && self.cards[0] == self.cards[1]
    }

    pub fn pair_rank(&self) -> Option<Rank> {
        if self.is_pair() {
            Some(self.cards[0])
        } else {
            None
        }
    }

    /// An Ace and a ten-valued card as the only two cards. Whether this
    /// pays as a natural additionally depends on the hand flags; see
    /// [`Hand::is_natural`].
    pub fn is_blackjack(&self) -> bool {
        self.cards.len() == 2
            && self.cards.contains(&Rank::Ace)
            && self.cards.contains(&Rank::Ten)
    }

    /// True when this hand qualifies for the 3:2 natural payout.
    pub fn is_natural(&self) -> bool {
        self.blackjack_eligible && !self.is_split_hand && self.is_blackjack()
    }

    /// Derived memo key: hands agreeing on every field that can affect
    /// future play share a key even when their exact cards differ.
    pub(crate) fn key(&self) -> u64 {
        let total = self.total();
        let mut hasher = Fnv1a::new();
        hasher.write_u16(total.value);
        hasher.write_u8(total.soft as u8);
        hasher.write_u8(self.cards.len() as u8);
        hasher.write_u8(self.pair_rank().map_or(0xff, |rank| rank as u8));
        hasher.write_u16(self.bet);
        hasher.write_u8(
            (self.is_split_aces as u8)
                | (self.is_split_hand as u8) << 1
                | (self.blackjack_eligible as u8) << 2
                | (self.done as u8) << 3
                | (self.bust as u8) << 4,
        );
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ace_counts_as_eleven_until_it_busts() {
        let hand = Hand::initial(Rank::Ace, Rank::Six);
        assert_eq!(
            hand.total(),
            HandTotal {
                value: 17,
                soft: true
            }
        );

        let mut hand = hand;
        hand.push_card(Rank::Ten);
        assert_eq!(
            hand.total(),
            HandTotal {
                value: 17,
                soft: false
            }
        );
    }

    #[test]
    fn a_pair_of_aces_is_a_soft_twelve() {
        let hand = Hand::initial(Rank::Ace, Rank::Ace);
        assert_eq!(
            hand.total(),
            HandTotal {
                value: 12,
                soft: true
            }
        );
        assert!(hand.is_pair());
    }

    #[test]
    fn two_card_twenty_one_is_blackjack_but_three_card_is_not() {
        let natural = Hand::initial(Rank::Ten, Rank::Ace);
        assert!(natural.is_blackjack());
        assert!(natural.is_natural());

        let mut sevens = Hand::initial(Rank::Seven, Rank::Seven);
        sevens.push_card(Rank::Seven);
        assert_eq!(sevens.total().value, 21);
        assert!(!sevens.is_blackjack());
        assert!(!sevens.is_natural());
    }

    #[test]
    fn split_hands_never_pay_as_naturals() {
        let mut hand = Hand::split_child(Rank::Ace, 1, true);
        hand.push_card(Rank::Ten);
        assert_eq!(hand.total().value, 21);
        assert!(hand.is_blackjack());
        assert!(!hand.is_natural());
    }

    #[test]
    fn drawing_a_card_disqualifies_the_natural_bonus() {
        let mut hand = Hand::initial(Rank::Five, Rank::Six);
        assert!(hand.blackjack_eligible);
        hand.push_card(Rank::Ten);
        assert!(!hand.blackjack_eligible);
        assert_eq!(hand.total().value, 21);
    }

    #[test]
    fn derived_keys_ignore_card_identity_but_not_flags() {
        // 9+8 and 7+10 share total/count/flags, so they share a key.
        let first = Hand::initial(Rank::Nine, Rank::Eight);
        let second = Hand::initial(Rank::Seven, Rank::Ten);
        assert_eq!(first.key(), second.key());

        let mut done = first.clone();
        done.done = true;
        assert_ne!(first.key(), done.key());

        let pair = Hand::initial(Rank::Eight, Rank::Eight);
        let sixteen = Hand::initial(Rank::Ten, Rank::Six);
        assert_ne!(pair.key(), sixteen.key());
    }
}
