use crate::RoundError;

use super::Card;

/// Total of a hand, with whether an Ace is still counted as 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandValue {
    pub total: u8,
    pub soft: bool,
}

/// Represents the cards of one player hand or of the dealer, in the order they were received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn new() -> Hand {
        Hand {
            cards: Vec::with_capacity(4),
        }
    }

    pub fn from_cards(cards: &[Card]) -> Hand {
        Hand {
            cards: cards.to_vec(),
        }
    }

    pub fn add_card(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }

    /// Counts every Ace as 11 first, then turns them into 1 one by one while the total is above 21.
    pub fn value(&self) -> HandValue {
        let mut total: u8 = 0;
        let mut aces_as_eleven = 0;
        for card in &self.cards {
            if card.is_ace() {
                aces_as_eleven += 1;
                total += 11;
            } else {
                total += card.blackjack_value();
            }
        }
        while total > 21 && aces_as_eleven > 0 {
            total -= 10;
            aces_as_eleven -= 1;
        }
        HandValue {
            total,
            soft: aces_as_eleven > 0 && total <= 21,
        }
    }

    pub fn total(&self) -> u8 {
        self.value().total
    }

    pub fn is_soft(&self) -> bool {
        self.value().soft
    }

    pub fn is_blackjack(&self) -> bool {
        self.cards.len() == 2 && self.total() == 21
    }

    pub fn is_bust(&self) -> bool {
        self.total() > 21
    }

    /// Two cards of the same rank. A Jack and a Queen are not a pair.
    pub fn can_split(&self) -> bool {
        self.cards.len() == 2 && self.cards[0].face_value == self.cards[1].face_value
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Removes and returns the second card of a pair, leaving the first one.
    pub fn split(&mut self) -> Result<Card, RoundError> {
        if !self.can_split() {
            return Err(RoundError::NotSplittable);
        }
        self.cards.pop().ok_or(RoundError::NotSplittable)
    }
}

impl std::fmt::Display for Hand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cards.is_empty() {
            return write!(f, "Empty hand");
        }
        let cards: Vec<String> = self.cards.iter().map(|c| c.to_string()).collect();
        let value = self.value();
        write!(f, "[{}] = {}", cards.join(", "), value.total)?;
        if value.soft {
            write!(f, " (soft)")?;
        }
        if self.is_blackjack() {
            write!(f, " BLACKJACK!")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::simulation::Suit;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn card(face_value: u8) -> Card {
        Card {
            face_value,
            suit: Suit::Spade,
        }
    }

    #[test]
    fn soft_ace_becomes_hard() {
        let mut hand = Hand::from_cards(&[card(1), card(6)]);
        assert_eq!(hand.value(), HandValue { total: 17, soft: true });
        hand.add_card(card(9));
        assert_eq!(hand.value(), HandValue { total: 16, soft: false });
    }

    #[test]
    fn two_aces_are_soft_twelve() {
        let hand = Hand::from_cards(&[card(1), card(1)]);
        assert_eq!(hand.value(), HandValue { total: 12, soft: true });
        assert!(hand.can_split());
    }

    #[test]
    fn blackjack_needs_exactly_two_cards() {
        let natural = Hand::from_cards(&[card(1), card(13)]);
        assert!(natural.is_blackjack());
        let three_card_21 = Hand::from_cards(&[card(7), card(7), card(7)]);
        assert_eq!(three_card_21.total(), 21);
        assert!(!three_card_21.is_blackjack());
    }

    #[test]
    fn face_cards_of_different_rank_cannot_split() {
        let hand = Hand::from_cards(&[card(11), card(12)]);
        assert_eq!(hand.total(), 20);
        assert!(!hand.can_split());
        let mut kings = Hand::from_cards(&[card(13), card(13)]);
        assert!(kings.can_split());
        assert_eq!(kings.split().unwrap(), card(13));
        assert_eq!(kings.len(), 1);
    }

    #[test]
    fn should_split_successfully() {
        let first = Card {
            face_value: 8,
            suit: Suit::Diamond,
        };
        let second = Card {
            face_value: 8,
            suit: Suit::Club,
        };
        let mut hand = Hand::from_cards(&[first, second]);
        assert_eq!(hand.split().unwrap(), second);
        assert_eq!(hand.cards(), &[first]);
        assert!(matches!(hand.split(), Err(RoundError::NotSplittable)));
    }

    #[test]
    fn value_invariants_hold_for_random_hands() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let mut hand = Hand::new();
            let mut hard_sum: u32 = 0;
            for _ in 0..rng.gen_range(1..8) {
                let c = card(rng.gen_range(1..=13));
                hard_sum += c.blackjack_value() as u32;
                hand.add_card(c);

                let value = hand.value();
                let has_ace = hand.cards().iter().any(|c| c.is_ace());
                if value.soft {
                    assert!(value.total <= 21);
                    assert_eq!(value.total as u32, hard_sum + 10);
                } else {
                    assert_eq!(value.total as u32, hard_sum);
                    assert!(!has_ace || hard_sum + 10 > 21);
                }
                assert_eq!(hand.is_bust(), value.total > 21);
                if hand.is_blackjack() {
                    assert_eq!(hand.len(), 2);
                    assert_eq!(value.total, 21);
                }
            }
        }
    }
}
