use crate::simulation::{Card, Hand};

/// Number of distinct encoded states: 5 bits of total, 4 of dealer card and 3 flags.
pub const STATE_SPACE_SIZE: usize = 1 << 12;

const TOTAL_BITS: usize = 0x1F;
const DEALER_SHIFT: usize = 5;
const DEALER_BITS: usize = 0xF;
const SOFT_BIT: usize = 1 << 9;
const SPLIT_BIT: usize = 1 << 10;
const DOUBLE_BIT: usize = 1 << 11;

/// What the agent sees at a decision point. The dealer up card is 1 for an Ace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct State {
    pub player_total: u8,
    pub dealer_up_card: u8,
    pub soft: bool,
    pub can_split: bool,
    pub can_double: bool,
}

impl State {
    /// A state with neither split nor double available.
    pub fn new(player_total: u8, dealer_up_card: u8, soft: bool) -> State {
        State {
            player_total,
            dealer_up_card,
            soft,
            can_split: false,
            can_double: false,
        }
    }

    /// Post-split hands get `false` for both options, so they land in their own buckets.
    pub fn from_hand(hand: &Hand, dealer_up_card: Card, can_split: bool, can_double: bool) -> State {
        let value = hand.value();
        State {
            player_total: value.total,
            dealer_up_card: dealer_up_card.blackjack_value(),
            soft: value.soft,
            can_split,
            can_double,
        }
    }

    pub fn is_valid(&self) -> bool {
        (4..=21).contains(&self.player_total) && (1..=10).contains(&self.dealer_up_card)
    }

    /// Packs the state into `total | dealer << 5 | soft << 9 | split << 10 | double << 11`.
    /// Fields wider than their bit range are masked.
    pub fn index(&self) -> usize {
        let mut index = (self.player_total as usize & TOTAL_BITS)
            | ((self.dealer_up_card as usize & DEALER_BITS) << DEALER_SHIFT);
        if self.soft {
            index |= SOFT_BIT;
        }
        if self.can_split {
            index |= SPLIT_BIT;
        }
        if self.can_double {
            index |= DOUBLE_BIT;
        }
        index
    }

    pub fn from_index(index: usize) -> State {
        State {
            player_total: (index & TOTAL_BITS) as u8,
            dealer_up_card: ((index >> DEALER_SHIFT) & DEALER_BITS) as u8,
            soft: index & SOFT_BIT != 0,
            can_split: index & SPLIT_BIT != 0,
            can_double: index & DOUBLE_BIT != 0,
        }
    }

    /// Dealer card as 2..=11, the way strategy charts index it.
    pub fn dealer_for_chart(&self) -> u8 {
        if self.dealer_up_card == 1 {
            11
        } else {
            self.dealer_up_card
        }
    }

    pub fn dealer_label(&self) -> String {
        if self.dealer_up_card == 1 {
            String::from("A")
        } else {
            self.dealer_up_card.to_string()
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.soft { "soft" } else { "hard" };
        write!(f, "{} {} vs {}", kind, self.player_total, self.dealer_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Suit;

    #[test]
    fn encoding_round_trips_on_valid_domain() {
        let mut seen = std::collections::HashSet::new();
        for player_total in 4..=21 {
            for dealer_up_card in 1..=10 {
                for flags in 0..8u8 {
                    let state = State {
                        player_total,
                        dealer_up_card,
                        soft: flags & 1 != 0,
                        can_split: flags & 2 != 0,
                        can_double: flags & 4 != 0,
                    };
                    assert!(state.is_valid());
                    let index = state.index();
                    assert!(index < STATE_SPACE_SIZE);
                    assert_eq!(State::from_index(index), state);
                    assert!(seen.insert(index));
                }
            }
        }
    }

    #[test]
    fn bit_layout() {
        let state = State {
            player_total: 16,
            dealer_up_card: 10,
            soft: true,
            can_split: false,
            can_double: true,
        };
        assert_eq!(state.index(), 16 | (10 << 5) | (1 << 9) | (1 << 11));
        assert_eq!(State::new(20, 1, false).index(), 20 | (1 << 5));
    }

    #[test]
    fn state_from_hand_uses_ace_as_one() {
        let hand = Hand::from_cards(&[Card::new(1, Suit::Heart), Card::new(7, Suit::Club)]);
        let state = State::from_hand(&hand, Card::new(1, Suit::Spade), false, true);
        assert_eq!(state.player_total, 18);
        assert!(state.soft);
        assert_eq!(state.dealer_up_card, 1);
        assert_eq!(state.dealer_for_chart(), 11);
        assert_eq!(state.to_string(), "soft 18 vs A");
    }

    #[test]
    fn out_of_range_states_are_invalid() {
        assert!(!State::new(3, 5, false).is_valid());
        assert!(!State::new(22, 5, false).is_valid());
        assert!(!State::new(12, 0, false).is_valid());
        assert!(!State::new(12, 11, false).is_valid());
    }
}
