use super::{Card, Suit};

use strum::IntoEnumIterator;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Represents a shoe in the real world: several decks shuffled together and a
/// cursor pointing at the next card to deal.
#[derive(Debug, Clone)]
pub struct Shoe {
    number_of_decks: u8,
    cards: Vec<Card>,
    current_index: usize,
    rng: StdRng,
}

impl Shoe {
    /// Creates a new shoe with ordered cards. Call `shuffle` before dealing.
    /// Panics if `number_of_decks` is 0.
    ///
    /// A given seed makes every shuffle of this shoe reproducible.
    pub fn new(number_of_decks: u8, seed: Option<u64>) -> Shoe {
        if number_of_decks == 0 {
            panic!("A shoe needs at least one deck!");
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Shoe {
            number_of_decks,
            cards: ordered_cards(number_of_decks),
            current_index: 0,
            rng,
        }
    }

    /// Returns the dealt cards back into the shoe, and shuffles. This method makes sure the given first few cards
    /// will be at the frontmost positions of the shoe. Panics if requirement cannot be met.
    /// Note that the cards are given in blackjack values (i.e., 1 stands for A. 10 stands for 10 and J, Q, K).
    pub fn shuffle_with_firsts(&mut self, firsts: &[u8]) {
        let mut counts = [self.number_of_decks; 52];
        self.current_index = 0;

        let mut idx = 0;
        for blackjack_value in firsts {
            let card_integer = find_suitable_card(&counts, *blackjack_value)
                .expect("The given first cards are invalid");
            counts[card_integer as usize] -= 1;
            self.cards[idx] = Card::try_from(card_integer).expect("card index is below 52");
            idx += 1;
        }

        for suit in Suit::iter() {
            for face_value in 1..=13 {
                let card = Card { face_value, suit };
                let card_integer: u8 = card.into();
                for _ in 0..counts[card_integer as usize] {
                    self.cards[idx] = card;
                    idx += 1;
                }
            }
        }

        self.cards[firsts.len()..].shuffle(&mut self.rng);
    }

    /// Returns the dealt cards back into the shoe and shuffles (Fisher-Yates).
    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut self.rng);
        self.current_index = 0;
    }

    /// Rebuilds the ordered shoe and shuffles it.
    pub fn reset(&mut self) {
        self.cards = ordered_cards(self.number_of_decks);
        self.shuffle();
    }

    /// Deals a card if the shoe is not empty. Returns None if empty.
    pub fn deal_card(&mut self) -> Option<Card> {
        let card = self.cards.get(self.current_index).copied()?;
        self.current_index += 1;
        Some(card)
    }

    /// Checks if the given fraction of the shoe has been dealt.
    pub fn needs_reshuffle(&self, penetration: f64) -> bool {
        let threshold = (self.cards.len() as f64 * penetration) as usize;
        self.current_index >= threshold
    }

    pub fn cards_remaining(&self) -> usize {
        self.cards.len() - self.current_index
    }

    pub fn total_cards(&self) -> usize {
        self.cards.len()
    }

    pub fn number_of_decks(&self) -> u8 {
        self.number_of_decks
    }
}

fn ordered_cards(number_of_decks: u8) -> Vec<Card> {
    let mut cards = Vec::with_capacity(number_of_decks as usize * 52);
    for _ in 0..number_of_decks {
        for suit in Suit::iter() {
            for face_value in 1..=13 {
                cards.push(Card { face_value, suit });
            }
        }
    }
    cards
}

fn find_suitable_card(counts: &[u8; 52], blackjack_value: u8) -> Option<u8> {
    let (lo, hi) = {
        if blackjack_value == 10 {
            (10, 13)
        } else {
            (blackjack_value, blackjack_value)
        }
    };

    for face_value in lo..=hi {
        for suit in Suit::iter() {
            let card: u8 = Card { face_value, suit }.into();
            if counts[card as usize] > 0 {
                return Some(card);
            }
        }
    }

    None
}
