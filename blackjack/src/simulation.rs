pub mod hand;
pub mod shoe;

use crate::{state::State, Action, RoundError, Rule};
use blackjack_macros::allowed_phase;
use strum_macros::EnumIter;

pub use self::{
    hand::{Hand, HandValue},
    shoe::Shoe,
};

static FACE_VALUE_TO_BLACKJACK_VALUE: [u8; 13] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 10, 10, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Suit {
    Diamond = 0,
    Club,
    Heart,
    Spade,
}

/// Represents a card in the real world with a suit and a face value
/// (1 for Ace, 11 to 13 for Jack, Queen and King).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Card {
    pub face_value: u8,
    pub suit: Suit,
}

impl Card {
    pub fn new(face_value: u8, suit: Suit) -> Card {
        if face_value == 0 || face_value > 13 {
            panic!("Invalid card face value! It must be in [1, 13]");
        }
        Card { face_value, suit }
    }

    /// Ace is 1 here; the hand decides whether it counts as 11.
    pub fn blackjack_value(&self) -> u8 {
        FACE_VALUE_TO_BLACKJACK_VALUE[(self.face_value - 1) as usize]
    }

    pub fn is_ace(&self) -> bool {
        self.face_value == 1
    }
}

impl Default for Card {
    fn default() -> Self {
        Card {
            face_value: 1,
            suit: Suit::Diamond,
        }
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let suit = match self.suit {
            Suit::Diamond => '♦',
            Suit::Club => '♣',
            Suit::Heart => '♥',
            Suit::Spade => '♠',
        };
        let value = match self.face_value {
            1 => "A",
            2 => "2",
            3 => "3",
            4 => "4",
            5 => "5",
            6 => "6",
            7 => "7",
            8 => "8",
            9 => "9",
            10 => "10",
            11 => "J",
            12 => "Q",
            13 => "K",
            _ => "?",
        };
        write!(f, "{}{}", value, suit)
    }
}

impl From<Card> for u8 {
    fn from(card: Card) -> u8 {
        card.suit as u8 * 13 + card.face_value - 1
    }
}

impl TryFrom<u8> for Card {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value >= 52 {
            return Err(());
        }
        let suit = match value / 13 {
            0 => Suit::Diamond,
            1 => Suit::Club,
            2 => Suit::Heart,
            _ => Suit::Spade,
        };
        Ok(Card {
            suit,
            face_value: value % 13 + 1,
        })
    }
}

/// How a single player hand ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Outcome {
    PlayerWin,
    PlayerBlackjack,
    DealerWin,
    Push,
    PlayerBust,
    DealerBust,
    Surrender,
}

impl Outcome {
    /// Payoff in units of the original bet; a doubled hand pays twice.
    pub fn reward(self, doubled: bool) -> f64 {
        let base = match self {
            Outcome::PlayerBlackjack => 1.5,
            Outcome::PlayerWin | Outcome::DealerBust => 1.0,
            Outcome::Push => 0.0,
            Outcome::DealerWin | Outcome::PlayerBust => -1.0,
            Outcome::Surrender => -0.5,
        };
        if doubled {
            base * 2.0
        } else {
            base
        }
    }

    pub fn is_win(self) -> bool {
        matches!(
            self,
            Outcome::PlayerWin | Outcome::PlayerBlackjack | Outcome::DealerBust
        )
    }

    pub fn is_push(self) -> bool {
        self == Outcome::Push
    }

    /// Surrender counts as a loss.
    pub fn is_loss(self) -> bool {
        !self.is_win() && !self.is_push()
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Outcome::PlayerWin => "Player Win",
            Outcome::PlayerBlackjack => "Player Blackjack",
            Outcome::DealerWin => "Dealer Win",
            Outcome::Push => "Push",
            Outcome::PlayerBust => "Player Bust",
            Outcome::DealerBust => "Dealer Bust",
            Outcome::Surrender => "Surrender",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Idle,
    Playing,
    Complete,
}

impl std::fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RoundPhase::Idle => "Idle",
            RoundPhase::Playing => "Playing",
            RoundPhase::Complete => "Complete",
        };
        write!(f, "{}", text)
    }
}

/// Where the round is. Outcomes only exist once the round is complete.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundStatus {
    Idle,
    InProgress { hand_index: usize },
    Complete(Vec<Outcome>),
}

/// Plays one seat against the dealer, one round at a time. The same `Round` is
/// reused for every round; `start_round` clears the previous one.
///
/// Double after split and resplit are not offered.
#[derive(Debug, Clone)]
pub struct Round {
    rule: Rule,
    shoe: Shoe,

    player_hands: Vec<Hand>,
    doubled: Vec<bool>,
    dealer_hand: Hand,
    split_used: bool,
    status: RoundStatus,
}

impl Round {
    pub fn new(rule: &Rule, seed: Option<u64>) -> Self {
        let mut shoe = Shoe::new(rule.number_of_decks, seed);
        shoe.shuffle();
        Self::with_shoe(rule, shoe)
    }

    /// Uses a prepared shoe as is, e.g. one stacked with `Shoe::shuffle_with_firsts`.
    pub fn with_shoe(rule: &Rule, shoe: Shoe) -> Self {
        Self {
            rule: *rule,
            shoe,
            player_hands: vec![Hand::new()],
            doubled: vec![false],
            dealer_hand: Hand::new(),
            split_used: false,
            status: RoundStatus::Idle,
        }
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn shoe_mut(&mut self) -> &mut Shoe {
        &mut self.shoe
    }

    /// Reshuffles if the cut point was reached, then deals player, dealer,
    /// player, dealer. A natural on either side completes the round at once.
    pub fn start_round(&mut self) -> Result<(), RoundError> {
        if self.shoe.needs_reshuffle(self.rule.penetration) {
            log::debug!("penetration reached, reshuffling the shoe");
            self.shoe.reset();
        }

        self.player_hands.clear();
        self.player_hands.push(Hand::new());
        self.doubled.clear();
        self.doubled.push(false);
        self.dealer_hand.clear();
        self.split_used = false;

        for _ in 0..2 {
            let card = self.draw()?;
            self.player_hands[0].add_card(card);
            let card = self.draw()?;
            self.dealer_hand.add_card(card);
        }

        self.status = RoundStatus::InProgress { hand_index: 0 };
        if self.player_hands[0].is_blackjack() || self.dealer_hand.is_blackjack() {
            let outcome = self.determine_outcome(&self.player_hands[0]);
            self.status = RoundStatus::Complete(vec![outcome]);
        }
        Ok(())
    }

    /// Adds one card to the current hand. A bust moves on to the next hand, or
    /// finishes the round after the last one.
    #[allowed_phase(Playing)]
    pub fn hit(&mut self) -> Result<(), RoundError> {
        let card = self.draw()?;
        let index = self.current_hand_index();
        self.player_hands[index].add_card(card);
        if self.player_hands[index].is_bust() {
            self.advance_or_finish()?;
        }
        Ok(())
    }

    #[allowed_phase(Playing)]
    pub fn stand(&mut self) -> Result<(), RoundError> {
        self.advance_or_finish()
    }

    /// Doubles the bet of the current hand, which gets exactly one more card.
    #[allowed_phase(Playing)]
    pub fn double_down(&mut self) -> Result<(), RoundError> {
        if !self.can_double_down() {
            return Err(RoundError::NotAllowed(Action::Double));
        }
        let card = self.draw()?;
        let index = self.current_hand_index();
        self.doubled[index] = true;
        self.player_hands[index].add_card(card);
        self.advance_or_finish()
    }

    /// Splits the initial pair into two hands, each getting one fresh card.
    /// Play continues on the first hand.
    #[allowed_phase(Playing)]
    pub fn split(&mut self) -> Result<(), RoundError> {
        if !self.can_split() {
            return Err(RoundError::NotAllowed(Action::Split));
        }
        let second_card = self.player_hands[0].split()?;

        let mut second_hand = Hand::new();
        second_hand.add_card(second_card);
        let card = self.draw()?;
        second_hand.add_card(card);
        let card = self.draw()?;
        self.player_hands[0].add_card(card);

        self.player_hands.push(second_hand);
        self.doubled.push(false);
        self.split_used = true;
        self.status = RoundStatus::InProgress { hand_index: 0 };
        Ok(())
    }

    /// Gives up half the bet. The dealer does not play.
    #[allowed_phase(Playing)]
    pub fn surrender(&mut self) -> Result<(), RoundError> {
        if !self.can_surrender() {
            return Err(RoundError::NotAllowed(Action::Surrender));
        }
        self.status = RoundStatus::Complete(vec![Outcome::Surrender]);
        Ok(())
    }

    /// Applies any action. A DOUBLE that is not allowed is played as a HIT.
    pub fn apply(&mut self, action: Action) -> Result<(), RoundError> {
        match action {
            Action::Hit => self.hit(),
            Action::Stand => self.stand(),
            Action::Double if !self.can_double_down() => {
                log::debug!("double is not allowed here, hitting instead");
                self.hit()
            }
            Action::Double => self.double_down(),
            Action::Split => self.split(),
            Action::Surrender => self.surrender(),
        }
    }

    pub fn can_double_down(&self) -> bool {
        let RoundStatus::InProgress { hand_index } = self.status else {
            return false;
        };
        if self.player_hands[hand_index].len() != 2 {
            return false;
        }
        !(self.split_used && self.player_hands.len() > 1)
    }

    pub fn can_split(&self) -> bool {
        if self.phase() != RoundPhase::Playing || self.split_used {
            return false;
        }
        self.player_hands.len() == 1 && self.player_hands[0].can_split()
    }

    pub fn can_surrender(&self) -> bool {
        if self.phase() != RoundPhase::Playing || !self.rule.allow_late_surrender {
            return false;
        }
        self.player_hands.len() == 1 && self.player_hands[0].len() == 2
    }

    /// Actions the current hand may take, in action-index order.
    pub fn valid_actions(&self) -> Vec<Action> {
        if self.phase() != RoundPhase::Playing {
            return Vec::new();
        }
        let mut actions = vec![Action::Hit, Action::Stand];
        if self.can_double_down() {
            actions.push(Action::Double);
        }
        if self.can_split() {
            actions.push(Action::Split);
        }
        if self.can_surrender() {
            actions.push(Action::Surrender);
        }
        actions
    }

    /// Learning state of the current hand against the dealer up card.
    pub fn state(&self) -> State {
        State::from_hand(
            self.player_hand(),
            self.dealer_up_card(),
            self.can_split(),
            self.can_double_down(),
        )
    }

    pub fn phase(&self) -> RoundPhase {
        match self.status {
            RoundStatus::Idle => RoundPhase::Idle,
            RoundStatus::InProgress { .. } => RoundPhase::Playing,
            RoundStatus::Complete(_) => RoundPhase::Complete,
        }
    }

    pub fn status(&self) -> &RoundStatus {
        &self.status
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, RoundStatus::Complete(_))
    }

    /// One outcome per player hand.
    pub fn outcomes(&self) -> Result<&[Outcome], RoundError> {
        match &self.status {
            RoundStatus::Complete(outcomes) => Ok(outcomes),
            _ => Err(RoundError::NotComplete),
        }
    }

    /// Outcome of the first hand.
    pub fn outcome(&self) -> Result<Outcome, RoundError> {
        self.outcomes()?
            .first()
            .copied()
            .ok_or(RoundError::NotComplete)
    }

    /// The hand being played. Once the round is complete, the last hand played.
    pub fn player_hand(&self) -> &Hand {
        &self.player_hands[self.current_hand_index()]
    }

    pub fn player_hands(&self) -> &[Hand] {
        &self.player_hands
    }

    pub fn current_hand_index(&self) -> usize {
        match self.status {
            RoundStatus::InProgress { hand_index } => hand_index,
            _ => self.player_hands.len() - 1,
        }
    }

    pub fn doubled(&self) -> &[bool] {
        &self.doubled
    }

    pub fn split_used(&self) -> bool {
        self.split_used
    }

    pub fn dealer_hand(&self) -> &Hand {
        &self.dealer_hand
    }

    /// Dealer hand as the player sees it: only the up card while the round is being played.
    pub fn visible_dealer_hand(&self) -> Hand {
        if self.phase() == RoundPhase::Playing && self.dealer_hand.len() >= 2 {
            Hand::from_cards(&self.dealer_hand.cards()[..1])
        } else {
            self.dealer_hand.clone()
        }
    }

    pub fn dealer_up_card(&self) -> Card {
        self.dealer_hand.cards().first().copied().unwrap_or_default()
    }

    /// Rebuilds the shoe and forgets the current round.
    pub fn reset(&mut self) {
        self.shoe.reset();
        self.player_hands.clear();
        self.player_hands.push(Hand::new());
        self.doubled.clear();
        self.doubled.push(false);
        self.dealer_hand.clear();
        self.split_used = false;
        self.status = RoundStatus::Idle;
    }

    fn draw(&mut self) -> Result<Card, RoundError> {
        self.shoe.deal_card().ok_or(RoundError::ShoeExhausted)
    }

    fn advance_or_finish(&mut self) -> Result<(), RoundError> {
        let index = self.current_hand_index();
        if index + 1 < self.player_hands.len() {
            self.status = RoundStatus::InProgress {
                hand_index: index + 1,
            };
            Ok(())
        } else {
            self.dealer_plays_and_summary()
        }
    }

    fn dealer_plays_and_summary(&mut self) -> Result<(), RoundError> {
        loop {
            let value = self.dealer_hand.value();
            let must_hit = value.total < 17
                || (value.total == 17 && value.soft && self.rule.dealer_hit_on_soft17);
            if !must_hit {
                break;
            }
            let card = self.draw()?;
            self.dealer_hand.add_card(card);
            if self.dealer_hand.is_bust() {
                break;
            }
        }

        let outcomes = self
            .player_hands
            .iter()
            .map(|hand| self.determine_outcome(hand))
            .collect();
        self.status = RoundStatus::Complete(outcomes);
        Ok(())
    }

    fn determine_outcome(&self, player_hand: &Hand) -> Outcome {
        let player_blackjack = player_hand.is_blackjack();
        let dealer_blackjack = self.dealer_hand.is_blackjack();
        if player_blackjack && dealer_blackjack {
            return Outcome::Push;
        }
        if player_blackjack {
            return Outcome::PlayerBlackjack;
        }
        if dealer_blackjack {
            return Outcome::DealerWin;
        }

        let player_total = player_hand.total();
        let dealer_total = self.dealer_hand.total();
        if player_total > 21 {
            Outcome::PlayerBust
        } else if dealer_total > 21 {
            Outcome::DealerBust
        } else if player_total > dealer_total {
            Outcome::PlayerWin
        } else if dealer_total > player_total {
            Outcome::DealerWin
        } else {
            Outcome::Push
        }
    }
}
