pub mod agent;
mod error;
pub mod qtable;
pub mod simulation;
pub mod state;
pub mod strategy;
pub mod training;

use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};
use strum_macros::EnumIter;

pub use error::{AgentError, PersistError, RoundError, RuleError, TrainingError};
pub use qtable::QTable;
pub use state::State;

/// Table rules the round engine plays by.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rule {
    pub number_of_decks: u8,
    /// Fraction of the shoe dealt before a forced reshuffle.
    pub penetration: f64,
    pub dealer_hit_on_soft17: bool,
    pub allow_late_surrender: bool,

    pub payout_blackjack: f64,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            number_of_decks: 6,
            penetration: 0.75,
            dealer_hit_on_soft17: true,
            allow_late_surrender: false,
            payout_blackjack: 1.5,
        }
    }
}

impl Rule {
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.number_of_decks == 0 {
            return Err(RuleError::NoDecks);
        }
        if !(self.penetration > 0.0 && self.penetration < 1.0) {
            return Err(RuleError::Penetration(self.penetration));
        }
        Ok(())
    }
}

/// Named rule sets. All of them pay 3:2 on a natural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_enum_str, Deserialize_enum_str, EnumIter)]
pub enum RulesPreset {
    #[serde(rename = "vegas-strip")]
    VegasStrip,
    #[serde(rename = "downtown")]
    Downtown,
    #[serde(rename = "atlantic-city")]
    AtlanticCity,
    #[serde(rename = "european")]
    European,
    #[serde(rename = "single-deck")]
    SingleDeck,
}

impl RulesPreset {
    pub fn name(self) -> &'static str {
        match self {
            RulesPreset::VegasStrip => "vegas-strip",
            RulesPreset::Downtown => "downtown",
            RulesPreset::AtlanticCity => "atlantic-city",
            RulesPreset::European => "european",
            RulesPreset::SingleDeck => "single-deck",
        }
    }

    pub fn rule(self) -> Rule {
        let (number_of_decks, dealer_hit_on_soft17, allow_late_surrender) = match self {
            RulesPreset::VegasStrip => (6, false, false),
            RulesPreset::Downtown => (2, true, true),
            RulesPreset::AtlanticCity => (8, false, true),
            RulesPreset::European => (6, false, false),
            RulesPreset::SingleDeck => (1, true, false),
        };
        Rule {
            number_of_decks,
            dealer_hit_on_soft17,
            allow_late_surrender,
            ..Default::default()
        }
    }
}

pub const NUM_ACTIONS: usize = 5;

/// Player decisions. The discriminant is the column of the action in a Q-table row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum Action {
    Hit = 0,
    Stand,
    Double,
    Split,
    Surrender,
}

impl Action {
    pub const ALL: [Action; NUM_ACTIONS] = [
        Action::Hit,
        Action::Stand,
        Action::Double,
        Action::Split,
        Action::Surrender,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// One-letter key used by charts and interactive prompts.
    pub fn symbol(self) -> char {
        match self {
            Action::Hit => 'H',
            Action::Stand => 'S',
            Action::Double => 'D',
            Action::Split => 'P',
            Action::Surrender => 'R',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Action> {
        let symbol = symbol.to_ascii_uppercase();
        Action::ALL.into_iter().find(|a| a.symbol() == symbol)
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Hit => "HIT",
            Action::Stand => "STAND",
            Action::Double => "DOUBLE",
            Action::Split => "SPLIT",
            Action::Surrender => "SURRENDER",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn presets_parse_from_hyphenated_names() {
        for preset in RulesPreset::iter() {
            let parsed: RulesPreset = preset.name().parse().unwrap();
            assert_eq!(parsed, preset);
        }
        assert!("vegas".parse::<RulesPreset>().is_err());
    }

    #[test]
    fn preset_settings() {
        let rule = RulesPreset::VegasStrip.rule();
        assert_eq!(rule.number_of_decks, 6);
        assert!(!rule.dealer_hit_on_soft17);
        assert!(!rule.allow_late_surrender);

        let rule = RulesPreset::Downtown.rule();
        assert_eq!(rule.number_of_decks, 2);
        assert!(rule.dealer_hit_on_soft17);
        assert!(rule.allow_late_surrender);

        let rule = RulesPreset::AtlanticCity.rule();
        assert_eq!(rule.number_of_decks, 8);
        assert!(!rule.dealer_hit_on_soft17);
        assert!(rule.allow_late_surrender);

        let rule = RulesPreset::SingleDeck.rule();
        assert_eq!(rule.number_of_decks, 1);
        assert!(rule.dealer_hit_on_soft17);

        for preset in RulesPreset::iter() {
            assert_eq!(preset.rule().payout_blackjack, 1.5);
            assert!(preset.rule().validate().is_ok());
        }
    }

    #[test]
    fn invalid_rules_are_rejected() {
        let mut rule = Rule::default();
        rule.number_of_decks = 0;
        assert!(rule.validate().is_err());

        let mut rule = Rule::default();
        rule.penetration = 1.0;
        assert!(rule.validate().is_err());
    }

    #[test]
    fn action_symbols() {
        for action in Action::iter() {
            assert_eq!(Action::from_symbol(action.symbol()), Some(action));
            assert_eq!(Action::ALL[action.index()], action);
        }
        assert_eq!(Action::from_symbol('h'), Some(Action::Hit));
        assert_eq!(Action::from_symbol('x'), None);
    }
}
