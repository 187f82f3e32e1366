//! Plain-English help for beginner mode.

use blackjack::simulation::Outcome;
use blackjack::{Action, State};
use colored::Colorize;

use crate::modes::Mode;

pub const STARTING_BALANCE: i64 = 100;
pub const BET: i64 = 10;

pub fn print_welcome(mode: Mode) {
    println!(
        "{}",
        "╔══════════════════════════════════════════════════════╗\n\
         ║          Welcome to Blackjack AI  (Beginner Mode)    ║\n\
         ╚══════════════════════════════════════════════════════╝"
            .cyan()
            .bold()
    );
    println!();

    println!("{}", "The Goal:".bold());
    println!("  Finish closer to 21 than the dealer without going over.");
    println!("  Going over 21 is a \"bust\" and loses the hand at once.\n");

    println!("{}", "Card Values:".bold());
    println!("  2 to 10 count as printed (a 7 is worth 7).");
    println!("  Jack, Queen and King count 10 each.");
    println!("  An Ace counts 11, or 1 when 11 would bust you. A hand with an Ace");
    println!("  still counted as 11 is called \"soft\".\n");

    println!("{}", "How to Win:".bold());
    println!("  - Beat the dealer's total without busting");
    println!("  - The dealer busts and you did not: you win");
    println!("  - Same total (a \"push\"): your bet comes back");
    println!("  - Blackjack (Ace plus a ten-value card as your first two) pays 1.5x\n");

    println!("{}", "Your Actions:".bold());
    for action in Action::ALL {
        println!("  {} = {:<10} {}", action.symbol(), title(action), action_help(action));
    }
    println!();

    match mode {
        Mode::Advisor => {
            println!("{}", "Advisor Mode:".bold());
            println!("  The AI suggests a move every turn, based on what it learned from");
            println!("  millions of simulated hands. Whether to follow it is up to you.\n");
        }
        Mode::Ai => {
            println!("{}", "AI Mode:".bold());
            println!("  Watch the AI play. It explains every decision it makes.\n");
        }
        Mode::Human => {
            println!("{}", "Human Mode:".bold());
            println!(
                "  You play alone with ${}. Every hand bets ${}.\n",
                STARTING_BALANCE, BET
            );
        }
    }
    println!("{}", "─".repeat(54).dimmed());
}

pub fn title(action: Action) -> &'static str {
    match action {
        Action::Hit => "Hit",
        Action::Stand => "Stand",
        Action::Double => "Double",
        Action::Split => "Split",
        Action::Surrender => "Surrender",
    }
}

pub fn action_help(action: Action) -> &'static str {
    match action {
        Action::Hit => "(take another card)",
        Action::Stand => "(keep what you have, end your turn)",
        Action::Double => "(double your bet, receive exactly one more card)",
        Action::Split => "(split your pair into two separate hands)",
        Action::Surrender => "(give up and get half your bet back)",
    }
}

pub fn friendly_outcome(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::PlayerWin => "You win!",
        Outcome::PlayerBlackjack => "Blackjack! You win 1.5x your bet!",
        Outcome::DealerBust => "You win! The dealer went over 21.",
        Outcome::Push => "Push, it's a tie. Your bet is returned.",
        Outcome::DealerWin => "Dealer wins this one.",
        Outcome::PlayerBust => "Busted, you went over 21.",
        Outcome::Surrender => "Surrendered, half your bet is returned.",
    }
}

/// Change of the chip balance for one hand. A natural always pays 1.5x the base bet.
pub fn chip_delta(outcome: Outcome, doubled: bool) -> i64 {
    let bet = if doubled { 2 * BET } else { BET };
    match outcome {
        Outcome::PlayerWin | Outcome::DealerBust => bet,
        Outcome::PlayerBlackjack => BET * 3 / 2,
        Outcome::Push => 0,
        Outcome::DealerWin | Outcome::PlayerBust => -bet,
        Outcome::Surrender => -BET / 2,
    }
}

/// How sure the agent is, from the gap between its two best Q-values.
pub fn confidence_label(margin: f64) -> &'static str {
    if margin > 0.15 {
        "High"
    } else if margin > 0.05 {
        "Medium"
    } else {
        "Low"
    }
}

pub fn dealer_card_hint(dealer_up_card: u8) -> &'static str {
    if dealer_up_card >= 7 || dealer_up_card == 1 {
        "Dealer's card is strong, tread carefully."
    } else {
        "Dealer's card is weak, they may bust on their own."
    }
}

pub fn action_reason(action: Action, state: &State) -> &'static str {
    let dealer = state.dealer_for_chart();
    let player = state.player_total;

    match action {
        Action::Surrender => "Your odds are very poor here, cutting losses is the right call.",
        Action::Double => match player {
            11 => "11 is a great doubling spot, most cards give you 21 or close.",
            10 => "10 is strong for doubling, you're likely to land near 20.",
            9 if (3..=6).contains(&dealer) => {
                "9 against a weak dealer card is a good chance to double and profit."
            }
            _ => "The math favors risking more here, doubling is the right move.",
        },
        Action::Split => "Splitting turns a weak hand into two chances to win.",
        Action::Stand if player >= 17 => {
            "You're in solid territory, any new card risks busting you."
        }
        Action::Stand if (2..=6).contains(&dealer) => {
            "Dealer's weak card means they'll likely bust on their own, no need to risk it."
        }
        Action::Stand => "Standing gives the dealer a chance to bust, the math favors it here.",
        Action::Hit if dealer >= 7 => {
            "Dealer's strong card means you need more to compete, take a card."
        }
        Action::Hit if player <= 11 => "You can't bust from here, another card is always safe.",
        Action::Hit => "Taking another card is the best play in this spot.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_deltas() {
        assert_eq!(chip_delta(Outcome::PlayerWin, false), 10);
        assert_eq!(chip_delta(Outcome::DealerBust, true), 20);
        assert_eq!(chip_delta(Outcome::PlayerBlackjack, false), 15);
        assert_eq!(chip_delta(Outcome::Push, true), 0);
        assert_eq!(chip_delta(Outcome::PlayerBust, true), -20);
        assert_eq!(chip_delta(Outcome::Surrender, false), -5);
    }

    #[test]
    fn confidence_thresholds() {
        assert_eq!(confidence_label(0.2), "High");
        assert_eq!(confidence_label(0.15), "Medium");
        assert_eq!(confidence_label(0.06), "Medium");
        assert_eq!(confidence_label(0.05), "Low");
        assert_eq!(confidence_label(0.0), "Low");
    }

    #[test]
    fn reasons_follow_the_situation() {
        let eleven = State::new(11, 6, false);
        assert!(action_reason(Action::Double, &eleven).starts_with("11 is a great"));
        let nine_vs_four = State::new(9, 4, false);
        assert!(action_reason(Action::Double, &nine_vs_four).starts_with("9 against"));
        let nine_vs_ace = State::new(9, 1, false);
        assert!(action_reason(Action::Double, &nine_vs_ace).starts_with("The math"));

        let twelve_vs_ace = State::new(12, 1, false);
        assert!(action_reason(Action::Hit, &twelve_vs_ace).starts_with("Dealer's strong"));
        let eight_vs_five = State::new(8, 5, false);
        assert!(action_reason(Action::Hit, &eight_vs_five).starts_with("You can't bust"));
        let thirteen_vs_two = State::new(13, 2, false);
        assert!(action_reason(Action::Stand, &thirteen_vs_two).starts_with("Dealer's weak"));
    }

    #[test]
    fn dealer_hints() {
        assert!(dealer_card_hint(1).contains("strong"));
        assert!(dealer_card_hint(7).contains("strong"));
        assert!(dealer_card_hint(6).contains("weak"));
    }
}
