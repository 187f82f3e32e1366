use blackjack::agent::Agent;
use blackjack::simulation::{Hand, Outcome, Round};
use blackjack::strategy::BasicStrategy;
use blackjack::training::{q_margin, ConvergenceReport, StrategyChart};
use blackjack::{Action, State};
use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use dialoguer::{Confirm, Select};

use crate::coach::{self, BET, STARTING_BALANCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// You play, nobody helps
    Human,
    /// The agent plays and shows its Q-values
    Ai,
    /// You play, the agent recommends
    Advisor,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    wins: u32,
    losses: u32,
    pushes: u32,
}

impl Tally {
    fn record(&mut self, outcome: Outcome) {
        if outcome.is_win() {
            self.wins += 1;
        } else if outcome.is_push() {
            self.pushes += 1;
        } else {
            self.losses += 1;
        }
    }

    fn total(&self) -> u32 {
        self.wins + self.losses + self.pushes
    }

    fn win_rate(&self) -> f64 {
        self.wins as f64 * 100.0 / self.total().max(1) as f64
    }

    fn print(&self) {
        println!(
            "Hands: {} | Wins: {} | Losses: {} | Pushes: {}",
            self.total(),
            self.wins,
            self.losses,
            self.pushes
        );
    }
}

/// One seat at the table for a whole play session.
pub struct Session {
    round: Round,
    /// 0 plays until the user stops.
    hands: u32,
    beginner: bool,
    tally: Tally,
    balance: i64,
}

impl Session {
    pub fn new(round: Round, hands: u32, beginner: bool) -> Session {
        Session {
            round,
            hands,
            beginner,
            tally: Tally::default(),
            balance: STARTING_BALANCE,
        }
    }

    pub fn play_human(&mut self) -> anyhow::Result<()> {
        if self.beginner {
            coach::print_welcome(Mode::Human);
        } else {
            println!("{}", "=== Human Play Mode ===".bold());
            println!("Keys: H=Hit, S=Stand, D=Double, P=Split, R=Surrender\n");
        }

        let mut played = 0;
        loop {
            played += 1;
            self.print_hand_header(played);
            self.round.start_round()?;

            if self.round.is_complete() {
                self.show_naturals("Your hand");
                self.settle(false)?;
            } else {
                self.show_dealer_up_card();
                self.show_hand("Your hand", self.round.player_hand(), true);
                while !self.round.is_complete() {
                    let action = self.prompt_action(&self.round.valid_actions())?;
                    self.round.apply(action)?;
                    if !self.round.is_complete() {
                        self.show_hand("Your hand", self.round.player_hand(), true);
                    }
                }
                println!();
                self.show_hand("Dealer hand", self.round.dealer_hand(), true);
                self.settle(false)?;
            }
            println!();

            if !self.another_hand(played)? {
                break;
            }
        }

        println!("\n{}", "=== Session Summary ===".bold());
        self.tally.print();
        if self.tally.total() > 0 {
            println!("Win rate: {:.1}%", self.tally.win_rate());
        }
        if self.beginner {
            self.print_balance();
        }
        Ok(())
    }

    pub fn play_ai(&mut self, agent: &dyn Agent) -> anyhow::Result<()> {
        if self.beginner {
            coach::print_welcome(Mode::Ai);
        } else {
            println!("{}\n", "=== AI Play Mode ===".bold());
        }

        let mut played = 0;
        let mut total_reward = 0.0;
        loop {
            played += 1;
            println!("{}", format!("--- Hand {} ---", played).bold());
            self.round.start_round()?;

            if self.round.is_complete() {
                self.show_naturals("Player");
                total_reward += self.settle(!self.beginner)?;
            } else {
                self.show_hand("Dealer shows", &self.round.visible_dealer_hand(), false);
                while !self.round.is_complete() {
                    self.show_hand("Player", self.round.player_hand(), true);
                    let state = self.round.state();
                    let valid_actions = self.round.valid_actions();
                    let action = agent.best_action(&state, &valid_actions)?;

                    if self.beginner {
                        self.explain(agent, &state, &valid_actions, action, "AI plays");
                    } else {
                        show_q_values(agent, &state, &valid_actions);
                        println!("{}", format!("  -> {}", action).green());
                    }
                    self.round.apply(action)?;
                }
                self.show_hand("Dealer hand", self.round.dealer_hand(), true);
                total_reward += self.settle(!self.beginner)?;
            }
            println!();

            if !self.another_hand(played)? {
                break;
            }
        }

        println!("{}", "=== AI Session Summary ===".bold());
        self.tally.print();
        println!("Win rate: {:.1}%", self.tally.win_rate());
        if !self.beginner {
            println!(
                "Total reward: {:.2} | Avg: {:.2}",
                total_reward,
                total_reward / played.max(1) as f64
            );
        }
        Ok(())
    }

    pub fn play_advisor(&mut self, agent: &dyn Agent) -> anyhow::Result<()> {
        if self.beginner {
            coach::print_welcome(Mode::Advisor);
        } else {
            println!("{}", "=== Advisor Mode ===".bold());
            println!("You play, AI recommends. Keys: H/S/D/P/R\n");
        }

        let mut agreed = 0u32;
        let mut overridden = 0u32;
        let mut played = 0;
        loop {
            played += 1;
            self.print_hand_header(played);
            self.round.start_round()?;

            if self.round.is_complete() {
                self.show_naturals("Player");
                self.settle(false)?;
            } else {
                self.show_dealer_up_card();
                while !self.round.is_complete() {
                    self.show_hand("Your hand", self.round.player_hand(), true);
                    let state = self.round.state();
                    let valid_actions = self.round.valid_actions();
                    let advice = agent.best_action(&state, &valid_actions)?;

                    if self.beginner {
                        self.explain(agent, &state, &valid_actions, advice, "AI recommends");
                    } else {
                        show_q_values(agent, &state, &valid_actions);
                        println!("{}", format!("  AI recommends: {}", advice).cyan());
                    }

                    let action = self.prompt_action(&valid_actions)?;
                    if action == advice {
                        println!("{}", "  Good call, you agreed with the AI!".green());
                        agreed += 1;
                    } else {
                        if self.beginner {
                            println!(
                                "{}",
                                format!(
                                    "  You overrode the AI (it wanted {}). Let's see how it plays out!",
                                    advice
                                )
                                .yellow()
                            );
                        } else {
                            println!("{}", format!("  (Override, AI wanted {})", advice).red());
                        }
                        overridden += 1;
                    }
                    self.round.apply(action)?;
                }
                self.show_hand("Dealer hand", self.round.dealer_hand(), true);
                self.settle(false)?;
            }
            println!();

            if !self.another_hand(played)? {
                break;
            }
        }

        let decisions = agreed + overridden;
        let agreement = agreed as f64 * 100.0 / decisions.max(1) as f64;
        println!("\n{}", "=== Advisor Summary ===".bold());
        if self.beginner {
            println!("You followed the AI: {} time(s)", agreed);
            println!("You overrode the AI: {} time(s)", overridden);
            if decisions > 0 {
                println!("Agreement rate: {:.1}%", agreement);
                if agreement >= 75.0 {
                    println!(
                        "{}",
                        "Great job following the AI, that's how you build good instincts!".green()
                    );
                } else if overridden > agreed {
                    println!(
                        "{}",
                        "You went your own way a lot. Try following the AI more, it has learned from millions of hands!"
                            .yellow()
                    );
                }
            }
            if self.tally.total() > 0 {
                self.tally.print();
                println!("Win rate: {:.1}%", self.tally.win_rate());
            }
            self.print_balance();
        } else {
            println!("Agreed with AI: {} | Overrode AI: {}", agreed, overridden);
            if decisions > 0 {
                println!("Agreement rate: {:.1}%", agreement);
            }
        }
        Ok(())
    }

    fn print_hand_header(&self, number: u32) {
        let header = if self.beginner {
            format!("--- Hand {}  |  Balance: ${} ---", number, self.balance)
        } else {
            format!("--- Hand {} ---", number)
        };
        println!("{}", header.bold());
        if self.beginner {
            println!("{}", format!("  (Betting ${} this hand)", BET).dimmed());
        }
    }

    fn another_hand(&self, played: u32) -> anyhow::Result<bool> {
        if self.hands > 0 {
            return Ok(played < self.hands);
        }
        Ok(Confirm::new()
            .with_prompt("Continue?")
            .default(true)
            .interact()?)
    }

    /// A natural ended the round before anyone acted.
    fn show_naturals(&self, label: &str) {
        self.show_hand(label, self.round.player_hand(), true);
        self.show_hand("Dealer", self.round.dealer_hand(), true);
    }

    fn show_dealer_up_card(&self) {
        self.show_hand("Dealer shows", &self.round.visible_dealer_hand(), false);
        if self.beginner {
            let up_card = self.round.dealer_up_card().blackjack_value();
            println!("{}", format!("  {}", coach::dealer_card_hint(up_card)).dimmed());
        }
    }

    fn show_hand(&self, label: &str, hand: &Hand, show_total: bool) {
        let cards: Vec<String> = hand.cards().iter().map(|c| c.to_string()).collect();
        let mut line = format!("{}: {}", label.bold(), cards.join(" "));
        if show_total {
            let value = hand.value();
            let mut total = format!(" ({}", value.total);
            if value.soft {
                total.push_str(" soft");
            }
            line += &total.dimmed().to_string();
            if value.soft && self.beginner {
                line += &" Ace counts as 11, flips to 1 if you'd bust".yellow().to_string();
            }
            line += &")".dimmed().to_string();
        }
        println!("{}", line);
    }

    fn explain(
        &self,
        agent: &dyn Agent,
        state: &State,
        valid_actions: &[Action],
        action: Action,
        verb: &str,
    ) {
        let margin = q_margin(agent, state, valid_actions);
        println!(
            "{}{}",
            format!("  {}: {}", verb, action).green(),
            format!("  (Confidence: {})", coach::confidence_label(margin)).dimmed()
        );
        println!(
            "{}",
            format!("  Why: {}", coach::action_reason(action, state)).dimmed()
        );
    }

    fn prompt_action(&self, valid_actions: &[Action]) -> anyhow::Result<Action> {
        let items: Vec<String> = valid_actions
            .iter()
            .map(|&action| {
                if self.beginner {
                    format!(
                        "{} = {:<10} {}",
                        action.symbol(),
                        coach::title(action),
                        coach::action_help(action)
                    )
                } else {
                    format!("{} {}", action.symbol(), coach::title(action))
                }
            })
            .collect();
        let prompt = if self.beginner { "Your move" } else { "Action?" };
        let choice = Select::new()
            .with_prompt(prompt)
            .items(&items)
            .default(0)
            .interact()?;
        Ok(valid_actions[choice])
    }

    /// Prints each hand's outcome and updates the tally and chips.
    /// Returns the round's total reward.
    fn settle(&mut self, show_reward: bool) -> anyhow::Result<f64> {
        let outcomes = self.round.outcomes()?.to_vec();
        let doubled = self.round.doubled().to_vec();
        let mut round_reward = 0.0;

        for (i, &outcome) in outcomes.iter().enumerate() {
            let was_doubled = doubled.get(i).copied().unwrap_or(false);
            let reward = outcome.reward(was_doubled);
            round_reward += reward;
            self.tally.record(outcome);

            let mut line = String::new();
            if outcomes.len() > 1 {
                line += &format!("Hand {}: ", i + 1);
            }
            if self.beginner {
                let delta = coach::chip_delta(outcome, was_doubled);
                self.balance += delta;
                line += &outcome_color(outcome, coach::friendly_outcome(outcome)).to_string();
                if was_doubled {
                    line += &" (doubled)".dimmed().to_string();
                }
                if delta != 0 {
                    line += &format!("  (${:+} → Balance: ${})", delta, self.balance)
                        .dimmed()
                        .to_string();
                }
            } else {
                line += &outcome_color(outcome, &outcome.to_string()).to_string();
                if was_doubled {
                    line += " (doubled)";
                }
                if show_reward {
                    line += &format!(" [reward: {:+}]", reward);
                }
            }
            println!("{}", line);
        }
        Ok(round_reward)
    }

    fn print_balance(&self) {
        let profit = self.balance - STARTING_BALANCE;
        let profit_text = format!("{:+}", profit);
        let profit_text = if profit >= 0 {
            profit_text.green()
        } else {
            profit_text.red()
        };
        println!("Final balance: ${}  ({})", self.balance, profit_text);
    }
}

fn outcome_color(outcome: Outcome, text: &str) -> ColoredString {
    if outcome.is_win() {
        text.green()
    } else if outcome.is_push() {
        text.yellow()
    } else {
        text.red()
    }
}

fn show_q_values(agent: &dyn Agent, state: &State, valid_actions: &[Action]) {
    let q_values = agent.q_values(state);
    let values: Vec<String> = valid_actions
        .iter()
        .map(|action| format!("{}={:.3}", action, q_values[action.index()]))
        .collect();
    println!("{}{}", "  Q-values: ".cyan(), values.join("  "));
}

/// Strategy chart and convergence report of a trained agent.
pub fn print_report(agent: &dyn Agent) {
    let strategy = BasicStrategy::new();
    print!("{}", StrategyChart::default().render(agent, &strategy, false));
    let report = ConvergenceReport::default();
    print!("{}", report.render(&report.analyze(agent, &strategy)));
}
