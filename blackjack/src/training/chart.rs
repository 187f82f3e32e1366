use std::fmt::Write;
use std::io::IsTerminal;

use colored::Colorize;

use crate::agent::Agent;
use crate::strategy::{comparison_actions, BasicStrategy};
use crate::State;

use super::q_margin;

const DEALER_CARDS: [u8; 10] = [2, 3, 4, 5, 6, 7, 8, 9, 10, 1];
const DEALER_LABELS: [&str; 10] = ["2", "3", "4", "5", "6", "7", "8", "9", "T", "A"];

/// Grid of the agent's greedy action for every hard and soft total against every dealer card.
#[derive(Debug, Clone, Copy)]
pub struct StrategyChart {
    /// Mismatches with a smaller Q-margin than this are shown as uncertain.
    pub margin_threshold: f64,
}

impl Default for StrategyChart {
    fn default() -> Self {
        StrategyChart {
            margin_threshold: 0.05,
        }
    }
}

impl StrategyChart {
    pub fn new(margin_threshold: f64) -> Self {
        StrategyChart { margin_threshold }
    }

    /// Colored when stdout is a terminal and `plain` is false. Plain charts
    /// mark a divergence with a lowercase letter.
    pub fn render<A: Agent + ?Sized>(&self, agent: &A, strategy: &BasicStrategy, plain: bool) -> String {
        let color = !plain && std::io::stdout().is_terminal();
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.write_chart(agent, strategy, color, &mut out);
        out
    }

    fn write_chart<A: Agent + ?Sized>(
        &self,
        agent: &A,
        strategy: &BasicStrategy,
        color: bool,
        out: &mut String,
    ) -> std::fmt::Result {
        if color {
            writeln!(out, "\n{}", "=== Strategy Chart ===".bold())?;
            writeln!(
                out,
                "Legend: {}=matches basic strategy  {}=diverges  {}=uncertain (margin<{})",
                "H".green(),
                "H".red(),
                "H".yellow(),
                self.margin_threshold
            )?;
        } else {
            writeln!(out, "\n=== Strategy Chart ===")?;
            writeln!(out, "Legend: UPPER=matches basic strategy  lower=diverges")?;
            writeln!(out, "  margin<{} treated as uncertain", self.margin_threshold)?;
        }
        writeln!(out, "Actions: H=Hit S=Stand D=Double P=Split R=Surrender")?;

        for (title, soft) in [("--- Hard Totals ---", false), ("--- Soft Totals ---", true)] {
            if color {
                writeln!(out, "\n{}", title.bold())?;
            } else {
                writeln!(out, "\n{}", title)?;
            }
            self.write_grid(agent, strategy, soft, color, out)?;
        }
        Ok(())
    }

    fn write_grid<A: Agent + ?Sized>(
        &self,
        agent: &A,
        strategy: &BasicStrategy,
        soft: bool,
        color: bool,
        out: &mut String,
    ) -> std::fmt::Result {
        write!(out, "{:6}", "")?;
        for label in DEALER_LABELS {
            write!(out, "{:>3}", label)?;
        }
        writeln!(out)?;

        let first_row = if soft { 13 } else { 4 };
        for player_total in first_row..=21 {
            write!(out, "{:>5} ", player_total)?;
            for dealer in DEALER_CARDS {
                let state = State::new(player_total, dealer, soft);
                let valid = comparison_actions(&state);
                let Ok(action) = agent.best_action(&state, &valid) else {
                    write!(out, "  ?")?;
                    continue;
                };
                let matches = strategy.is_correct_action(&state, action);
                let symbol = action.symbol();

                if color {
                    let cell = symbol.to_string();
                    let cell = if matches {
                        cell.green()
                    } else if q_margin(agent, &state, &valid) < self.margin_threshold {
                        cell.yellow()
                    } else {
                        cell.red()
                    };
                    write!(out, "  {}", cell)?;
                } else if matches {
                    write!(out, "  {}", symbol)?;
                } else {
                    write!(out, "  {}", symbol.to_ascii_lowercase())?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Experience, Hyperparameters, QLearningAgent};
    use crate::Action;

    #[test]
    fn plain_chart_layout() {
        let agent = QLearningAgent::with_seed(Hyperparameters::default(), 1).unwrap();
        let text = StrategyChart::default().render(&agent, &BasicStrategy::new(), true);
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines.contains(&"=== Strategy Chart ==="));
        assert!(lines.contains(&"Actions: H=Hit S=Stand D=Double P=Split R=Surrender"));
        assert!(lines.contains(&"        2  3  4  5  6  7  8  9  T  A"));
        // a fresh agent hits everywhere, so hard 20 is all wrong
        assert!(lines.contains(&"   20   h  h  h  h  h  h  h  h  h  h"));
        assert!(lines.contains(&"    5   H  H  H  H  H  H  H  H  H  H"));
        // 18 hard rows and 9 soft rows
        let rows = lines
            .iter()
            .filter(|l| l.split_whitespace().count() == 11)
            .count();
        assert_eq!(rows, 27);
    }

    #[test]
    fn plain_chart_marks_single_divergence() {
        let mut agent = QLearningAgent::with_seed(Hyperparameters::default(), 1).unwrap();
        agent.learn(&Experience::terminal(State::new(12, 4, false), Action::Stand, 1.0));
        let text = StrategyChart::default().render(&agent, &BasicStrategy::new(), true);
        assert!(text.contains("   12   H  H  S  h  h  H  H  H  H  H"));
    }
}
