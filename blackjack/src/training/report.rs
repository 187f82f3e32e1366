use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::Agent;
use crate::strategy::BasicStrategy;

use super::{ConvergenceReport, ConvergenceResult, StrategyChart, TrainingConfig, TrainingMetrics};

pub const REPORT_FILE_NAME: &str = "training_report.txt";

/// Plain-text summary of a finished training run.
#[derive(Debug, Clone, Copy)]
pub struct TrainingReport<'a> {
    pub config: &'a TrainingConfig,
    pub metrics: &'a TrainingMetrics,
    pub duration: Duration,
    pub convergence: &'a ConvergenceResult,
}

impl<'a> TrainingReport<'a> {
    pub fn render<A: Agent + ?Sized>(&self, agent: &A, strategy: &BasicStrategy) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.write_sections(&mut out);
        out.push_str(&StrategyChart::default().render(agent, strategy, true));
        out.push_str(&ConvergenceReport::default().render(self.convergence));
        out.push_str(&write_suggestions(self.convergence, self.metrics));
        out
    }

    /// Writes `<dir>/training_report.txt`, creating `dir` if needed.
    pub fn save<A: Agent + ?Sized>(
        &self,
        agent: &A,
        strategy: &BasicStrategy,
        dir: &Path,
    ) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE_NAME);
        fs::write(&path, self.render(agent, strategy))?;
        Ok(path)
    }

    fn write_sections(&self, out: &mut String) -> std::fmt::Result {
        let config = self.config;
        let rule = &config.rule;
        let params = &config.hyperparameters;
        let metrics = self.metrics;
        let yes_no = |b: bool| if b { "yes" } else { "no" };

        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(out, "            Blackjack AI Training Report")?;
        writeln!(out, "{}\n", "=".repeat(60))?;

        writeln!(out, "--- Configuration ---")?;
        line(out, "Rules preset", &config.rules_preset)?;
        line(out, "Num decks", rule.number_of_decks)?;
        line(out, "Dealer hits soft 17", yes_no(rule.dealer_hit_on_soft17))?;
        line(out, "Surrender enabled", yes_no(rule.allow_late_surrender))?;
        line(out, "Blackjack payout", format!("{}:1", rule.payout_blackjack))?;
        line(out, "Learning rate", params.learning_rate)?;
        line(out, "Discount factor", params.discount_factor)?;
        line(out, "Epsilon start", params.epsilon)?;
        line(out, "Epsilon decay", params.epsilon_decay)?;
        line(out, "Epsilon min", params.epsilon_min)?;
        line(out, "Eval frequency", format!("{} episodes", config.eval_frequency))?;
        line(out, "Eval games", config.eval_games)?;

        writeln!(out, "\n--- Training Stats ---")?;
        let seconds = self.duration.as_secs();
        line(out, "Total episodes", metrics.total_episodes)?;
        line(out, "Duration", format!("{} seconds", seconds))?;
        if seconds > 0 {
            line(out, "Episodes / sec", metrics.total_episodes / seconds)?;
        }
        line(out, "States learned", metrics.states_learned)?;
        line(out, "Final epsilon", format!("{:.6}", metrics.current_epsilon))?;

        writeln!(out, "\n--- Final Performance ---")?;
        line(out, "Win rate", format!("{:.2}%", metrics.win_rate * 100.0))?;
        line(out, "Loss rate", format!("{:.2}%", metrics.loss_rate * 100.0))?;
        line(out, "Push rate", format!("{:.2}%", metrics.push_rate * 100.0))?;
        line(out, "Bust rate", format!("{:.2}%", metrics.bust_rate * 100.0))?;
        line(out, "Avg reward", format!("{:.4}", metrics.avg_reward))
    }
}

fn line(out: &mut String, label: &str, value: impl std::fmt::Display) -> std::fmt::Result {
    writeln!(out, "{:<24}: {}", label, value)
}

/// Hints on what to change when the policy or the results look weak.
pub fn write_suggestions(convergence: &ConvergenceResult, metrics: &TrainingMetrics) -> String {
    let mut out = String::from("\n=== Improvement Suggestions ===\n");
    let mut any = false;

    if !convergence.passed {
        out += &format!(
            "  • Strategy accuracy ({:.1}%) is below the 90% threshold.\n    \
             Try training for more episodes (e.g. 2M+) or reduce epsilon_decay.\n",
            convergence.accuracy * 100.0
        );
        any = true;
    }

    let critical = convergence.critical_count();
    if critical > 0 {
        out += &format!(
            "  • {} critical state(s) diverge from basic strategy.\n    \
             High-stakes hands (hard 16 vs strong dealer, hard 10/11) need more exploration.\n",
            critical
        );
        any = true;
    }

    let soft = convergence.soft_count();
    if !convergence.divergences.is_empty() && soft > convergence.divergences.len() / 2 {
        out += &format!(
            "  • Soft-total strategy shows above-average divergences ({} states).\n    \
             Ace-involved hands are rare; extended training usually resolves these.\n",
            soft
        );
        any = true;
    }

    if metrics.win_rate < 0.42 {
        out += &format!(
            "  • Win rate ({:.1}%) is below basic strategy (~43%).\n    \
             Consider more episodes, a slower epsilon_decay, or a higher learning_rate.\n",
            metrics.win_rate * 100.0
        );
        any = true;
    }

    if metrics.states_learned < 150 {
        out += &format!(
            "  • Only {} states explored, the Q-table is underpopulated.\n    \
             Slow epsilon decay (e.g. 0.9999) allows broader exploration.\n",
            metrics.states_learned
        );
        any = true;
    }

    if !any {
        out += "  • Agent closely matches basic strategy and win rate looks healthy.\n    \
                No major issues detected, consider running a longer eval for confidence.\n";
    }
    out += "================================\n";
    out
}
