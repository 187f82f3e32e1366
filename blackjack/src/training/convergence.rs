use std::fmt::Write;

use crate::agent::Agent;
use crate::strategy::{comparison_actions, exhaustive_states, is_critical_state, BasicStrategy};
use crate::{Action, State};

/// A reference state where the greedy action is not the one the charts prescribe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Divergence {
    pub state: State,
    pub agent_action: Action,
    pub optimal_action: Action,
    pub q_margin: f64,
    pub is_critical: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvergenceResult {
    pub accuracy: f64,
    pub passed: bool,
    pub total_states: usize,
    pub matching_states: usize,
    /// Critical first, then by decreasing margin.
    pub divergences: Vec<Divergence>,
}

impl ConvergenceResult {
    pub fn critical_count(&self) -> usize {
        self.divergences.iter().filter(|d| d.is_critical).count()
    }

    pub fn soft_count(&self) -> usize {
        self.divergences.iter().filter(|d| d.state.soft).count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConvergenceReport {
    pub passing_threshold: f64,
    pub max_divergences_shown: usize,
}

impl Default for ConvergenceReport {
    fn default() -> Self {
        ConvergenceReport {
            passing_threshold: 0.90,
            max_divergences_shown: 15,
        }
    }
}

impl ConvergenceReport {
    pub fn new(passing_threshold: f64, max_divergences_shown: usize) -> Self {
        ConvergenceReport {
            passing_threshold,
            max_divergences_shown,
        }
    }

    /// Scans every reference state with the agent's greedy choice.
    pub fn analyze<A: Agent + ?Sized>(&self, agent: &A, strategy: &BasicStrategy) -> ConvergenceResult {
        let mut result = ConvergenceResult::default();

        for state in exhaustive_states() {
            let valid = comparison_actions(&state);
            let Ok(agent_action) = agent.best_action(&state, &valid) else {
                continue;
            };
            result.total_states += 1;

            if strategy.is_correct_action(&state, agent_action) {
                result.matching_states += 1;
            } else {
                result.divergences.push(Divergence {
                    state,
                    agent_action,
                    optimal_action: strategy.action(&state),
                    q_margin: q_margin(agent, &state, &valid),
                    is_critical: is_critical_state(&state),
                });
            }
        }

        if result.total_states > 0 {
            result.accuracy = result.matching_states as f64 / result.total_states as f64;
        }
        result.passed = result.accuracy >= self.passing_threshold;
        result.divergences.sort_by(|a, b| {
            b.is_critical
                .cmp(&a.is_critical)
                .then(b.q_margin.total_cmp(&a.q_margin))
        });
        result
    }

    pub fn render(&self, result: &ConvergenceResult) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.write_report(result, &mut out);
        out
    }

    fn write_report(&self, result: &ConvergenceResult, out: &mut String) -> std::fmt::Result {
        writeln!(out, "\n=== Convergence Report ===")?;
        writeln!(
            out,
            "Strategy accuracy : {:.1}% ({}/{} states)",
            result.accuracy * 100.0,
            result.matching_states,
            result.total_states
        )?;
        writeln!(out, "Threshold         : {:.1}%", self.passing_threshold * 100.0)?;
        writeln!(
            out,
            "Status            : {}",
            if result.passed { "PASS ✓" } else { "FAIL ✗" }
        )?;

        if result.divergences.is_empty() {
            writeln!(out, "No divergences from basic strategy.")?;
            writeln!(out, "==========================")?;
            return Ok(());
        }

        let critical = result.critical_count();
        writeln!(
            out,
            "Divergences       : {} ({} critical, {} minor)",
            result.divergences.len(),
            critical,
            result.divergences.len() - critical
        )?;

        let shown = self.max_divergences_shown.min(result.divergences.len());
        writeln!(
            out,
            "\nTop {} divergences (critical first, then by Q-value margin):",
            shown
        )?;
        writeln!(
            out,
            "{:<20}{:<12}{:<12}{:>10}{:<10}",
            "State", "Agent", "Optimal", "Margin", "  Type"
        )?;
        writeln!(out, "{}", "-".repeat(64))?;
        for d in &result.divergences[..shown] {
            writeln!(
                out,
                "{:<20}{:<12}{:<12}{:>9.4}{}",
                d.state.to_string(),
                d.agent_action.name(),
                d.optimal_action.name(),
                d.q_margin,
                if d.is_critical { "  CRITICAL" } else { "  minor" }
            )?;
        }

        if critical > 0 {
            writeln!(out, "\nCritical divergences:")?;
            for d in result.divergences.iter().filter(|d| d.is_critical) {
                writeln!(
                    out,
                    "  {:<18} agent={:<9} optimal={:<9} margin={:.4}",
                    d.state.to_string(),
                    d.agent_action.name(),
                    d.optimal_action.name(),
                    d.q_margin
                )?;
            }
        }

        writeln!(out, "==========================")
    }
}

/// Gap between the best and second best Q-value over `valid_actions`, 0 with fewer than two.
pub fn q_margin<A: Agent + ?Sized>(agent: &A, state: &State, valid_actions: &[Action]) -> f64 {
    if valid_actions.len() < 2 {
        return 0.0;
    }
    let mut best = f64::NEG_INFINITY;
    let mut second = f64::NEG_INFINITY;
    for &action in valid_actions {
        let q = agent.q_value(state, action);
        if q > best {
            second = best;
            best = q;
        } else if q > second {
            second = q;
        }
    }
    if second == f64::NEG_INFINITY {
        0.0
    } else {
        best - second
    }
}
