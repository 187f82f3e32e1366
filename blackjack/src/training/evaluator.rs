use crate::agent::Agent;
use crate::simulation::{Outcome, Round};
use crate::strategy::{comparison_actions, exhaustive_states, BasicStrategy};
use crate::{Rule, TrainingError};

use super::total_reward;

/// Outcome counts are per hand, rates are per round played.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvaluationResult {
    pub games_played: u64,
    pub hands_played: u64,
    pub wins: u64,
    pub losses: u64,
    pub pushes: u64,
    pub blackjacks: u64,
    pub busts: u64,

    pub win_rate: f64,
    pub loss_rate: f64,
    pub push_rate: f64,
    pub avg_reward: f64,
    pub bust_rate: f64,

    /// Share of the reference states where the greedy action is correct, 0 when not compared.
    pub strategy_accuracy: f64,
}

/// Plays an agent greedily on its own shoe. The agent is only ever borrowed
/// immutably, so evaluation cannot change what it learned.
#[derive(Debug, Clone)]
pub struct Evaluator {
    round: Round,
    strategy: BasicStrategy,
}

impl Evaluator {
    pub fn new(rule: &Rule, seed: Option<u64>) -> Evaluator {
        Evaluator {
            round: Round::new(rule, seed),
            strategy: BasicStrategy::new(),
        }
    }

    pub fn basic_strategy(&self) -> &BasicStrategy {
        &self.strategy
    }

    pub fn evaluate<A: Agent + ?Sized>(
        &mut self,
        agent: &A,
        games: u64,
        compare_strategy: bool,
    ) -> Result<EvaluationResult, TrainingError> {
        let mut result = EvaluationResult {
            games_played: games,
            ..Default::default()
        };
        let mut reward = 0.0;

        for _ in 0..games {
            self.play_round(agent)?;
            let outcomes = self.round.outcomes()?;
            for outcome in outcomes {
                result.hands_played += 1;
                match outcome {
                    Outcome::PlayerWin | Outcome::DealerBust => result.wins += 1,
                    Outcome::PlayerBlackjack => {
                        result.wins += 1;
                        result.blackjacks += 1;
                    }
                    Outcome::Push => result.pushes += 1,
                    Outcome::PlayerBust => {
                        result.losses += 1;
                        result.busts += 1;
                    }
                    Outcome::DealerWin | Outcome::Surrender => result.losses += 1,
                }
            }
            reward += total_reward(outcomes, self.round.doubled());
        }

        if games > 0 {
            let n = games as f64;
            result.win_rate = result.wins as f64 / n;
            result.loss_rate = result.losses as f64 / n;
            result.push_rate = result.pushes as f64 / n;
            result.avg_reward = reward / n;
            result.bust_rate = result.busts as f64 / n;
        }

        if compare_strategy {
            result.strategy_accuracy = self.compare_with_basic_strategy(agent);
        }

        log::debug!(
            "evaluated {} rounds ({} hands): win {:.4}, loss {:.4}, push {:.4}, reward {:.4}",
            games,
            result.hands_played,
            result.win_rate,
            result.loss_rate,
            result.push_rate,
            result.avg_reward
        );
        Ok(result)
    }

    /// Accuracy of the greedy policy over every reference state.
    pub fn compare_with_basic_strategy<A: Agent + ?Sized>(&self, agent: &A) -> f64 {
        let mut matches = 0;
        let mut total = 0;
        for state in exhaustive_states() {
            let valid = comparison_actions(&state);
            let correct = agent
                .best_action(&state, &valid)
                .map_or(false, |action| self.strategy.is_correct_action(&state, action));
            if correct {
                matches += 1;
            }
            total += 1;
        }
        if total == 0 {
            0.0
        } else {
            matches as f64 / total as f64
        }
    }

    fn play_round<A: Agent + ?Sized>(&mut self, agent: &A) -> Result<(), TrainingError> {
        self.round.start_round()?;
        while !self.round.is_complete() {
            let state = self.round.state();
            let valid = self.round.valid_actions();
            let action = agent.best_action(&state, &valid)?;
            self.round.apply(action)?;
        }
        Ok(())
    }
}
