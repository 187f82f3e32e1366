use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{with_extension, Agent, Experience};
use crate::qtable::{create_parent_dir, QValues};
use crate::{Action, AgentError, PersistError, QTable, State};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperparameters {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon: f64,
    pub epsilon_decay: f64,
    pub epsilon_min: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Hyperparameters {
            learning_rate: 0.1,
            discount_factor: 0.95,
            epsilon: 1.0,
            epsilon_decay: 0.99995,
            epsilon_min: 0.01,
        }
    }
}

impl Hyperparameters {
    pub fn validate(&self) -> Result<(), AgentError> {
        let fail = |what: &str, value: f64| {
            Err(AgentError::InvalidHyperparameters(format!("{} = {}", what, value)))
        };
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return fail("learning_rate", self.learning_rate);
        }
        if !(0.0..=1.0).contains(&self.discount_factor) {
            return fail("discount_factor", self.discount_factor);
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return fail("epsilon", self.epsilon);
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return fail("epsilon_decay", self.epsilon_decay);
        }
        if !(self.epsilon_min >= 0.0 && self.epsilon_min <= self.epsilon) {
            return fail("epsilon_min", self.epsilon_min);
        }
        Ok(())
    }
}

/// Tabular Q-learning with ε-greedy exploration. ε decays after every update.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    params: Hyperparameters,
    q_table: QTable,
    epsilon: f64,
    step_count: u64,
    rng: StdRng,
}

impl QLearningAgent {
    pub fn new(params: Hyperparameters) -> Result<Self, AgentError> {
        Self::build(params, StdRng::from_entropy())
    }

    /// Same as `new`, with reproducible exploration.
    pub fn with_seed(params: Hyperparameters, seed: u64) -> Result<Self, AgentError> {
        Self::build(params, StdRng::seed_from_u64(seed))
    }

    fn build(params: Hyperparameters, rng: StdRng) -> Result<Self, AgentError> {
        params.validate()?;
        Ok(QLearningAgent {
            params,
            q_table: QTable::new(),
            epsilon: params.epsilon,
            step_count: 0,
            rng,
        })
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.params
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Clamped to `[epsilon_min, 1]`.
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.min(1.0).max(self.params.epsilon_min);
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    /// Forgets everything learned and restores the initial ε.
    pub fn reset(&mut self) {
        self.q_table.clear();
        self.epsilon = self.params.epsilon;
        self.step_count = 0;
    }

    pub fn export_q_table(&self, path: &Path) -> Result<(), PersistError> {
        self.q_table.export_csv(path)
    }

    fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.params.epsilon_decay).max(self.params.epsilon_min);
    }

    fn write_meta(&self, path: &Path) -> Result<(), PersistError> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "agent_type: {}", self.name())?;
        writeln!(writer, "learning_rate: {}", self.params.learning_rate)?;
        writeln!(writer, "discount_factor: {}", self.params.discount_factor)?;
        writeln!(writer, "epsilon: {}", self.epsilon)?;
        writeln!(writer, "epsilon_min: {}", self.params.epsilon_min)?;
        writeln!(writer, "epsilon_decay: {}", self.params.epsilon_decay)?;
        writeln!(writer, "step_count: {}", self.step_count)?;
        writeln!(writer, "state_space_size: {}", self.q_table.len())?;
        writer.flush()?;
        Ok(())
    }

    /// Only `epsilon` and `step_count` are restored, other keys are informational.
    fn read_meta(&mut self, path: &Path) -> Result<(), PersistError> {
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "epsilon" => {
                    self.epsilon = value
                        .parse()
                        .map_err(|_| PersistError::Corrupt(format!("epsilon: {}", value)))?;
                }
                "step_count" => {
                    self.step_count = value
                        .parse()
                        .map_err(|_| PersistError::Corrupt(format!("step_count: {}", value)))?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Agent for QLearningAgent {
    fn choose_action(
        &mut self,
        state: &State,
        valid_actions: &[Action],
        training: bool,
    ) -> Result<Action, AgentError> {
        if valid_actions.is_empty() {
            return Err(AgentError::NoValidActions);
        }
        if training && self.rng.gen::<f64>() < self.epsilon {
            return valid_actions
                .choose(&mut self.rng)
                .copied()
                .ok_or(AgentError::NoValidActions);
        }
        self.best_action(state, valid_actions)
    }

    fn best_action(&self, state: &State, valid_actions: &[Action]) -> Result<Action, AgentError> {
        self.q_table
            .max_action(state, valid_actions)
            .ok_or(AgentError::NoValidActions)
    }

    /// `Q(s,a) += α (target - Q(s,a))`, the target taking the max over the
    /// actions valid in the next state only.
    fn learn(&mut self, experience: &Experience) {
        let current = self.q_table.get(&experience.state, experience.action);
        let target = if experience.done {
            experience.reward
        } else {
            let next = self
                .q_table
                .max_q(&experience.next_state, &experience.valid_next_actions)
                .unwrap_or(0.0);
            experience.reward + self.params.discount_factor * next
        };
        let updated = current + self.params.learning_rate * (target - current);
        self.q_table.set(&experience.state, experience.action, updated);

        self.decay_epsilon();
        self.step_count += 1;
    }

    fn q_value(&self, state: &State, action: Action) -> f64 {
        self.q_table.get(state, action)
    }

    fn q_values(&self, state: &State) -> QValues {
        self.q_table.get_all(state)
    }

    fn save(&self, base: &Path) -> Result<(), PersistError> {
        create_parent_dir(base)?;
        let table_path = with_extension(base, "qtable");
        let meta_path = with_extension(base, "meta");
        let table_tmp = with_extension(base, "qtable.tmp");
        let meta_tmp = with_extension(base, "meta.tmp");

        self.q_table.save_to_binary(&table_tmp)?;
        self.write_meta(&meta_tmp)?;
        fs::rename(&table_tmp, &table_path)?;
        fs::rename(&meta_tmp, &meta_path)?;

        log::info!(
            "saved {} agent to {} ({} states, {} steps, epsilon {:.4})",
            self.name(),
            base.display(),
            self.q_table.len(),
            self.step_count,
            self.epsilon
        );
        Ok(())
    }

    fn load(&mut self, base: &Path) -> Result<(), PersistError> {
        self.q_table.load_from_binary(&with_extension(base, "qtable"))?;
        self.read_meta(&with_extension(base, "meta"))?;
        log::info!(
            "loaded {} agent from {} ({} states, {} steps, epsilon {:.4})",
            self.name(),
            base.display(),
            self.q_table.len(),
            self.step_count,
            self.epsilon
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Q-Learning"
    }

    fn exploration_rate(&self) -> f64 {
        self.epsilon
    }

    fn state_count(&self) -> usize {
        self.q_table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> Hyperparameters {
        Hyperparameters {
            learning_rate: 0.1,
            discount_factor: 0.9,
            epsilon: 1.0,
            epsilon_decay: 0.999,
            epsilon_min: 0.01,
        }
    }

    #[test]
    fn invalid_hyperparameters_fail_construction() {
        let mut params = test_params();
        params.learning_rate = 0.0;
        assert!(matches!(
            QLearningAgent::new(params),
            Err(AgentError::InvalidHyperparameters(_))
        ));

        let mut params = test_params();
        params.epsilon = 0.5;
        params.epsilon_min = 0.6;
        assert!(QLearningAgent::new(params).is_err());

        let mut params = test_params();
        params.discount_factor = 1.5;
        assert!(QLearningAgent::new(params).is_err());
    }

    #[test]
    fn fresh_agent() {
        let agent = QLearningAgent::new(test_params()).unwrap();
        assert_eq!(agent.name(), "Q-Learning");
        assert_eq!(agent.exploration_rate(), 1.0);
        assert_eq!(agent.state_count(), 0);
        assert_eq!(agent.step_count(), 0);
    }

    #[test]
    fn empty_valid_actions_is_an_error() {
        let mut agent = QLearningAgent::with_seed(test_params(), 1).unwrap();
        let state = State::new(16, 10, false);
        assert!(matches!(
            agent.choose_action(&state, &[], true),
            Err(AgentError::NoValidActions)
        ));
        assert!(agent.best_action(&state, &[]).is_err());
    }

    #[test]
    fn full_exploration_tries_every_action() {
        let mut agent = QLearningAgent::with_seed(test_params(), 2).unwrap();
        let state = State::new(16, 10, false);
        let mut hits = 0;
        let mut stands = 0;
        for _ in 0..100 {
            match agent.choose_action(&state, &[Action::Hit, Action::Stand], true).unwrap() {
                Action::Hit => hits += 1,
                Action::Stand => stands += 1,
                other => panic!("{} is not a valid action here", other),
            }
        }
        assert!(hits > 0);
        assert!(stands > 0);
    }

    #[test]
    fn degenerate_learning_prefers_stand() {
        let mut agent = QLearningAgent::with_seed(test_params(), 3).unwrap();
        let state = State::new(20, 10, false);
        for _ in 0..100 {
            agent.learn(&Experience::terminal(state, Action::Hit, -1.0));
        }
        for _ in 0..100 {
            agent.learn(&Experience::terminal(state, Action::Stand, 1.0));
        }
        agent.set_epsilon(0.0);
        assert_eq!(agent.exploration_rate(), 0.01);
        assert!(agent.q_value(&state, Action::Stand) > agent.q_value(&state, Action::Hit));
        assert_eq!(
            agent.choose_action(&state, &[Action::Hit, Action::Stand], false).unwrap(),
            Action::Stand
        );
    }

    #[test]
    fn hard_16_vs_10_learns_to_hit() {
        let mut agent = QLearningAgent::with_seed(test_params(), 4).unwrap();
        let state = State::new(16, 10, false);
        let hit_rewards = [1.0, -0.4, 1.0, -0.4, 0.3];
        for i in 0..100 {
            agent.learn(&Experience::terminal(state, Action::Hit, hit_rewards[i % 5]));
            agent.learn(&Experience::terminal(state, Action::Stand, -1.0));
        }
        assert_eq!(
            agent.best_action(&state, &[Action::Hit, Action::Stand]).unwrap(),
            Action::Hit
        );
    }

    #[test]
    fn target_uses_only_valid_next_actions() {
        let mut agent = QLearningAgent::with_seed(test_params(), 5).unwrap();
        let next = State::new(15, 10, false);
        agent.learn(&Experience::terminal(next, Action::Split, 10.0));
        agent.learn(&Experience::terminal(next, Action::Stand, -1.0));
        let stand_next = agent.q_value(&next, Action::Stand);

        let state = State::new(12, 10, false);
        agent.learn(&Experience {
            state,
            action: Action::Hit,
            reward: 0.0,
            next_state: next,
            done: false,
            valid_next_actions: vec![Action::Hit, Action::Stand],
        });
        let expected = 0.1 * 0.9 * stand_next.max(0.0);
        assert!((agent.q_value(&state, Action::Hit) - expected).abs() < 1e-12);
    }

    #[test]
    fn epsilon_decays_monotonically_to_its_floor() {
        let mut agent = QLearningAgent::with_seed(test_params(), 6).unwrap();
        let state = State::new(13, 2, false);
        let mut previous = agent.exploration_rate();
        for i in 0..10_000 {
            agent.learn(&Experience::terminal(state, Action::Stand, (i % 3) as f64 - 1.0));
            let epsilon = agent.exploration_rate();
            assert!(epsilon <= previous);
            assert!(epsilon >= 0.01);
            previous = epsilon;
        }
        assert_eq!(agent.exploration_rate(), 0.01);
        assert_eq!(agent.step_count(), 10_000);
    }

    #[test]
    fn checkpoint_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("checkpoints").join("agent_episode_500");
        let mut agent = QLearningAgent::with_seed(test_params(), 7).unwrap();
        for total in 4..=21 {
            for dealer in 1..=10 {
                let state = State::new(total, dealer, total % 2 == 0 && total >= 13);
                let action = if total > 16 { Action::Stand } else { Action::Hit };
                agent.learn(&Experience::terminal(state, action, (dealer as f64 - 5.0) / 10.0));
            }
        }
        agent.save(&base).unwrap();
        assert!(with_extension(&base, "qtable").exists());
        assert!(with_extension(&base, "meta").exists());
        assert!(!with_extension(&base, "qtable.tmp").exists());

        let mut loaded = QLearningAgent::new(test_params()).unwrap();
        loaded.load(&base).unwrap();
        assert_eq!(loaded.state_count(), agent.state_count());
        assert_eq!(loaded.step_count(), agent.step_count());
        assert_eq!(loaded.exploration_rate(), agent.exploration_rate());
        for state in agent.q_table().visited_states() {
            assert_eq!(loaded.q_values(&state), agent.q_values(&state));
        }
    }

    #[test]
    fn load_of_missing_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = QLearningAgent::new(test_params()).unwrap();
        assert!(matches!(
            agent.load(&dir.path().join("nothing")),
            Err(PersistError::Io(_))
        ));
    }

    #[test]
    fn reset_forgets() {
        let mut agent = QLearningAgent::with_seed(test_params(), 8).unwrap();
        agent.learn(&Experience::terminal(State::new(12, 2, false), Action::Hit, 1.0));
        agent.reset();
        assert_eq!(agent.state_count(), 0);
        assert_eq!(agent.exploration_rate(), 1.0);
        assert_eq!(agent.step_count(), 0);
    }
}
