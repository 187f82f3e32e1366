mod qlearning;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::qtable::QValues;
use crate::{Action, AgentError, PersistError, State};

pub use self::qlearning::{Hyperparameters, QLearningAgent};

/// One decision and what followed it. `valid_next_actions` is what the player
/// could do in `next_state`; it is empty when `done`.
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub state: State,
    pub action: Action,
    pub reward: f64,
    pub next_state: State,
    pub done: bool,
    pub valid_next_actions: Vec<Action>,
}

impl Experience {
    pub fn terminal(state: State, action: Action, reward: f64) -> Experience {
        Experience {
            state,
            action,
            reward,
            next_state: State::default(),
            done: true,
            valid_next_actions: Vec::new(),
        }
    }
}

/// A learning player.
///
/// `choose_action` may explore while training; `best_action` only exploits and
/// works through a shared borrow, which is all an evaluation needs.
pub trait Agent {
    fn choose_action(
        &mut self,
        state: &State,
        valid_actions: &[Action],
        training: bool,
    ) -> Result<Action, AgentError>;

    fn best_action(&self, state: &State, valid_actions: &[Action]) -> Result<Action, AgentError>;

    fn learn(&mut self, experience: &Experience);

    fn q_value(&self, state: &State, action: Action) -> f64;

    fn q_values(&self, state: &State) -> QValues;

    /// Writes the checkpoint pair `<base>.qtable` and `<base>.meta`.
    fn save(&self, base: &Path) -> Result<(), PersistError>;

    fn load(&mut self, base: &Path) -> Result<(), PersistError>;

    fn name(&self) -> &'static str;

    fn exploration_rate(&self) -> f64 {
        0.0
    }

    fn state_count(&self) -> usize {
        0
    }
}

pub(crate) fn with_extension(base: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}
