use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::agent::{Agent, Experience, Hyperparameters};
use crate::simulation::{Outcome, Round};
use crate::{RulesPreset, Rule, State, TrainingError};

use super::{ConvergenceReport, ConvergenceResult, Evaluator, MetricsLogger, TrainingReport};

const METRICS_SMOOTHING: f64 = 0.01;
const PAUSE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub episodes: u64,
    /// Evaluate every N episodes, 0 for never.
    pub eval_frequency: u64,
    pub eval_games: u64,
    /// Save a checkpoint every N episodes, 0 for never.
    pub checkpoint_frequency: u64,
    pub checkpoint_dir: PathBuf,
    pub log_dir: PathBuf,
    pub report_dir: PathBuf,
    pub rule: Rule,
    /// Name of the rule set, only echoed into the report.
    pub rules_preset: String,
    pub verbose: bool,
    /// Evaluations without improvement before stopping.
    pub early_stopping_patience: u64,
    pub min_improvement: f64,
    pub seed: Option<u64>,
    pub hyperparameters: Hyperparameters,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            episodes: 1_000_000,
            eval_frequency: 10_000,
            eval_games: 1_000,
            checkpoint_frequency: 50_000,
            checkpoint_dir: PathBuf::from("./checkpoints"),
            log_dir: PathBuf::from("./logs"),
            report_dir: PathBuf::from("./reports"),
            rule: RulesPreset::VegasStrip.rule(),
            rules_preset: RulesPreset::VegasStrip.name().to_string(),
            verbose: true,
            early_stopping_patience: 10,
            min_improvement: 0.001,
            seed: None,
            hyperparameters: Hyperparameters::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeStats {
    pub episode_number: u64,
    /// Decisions the agent took; 0 when a natural ended the round.
    pub hands_played: usize,
    pub reward: f64,
    /// Outcome of the first hand.
    pub outcome: Outcome,
    pub player_busted: bool,
    pub dealer_busted: bool,
}

/// Rates are smoothed over episodes between evaluations and replaced by the
/// evaluation figures at each evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrainingMetrics {
    pub total_episodes: u64,
    pub avg_reward: f64,
    pub win_rate: f64,
    pub loss_rate: f64,
    pub push_rate: f64,
    pub bust_rate: f64,
    pub current_epsilon: f64,
    pub states_learned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    EarlyStopping,
    Interrupted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            StopReason::Completed => "completed",
            StopReason::EarlyStopping => "early stopping",
            StopReason::Interrupted => "interrupted",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub metrics: TrainingMetrics,
    pub stop_reason: StopReason,
    pub convergence: ConvergenceResult,
    pub duration: Duration,
    /// None when the report could not be written.
    pub report_path: Option<PathBuf>,
}

/// Stop and pause switches a running trainer polls before every episode.
/// Clones share the same switches.
#[derive(Debug, Clone, Default)]
pub struct TrainerControl {
    stop: Arc<AtomicBool>,
    pause: Arc<(Mutex<bool>, Condvar)>,
}

impl TrainerControl {
    pub fn new() -> Self {
        TrainerControl::default()
    }

    /// The raw stop flag, for handlers that must not block.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.pause.1.notify_all();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        let (lock, _) = &*self.pause;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn resume(&self) {
        let (lock, cvar) = &*self.pause;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = false;
        cvar.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *self.pause.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks while paused. A stop request also releases the wait.
    pub fn wait_while_paused(&self) {
        let (lock, cvar) = &*self.pause;
        let mut paused = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while *paused && !self.is_stop_requested() {
            paused = match cvar.wait_timeout(paused, PAUSE_POLL) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Sum over hands of each outcome's reward, doubled hands counting twice.
pub fn total_reward(outcomes: &[Outcome], doubled: &[bool]) -> f64 {
    outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| outcome.reward(doubled.get(i).copied().unwrap_or(false)))
        .sum()
}

/// Runs training episodes for an agent shared with the caller, with periodic
/// evaluation, metrics logging, checkpoints and early stopping.
pub struct Trainer<A: Agent> {
    agent: Rc<RefCell<A>>,
    config: TrainingConfig,
    round: Round,
    evaluator: Evaluator,
    logger: MetricsLogger,

    metrics: TrainingMetrics,
    history: Vec<TrainingMetrics>,
    progress_callback: Option<Box<dyn FnMut(&TrainingMetrics)>>,
    control: TrainerControl,

    episodes_since_improvement: u64,
    best_win_rate: f64,
    stop_reason: StopReason,
    started: Instant,
}

impl<A: Agent> Trainer<A> {
    pub fn new(agent: Rc<RefCell<A>>, config: TrainingConfig) -> Result<Self, TrainingError> {
        config.rule.validate()?;
        fs::create_dir_all(&config.checkpoint_dir)?;
        let logger = MetricsLogger::create(&config.log_dir)?;

        let round = Round::new(&config.rule, config.seed);
        let evaluator = Evaluator::new(&config.rule, config.seed.map(|s| s.wrapping_add(1)));

        log::info!(
            "training configuration: {} episodes, eval every {} ({} games), checkpoint every {}",
            config.episodes,
            config.eval_frequency,
            config.eval_games,
            config.checkpoint_frequency
        );
        log::info!(
            "checkpoints in {}, logs in {}, metrics in {}",
            config.checkpoint_dir.display(),
            config.log_dir.display(),
            logger.path().display()
        );

        Ok(Trainer {
            agent,
            config,
            round,
            evaluator,
            logger,
            metrics: TrainingMetrics::default(),
            history: Vec::new(),
            progress_callback: None,
            control: TrainerControl::new(),
            episodes_since_improvement: 0,
            best_win_rate: 0.0,
            stop_reason: StopReason::Completed,
            started: Instant::now(),
        })
    }

    pub fn agent(&self) -> Rc<RefCell<A>> {
        Rc::clone(&self.agent)
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn metrics(&self) -> TrainingMetrics {
        self.metrics
    }

    /// Metrics recorded at each evaluation, oldest first.
    pub fn history(&self) -> &[TrainingMetrics] {
        &self.history
    }

    pub fn control(&self) -> TrainerControl {
        self.control.clone()
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn metrics_log_path(&self) -> &Path {
        self.logger.path()
    }

    /// Called after each periodic evaluation.
    pub fn set_progress_callback(&mut self, callback: impl FnMut(&TrainingMetrics) + 'static) {
        self.progress_callback = Some(Box::new(callback));
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn should_stop_early(&self) -> bool {
        self.episodes_since_improvement >= self.config.early_stopping_patience
    }

    /// Trains for the configured number of episodes, then analyses the policy
    /// and writes the training report.
    pub fn train(&mut self) -> Result<TrainingSummary, TrainingError> {
        let metrics = self.train_episodes(self.config.episodes)?;

        let convergence = {
            let agent = self.agent.borrow();
            ConvergenceReport::default().analyze(&*agent, self.evaluator.basic_strategy())
        };
        let duration = self.started.elapsed();
        let report = TrainingReport {
            config: &self.config,
            metrics: &metrics,
            duration,
            convergence: &convergence,
        };
        let report_path = {
            let agent = self.agent.borrow();
            match report.save(&*agent, self.evaluator.basic_strategy(), &self.config.report_dir) {
                Ok(path) => {
                    log::info!("training report saved: {}", path.display());
                    Some(path)
                }
                Err(err) => {
                    log::warn!(
                        "could not write training report to {}: {}",
                        self.config.report_dir.display(),
                        err
                    );
                    None
                }
            }
        };

        Ok(TrainingSummary {
            metrics,
            stop_reason: self.stop_reason,
            convergence,
            duration,
            report_path,
        })
    }

    /// Trains `episodes` more episodes, then runs a final evaluation and saves a final checkpoint.
    pub fn train_episodes(&mut self, episodes: u64) -> Result<TrainingMetrics, TrainingError> {
        log::info!("starting training for {} episodes", episodes);
        let start = self.metrics.total_episodes;
        let progress = self.progress_bar(episodes);
        self.stop_reason = StopReason::Completed;

        for episode in start..start + episodes {
            self.control.wait_while_paused();
            if self.control.is_stop_requested() {
                log::info!("stop requested at episode {}", episode + 1);
                self.stop_reason = StopReason::Interrupted;
                break;
            }

            let mut stats = self.run_episode()?;
            stats.episode_number = episode + 1;
            self.update_metrics(&stats);
            self.metrics.total_episodes = stats.episode_number;

            if is_due(stats.episode_number, self.config.eval_frequency) {
                self.evaluate()?;
                if let Some(callback) = self.progress_callback.as_mut() {
                    callback(&self.metrics);
                }
                progress.set_message(format!(
                    "Win: {}% | eps: {:.3}",
                    (self.metrics.win_rate * 100.0) as u32,
                    self.metrics.current_epsilon
                ));
                if self.should_stop_early() {
                    log::info!("early stopping triggered at episode {}", stats.episode_number);
                    self.stop_reason = StopReason::EarlyStopping;
                    break;
                }
            }

            if is_due(stats.episode_number, self.config.checkpoint_frequency) {
                self.save_checkpoint(stats.episode_number);
            }
            progress.inc(1);
        }

        log::info!("running final evaluation");
        self.evaluate()?;
        progress.finish_with_message("Done");
        self.save_checkpoint(self.metrics.total_episodes);

        log::info!(
            "training {}: {} episodes, win rate {:.2}%, {} states learned",
            self.stop_reason,
            self.metrics.total_episodes,
            self.metrics.win_rate * 100.0,
            self.metrics.states_learned
        );
        Ok(self.metrics)
    }

    /// Plays one round with exploration, then learns from its decisions in
    /// order. Only the last decision carries the round's reward.
    pub fn run_episode(&mut self) -> Result<EpisodeStats, TrainingError> {
        self.round.start_round()?;
        let mut agent = self.agent.borrow_mut();
        let mut experiences: Vec<Experience> = Vec::new();

        while !self.round.is_complete() {
            let state = self.round.state();
            let valid_actions = self.round.valid_actions();
            let action = agent.choose_action(&state, &valid_actions, true)?;
            self.round.apply(action)?;

            let done = self.round.is_complete();
            let (next_state, valid_next_actions) = if done {
                (State::default(), Vec::new())
            } else {
                (self.round.state(), self.round.valid_actions())
            };
            experiences.push(Experience {
                state,
                action,
                reward: 0.0,
                next_state,
                done,
                valid_next_actions,
            });
        }

        let outcomes = self.round.outcomes()?;
        let reward = total_reward(outcomes, self.round.doubled());
        if let Some(last) = experiences.last_mut() {
            last.reward = reward;
        }
        for experience in &experiences {
            agent.learn(experience);
        }

        Ok(EpisodeStats {
            episode_number: 0,
            hands_played: experiences.len(),
            reward,
            outcome: outcomes.first().copied().unwrap_or(Outcome::Push),
            player_busted: outcomes.contains(&Outcome::PlayerBust),
            dealer_busted: outcomes.contains(&Outcome::DealerBust),
        })
    }

    fn update_metrics(&mut self, stats: &EpisodeStats) {
        let outcome = stats.outcome;
        let m = &mut self.metrics;
        m.avg_reward = smooth(m.avg_reward, stats.reward);
        m.win_rate = smooth(m.win_rate, indicator(outcome.is_win()));
        m.push_rate = smooth(m.push_rate, indicator(outcome.is_push()));
        m.loss_rate = smooth(m.loss_rate, indicator(outcome.is_loss()));
        m.bust_rate = smooth(m.bust_rate, indicator(stats.player_busted));
    }

    fn evaluate(&mut self) -> Result<(), TrainingError> {
        let agent = self.agent.borrow();
        let result = self.evaluator.evaluate(&*agent, self.config.eval_games, true)?;

        self.metrics.win_rate = result.win_rate;
        self.metrics.loss_rate = result.loss_rate;
        self.metrics.push_rate = result.push_rate;
        self.metrics.avg_reward = result.avg_reward;
        self.metrics.bust_rate = result.bust_rate;
        self.metrics.current_epsilon = agent.exploration_rate();
        self.metrics.states_learned = agent.state_count();

        if let Err(err) = self.logger.log(&self.metrics) {
            log::warn!("could not write metrics row: {}", err);
        }
        self.history.push(self.metrics);

        if result.win_rate > self.best_win_rate + self.config.min_improvement {
            self.best_win_rate = result.win_rate;
            self.episodes_since_improvement = 0;
        } else {
            self.episodes_since_improvement += 1;
        }

        log::info!(
            "evaluation at episode {}: win rate {:.2}%, avg reward {:.4}, epsilon {:.4}, {} states, strategy accuracy {:.1}%",
            self.metrics.total_episodes,
            result.win_rate * 100.0,
            result.avg_reward,
            self.metrics.current_epsilon,
            self.metrics.states_learned,
            result.strategy_accuracy * 100.0
        );
        log::debug!(
            "{} evaluations since improvement, best win rate {:.4}",
            self.episodes_since_improvement,
            self.best_win_rate
        );
        Ok(())
    }

    /// A failed save is logged and training goes on.
    fn save_checkpoint(&self, episode: u64) {
        let path = self
            .config
            .checkpoint_dir
            .join(format!("agent_episode_{}", episode));
        if let Err(err) = self.agent.borrow().save(&path) {
            log::warn!("could not save checkpoint {}: {}", path.display(), err);
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.verbose {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    }
}

fn is_due(episode: u64, frequency: u64) -> bool {
    frequency > 0 && episode % frequency == 0
}

fn smooth(current: f64, sample: f64) -> f64 {
    METRICS_SMOOTHING * sample + (1.0 - METRICS_SMOOTHING) * current
}

fn indicator(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}
