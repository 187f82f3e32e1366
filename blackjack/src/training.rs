mod chart;
mod convergence;
mod evaluator;
mod logger;
mod report;
mod trainer;

pub use self::{
    chart::StrategyChart,
    convergence::{q_margin, ConvergenceReport, ConvergenceResult, Divergence},
    evaluator::{EvaluationResult, Evaluator},
    logger::{MetricsLogger, METRICS_HEADER},
    report::{write_suggestions, TrainingReport},
    trainer::{
        total_reward, EpisodeStats, StopReason, Trainer, TrainerControl, TrainingConfig,
        TrainingMetrics, TrainingSummary,
    },
};
