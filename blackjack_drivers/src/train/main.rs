use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use blackjack::agent::{Agent, QLearningAgent};
use blackjack::strategy::BasicStrategy;
use blackjack::training::{
    write_suggestions, ConvergenceReport, StrategyChart, Trainer, TrainingSummary,
};
use blackjack_drivers::{init_logging, resolve_config_path, spawn_signal_listener, Config};
use clap::Parser;

const FINAL_MODEL_PATH: &str = "./models/final_agent";
const Q_TABLE_EXPORT_PATH: &str = "./analysis/q_table.csv";

/// Train a Q-learning blackjack agent.
#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// INI or YAML config file. Defaults to ~/.blackjack.yml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the shoe and the agent
    #[arg(long)]
    seed: Option<u64>,

    /// Episodes to train, overrides the config file
    episodes: Option<u64>,

    /// Checkpoint to resume from, without the .qtable/.meta extension
    checkpoint: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = CommandLineArgs::parse();

    println!("========================");
    println!("Blackjack Q-Learning Training");
    println!("========================\n");

    let config = match resolve_config_path(args.config.as_deref()) {
        Some(path) => {
            let config = Config::load(&path)
                .with_context(|| format!("error loading config {}", path.display()))?;
            println!("Config loaded: {}\n", path.display());
            config
        }
        None => Config::default(),
    };

    let mut training = config.training_config()?;
    if let Some(episodes) = args.episodes {
        training.episodes = episodes;
    }
    if args.seed.is_some() {
        training.seed = args.seed;
    }
    let log_file = init_logging(&training.log_dir, training.verbose)?;
    log::debug!("logging to {}", log_file.display());

    let mut agent = match training.seed {
        Some(seed) => QLearningAgent::with_seed(training.hyperparameters, seed)?,
        None => QLearningAgent::new(training.hyperparameters)?,
    };
    if let Some(checkpoint) = &args.checkpoint {
        println!("Loading checkpoint: {}\n", checkpoint.display());
        agent
            .load(checkpoint)
            .with_context(|| format!("cannot load checkpoint {}", checkpoint.display()))?;
    }
    let agent = Rc::new(RefCell::new(agent));

    let mut trainer = Trainer::new(Rc::clone(&agent), training)?;
    spawn_signal_listener(trainer.control().stop_flag())?;

    let mut best_win_rate = 0.0;
    trainer.set_progress_callback(move |metrics| {
        if metrics.win_rate > best_win_rate {
            best_win_rate = metrics.win_rate;
            log::debug!(
                "best evaluation so far: {:.2}% at episode {}",
                best_win_rate * 100.0,
                metrics.total_episodes
            );
        }
    });

    println!("Starting training...");
    println!("Press Ctrl+C to stop and save checkpoint\n");

    let summary = trainer.train()?;

    let agent = agent.borrow();
    let strategy = BasicStrategy::new();
    print!("{}", StrategyChart::default().render(&*agent, &strategy, false));
    print!("{}", ConvergenceReport::default().render(&summary.convergence));
    print!("{}", write_suggestions(&summary.convergence, &summary.metrics));

    print_summary(&summary);
    save_final_model(&agent)?;

    println!("\nTraining complete. Check logs/ directory for detailed metrics.");
    Ok(())
}

fn print_summary(summary: &TrainingSummary) {
    let metrics = &summary.metrics;
    let seconds = summary.duration.as_secs();

    println!();
    println!("==================================");
    println!("     Training Complete!           ");
    println!("==================================");
    println!("Stopped:         {}", summary.stop_reason);
    println!("Total episodes:  {}", metrics.total_episodes);
    println!("Training time:   {} seconds", seconds);
    println!("Episodes/sec:    {}\n", metrics.total_episodes / seconds.max(1));

    println!("Final Performance:");
    println!("  Win rate:   {:.2}%", metrics.win_rate * 100.0);
    println!("  Loss rate:  {:.2}%", metrics.loss_rate * 100.0);
    println!("  Push rate:  {:.2}%", metrics.push_rate * 100.0);
    println!("  Avg reward: {:.4}", metrics.avg_reward);
    println!("  Bust rate:  {:.2}%\n", metrics.bust_rate * 100.0);

    println!("Learning Progress:");
    println!("  States learned: {}", metrics.states_learned);
    println!("  Final epsilon:  {:.6}\n", metrics.current_epsilon);

    if let Some(path) = &summary.report_path {
        println!("Training report:     {}", path.display());
    }
}

fn save_final_model(agent: &QLearningAgent) -> anyhow::Result<()> {
    agent
        .save(Path::new(FINAL_MODEL_PATH))
        .with_context(|| format!("cannot save final model to {}", FINAL_MODEL_PATH))?;
    println!("Final model saved to: {}", FINAL_MODEL_PATH);

    agent
        .export_q_table(Path::new(Q_TABLE_EXPORT_PATH))
        .with_context(|| format!("cannot export q-table to {}", Q_TABLE_EXPORT_PATH))?;
    println!("Q-table exported to:  {}", Q_TABLE_EXPORT_PATH);
    Ok(())
}
