mod coach;
mod modes;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use blackjack::agent::{Agent, Hyperparameters, QLearningAgent};
use blackjack::simulation::Round;
use blackjack::Rule;
use blackjack_drivers::{init_terminal_logging, rule_from_preset, Config};
use clap::{Parser, ValueEnum};
use dialoguer::Select;

use modes::{Mode, Session};

/// Play blackjack alone, watch a trained agent, or let it advise you.
#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// Play mode, asked interactively when omitted
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Trained model, without the .qtable/.meta extension
    #[arg(long)]
    model: Option<PathBuf>,

    /// Number of hands to play, 0 to keep going until you stop
    #[arg(short = 'n', long, default_value_t = 10)]
    hands: u32,

    /// Rules preset, overrides the config file [default: vegas-strip]
    #[arg(short, long)]
    rules: Option<String>,

    /// INI or YAML config file to take the rules from
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the strategy chart and convergence report of --model, then exit
    #[arg(long)]
    report: bool,

    /// Plain-English explanations, chip balance and AI reasoning
    #[arg(short, long)]
    beginner: bool,
}

fn main() -> anyhow::Result<()> {
    init_terminal_logging(log::LevelFilter::Warn)?;
    let args = CommandLineArgs::parse();

    if args.report {
        let Some(model) = &args.model else {
            bail!("--report requires --model PATH");
        };
        let agent = load_agent(model)?;
        modes::print_report(&agent);
        return Ok(());
    }

    let mode = match args.mode {
        Some(mode) => mode,
        None => choose_mode()?,
    };

    let agent = match (mode, &args.model) {
        (Mode::Human, _) => None,
        (_, Some(model)) => {
            let agent = load_agent(model)?;
            if !args.beginner {
                println!("Loaded model: {}", model.display());
                println!("States learned: {}\n", agent.state_count());
            }
            Some(agent)
        }
        (_, None) => bail!(
            "--model PATH required for {} mode",
            format!("{:?}", mode).to_lowercase()
        ),
    };

    let rule = table_rule(&args)?;
    let mut session = Session::new(Round::new(&rule, None), args.hands, args.beginner);
    match (mode, &agent) {
        (Mode::Ai, Some(agent)) => session.play_ai(agent),
        (Mode::Advisor, Some(agent)) => session.play_advisor(agent),
        _ => session.play_human(),
    }
}

/// `--rules` first, then the config file, then Vegas Strip.
fn table_rule(args: &CommandLineArgs) -> anyhow::Result<Rule> {
    if let Some(preset) = &args.rules {
        return Ok(rule_from_preset(preset));
    }
    match &args.config {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("error loading config {}", path.display()))?;
            Ok(config.rule()?)
        }
        None => Ok(rule_from_preset("vegas-strip")),
    }
}

fn load_agent(model: &Path) -> anyhow::Result<QLearningAgent> {
    let mut agent = QLearningAgent::new(Hyperparameters::default())?;
    agent
        .load(model)
        .with_context(|| format!("cannot load model {}", model.display()))?;
    Ok(agent)
}

fn choose_mode() -> anyhow::Result<Mode> {
    let modes = Mode::value_variants();
    let labels: Vec<String> = modes
        .iter()
        .filter_map(|m| m.to_possible_value())
        .map(|v| match v.get_help() {
            Some(help) => format!("{:<8} {}", v.get_name(), help),
            None => v.get_name().to_string(),
        })
        .collect();
    let choice = Select::new()
        .with_prompt("Play mode")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(modes[choice])
}
