use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use blackjack::agent::Hyperparameters;
use blackjack::training::TrainingConfig;
use blackjack::{Rule, RuleError, RulesPreset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Config file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_PATH: &str = "~/.blackjack.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Every key a config file may set. Missing keys keep their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub episodes: u64,

    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon: f64,
    pub epsilon_decay: f64,
    pub epsilon_min: f64,

    pub eval_frequency: u64,
    pub eval_games: u64,
    pub checkpoint_frequency: u64,
    pub checkpoint_dir: String,
    pub log_dir: String,
    pub report_dir: String,
    #[serde(deserialize_with = "flag")]
    pub verbose: bool,
    pub early_stopping_patience: u64,
    pub min_improvement: f64,
    pub seed: Option<u64>,

    pub rules_preset: String,
    pub num_decks: Option<u8>,
    #[serde(deserialize_with = "optional_flag")]
    pub dealer_hits_soft_17: Option<bool>,
    #[serde(deserialize_with = "optional_flag")]
    pub surrender: Option<bool>,
    pub penetration: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        let params = Hyperparameters::default();
        Config {
            episodes: 1_000_000,
            learning_rate: params.learning_rate,
            discount_factor: params.discount_factor,
            epsilon: params.epsilon,
            epsilon_decay: params.epsilon_decay,
            epsilon_min: params.epsilon_min,
            eval_frequency: 10_000,
            eval_games: 1_000,
            checkpoint_frequency: 50_000,
            checkpoint_dir: String::from("./checkpoints"),
            log_dir: String::from("./logs"),
            report_dir: String::from("./reports"),
            verbose: true,
            early_stopping_patience: 10,
            min_improvement: 0.001,
            seed: None,
            rules_preset: RulesPreset::VegasStrip.name().to_string(),
            num_decks: None,
            dealer_hits_soft_17: None,
            surrender: None,
            penetration: None,
        }
    }
}

impl Config {
    /// Reads `.yml`/`.yaml` files as YAML and anything else as `key = value` lines.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        if is_yaml {
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Config::from_ini_str(&content)
        }
    }

    pub fn from_ini_str(content: &str) -> Result<Config, ConfigError> {
        let mapping = parse_ini(content);
        Ok(serde_yaml::from_value(Value::Mapping(mapping))?)
    }

    pub fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            learning_rate: self.learning_rate,
            discount_factor: self.discount_factor,
            epsilon: self.epsilon,
            epsilon_decay: self.epsilon_decay,
            epsilon_min: self.epsilon_min,
        }
    }

    /// The preset's rules with the per-field overrides applied.
    pub fn rule(&self) -> Result<Rule, ConfigError> {
        let mut rule = rule_from_preset(&self.rules_preset);
        if let Some(decks) = self.num_decks {
            rule.number_of_decks = decks;
        }
        if let Some(h17) = self.dealer_hits_soft_17 {
            rule.dealer_hit_on_soft17 = h17;
        }
        if let Some(surrender) = self.surrender {
            rule.allow_late_surrender = surrender;
        }
        if let Some(penetration) = self.penetration {
            rule.penetration = penetration;
        }
        rule.validate()?;
        Ok(rule)
    }

    pub fn training_config(&self) -> Result<TrainingConfig, ConfigError> {
        let hyperparameters = self.hyperparameters();
        hyperparameters
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(TrainingConfig {
            episodes: self.episodes,
            eval_frequency: self.eval_frequency,
            eval_games: self.eval_games,
            checkpoint_frequency: self.checkpoint_frequency,
            checkpoint_dir: expand_home(&self.checkpoint_dir),
            log_dir: expand_home(&self.log_dir),
            report_dir: expand_home(&self.report_dir),
            rule: self.rule()?,
            rules_preset: self.rules_preset.clone(),
            verbose: self.verbose,
            early_stopping_patience: self.early_stopping_patience,
            min_improvement: self.min_improvement,
            seed: self.seed,
            hyperparameters,
        })
    }
}

/// Rules for a hyphenated preset name. Unknown names fall back to the default rules.
pub fn rule_from_preset(name: &str) -> Rule {
    match name.parse::<RulesPreset>() {
        Ok(preset) => preset.rule(),
        Err(_) => {
            log::warn!(
                "unknown rules preset '{}', falling back to default rules",
                name
            );
            Rule::default()
        }
    }
}

/// `key = value` pairs, one per line. `#` starts a comment; lines without `=`
/// are skipped. Values are read as YAML scalars so numbers and booleans keep
/// their type, and empty values are left out.
fn parse_ini(content: &str) -> Mapping {
    let mut mapping = Mapping::new();
    for line in content.lines() {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        let value = serde_yaml::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        mapping.insert(Value::String(key.to_string()), value);
    }
    mapping
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Flag {
    fn into_bool<E: serde::de::Error>(self) -> Result<bool, E> {
        match self {
            Flag::Bool(b) => Ok(b),
            Flag::Int(1) => Ok(true),
            Flag::Int(0) => Ok(false),
            Flag::Text(text) if text == "true" || text == "yes" || text == "1" => Ok(true),
            Flag::Text(text) if text == "false" || text == "no" || text == "0" => Ok(false),
            Flag::Int(n) => Err(E::custom(format!(
                "expected bool (true/false/1/0/yes/no), got '{}'",
                n
            ))),
            Flag::Text(text) => Err(E::custom(format!(
                "expected bool (true/false/1/0/yes/no), got '{}'",
                text
            ))),
        }
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Flag::deserialize(deserializer)?.into_bool()
}

fn optional_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Option::<Flag>::deserialize(deserializer)?
        .map(Flag::into_bool)
        .transpose()
}

/// Replaces a leading `~/` with the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home_dir) = home::home_dir() {
            return home_dir.join(rest);
        }
    }
    PathBuf::from(path)
}

/// The file to read: the given path, or the default config when it exists.
pub fn resolve_config_path(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = expand_home(DEFAULT_CONFIG_PATH);
            default.is_file().then_some(default)
        }
    }
}

/// Terminal logging at INFO (WARN when not verbose) plus a DEBUG log file
/// `<log_dir>/<unix seconds>.log`. Returns the file's path.
pub fn init_logging(log_dir: &Path, verbose: bool) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = log_dir.join(format!("{}.log", time));
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        File::create(&path)?,
    );
    let term_level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    let term = simplelog::TermLogger::new(
        term_level,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file])?;
    Ok(path)
}

/// Terminal logging only, for the interactive front-end.
pub fn init_terminal_logging(level: log::LevelFilter) -> anyhow::Result<()> {
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    Ok(())
}

/// Sets `stop` on the first SIGINT or SIGTERM; a second one exits at once.
/// The listener runs its own single-threaded runtime on a helper thread.
pub fn spawn_signal_listener(stop: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name(String::from("signals"))
        .spawn(move || {
            runtime.block_on(async move {
                let signum = wait_for_signal().await;
                println!("\n\nInterrupt signal ({}) received.", signum);
                println!("Requesting clean stop...");
                stop.store(true, Ordering::SeqCst);

                wait_for_signal().await;
                log::warn!("second interrupt received, exiting immediately");
                std::process::exit(130);
            })
        })
}

#[cfg(unix)]
async fn wait_for_signal() -> i32 {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => tokio::select! {
            _ = tokio::signal::ctrl_c() => 2,
            _ = terminate.recv() => 15,
        },
        Err(err) => {
            log::warn!("cannot listen for SIGTERM: {}", err);
            let _ = tokio::signal::ctrl_c().await;
            2
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> i32 {
    let _ = tokio::signal::ctrl_c().await;
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPICAL_INI: &str = "\
# training run
episodes = 200000
learning_rate = 0.05   # slower
epsilon_decay=0.9999

verbose = no
eval_frequency = 5000
checkpoint_dir = ~/bj/checkpoints
rules_preset = downtown
dealer_hits_soft_17 = 0
not a pair
";

    #[test]
    fn defaults_without_keys() {
        let config = Config::from_ini_str("").unwrap();
        assert_eq!(config, Config::default());
        let training = config.training_config().unwrap();
        assert_eq!(training.episodes, 1_000_000);
        assert_eq!(training.eval_games, 1_000);
        assert_eq!(training.checkpoint_dir, PathBuf::from("./checkpoints"));
        assert_eq!(training.rule, RulesPreset::VegasStrip.rule());
        assert_eq!(training.hyperparameters, Hyperparameters::default());
    }

    #[test]
    fn can_read_ini() {
        let config = Config::from_ini_str(TYPICAL_INI).unwrap();
        assert_eq!(config.episodes, 200_000);
        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.epsilon_decay, 0.9999);
        assert!(!config.verbose);
        assert_eq!(config.eval_frequency, 5_000);
        assert_eq!(config.rules_preset, "downtown");
        assert_eq!(config.dealer_hits_soft_17, Some(false));
        assert_eq!(config.surrender, None);

        let rule = config.rule().unwrap();
        assert_eq!(rule.number_of_decks, 2);
        assert!(!rule.dealer_hit_on_soft17);
        assert!(rule.allow_late_surrender);

        let training = config.training_config().unwrap();
        if let Some(home_dir) = home::home_dir() {
            assert_eq!(training.checkpoint_dir, home_dir.join("bj/checkpoints"));
        }
    }

    #[test]
    fn flags_accept_words_and_digits() {
        for (text, expected) in [("true", true), ("yes", true), ("1", true), ("no", false), ("0", false)] {
            let config = Config::from_ini_str(&format!("surrender = {}", text)).unwrap();
            assert_eq!(config.surrender, Some(expected));
        }
        assert!(Config::from_ini_str("verbose = maybe").is_err());
    }

    #[test]
    fn should_return_error_on_bad_number() {
        let err = Config::from_ini_str("episodes = lots").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_preset_falls_back_to_default_rules() {
        let config = Config::from_ini_str("rules_preset = mars").unwrap();
        assert_eq!(config.rule().unwrap(), Rule::default());
    }

    #[test]
    fn overrides_are_validated() {
        let config = Config::from_ini_str("num_decks = 0").unwrap();
        assert!(config.rule().is_err());
        let config = Config::from_ini_str("penetration = 1.5").unwrap();
        assert!(config.training_config().is_err());
        let config = Config::from_ini_str("epsilon_min = 2.0").unwrap();
        assert!(config.training_config().is_err());
    }

    #[test]
    fn loads_yaml_and_ini_files() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("train.yml");
        fs::write(&yaml, "episodes: 300\nsurrender: true\nseed: 7\n").unwrap();
        let config = Config::load(&yaml).unwrap();
        assert_eq!(config.episodes, 300);
        assert_eq!(config.surrender, Some(true));
        assert_eq!(config.seed, Some(7));

        let ini = dir.path().join("train.ini");
        fs::write(&ini, TYPICAL_INI).unwrap();
        assert_eq!(Config::load(&ini).unwrap().episodes, 200_000);

        let missing = dir.path().join("missing.ini");
        assert!(matches!(
            Config::load(&missing),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn explicit_config_path_wins() {
        let path = PathBuf::from("run.ini");
        assert_eq!(resolve_config_path(Some(&path)), Some(path));
    }
}
