use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::TrainingMetrics;

pub const METRICS_HEADER: &str =
    "episode,elapsed_sec,win_rate,loss_rate,push_rate,avg_reward,bust_rate,epsilon,states_learned";

/// Appends one CSV row per evaluation to `<log_dir>/training_<unix-seconds>.csv`.
#[derive(Debug)]
pub struct MetricsLogger {
    path: PathBuf,
    writer: BufWriter<File>,
    started: Instant,
}

impl MetricsLogger {
    pub fn create(log_dir: &Path) -> io::Result<MetricsLogger> {
        fs::create_dir_all(log_dir)?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let path = log_dir.join(format!("training_{}.csv", stamp));
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{}", METRICS_HEADER)?;
        writer.flush()?;
        Ok(MetricsLogger {
            path,
            writer,
            started: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes and flushes a row, so the file can be followed while training runs.
    pub fn log(&mut self, metrics: &TrainingMetrics) -> io::Result<()> {
        writeln!(
            self.writer,
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{}",
            metrics.total_episodes,
            self.started.elapsed().as_secs(),
            metrics.win_rate,
            metrics.loss_rate,
            metrics.push_rate,
            metrics.avg_reward,
            metrics.bust_rate,
            metrics.current_epsilon,
            metrics.states_learned
        )?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let mut logger = MetricsLogger::create(&log_dir).unwrap();
        logger
            .log(&TrainingMetrics {
                total_episodes: 10_000,
                avg_reward: -0.05,
                win_rate: 0.43,
                loss_rate: 0.48,
                push_rate: 0.09,
                bust_rate: 0.16,
                current_epsilon: 0.6065,
                states_learned: 312,
            })
            .unwrap();

        let name = logger.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("training_") && name.ends_with(".csv"));

        let text = fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], METRICS_HEADER);
        assert_eq!(
            lines[1],
            "10000,0,0.430000,0.480000,0.090000,-0.050000,0.160000,0.606500,312"
        );
    }
}
