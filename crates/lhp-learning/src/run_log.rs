//! Run logs: scoped capture of a long operation's events to a file.
//!
//! [`RunLog::capture`] installs a `tracing` subscriber for the duration of a
//! closure. Every event is written to the console and appended to
//! `model_log_{%Y%m%d_%H%M%S}.txt`, framed by start and end banners:
//!
//! ```text
//! ==================================================
//! Log started at 2025-03-14 09:26:53
//! ==================================================
//!
//! Operation: Model Training
//! --------------------------------------------------
//! ...
//! ==================================================
//! Log ended at 2025-03-14 09:31:02
//! ==================================================
//! ```
//!
//! The subscriber is thread-local to the caller. Events emitted from rayon
//! workers go to the global subscriber only.

use crate::error::Result;
use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

const BANNER_WIDTH: usize = 50;
const LOG_EXT: &str = "txt";

/// Writes to stdout and a shared log file.
#[derive(Clone)]
struct TeeWriter {
    file: Arc<Mutex<File>>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        self.file.lock().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        self.file.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for TeeWriter {
    type Writer = TeeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// A run log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with its events duplicated into a new log file in `dir`.
    ///
    /// The directory is created if needed. The closure's value is returned
    /// together with the log that recorded it; only failing to open the log
    /// file is an error.
    pub fn capture<R>(
        dir: impl AsRef<Path>,
        operation: &str,
        f: impl FnOnce() -> R,
    ) -> Result<(R, RunLog)> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "model_log_{}.{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            LOG_EXT
        ));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = TeeWriter {
            file: Arc::new(Mutex::new(file)),
        };

        let heavy = "=".repeat(BANNER_WIDTH);
        write!(
            writer,
            "\n{heavy}\nLog started at {}\n{heavy}\n\nOperation: {}\n{}\n\n",
            timestamp(),
            operation,
            "-".repeat(BANNER_WIDTH)
        )?;

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer.clone())
            .with_ansi(false)
            .with_target(false)
            .finish();
        let value = tracing::subscriber::with_default(subscriber, f);

        write!(
            writer,
            "\n{heavy}\nLog ended at {}\n{heavy}\n\n",
            timestamp()
        )?;
        writer.flush()?;

        Ok((value, RunLog { path }))
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Contents of the most recently modified log in `dir`.
///
/// Returns `Ok(None)` when the directory holds no log files.
pub fn latest_log(dir: impl AsRef<Path>) -> Result<Option<String>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(None);
    }

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXT) {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    match newest {
        Some((_, path)) => Ok(Some(fs::read_to_string(path)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing::info;

    #[test]
    fn test_capture_writes_banners_and_events() {
        let dir = tempdir().unwrap();
        let (value, log) = RunLog::capture(dir.path(), "Model Training", || {
            info!("training ridge");
            7
        })
        .unwrap();

        assert_eq!(value, 7);
        let name = log.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("model_log_") && name.ends_with(".txt"));

        let content = fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("Log started at "));
        assert!(content.contains("Operation: Model Training"));
        assert!(content.contains("training ridge"));
        assert!(content.contains("Log ended at "));
        assert!(content.find("Log started").unwrap() < content.find("training ridge").unwrap());
        assert!(content.find("training ridge").unwrap() < content.find("Log ended").unwrap());
    }

    #[test]
    fn test_events_outside_capture_are_not_logged() {
        let dir = tempdir().unwrap();
        let (_, log) = RunLog::capture(dir.path(), "Evaluation", || ()).unwrap();
        info!("after capture");
        let content = fs::read_to_string(log.path()).unwrap();
        assert!(!content.contains("after capture"));
    }

    #[test]
    fn test_latest_log() {
        let dir = tempdir().unwrap();
        assert_eq!(latest_log(dir.path()).unwrap(), None);
        assert_eq!(latest_log(dir.path().join("missing")).unwrap(), None);

        fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        let (_, log) = RunLog::capture(dir.path(), "Prediction", || ()).unwrap();
        let latest = latest_log(dir.path()).unwrap().unwrap();
        assert_eq!(latest, fs::read_to_string(log.path()).unwrap());
    }
}
