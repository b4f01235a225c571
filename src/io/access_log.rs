//! Access log - append-only text file of access events
//!
//! One entry per line: `[<rfc3339 utc>] <message>` with an optional
//! ` (UID: <uid>)` suffix. The operator console replays the whole file in
//! write order.
//!
//! If the file cannot be opened at startup the log runs degraded: appends are
//! skipped with a warning and reads report the log as unavailable. Access
//! control keeps working either way.

use crate::domain::types::Credential;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum AccessLogError {
    #[error("access log unavailable: {0}")]
    Unavailable(String),

    #[error("access log io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render one log line (without trailing newline)
pub fn format_entry(at: DateTime<Utc>, message: &str, credential: Option<&Credential>) -> String {
    let ts = at.to_rfc3339_opts(SecondsFormat::Millis, true);
    match credential {
        Some(uid) if !uid.is_empty() => format!("[{}] {} (UID: {})", ts, message, uid),
        _ => format!("[{}] {}", ts, message),
    }
}

pub struct AccessLog {
    path: PathBuf,
    /// Reason the log could not be opened; `None` when healthy
    degraded: Option<String>,
    /// Serializes appends against each other and against replays
    write_lock: Mutex<()>,
}

impl AccessLog {
    /// Open (creating if needed) the log at `path`.
    ///
    /// Never fails: an unusable location yields a degraded log.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let degraded = match Self::touch(&path) {
            Ok(()) => {
                info!(file = %path.display(), "access_log_opened");
                None
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "access_log_degraded");
                Some(e.to_string())
            }
        };
        Self { path, degraded, write_lock: Mutex::new(()) }
    }

    fn touch(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(path)?;
        Ok(())
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    /// Append an entry stamped with the current time.
    /// Returns true if the line was written.
    pub fn append(&self, message: &str, credential: Option<&Credential>) -> bool {
        self.append_at(Utc::now(), message, credential)
    }

    pub fn append_at(
        &self,
        at: DateTime<Utc>,
        message: &str,
        credential: Option<&Credential>,
    ) -> bool {
        if self.degraded.is_some() {
            warn!(message = %message, "access_log_entry_skipped");
            return false;
        }

        let line = format_entry(at, message, credential);
        match self.append_line(&line) {
            Ok(()) => true,
            Err(e) => {
                error!(file = %self.path.display(), error = %e, "access_log_write_failed");
                false
            }
        }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        debug!(file = %self.path.display(), bytes = %line.len(), "access_log_written");
        Ok(())
    }

    /// Every line in write order
    pub fn read_all(&self) -> Result<Vec<String>, AccessLogError> {
        if let Some(reason) = &self.degraded {
            return Err(AccessLogError::Unavailable(reason.clone()));
        }

        let _guard = self.write_lock.lock();
        let file = fs::File::open(&self.path)?;
        let lines = BufReader::new(file).lines().collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_format_entry_with_uid() {
        let uid = Credential::new("AB12");
        assert_eq!(
            format_entry(at(), "RFID access attempt", Some(&uid)),
            "[2024-05-17T08:30:00.000Z] RFID access attempt (UID: AB12)"
        );
    }

    #[test]
    fn test_format_entry_without_uid() {
        assert_eq!(format_entry(at(), "Barrier fault", None), "[2024-05-17T08:30:00.000Z] Barrier fault");
        let empty = Credential::new("");
        assert_eq!(
            format_entry(at(), "Barrier fault", Some(&empty)),
            "[2024-05-17T08:30:00.000Z] Barrier fault"
        );
    }

    #[test]
    fn test_append_then_read_in_order() {
        let dir = tempdir().unwrap();
        let log = AccessLog::open(dir.path().join("logs").join("access_log.txt"));
        assert!(!log.is_degraded());

        let uid = Credential::new("AB12");
        assert!(log.append_at(at(), "RFID access attempt", Some(&uid)));
        assert!(log.append_at(at(), "Access granted", Some(&uid)));

        let lines = log.read_all().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("RFID access attempt (UID: AB12)"));
        assert!(lines[1].ends_with("Access granted (UID: AB12)"));
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("access_log.txt");

        AccessLog::open(&path).append_at(at(), "first", None);
        AccessLog::open(&path).append_at(at(), "second", None);

        let lines = AccessLog::open(&path).read_all().unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_degraded_when_path_unusable() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();

        let log = AccessLog::open(blocker.join("access_log.txt"));
        assert!(log.is_degraded());
        assert!(!log.append("RFID access attempt", None));
        assert!(matches!(log.read_all(), Err(AccessLogError::Unavailable(_))));
    }
}
