//! Operator console
//!
//! Line-oriented. The only command is `logs` (any case), which replays the
//! access log in write order. Anything else is ignored.

use crate::io::access_log::AccessLog;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    ReplayLogs,
}

pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    if line.trim().eq_ignore_ascii_case("logs") {
        Some(ConsoleCommand::ReplayLogs)
    } else {
        None
    }
}

/// Write the whole access log to `out`
pub async fn replay_logs<W>(log: &AccessLog, out: &mut W) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    match log.read_all() {
        Ok(lines) => {
            out.write_all(b"Access log:\n").await?;
            for line in &lines {
                out.write_all(line.as_bytes()).await?;
                out.write_all(b"\n").await?;
            }
            out.flush().await?;
            Ok(lines.len())
        }
        Err(e) => {
            out.write_all(format!("Could not open access log: {}\n", e).as_bytes()).await?;
            out.flush().await?;
            Ok(0)
        }
    }
}

/// Serve console commands from `input` until EOF or shutdown
pub async fn run_console<R, W>(
    mut input: R,
    mut output: W,
    log: Arc<AccessLog>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Read bytes so a line that is not UTF-8 is ignored, not fatal
    let mut buf = Vec::new();
    info!("operator_console_started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            read = input.read_until(b'\n', &mut buf) => {
                if read? == 0 {
                    debug!("operator_console_eof");
                    break;
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                buf.clear();
                match parse_command(&line) {
                    Some(ConsoleCommand::ReplayLogs) => {
                        let count = replay_logs(&log, &mut output).await?;
                        info!(lines = %count, "access_log_replayed");
                    }
                    None => {
                        debug!(input = %line.trim(), "operator_console_ignored");
                    }
                }
            }
        }
    }

    info!("operator_console_stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::BufReader;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("logs"), Some(ConsoleCommand::ReplayLogs));
        assert_eq!(parse_command("  LoGs \r"), Some(ConsoleCommand::ReplayLogs));
        assert_eq!(parse_command("log"), None);
        assert_eq!(parse_command("logs please"), None);
        assert_eq!(parse_command(""), None);
    }

    #[tokio::test]
    async fn test_console_replays_on_logs_only() {
        let dir = tempdir().unwrap();
        let log = Arc::new(AccessLog::open(dir.path().join("access_log.txt")));
        log.append("first", None);
        log.append("second", None);

        let input = BufReader::new(&b"help\nLOGS\n"[..]);
        let mut output = Vec::new();
        let (_tx, rx) = watch::channel(false);
        run_console(input, &mut output, log, rx).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Access log:");
        assert!(lines[1].ends_with("first"));
        assert!(lines[2].ends_with("second"));
    }

    #[tokio::test]
    async fn test_console_survives_non_utf8_line() {
        let dir = tempdir().unwrap();
        let log = Arc::new(AccessLog::open(dir.path().join("access_log.txt")));
        log.append("first", None);

        let input = BufReader::new(&b"\xff\xfe\nlogs\n"[..]);
        let mut output = Vec::new();
        let (_tx, rx) = watch::channel(false);
        run_console(input, &mut output, log, rx).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Access log:");
        assert!(lines[1].ends_with("first"));
    }

    #[tokio::test]
    async fn test_replay_reports_unavailable_log() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let log = AccessLog::open(blocker.join("access_log.txt"));

        let mut output = Vec::new();
        assert_eq!(replay_logs(&log, &mut output).await.unwrap(), 0);
        assert!(String::from_utf8(output).unwrap().starts_with("Could not open access log"));
    }
}
