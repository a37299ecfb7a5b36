// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::config::PlayerConfig;
use anyhow::{Context, Result};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Lifecycle notifications from the external player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The player process is running
    Ready { pid: Option<u32> },
    /// Playback finished normally
    Ended,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct Player {
    command: String,
    args: Vec<String>,
}

impl Player {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub async fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn build_command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        cmd
    }

    /// Play `url` and wait for the player to exit, reporting progress on `events`
    pub async fn play(&self, url: &str, events: mpsc::Sender<PlayerEvent>) -> Result<()> {
        let mut cmd = self.build_command(url);
        cmd.stderr(Stdio::piped()).kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("Failed to start {}: {}", self.command, e);
                let _ = events.send(PlayerEvent::Error(message.clone())).await;
                return Err(anyhow::anyhow!(message));
            }
        };

        debug!("Started {} for {}", self.command, redact_url(url));
        let _ = events.send(PlayerEvent::Ready { pid: child.id() }).await;

        let stderr_tail = child.stderr.take().map(|stderr| tokio::spawn(last_line(stderr)));

        let status = child
            .wait()
            .await
            .with_context(|| format!("Failed to wait for {}", self.command))?;

        match describe_exit(&self.command, status) {
            None => {
                debug!("{} finished", self.command);
                let _ = events.send(PlayerEvent::Ended).await;
                Ok(())
            }
            Some(reason) => {
                let detail = match stderr_tail {
                    Some(handle) => handle.await.ok().flatten(),
                    None => None,
                };
                let message = match detail {
                    Some(line) => format!("Stream could not be played ({}): {}", reason, line),
                    None => format!("Stream could not be played ({})", reason),
                };
                warn!("{}", message);
                let _ = events.send(PlayerEvent::Error(message.clone())).await;
                Err(anyhow::anyhow!(message))
            }
        }
    }

    /// Start the player and return without waiting for it
    pub fn play_detached(&self, url: &str) -> Result<()> {
        let mut cmd = self.build_command(url);
        cmd.stderr(Stdio::null());

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {}", self.command))?;
        debug!(
            "Started detached {} (pid {:?}) for {}",
            self.command,
            child.id(),
            redact_url(url)
        );
        Ok(())
    }
}

/// Last non-blank line of `reader`. Earlier lines are dropped as they are read.
async fn last_line<R: AsyncRead + Unpin>(reader: R) -> Option<String> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut last = None;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if !line.is_empty() {
                    last = Some(line.to_string());
                }
            }
        }
    }

    last
}

/// Why the player exit counts as a failure, or `None` for a normal exit
pub fn describe_exit(command: &str, status: ExitStatus) -> Option<String> {
    if status.success() {
        return None;
    }

    match status.code() {
        // mpv exits with 4 when the user quits
        Some(4) if is_mpv(command) => None,
        Some(code) => Some(format!("{} exited with code {}", command, code)),
        None => Some(format!("{} was terminated by a signal", command)),
    }
}

fn is_mpv(command: &str) -> bool {
    std::path::Path::new(command)
        .file_stem()
        .is_some_and(|stem| stem == "mpv")
}

// Stream URLs carry credentials in the path
fn redact_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let segments: Vec<&str> = parsed
                .path_segments()
                .map(|s| s.collect())
                .unwrap_or_default();
            match segments.as_slice() {
                [kind, _, _, rest @ ..] => format!(
                    "{}/{}/***/***/{}",
                    parsed.origin().ascii_serialization(),
                    kind,
                    rest.join("/")
                ),
                _ => parsed.origin().ascii_serialization(),
            }
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(mut rx: mpsc::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_last_line_keeps_only_the_tail() {
        let stderr: &[u8] = b"starting\nbuffering\nfailed to open stream\n\n  \n";
        assert_eq!(
            last_line(stderr).await.as_deref(),
            Some("failed to open stream")
        );
        assert_eq!(last_line(&b""[..]).await, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_reports_last_stderr_line() {
        let script = "echo first >&2; echo 'last words' >&2; exit 3".to_string();
        let player = Player::new("sh", vec!["-c".to_string(), script]);
        let (tx, rx) = mpsc::channel(4);

        let err = player.play("http://example.com/1.m3u8", tx).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("code 3"));
        assert!(message.ends_with("last words"));
        assert!(!message.contains("first"));

        let events = collect(rx).await;
        assert!(matches!(&events[1], PlayerEvent::Error(msg) if msg.ends_with("last words")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_is_available() {
        assert!(Player::new("true", vec![]).is_available().await);
        assert!(
            !Player::new("definitely-not-a-real-player-binary", vec![])
                .is_available()
                .await
        );
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("http://example.com:8080/live/user/secret/42.m3u8"),
            "http://example.com:8080/live/***/***/42.m3u8"
        );
        assert_eq!(redact_url("nonsense"), "<invalid url>");
    }

    #[test]
    fn test_is_mpv() {
        assert!(is_mpv("mpv"));
        assert!(is_mpv("/usr/bin/mpv"));
        assert!(!is_mpv("vlc"));
    }

    #[cfg(unix)]
    #[test]
    fn test_describe_exit() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(describe_exit("mpv", ExitStatus::from_raw(0)), None);
        assert_eq!(describe_exit("mpv", ExitStatus::from_raw(4 << 8)), None);
        assert_eq!(
            describe_exit("vlc", ExitStatus::from_raw(4 << 8)).as_deref(),
            Some("vlc exited with code 4")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_play_reports_ready_then_ended() {
        let player = Player::new("true", vec![]);
        let (tx, rx) = mpsc::channel(4);

        player.play("http://example.com/live/u/p/1.m3u8", tx).await.unwrap();

        let events = collect(rx).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PlayerEvent::Ready { .. }));
        assert_eq!(events[1], PlayerEvent::Ended);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_play_reports_failure() {
        let player = Player::new("false", vec![]);
        let (tx, rx) = mpsc::channel(4);

        assert!(player.play("http://example.com/1.m3u8", tx).await.is_err());

        let events = collect(rx).await;
        assert!(matches!(events[0], PlayerEvent::Ready { .. }));
        assert!(matches!(&events[1], PlayerEvent::Error(msg) if msg.contains("code 1")));
    }

    #[tokio::test]
    async fn test_missing_player_reports_error() {
        let player = Player::new("definitely-not-a-real-player-binary", vec![]);
        let (tx, rx) = mpsc::channel(4);

        assert!(player.play("http://example.com/1.m3u8", tx).await.is_err());

        let events = collect(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PlayerEvent::Error(_)));
    }
}
