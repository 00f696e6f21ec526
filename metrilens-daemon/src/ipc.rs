//! Unix socket control server for producer-side triggers
//!
//! One command per connection, one line each way:
//!
//! | Command | Reply |
//! |---------|-------|
//! | `reload` | `reloaded <subscribers reached>` |
//! | `status` | `subscribers <count>` |
//! | `recompute <unit>=<tree.json> ...` | `recomputed <saved>/<total>` or `busy` |
//! | `set-format <format>` | `format saved` |
//! | `quit` | `bye` |

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::recompute::{AnalysisUnit, RecomputeOutcome, Recomputer};
use crate::settings::{LensSettings, SettingsStore};
use metrilens_broadcaster::ReloadHub;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("expected <unit>=<tree.json>, got {0:?}")]
    InvalidUnit(String),

    #[error("{0} requires an argument")]
    MissingArgument(&'static str),
}

/// Control command
#[derive(Debug, PartialEq, Eq)]
pub enum ControlCommand {
    Reload,
    Status,
    Recompute(Vec<AnalysisUnit>),
    SetFormat(String),
    Quit,
}

impl ControlCommand {
    pub fn parse(s: &str) -> std::result::Result<Self, CommandError> {
        let line = s.trim_end_matches(['\r', '\n']);
        let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));

        match keyword.trim().to_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "reload" => Ok(Self::Reload),
            "status" => Ok(Self::Status),
            "quit" | "exit" | "shutdown" => Ok(Self::Quit),
            // An empty format is valid and renders empty descriptions
            "set-format" => Ok(Self::SetFormat(rest.to_string())),
            "recompute" => {
                let units = rest
                    .split_whitespace()
                    .map(|arg| match arg.split_once('=') {
                        Some((name, tree)) if !name.is_empty() && !tree.is_empty() => {
                            Ok(AnalysisUnit::new(name, tree))
                        }
                        _ => Err(CommandError::InvalidUnit(arg.to_string())),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                if units.is_empty() {
                    return Err(CommandError::MissingArgument("recompute"));
                }
                Ok(Self::Recompute(units))
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Everything a control command can act on
pub struct ControlContext {
    pub hub: Arc<ReloadHub>,
    pub recomputer: Arc<Recomputer>,
    pub settings: Arc<SettingsStore>,
    pub shutdown: Arc<Notify>,
}

/// Unix socket control server
pub struct ControlServer {
    listener: UnixListener,
    socket_path: PathBuf,
    context: Arc<ControlContext>,
}

impl ControlServer {
    /// Bind the control socket, replacing a stale one
    pub fn bind(socket_path: impl AsRef<Path>, context: Arc<ControlContext>) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();

        // Remove existing socket if it exists
        let _ = std::fs::remove_file(&socket_path);

        let listener = UnixListener::bind(&socket_path)
            .context("Failed to bind control socket")?;
        metrilens_paths::secure_socket_permissions(&socket_path)?;

        info!("Control server listening on {:?}", socket_path);

        Ok(Self {
            listener,
            socket_path,
            context,
        })
    }

    /// Accept connections forever, one task per connection
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let (stream, _) = self
                .listener
                .accept()
                .await
                .context("Failed to accept control connection")?;

            let context = Arc::clone(&self.context);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, context).await {
                    error!("Control connection error: {:#}", e);
                }
            });
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Handle a single control connection
pub async fn handle_connection(stream: UnixStream, context: Arc<ControlContext>) -> Result<()> {
    let mut reader = BufReader::new(stream);
    let mut request = String::new();

    if reader.read_line(&mut request).await? == 0 {
        return Ok(());
    }

    debug!("Received control command: {}", request.trim());

    let response = match ControlCommand::parse(&request) {
        Ok(command) => execute(command, &context).await,
        Err(e) => format!("error: {}", e),
    };

    let mut stream = reader.into_inner();
    stream.write_all(response.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await?;

    Ok(())
}

async fn execute(command: ControlCommand, context: &ControlContext) -> String {
    match command {
        ControlCommand::Reload => {
            let reached = context.hub.broadcast_reload().await;
            format!("reloaded {}", reached)
        }
        ControlCommand::Status => {
            format!("subscribers {}", context.hub.subscriber_count().await)
        }
        ControlCommand::Recompute(units) => match context.recomputer.recompute(&units).await {
            RecomputeOutcome::Completed { saved, total } => format!("recomputed {}/{}", saved, total),
            RecomputeOutcome::Skipped => "busy".to_string(),
        },
        ControlCommand::SetFormat(format) => {
            let settings = LensSettings {
                description_format: format,
            };
            match context.settings.save(settings).await {
                Ok(()) => "format saved".to_string(),
                Err(e) => format!("error: {:#}", e),
            }
        }
        ControlCommand::Quit => {
            info!("Received quit command");
            context.shutdown.notify_one();
            "bye".to_string()
        }
    }
}

/// Send one command to a running daemon and return its reply
pub async fn send_command(socket_path: impl AsRef<Path>, command: &str) -> Result<String> {
    let socket_path = socket_path.as_ref();

    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("Failed to connect to control socket {:?}", socket_path))?;

    stream.write_all(command.trim().as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await?;

    let mut reply = String::new();
    BufReader::new(stream)
        .read_line(&mut reply)
        .await
        .context("Failed to read control reply")?;

    Ok(reply.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(ControlCommand::parse("reload\n"), Ok(ControlCommand::Reload));
        assert_eq!(ControlCommand::parse("STATUS"), Ok(ControlCommand::Status));
        assert_eq!(ControlCommand::parse("shutdown"), Ok(ControlCommand::Quit));
    }

    #[test]
    fn test_parse_recompute_units() {
        let command = ControlCommand::parse("recompute Core=/tmp/core.json Web=/tmp/web.json").unwrap();
        assert_eq!(
            command,
            ControlCommand::Recompute(vec![
                AnalysisUnit::new("Core", "/tmp/core.json"),
                AnalysisUnit::new("Web", "/tmp/web.json"),
            ])
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(ControlCommand::parse(""), Err(CommandError::Empty));
        assert_eq!(
            ControlCommand::parse("recompute"),
            Err(CommandError::MissingArgument("recompute"))
        );
        assert_eq!(
            ControlCommand::parse("recompute Core"),
            Err(CommandError::InvalidUnit("Core".to_string()))
        );
        assert_eq!(
            ControlCommand::parse("dance"),
            Err(CommandError::Unknown("dance".to_string()))
        );
    }

    #[test]
    fn test_set_format_keeps_spaces() {
        assert_eq!(
            ControlCommand::parse("set-format MI %MI% | CY %CY%\n"),
            Ok(ControlCommand::SetFormat("MI %MI% | CY %CY%".to_string()))
        );
        assert_eq!(
            ControlCommand::parse("set-format"),
            Ok(ControlCommand::SetFormat(String::new()))
        );
        assert_eq!(
            ControlCommand::parse("set-format \n"),
            Ok(ControlCommand::SetFormat(String::new()))
        );
    }
}
