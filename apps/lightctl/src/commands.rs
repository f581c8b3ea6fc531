use std::{fmt::Write as _, str::FromStr};

use clap::ValueEnum;
use shared::error::ControllerError;
use sync_core::{ControllerStatus, LightController};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

/// One line of interactive input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Dim,
    Max,
    White,
    Jitter,
    Status,
    Quit,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "dim" => Ok(Self::Dim),
            "max" => Ok(Self::Max),
            "white" => Ok(Self::White),
            "jitter" => Ok(Self::Jitter),
            "status" => Ok(Self::Status),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!(
                "unknown action '{other}' (start, stop, dim, max, white, jitter, status, quit)"
            )),
        }
    }
}

/// Fixed states for `lightctl once`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnceAction {
    Dim,
    Max,
    White,
    Off,
}

pub async fn apply_once(controller: &LightController, action: OnceAction) -> Result<(), ControllerError> {
    match action {
        OnceAction::Dim => controller.dim().await,
        OnceAction::Max => controller.set_max().await,
        OnceAction::White => controller.set_white().await,
        OnceAction::Off => controller.power_off().await,
    }
}

/// Runs one action and returns the line to show the user.
pub async fn execute(controller: &LightController, action: Action) -> Result<String, ControllerError> {
    let message = match action {
        Action::Start => {
            controller.start().await?;
            "cycle started".to_string()
        }
        Action::Stop => {
            controller.stop().await?;
            "cycle stopped".to_string()
        }
        Action::Dim => {
            controller.dim().await?;
            "dimmed".to_string()
        }
        Action::Max => {
            controller.set_max().await?;
            "full brightness".to_string()
        }
        Action::White => {
            controller.set_white().await?;
            "white".to_string()
        }
        Action::Jitter => {
            let enabled = controller.toggle_jitter().await;
            format!("brightness jitter {}", if enabled { "on" } else { "off" })
        }
        Action::Status => render_status(&controller.status().await),
        Action::Quit => "bye".to_string(),
    };
    Ok(message)
}

pub fn render_status(status: &ControllerStatus) -> String {
    let cycle = &status.cycle;
    let mut out = format!(
        "running={} tick={} hue={} jitter={}",
        cycle.running,
        cycle.tick,
        cycle.current_hue,
        if cycle.brightness_jitter_enabled { "on" } else { "off" }
    );
    for adapter in &status.adapters {
        let _ = write!(
            out,
            "\n  {} ({}) every {} tick(s)",
            adapter.name, adapter.vendor, adapter.push_every_ticks
        );
    }
    out
}

/// Reads actions line by line until `quit` or end of input.
///
/// A failing action prints `error: ...` and the loop continues.
pub async fn interactive<R, W>(
    controller: &LightController,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output.write_all(b"> ").await?;
    output.flush().await?;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            output.write_all(b"> ").await?;
            output.flush().await?;
            continue;
        }

        let reply = match line.parse::<Action>() {
            Ok(action) => {
                info!(?action, "interactive action");
                match execute(controller, action).await {
                    Ok(message) if action == Action::Quit => {
                        output.write_all(format!("{message}\n").as_bytes()).await?;
                        return output.flush().await;
                    }
                    Ok(message) => message,
                    Err(err) => format!("error: {err}"),
                }
            }
            Err(err) => format!("error: {err}"),
        };

        output.write_all(format!("{reply}\n> ").as_bytes()).await?;
        output.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
