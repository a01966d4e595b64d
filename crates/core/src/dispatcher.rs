//! Transport command dispatch

use crate::error::SessionError;
use crate::models::TransportCommand;
use crate::traits::SessionHandle;
use std::str::FromStr;
use tracing::{debug, info};

/// Commands a caller can issue against the active session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    PlayPause,
    Play,
    Pause,
    NextTrack,
    PreviousTrack,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::PlayPause,
        Command::Play,
        Command::Pause,
        Command::NextTrack,
        Command::PreviousTrack,
    ];

    /// Method-channel name of the command
    pub fn method_name(&self) -> &'static str {
        match self {
            Command::PlayPause => "playPause",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::NextTrack => "nextTrack",
            Command::PreviousTrack => "previousTrack",
        }
    }
}

/// Error type for unknown command names
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseCommandError;

impl std::fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown transport command")
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.method_name() == s)
            .ok_or(ParseCommandError)
    }
}

/// Resolve the transport command to send for `command` given the current state.
fn transport_for(
    session: &dyn SessionHandle,
    command: Command,
) -> Result<TransportCommand, SessionError> {
    Ok(match command {
        Command::PlayPause => {
            let playing = session
                .playback_state()?
                .map(|p| p.state.is_playing())
                .unwrap_or(false);
            if playing {
                TransportCommand::Pause
            } else {
                TransportCommand::Play
            }
        }
        Command::Play => TransportCommand::Play,
        Command::Pause => TransportCommand::Pause,
        Command::NextTrack => TransportCommand::SkipToNext,
        Command::PreviousTrack => TransportCommand::SkipToPrevious,
    })
}

/// Send `command` to `session`.
///
/// Returns `Ok(false)` when there is no session to control. The command is
/// fire-and-forget; the resulting state change is not awaited.
pub fn dispatch(session: Option<&dyn SessionHandle>, command: Command) -> Result<bool, SessionError> {
    let Some(session) = session else {
        debug!("No active session for {}", command.method_name());
        return Ok(false);
    };

    let transport = transport_for(session, command)?;
    session.send(transport)?;
    info!(
        "Sent {} to {} ({})",
        transport.as_str(),
        session.package_name(),
        command.method_name()
    );
    Ok(true)
}
