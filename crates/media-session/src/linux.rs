//! Linux media sessions via MPRIS (Media Player Remote Interfacing Specification)
//!
//! Every `org.mpris.MediaPlayer2.*` name on the session bus is treated as one
//! session, in bus order. Properties and transport methods are reached through
//! `dbus-send`, and its textual replies are parsed here.

use anyhow::{anyhow, Context, Result};
use nowplaying_core::{
    ComponentName, ListenerSettings, PlaybackState, RawMetadata, RawPlaybackState,
    RegistryError, Session, SessionError, SessionHandle, SessionRegistry, SettingsLauncher,
    TransportActions, TransportCommand,
};
use std::collections::HashMap;
use std::process::Command;
use tracing::{debug, info, warn};

const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";
const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
const PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";

/// How a `dbus-send` invocation failed
#[derive(Debug, Clone, PartialEq, Eq)]
enum DbusFailure {
    /// The destination name has no owner any more
    NoOwner,
    AccessDenied(String),
    /// The player does not implement the property or method
    Unsupported(String),
    /// Generic `Error.Failed` raised by the player itself
    Failed(String),
    Other(String),
}

fn classify_failure(stderr: &str) -> DbusFailure {
    let message = stderr.trim().to_string();
    if message.contains("org.freedesktop.DBus.Error.ServiceUnknown")
        || message.contains("org.freedesktop.DBus.Error.NameHasNoOwner")
    {
        DbusFailure::NoOwner
    } else if message.contains("org.freedesktop.DBus.Error.AccessDenied") {
        DbusFailure::AccessDenied(message)
    } else if message.contains("org.freedesktop.DBus.Error.UnknownProperty")
        || message.contains("org.freedesktop.DBus.Error.InvalidArgs")
        || message.contains("org.freedesktop.DBus.Error.UnknownMethod")
        || message.contains("org.freedesktop.DBus.Error.NotSupported")
    {
        DbusFailure::Unsupported(message)
    } else if message.contains("org.freedesktop.DBus.Error.Failed") {
        DbusFailure::Failed(message)
    } else {
        DbusFailure::Other(message)
    }
}

/// Run `dbus-send --session --print-reply` with `args`.
///
/// The outer error is for failing to run the tool at all; the inner one is a
/// D-Bus error reply.
fn dbus_send(args: &[&str]) -> Result<std::result::Result<String, DbusFailure>> {
    let output = Command::new("dbus-send")
        .args(["--session", "--print-reply"])
        .args(args)
        .output()
        .context("failed to run dbus-send")?;

    if output.status.success() {
        Ok(Ok(String::from_utf8_lossy(&output.stdout).into_owned()))
    } else {
        Ok(Err(classify_failure(&String::from_utf8_lossy(&output.stderr))))
    }
}

/// A decoded D-Bus variant value
#[derive(Debug, Clone, PartialEq)]
enum Variant {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// First string element of an array, e.g. `xesam:artist`
    StrList(Vec<String>),
    Other,
}

fn quoted(line: &str) -> Option<String> {
    let start = line.find('"')?;
    let end = line.rfind('"')?;
    (end > start).then(|| line[start + 1..end].to_string())
}

/// Decode the value on `line` (with the `variant` keyword already stripped).
/// Arrays consume following lines from `rest` up to their closing bracket.
fn parse_value<'a>(line: &str, rest: &mut impl Iterator<Item = &'a str>) -> Variant {
    let line = line.trim();
    let (kind, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let value = value.trim();

    match kind {
        "string" => quoted(value).map(Variant::Str).unwrap_or(Variant::Other),
        "int16" | "int32" | "int64" | "uint16" | "uint32" | "uint64" | "byte" => {
            value.parse().map(Variant::Int).unwrap_or(Variant::Other)
        }
        "double" => value.parse().map(Variant::Float).unwrap_or(Variant::Other),
        "boolean" => Variant::Bool(value == "true"),
        "array" => {
            let mut items = Vec::new();
            for inner in rest.by_ref() {
                let inner = inner.trim();
                if inner.starts_with(']') {
                    break;
                }
                if let Some(item) = inner.strip_prefix("string ").and_then(quoted) {
                    items.push(item);
                }
            }
            Variant::StrList(items)
        }
        _ => Variant::Other,
    }
}

/// Parse the reply of a single `Properties.Get` call
fn parse_property_reply(stdout: &str) -> Option<Variant> {
    let mut lines = stdout.lines();
    while let Some(line) = lines.next() {
        if let Some(rest) = line.trim().strip_prefix("variant") {
            return Some(parse_value(rest, &mut lines));
        }
    }
    None
}

/// Parse the `Metadata` dictionary into key/value pairs
fn parse_metadata_reply(stdout: &str) -> HashMap<String, Variant> {
    let mut metadata = HashMap::new();
    let mut lines = stdout.lines();

    while let Some(line) = lines.next() {
        if !line.trim().starts_with("dict entry(") {
            continue;
        }
        let Some(key) = lines.next().and_then(|l| l.trim().strip_prefix("string ").and_then(quoted))
        else {
            continue;
        };
        let Some(value_line) = lines.next() else {
            break;
        };
        if let Some(rest) = value_line.trim().strip_prefix("variant") {
            let value = parse_value(rest, &mut lines);
            debug!("Parsed metadata {} = {:?}", key, value);
            metadata.insert(key, value);
        }
    }

    metadata
}

/// Parse the reply of `ListNames` into MPRIS bus names, in bus order
fn parse_player_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("string ").and_then(quoted))
        .filter(|name| name.starts_with(MPRIS_PREFIX))
        .collect()
}

fn metadata_from_map(map: &HashMap<String, Variant>) -> Option<RawMetadata> {
    if map.is_empty() {
        return None;
    }

    let text = |key: &str| match map.get(key) {
        Some(Variant::Str(s)) => Some(s.clone()),
        Some(Variant::StrList(items)) if !items.is_empty() => Some(items.join(", ")),
        _ => None,
    };

    // mpris:length is in microseconds
    let duration_ms = match map.get("mpris:length") {
        Some(Variant::Int(us)) => Some(us / 1000),
        Some(Variant::Float(us)) => Some((*us / 1000.0) as i64),
        _ => None,
    };

    Some(RawMetadata {
        title: text("xesam:title"),
        artist: text("xesam:artist").or_else(|| text("xesam:albumArtist")),
        album: text("xesam:album"),
        duration_ms,
    })
}

fn playback_state_from_status(status: &str) -> PlaybackState {
    match status {
        "Playing" => PlaybackState::Playing,
        "Paused" => PlaybackState::Paused,
        "Stopped" => PlaybackState::Stopped,
        _ => PlaybackState::None,
    }
}

/// One MPRIS player on the session bus
pub struct MprisPlayer {
    bus_name: String,
}

impl MprisPlayer {
    pub fn new(bus_name: impl Into<String>) -> Self {
        Self {
            bus_name: bus_name.into(),
        }
    }

    /// Fetch a player property. `Ok(None)` when the player lacks it, or when
    /// an `optional` property fails to read.
    fn property(
        &self,
        property: &str,
        optional: bool,
    ) -> std::result::Result<Option<Variant>, SessionError> {
        let dest = format!("--dest={}", self.bus_name);
        let interface = format!("string:{}", PLAYER_INTERFACE);
        let name = format!("string:{}", property);
        let reply = dbus_send(&[
            &dest,
            MPRIS_PATH,
            "org.freedesktop.DBus.Properties.Get",
            &interface,
            &name,
        ])?;

        match reply {
            Ok(stdout) => Ok(parse_property_reply(&stdout)),
            Err(failure) => self.property_failure(property, optional, failure),
        }
    }

    fn property_failure(
        &self,
        property: &str,
        optional: bool,
        failure: DbusFailure,
    ) -> std::result::Result<Option<Variant>, SessionError> {
        match failure {
            DbusFailure::NoOwner => Err(SessionError::Gone),
            DbusFailure::Unsupported(msg) => {
                debug!("{} has no {}: {}", self.bus_name, property, msg);
                Ok(None)
            }
            DbusFailure::Failed(msg) if optional => {
                debug!("{} failed to report {}: {}", self.bus_name, property, msg);
                Ok(None)
            }
            DbusFailure::AccessDenied(msg) | DbusFailure::Failed(msg) | DbusFailure::Other(msg) => {
                Err(SessionError::Fault(anyhow!(
                    "reading {} from {}: {}",
                    property,
                    self.bus_name,
                    msg
                )))
            }
        }
    }

    fn flag(&self, property: &str) -> std::result::Result<bool, SessionError> {
        Ok(matches!(self.property(property, true)?, Some(Variant::Bool(true))))
    }

    fn actions(&self) -> std::result::Result<TransportActions, SessionError> {
        let mut actions = TransportActions::empty();
        for (property, bit) in [
            ("CanPlay", TransportActions::PLAY),
            ("CanPause", TransportActions::PAUSE),
            ("CanGoNext", TransportActions::SKIP_TO_NEXT),
            ("CanGoPrevious", TransportActions::SKIP_TO_PREVIOUS),
        ] {
            if self.flag(property)? {
                actions |= bit;
            }
        }
        Ok(actions)
    }
}

impl SessionHandle for MprisPlayer {
    fn package_name(&self) -> String {
        self.bus_name
            .strip_prefix(MPRIS_PREFIX)
            .unwrap_or(&self.bus_name)
            .to_string()
    }

    fn metadata(&self) -> std::result::Result<Option<RawMetadata>, SessionError> {
        let dest = format!("--dest={}", self.bus_name);
        let interface = format!("string:{}", PLAYER_INTERFACE);
        let reply = dbus_send(&[
            &dest,
            MPRIS_PATH,
            "org.freedesktop.DBus.Properties.Get",
            &interface,
            "string:Metadata",
        ])?;

        match reply {
            Ok(stdout) => Ok(metadata_from_map(&parse_metadata_reply(&stdout))),
            Err(DbusFailure::NoOwner) => Err(SessionError::Gone),
            Err(DbusFailure::Unsupported(_)) => Ok(None),
            Err(DbusFailure::AccessDenied(msg))
            | Err(DbusFailure::Failed(msg))
            | Err(DbusFailure::Other(msg)) => Err(
                SessionError::Fault(anyhow!("reading metadata from {}: {}", self.bus_name, msg)),
            ),
        }
    }

    fn playback_state(&self) -> std::result::Result<Option<RawPlaybackState>, SessionError> {
        let state = match self.property("PlaybackStatus", false)? {
            Some(Variant::Str(status)) => playback_state_from_status(&status),
            _ => return Ok(None),
        };

        // Position is in microseconds and optional in MPRIS
        let position_ms = match self.property("Position", true)? {
            Some(Variant::Int(us)) => us / 1000,
            _ => 0,
        };

        Ok(Some(RawPlaybackState {
            state,
            position_ms,
            actions: Some(self.actions()?),
        }))
    }

    fn send(&self, command: TransportCommand) -> std::result::Result<(), SessionError> {
        let method = match command {
            TransportCommand::Play => "Play",
            TransportCommand::Pause => "Pause",
            TransportCommand::SkipToNext => "Next",
            TransportCommand::SkipToPrevious => "Previous",
        };
        let dest = format!("--dest={}", self.bus_name);
        let member = format!("{}.{}", PLAYER_INTERFACE, method);

        match dbus_send(&["--type=method_call", &dest, MPRIS_PATH, &member])? {
            Ok(_) => Ok(()),
            Err(DbusFailure::NoOwner) => Err(SessionError::Gone),
            Err(DbusFailure::Unsupported(msg)) => {
                warn!("{} rejected {}: {}", self.bus_name, method, msg);
                Ok(())
            }
            Err(DbusFailure::AccessDenied(msg))
            | Err(DbusFailure::Failed(msg))
            | Err(DbusFailure::Other(msg)) => Err(
                SessionError::Fault(anyhow!("calling {} on {}: {}", method, self.bus_name, msg)),
            ),
        }
    }
}

/// Enumerates MPRIS players on the session bus
#[derive(Debug, Default)]
pub struct MprisRegistry;

impl MprisRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl SessionRegistry for MprisRegistry {
    fn active_sessions(
        &self,
        listener: &ComponentName,
    ) -> std::result::Result<Vec<Session>, RegistryError> {
        let reply = dbus_send(&[
            "--dest=org.freedesktop.DBus",
            "/org/freedesktop/DBus",
            "org.freedesktop.DBus.ListNames",
        ])?;

        let stdout = match reply {
            Ok(stdout) => stdout,
            Err(DbusFailure::AccessDenied(msg)) => return Err(RegistryError::Security(msg)),
            Err(other) => {
                return Err(RegistryError::Other(anyhow!(
                    "listing bus names for {}: {:?}",
                    listener,
                    other
                )))
            }
        };

        let players = parse_player_names(&stdout);
        debug!("Found MPRIS players: {:?}", players);
        Ok(players
            .into_iter()
            .map(|name| Box::new(MprisPlayer::new(name)) as Session)
            .collect())
    }
}

/// The session bus has no listener gate, so the configured component is
/// always reported as enabled.
#[derive(Debug, Clone)]
pub struct SessionBusListenerSettings {
    listener: ComponentName,
}

impl SessionBusListenerSettings {
    pub fn new(listener: ComponentName) -> Self {
        Self { listener }
    }
}

impl ListenerSettings for SessionBusListenerSettings {
    fn enabled_listeners(&self) -> Option<String> {
        Some(self.listener.flatten_to_short_string())
    }
}

/// Nothing to open on the desktop; access is implicit.
#[derive(Debug, Default)]
pub struct NoopSettingsLauncher;

impl SettingsLauncher for NoopSettingsLauncher {
    fn open_listener_settings(&self) -> Result<()> {
        info!("MPRIS needs no listener permission; nothing to open");
        Ok(())
    }
}
