use crate::actions::TransportActions;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Native playback state of a session, numbered like Android's `PlaybackState.STATE_*`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    #[default]
    None,
    Stopped,
    Paused,
    Playing,
    FastForwarding,
    Rewinding,
    Buffering,
    Error,
    Connecting,
    SkippingToPrevious,
    SkippingToNext,
    SkippingToQueueItem,
}

impl PlaybackState {
    /// Map a raw state constant. Unknown codes collapse to `None`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => PlaybackState::Stopped,
            2 => PlaybackState::Paused,
            3 => PlaybackState::Playing,
            4 => PlaybackState::FastForwarding,
            5 => PlaybackState::Rewinding,
            6 => PlaybackState::Buffering,
            7 => PlaybackState::Error,
            8 => PlaybackState::Connecting,
            9 => PlaybackState::SkippingToPrevious,
            10 => PlaybackState::SkippingToNext,
            11 => PlaybackState::SkippingToQueueItem,
            _ => PlaybackState::None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

/// Metadata exactly as the session reported it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<i64>,
}

/// Playback snapshot exactly as the session reported it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawPlaybackState {
    pub state: PlaybackState,
    /// Position at the last native update; may be negative when unknown
    pub position_ms: i64,
    /// `None` when the session does not publish an action mask at all
    pub actions: Option<TransportActions>,
}

/// Where the caller should get artwork from.
///
/// Native artwork retrieval is unreliable across devices, so the bridge never
/// ships image bytes and always tells the caller to use its own lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtworkSource {
    #[default]
    Fallback,
}

/// Normalized track metadata returned to the caller
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: u64,
    pub art_url: ArtworkSource,
}

/// Reply of the standalone `getMetadata` call, which keys the length as
/// `duration` unlike the metadata nested in a status
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataReply {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: u64,
    pub art_url: ArtworkSource,
}

impl From<TrackMetadata> for MetadataReply {
    fn from(metadata: TrackMetadata) -> Self {
        Self {
            title: metadata.title,
            artist: metadata.artist,
            album: metadata.album,
            duration: metadata.duration_ms,
            art_url: metadata.art_url,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    pub is_playing: bool,
    pub position_ms: u64,
}

/// Transport controls the active session advertises.
///
/// Only ever built from a [`TransportActions`] mask, see
/// [`ControlAbility::from_actions`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlAbility {
    pub can_play_pause: bool,
    pub can_go_next: bool,
    pub can_go_previous: bool,
}

impl ControlAbility {
    /// Derive the ability set from an action mask. A missing mask grants nothing.
    pub fn from_actions(actions: Option<TransportActions>) -> Self {
        match actions {
            Some(actions) => Self {
                can_play_pause: actions.can_play_pause(),
                can_go_next: actions.can_skip_to_next(),
                can_go_previous: actions.can_skip_to_previous(),
            },
            None => Self::default(),
        }
    }
}

/// Everything a status query returns about the active session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub metadata: Option<TrackMetadata>,
    pub playback: PlaybackStatus,
    pub ability: ControlAbility,
}

/// One entry of the `listSessions` diagnostic
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub package: String,
    pub is_playing: bool,
}

/// A transport command the bridge can send to a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportCommand {
    Play,
    Pause,
    SkipToNext,
    SkipToPrevious,
}

impl TransportCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportCommand::Play => "play",
            TransportCommand::Pause => "pause",
            TransportCommand::SkipToNext => "skip_to_next",
            TransportCommand::SkipToPrevious => "skip_to_previous",
        }
    }
}

/// An Android-style component reference (`package/class`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }

    /// Flatten to `package/class`, using the `.Class` shorthand when the class
    /// lives inside the package.
    pub fn flatten_to_short_string(&self) -> String {
        match self.class.strip_prefix(self.package.as_str()) {
            Some(rest) if rest.starts_with('.') => format!("{}/{}", self.package, rest),
            _ => format!("{}/{}", self.package, self.class),
        }
    }
}

impl std::fmt::Display for ComponentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

/// Error type for strings that are not a flattened component
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseComponentError;

impl std::fmt::Display for ParseComponentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid component name, expected package/class")
    }
}

impl std::error::Error for ParseComponentError {}

impl FromStr for ComponentName {
    type Err = ParseComponentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (package, class) = s.trim().split_once('/').ok_or(ParseComponentError)?;
        if package.is_empty() || class.is_empty() {
            return Err(ParseComponentError);
        }

        let class = if class.starts_with('.') {
            format!("{}{}", package, class)
        } else {
            class.to_string()
        };

        Ok(ComponentName::new(package, class))
    }
}
