//! Maps raw session snapshots to the stable [`SessionStatus`] shape

use crate::error::SessionError;
use crate::models::{
    ArtworkSource, ControlAbility, PlaybackStatus, RawMetadata, RawPlaybackState, SessionStatus,
    TrackMetadata,
};
use crate::traits::SessionHandle;

fn clamp_ms(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Normalize metadata. Artwork always points at the caller's fallback lookup.
pub fn normalize_metadata(raw: RawMetadata) -> TrackMetadata {
    TrackMetadata {
        title: raw.title,
        artist: raw.artist,
        album: raw.album,
        duration_ms: raw.duration_ms.map(clamp_ms).unwrap_or(0),
        art_url: ArtworkSource::Fallback,
    }
}

pub fn normalize_playback(raw: Option<&RawPlaybackState>) -> PlaybackStatus {
    match raw {
        Some(raw) => PlaybackStatus {
            is_playing: raw.state.is_playing(),
            position_ms: clamp_ms(raw.position_ms),
        },
        None => PlaybackStatus::default(),
    }
}

/// Build the status of `session` from a fresh read of its metadata and
/// playback state.
pub fn session_status(session: &dyn SessionHandle) -> Result<SessionStatus, SessionError> {
    let metadata = session.metadata()?.map(normalize_metadata);
    let playback = session.playback_state()?;

    let status = SessionStatus {
        metadata,
        playback: normalize_playback(playback.as_ref()),
        ability: ControlAbility::from_actions(playback.and_then(|p| p.actions)),
    };

    tracing::trace!("Normalized status for {}: {:?}", session.package_name(), status);
    Ok(status)
}
