//! The media session status bridge.
//!
//! Every call resolves permission gate → registry → selector from scratch and
//! then normalizes or dispatches against the selected session. Nothing about
//! the active session survives between calls: the owning app can tear its
//! session down without notice.

use crate::channel::{parse_request, Method, MethodCall, MethodReply, MethodResponse};
use crate::dispatcher::{dispatch, Command};
use crate::error::{BridgeError, BridgeResult};
use crate::models::{ComponentName, MetadataReply, SessionStatus, SessionSummary, TrackMetadata};
use crate::normalizer::{normalize_metadata, normalize_playback, session_status};
use crate::permission::PermissionGate;
use crate::registry::RegistryAdapter;
use crate::selector::select_active;
use crate::traits::{ListenerSettings, Session, SessionRegistry, SettingsLauncher};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Turn expected "no data" conditions into `default`, let faults through.
fn recover<T>(result: BridgeResult<T>, default: T, what: &str) -> BridgeResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_recoverable() => {
            debug!("{}: {}", what, e);
            Ok(default)
        }
        Err(e) => Err(e),
    }
}

fn to_value<T: serde::Serialize>(value: T) -> BridgeResult<Value> {
    serde_json::to_value(value).map_err(|e| BridgeError::Fault(e.into()))
}

pub struct MediaBridge {
    gate: PermissionGate,
    registry: RegistryAdapter,
}

impl MediaBridge {
    pub fn new(gate: PermissionGate, registry: RegistryAdapter) -> Self {
        Self { gate, registry }
    }

    /// Wire the bridge from its OS collaborators. The listener's package is the
    /// identity checked by the permission gate.
    pub fn from_parts(
        registry: Arc<dyn SessionRegistry>,
        settings: Arc<dyn ListenerSettings>,
        launcher: Arc<dyn SettingsLauncher>,
        listener: ComponentName,
    ) -> Self {
        let gate = PermissionGate::new(settings, launcher, listener.package.clone());
        let registry = RegistryAdapter::new(registry, listener);
        Self::new(gate, registry)
    }

    pub fn listener(&self) -> &ComponentName {
        self.registry.listener()
    }

    pub fn check_permission(&self) -> bool {
        self.gate.check_permission()
    }

    pub fn open_permission_settings(&self) -> bool {
        self.gate.open_permission_settings()
    }

    fn sessions(&self) -> BridgeResult<Vec<Session>> {
        if !self.gate.check_permission() {
            return Err(BridgeError::PermissionDenied);
        }
        self.registry.list_sessions()
    }

    fn active_session(&self) -> BridgeResult<Option<Session>> {
        Ok(select_active(self.sessions()?))
    }

    /// Status of the active session, `None` when nothing is active or access
    /// is not granted.
    pub fn get_status(&self) -> BridgeResult<Option<SessionStatus>> {
        let result = self.active_session().and_then(|session| match session {
            Some(session) => Ok(Some(session_status(session.as_ref())?)),
            None => Ok(None),
        });
        recover(result, None, "getStatus")
    }

    pub fn get_metadata(&self) -> BridgeResult<Option<TrackMetadata>> {
        let result = self.active_session().and_then(|session| match session {
            Some(session) => Ok(session.metadata()?.map(normalize_metadata)),
            None => Ok(None),
        });
        recover(result, None, "getMetadata")
    }

    pub fn get_position(&self) -> BridgeResult<u64> {
        let result = self.active_session().and_then(|session| match session {
            Some(session) => {
                let playback = session.playback_state()?;
                Ok(normalize_playback(playback.as_ref()).position_ms)
            }
            None => Ok(0),
        });
        recover(result, 0, "getPosition")
    }

    pub fn is_playing(&self) -> BridgeResult<bool> {
        let result = self.active_session().and_then(|session| match session {
            Some(session) => {
                let playback = session.playback_state()?;
                Ok(normalize_playback(playback.as_ref()).is_playing)
            }
            None => Ok(false),
        });
        recover(result, false, "isPlaying")
    }

    /// Issue `command` against the active session. `false` means nothing was
    /// there to control.
    pub fn command(&self, command: Command) -> BridgeResult<bool> {
        let result = self.active_session().and_then(|session| {
            Ok(dispatch(session.as_deref(), command)?)
        });
        recover(result, false, command.method_name())
    }

    /// Every registered session in registry order with its playing flag
    pub fn list_sessions(&self) -> BridgeResult<Vec<SessionSummary>> {
        let result = self.sessions().map(|sessions| {
            sessions
                .iter()
                .map(|session| SessionSummary {
                    package: session.package_name(),
                    is_playing: matches!(
                        session.playback_state(),
                        Ok(Some(state)) if state.state.is_playing()
                    ),
                })
                .collect()
        });
        recover(result, Vec::new(), "listSessions")
    }

    /// Run a parsed method.
    pub fn call(&self, method: Method) -> BridgeResult<MethodReply> {
        let value = match method {
            Method::CheckPermission => Value::Bool(self.check_permission()),
            Method::OpenPermissionSettings => Value::Bool(self.open_permission_settings()),
            Method::GetStatus => to_value(self.get_status()?)?,
            Method::GetMetadata => to_value(self.get_metadata()?.map(MetadataReply::from))?,
            Method::GetPosition => Value::from(self.get_position()?),
            Method::IsPlaying => Value::Bool(self.is_playing()?),
            Method::ListSessions => to_value(self.list_sessions()?)?,
            Method::Command(command) => Value::Bool(self.command(command)?),
        };
        Ok(MethodReply::Success(value))
    }

    /// Handle one method-channel request.
    ///
    /// Unknown names yield [`MethodReply::NotImplemented`]; OS faults come
    /// back as `Err` and are never turned into an empty answer.
    pub fn handle(&self, call: &MethodCall) -> BridgeResult<MethodReply> {
        let method = match call.method.parse::<Method>() {
            Ok(method) => method,
            Err(e) => {
                debug!("{}", e);
                return Ok(MethodReply::NotImplemented);
            }
        };

        debug!("Handling {}", method.name());
        self.call(method).inspect_err(|e| {
            error!("{} failed: {:#}", method.name(), e);
        })
    }

    /// Handle a call and shape the outcome for the wire, echoing the call id.
    pub fn respond(&self, call: &MethodCall) -> MethodResponse {
        match self.handle(call) {
            Ok(reply) => MethodResponse::from_reply(call.id.clone(), reply),
            Err(e) => MethodResponse::error(call.id.clone(), "fault", format!("{:#}", e)),
        }
    }

    /// Parse and answer one JSON request line
    pub fn respond_line(&self, line: &str) -> MethodResponse {
        match parse_request(line) {
            Ok(call) => self.respond(&call),
            Err(response) => response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::TransportActions;
    use crate::models::{PlaybackState, RawMetadata, TransportCommand};
    use crate::test_utils::{FakeLauncher, FakeListenerSettings, FakeRegistry, FakeSession};
    use serde_json::json;

    const LISTENER: &str = "cc.koto.fluent_lyrics/.MediaSessionListenerService";

    fn bridge_with(registry: FakeRegistry, granted: bool) -> MediaBridge {
        let settings = FakeListenerSettings::new(granted.then_some(LISTENER));
        MediaBridge::from_parts(
            Arc::new(registry),
            Arc::new(settings),
            Arc::new(FakeLauncher::default()),
            LISTENER.parse().unwrap(),
        )
    }

    fn reply(bridge: &MediaBridge, method: &str) -> MethodReply {
        bridge.handle(&MethodCall::new(method)).unwrap()
    }

    #[test]
    fn test_empty_registry() {
        let bridge = bridge_with(FakeRegistry::with_sessions(vec![]), true);

        assert_eq!(bridge.get_status().unwrap(), None);
        for command in Command::ALL {
            assert!(!bridge.command(command).unwrap());
        }
        assert_eq!(reply(&bridge, "getStatus"), MethodReply::Success(Value::Null));
        assert_eq!(reply(&bridge, "getPosition"), MethodReply::Success(json!(0)));
    }

    #[test]
    fn test_not_granted_returns_no_data_without_enumerating() {
        let registry = FakeRegistry::with_sessions(vec![FakeSession::playing("com.music")]);
        let bridge = bridge_with(registry, false);

        assert!(!bridge.check_permission());
        assert_eq!(bridge.get_status().unwrap(), None);
        assert!(!bridge.command(Command::Play).unwrap());
        assert!(bridge.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_security_failure_degrades_to_no_data() {
        let bridge = bridge_with(FakeRegistry::denied(), true);
        assert_eq!(bridge.get_status().unwrap(), None);
        assert!(!bridge.is_playing().unwrap());
        assert_eq!(reply(&bridge, "nextTrack"), MethodReply::Success(json!(false)));
    }

    #[test]
    fn test_registry_fault_propagates() {
        let bridge = bridge_with(FakeRegistry::failing("service crashed"), true);
        assert!(matches!(bridge.get_status(), Err(BridgeError::Fault(_))));
        assert!(bridge.handle(&MethodCall::new("getStatus")).is_err());
    }

    #[test]
    fn test_status_of_playing_session() {
        let session = FakeSession::playing("com.music")
            .with_metadata(RawMetadata {
                title: Some("Song".to_string()),
                artist: None,
                album: Some("Album".to_string()),
                duration_ms: Some(180_000),
            })
            .with_position(42_000)
            .with_actions(TransportActions::PLAY_PAUSE | TransportActions::SKIP_TO_NEXT);
        let registry = FakeRegistry::with_sessions(vec![FakeSession::paused("com.video"), session]);
        let bridge = bridge_with(registry, true);

        assert_eq!(
            reply(&bridge, "getStatus"),
            MethodReply::Success(json!({
                "metadata": {
                    "title": "Song",
                    "artist": null,
                    "album": "Album",
                    "durationMs": 180000,
                    "artUrl": "fallback"
                },
                "playback": { "isPlaying": true, "positionMs": 42000 },
                "ability": { "canPlayPause": true, "canGoNext": true, "canGoPrevious": false }
            }))
        );
        assert_eq!(reply(&bridge, "isPlaying"), MethodReply::Success(json!(true)));
        assert_eq!(reply(&bridge, "getPosition"), MethodReply::Success(json!(42000)));
    }

    #[test]
    fn test_get_metadata_keys_length_as_duration() {
        let session = FakeSession::playing("com.music").with_metadata(RawMetadata {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            album: None,
            duration_ms: Some(180_000),
        });
        let bridge = bridge_with(FakeRegistry::with_sessions(vec![session]), true);

        assert_eq!(
            reply(&bridge, "getMetadata"),
            MethodReply::Success(json!({
                "title": "Song",
                "artist": "Band",
                "album": null,
                "duration": 180000,
                "artUrl": "fallback"
            }))
        );
        assert_eq!(
            bridge.get_metadata().unwrap().map(|m| m.duration_ms),
            Some(180_000)
        );
    }

    #[test]
    fn test_get_metadata_without_metadata_is_null() {
        let bridge = bridge_with(
            FakeRegistry::with_sessions(vec![FakeSession::playing("com.music")]),
            true,
        );
        assert_eq!(reply(&bridge, "getMetadata"), MethodReply::Success(Value::Null));
    }

    #[test]
    fn test_every_call_reads_fresh_state() {
        let first = FakeSession::paused("com.podcast");
        let second = FakeSession::paused("com.music");
        let registry = Arc::new(FakeRegistry::with_sessions(vec![first.clone(), second.clone()]));
        let bridge = MediaBridge::from_parts(
            registry.clone(),
            Arc::new(FakeListenerSettings::new(Some(LISTENER))),
            Arc::new(FakeLauncher::default()),
            LISTENER.parse().unwrap(),
        );

        assert!(!bridge.is_playing().unwrap());

        second.set_state(PlaybackState::Playing);
        assert!(bridge.is_playing().unwrap());
        assert!(bridge.command(Command::Pause).unwrap());
        assert_eq!(second.sent(), vec![TransportCommand::Pause]);
        assert!(first.sent().is_empty());

        registry.set_sessions(vec![]);
        assert!(!bridge.is_playing().unwrap());
        assert!(!bridge.command(Command::Play).unwrap());
        assert_eq!(registry.calls(), 5);
    }

    #[test]
    fn test_commands_target_selected_session() {
        let background = FakeSession::paused("com.podcast");
        let foreground = FakeSession::playing("com.music");
        let registry = FakeRegistry::with_sessions(vec![background.clone(), foreground.clone()]);
        let bridge = bridge_with(registry, true);

        assert!(bridge.command(Command::PlayPause).unwrap());
        assert!(bridge.command(Command::NextTrack).unwrap());
        assert_eq!(
            foreground.sent(),
            vec![TransportCommand::Pause, TransportCommand::SkipToNext]
        );
        assert!(background.sent().is_empty());
    }

    #[test]
    fn test_torn_down_session_degrades() {
        let session = FakeSession::playing("com.music");
        let registry = FakeRegistry::with_sessions(vec![session.clone()]);
        let bridge = bridge_with(registry, true);
        session.tear_down();

        assert_eq!(bridge.get_status().unwrap(), None);
        assert!(!bridge.command(Command::Pause).unwrap());
    }

    #[test]
    fn test_unknown_method_is_not_implemented() {
        let bridge = bridge_with(FakeRegistry::with_sessions(vec![]), true);
        assert_eq!(reply(&bridge, "getLyrics"), MethodReply::NotImplemented);
    }

    #[test]
    fn test_open_settings_always_true() {
        let bridge = bridge_with(FakeRegistry::with_sessions(vec![]), false);
        assert_eq!(
            reply(&bridge, "openPermissionSettings"),
            MethodReply::Success(json!(true))
        );
    }

    #[test]
    fn test_respond_line_echoes_id_and_reports_faults() {
        let bridge = bridge_with(FakeRegistry::failing("service crashed"), true);
        let response = serde_json::to_value(bridge.respond_line(r#"{"id":3,"method":"getStatus"}"#))
            .unwrap();
        assert_eq!(response["id"], json!(3));
        assert_eq!(response["error"]["code"], json!("fault"));
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("service crashed"));

        let response = serde_json::to_value(bridge.respond_line(r#"{"id":4,"method":"seek"}"#))
            .unwrap();
        assert_eq!(response, json!({"id": 4, "notImplemented": true}));
    }

    #[test]
    fn test_list_sessions_diagnostic() {
        let registry = FakeRegistry::with_sessions(vec![
            FakeSession::paused("com.a"),
            FakeSession::playing("com.b"),
        ]);
        let bridge = bridge_with(registry, true);
        assert_eq!(
            reply(&bridge, "listSessions"),
            MethodReply::Success(json!([
                {"package": "com.a", "isPlaying": false},
                {"package": "com.b", "isPlaying": true}
            ]))
        );
    }
}
