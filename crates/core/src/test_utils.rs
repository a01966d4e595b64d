//! In-memory fakes of the OS collaborators for tests

use crate::actions::TransportActions;
use crate::error::{RegistryError, SessionError};
use crate::models::{ComponentName, PlaybackState, RawMetadata, RawPlaybackState, TransportCommand};
use crate::traits::{ListenerSettings, Session, SessionHandle, SessionRegistry, SettingsLauncher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct FakeSessionState {
    metadata: Option<RawMetadata>,
    playback: Option<RawPlaybackState>,
    sent: Vec<TransportCommand>,
    gone: bool,
}

/// A scripted session. Clones share state, so a test can keep one clone while
/// the registry hands out others.
#[derive(Debug, Clone)]
pub struct FakeSession {
    package: String,
    state: Arc<Mutex<FakeSessionState>>,
}

impl FakeSession {
    pub fn with_state(package: impl Into<String>, state: PlaybackState) -> Self {
        let session = Self::without_playback(package);
        session.lock().playback = Some(RawPlaybackState {
            state,
            position_ms: 0,
            actions: None,
        });
        session
    }

    pub fn playing(package: impl Into<String>) -> Self {
        Self::with_state(package, PlaybackState::Playing)
    }

    pub fn paused(package: impl Into<String>) -> Self {
        Self::with_state(package, PlaybackState::Paused)
    }

    /// A session that publishes no playback state at all
    pub fn without_playback(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            state: Arc::new(Mutex::new(FakeSessionState::default())),
        }
    }

    pub fn with_metadata(self, metadata: RawMetadata) -> Self {
        self.lock().metadata = Some(metadata);
        self
    }

    pub fn with_position(self, position_ms: i64) -> Self {
        self.lock().playback.get_or_insert_with(Default::default).position_ms = position_ms;
        self
    }

    pub fn with_actions(self, actions: TransportActions) -> Self {
        self.lock().playback.get_or_insert_with(Default::default).actions = Some(actions);
        self
    }

    /// Change the playback state in place, as the owning app would
    pub fn set_state(&self, state: PlaybackState) {
        self.lock().playback.get_or_insert_with(Default::default).state = state;
    }

    /// Simulate the owning app destroying its session
    pub fn tear_down(&self) {
        self.lock().gone = true;
    }

    /// Commands received so far, oldest first
    pub fn sent(&self) -> Vec<TransportCommand> {
        self.lock().sent.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeSessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn live(&self) -> Result<MutexGuard<'_, FakeSessionState>, SessionError> {
        let state = self.lock();
        if state.gone {
            return Err(SessionError::Gone);
        }
        Ok(state)
    }
}

impl SessionHandle for FakeSession {
    fn package_name(&self) -> String {
        self.package.clone()
    }

    fn metadata(&self) -> Result<Option<RawMetadata>, SessionError> {
        Ok(self.live()?.metadata.clone())
    }

    fn playback_state(&self) -> Result<Option<RawPlaybackState>, SessionError> {
        Ok(self.live()?.playback.clone())
    }

    fn send(&self, command: TransportCommand) -> Result<(), SessionError> {
        self.live()?.sent.push(command);
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum RegistryMode {
    Sessions(Vec<FakeSession>),
    Denied,
    Failing(String),
}

/// A registry returning a fixed list of sessions or a scripted failure
#[derive(Debug)]
pub struct FakeRegistry {
    mode: Mutex<RegistryMode>,
    last_listener: Mutex<Option<ComponentName>>,
    calls: AtomicUsize,
}

impl FakeRegistry {
    fn new(mode: RegistryMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            last_listener: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_sessions(sessions: Vec<FakeSession>) -> Self {
        Self::new(RegistryMode::Sessions(sessions))
    }

    /// Fails every enumeration with a security error
    pub fn denied() -> Self {
        Self::new(RegistryMode::Denied)
    }

    /// Fails every enumeration with an unexpected error
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(RegistryMode::Failing(message.into()))
    }

    pub fn set_sessions(&self, sessions: Vec<FakeSession>) {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner()) = RegistryMode::Sessions(sessions);
    }

    pub fn last_listener(&self) -> Option<ComponentName> {
        self.last_listener.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of enumerations performed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SessionRegistry for FakeRegistry {
    fn active_sessions(&self, listener: &ComponentName) -> Result<Vec<Session>, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(listener.clone());

        match &*self.mode.lock().unwrap_or_else(|e| e.into_inner()) {
            RegistryMode::Sessions(sessions) => Ok(sessions
                .iter()
                .cloned()
                .map(|s| Box::new(s) as Session)
                .collect()),
            RegistryMode::Denied => Err(RegistryError::Security(format!(
                "Missing permission to control media for {}",
                listener
            ))),
            RegistryMode::Failing(message) => Err(RegistryError::Other(anyhow::anyhow!(
                "{}",
                message
            ))),
        }
    }
}

/// Listener settings backed by a mutable string
#[derive(Debug, Default)]
pub struct FakeListenerSettings {
    flat: Mutex<Option<String>>,
}

impl FakeListenerSettings {
    pub fn new(flat: Option<&str>) -> Self {
        Self {
            flat: Mutex::new(flat.map(str::to_string)),
        }
    }

    pub fn set(&self, flat: Option<&str>) {
        *self.flat.lock().unwrap_or_else(|e| e.into_inner()) = flat.map(str::to_string);
    }
}

impl ListenerSettings for FakeListenerSettings {
    fn enabled_listeners(&self) -> Option<String> {
        self.flat.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Counts settings launches, optionally failing each one
#[derive(Debug, Default)]
pub struct FakeLauncher {
    launches: AtomicUsize,
    fail: bool,
}

impl FakeLauncher {
    pub fn failing() -> Self {
        Self {
            launches: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl SettingsLauncher for FakeLauncher {
    fn open_listener_settings(&self) -> anyhow::Result<()> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("no activity found to handle the settings intent");
        }
        Ok(())
    }
}
