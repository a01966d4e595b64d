use crate::error::{RegistryError, SessionError};
use crate::models::{ComponentName, RawMetadata, RawPlaybackState, TransportCommand};

/// One OS-registered media session.
///
/// Handles are borrowed for a single request. The owning app may tear the
/// session down at any time, after which every call returns
/// [`SessionError::Gone`].
pub trait SessionHandle: Send + Sync {
    /// Package (or bus name) of the app that owns the session
    fn package_name(&self) -> String;

    /// Current metadata, `None` if the session publishes none
    fn metadata(&self) -> Result<Option<RawMetadata>, SessionError>;

    /// Current playback snapshot, `None` if the session publishes none
    fn playback_state(&self) -> Result<Option<RawPlaybackState>, SessionError>;

    /// Fire a transport command. Does not wait for the state change.
    fn send(&self, command: TransportCommand) -> Result<(), SessionError>;
}

pub type Session = Box<dyn SessionHandle>;

/// OS service that enumerates active media sessions
pub trait SessionRegistry: Send + Sync {
    /// List sessions in registry order on behalf of `listener`.
    ///
    /// Returns [`RegistryError::Security`] when the listener privilege is
    /// missing.
    fn active_sessions(&self, listener: &ComponentName) -> Result<Vec<Session>, RegistryError>;
}

/// Source of the flattened, colon-separated listener registration string
pub trait ListenerSettings: Send + Sync {
    fn enabled_listeners(&self) -> Option<String>;
}

/// Opens the OS surface where the user grants listener access
pub trait SettingsLauncher: Send + Sync {
    fn open_listener_settings(&self) -> anyhow::Result<()>;
}
