//! Platform media session backends
//!
//! Each backend implements the OS-facing traits of `nowplaying-core`:
//! - Android: `MediaSessionManager` through JNI
//! - Linux: MPRIS via D-Bus

use nowplaying_core::{ComponentName, ListenerSettings, MediaBridge, SessionRegistry, SettingsLauncher};
use std::sync::Arc;

/// The OS collaborators a bridge needs, as provided by one platform
#[derive(Clone)]
pub struct Backend {
    pub registry: Arc<dyn SessionRegistry>,
    pub settings: Arc<dyn ListenerSettings>,
    pub launcher: Arc<dyn SettingsLauncher>,
}

impl Backend {
    /// Build a bridge that enumerates sessions on behalf of `listener`
    pub fn into_bridge(self, listener: ComponentName) -> MediaBridge {
        MediaBridge::from_parts(self.registry, self.settings, self.launcher, listener)
    }
}

// Platform-specific modules
#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "android")]
pub mod android;

/// Create the MPRIS backend for the desktop session bus
#[cfg(target_os = "linux")]
pub fn create_backend(listener: &ComponentName) -> Backend {
    Backend {
        registry: Arc::new(linux::MprisRegistry::new()),
        settings: Arc::new(linux::SessionBusListenerSettings::new(listener.clone())),
        launcher: Arc::new(linux::NoopSettingsLauncher),
    }
}

#[cfg(target_os = "android")]
pub use android::create_backend;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
compile_error!("Unsupported platform - media session access requires Android or Linux (MPRIS)");

#[cfg(test)]
mod tests {
    use super::*;
    use nowplaying_core::test_utils::{FakeLauncher, FakeListenerSettings, FakeRegistry, FakeSession};
    use nowplaying_core::{Command, MethodCall, MethodReply};

    #[test]
    fn test_backend_into_bridge() {
        let listener: ComponentName = "cc.koto.fluent_lyrics/.MediaSessionListenerService"
            .parse()
            .unwrap();
        let session = FakeSession::playing("com.music");
        let registry = Arc::new(FakeRegistry::with_sessions(vec![session.clone()]));
        let backend = Backend {
            registry: registry.clone(),
            settings: Arc::new(FakeListenerSettings::new(Some(
                "cc.koto.fluent_lyrics/.MediaSessionListenerService",
            ))),
            launcher: Arc::new(FakeLauncher::default()),
        };

        let bridge = backend.into_bridge(listener.clone());
        assert!(bridge.command(Command::Pause).unwrap());
        assert_eq!(registry.last_listener(), Some(listener));
        assert_eq!(
            bridge.handle(&MethodCall::new("isPlaying")).unwrap(),
            MethodReply::Success(serde_json::Value::Bool(true))
        );
    }
}
