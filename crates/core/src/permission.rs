//! Listener permission gate

use crate::models::ComponentName;
use crate::traits::{ListenerSettings, SettingsLauncher};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether `package` owns one of the components in a flattened listener
/// string such as `com.a/com.a.Svc:com.b/.Listener`.
///
/// Entries are parsed into [`ComponentName`]s and compared by exact package,
/// so `com.example.app` is not granted by `com.example.app.extra/...`.
pub fn is_listener_enabled(flat: Option<&str>, package: &str) -> bool {
    let Some(flat) = flat else {
        return false;
    };

    flat.split(':')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match entry.parse::<ComponentName>() {
            Ok(component) => Some(component),
            Err(_) => {
                debug!("Skipping malformed listener entry: {:?}", entry);
                None
            }
        })
        .any(|component| component.package == package)
}

/// Answers "may this process enumerate sessions right now?"
///
/// Nothing is cached: the user can toggle access outside the process.
#[derive(Clone)]
pub struct PermissionGate {
    settings: Arc<dyn ListenerSettings>,
    launcher: Arc<dyn SettingsLauncher>,
    package: String,
}

impl PermissionGate {
    pub fn new(
        settings: Arc<dyn ListenerSettings>,
        launcher: Arc<dyn SettingsLauncher>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            launcher,
            package: package.into(),
        }
    }

    pub fn check_permission(&self) -> bool {
        let flat = self.settings.enabled_listeners();
        let granted = is_listener_enabled(flat.as_deref(), &self.package);
        debug!("Listener permission for {}: {}", self.package, granted);
        granted
    }

    /// Launch the settings surface. Always reports `true`; granting happens
    /// outside this process.
    pub fn open_permission_settings(&self) -> bool {
        match self.launcher.open_listener_settings() {
            Ok(()) => info!("Opened notification listener settings"),
            Err(e) => warn!("Failed to open notification listener settings: {:#}", e),
        }
        true
    }
}
