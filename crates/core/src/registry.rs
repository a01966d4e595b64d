//! Session registry adapter

use crate::error::{BridgeError, BridgeResult, RegistryError};
use crate::models::ComponentName;
use crate::traits::{Session, SessionRegistry};
use std::sync::Arc;
use tracing::{debug, warn};

/// Enumerates sessions on behalf of the configured listener component.
///
/// Only the security failure class becomes [`BridgeError::PermissionDenied`];
/// every other registry failure comes back as [`BridgeError::Fault`].
#[derive(Clone)]
pub struct RegistryAdapter {
    registry: Arc<dyn SessionRegistry>,
    listener: ComponentName,
}

impl RegistryAdapter {
    pub fn new(registry: Arc<dyn SessionRegistry>, listener: ComponentName) -> Self {
        Self { registry, listener }
    }

    pub fn listener(&self) -> &ComponentName {
        &self.listener
    }

    pub fn list_sessions(&self) -> BridgeResult<Vec<Session>> {
        match self.registry.active_sessions(&self.listener) {
            Ok(sessions) => {
                debug!("Registry returned {} session(s)", sessions.len());
                Ok(sessions)
            }
            Err(RegistryError::Security(msg)) => {
                warn!("Session enumeration denied for {}: {}", self.listener, msg);
                Err(BridgeError::PermissionDenied)
            }
            Err(RegistryError::Other(e)) => Err(BridgeError::Fault(
                e.context(format!("listing media sessions for {}", self.listener)),
            )),
        }
    }
}
