//! Deployment mode resolution.
//!
//! A stored user preference wins when it is valid for the platform;
//! otherwise the first platform-supported mode applies, preferring managed
//! when both are supported. Unsupported stored values are never honored
//! silently — validation happens when the preference is written, so a
//! mismatch here means the configuration source misbehaved and we fall
//! through to the platform default.

use tracing::warn;

use crate::config::ModeSettings;
use crate::errors::{OrchestratorError, Result};
use crate::service::{DeploymentMode, ServiceDefinition};

pub fn resolve_mode(
    definition: &ServiceDefinition,
    settings: &dyn ModeSettings,
) -> Result<DeploymentMode> {
    let supported = &definition.supported_modes;
    if supported.is_empty() {
        return Err(OrchestratorError::NoSupportedModes {
            service: definition.name.clone(),
        });
    }

    if let Some(preferred) = settings.service_mode(&definition.name) {
        if supported.contains(&preferred) {
            return Ok(preferred);
        }
        warn!(
            "Stored mode {} for service {} is not supported on this platform, using default",
            preferred.as_str(),
            definition.name
        );
    }

    if supported.contains(&DeploymentMode::Managed) {
        Ok(DeploymentMode::Managed)
    } else {
        Ok(supported[0])
    }
}
