//! Provider configuration models
//!
//! Provider records are created and edited by administrators; the factory
//! reads them on every adapter resolution.

use serde::{Deserialize, Serialize};

/// Supported control-panel vendors
///
/// Only Enhance has an adapter today; the remaining variants are reserved
/// so stored records parse once those integrations land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Enhance control panel
    Enhance,
    /// cPanel/WHM (reserved)
    Cpanel,
    /// Plesk (reserved)
    Plesk,
}

impl ProviderType {
    /// Default-provider selection priority; lower wins.
    pub fn priority(&self) -> u8 {
        match self {
            ProviderType::Enhance => 0,
            ProviderType::Cpanel => 1,
            ProviderType::Plesk => 2,
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Enhance => write!(f, "enhance"),
            ProviderType::Cpanel => write!(f, "cpanel"),
            ProviderType::Plesk => write!(f, "plesk"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enhance" => Ok(ProviderType::Enhance),
            "cpanel" => Ok(ProviderType::Cpanel),
            "plesk" => Ok(ProviderType::Plesk),
            other => Err(format!("unknown provider type: {}", other)),
        }
    }
}

/// A stored control-panel configuration record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Local id
    pub id: i64,

    /// Vendor this record configures
    pub provider_type: ProviderType,

    /// Only enabled records are eligible sync targets
    pub enabled: bool,

    /// Opaque credential/config blob (api key, base URL, org id).
    /// Parsed by the factory; malformed JSON degrades to an empty object.
    pub config: serde_json::Value,
}

impl ProviderRecord {
    /// Create a new enabled record
    pub fn new(id: i64, provider_type: ProviderType, config: serde_json::Value) -> Self {
        Self {
            id,
            provider_type,
            enabled: true,
            config,
        }
    }
}

/// Health probe status for a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelStatus {
    /// Panel responds normally
    Healthy,
    /// Panel responds but reported a problem
    Degraded,
    /// Panel unreachable
    Down,
}

impl std::fmt::Display for PanelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelStatus::Healthy => write!(f, "healthy"),
            PanelStatus::Degraded => write!(f, "degraded"),
            PanelStatus::Down => write!(f, "down"),
        }
    }
}

/// Result of a panel health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelHealth {
    /// Probe status
    pub status: PanelStatus,

    /// Detail message, if any
    pub message: Option<String>,
}

impl PanelHealth {
    /// Healthy probe result
    pub fn healthy() -> Self {
        Self {
            status: PanelStatus::Healthy,
            message: None,
        }
    }

    /// Degraded probe result with a message
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: PanelStatus::Degraded,
            message: Some(message.into()),
        }
    }

    /// Down probe result with a message
    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: PanelStatus::Down,
            message: Some(message.into()),
        }
    }
}
