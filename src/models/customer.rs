//! Customer and plan domain models
//!
//! Customers, local plans, and plan mappings are owned by the back-office
//! CRUD screens; this subsystem only reads them.

use serde::{Deserialize, Serialize};

/// A back-office customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Local id
    pub id: i64,

    /// Display name
    pub name: String,

    /// Contact email, used as the panel-side identity
    pub email: String,

    /// Contact phone
    pub phone: Option<String>,

    /// Company name
    pub company: Option<String>,
}

impl Customer {
    /// Create a new customer
    pub fn new(id: i64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            phone: None,
            company: None,
        }
    }
}

/// Kind of sellable plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    /// Shared hosting
    Hosting,
    /// Virtual private server
    Vps,
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanType::Hosting => write!(f, "hosting"),
            PlanType::Vps => write!(f, "vps"),
        }
    }
}

impl std::str::FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hosting" => Ok(PlanType::Hosting),
            "vps" => Ok(PlanType::Vps),
            other => Err(format!("unknown plan type: {}", other)),
        }
    }
}

/// A locally-priced plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPlan {
    /// Local id
    pub id: i64,

    /// Kind of plan
    pub plan_type: PlanType,

    /// Display name
    pub name: String,
}

impl LocalPlan {
    /// Create a new plan
    pub fn new(id: i64, plan_type: PlanType, name: impl Into<String>) -> Self {
        Self {
            id,
            plan_type,
            name: name.into(),
        }
    }
}

/// Association between a local plan and a provider's plan identifier
///
/// At most one active mapping exists per (provider, plan type, local plan);
/// the partial unique index in the schema enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMapping {
    /// Local id
    pub id: i64,

    /// Provider record the mapping targets
    pub provider_id: i64,

    /// Plan type the mapping covers
    pub plan_type: PlanType,

    /// Local plan id
    pub local_plan_id: i64,

    /// Panel-side plan identifier
    pub external_plan_id: String,

    /// Panel-side plan name, for operator display
    pub external_plan_name: Option<String>,

    /// Whether this mapping is in effect
    pub active: bool,
}

impl PlanMapping {
    /// Create a new active mapping
    pub fn new(
        id: i64,
        provider_id: i64,
        plan_type: PlanType,
        local_plan_id: i64,
        external_plan_id: impl Into<String>,
    ) -> Self {
        Self {
            id,
            provider_id,
            plan_type,
            local_plan_id,
            external_plan_id: external_plan_id.into(),
            external_plan_name: None,
            active: true,
        }
    }
}
