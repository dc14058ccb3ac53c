//! Control-panel adapter trait definition
//!
//! This module defines the `ControlPanel` trait that every hosting-panel
//! integration must implement. The orchestrator only ever talks to this
//! trait, so adding a vendor never touches the sync logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::models::{PanelHealth, ProviderType};

/// A customer account as seen by the panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAccount {
    /// Panel-side customer id
    pub id: String,

    /// Display name
    pub name: String,

    /// Owner email, when the panel exposes one
    pub email: Option<String>,

    /// Verbatim payload from the panel
    pub raw: serde_json::Value,
}

/// Parameters for creating a panel customer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    /// Display name
    pub name: String,

    /// Owner email; when present a login is provisioned alongside
    pub email: Option<String>,

    /// Contact phone (most panels cannot store this at creation)
    pub phone: Option<String>,

    /// Company name (most panels cannot store this at creation)
    pub company: Option<String>,
}

impl NewCustomer {
    /// Create parameters with a name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the owner email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Partial customer update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerUpdate {
    /// New display name
    pub name: Option<String>,

    /// New email; rejected by adapters whose vendor cannot change it
    pub email: Option<String>,

    /// New phone; rejected by adapters whose vendor cannot change it
    pub phone: Option<String>,

    /// New company; rejected by adapters whose vendor cannot change it
    pub company: Option<String>,
}

impl CustomerUpdate {
    /// Fields the Enhance API cannot mutate, for error reporting
    pub fn immutable_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.email.is_some() {
            fields.push("email");
        }
        if self.phone.is_some() {
            fields.push("phone");
        }
        if self.company.is_some() {
            fields.push("company");
        }
        fields
    }
}

/// A purchasable plan on the panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPlan {
    /// Panel-side plan id
    pub id: String,

    /// Display name
    pub name: String,

    /// Verbatim payload from the panel
    pub raw: serde_json::Value,
}

/// Parameters for creating a hosting resource
///
/// Either `customer_id` or `email` must be present; when only an email is
/// given the adapter resolves (or creates) the customer first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewHosting {
    /// Panel-side customer id, when already known
    pub customer_id: Option<String>,

    /// Customer email, for find-or-create resolution
    pub email: Option<String>,

    /// Customer display name, used when creation is needed
    pub customer_name: Option<String>,

    /// Panel-side plan id. May be empty when no plan mapping exists;
    /// the adapter decides how to degrade.
    pub plan_id: String,

    /// Primary domain to provision
    pub domain: Option<String>,
}

/// A hosting resource as seen by the panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostingAccount {
    /// Panel-side hosting (website) id
    pub id: String,

    /// Panel-side customer id owning the resource
    pub customer_id: String,

    /// Provisioned domain, if any
    pub domain: Option<String>,

    /// Subscription backing the resource, when one was created
    pub subscription_id: Option<String>,

    /// Verbatim payload from the panel
    pub raw: serde_json::Value,
}

/// Partial hosting update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostingUpdate {
    /// New primary domain
    pub domain: Option<String>,
}

/// A domain attached to a hosting resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    /// Panel-side domain id
    pub id: String,

    /// Domain name
    pub name: String,
}

/// Trait for control-panel integrations
///
/// All operations return typed results; adapters convert vendor quirks
/// (timeouts, eventual consistency, composite resources) into this uniform
/// surface.
#[async_trait]
pub trait ControlPanel: Send + Sync {
    /// Vendor implemented by this adapter
    fn provider_type(&self) -> ProviderType;

    /// Look up a customer by email.
    ///
    /// Returns `None` unless a returned account's email case-insensitively
    /// equals the query: near-match lists from the vendor are filtered,
    /// never trusted.
    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<CustomerAccount>, ProviderError>;

    /// Find a customer by email, creating one if absent.
    ///
    /// Safe to call repeatedly for the same email without creating
    /// duplicates.
    async fn find_or_create_customer(
        &self,
        params: &NewCustomer,
    ) -> Result<CustomerAccount, ProviderError>;

    /// Fetch a customer by panel id
    async fn get_customer(&self, id: &str) -> Result<CustomerAccount, ProviderError>;

    /// Apply a partial customer update
    async fn update_customer(
        &self,
        id: &str,
        update: &CustomerUpdate,
    ) -> Result<CustomerAccount, ProviderError>;

    /// Delete a customer
    async fn delete_customer(&self, id: &str) -> Result<(), ProviderError>;

    /// List purchasable plans
    async fn get_plans(&self) -> Result<Vec<ProviderPlan>, ProviderError>;

    /// Fetch a single plan by panel id
    async fn get_plan(&self, id: &str) -> Result<ProviderPlan, ProviderError>;

    /// Create a hosting resource as one logical operation.
    ///
    /// Side effects may include creating a customer and a plan subscription.
    /// Success is reported only when the hosting resource itself is
    /// confirmed created; subscription failure is logged and non-fatal.
    async fn create_hosting(&self, params: &NewHosting) -> Result<HostingAccount, ProviderError>;

    /// Fetch a hosting resource by panel id
    async fn get_hosting(&self, id: &str) -> Result<HostingAccount, ProviderError>;

    /// Apply a partial hosting update
    async fn update_hosting(
        &self,
        id: &str,
        update: &HostingUpdate,
    ) -> Result<HostingAccount, ProviderError>;

    /// Suspend a hosting resource
    async fn suspend_hosting(&self, id: &str) -> Result<(), ProviderError>;

    /// Lift a suspension
    async fn unsuspend_hosting(&self, id: &str) -> Result<(), ProviderError>;

    /// Delete a hosting resource
    async fn delete_hosting(&self, id: &str) -> Result<(), ProviderError>;

    /// Attach a domain to a hosting resource
    async fn add_domain(
        &self,
        hosting_id: &str,
        domain: &str,
    ) -> Result<DomainRecord, ProviderError>;

    /// Detach a domain from a hosting resource
    async fn remove_domain(&self, hosting_id: &str, domain_id: &str)
        -> Result<(), ProviderError>;

    /// Probe panel availability
    async fn health_check(&self) -> Result<PanelHealth, ProviderError>;
}
