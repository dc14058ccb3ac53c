//! Enhance control-panel adapter
//!
//! This module implements the `ControlPanel` contract against the Enhance
//! panel REST API.
//!
//! Enhance resource model quirks hidden behind the contract:
//! - A "customer" is an organization plus a login plus an Owner membership.
//!   Organization creation accepts a name only; contact details live on the
//!   login.
//! - A "hosting" purchase is a subscription plus a website, both created in
//!   the customer's organization context.
//! - Login creation returns HTTP 409 when the email is already registered in
//!   the realm; the existing login is then looked up and reused.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::models::{PanelHealth, ProviderType};

use super::traits::{
    ControlPanel, CustomerAccount, CustomerUpdate, DomainRecord, HostingAccount, HostingUpdate,
    NewCustomer, NewHosting, ProviderPlan,
};

/// Attempts made while waiting for a freshly-composed customer to become
/// visible. Membership propagation in the panel backend is eventually
/// consistent.
const READY_POLL_ATTEMPTS: u32 = 5;

/// Pause between readiness polls
const READY_POLL_INTERVAL: Duration = Duration::from_millis(400);

/// Configuration for the Enhance adapter
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnhanceConfig {
    /// API key, sent as a bearer token
    #[serde(default)]
    pub api_key: String,

    /// Panel API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Reseller organization id (the caller's own org)
    #[serde(default)]
    pub org_id: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            org_id: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://panel.example.com/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Enhance panel adapter
pub struct EnhancePanel {
    config: EnhanceConfig,
    client: Client,
}

impl EnhancePanel {
    /// Create a new adapter with the given configuration
    pub fn new(config: EnhanceConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Send a request and normalize the response into a JSON value
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let mut request = self
            .client
            .request(method.clone(), url.as_str())
            .bearer_auth(&self.config.api_key);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(method = %method, url = %url, "Sending panel request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::RequestTimeout
            } else if e.is_connect() {
                ProviderError::ConnectionRefused
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                if s == StatusCode::NO_CONTENT {
                    return Ok(serde_json::Value::Null);
                }
                response
                    .json()
                    .await
                    .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
            }
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => {
                let wait = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                Err(ProviderError::RateLimited(wait))
            }
            s => {
                let message = response.text().await.unwrap_or_default();
                Err(ProviderError::Api {
                    status: s.as_u16(),
                    message,
                })
            }
        }
    }

    /// Create an organization, and when an email is present a login plus an
    /// Owner membership, then wait for the composed customer to be visible.
    async fn create_customer(&self, params: &NewCustomer) -> Result<CustomerAccount, ProviderError> {
        // The org endpoint accepts a name only; email/phone/company are not
        // part of organization creation.
        let value = self
            .request(Method::POST, "/orgs", &[], Some(json!({ "name": params.name })))
            .await?;
        let org: OrgPayload = parse(&value)?;

        info!(org = %org.id, "Created panel organization");

        if let Some(email) = params.email.as_deref() {
            let login_id = self.ensure_login(email).await?;

            self.request(
                Method::POST,
                &format!("/orgs/{}/members", org.id),
                &[],
                Some(json!({ "loginId": login_id, "roles": ["Owner"] })),
            )
            .await?;

            return self.await_customer_ready(&org.id).await;
        }

        Ok(CustomerAccount {
            id: org.id,
            name: org.name,
            email: None,
            raw: value,
        })
    }

    /// Create a login for `email`, reusing the existing one on a 409 conflict
    async fn ensure_login(&self, email: &str) -> Result<String, ProviderError> {
        let password = generate_password();

        match self
            .request(
                Method::POST,
                "/logins",
                &[],
                Some(json!({ "email": email, "password": password })),
            )
            .await
        {
            Ok(value) => {
                let login: LoginPayload = parse(&value)?;
                Ok(login.id)
            }
            Err(ProviderError::Api { status: 409, .. }) => {
                debug!(email = email, "Login already exists, reusing");
                let value = self
                    .request(Method::GET, "/logins", &[("email", email)], None)
                    .await?;
                let list: ListPayload = parse(&value)?;
                for item in list.items {
                    let login: LoginPayload = parse(&item)?;
                    if login.email.eq_ignore_ascii_case(email) {
                        return Ok(login.id);
                    }
                }
                Err(ProviderError::InvalidResponse(format!(
                    "login for {} not found after conflict",
                    email
                )))
            }
            Err(e) => Err(e),
        }
    }

    /// Bounded poll until the freshly-composed customer is fetchable
    async fn await_customer_ready(&self, org_id: &str) -> Result<CustomerAccount, ProviderError> {
        for attempt in 0..READY_POLL_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
            match self.get_customer(org_id).await {
                Ok(account) => return Ok(account),
                Err(ProviderError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ProviderError::InvalidResponse(format!(
            "organization {} not visible after {} polls",
            org_id, READY_POLL_ATTEMPTS
        )))
    }
}

#[async_trait]
impl ControlPanel for EnhancePanel {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Enhance
    }

    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<CustomerAccount>, ProviderError> {
        if email.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "email must not be empty".to_string(),
            ));
        }

        let value = self
            .request(Method::GET, "/orgs", &[("email", email)], None)
            .await?;
        let list: ListPayload = parse(&value)?;

        // The panel returns near matches; only an exact (case-insensitive)
        // owner email counts as found.
        for item in list.items {
            let org: OrgPayload = parse(&item)?;
            if org
                .owner_email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
            {
                return Ok(Some(CustomerAccount {
                    id: org.id,
                    name: org.name,
                    email: org.owner_email,
                    raw: item,
                }));
            }
        }

        Ok(None)
    }

    async fn find_or_create_customer(
        &self,
        params: &NewCustomer,
    ) -> Result<CustomerAccount, ProviderError> {
        if let Some(email) = params.email.as_deref() {
            if let Some(existing) = self.find_customer_by_email(email).await? {
                debug!(org = %existing.id, email = email, "Reusing existing panel customer");
                return Ok(existing);
            }
        }

        self.create_customer(params).await
    }

    async fn get_customer(&self, id: &str) -> Result<CustomerAccount, ProviderError> {
        let value = self
            .request(Method::GET, &format!("/orgs/{}", id), &[], None)
            .await?;
        let org: OrgPayload = parse(&value)?;

        Ok(CustomerAccount {
            id: org.id,
            name: org.name,
            email: org.owner_email,
            raw: value,
        })
    }

    async fn update_customer(
        &self,
        id: &str,
        update: &CustomerUpdate,
    ) -> Result<CustomerAccount, ProviderError> {
        // Only the organization display name is mutable through the panel
        // API. Rejecting is preferred over silently dropping fields.
        let immutable = update.immutable_fields();
        if !immutable.is_empty() {
            return Err(ProviderError::UnsupportedUpdate(immutable.join(", ")));
        }

        let Some(name) = update.name.as_deref() else {
            return self.get_customer(id).await;
        };

        let value = self
            .request(
                Method::PATCH,
                &format!("/orgs/{}", id),
                &[],
                Some(json!({ "name": name })),
            )
            .await?;
        let org: OrgPayload = parse(&value)?;

        Ok(CustomerAccount {
            id: org.id,
            name: org.name,
            email: org.owner_email,
            raw: value,
        })
    }

    async fn delete_customer(&self, id: &str) -> Result<(), ProviderError> {
        self.request(Method::DELETE, &format!("/orgs/{}", id), &[], None)
            .await?;
        Ok(())
    }

    async fn get_plans(&self) -> Result<Vec<ProviderPlan>, ProviderError> {
        let value = self
            .request(
                Method::GET,
                &format!("/orgs/{}/plans", self.config.org_id),
                &[],
                None,
            )
            .await?;
        let list: ListPayload = parse(&value)?;

        let mut plans = Vec::with_capacity(list.items.len());
        for item in list.items {
            let plan: PlanPayload = parse(&item)?;
            plans.push(ProviderPlan {
                id: plan.id,
                name: plan.name,
                raw: item,
            });
        }
        Ok(plans)
    }

    async fn get_plan(&self, id: &str) -> Result<ProviderPlan, ProviderError> {
        // The panel exposes plans only as a collection on the reseller org
        self.get_plans()
            .await?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(ProviderError::NotFound)
    }

    async fn create_hosting(&self, params: &NewHosting) -> Result<HostingAccount, ProviderError> {
        let customer_id = match (&params.customer_id, &params.email) {
            (Some(id), _) => id.clone(),
            (None, Some(email)) => {
                let name = params
                    .customer_name
                    .clone()
                    .unwrap_or_else(|| email.clone());
                self.find_or_create_customer(&NewCustomer::named(name).with_email(email.clone()))
                    .await?
                    .id
            }
            (None, None) => {
                return Err(ProviderError::InvalidRequest(
                    "customer_id or email required".to_string(),
                ))
            }
        };

        // Subscription purchase happens in the customer's org context, not
        // the reseller's. Failure here is non-fatal: the website can still
        // be provisioned and the subscription reconciled later.
        let subscription_id = if params.plan_id.is_empty() {
            warn!(customer = %customer_id, "No panel plan id resolved, skipping subscription");
            None
        } else {
            match self
                .request(
                    Method::POST,
                    &format!("/orgs/{}/subscriptions", customer_id),
                    &[],
                    Some(json!({ "planId": params.plan_id })),
                )
                .await
            {
                Ok(value) => parse::<SubscriptionPayload>(&value).ok().map(|s| s.id),
                Err(e) => {
                    warn!(
                        customer = %customer_id,
                        plan = %params.plan_id,
                        error = %e,
                        "Subscription creation failed, continuing with website creation"
                    );
                    None
                }
            }
        };

        let mut body = json!({ "domain": params.domain });
        if let Some(sub) = &subscription_id {
            body["subscriptionId"] = json!(sub);
        }

        // Website creation failure is the operation's failure
        let value = self
            .request(
                Method::POST,
                &format!("/orgs/{}/websites", customer_id),
                &[],
                Some(body),
            )
            .await?;
        let website: WebsitePayload = parse(&value)?;

        info!(
            website = %website.id,
            customer = %customer_id,
            "Hosting resource created"
        );

        Ok(HostingAccount {
            id: website.id,
            customer_id,
            domain: website.domain.or_else(|| params.domain.clone()),
            subscription_id,
            raw: value,
        })
    }

    async fn get_hosting(&self, id: &str) -> Result<HostingAccount, ProviderError> {
        let value = self
            .request(Method::GET, &format!("/websites/{}", id), &[], None)
            .await?;
        let website: WebsitePayload = parse(&value)?;

        Ok(HostingAccount {
            id: website.id,
            customer_id: website.org_id.unwrap_or_default(),
            domain: website.domain,
            subscription_id: website.subscription_id,
            raw: value,
        })
    }

    async fn update_hosting(
        &self,
        id: &str,
        update: &HostingUpdate,
    ) -> Result<HostingAccount, ProviderError> {
        let Some(domain) = update.domain.as_deref() else {
            return self.get_hosting(id).await;
        };

        let value = self
            .request(
                Method::PATCH,
                &format!("/websites/{}", id),
                &[],
                Some(json!({ "domain": domain })),
            )
            .await?;
        let website: WebsitePayload = parse(&value)?;

        Ok(HostingAccount {
            id: website.id,
            customer_id: website.org_id.unwrap_or_default(),
            domain: website.domain,
            subscription_id: website.subscription_id,
            raw: value,
        })
    }

    async fn suspend_hosting(&self, id: &str) -> Result<(), ProviderError> {
        self.request(
            Method::PATCH,
            &format!("/websites/{}", id),
            &[],
            Some(json!({ "status": "suspended" })),
        )
        .await?;
        Ok(())
    }

    async fn unsuspend_hosting(&self, id: &str) -> Result<(), ProviderError> {
        self.request(
            Method::PATCH,
            &format!("/websites/{}", id),
            &[],
            Some(json!({ "status": "active" })),
        )
        .await?;
        Ok(())
    }

    async fn delete_hosting(&self, id: &str) -> Result<(), ProviderError> {
        self.request(Method::DELETE, &format!("/websites/{}", id), &[], None)
            .await?;
        Ok(())
    }

    async fn add_domain(
        &self,
        hosting_id: &str,
        domain: &str,
    ) -> Result<DomainRecord, ProviderError> {
        let value = self
            .request(
                Method::POST,
                &format!("/websites/{}/domains", hosting_id),
                &[],
                Some(json!({ "domain": domain })),
            )
            .await?;
        let record: DomainPayload = parse(&value)?;

        Ok(DomainRecord {
            id: record.id,
            name: record.domain,
        })
    }

    async fn remove_domain(
        &self,
        hosting_id: &str,
        domain_id: &str,
    ) -> Result<(), ProviderError> {
        self.request(
            Method::DELETE,
            &format!("/websites/{}/domains/{}", hosting_id, domain_id),
            &[],
            None,
        )
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<PanelHealth, ProviderError> {
        match self
            .request(
                Method::GET,
                &format!("/orgs/{}", self.config.org_id),
                &[],
                None,
            )
            .await
        {
            Ok(_) => Ok(PanelHealth::healthy()),
            Err(e @ (ProviderError::RequestTimeout | ProviderError::ConnectionRefused)) => {
                Ok(PanelHealth::down(e.to_string()))
            }
            Err(e) => Ok(PanelHealth::degraded(e.to_string())),
        }
    }
}

// =============================================================================
// Wire payloads
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListPayload {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OrgPayload {
    id: String,
    name: String,
    #[serde(default, rename = "ownerEmail")]
    owner_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    id: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionPayload {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WebsitePayload {
    id: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default, rename = "orgId")]
    org_id: Option<String>,
    #[serde(default, rename = "subscriptionId")]
    subscription_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlanPayload {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DomainPayload {
    id: String,
    domain: String,
}

fn parse<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T, ProviderError> {
    serde_json::from_value(value.clone())
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Generate a random password satisfying the panel's policy
/// (16+ characters, upper, lower, digit, symbol).
fn generate_password() -> String {
    const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
    const LOWER: &[u8] = b"abcdefghjkmnpqrstuvwxyz";
    const DIGITS: &[u8] = b"23456789";
    const SYMBOLS: &[u8] = b"!@#$%^&*";

    let mut rng = rand::thread_rng();
    let mut chars = vec![
        UPPER[rng.gen_range(0..UPPER.len())],
        LOWER[rng.gen_range(0..LOWER.len())],
        DIGITS[rng.gen_range(0..DIGITS.len())],
        SYMBOLS[rng.gen_range(0..SYMBOLS.len())],
    ];

    let pool: Vec<u8> = [UPPER, LOWER, DIGITS, SYMBOLS].concat();
    for _ in 0..20 {
        chars.push(pool[rng.gen_range(0..pool.len())]);
    }
    chars.shuffle(&mut rng);

    String::from_utf8(chars).expect("password characters are ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn panel_for(server: &MockServer) -> EnhancePanel {
        EnhancePanel::new(EnhanceConfig {
            api_key: "ek_test".to_string(),
            base_url: server.uri(),
            org_id: "org_reseller".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    // Test 1: Generated passwords satisfy the panel policy
    #[test]
    fn test_generated_password_policy() {
        for _ in 0..50 {
            let password = generate_password();
            assert!(password.len() >= 16);
            assert!(password.chars().any(|c| c.is_ascii_uppercase()));
            assert!(password.chars().any(|c| c.is_ascii_lowercase()));
            assert!(password.chars().any(|c| c.is_ascii_digit()));
            assert!(password.chars().any(|c| "!@#$%^&*".contains(c)));
        }
    }

    // Test 2: Empty email is rejected before any request
    #[tokio::test]
    async fn test_find_customer_empty_email() {
        let server = MockServer::start().await;
        let panel = panel_for(&server);

        let result = panel.find_customer_by_email("  ").await;
        assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
    }

    // Test 3: Near-match results from the panel are filtered out
    #[tokio::test]
    async fn test_find_customer_filters_mismatched_email() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs"))
            .and(query_param("email", "a@x.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "org_b", "name": "B Corp", "ownerEmail": "b@x.com"}
                ]
            })))
            .mount(&server)
            .await;

        let panel = panel_for(&server);
        let result = panel.find_customer_by_email("a@x.com").await.unwrap();
        assert!(result.is_none());
    }

    // Test 4: Exact email match is case-insensitive
    #[tokio::test]
    async fn test_find_customer_case_insensitive_match() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "org_a", "name": "A Corp", "ownerEmail": "A@X.com"}
                ]
            })))
            .mount(&server)
            .await;

        let panel = panel_for(&server);
        let account = panel
            .find_customer_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.id, "org_a");
        assert_eq!(account.email, Some("A@X.com".to_string()));
    }

    // Test 5: find_or_create reuses an existing customer without creating
    #[tokio::test]
    async fn test_find_or_create_reuses_existing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "org_a", "name": "A Corp", "ownerEmail": "a@x.com"}
                ]
            })))
            .mount(&server)
            .await;

        // No POST /orgs mock mounted: a creation attempt would 404 and fail
        let panel = panel_for(&server);
        let account = panel
            .find_or_create_customer(&NewCustomer::named("A Corp").with_email("a@x.com"))
            .await
            .unwrap();
        assert_eq!(account.id, "org_a");
    }

    // Test 6: Customer creation composes org + login + membership
    #[tokio::test]
    async fn test_create_customer_composition() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/orgs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "org_new", "name": "New Client"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/logins"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "login_1", "email": "new@client.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/orgs/org_new/members"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "member_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/orgs/org_new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "org_new", "name": "New Client", "ownerEmail": "new@client.com"
            })))
            .mount(&server)
            .await;

        let panel = panel_for(&server);
        let account = panel
            .find_or_create_customer(
                &NewCustomer::named("New Client").with_email("new@client.com"),
            )
            .await
            .unwrap();

        assert_eq!(account.id, "org_new");
        assert_eq!(account.email, Some("new@client.com".to_string()));
    }

    // Test 7: Login 409 conflict reuses the existing login
    #[tokio::test]
    async fn test_login_conflict_reuses_existing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/orgs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "org_new", "name": "Client"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/logins"))
            .respond_with(ResponseTemplate::new(409).set_body_string("already exists"))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/logins"))
            .and(query_param("email", "taken@client.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "login_77", "email": "taken@client.com"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/orgs/org_new/members"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "m1"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/orgs/org_new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "org_new", "name": "Client", "ownerEmail": "taken@client.com"
            })))
            .mount(&server)
            .await;

        let panel = panel_for(&server);
        let account = panel
            .find_or_create_customer(&NewCustomer::named("Client").with_email("taken@client.com"))
            .await
            .unwrap();
        assert_eq!(account.id, "org_new");
    }

    // Test 8: update_customer rejects fields the vendor cannot change
    #[tokio::test]
    async fn test_update_customer_rejects_immutable_fields() {
        let server = MockServer::start().await;
        let panel = panel_for(&server);

        let update = CustomerUpdate {
            email: Some("new@x.com".to_string()),
            phone: Some("+4912345".to_string()),
            ..CustomerUpdate::default()
        };
        let result = panel.update_customer("org_1", &update).await;

        match result {
            Err(ProviderError::UnsupportedUpdate(fields)) => {
                assert_eq!(fields, "email, phone");
            }
            other => panic!("Expected UnsupportedUpdate, got {:?}", other),
        }
    }

    // Test 9: Subscription failure does not abort hosting creation
    #[tokio::test]
    async fn test_create_hosting_subscription_failure_tolerated() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/orgs/org_1/subscriptions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("subscription backend down"))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/orgs/org_1/websites"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "web_9", "domain": "a.example.com", "orgId": "org_1"
            })))
            .mount(&server)
            .await;

        let panel = panel_for(&server);
        let account = panel
            .create_hosting(&NewHosting {
                customer_id: Some("org_1".to_string()),
                plan_id: "plan_99".to_string(),
                domain: Some("a.example.com".to_string()),
                ..NewHosting::default()
            })
            .await
            .unwrap();

        assert_eq!(account.id, "web_9");
        assert_eq!(account.subscription_id, None);
    }

    // Test 10: Website failure aborts hosting creation
    #[tokio::test]
    async fn test_create_hosting_website_failure_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/orgs/org_1/subscriptions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "sub_1"})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/orgs/org_1/websites"))
            .respond_with(ResponseTemplate::new(500).set_body_string("website backend down"))
            .mount(&server)
            .await;

        let panel = panel_for(&server);
        let result = panel
            .create_hosting(&NewHosting {
                customer_id: Some("org_1".to_string()),
                plan_id: "plan_99".to_string(),
                domain: Some("a.example.com".to_string()),
                ..NewHosting::default()
            })
            .await;

        assert!(matches!(
            result,
            Err(ProviderError::Api { status: 500, .. })
        ));
    }

    // Test 11: Empty plan id skips the subscription call entirely
    #[tokio::test]
    async fn test_create_hosting_empty_plan_skips_subscription() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/orgs/org_1/subscriptions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "sub_1"})))
            .expect(0)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/orgs/org_1/websites"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "web_1", "orgId": "org_1"
            })))
            .mount(&server)
            .await;

        let panel = panel_for(&server);
        let account = panel
            .create_hosting(&NewHosting {
                customer_id: Some("org_1".to_string()),
                plan_id: String::new(),
                ..NewHosting::default()
            })
            .await
            .unwrap();

        assert_eq!(account.subscription_id, None);
    }

    // Test 12: Hosting creation without customer id or email is invalid
    #[tokio::test]
    async fn test_create_hosting_requires_customer() {
        let server = MockServer::start().await;
        let panel = panel_for(&server);

        let result = panel.create_hosting(&NewHosting::default()).await;
        assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
    }

    // Test 13: Request timeout maps to a typed error
    #[tokio::test]
    async fn test_request_timeout_mapped() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/websites/web_1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "web_1"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let panel = EnhancePanel::new(EnhanceConfig {
            api_key: "ek_test".to_string(),
            base_url: server.uri(),
            org_id: "org_reseller".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        let result = panel.get_hosting("web_1").await;
        assert_eq!(result.unwrap_err(), ProviderError::RequestTimeout);
    }

    // Test 14: Health check classifies outcomes
    #[tokio::test]
    async fn test_health_check_statuses() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/org_reseller"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "org_reseller", "name": "Reseller"
            })))
            .mount(&server)
            .await;

        let panel = panel_for(&server);
        let health = panel.health_check().await.unwrap();
        assert_eq!(health.status, crate::models::PanelStatus::Healthy);

        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/orgs/org_reseller"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let health = panel.health_check().await.unwrap();
        assert_eq!(health.status, crate::models::PanelStatus::Degraded);
    }

    // Test 15: 429 responses carry the Retry-After hint
    #[tokio::test]
    async fn test_rate_limited_mapped() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/websites/web_1"))
            .respond_with(
                ResponseTemplate::new(429).insert_header("Retry-After", "17"),
            )
            .mount(&server)
            .await;

        let panel = panel_for(&server);
        let result = panel.get_hosting("web_1").await;
        assert_eq!(result.unwrap_err(), ProviderError::RateLimited(17));
    }
}
