//! Provider configuration.
//!
//! Values come from (lowest to highest precedence) an optional `azdo.toml`,
//! `AZDO_*` environment variables, and whatever the host passes in the
//! provider block.

use crate::error::{AzdoError, AzdoResult};
use config::{Config as Cfg, Environment, File};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Environment variable holding the organization URL.
pub const ENV_ORG_SERVICE_URL: &str = "AZDO_ORG_SERVICE_URL";
/// Environment variable holding the personal access token.
pub const ENV_PERSONAL_ACCESS_TOKEN: &str = "AZDO_PERSONAL_ACCESS_TOKEN";

/// Timing for a poll loop driven by [`crate::waiter::StateChangeConf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep before the first refresh.
    pub delay: Duration,
    /// Lower bound on the wait between refreshes.
    pub min_timeout: Duration,
    /// Total time budget. `None` polls until a terminal state is seen.
    pub timeout: Option<Duration>,
}

impl PollPolicy {
    /// Service endpoint readiness: 1s initial delay, 5s minimum wait, 30s budget.
    pub fn endpoint_readiness() -> Self {
        Self {
            delay: Duration::from_secs(1),
            min_timeout: Duration::from_secs(5),
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Project create/delete operations: no budget, the operation always terminates.
    pub fn project_operations() -> Self {
        Self {
            delay: Duration::from_secs(1),
            min_timeout: Duration::from_secs(2),
            timeout: None,
        }
    }

    /// Millisecond-scale policy used by tests against mock servers.
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
            min_timeout: Duration::from_millis(1),
            timeout: Some(Duration::from_secs(5)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub endpoint_readiness: PollPolicy,
    pub project_operations: PollPolicy,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            endpoint_readiness: PollPolicy::endpoint_readiness(),
            project_operations: PollPolicy::project_operations(),
        }
    }
}

impl PollSettings {
    pub fn immediate() -> Self {
        Self {
            endpoint_readiness: PollPolicy::immediate(),
            project_operations: PollPolicy::immediate(),
        }
    }
}

/// Provider block configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_token"))]
pub struct ProviderConfig {
    /// `https://dev.azure.com/<org>` or `https://<org>.visualstudio.com`.
    #[serde(alias = "org_service_url")]
    #[validate(url(message = "organization URL must be an absolute URL"))]
    pub organization_url: String,

    pub personal_access_token: Secret<String>,

    #[serde(skip, default)]
    pub poll: PollSettings,
}

fn validate_token(cfg: &ProviderConfig) -> Result<(), ValidationError> {
    if cfg.personal_access_token.expose_secret().trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("personal access token must not be empty".into());
        return Err(err);
    }
    Ok(())
}

impl ProviderConfig {
    pub fn new(organization_url: impl Into<String>, personal_access_token: impl Into<String>) -> Self {
        Self {
            organization_url: organization_url.into(),
            personal_access_token: Secret::new(personal_access_token.into()),
            poll: PollSettings::default(),
        }
    }

    /// Load from `azdo.toml` (optional), `.env` and `AZDO_*` variables.
    pub fn from_env() -> AzdoResult<Self> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("azdo").required(false))
            .add_source(Environment::with_prefix("AZDO"))
            .build()?;

        Self::from_config(config)
    }

    /// Deserialize and validate an already-built configuration.
    pub fn from_config(config: Cfg) -> AzdoResult<Self> {
        let cfg: ProviderConfig = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply values from the host's provider block over the loaded ones.
    pub fn merge_block(
        mut self,
        organization_url: Option<String>,
        personal_access_token: Option<String>,
    ) -> AzdoResult<Self> {
        if let Some(url) = organization_url.filter(|u| !u.trim().is_empty()) {
            self.organization_url = url;
        }
        if let Some(token) = personal_access_token.filter(|t| !t.trim().is_empty()) {
            self.personal_access_token = Secret::new(token);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Organization URL without a trailing slash.
    pub fn organization_url(&self) -> &str {
        self.organization_url.trim_end_matches('/')
    }

    /// Base URL of the identity (vssps) host for this organization.
    pub fn identity_url(&self) -> AzdoResult<String> {
        derive_identity_url(self.organization_url())
    }
}

/// `dev.azure.com/<org>` → `vssps.dev.azure.com/<org>`,
/// `<org>.visualstudio.com` → `<org>.vssps.visualstudio.com`,
/// anything else (on-premises) is used as is.
pub fn derive_identity_url(organization_url: &str) -> AzdoResult<String> {
    let mut url = url::Url::parse(organization_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| AzdoError::Config(format!("organization URL has no host: {organization_url}")))?
        .to_ascii_lowercase();

    let identity_host = if host == "dev.azure.com" {
        Some("vssps.dev.azure.com".to_string())
    } else if let Some(org) = host.strip_suffix(".visualstudio.com")
        && !org.ends_with(".vssps")
    {
        Some(format!("{org}.vssps.visualstudio.com"))
    } else {
        None
    };

    if let Some(identity_host) = identity_host {
        url.set_host(Some(&identity_host))?;
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}
