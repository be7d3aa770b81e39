//! Per-flavor endpoint construction.

use super::kubeconfig::parse_kubeconfig;
use super::{EndpointDefinition, EndpointFlavor, Sensitive};
use azdo_core::clients::serviceendpoint::ServiceEndpoint;
use azdo_core::utils::{validate_non_blank, validate_uuid};
use azdo_core::AzdoResult;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

const SCHEME_TOKEN: &str = "Token";
const SCHEME_USERNAME_PASSWORD: &str = "UsernamePassword";
const SCHEME_SERVICE_PRINCIPAL: &str = "ServicePrincipal";
const SCHEME_KUBERNETES: &str = "Kubernetes";

fn auth_param(endpoint: &ServiceEndpoint, key: &str) -> Option<String> {
    endpoint
        .authorization
        .as_ref()
        .and_then(|a| a.parameters.get(key))
        .cloned()
}

fn validate_sensitive(value: &Sensitive) -> Result<(), ValidationError> {
    if value.is_blank() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

// --- credentials shared by token-or-basic flavors ---

/// Either a token, or a username and password.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_token_or_basic"))]
pub struct TokenOrBasic {
    #[serde(default, alias = "api_key", skip_serializing_if = "Option::is_none")]
    pub access_token: Option<Sensitive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Sensitive>,
}

fn validate_token_or_basic(c: &TokenOrBasic) -> Result<(), ValidationError> {
    let token = c.access_token.as_ref().is_some_and(|t| !t.is_blank());
    let basic = c.username.as_deref().is_some_and(|u| !u.trim().is_empty())
        && c.password.as_ref().is_some_and(|p| !p.is_blank());
    if token == basic {
        let mut err = ValidationError::new("credentials");
        err.message = Some("set either access_token, or username and password".into());
        return Err(err);
    }
    Ok(())
}

impl TokenOrBasic {
    fn apply(&self, definition: EndpointDefinition, token_key: &str) -> EndpointDefinition {
        match &self.access_token {
            Some(token) if !token.is_blank() => EndpointDefinition {
                scheme: SCHEME_TOKEN,
                ..definition
            }
            .parameter(token_key, token.expose()),
            _ => EndpointDefinition {
                scheme: SCHEME_USERNAME_PASSWORD,
                ..definition
            }
            .parameter("username", self.username.clone().unwrap_or_default())
            .parameter("password", self.password.as_ref().map(Sensitive::expose).unwrap_or_default()),
        }
    }

    fn observe(&mut self, endpoint: &ServiceEndpoint) {
        if self.username.is_some()
            && let Some(username) = auth_param(endpoint, "username")
        {
            self.username = Some(username);
        }
    }
}

// --- AzureRM ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct AzureRmConfig {
    #[validate(custom(function = "validate_uuid"))]
    pub azurerm_spn_tenantid: String,
    #[validate(custom(function = "validate_uuid"))]
    pub azurerm_subscription_id: String,
    #[validate(custom(function = "validate_non_blank"))]
    pub azurerm_subscription_name: String,
    #[validate(custom(function = "validate_uuid"))]
    pub serviceprincipalid: String,
    #[validate(custom(function = "validate_sensitive"))]
    pub serviceprincipalkey: Sensitive,
}

pub struct AzureRm;

impl EndpointFlavor for AzureRm {
    type Config = AzureRmConfig;
    const TYPE_NAME: &'static str = "azuredevops_serviceendpoint_azurerm";
    const ENDPOINT_TYPE: &'static str = "azurerm";

    fn build(c: &AzureRmConfig) -> AzdoResult<EndpointDefinition> {
        Ok(EndpointDefinition::new("https://management.azure.com/", SCHEME_SERVICE_PRINCIPAL)
            .parameter("authenticationType", "spnKey")
            .parameter("serviceprincipalid", &c.serviceprincipalid)
            .parameter("serviceprincipalkey", c.serviceprincipalkey.expose())
            .parameter("tenantid", &c.azurerm_spn_tenantid)
            .data("creationMode", "Manual")
            .data("environment", "AzureCloud")
            .data("scopeLevel", "Subscription")
            .data("subscriptionId", &c.azurerm_subscription_id)
            .data("subscriptionName", &c.azurerm_subscription_name))
    }

    fn observe(c: &mut AzureRmConfig, endpoint: &ServiceEndpoint) {
        if let Some(tenant) = auth_param(endpoint, "tenantid") {
            c.azurerm_spn_tenantid = tenant;
        }
        if let Some(id) = auth_param(endpoint, "serviceprincipalid") {
            c.serviceprincipalid = id;
        }
        if let Some(id) = endpoint.data.get("subscriptionId") {
            c.azurerm_subscription_id = id.clone();
        }
        if let Some(name) = endpoint.data.get("subscriptionName") {
            c.azurerm_subscription_name = name.clone();
        }
    }
}

// --- Bitbucket ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct BitbucketConfig {
    #[validate(custom(function = "validate_non_blank"))]
    pub username: String,
    #[validate(custom(function = "validate_sensitive"))]
    pub password: Sensitive,
}

pub struct Bitbucket;

impl EndpointFlavor for Bitbucket {
    type Config = BitbucketConfig;
    const TYPE_NAME: &'static str = "azuredevops_serviceendpoint_bitbucket";
    const ENDPOINT_TYPE: &'static str = "bitbucket";

    fn build(c: &BitbucketConfig) -> AzdoResult<EndpointDefinition> {
        Ok(EndpointDefinition::new("https://api.bitbucket.org/", SCHEME_USERNAME_PASSWORD)
            .parameter("username", &c.username)
            .parameter("password", c.password.expose()))
    }

    fn observe(c: &mut BitbucketConfig, endpoint: &ServiceEndpoint) {
        if let Some(username) = auth_param(endpoint, "username") {
            c.username = username;
        }
    }
}

// --- GitHub ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct GitHubConfig {
    #[validate(custom(function = "validate_sensitive"))]
    pub personal_access_token: Sensitive,
}

pub struct GitHub;

impl EndpointFlavor for GitHub {
    type Config = GitHubConfig;
    const TYPE_NAME: &'static str = "azuredevops_serviceendpoint_github";
    const ENDPOINT_TYPE: &'static str = "github";

    fn build(c: &GitHubConfig) -> AzdoResult<EndpointDefinition> {
        Ok(EndpointDefinition::new("https://github.com/", SCHEME_TOKEN)
            .parameter("AccessToken", c.personal_access_token.expose()))
    }
}

// --- Generic ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct GenericConfig {
    #[validate(url)]
    pub server_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Sensitive,
}

pub struct Generic;

impl EndpointFlavor for Generic {
    type Config = GenericConfig;
    const TYPE_NAME: &'static str = "azuredevops_serviceendpoint_generic";
    const ENDPOINT_TYPE: &'static str = "generic";

    fn build(c: &GenericConfig) -> AzdoResult<EndpointDefinition> {
        Ok(EndpointDefinition::new(&c.server_url, SCHEME_USERNAME_PASSWORD)
            .parameter("username", &c.username)
            .parameter("password", c.password.expose()))
    }

    fn observe(c: &mut GenericConfig, endpoint: &ServiceEndpoint) {
        if !endpoint.url.is_empty() {
            c.server_url = endpoint.url.clone();
        }
        if let Some(username) = auth_param(endpoint, "username") {
            c.username = username;
        }
    }
}

// --- Kubernetes ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct KubernetesConfig {
    /// Kubeconfig YAML with exactly one cluster and one context.
    #[validate(custom(function = "validate_sensitive"))]
    pub kubeconfig: Sensitive,
    #[serde(default)]
    pub accept_untrusted_certs: bool,
}

pub struct Kubernetes;

impl EndpointFlavor for Kubernetes {
    type Config = KubernetesConfig;
    const TYPE_NAME: &'static str = "azuredevops_serviceendpoint_kubernetes";
    const ENDPOINT_TYPE: &'static str = "kubernetes";

    fn build(c: &KubernetesConfig) -> AzdoResult<EndpointDefinition> {
        let target = parse_kubeconfig(c.kubeconfig.expose())?;
        Ok(EndpointDefinition::new(target.server, SCHEME_KUBERNETES)
            .parameter("clusterContext", target.context)
            .parameter("kubeconfig", c.kubeconfig.expose())
            .data("authorizationType", "Kubeconfig")
            .data("acceptUntrustedCerts", c.accept_untrusted_certs.to_string()))
    }

    fn observe(c: &mut KubernetesConfig, endpoint: &ServiceEndpoint) {
        if let Some(flag) = endpoint.data.get("acceptUntrustedCerts") {
            c.accept_untrusted_certs = flag.eq_ignore_ascii_case("true");
        }
    }
}

// --- JFrog ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct JFrogConfig {
    #[validate(url)]
    pub url: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub credentials: TokenOrBasic,
}

/// `https://x.jfrog.io/` + `/artifactory` → `https://x.jfrog.io/artifactory`.
pub fn jfrog_url(url: &str, suffix: &str) -> String {
    let base = url.trim_end_matches('/');
    let base = base.strip_suffix(suffix).filter(|_| !suffix.is_empty()).unwrap_or(base);
    format!("{}{suffix}", base.trim_end_matches('/'))
}

fn jfrog_build(c: &JFrogConfig, suffix: &str) -> EndpointDefinition {
    c.credentials
        .apply(EndpointDefinition::new(jfrog_url(&c.url, suffix), SCHEME_TOKEN), "apitoken")
}

fn jfrog_observe(c: &mut JFrogConfig, endpoint: &ServiceEndpoint, suffix: &str) {
    if !endpoint.url.is_empty() && jfrog_url(&c.url, suffix) != endpoint.url {
        c.url = endpoint.url.clone();
    }
    c.credentials.observe(endpoint);
}

macro_rules! jfrog_flavor {
    ($flavor:ident, $type_name:literal, $endpoint_type:literal, $suffix:literal) => {
        pub struct $flavor;

        impl EndpointFlavor for $flavor {
            type Config = JFrogConfig;
            const TYPE_NAME: &'static str = $type_name;
            const ENDPOINT_TYPE: &'static str = $endpoint_type;

            fn build(c: &JFrogConfig) -> AzdoResult<EndpointDefinition> {
                Ok(jfrog_build(c, $suffix))
            }

            fn observe(c: &mut JFrogConfig, endpoint: &ServiceEndpoint) {
                jfrog_observe(c, endpoint, $suffix)
            }
        }
    };
}

jfrog_flavor!(JFrogArtifactory, "azuredevops_serviceendpoint_jfrog_artifactory_v2", "jfrogArtifactoryService", "/artifactory");
jfrog_flavor!(JFrogDistribution, "azuredevops_serviceendpoint_jfrog_distribution_v2", "jfrogDistributionService", "/distribution");
jfrog_flavor!(JFrogPlatform, "azuredevops_serviceendpoint_jfrog_platform_v2", "jfrogPlatformService", "");
jfrog_flavor!(JFrogXray, "azuredevops_serviceendpoint_jfrog_xray_v2", "jfrogXrayService", "/xray");

// --- NuGet / npm ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct FeedConfig {
    #[validate(url)]
    pub url: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub credentials: TokenOrBasic,
}

fn feed_observe(c: &mut FeedConfig, endpoint: &ServiceEndpoint) {
    if !endpoint.url.is_empty() {
        c.url = endpoint.url.clone();
    }
    c.credentials.observe(endpoint);
}

pub struct NuGet;

impl EndpointFlavor for NuGet {
    type Config = FeedConfig;
    const TYPE_NAME: &'static str = "azuredevops_serviceendpoint_nuget";
    const ENDPOINT_TYPE: &'static str = "externalnugetfeed";

    fn build(c: &FeedConfig) -> AzdoResult<EndpointDefinition> {
        Ok(c.credentials
            .apply(EndpointDefinition::new(&c.url, SCHEME_TOKEN), "nugetkey"))
    }

    fn observe(c: &mut FeedConfig, endpoint: &ServiceEndpoint) {
        feed_observe(c, endpoint)
    }
}

pub struct Npm;

impl EndpointFlavor for Npm {
    type Config = FeedConfig;
    const TYPE_NAME: &'static str = "azuredevops_serviceendpoint_npm";
    const ENDPOINT_TYPE: &'static str = "externalnpmregistry";

    fn build(c: &FeedConfig) -> AzdoResult<EndpointDefinition> {
        Ok(c.credentials
            .apply(EndpointDefinition::new(&c.url, SCHEME_TOKEN), "apitoken"))
    }

    fn observe(c: &mut FeedConfig, endpoint: &ServiceEndpoint) {
        feed_observe(c, endpoint)
    }
}

// --- token-only SaaS endpoints ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ApiTokenConfig {
    #[validate(custom(function = "validate_sensitive"))]
    pub api_token: Sensitive,
}

pub struct VsAppCenter;

impl EndpointFlavor for VsAppCenter {
    type Config = ApiTokenConfig;
    const TYPE_NAME: &'static str = "azuredevops_serviceendpoint_vs_appcenter";
    const ENDPOINT_TYPE: &'static str = "vsmobilecenter";

    fn build(c: &ApiTokenConfig) -> AzdoResult<EndpointDefinition> {
        Ok(EndpointDefinition::new("https://api.appcenter.ms/v0.1", SCHEME_TOKEN)
            .parameter("apitoken", c.api_token.expose()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct SonarCloudConfig {
    #[validate(custom(function = "validate_sensitive"))]
    pub token: Sensitive,
}

pub struct SonarCloud;

impl EndpointFlavor for SonarCloud {
    type Config = SonarCloudConfig;
    const TYPE_NAME: &'static str = "azuredevops_serviceendpoint_sonarcloud";
    const ENDPOINT_TYPE: &'static str = "sonarcloud";

    fn build(c: &SonarCloudConfig) -> AzdoResult<EndpointDefinition> {
        Ok(EndpointDefinition::new("https://sonarcloud.io", SCHEME_TOKEN)
            .parameter("apitoken", c.token.expose()))
    }
}

// --- Docker registry ---

pub const DOCKER_HUB: &str = "https://index.docker.io/v1/";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_docker_registry"))]
pub struct DockerRegistryConfig {
    #[serde(default = "default_docker_registry")]
    #[validate(url)]
    pub docker_registry: String,
    #[serde(default)]
    pub docker_username: Option<String>,
    #[serde(default)]
    pub docker_email: Option<String>,
    #[serde(default)]
    pub docker_password: Option<Sensitive>,
    /// `DockerHub` or `Others`.
    #[serde(default = "default_registry_type")]
    pub registry_type: String,
}

fn default_docker_registry() -> String {
    DOCKER_HUB.to_string()
}

fn default_registry_type() -> String {
    "DockerHub".to_string()
}

fn validate_docker_registry(c: &DockerRegistryConfig) -> Result<(), ValidationError> {
    if c.registry_type != "DockerHub" && c.registry_type != "Others" {
        let mut err = ValidationError::new("registry_type");
        err.message = Some("registry_type must be DockerHub or Others".into());
        return Err(err);
    }
    Ok(())
}

pub struct DockerRegistry;

impl EndpointFlavor for DockerRegistry {
    type Config = DockerRegistryConfig;
    const TYPE_NAME: &'static str = "azuredevops_serviceendpoint_dockerregistry";
    const ENDPOINT_TYPE: &'static str = "dockerregistry";

    fn build(c: &DockerRegistryConfig) -> AzdoResult<EndpointDefinition> {
        Ok(EndpointDefinition::new(&c.docker_registry, SCHEME_USERNAME_PASSWORD)
            .parameter("registry", &c.docker_registry)
            .parameter("username", c.docker_username.clone().unwrap_or_default())
            .parameter("email", c.docker_email.clone().unwrap_or_default())
            .parameter(
                "password",
                c.docker_password.as_ref().map(Sensitive::expose).unwrap_or_default(),
            )
            .data("registrytype", &c.registry_type))
    }

    fn observe(c: &mut DockerRegistryConfig, endpoint: &ServiceEndpoint) {
        if let Some(registry) = auth_param(endpoint, "registry") {
            c.docker_registry = registry;
        }
        if c.docker_username.is_some() {
            c.docker_username = auth_param(endpoint, "username").or(c.docker_username.take());
        }
        if c.docker_email.is_some() {
            c.docker_email = auth_param(endpoint, "email").or(c.docker_email.take());
        }
        if let Some(kind) = endpoint.data.get("registrytype") {
            c.registry_type = kind.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azdo_core::clients::serviceendpoint::EndpointAuthorization;

    #[test]
    fn test_azurerm_definition() {
        let d = AzureRm::build(&AzureRmConfig {
            azurerm_spn_tenantid: "t".into(),
            azurerm_subscription_id: "s".into(),
            azurerm_subscription_name: "sub".into(),
            serviceprincipalid: "p".into(),
            serviceprincipalkey: Sensitive::new("k"),
        })
        .unwrap();
        assert_eq!(d.scheme, "ServicePrincipal");
        assert_eq!(d.url, "https://management.azure.com/");
        assert_eq!(d.parameters["authenticationType"], "spnKey");
        assert_eq!(d.parameters["serviceprincipalkey"], "k");
        assert_eq!(d.parameters["tenantid"], "t");
        assert_eq!(d.data["subscriptionId"], "s");
    }

    #[test]
    fn test_jfrog_urls() {
        assert_eq!(jfrog_url("https://x.jfrog.io/", "/artifactory"), "https://x.jfrog.io/artifactory");
        assert_eq!(
            jfrog_url("https://x.jfrog.io/artifactory/", "/artifactory"),
            "https://x.jfrog.io/artifactory"
        );
        assert_eq!(jfrog_url("https://x.jfrog.io/", ""), "https://x.jfrog.io");
        assert_eq!(jfrog_url("https://x.jfrog.io", "/xray"), "https://x.jfrog.io/xray");
    }

    #[test]
    fn test_jfrog_token_or_basic() {
        let token = JFrogConfig {
            url: "https://x.jfrog.io".into(),
            credentials: TokenOrBasic {
                access_token: Some(Sensitive::new("tok")),
                ..Default::default()
            },
        };
        let d = JFrogDistribution::build(&token).unwrap();
        assert_eq!(d.scheme, "Token");
        assert_eq!(d.parameters["apitoken"], "tok");
        assert_eq!(d.url, "https://x.jfrog.io/distribution");

        let basic = JFrogConfig {
            url: "https://x.jfrog.io".into(),
            credentials: TokenOrBasic {
                username: Some("u".into()),
                password: Some(Sensitive::new("p")),
                ..Default::default()
            },
        };
        let d = JFrogArtifactory::build(&basic).unwrap();
        assert_eq!(d.scheme, "UsernamePassword");
        assert_eq!(d.parameters["username"], "u");
        assert!(!d.parameters.contains_key("apitoken"));
    }

    #[test]
    fn test_token_or_basic_requires_exactly_one() {
        assert!(TokenOrBasic::default().validate().is_err());
        let both = TokenOrBasic {
            access_token: Some(Sensitive::new("t")),
            username: Some("u".into()),
            password: Some(Sensitive::new("p")),
        };
        assert!(both.validate().is_err());
    }

    #[test]
    fn test_nuget_accepts_api_key_alias() {
        let c: FeedConfig = serde_json::from_value(serde_json::json!({
            "url": "https://api.nuget.org/v3/index.json",
            "api_key": "key"
        }))
        .unwrap();
        assert!(c.validate().is_ok());
        let d = NuGet::build(&c).unwrap();
        assert_eq!(d.scheme, "Token");
        assert_eq!(d.parameters["nugetkey"], "key");
    }

    #[test]
    fn test_kubernetes_definition_uses_cluster_server() {
        let raw = "clusters:\n- name: c\n  cluster:\n    server: https://k8s:6443\ncontexts:\n- name: ctx\n";
        let d = Kubernetes::build(&KubernetesConfig {
            kubeconfig: Sensitive::new(raw),
            accept_untrusted_certs: true,
        })
        .unwrap();
        assert_eq!(d.url, "https://k8s:6443");
        assert_eq!(d.scheme, "Kubernetes");
        assert_eq!(d.parameters["clusterContext"], "ctx");
        assert_eq!(d.data["acceptUntrustedCerts"], "true");
    }

    #[test]
    fn test_read_keeps_secret_and_takes_username() {
        let mut c = BitbucketConfig {
            username: "old".into(),
            password: Sensitive::new("secret"),
        };
        let endpoint = ServiceEndpoint {
            authorization: Some(EndpointAuthorization {
                scheme: "UsernamePassword".into(),
                parameters: [("username".to_string(), "new".to_string())].into(),
            }),
            ..Default::default()
        };
        Bitbucket::observe(&mut c, &endpoint);
        assert_eq!(c.username, "new");
        assert_eq!(c.password.expose(), "secret");
    }

    #[test]
    fn test_docker_registry_defaults() {
        let c: DockerRegistryConfig = serde_json::from_value(serde_json::json!({
            "docker_username": "me",
            "docker_password": "pw"
        }))
        .unwrap();
        assert!(c.validate().is_ok());
        let d = DockerRegistry::build(&c).unwrap();
        assert_eq!(d.url, DOCKER_HUB);
        assert_eq!(d.data["registrytype"], "DockerHub");
    }
}
