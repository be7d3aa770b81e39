//! Minimal kubeconfig reader for the Kubernetes endpoint.
//!
//! Errors name the problem and at most a line/column; they never quote the
//! document, which usually embeds credentials.

use azdo_core::{AzdoError, AzdoResult};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct KubeConfig {
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    #[serde(default)]
    cluster: Option<Cluster>,
}

#[derive(Debug, Deserialize)]
struct Cluster {
    #[serde(default)]
    server: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    #[serde(default)]
    name: Option<String>,
}

/// Where the single cluster of a kubeconfig lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTarget {
    pub server: String,
    pub context: String,
}

fn invalid(reason: impl Into<String>) -> AzdoError {
    AzdoError::Misconfigured(format!("invalid kubeconfig: {}", reason.into()))
}

pub fn parse_kubeconfig(raw: &str) -> AzdoResult<ClusterTarget> {
    let config: KubeConfig = serde_yaml::from_str(raw).map_err(|e| match e.location() {
        Some(at) => invalid(format!("not a YAML mapping (line {}, column {})", at.line(), at.column())),
        None => invalid("not a YAML mapping"),
    })?;

    let [cluster] = config.clusters.as_slice() else {
        return Err(invalid(format!(
            "expected exactly one cluster, found {}",
            config.clusters.len()
        )));
    };
    let [context] = config.contexts.as_slice() else {
        return Err(invalid(format!(
            "expected exactly one context, found {}",
            config.contexts.len()
        )));
    };

    let server = cluster
        .cluster
        .as_ref()
        .and_then(|c| c.server.as_deref())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| invalid("cluster has no server URL"))?;
    let context = context
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| invalid("context has no name"))?;

    Ok(ClusterTarget {
        server: server.to_string(),
        context: context.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: aks
  cluster:
    server: https://aks.example.io:443
    certificate-authority-data: c2VjcmV0
contexts:
- name: aks-admin
  context:
    cluster: aks
    user: admin
users:
- name: admin
  user:
    token: super-secret-token
"#;

    #[test]
    fn test_single_cluster_and_context() {
        let target = parse_kubeconfig(SINGLE).unwrap();
        assert_eq!(target.server, "https://aks.example.io:443");
        assert_eq!(target.context, "aks-admin");
    }

    #[test]
    fn test_two_contexts_rejected() {
        let raw = SINGLE.replace(
            "contexts:\n",
            "contexts:\n- name: other\n  context:\n    cluster: aks\n",
        );
        let err = parse_kubeconfig(&raw).unwrap_err();
        assert!(matches!(err, AzdoError::Misconfigured(_)));
        assert!(err.to_string().contains("exactly one context, found 2"));
        assert!(!err.to_string().contains("super-secret-token"));
    }

    #[test]
    fn test_no_clusters_rejected() {
        let err = parse_kubeconfig("contexts:\n- name: a\n").unwrap_err();
        assert!(err.to_string().contains("exactly one cluster, found 0"));
    }

    #[test]
    fn test_garbage_is_not_echoed() {
        let err = parse_kubeconfig("token: [unterminated super-secret-token").unwrap_err();
        assert!(matches!(err, AzdoError::Misconfigured(_)));
        assert!(!err.to_string().contains("super-secret-token"));
    }
}
