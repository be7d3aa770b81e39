//! ACL token builders, one per secured object kind.
//!
//! All pure: the same inputs always produce the same token.

use azdo_core::clients::workitems::WorkItemClassificationNode;
use azdo_core::{AzdoError, AzdoResult};

const CLASSIFICATION_NODE_PREFIX: &str = "vstfs:///Classification/Node/";

/// `$PROJECT:vstfs:///Classification/TeamProject/<projectId>`
pub fn project_token(project_id: &str) -> String {
    format!("$PROJECT:vstfs:///Classification/TeamProject/{project_id}")
}

/// `repoV2/<projectId>[/<repoId>[/refs/heads/<encoded branch>]]`
pub fn git_token(project_id: &str, repository_id: Option<&str>, branch_name: Option<&str>) -> AzdoResult<String> {
    let mut token = format!("repoV2/{project_id}");
    match (non_empty(repository_id), non_empty(branch_name)) {
        (None, Some(_)) => {
            return Err(AzdoError::Misconfigured(
                "a branch can only be secured together with its repository".into(),
            ));
        }
        (Some(repository_id), branch) => {
            token.push('/');
            token.push_str(repository_id);
            if let Some(branch) = branch {
                token.push_str("/refs/heads/");
                token.push_str(&encode_ref_name(branch));
            }
        }
        (None, None) => {}
    }
    Ok(token)
}

/// Each `/`-separated branch component as lowercase hex of its UTF-16LE bytes.
pub fn encode_ref_name(branch_name: &str) -> String {
    let branch = branch_name.strip_prefix("refs/heads/").unwrap_or(branch_name);
    branch
        .split('/')
        .map(|part| {
            part.encode_utf16()
                .flat_map(u16::to_le_bytes)
                .map(|b| format!("{b:02x}"))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `<projectId>[/<folder>/...][/<definitionId>]`; folders may use `\` or `/`.
pub fn build_token(project_id: &str, path: Option<&str>, definition_id: Option<&str>) -> String {
    let mut token = project_id.to_string();
    if let Some(path) = path {
        for folder in path.split(['\\', '/']).filter(|f| !f.is_empty()) {
            token.push('/');
            token.push_str(folder);
        }
    }
    if let Some(definition_id) = non_empty(definition_id) {
        token.push('/');
        token.push_str(definition_id);
    }
    token
}

/// `Environments/<projectId>/<environmentId>`
pub fn environment_token(project_id: &str, environment_id: &str) -> String {
    format!("Environments/{project_id}/{environment_id}")
}

/// `endpoints/<projectId>[/<endpointId>]`
pub fn service_endpoint_token(project_id: &str, endpoint_id: Option<&str>) -> String {
    match non_empty(endpoint_id) {
        Some(endpoint_id) => format!("endpoints/{project_id}/{endpoint_id}"),
        None => format!("endpoints/{project_id}"),
    }
}

/// `vstfs:///Classification/Node/<root>[:vstfs:///Classification/Node/<child>...]`
///
/// `root` must have been fetched with enough `$depth` to reach `path`
/// (`/`-separated, relative to the root; empty for the root itself).
pub fn classification_token(root: &WorkItemClassificationNode, path: &str) -> AzdoResult<String> {
    let mut node = root;
    let mut parts = vec![format!("{CLASSIFICATION_NODE_PREFIX}{}", node.identifier)];

    for name in path.split('/').filter(|p| !p.is_empty()) {
        node = node
            .children
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                AzdoError::Misconfigured(format!("classification node '{name}' not found in path '{path}'"))
            })?;
        parts.push(format!("{CLASSIFICATION_NODE_PREFIX}{}", node.identifier));
    }

    Ok(parts.join(":"))
}

/// Levels of children needed to walk `path`.
pub fn classification_depth(path: &str) -> u32 {
    path.split('/').filter(|p| !p.is_empty()).count() as u32
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = "9a3b1e5c-0000-4000-8000-000000000001";

    fn tree() -> WorkItemClassificationNode {
        serde_json::from_value(serde_json::json!({
            "id": 1, "identifier": "11111111-1111-1111-1111-111111111111",
            "name": "demo", "path": "\\demo\\Area",
            "children": [{
                "id": 2, "identifier": "22222222-2222-2222-2222-222222222222",
                "name": "One", "path": "\\demo\\Area\\One",
                "children": [{
                    "id": 3, "identifier": "33333333-3333-3333-3333-333333333333",
                    "name": "Two", "path": "\\demo\\Area\\One\\Two"
                }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_project_token() {
        assert_eq!(
            project_token(PROJECT),
            format!("$PROJECT:vstfs:///Classification/TeamProject/{PROJECT}")
        );
    }

    #[test]
    fn test_git_tokens() {
        assert_eq!(git_token(PROJECT, None, None).unwrap(), format!("repoV2/{PROJECT}"));
        assert_eq!(git_token(PROJECT, Some("r1"), None).unwrap(), format!("repoV2/{PROJECT}/r1"));
        assert!(git_token(PROJECT, None, Some("main")).is_err());
    }

    #[test]
    fn test_git_branch_token_encodes_utf16le() {
        assert_eq!(
            git_token(PROJECT, Some("r1"), Some("refs/heads/feature/x")).unwrap(),
            format!("repoV2/{PROJECT}/r1/refs/heads/6600650061007400750072006500/7800")
        );
        assert_eq!(encode_ref_name("main"), "6d00610069006e00");
    }

    #[test]
    fn test_build_token() {
        assert_eq!(build_token(PROJECT, None, None), PROJECT);
        assert_eq!(
            build_token(PROJECT, Some("\\ci\\nightly"), Some("42")),
            format!("{PROJECT}/ci/nightly/42")
        );
        assert_eq!(build_token(PROJECT, Some("\\"), None), PROJECT);
    }

    #[test]
    fn test_environment_and_endpoint_tokens() {
        assert_eq!(environment_token(PROJECT, "7"), format!("Environments/{PROJECT}/7"));
        assert_eq!(service_endpoint_token(PROJECT, None), format!("endpoints/{PROJECT}"));
        assert_eq!(
            service_endpoint_token(PROJECT, Some("e1")),
            format!("endpoints/{PROJECT}/e1")
        );
    }

    #[test]
    fn test_classification_token_walks_tree() {
        let root = tree();
        assert_eq!(
            classification_token(&root, "").unwrap(),
            "vstfs:///Classification/Node/11111111-1111-1111-1111-111111111111"
        );
        assert_eq!(
            classification_token(&root, "one/Two").unwrap(),
            "vstfs:///Classification/Node/11111111-1111-1111-1111-111111111111:\
             vstfs:///Classification/Node/22222222-2222-2222-2222-222222222222:\
             vstfs:///Classification/Node/33333333-3333-3333-3333-333333333333"
        );
        assert!(classification_token(&root, "One/Three").is_err());
        assert_eq!(classification_depth("One/Two"), 2);
    }

    #[test]
    fn test_tokens_are_deterministic() {
        let a = git_token(PROJECT, Some("r"), Some("dev")).unwrap();
        let b = git_token(PROJECT, Some("r"), Some("dev")).unwrap();
        assert_eq!(a, b);
    }
}
