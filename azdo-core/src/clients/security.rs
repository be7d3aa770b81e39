//! Security area: namespaces, access control lists and entries, identities.

use crate::error::AzdoResult;
use crate::rest::{ListResponse, RestClient};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;
use uuid::Uuid;

const API_VERSION: &str = "7.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub name: String,
    pub bit: i32,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityNamespaceDescription {
    pub namespace_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
    #[serde(default)]
    pub read_permission: i32,
    #[serde(default)]
    pub write_permission: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator_value: Option<String>,
    #[serde(default)]
    pub structure_value: i32,
    #[serde(default)]
    pub use_token_translator: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlEntry {
    pub descriptor: String,
    #[serde(default)]
    pub allow: i32,
    #[serde(default)]
    pub deny: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_info: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlList {
    pub token: String,
    #[serde(default)]
    pub inherit_permissions: bool,
    #[serde(default)]
    pub aces_dictionary: BTreeMap<String, AccessControlEntry>,
}

#[derive(Debug, Serialize)]
struct AccessControlListCollection<'a> {
    count: usize,
    value: &'a [AccessControlList],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAccessControlEntriesArgs {
    pub token: String,
    pub merge: bool,
    pub access_control_entries: Vec<AccessControlEntry>,
}

/// `{ "$type": ..., "$value": ... }` identity property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    #[serde(rename = "$type", default)]
    pub value_type: String,
    #[serde(rename = "$value", default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub descriptor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_descriptor: Option<String>,
    #[serde(default)]
    pub provider_display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_display_name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_container: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Identity {
    /// String value of a property such as `Account`.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|p| p.value.as_str())
    }

    pub fn account(&self) -> Option<&str> {
        self.property("Account")
    }
}

#[derive(Debug, Clone)]
pub struct SecurityClient {
    rest: RestClient,
    identity: RestClient,
}

impl SecurityClient {
    /// `rest` points at the organization, `identity` at the vssps host.
    pub fn new(rest: RestClient, identity: RestClient) -> Self {
        Self { rest, identity }
    }

    #[instrument(skip(self))]
    pub async fn get_security_namespaces(&self) -> AzdoResult<Vec<SecurityNamespaceDescription>> {
        Ok(self
            .rest
            .get(["_apis", "securitynamespaces"])
            .api_version(API_VERSION)
            .send::<ListResponse<SecurityNamespaceDescription>>()
            .await?
            .into_inner())
    }

    #[instrument(skip(self))]
    pub async fn get_security_namespace(&self, namespace_id: &Uuid) -> AzdoResult<Vec<SecurityNamespaceDescription>> {
        Ok(self
            .rest
            .get(["_apis".to_string(), "securitynamespaces".to_string(), namespace_id.to_string()])
            .api_version(API_VERSION)
            .send::<ListResponse<SecurityNamespaceDescription>>()
            .await?
            .into_inner())
    }

    #[instrument(skip(self))]
    pub async fn get_access_control_lists(
        &self,
        namespace_id: &Uuid,
        token: &str,
        include_extended_info: bool,
    ) -> AzdoResult<Vec<AccessControlList>> {
        Ok(self
            .rest
            .get(["_apis".to_string(), "accesscontrollists".to_string(), namespace_id.to_string()])
            .query("token", token)
            .query("includeExtendedInfo", include_extended_info)
            .query("recurse", false)
            .api_version(API_VERSION)
            .send::<ListResponse<AccessControlList>>()
            .await?
            .into_inner())
    }

    /// Replace whole ACLs.
    #[instrument(skip(self, acls), fields(count = acls.len()))]
    pub async fn set_access_control_lists(
        &self,
        namespace_id: &Uuid,
        acls: &[AccessControlList],
    ) -> AzdoResult<()> {
        self.rest
            .post(["_apis".to_string(), "accesscontrollists".to_string(), namespace_id.to_string()])
            .api_version(API_VERSION)
            .json(&AccessControlListCollection {
                count: acls.len(),
                value: acls,
            })?
            .send::<crate::rest::NoContent>()
            .await?;
        Ok(())
    }

    /// Write individual entries on a token, merging with or replacing each identity's bits.
    #[instrument(skip(self, args), fields(token = %args.token, merge = args.merge))]
    pub async fn set_access_control_entries(
        &self,
        namespace_id: &Uuid,
        args: &SetAccessControlEntriesArgs,
    ) -> AzdoResult<Vec<AccessControlEntry>> {
        Ok(self
            .rest
            .post(["_apis".to_string(), "accesscontrolentries".to_string(), namespace_id.to_string()])
            .api_version(API_VERSION)
            .json(args)?
            .send::<ListResponse<AccessControlEntry>>()
            .await?
            .into_inner())
    }

    #[instrument(skip(self))]
    pub async fn remove_access_control_lists(
        &self,
        namespace_id: &Uuid,
        tokens: &[String],
        recurse: bool,
    ) -> AzdoResult<bool> {
        self.rest
            .delete(["_apis".to_string(), "accesscontrollists".to_string(), namespace_id.to_string()])
            .query("tokens", tokens.join(","))
            .query("recurse", recurse)
            .api_version(API_VERSION)
            .send::<Option<bool>>()
            .await
            .map(|removed| removed.unwrap_or(true))
    }

    #[instrument(skip(self))]
    pub async fn remove_access_control_entries(
        &self,
        namespace_id: &Uuid,
        token: &str,
        descriptors: &[String],
    ) -> AzdoResult<bool> {
        self.rest
            .delete(["_apis".to_string(), "accesscontrolentries".to_string(), namespace_id.to_string()])
            .query("token", token)
            .query("descriptors", descriptors.join(","))
            .api_version(API_VERSION)
            .send::<Option<bool>>()
            .await
            .map(|removed| removed.unwrap_or(true))
    }

    // --- identities ---

    /// General search by display name, account or mail.
    #[instrument(skip(self))]
    pub async fn search_identities(&self, filter_value: &str) -> AzdoResult<Vec<Identity>> {
        Ok(self
            .identity
            .get(["_apis", "identities"])
            .query("searchFilter", "General")
            .query("filterValue", filter_value)
            .query("queryMembership", "None")
            .api_version(API_VERSION)
            .send::<ListResponse<Identity>>()
            .await?
            .into_inner())
    }

    #[instrument(skip(self))]
    pub async fn get_identities_by_descriptors(&self, descriptors: &[String]) -> AzdoResult<Vec<Identity>> {
        Ok(self
            .identity
            .get(["_apis", "identities"])
            .query("descriptors", descriptors.join(","))
            .query("queryMembership", "None")
            .api_version(API_VERSION)
            .send::<ListResponse<Option<Identity>>>()
            .await?
            .into_inner()
            .into_iter()
            .flatten()
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_identities_by_subject_descriptors(
        &self,
        subject_descriptors: &[String],
    ) -> AzdoResult<Vec<Identity>> {
        Ok(self
            .identity
            .get(["_apis", "identities"])
            .query("subjectDescriptors", subject_descriptors.join(","))
            .query("queryMembership", "None")
            .api_version(API_VERSION)
            .send::<ListResponse<Option<Identity>>>()
            .await?
            .into_inner()
            .into_iter()
            .flatten()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_account_property() {
        let identity: Identity = serde_json::from_value(serde_json::json!({
            "descriptor": "Microsoft.IdentityModel.Claims.ClaimsIdentity;contoso\\jdoe",
            "providerDisplayName": "Jane Doe",
            "isContainer": false,
            "properties": {
                "Account": {"$type": "System.String", "$value": "jdoe@contoso.com"},
                "SchemaClassName": {"$type": "System.String", "$value": "User"}
            }
        }))
        .unwrap();
        assert_eq!(identity.account(), Some("jdoe@contoso.com"));
        assert!(!identity.is_container);
    }

    #[test]
    fn test_set_entries_body_shape() {
        let args = SetAccessControlEntriesArgs {
            token: "endpoints/p/e".into(),
            merge: false,
            access_control_entries: vec![AccessControlEntry {
                descriptor: "Microsoft.TeamFoundation.Identity;S-1".into(),
                allow: 1,
                deny: 2,
                extended_info: None,
            }],
        };
        let body = serde_json::to_value(&args).unwrap();
        assert_eq!(body["merge"], false);
        assert_eq!(body["accessControlEntries"][0]["allow"], 1);
        assert!(body["accessControlEntries"][0].get("extendedInfo").is_none());
    }
}
