//! Access modes and composable permission readers
//!
//! A reader answers, for every requested target, which access modes are
//! granted (`true`), denied (`false`) or left undecided (absent). Readers are
//! combined with `UnionPermissionReader`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::types::Result;

/// Access modes of the WebACL model plus create/delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
    Append,
    Create,
    Delete,
    Control,
}

impl AccessMode {
    pub const ALL: [AccessMode; 6] = [
        AccessMode::Read,
        AccessMode::Write,
        AccessMode::Append,
        AccessMode::Create,
        AccessMode::Delete,
        AccessMode::Control,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
            AccessMode::Append => "append",
            AccessMode::Create => "create",
            AccessMode::Delete => "delete",
            AccessMode::Control => "control",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision per mode for one target
pub type PermissionSet = BTreeMap<AccessMode, bool>;

/// Decisions per target URL
pub type PermissionMap = BTreeMap<String, PermissionSet>;

/// Requested modes per target URL
pub type AccessMap = BTreeMap<String, BTreeSet<AccessMode>>;

/// Grant every mode
pub fn full_permissions() -> PermissionSet {
    AccessMode::ALL.iter().map(|mode| (*mode, true)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCredentials {
    pub web_id: String,
}

/// Who is making the request; empty for anonymous requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub agent: Option<AgentCredentials>,
}

impl Credentials {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn agent(web_id: impl Into<String>) -> Self {
        Self {
            agent: Some(AgentCredentials {
                web_id: web_id.into(),
            }),
        }
    }

    pub fn web_id(&self) -> Option<&str> {
        self.agent.as_ref().map(|agent| agent.web_id.as_str())
    }
}

/// Audience a surfaced permission applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialGroup {
    /// The authenticated agent
    User,
    /// Everyone
    Public,
}

impl CredentialGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialGroup::User => "user",
            CredentialGroup::Public => "public",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PermissionReaderInput {
    pub credentials: Credentials,
    pub requested_modes: AccessMap,
}

impl PermissionReaderInput {
    pub fn new(credentials: Credentials, requested_modes: AccessMap) -> Self {
        Self {
            credentials,
            requested_modes,
        }
    }

    /// Request `modes` on a single target
    pub fn single(credentials: Credentials, target: &str, modes: &[AccessMode]) -> Self {
        let mut requested_modes = AccessMap::new();
        requested_modes.insert(target.to_string(), modes.iter().copied().collect());
        Self::new(credentials, requested_modes)
    }
}

/// Determines permissions for the requested targets
#[async_trait]
pub trait PermissionReader: Send + Sync {
    async fn handle(&self, input: &PermissionReaderInput) -> Result<PermissionMap>;
}

/// Merge `from` into `into`: a denial always wins, a grant beats no decision
pub fn merge_permissions(into: &mut PermissionMap, from: PermissionMap) {
    for (target, set) in from {
        let merged = into.entry(target).or_default();
        for (mode, allowed) in set {
            let entry = merged.entry(mode).or_insert(allowed);
            *entry = *entry && allowed;
        }
    }
}

/// Combines the results of several readers
pub struct UnionPermissionReader {
    readers: Vec<Arc<dyn PermissionReader>>,
}

impl UnionPermissionReader {
    pub fn new(readers: Vec<Arc<dyn PermissionReader>>) -> Self {
        Self { readers }
    }
}

#[async_trait]
impl PermissionReader for UnionPermissionReader {
    async fn handle(&self, input: &PermissionReaderInput) -> Result<PermissionMap> {
        let mut result = PermissionMap::new();
        for reader in &self.readers {
            merge_permissions(&mut result, reader.handle(input).await?);
        }
        Ok(result)
    }
}

/// Returns the same decisions for every requested target
pub struct StaticPermissionReader {
    permissions: PermissionSet,
}

impl StaticPermissionReader {
    pub fn new(permissions: PermissionSet) -> Self {
        Self { permissions }
    }

    /// Grant (or deny) exactly `modes`
    pub fn for_modes(modes: &[AccessMode], allow: bool) -> Self {
        Self::new(modes.iter().map(|mode| (*mode, allow)).collect())
    }
}

#[async_trait]
impl PermissionReader for StaticPermissionReader {
    async fn handle(&self, input: &PermissionReaderInput) -> Result<PermissionMap> {
        Ok(input
            .requested_modes
            .keys()
            .map(|target| (target.clone(), self.permissions.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "http://srv/alice/doc";

    fn input() -> PermissionReaderInput {
        PermissionReaderInput::single(Credentials::public(), TARGET, &[AccessMode::Read])
    }

    #[test]
    fn test_access_mode_serde() {
        assert_eq!(serde_json::to_value(AccessMode::Control).unwrap(), "control");
        assert_eq!(AccessMode::Append.to_string(), "append");
        assert_eq!(full_permissions().len(), 6);
    }

    #[tokio::test]
    async fn test_static_reader_covers_every_target() {
        let reader = StaticPermissionReader::for_modes(&[AccessMode::Read, AccessMode::Write], true);
        let mut requested = AccessMap::new();
        requested.insert("http://srv/a".into(), BTreeSet::new());
        requested.insert("http://srv/b".into(), BTreeSet::new());

        let result = reader
            .handle(&PermissionReaderInput::new(Credentials::public(), requested))
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result["http://srv/b"][&AccessMode::Write]);
    }

    #[tokio::test]
    async fn test_union_denial_wins() {
        let grant: Arc<dyn PermissionReader> = Arc::new(StaticPermissionReader::for_modes(
            &[AccessMode::Read, AccessMode::Append],
            true,
        ));
        let deny: Arc<dyn PermissionReader> =
            Arc::new(StaticPermissionReader::for_modes(&[AccessMode::Read], false));

        let reader = UnionPermissionReader::new(vec![grant.clone(), deny.clone()]);
        let set = &reader.handle(&input()).await.unwrap()[TARGET];
        assert!(!set[&AccessMode::Read]);
        assert!(set[&AccessMode::Append]);
        assert!(!set.contains_key(&AccessMode::Write));

        // Order does not matter
        let reader = UnionPermissionReader::new(vec![deny, grant]);
        let set = &reader.handle(&input()).await.unwrap()[TARGET];
        assert!(!set[&AccessMode::Read]);
    }

    #[tokio::test]
    async fn test_empty_union() {
        let reader = UnionPermissionReader::new(Vec::new());
        assert!(reader.handle(&input()).await.unwrap().is_empty());
    }
}
