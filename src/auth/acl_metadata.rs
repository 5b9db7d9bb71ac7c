//! Surfaces the requester's and the public's permissions on a resource

use hyper::Method;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::permissions::{
    AccessMap, AccessMode, CredentialGroup, Credentials, PermissionReader, PermissionReaderInput,
    PermissionSet,
};
use crate::types::Result;

/// Modes that can be expressed in WebACL metadata
pub const WAC_MODES: [AccessMode; 4] = [
    AccessMode::Read,
    AccessMode::Write,
    AccessMode::Append,
    AccessMode::Control,
];

/// One granted mode for one credential group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WacEntry {
    pub group: CredentialGroup,
    pub mode: AccessMode,
}

/// Computes WebACL permission metadata for GET and HEAD responses
pub struct WebAclMetadataCollector {
    reader: Arc<dyn PermissionReader>,
}

impl WebAclMetadataCollector {
    pub fn new(reader: Arc<dyn PermissionReader>) -> Self {
        Self { reader }
    }

    async fn read_set(&self, credentials: Credentials, target: &str) -> Result<PermissionSet> {
        let mut requested = AccessMap::new();
        requested.insert(target.to_string(), WAC_MODES.iter().copied().collect::<BTreeSet<_>>());
        let mut result = self
            .reader
            .handle(&PermissionReaderInput::new(credentials, requested))
            .await?;
        Ok(result.remove(target).unwrap_or_default())
    }

    /// Entries for every granted mode; empty for other methods
    pub async fn collect(
        &self,
        method: &Method,
        target: &str,
        credentials: &Credentials,
    ) -> Result<Vec<WacEntry>> {
        if method != Method::GET && method != Method::HEAD {
            return Ok(Vec::new());
        }

        let user = self.read_set(credentials.clone(), target).await?;
        let public = if credentials.agent.is_none() {
            user.clone()
        } else {
            self.read_set(Credentials::public(), target).await?
        };

        let mut entries = Vec::new();
        for (group, set) in [(CredentialGroup::User, &user), (CredentialGroup::Public, &public)] {
            for mode in WAC_MODES {
                if set.get(&mode).copied().unwrap_or(false) {
                    entries.push(WacEntry { group, mode });
                }
            }
        }
        Ok(entries)
    }
}

/// Render entries as a `WAC-Allow` header value
///
/// Both groups are always present, e.g. `user="read write",public=""`.
pub fn wac_allow_header(entries: &[WacEntry]) -> String {
    [CredentialGroup::User, CredentialGroup::Public]
        .iter()
        .map(|group| {
            let modes: Vec<&str> = entries
                .iter()
                .filter(|entry| entry.group == *group)
                .map(|entry| entry.mode.as_str())
                .collect();
            format!("{}=\"{}\"", group.as_str(), modes.join(" "))
        })
        .collect::<Vec<_>>()
        .join(",")
}
