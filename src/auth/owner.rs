//! Full control for pod owners over the ACL resources of their pods

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::permissions::{full_permissions, PermissionMap, PermissionReader, PermissionReaderInput};
use crate::account::AccountStore;
use crate::types::Result;

/// Recognises ACL auxiliary resources by their suffix
#[derive(Clone, Debug)]
pub struct AclIdentifierStrategy {
    suffix: String,
}

impl AclIdentifierStrategy {
    pub const DEFAULT_SUFFIX: &'static str = ".acl";

    pub fn new(suffix: &str) -> Self {
        Self {
            suffix: suffix.to_string(),
        }
    }

    pub fn is_auxiliary(&self, target: &str) -> bool {
        target.len() > self.suffix.len() && target.ends_with(&self.suffix)
    }

    /// ACL resource governing `subject`
    pub fn auxiliary_of(&self, subject: &str) -> String {
        format!("{}{}", subject, self.suffix)
    }

    /// Resource governed by an ACL resource
    pub fn subject_of(&self, target: &str) -> Option<String> {
        if !self.is_auxiliary(target) {
            return None;
        }
        target.strip_suffix(&self.suffix).map(str::to_string)
    }
}

impl Default for AclIdentifierStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SUFFIX)
    }
}

/// Grants every mode on ACL resources inside the requester's own pods
///
/// This keeps owners from locking themselves out by writing a bad ACL. Any
/// lookup failure results in no grant instead of an error.
pub struct OwnerPermissionReader {
    account_store: Arc<dyn AccountStore>,
    acl_strategy: AclIdentifierStrategy,
}

impl OwnerPermissionReader {
    pub fn new(account_store: Arc<dyn AccountStore>, acl_strategy: AclIdentifierStrategy) -> Self {
        Self {
            account_store,
            acl_strategy,
        }
    }

    async fn find_owned(&self, input: &PermissionReaderInput) -> Result<PermissionMap> {
        let mut result = PermissionMap::new();

        let acl_targets: Vec<&String> = input
            .requested_modes
            .keys()
            .filter(|target| self.acl_strategy.is_auxiliary(target))
            .collect();
        if acl_targets.is_empty() {
            return Ok(result);
        }

        let Some(web_id) = input.credentials.web_id() else {
            debug!("No WebID in credentials, skipping owner check");
            return Ok(result);
        };
        let Some(account_id) = self.account_store.find_by_web_id(web_id).await? else {
            debug!("No account linked to {}", web_id);
            return Ok(result);
        };
        let Some(account) = self.account_store.find(&account_id).await? else {
            debug!("Account {} linked to {} does not exist", account_id, web_id);
            return Ok(result);
        };

        for target in acl_targets {
            if account.owning_pod(target).is_some() {
                result.insert(target.clone(), full_permissions());
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl PermissionReader for OwnerPermissionReader {
    async fn handle(&self, input: &PermissionReaderInput) -> Result<PermissionMap> {
        match self.find_owned(input).await {
            Ok(result) => Ok(result),
            Err(e) => {
                debug!("Owner permission check failed: {}", e);
                Ok(PermissionMap::new())
            }
        }
    }
}
