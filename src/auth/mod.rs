//! Password hashing and permission resolution
//!
//! Provides:
//! - Argon2 password hashing
//! - Access modes and composable permission readers
//! - Ownership-based control over ACL resources
//! - WebACL permission metadata (`WAC-Allow`)

pub mod acl_metadata;
pub mod owner;
pub mod password;
pub mod permissions;

pub use acl_metadata::{wac_allow_header, WacEntry, WebAclMetadataCollector, WAC_MODES};
pub use owner::{AclIdentifierStrategy, OwnerPermissionReader};
pub use password::PasswordHasher;
pub use permissions::{
    full_permissions, merge_permissions, AccessMap, AccessMode, AgentCredentials, CredentialGroup,
    Credentials, PermissionMap, PermissionReader, PermissionReaderInput, PermissionSet,
    StaticPermissionReader, UnionPermissionReader,
};
