//! Resource/action permission catalog and the fluent permission builder.
//!
//! The catalog is plain data (resource name -> allowed actions) so new
//! resources are additive configuration, not new types.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::VaultError;

/// Fixed catalog of every resource and the actions valid on it.
pub const CATALOG: &[(&str, &[&str])] = &[
    ("account", &["create", "read", "update", "delete"]),
    ("seed", &["create", "read", "update", "delete"]),
    ("transaction", &["send"]),
    ("session", &["list", "revoke"]),
];

lazy_static! {
    static ref CATALOG_INDEX: HashMap<&'static str, &'static [&'static str]> =
        CATALOG.iter().copied().collect();
}

/// One allowed (resource, action) tuple, scoped to a set of identities.
/// `"*"` in the identity set means any identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub resource: String,
    pub action: String,
    pub identities: Vec<String>,
}

impl Permission {
    pub fn new(resource: &str, action: &str, identities: Vec<String>) -> Self {
        Self {
            resource: resource.to_string(),
            action: action.to_string(),
            identities,
        }
    }

    /// Whether this permission's identity scope covers `identity`.
    pub fn covers_identity(&self, identity: &str) -> bool {
        self.identities.iter().any(|i| i == "*" || i == identity)
    }
}

/// Every action of every catalog resource, on any identity. Minted for the
/// session returned by an owner unlock.
pub fn owner_permissions() -> Vec<Permission> {
    CATALOG
        .iter()
        .flat_map(|(resource, actions)| {
            actions
                .iter()
                .map(|action| Permission::new(resource, action, vec!["*".to_string()]))
        })
        .collect()
}

/// Fluent builder over the catalog. Validates resources and actions as they
/// are added and merges identity scopes per (resource, action).
#[derive(Debug, Default, Clone)]
pub struct PermissionsBuilder {
    permissions: Vec<Permission>,
}

impl PermissionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend a pre-existing permission set: new resources append, existing
    /// (resource, action) pairs merge identities.
    pub fn from_permissions(permissions: Vec<Permission>) -> Self {
        Self { permissions }
    }

    pub fn for_resource(self, resource: &str) -> Result<ResourcePermissionsBuilder, VaultError> {
        if !CATALOG_INDEX.contains_key(resource) {
            return Err(VaultError::UnknownResource(resource.to_string()));
        }
        Ok(ResourcePermissionsBuilder {
            builder: self,
            resource: resource.to_string(),
            selected: Vec::new(),
        })
    }

    pub fn build(self) -> Vec<Permission> {
        self.permissions
    }

    fn entry_mut(&mut self, resource: &str, action: &str) -> &mut Permission {
        if let Some(pos) = self
            .permissions
            .iter()
            .position(|p| p.resource == resource && p.action == action)
        {
            &mut self.permissions[pos]
        } else {
            self.permissions.push(Permission::new(resource, action, Vec::new()));
            self.permissions.last_mut().expect("just pushed")
        }
    }
}

/// Builder scoped to one catalog resource.
#[derive(Debug)]
pub struct ResourcePermissionsBuilder {
    builder: PermissionsBuilder,
    resource: String,
    selected: Vec<String>,
}

impl ResourcePermissionsBuilder {
    /// Select actions to grant on the current resource. Reports *every*
    /// invalid action at once, not just the first.
    pub fn allow(mut self, actions: &[&str]) -> Result<Self, VaultError> {
        let valid = CATALOG_INDEX
            .get(self.resource.as_str())
            .copied()
            .expect("resource validated on entry");

        let invalid: Vec<String> = actions
            .iter()
            .filter(|action| !valid.iter().any(|v| *v == **action))
            .map(|action| action.to_string())
            .collect();
        if !invalid.is_empty() {
            return Err(VaultError::UnknownActions {
                resource: self.resource.clone(),
                actions: invalid,
            });
        }

        self.selected.clear();
        for action in actions {
            if !self.selected.iter().any(|s| s == action) {
                self.selected.push(action.to_string());
            }
            self.builder.entry_mut(&self.resource, action);
        }
        Ok(self)
    }

    /// Sugar for allowing every catalog action of the resource.
    pub fn allow_everything(self) -> Self {
        let valid = CATALOG_INDEX
            .get(self.resource.as_str())
            .copied()
            .expect("resource validated on entry");
        self.allow(valid).expect("catalog actions are valid")
    }

    /// Attach identities to the currently selected actions, merging
    /// (set-union) with any identities attached earlier.
    pub fn on(mut self, identities: &[&str]) -> Self {
        for action in self.selected.clone() {
            let entry = self.builder.entry_mut(&self.resource, &action);
            for identity in identities {
                if !entry.identities.iter().any(|i| i == identity) {
                    entry.identities.push(identity.to_string());
                }
            }
        }
        self
    }

    /// Attach the `*` wildcard identity.
    pub fn on_any(self) -> Self {
        self.on(&["*"])
    }

    /// Switch to another resource, keeping everything granted so far.
    pub fn for_resource(self, resource: &str) -> Result<ResourcePermissionsBuilder, VaultError> {
        self.builder.for_resource(resource)
    }

    pub fn build(self) -> Vec<Permission> {
        self.builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_resource() {
        let err = PermissionsBuilder::new().for_resource("teapot").unwrap_err();
        assert!(matches!(err, VaultError::UnknownResource(r) if r == "teapot"));
    }

    #[test]
    fn test_unknown_actions_reported_all_at_once() {
        let err = PermissionsBuilder::new()
            .for_resource("account")
            .unwrap()
            .allow(&["read", "bogus"])
            .unwrap_err();
        match err {
            VaultError::UnknownActions { resource, actions } => {
                assert_eq!(resource, "account");
                assert_eq!(actions, vec!["bogus".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = PermissionsBuilder::new()
            .for_resource("session")
            .unwrap()
            .allow(&["list", "fly", "teleport"])
            .unwrap_err();
        match err {
            VaultError::UnknownActions { actions, .. } => {
                assert_eq!(actions, vec!["fly".to_string(), "teleport".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_identity_merging_is_set_union() {
        let permissions = PermissionsBuilder::new()
            .for_resource("account")
            .unwrap()
            .allow(&["read"])
            .unwrap()
            .on(&["id-1"])
            .allow(&["read"])
            .unwrap()
            .on(&["id-2", "id-1"])
            .build();

        assert_eq!(permissions.len(), 1);
        assert_eq!(permissions[0].identities, vec!["id-1", "id-2"]);
    }

    #[test]
    fn test_allow_everything() {
        let permissions = PermissionsBuilder::new()
            .for_resource("account")
            .unwrap()
            .allow_everything()
            .on_any()
            .build();

        let actions: Vec<&str> = permissions.iter().map(|p| p.action.as_str()).collect();
        assert_eq!(actions, vec!["create", "read", "update", "delete"]);
        assert!(permissions.iter().all(|p| p.identities == vec!["*"]));
    }

    #[test]
    fn test_incremental_extension_from_existing_set() {
        let base = PermissionsBuilder::new()
            .for_resource("account")
            .unwrap()
            .allow(&["read"])
            .unwrap()
            .on(&["id-1"])
            .build();

        // new resource appends, existing resource merges identities by action
        let extended = PermissionsBuilder::from_permissions(base)
            .for_resource("transaction")
            .unwrap()
            .allow(&["send"])
            .unwrap()
            .on(&["id-1"])
            .for_resource("account")
            .unwrap()
            .allow(&["read"])
            .unwrap()
            .on(&["id-2"])
            .build();

        assert_eq!(extended.len(), 2);
        assert_eq!(extended[0].resource, "account");
        assert_eq!(extended[0].identities, vec!["id-1", "id-2"]);
        assert_eq!(extended[1].resource, "transaction");
    }

    #[test]
    fn test_owner_permissions_cover_full_catalog() {
        let owner = owner_permissions();
        let expected: usize = CATALOG.iter().map(|(_, actions)| actions.len()).sum();
        assert_eq!(owner.len(), expected);
        assert!(owner.iter().all(|p| p.identities == vec!["*"]));
        assert!(owner.iter().any(|p| p.resource == "seed" && p.action == "create"));
    }

    #[test]
    fn test_permission_identity_cover() {
        let scoped = Permission::new("account", "read", vec!["id-1".to_string()]);
        assert!(scoped.covers_identity("id-1"));
        assert!(!scoped.covers_identity("id-2"));

        let wildcard = Permission::new("account", "read", vec!["*".to_string()]);
        assert!(wildcard.covers_identity("anything"));
    }
}
