//! Access control for index builds
//!
//! Roles are granted per space; the God role is global. Building an index
//! requires God, or Admin/Dba in the target space.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::types::SpaceId;

/// Roles a user can hold in a space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Global superuser
    God,
    /// Space administrator
    Admin,
    /// Schema and index management
    Dba,
    /// Read and write data
    User,
    /// Read only
    Guest,
}

impl Role {
    /// Whether the role may build indexes
    pub fn can_build_index(&self) -> bool {
        matches!(self, Role::God | Role::Admin | Role::Dba)
    }
}

/// Role lookup, backed by the meta service
#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Whether the user holds the global God role
    async fn is_god(&self, user: &str) -> bool;

    /// Role of the user in the space, if any
    async fn role_in_space(&self, user: &str, space: SpaceId) -> Option<Role>;
}

/// Check whether `user` may build indexes in `space`
pub async fn check_build_permission(acl: &dyn AccessControl, user: &str, space: SpaceId) -> bool {
    if acl.is_god(user).await {
        return true;
    }
    acl.role_in_space(user, space)
        .await
        .is_some_and(|role| role.can_build_index())
}

/// In-memory role table
#[derive(Debug, Default)]
pub struct MemAccessControl {
    gods: RwLock<HashSet<String>>,
    grants: RwLock<HashMap<(String, SpaceId), Role>>,
}

impl MemAccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a role; granting God makes the user global superuser
    pub fn grant(&self, user: impl Into<String>, space: SpaceId, role: Role) {
        let user = user.into();
        if role == Role::God {
            self.gods.write().insert(user);
        } else {
            self.grants.write().insert((user, space), role);
        }
    }

    /// Revoke the user's role in the space
    pub fn revoke(&self, user: &str, space: SpaceId) {
        self.grants.write().remove(&(user.to_string(), space));
    }
}

#[async_trait]
impl AccessControl for MemAccessControl {
    async fn is_god(&self, user: &str) -> bool {
        self.gods.read().contains(user)
    }

    async fn role_in_space(&self, user: &str, space: SpaceId) -> Option<Role> {
        self.grants.read().get(&(user.to_string(), space)).copied()
    }
}
