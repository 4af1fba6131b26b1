//! Role definitions and identity-to-role resolution.
//!
//! Two roles:
//! - User: sees an allow-listed set of tables (default, most restrictive)
//! - Admin: sees every table

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role in the access control system.
///
/// Roles are ordered from least to most privileged: `User < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Default role for every identity not explicitly elevated.
    ///
    /// **Access:**
    /// - Tables listed in the User policy rule
    /// - Row-level filtered to its own identity
    User,

    /// Elevated role with unrestricted table access.
    Admin,
}

impl Role {
    /// The lowest-privilege role. Unknown identities always resolve here.
    pub const DEFAULT: Role = Role::User;

    /// The role that bypasses table allow-lists.
    pub const ELEVATED: Role = Role::Admin;

    /// Every role, least privileged first.
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    /// Label used in configuration and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
        }
    }

    /// Returns whether table allow-lists are bypassed for this role.
    pub fn is_elevated(&self) -> bool {
        *self == Role::ELEVATED
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.label() == s)
            .ok_or_else(|| format!("unknown role '{s}' (expected one of: User, Admin)"))
    }
}

/// Maps an identity to its role.
///
/// The rule set is a plain allow-list of elevated identities. Matching is
/// exact and case-sensitive, so `"arout"` does not inherit `"AROUT"`'s role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleResolver {
    elevated_identities: BTreeSet<String>,
}

impl RoleResolver {
    /// Creates a resolver that elevates exactly the given identities.
    pub fn new<I, S>(elevated_identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            elevated_identities: elevated_identities.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolves `identity` to a role. Total: every input maps to exactly one role.
    pub fn resolve(&self, identity: &str) -> Role {
        if self.elevated_identities.contains(identity) {
            Role::ELEVATED
        } else {
            Role::DEFAULT
        }
    }

    pub fn elevated_identities(&self) -> &BTreeSet<String> {
        &self.elevated_identities
    }
}
