//! Access policy evaluation.
//!
//! Decides whether a context may see a data-source item. Evaluation order:
//! 1. Non-table items are deferred and allowed
//! 2. The elevated role is allowed every table
//! 3. Other roles are allowed exactly the tables in their rule

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::context::AccessContext;
use crate::policy::Policy;
use crate::resource::ResourceDescriptor;

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Procedures and custom queries are not gated by table rules.
    DeferredNonTable,
    /// The context holds the elevated role.
    ElevatedRole,
    /// The table is listed in the role's rule.
    AllowedByRule,
    /// The table is not listed in the role's rule.
    NotInRule,
    /// The role has no rule at all.
    NoRuleForRole,
}

impl DecisionReason {
    pub fn allows(self) -> bool {
        matches!(
            self,
            Self::DeferredNonTable | Self::ElevatedRole | Self::AllowedByRule
        )
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DeferredNonTable => "non-table items are not gated by table rules",
            Self::ElevatedRole => "elevated role sees every table",
            Self::AllowedByRule => "table is allowed by the role's rule",
            Self::NotInRule => "table is not in the role's rule",
            Self::NoRuleForRole => "role has no rule",
        })
    }
}

/// Outcome of evaluating one resource against one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: DecisionReason,
}

impl From<DecisionReason> for Decision {
    fn from(reason: DecisionReason) -> Self {
        Self {
            allowed: reason.allows(),
            reason,
        }
    }
}

/// Deny-by-default table access engine.
///
/// Stateless apart from the shared policy; evaluation never depends on call
/// order and never fails.
#[derive(Debug, Clone)]
pub struct AccessPolicyEngine {
    policy: Arc<Policy>,

    /// Whether to log decisions.
    audit_enabled: bool,
}

impl AccessPolicyEngine {
    pub fn new(policy: Arc<Policy>) -> Self {
        Self {
            policy,
            audit_enabled: true,
        }
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    /// Returns whether `context` may access `resource`.
    pub fn is_allowed(&self, context: &AccessContext, resource: &ResourceDescriptor) -> bool {
        self.decide(context, resource).allowed
    }

    /// Evaluates `resource` and explains the outcome.
    pub fn decide(&self, context: &AccessContext, resource: &ResourceDescriptor) -> Decision {
        let reason = match resource {
            ResourceDescriptor::Procedure { .. } | ResourceDescriptor::CustomQuery { .. } => {
                DecisionReason::DeferredNonTable
            }
            ResourceDescriptor::Table { name } => self.evaluate_table(context, name),
        };
        let decision = Decision::from(reason);

        if self.audit_enabled {
            if decision.allowed {
                debug!(
                    identity = %context.identity(),
                    role = %context.role(),
                    resource = %resource,
                    reason = %reason,
                    "Resource access granted"
                );
            } else {
                info!(
                    identity = %context.identity(),
                    role = %context.role(),
                    resource = %resource,
                    reason = %reason,
                    "Resource access denied"
                );
            }
        }

        decision
    }

    /// Keeps the tables `context` may see, preserving order.
    ///
    /// Used when the SDK enumerates the items of a data source.
    pub fn filter_tables<'a, I>(&self, context: &AccessContext, tables: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tables
            .into_iter()
            .filter(|name| self.is_allowed(context, &ResourceDescriptor::table(*name)))
            .collect()
    }

    fn evaluate_table(&self, context: &AccessContext, name: &str) -> DecisionReason {
        let role = context.role();
        if role.is_elevated() {
            return DecisionReason::ElevatedRole;
        }
        match self.policy.allowed_resources(role) {
            Some(allowed) if allowed.contains(name) => DecisionReason::AllowedByRule,
            Some(_) => DecisionReason::NotInRule,
            None => DecisionReason::NoRuleForRole,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }
}
