//! # dashgate-policy: request-scoped access policy for dashboard data sources
//!
//! Answers the three questions a BI SDK asks its host for every data-source
//! item it touches:
//! - **Who is calling?** ([`RequestContextExtractor`] + [`RoleResolver`])
//! - **May they see this item?** ([`AccessPolicyEngine`])
//! - **How must the item be queried for them?** ([`QueryRewriter`])
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Inbound request headers                     │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  RequestContextExtractor                     │
//! │  ├─ identity (default when absent)           │
//! │  ├─ attributes (order id, employee id, ...)  │
//! │  └─ role via RoleResolver                    │
//! └─────────────────┬───────────────────────────┘
//!                   │ AccessContext
//!         ┌─────────┴──────────┐
//!         ▼                    ▼
//! ┌───────────────────┐ ┌────────────────────────┐
//! │ AccessPolicyEngine│ │ QueryRewriter          │
//! │ allow / deny      │ │ - procedure binding    │
//! │                   │ │ - custom query binding │
//! │                   │ │ - row-level filter     │
//! └───────────────────┘ └────────────────────────┘
//! ```
//!
//! Every value derived from a request is carried as a bound parameter. SQL
//! text produced by the rewriter contains placeholders only.
//!
//! ## Example
//!
//! ```
//! use std::collections::HashMap;
//! use dashgate_policy::{PolicyConfig, PolicyCore, ResourceDescriptor, Role};
//!
//! let core = PolicyCore::new(PolicyConfig::default().validate()?);
//!
//! let mut headers = HashMap::new();
//! headers.insert("x-customer-id".to_string(), Some("AROUT".to_string()));
//! let admin = core.extract(&headers);
//! assert_eq!(admin.role(), Role::Admin);
//! assert!(core.is_allowed(&admin, &ResourceDescriptor::table("Employees")));
//!
//! let anonymous = core.extract(&HashMap::new());
//! assert_eq!(anonymous.identity(), "ALFKI");
//! assert!(!core.is_allowed(&anonymous, &ResourceDescriptor::table("Employees")));
//!
//! let request = core.rewrite(&anonymous, &ResourceDescriptor::table("Orders"));
//! let filter = request.rewritten_filter().expect("Orders is row-level secured");
//! assert_eq!(filter.sql(), "\"CustomerID\" = @CustomerID");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod context;
pub mod enforcement;
pub mod error;
pub mod policy;
pub mod resource;
pub mod rewrite;
pub mod roles;

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

pub use context::{AccessContext, RequestContextExtractor};
pub use enforcement::{AccessPolicyEngine, Decision, DecisionReason};
pub use error::{PolicyError, Result};
pub use policy::{
    CustomQueryBinding, HeaderConfig, ParameterSlot, Policy, PolicyConfig, PolicyRule,
    ProcedureBinding, RowLevelSecurity, ValueSource,
};
pub use resource::{ResourceDescriptor, ResourceKind};
pub use rewrite::{Binding, DataAccessRequest, ParameterizedQuery, ProceduralCall, QueryRewriter};
pub use roles::{Role, RoleResolver};

/// The three call points consumed by the SDK integration layer, bundled
/// over one validated [`Policy`].
#[derive(Debug, Clone)]
pub struct PolicyCore {
    extractor: RequestContextExtractor,
    engine: AccessPolicyEngine,
    rewriter: QueryRewriter,
}

impl PolicyCore {
    /// Builds all components over the same policy.
    pub fn new(policy: Arc<Policy>) -> Self {
        Self {
            extractor: RequestContextExtractor::new(Arc::clone(&policy)),
            engine: AccessPolicyEngine::new(Arc::clone(&policy)),
            rewriter: QueryRewriter::new(policy),
        }
    }

    /// Disables audit logging in the policy engine (for testing).
    pub fn without_audit(mut self) -> Self {
        self.engine = self.engine.without_audit();
        self
    }

    /// Derives the access context for one inbound request.
    pub fn extract<S: BuildHasher>(
        &self,
        headers: &HashMap<String, Option<String>, S>,
    ) -> AccessContext {
        self.extractor.extract(headers)
    }

    /// Returns whether `context` may access `resource`.
    pub fn is_allowed(&self, context: &AccessContext, resource: &ResourceDescriptor) -> bool {
        self.engine.is_allowed(context, resource)
    }

    /// Produces the request to execute for `resource` on behalf of `context`.
    pub fn rewrite(
        &self,
        context: &AccessContext,
        resource: &ResourceDescriptor,
    ) -> DataAccessRequest {
        self.rewriter.rewrite(context, resource)
    }

    pub fn extractor(&self) -> &RequestContextExtractor {
        &self.extractor
    }

    pub fn engine(&self) -> &AccessPolicyEngine {
        &self.engine
    }

    pub fn rewriter(&self) -> &QueryRewriter {
        &self.rewriter
    }
}
