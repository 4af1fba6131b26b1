//! Data-access request rewriting.
//!
//! Produces the request the SDK executes for an item on behalf of a context.
//! Strategies are tried in a fixed order and the first match wins:
//!
//! 1. Procedure binding (by item id)
//! 2. Custom query binding (by item id)
//! 3. Row-level filter (by table name)
//! 4. Pass-through
//!
//! Context-derived values are always returned as bindings next to the SQL
//! text, never spliced into it:
//!
//! ```text
//! identity = "ALFKI'; DROP TABLE Orders;--"
//!
//! sql:      "CustomerID" = @CustomerID
//! bindings: [CustomerID => "ALFKI'; DROP TABLE Orders;--"]
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::context::AccessContext;
use crate::policy::{ParameterSlot, Policy, RowLevelSecurity};
use crate::resource::ResourceDescriptor;

/// A value bound to a named placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    /// Placeholder name without the `@` sigil.
    pub name: String,
    pub value: String,
}

/// SQL text with `@Name` placeholders plus the values bound to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterizedQuery {
    sql: String,
    bindings: Vec<Binding>,
}

impl ParameterizedQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bindings in declaration order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn binding(&self, name: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|binding| binding.name == name)
            .map(|binding| binding.value.as_str())
    }
}

/// A stored procedure call with named parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProceduralCall {
    name: String,
    parameters: BTreeMap<String, String>,
}

impl ProceduralCall {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }
}

/// Result of rewriting one item access.
///
/// At most one of the two variants is populated. Neither populated means the
/// item is executed unmodified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataAccessRequest {
    procedural_call: Option<ProceduralCall>,
    rewritten_filter: Option<ParameterizedQuery>,
}

impl DataAccessRequest {
    pub fn pass_through() -> Self {
        Self::default()
    }

    pub fn procedure(call: ProceduralCall) -> Self {
        Self {
            procedural_call: Some(call),
            rewritten_filter: None,
        }
    }

    pub fn filter(query: ParameterizedQuery) -> Self {
        Self {
            procedural_call: None,
            rewritten_filter: Some(query),
        }
    }

    pub fn procedural_call(&self) -> Option<&ProceduralCall> {
        self.procedural_call.as_ref()
    }

    pub fn rewritten_filter(&self) -> Option<&ParameterizedQuery> {
        self.rewritten_filter.as_ref()
    }

    pub fn is_pass_through(&self) -> bool {
        self.procedural_call.is_none() && self.rewritten_filter.is_none()
    }
}

/// Rewrites item accesses according to the policy's bindings.
#[derive(Debug, Clone)]
pub struct QueryRewriter {
    policy: Arc<Policy>,
}

impl QueryRewriter {
    pub fn new(policy: Arc<Policy>) -> Self {
        Self { policy }
    }

    /// Produces the request to execute for `resource`.
    ///
    /// Deterministic: identical inputs yield identical requests.
    pub fn rewrite(
        &self,
        context: &AccessContext,
        resource: &ResourceDescriptor,
    ) -> DataAccessRequest {
        if let Some(id) = resource.item_id() {
            if let Some(binding) = self.policy.procedure(id) {
                debug!(resource = %resource, procedure = %binding.procedure, "Bound to procedure");
                return DataAccessRequest::procedure(ProceduralCall {
                    name: binding.procedure.clone(),
                    parameters: binding
                        .parameters
                        .iter()
                        .map(|slot| (slot.name.clone(), context.value_of(&slot.source).to_string()))
                        .collect(),
                });
            }

            if let Some(binding) = self.policy.custom_query(id) {
                debug!(resource = %resource, "Bound to custom query");
                return DataAccessRequest::filter(ParameterizedQuery {
                    sql: binding.sql.clone(),
                    bindings: bind(context, &binding.parameters),
                });
            }
        }

        if let ResourceDescriptor::Table { name } = resource {
            if let Some(rls) = self.policy.row_level_security(name) {
                debug!(resource = %resource, column = %rls.column, "Row-level filter applied");
                return DataAccessRequest::filter(row_filter(context, rls));
            }
        }

        DataAccessRequest::pass_through()
    }
}

fn bind(context: &AccessContext, slots: &[ParameterSlot]) -> Vec<Binding> {
    slots
        .iter()
        .map(|slot| Binding {
            name: slot.name.clone(),
            value: context.value_of(&slot.source).to_string(),
        })
        .collect()
}

fn row_filter(context: &AccessContext, rls: &RowLevelSecurity) -> ParameterizedQuery {
    ParameterizedQuery {
        sql: format!("{} = @{}", quote_identifier(&rls.column), rls.parameter),
        bindings: vec![Binding {
            name: rls.parameter.clone(),
            value: context.identity().to_string(),
        }],
    }
}

/// Double-quotes an identifier, doubling embedded quotes.
fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
