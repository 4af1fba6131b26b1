//! Static policy configuration.
//!
//! [`PolicyConfig`] is the serialized rule set as it appears in configuration
//! files. [`PolicyConfig::validate`] checks it once at process start and
//! produces the immutable [`Policy`] every component reads from.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlparser::ast::Statement;
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;
use tracing::{debug, warn};

use crate::error::{Result, configuration};
use crate::roles::{Role, RoleResolver};

/// Where a bound parameter takes its value from.
///
/// Serialized as `"identity"` or `"attribute:<name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueSource {
    /// The caller's identity.
    Identity,

    /// A named request attribute (e.g. `order_id`).
    Attribute(String),
}

impl FromStr for ValueSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "identity" {
            return Ok(Self::Identity);
        }
        match s.strip_prefix("attribute:") {
            Some(name) if !name.is_empty() => Ok(Self::Attribute(name.to_string())),
            _ => Err(format!(
                "invalid value source '{s}' (expected 'identity' or 'attribute:<name>')"
            )),
        }
    }
}

impl TryFrom<String> for ValueSource {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueSource> for String {
    fn from(source: ValueSource) -> Self {
        source.to_string()
    }
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
            Self::Attribute(name) => write!(f, "attribute:{name}"),
        }
    }
}

/// A named parameter slot and the context value bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSlot {
    /// Parameter name without the `@` sigil.
    pub name: String,
    pub source: ValueSource,
}

impl ParameterSlot {
    pub fn new(name: impl Into<String>, source: ValueSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

/// Maps a data-source item id to a stored procedure call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureBinding {
    pub resource_id: String,
    pub procedure: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSlot>,
}

/// Maps a data-source item id to a parameterized query template.
///
/// Placeholders are written `@Name` and every one must have a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomQueryBinding {
    pub resource_id: String,
    pub sql: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSlot>,
}

/// Restricts a table to rows whose `column` equals the caller's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLevelSecurity {
    pub table: String,
    pub column: String,
    pub parameter: String,
}

/// Tables a role may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub role: Role,
    #[serde(default)]
    pub allowed_resources: BTreeSet<String>,
}

impl PolicyRule {
    pub fn new<I, S>(role: Role, allowed_resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            role,
            allowed_resources: allowed_resources.into_iter().map(Into::into).collect(),
        }
    }
}

/// A request attribute read from a header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeHeader {
    /// Attribute name as referenced by `attribute:<name>` value sources.
    pub name: String,
    /// Header carrying the value (matched case-insensitively).
    pub header: String,
}

/// Header names read by the context extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Header carrying the caller's identity.
    pub identity: String,
    pub attributes: Vec<AttributeHeader>,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            identity: "x-customer-id".to_string(),
            attributes: vec![
                AttributeHeader {
                    name: "order_id".to_string(),
                    header: "x-order-id".to_string(),
                },
                AttributeHeader {
                    name: "employee_id".to_string(),
                    header: "x-employee-id".to_string(),
                },
            ],
        }
    }
}

/// Serialized policy rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Identity used when a request carries none.
    pub default_identity: String,

    /// Identities resolved to the elevated role.
    pub elevated_identities: BTreeSet<String>,

    pub headers: HeaderConfig,

    /// Table allow-lists per non-elevated role.
    pub rules: Vec<PolicyRule>,

    pub procedures: Vec<ProcedureBinding>,
    pub custom_queries: Vec<CustomQueryBinding>,
    pub row_level_security: Vec<RowLevelSecurity>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let customer = || vec![ParameterSlot::new("CustomerID", ValueSource::Identity)];

        Self {
            default_identity: "ALFKI".to_string(),
            elevated_identities: ["AROUT", "BLONP"].into_iter().map(String::from).collect(),
            headers: HeaderConfig::default(),
            rules: vec![PolicyRule::new(
                Role::User,
                ["Customers", "Orders", "Order Details"],
            )],
            procedures: vec![
                ProcedureBinding {
                    resource_id: "CustOrderHist".to_string(),
                    procedure: "CustOrderHist".to_string(),
                    parameters: customer(),
                },
                ProcedureBinding {
                    resource_id: "CustOrdersOrders".to_string(),
                    procedure: "CustOrdersOrders".to_string(),
                    parameters: customer(),
                },
            ],
            custom_queries: vec![CustomQueryBinding {
                resource_id: "CustomerOrders".to_string(),
                sql: "SELECT * FROM Orders WHERE CustomerID = @CustomerID".to_string(),
                parameters: customer(),
            }],
            row_level_security: ["Orders", "Customers"]
                .into_iter()
                .map(|table| RowLevelSecurity {
                    table: table.to_string(),
                    column: "CustomerID".to_string(),
                    parameter: "CustomerID".to_string(),
                })
                .collect(),
        }
    }
}

impl PolicyConfig {
    /// Checks the rule set and freezes it into a [`Policy`].
    ///
    /// # Errors
    ///
    /// [`PolicyError::Configuration`](crate::PolicyError::Configuration) when
    /// the rule set is missing a required piece or contradicts itself.
    pub fn validate(&self) -> Result<Arc<Policy>> {
        let attributes = self.validate_headers()?;
        self.validate_identities()?;
        let rules = self.validate_rules()?;

        let mut procedures = BTreeMap::new();
        for binding in &self.procedures {
            require_non_empty("procedure resource_id", &binding.resource_id)?;
            require_non_empty("procedure name", &binding.procedure)?;
            validate_slots(&binding.resource_id, &binding.parameters, &attributes)?;
            if procedures
                .insert(binding.resource_id.clone(), binding.clone())
                .is_some()
            {
                return Err(configuration(format!(
                    "procedure binding '{}' is declared twice",
                    binding.resource_id
                )));
            }
        }

        let mut custom_queries = BTreeMap::new();
        for binding in &self.custom_queries {
            require_non_empty("custom query resource_id", &binding.resource_id)?;
            if procedures.contains_key(&binding.resource_id) {
                return Err(configuration(format!(
                    "'{}' is bound to both a procedure and a custom query",
                    binding.resource_id
                )));
            }
            validate_slots(&binding.resource_id, &binding.parameters, &attributes)?;
            validate_template(binding)?;
            if custom_queries
                .insert(binding.resource_id.clone(), binding.clone())
                .is_some()
            {
                return Err(configuration(format!(
                    "custom query binding '{}' is declared twice",
                    binding.resource_id
                )));
            }
        }

        let mut row_level_security = BTreeMap::new();
        for rls in &self.row_level_security {
            require_non_empty("row-level security table", &rls.table)?;
            require_non_empty("row-level security column", &rls.column)?;
            if !is_parameter_name(&rls.parameter) {
                return Err(configuration(format!(
                    "row-level security parameter '{}' on table '{}' is not a valid name",
                    rls.parameter, rls.table
                )));
            }
            if row_level_security
                .insert(rls.table.clone(), rls.clone())
                .is_some()
            {
                return Err(configuration(format!(
                    "row-level security for table '{}' is declared twice",
                    rls.table
                )));
            }
        }

        debug!(
            elevated = self.elevated_identities.len(),
            rules = rules.len(),
            procedures = procedures.len(),
            custom_queries = custom_queries.len(),
            rls_tables = row_level_security.len(),
            "Policy validated"
        );

        Ok(Arc::new(Policy {
            headers: self.headers.clone(),
            default_identity: self.default_identity.clone(),
            resolver: RoleResolver::new(self.elevated_identities.iter().cloned()),
            rules,
            procedures,
            custom_queries,
            row_level_security,
        }))
    }

    /// Returns the configured attribute names.
    fn validate_headers(&self) -> Result<BTreeSet<String>> {
        require_non_empty("identity header", &self.headers.identity)?;

        let mut headers = BTreeSet::new();
        headers.insert(self.headers.identity.to_ascii_lowercase());

        let mut names = BTreeSet::new();
        for attribute in &self.headers.attributes {
            require_non_empty("attribute name", &attribute.name)?;
            require_non_empty("attribute header", &attribute.header)?;
            if !headers.insert(attribute.header.to_ascii_lowercase()) {
                return Err(configuration(format!(
                    "header '{}' is mapped more than once",
                    attribute.header
                )));
            }
            if !names.insert(attribute.name.clone()) {
                return Err(configuration(format!(
                    "attribute '{}' is declared more than once",
                    attribute.name
                )));
            }
        }
        Ok(names)
    }

    fn validate_identities(&self) -> Result<()> {
        let default = &self.default_identity;
        require_non_empty("default identity", default)?;
        if default.trim() != default {
            return Err(configuration(
                "default identity must not have surrounding whitespace",
            ));
        }
        if self.elevated_identities.contains(default) {
            return Err(configuration(format!(
                "default identity '{default}' must not be elevated"
            )));
        }
        for identity in &self.elevated_identities {
            require_non_empty("elevated identity", identity)?;
        }
        Ok(())
    }

    fn validate_rules(&self) -> Result<BTreeMap<Role, BTreeSet<String>>> {
        let mut rules = BTreeMap::new();
        for rule in &self.rules {
            if rule.role.is_elevated() {
                return Err(configuration(format!(
                    "a rule for the {} role contradicts its unconditional access",
                    rule.role
                )));
            }
            if rule.allowed_resources.iter().any(|name| name.trim().is_empty()) {
                return Err(configuration(format!(
                    "rule for role {} allows an empty resource name",
                    rule.role
                )));
            }
            if rules
                .insert(rule.role, rule.allowed_resources.clone())
                .is_some()
            {
                return Err(configuration(format!(
                    "role {} has more than one rule",
                    rule.role
                )));
            }
        }
        if !rules.contains_key(&Role::DEFAULT) {
            return Err(configuration(format!(
                "no rule for the default role {}",
                Role::DEFAULT
            )));
        }
        if rules.values().all(BTreeSet::is_empty) {
            warn!("No table is allowed for any non-elevated role");
        }
        Ok(rules)
    }
}

/// Validated, immutable rule set.
///
/// Built once by [`PolicyConfig::validate`] and shared by reference between
/// components for the lifetime of the process.
#[derive(Debug, PartialEq, Eq)]
pub struct Policy {
    headers: HeaderConfig,
    default_identity: String,
    resolver: RoleResolver,
    rules: BTreeMap<Role, BTreeSet<String>>,
    procedures: BTreeMap<String, ProcedureBinding>,
    custom_queries: BTreeMap<String, CustomQueryBinding>,
    row_level_security: BTreeMap<String, RowLevelSecurity>,
}

impl Policy {
    pub fn headers(&self) -> &HeaderConfig {
        &self.headers
    }

    pub fn default_identity(&self) -> &str {
        &self.default_identity
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    /// Tables allowed for `role`, or `None` when the role has no rule.
    pub fn allowed_resources(&self, role: Role) -> Option<&BTreeSet<String>> {
        self.rules.get(&role)
    }

    pub fn procedure(&self, resource_id: &str) -> Option<&ProcedureBinding> {
        self.procedures.get(resource_id)
    }

    pub fn custom_query(&self, resource_id: &str) -> Option<&CustomQueryBinding> {
        self.custom_queries.get(resource_id)
    }

    pub fn row_level_security(&self, table: &str) -> Option<&RowLevelSecurity> {
        self.row_level_security.get(table)
    }
}

fn require_non_empty(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(configuration(format!("{what} must not be empty")))
    } else {
        Ok(())
    }
}

fn validate_slots(
    resource_id: &str,
    slots: &[ParameterSlot],
    attributes: &BTreeSet<String>,
) -> Result<()> {
    let mut seen = BTreeSet::new();
    for slot in slots {
        if !is_parameter_name(&slot.name) {
            return Err(configuration(format!(
                "parameter '{}' of '{resource_id}' is not a valid name",
                slot.name
            )));
        }
        if !seen.insert(slot.name.as_str()) {
            return Err(configuration(format!(
                "parameter '{}' of '{resource_id}' is bound twice",
                slot.name
            )));
        }
        if let ValueSource::Attribute(name) = &slot.source {
            if !attributes.contains(name) {
                return Err(configuration(format!(
                    "parameter '{}' of '{resource_id}' reads unknown attribute '{name}'",
                    slot.name
                )));
            }
        }
    }
    Ok(())
}

fn validate_template(binding: &CustomQueryBinding) -> Result<()> {
    let id = &binding.resource_id;
    let statements = Parser::parse_sql(&MsSqlDialect {}, &binding.sql)
        .map_err(|e| configuration(format!("custom query '{id}' does not parse: {e}")))?;

    match statements.as_slice() {
        [Statement::Query(_)] => {}
        _ => {
            return Err(configuration(format!(
                "custom query '{id}' must be exactly one SELECT statement"
            )));
        }
    }

    let mentioned = placeholders(&binding.sql);
    let bound: BTreeSet<String> = binding.parameters.iter().map(|s| s.name.clone()).collect();

    if let Some(missing) = mentioned.difference(&bound).next() {
        return Err(configuration(format!(
            "custom query '{id}' uses @{missing} without a binding"
        )));
    }
    if let Some(unused) = bound.difference(&mentioned).next() {
        return Err(configuration(format!(
            "custom query '{id}' binds {unused} but never uses @{unused}"
        )));
    }
    Ok(())
}

/// Returns whether `name` can appear after `@` as a placeholder.
pub(crate) fn is_parameter_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Collects `@Name` placeholders, skipping string literals, quoted
/// identifiers, `--` and `/* */` comments and `@@` system functions.
pub(crate) fn placeholders(sql: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '[' => {
                let close = if c == '[' { ']' } else { c };
                for inner in chars.by_ref() {
                    if inner == close {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for inner in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
            }
            '@' => {
                if chars.peek() == Some(&'@') {
                    chars.next();
                    while chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_').is_some() {}
                    continue;
                }
                let mut name = String::new();
                while let Some(next) = chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_') {
                    name.push(next);
                }
                if is_parameter_name(&name) {
                    found.insert(name);
                }
            }
            _ => {}
        }
    }
    found
}
