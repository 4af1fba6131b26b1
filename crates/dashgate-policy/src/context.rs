//! Request context extraction.
//!
//! Turns inbound header metadata into an [`AccessContext`]. Extraction never
//! fails: a request without an identity is served as the configured default
//! identity, which always resolves to the lowest-privilege role.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::policy::{Policy, ValueSource};
use crate::roles::Role;

/// Identity, role and attributes of one inbound request.
///
/// Immutable once built. The role is derived from the identity during
/// extraction and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessContext {
    identity: String,
    role: Role,
    attributes: BTreeMap<String, Option<String>>,
}

impl AccessContext {
    /// Never empty.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Attribute value, or `None` when the header was absent or empty.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Option::as_deref)
    }

    /// All configured attributes, including absent ones.
    pub fn attributes(&self) -> &BTreeMap<String, Option<String>> {
        &self.attributes
    }

    /// Value bound for `source`. An absent attribute binds as the empty
    /// string, which matches no key in the backing tables.
    pub fn value_of(&self, source: &ValueSource) -> &str {
        match source {
            ValueSource::Identity => &self.identity,
            ValueSource::Attribute(name) => self.attribute(name).unwrap_or(""),
        }
    }
}

/// Builds [`AccessContext`] values from request headers.
#[derive(Debug, Clone)]
pub struct RequestContextExtractor {
    policy: Arc<Policy>,
}

impl RequestContextExtractor {
    pub fn new(policy: Arc<Policy>) -> Self {
        Self { policy }
    }

    /// Derives the context for one request.
    ///
    /// Header names are matched case-insensitively and values are trimmed.
    /// A missing, empty or blank identity header yields the default identity.
    pub fn extract<S: BuildHasher>(
        &self,
        headers: &HashMap<String, Option<String>, S>,
    ) -> AccessContext {
        let config = self.policy.headers();

        let identity = match header_value(headers, &config.identity) {
            Some(identity) => identity.to_string(),
            None => {
                trace!(header = %config.identity, "Identity header absent, using default identity");
                self.policy.default_identity().to_string()
            }
        };

        let attributes = config
            .attributes
            .iter()
            .map(|attribute| {
                (
                    attribute.name.clone(),
                    header_value(headers, &attribute.header).map(str::to_string),
                )
            })
            .collect();

        let role = self.policy.resolver().resolve(&identity);

        AccessContext {
            identity,
            role,
            attributes,
        }
    }
}

/// Looks up a header case-insensitively and returns its trimmed value.
///
/// Spellings without a value or with a blank value are skipped. When several
/// keys differing only in case carry a value, the lexicographically smallest
/// key wins, so lookups do not depend on map iteration order.
fn header_value<'h, S: BuildHasher>(
    headers: &'h HashMap<String, Option<String>, S>,
    name: &str,
) -> Option<&'h str> {
    headers
        .iter()
        .filter(|(key, _)| key.eq_ignore_ascii_case(name))
        .filter_map(|(key, value)| {
            let value = value.as_deref()?.trim();
            (!value.is_empty()).then_some((key, value))
        })
        .min_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, value)| value)
}
