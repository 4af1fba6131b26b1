//! Evaluates one request against the access policy.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use dashgate_policy::{AccessContext, DataAccessRequest, Decision, PolicyCore, ResourceDescriptor};
use serde::Serialize;

use crate::style::{self, colors::SemanticStyle};

#[derive(Serialize)]
struct CheckReport<'a> {
    context: &'a AccessContext,
    resource: &'a ResourceDescriptor,
    decision: Decision,
    /// Absent when access is denied.
    request: Option<DataAccessRequest>,
}

pub fn run(
    project: &Path,
    headers: Vec<(String, String)>,
    resource: &ResourceDescriptor,
    json: bool,
) -> Result<()> {
    let config = super::load_config(project)?;
    let policy = config.validate().context("Invalid configuration")?;
    let core = PolicyCore::new(policy);

    let headers: HashMap<String, Option<String>> = headers
        .into_iter()
        .map(|(name, value)| (name, Some(value)))
        .collect();

    let context = core.extract(&headers);
    let decision = core.engine().decide(&context, resource);
    let request = decision.allowed.then(|| core.rewrite(&context, resource));

    let report = CheckReport {
        context: &context,
        resource,
        decision,
        request,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &CheckReport<'_>) {
    let context = report.context;

    style::print_header("Context");
    style::print_labeled("Identity", context.identity());
    style::print_labeled("Role", &context.role().to_string());
    for (name, value) in context.attributes() {
        style::print_labeled(name, value.as_deref().unwrap_or("(none)"));
    }
    println!();

    style::print_header("Decision");
    style::print_labeled("Resource", &report.resource.to_string());
    let verdict = format!("{} ({})", verdict(report.decision), report.decision.reason);
    if report.decision.allowed {
        style::print_success(&verdict);
    } else {
        style::print_failure(&verdict);
    }
    println!();

    let Some(request) = &report.request else {
        return;
    };

    style::print_header("Request");
    if let Some(call) = request.procedural_call() {
        style::print_labeled("Procedure", &call.name().code());
        for (name, value) in call.parameters() {
            style::print_labeled(&format!("@{name}"), &format!("{value:?}"));
        }
    } else if let Some(query) = request.rewritten_filter() {
        style::print_labeled("Filter", &query.sql().code());
        for binding in query.bindings() {
            style::print_labeled(&format!("@{}", binding.name), &format!("{:?}", binding.value));
        }
    } else {
        style::print_labeled("Pass-through", "executed unmodified");
    }
}

fn verdict(decision: Decision) -> &'static str {
    if decision.allowed { "allowed" } else { "denied" }
}
