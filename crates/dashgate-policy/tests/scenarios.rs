//! End-to-end request scenarios through the three call points.

use std::collections::HashMap;

use dashgate_policy::{PolicyConfig, PolicyCore, ResourceDescriptor, Role};

fn core() -> PolicyCore {
    let policy = PolicyConfig::default()
        .validate()
        .expect("default policy is valid");
    PolicyCore::new(policy).without_audit()
}

fn headers(pairs: &[(&str, &str)]) -> HashMap<String, Option<String>> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), Some((*v).to_string())))
        .collect()
}

#[test]
fn elevated_customer_sees_any_table() {
    let core = core();
    let context = core.extract(&headers(&[("x-customer-id", "AROUT")]));

    assert_eq!(context.role(), Role::Admin);
    assert!(core.is_allowed(&context, &ResourceDescriptor::table("AnyTable")));
    assert!(core.is_allowed(&context, &ResourceDescriptor::table("Employees")));
}

#[test]
fn anonymous_request_is_default_customer() {
    let core = core();
    let context = core.extract(&HashMap::new());

    assert_eq!(context.identity(), "ALFKI");
    assert_eq!(context.role(), Role::User);
    assert!(core.is_allowed(&context, &ResourceDescriptor::table("Customers")));
    assert!(!core.is_allowed(&context, &ResourceDescriptor::table("Employees")));
}

#[test]
fn dashboard_session_for_regular_customer() {
    let core = core();
    let context = core.extract(&headers(&[
        ("X-Customer-Id", "ANTON"),
        ("X-Order-Id", "10365"),
    ]));

    // Item enumeration: only allowed tables survive.
    let visible = core
        .engine()
        .filter_tables(&context, ["Customers", "Employees", "Orders", "Suppliers"]);
    assert_eq!(visible, vec!["Customers", "Orders"]);

    // Table access is narrowed to the customer's rows.
    let orders = core.rewrite(&context, &ResourceDescriptor::table("Orders"));
    let filter = orders.rewritten_filter().expect("Orders is row-level secured");
    assert_eq!(filter.binding("CustomerID"), Some("ANTON"));

    // Procedure items are bound to the customer.
    let history = core.rewrite(&context, &ResourceDescriptor::procedure("CustOrderHist"));
    let call = history.procedural_call().expect("CustOrderHist is bound");
    assert_eq!(call.parameters()["CustomerID"], "ANTON");

    // Procedures are not gated by table rules.
    assert!(core.is_allowed(&context, &ResourceDescriptor::procedure("CustOrderHist")));
}

#[test]
fn elevated_customer_is_still_row_filtered() {
    let core = core();
    let context = core.extract(&headers(&[("x-customer-id", "BLONP")]));

    let request = core.rewrite(&context, &ResourceDescriptor::table("Customers"));
    assert_eq!(
        request.rewritten_filter().and_then(|f| f.binding("CustomerID")),
        Some("BLONP")
    );
}

#[test]
fn custom_rule_set_from_toml_shape() {
    let config: PolicyConfig = serde_json::from_value(serde_json::json!({
        "default_identity": "GUEST",
        "elevated_identities": ["ROOT"],
        "rules": [{ "role": "User", "allowed_resources": ["Products"] }],
        "procedures": [],
        "custom_queries": [{
            "resource_id": "MyOrder",
            "sql": "SELECT * FROM Orders WHERE OrderID = @OrderID AND CustomerID = @Customer",
            "parameters": [
                { "name": "OrderID", "source": "attribute:order_id" },
                { "name": "Customer", "source": "identity" }
            ]
        }],
        "row_level_security": []
    }))
    .expect("policy deserializes");
    let core = PolicyCore::new(config.validate().expect("policy is valid")).without_audit();

    let context = core.extract(&headers(&[("x-order-id", "10248")]));
    assert_eq!(context.identity(), "GUEST");
    assert!(core.is_allowed(&context, &ResourceDescriptor::table("Products")));
    assert!(!core.is_allowed(&context, &ResourceDescriptor::table("Orders")));

    let request = core.rewrite(&context, &ResourceDescriptor::custom_query("MyOrder"));
    let query = request.rewritten_filter().expect("MyOrder is bound");
    assert_eq!(query.binding("OrderID"), Some("10248"));
    assert_eq!(query.binding("Customer"), Some("GUEST"));
    assert!(core.rewrite(&context, &ResourceDescriptor::table("Orders")).is_pass_through());
}
