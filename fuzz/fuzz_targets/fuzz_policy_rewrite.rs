#![no_main]

use std::collections::HashMap;
use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;

use dashgate_policy::{PolicyConfig, PolicyCore, ResourceDescriptor};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;

fn core() -> &'static PolicyCore {
    static CORE: OnceLock<PolicyCore> = OnceLock::new();
    CORE.get_or_init(|| {
        let policy = PolicyConfig::default()
            .validate()
            .expect("default policy is valid");
        PolicyCore::new(policy).without_audit()
    })
}

/// Headers are `name=value` lines; a line without `=` is a header with no value.
fn headers_from(text: &str) -> HashMap<String, Option<String>> {
    text.lines()
        .map(|line| match line.split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (line.to_string(), None),
        })
        .collect()
}

fn resource_from(selector: u8, name: &str) -> ResourceDescriptor {
    let name = if selector & 0x80 != 0 {
        // Steer half the inputs to configured items.
        ["Orders", "Customers", "CustOrderHist", "CustomerOrders"][usize::from(selector & 0x03)]
    } else {
        name
    };
    match selector % 3 {
        0 => ResourceDescriptor::table(name),
        1 => ResourceDescriptor::procedure(name),
        _ => ResourceDescriptor::custom_query(name),
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let selector = data[0];
    let split = (data[1] as usize).min(data.len() - 2);
    let (name, headers) = data[2..].split_at(split);

    let (Ok(name), Ok(headers)) = (std::str::from_utf8(name), std::str::from_utf8(headers)) else {
        return;
    };

    let core = core();
    let context = core.extract(&headers_from(headers));

    // 1. Identity is never empty and role follows from it.
    assert!(!context.identity().is_empty());
    assert_eq!(
        context.role(),
        core.engine().policy().resolver().resolve(context.identity())
    );

    let resource = resource_from(selector, name);
    let request = core.rewrite(&context, &resource);

    // 2. Never both variants.
    assert!(request.procedural_call().is_none() || request.rewritten_filter().is_none());

    // 3. Deterministic.
    assert_eq!(request, core.rewrite(&context, &resource));

    // 4. Row filters are fixed text; the identity only travels as a binding.
    if let (ResourceDescriptor::Table { name }, Some(filter)) =
        (&resource, request.rewritten_filter())
    {
        let anonymous = core.extract(&HashMap::<String, Option<String>>::new());
        let reference = core.rewrite(&anonymous, &resource);
        let reference = reference.rewritten_filter().expect("same table is row filtered");
        assert_eq!(filter.sql(), reference.sql());

        let sql = format!("SELECT * FROM \"{name}\" WHERE {}", filter.sql());
        if let Ok(statements) = Parser::parse_sql(&MsSqlDialect {}, &sql) {
            assert_eq!(statements.len(), 1);
        }
        assert_eq!(filter.binding("CustomerID"), Some(context.identity()));
    }
});
