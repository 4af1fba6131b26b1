#![no_main]

use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;

use dashgate_policy::{PolicyConfig, PolicyCore, ResourceDescriptor};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = toml::from_str::<PolicyConfig>(text) else {
        return;
    };
    let Ok(policy) = config.validate() else {
        return;
    };

    // A validated policy must serve every configured item without panicking.
    let core = PolicyCore::new(policy).without_audit();
    let context = core.extract(&HashMap::<String, Option<String>>::new());
    assert!(!context.identity().is_empty());

    let resources = config
        .procedures
        .iter()
        .map(|binding| ResourceDescriptor::procedure(binding.resource_id.as_str()))
        .chain(
            config
                .custom_queries
                .iter()
                .map(|binding| ResourceDescriptor::custom_query(binding.resource_id.as_str())),
        )
        .chain(
            config
                .row_level_security
                .iter()
                .map(|rls| ResourceDescriptor::table(rls.table.as_str())),
        );

    for resource in resources {
        let _ = core.is_allowed(&context, &resource);
        let request = core.rewrite(&context, &resource);
        assert!(!request.is_pass_through(), "configured item {resource} was not rewritten");
    }
});
