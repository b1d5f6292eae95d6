// Registry reset lives in its own test binary: reset clears process-wide
// state, which would race with the other suites' registry reads.

use robograph::schema::SchemaRegistry;

#[test]
fn test_reset_reloads_builtins_on_next_access() {
    assert!(!SchemaRegistry::list_schema_ids().is_empty());

    SchemaRegistry::reset();

    // Next access triggers a fresh builtin load.
    let ids = SchemaRegistry::list_schema_ids();
    assert!(ids.contains(&"builtin.action_execution".to_string()));

    // A second reset drops registrations made in between.
    SchemaRegistry::register(robograph::schema::NodeSchema {
        schema_id: "test.transient".to_string(),
        display_name: "Transient".to_string(),
        node_type: "transient".to_string(),
        kind: "custom".to_string(),
        ports: Vec::new(),
        parameters: Vec::new(),
        code_template: String::new(),
        robot_compat: Vec::new(),
        safety: Default::default(),
        version: "1.0".to_string(),
    });
    assert!(SchemaRegistry::get("test.transient").is_some());
    SchemaRegistry::reset();
    assert!(SchemaRegistry::get("test.transient").is_none());
}
