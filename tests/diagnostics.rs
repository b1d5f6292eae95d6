// Diagnostic value type and the stable code directory.

use robograph::diagnostics::{all_codes, code_entry, is_clean, Diagnostic};
use robograph::DiagnosticLevel;

#[test]
fn test_display_with_line_location() {
    let d = Diagnostic::error("E1002", "Parse error: unexpected token").at_line(3, 7);
    assert_eq!(
        d.to_string(),
        "[E1002] ERROR (line 3): Parse error: unexpected token"
    );
}

#[test]
fn test_display_with_node_location() {
    let d = Diagnostic::warning("E2007", "incompatible robot").at_node("4");
    assert_eq!(d.to_string(), "[E2007] WARN (node 4): incompatible robot");
}

#[test]
fn test_levels_serialize_to_wire_names() {
    assert_eq!(DiagnosticLevel::Error.as_str(), "error");
    assert_eq!(DiagnosticLevel::Warning.as_str(), "warn");
    assert_eq!(DiagnosticLevel::Info.as_str(), "info");
}

#[test]
fn test_suggestion_round_trips_through_json() {
    let d = Diagnostic::error("E2001", "Unknown schema: x.y")
        .with_suggestion("Available schemas: builtin.if");
    let json = serde_json::to_string(&d).unwrap();
    let back: Diagnostic = serde_json::from_str(&json).unwrap();
    assert_eq!(back.suggestion, "Available schemas: builtin.if");
    assert_eq!(back, d);
}

#[test]
fn test_is_clean_considers_only_errors() {
    let diags = vec![
        Diagnostic::warning("W3001", "skipped edge"),
        Diagnostic::info("I4001", "summary"),
    ];
    assert!(is_clean(&diags));

    let with_error = vec![Diagnostic::error("E2005", "dangling edge")];
    assert!(!is_clean(&with_error));
}

#[test]
fn test_code_directory_lookup() {
    let entry = code_entry("E1005").expect("E1005 registered");
    assert_eq!(entry.category, "syntax");
    assert_eq!(entry.severity, "error");

    assert!(code_entry("E9999").is_none());
}

#[test]
fn test_code_directory_covers_emitted_codes() {
    for code in [
        "E1001", "E1002", "E1003", "E1005", "W1003", "E2001", "E2003", "E2004", "E2005",
        "E2007", "W2001", "W2002", "W3001", "W3002", "W3003", "W3005", "I4001", "I4002",
        "I4003", "I4004",
    ] {
        assert!(code_entry(code).is_some(), "missing directory entry {code}");
    }
}

#[test]
fn test_code_prefixes_match_categories() {
    for entry in all_codes() {
        match &entry.code[..2] {
            "E1" => assert_eq!(entry.category, "syntax"),
            "W1" => assert_eq!(entry.category, "syntax"),
            "E2" => assert_eq!(entry.category, "semantic"),
            "I4" => assert!(matches!(entry.category, "codegen" | "lowering" | "parser")),
            _ => {}
        }
    }
}
