// Lexer coverage: token inventory, indentation protocol, comments.

use robograph::dsl::{Lexer, TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    Lexer::new(source)
        .tokenize()
        .expect("lexing failed")
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

fn values_of(source: &str, kind: TokenKind) -> Vec<String> {
    Lexer::new(source)
        .tokenize()
        .expect("lexing failed")
        .into_iter()
        .filter(|t| t.kind == kind)
        .map(|t| t.value)
        .collect()
}

#[test]
fn test_empty_source() {
    let tokens = Lexer::new("").tokenize().unwrap();
    assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
}

#[test]
fn test_integer() {
    assert_eq!(values_of("42", TokenKind::Integer), vec!["42"]);
}

#[test]
fn test_float() {
    assert_eq!(values_of("3.14", TokenKind::Float), vec!["3.14"]);
}

#[test]
fn test_string_single_quotes() {
    assert_eq!(values_of("'hello'", TokenKind::Str), vec!["hello"]);
}

#[test]
fn test_string_double_quotes() {
    assert_eq!(values_of("\"world\"", TokenKind::Str), vec!["world"]);
}

#[test]
fn test_string_escapes() {
    assert_eq!(values_of(r"'a\nb\tc'", TokenKind::Str), vec!["a\nb\tc"]);
}

#[test]
fn test_keywords() {
    let source = "if elif else while for in def return pass break continue import from True False None and or not";
    let kinds: Vec<TokenKind> = kinds(source)
        .into_iter()
        .filter(|k| !matches!(k, TokenKind::Newline | TokenKind::Eof))
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::If,
            TokenKind::Elif,
            TokenKind::Else,
            TokenKind::While,
            TokenKind::For,
            TokenKind::In,
            TokenKind::Def,
            TokenKind::Return,
            TokenKind::Pass,
            TokenKind::Break,
            TokenKind::Continue,
            TokenKind::Import,
            TokenKind::From,
            TokenKind::True,
            TokenKind::False,
            TokenKind::None,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Not,
        ]
    );
}

#[test]
fn test_identifier() {
    assert_eq!(values_of("my_var", TokenKind::Identifier), vec!["my_var"]);
}

#[test]
fn test_operators() {
    let source = "+ - * / ** % // == != < > <= >= = += -= *= /=";
    let kinds: Vec<TokenKind> = kinds(source)
        .into_iter()
        .filter(|k| !matches!(k, TokenKind::Newline | TokenKind::Eof))
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::DoubleStar,
            TokenKind::Percent,
            TokenKind::DoubleSlash,
            TokenKind::Eq,
            TokenKind::Neq,
            TokenKind::Lt,
            TokenKind::Gt,
            TokenKind::Lte,
            TokenKind::Gte,
            TokenKind::Assign,
            TokenKind::PlusAssign,
            TokenKind::MinusAssign,
            TokenKind::StarAssign,
            TokenKind::SlashAssign,
        ]
    );
}

#[test]
fn test_delimiters() {
    let source = "( ) [ ] , : .";
    let kinds: Vec<TokenKind> = kinds(source)
        .into_iter()
        .filter(|k| !matches!(k, TokenKind::Newline | TokenKind::Eof))
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::LBracket,
            TokenKind::RBracket,
            TokenKind::Comma,
            TokenKind::Colon,
            TokenKind::Dot,
        ]
    );
}

// ---------- Indentation ----------

#[test]
fn test_simple_indent_dedent() {
    let kinds = kinds("if True:\n    pass");
    assert!(kinds.contains(&TokenKind::Indent));
    assert!(kinds.contains(&TokenKind::Dedent));
}

#[test]
fn test_nested_indent() {
    let kinds = kinds("if True:\n    if False:\n        pass");
    let indents = kinds.iter().filter(|&&k| k == TokenKind::Indent).count();
    let dedents = kinds.iter().filter(|&&k| k == TokenKind::Dedent).count();
    assert_eq!(indents, 2);
    assert_eq!(dedents, 2);
}

#[test]
fn test_indents_always_balanced() {
    let sources = [
        "if True:\n    if False:\n        pass\nx = 1",
        "while True:\n    pass\n",
        "def f():\n    if x:\n        y = 1\n    z = 2\n",
    ];
    for source in sources {
        let kinds = kinds(source);
        let indents = kinds.iter().filter(|&&k| k == TokenKind::Indent).count();
        let dedents = kinds.iter().filter(|&&k| k == TokenKind::Dedent).count();
        assert_eq!(indents, dedents, "unbalanced for {source:?}");
    }
}

#[test]
fn test_tabs_rejected_with_code() {
    let err = Lexer::new("if True:\n\tpass").tokenize().unwrap_err();
    assert_eq!(err.code, "E1005");
    assert_eq!(err.line, 2);
}

#[test]
fn test_tab_in_mixed_leading_whitespace() {
    let err = Lexer::new(" \tpass").tokenize().unwrap_err();
    assert_eq!(err.code, "E1005");
}

#[test]
fn test_blank_lines_do_not_disturb_stack() {
    let kinds = kinds("if True:\n    pass\n\n    pass\n");
    let indents = kinds.iter().filter(|&&k| k == TokenKind::Indent).count();
    assert_eq!(indents, 1);
}

// ---------- Comments ----------

#[test]
fn test_comment_line() {
    let comments = values_of("# This is a comment\nx = 1", TokenKind::Comment);
    assert_eq!(comments, vec!["This is a comment"]);
}

#[test]
fn test_inline_comment() {
    let comments = values_of("x = 1  # inline comment", TokenKind::Comment);
    assert_eq!(comments, vec!["inline comment"]);
}

// ---------- Realistic sources ----------

#[test]
fn test_function_call() {
    let ids = values_of("RobotContext.run_action('stand')", TokenKind::Identifier);
    assert!(ids.contains(&"RobotContext".to_string()));
    assert!(ids.contains(&"run_action".to_string()));
    let strings = values_of("RobotContext.run_action('stand')", TokenKind::Str);
    assert_eq!(strings, vec!["stand"]);
}

#[test]
fn test_for_range_header() {
    let kinds: Vec<TokenKind> = kinds("for i in range(0, 5, 1):")
        .into_iter()
        .filter(|k| !matches!(k, TokenKind::Newline | TokenKind::Eof))
        .collect();
    assert_eq!(kinds[0], TokenKind::For);
    assert_eq!(kinds[1], TokenKind::Identifier);
    assert_eq!(kinds[2], TokenKind::In);
    assert_eq!(kinds[3], TokenKind::Identifier);
}

#[test]
fn test_multiline_workflow() {
    let source = "RobotContext.run_action('stand')\ntime.sleep(2.0)\nRobotContext.run_action('walk')";
    let strings = values_of(source, TokenKind::Str);
    assert_eq!(strings, vec!["stand", "walk"]);
}

#[test]
fn test_triple_quoted_docstring_single_line() {
    let strings = values_of("'''Execute the visual workflow'''", TokenKind::Str);
    assert_eq!(strings, vec!["Execute the visual workflow"]);
}
