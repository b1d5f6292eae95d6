// src/dsl/parser.rs
//
// =============================================================================
// ROBOGRAPH: DSL PARSER (v 0.1 )
// =============================================================================
//
// Recursive descent parser with precedence climbing for expressions.
//
// Resilience contract: a parse failure never aborts the file. Each recovery
// point advances at least one token and wraps the failed span as an Opaque
// statement carrying the original source line, so the lowering stage can
// round-trip code it does not understand.
//
// Whitelisted calls (RobotContext.*, time.sleep, range, abs, min, max, sum,
// len, print) are recognized downstream; here everything parses as Call.

use crate::diagnostics::Diagnostic;
use crate::dsl::lexer::{Lexer, Token, TokenKind};
use crate::dsl::{ElifClause, Expr, Module, Number, Stmt};

/// Parser error with position info. Internal: recovery turns these into
/// diagnostics before `parse` returns.
#[derive(Debug, Clone)]
struct ParseError {
    message: String,
    line: usize,
    col: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            message: message.into(),
            line,
            col,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}:{}: {}", self.line, self.col, self.message)
    }
}

type PResult<T> = Result<T, ParseError>;

pub struct Parser {
    source_lines: Vec<String>,
    tokens: Vec<Token>,
    pos: usize,
    diags: Vec<Diagnostic>,
    eof: Token,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let source_lines = source.split('\n').map(str::to_string).collect();
        let tokens = match Lexer::new(source).tokenize() {
            Ok(tokens) => tokens,
            Err(e) => {
                // Fatal lex: the whole file becomes one opaque block.
                let mut diags = Vec::new();
                diags.push(Diagnostic::warning("E1001", format!("Lexer error: {e}")));
                return Self {
                    source_lines,
                    tokens: Vec::new(),
                    pos: 0,
                    diags,
                    eof: Token {
                        kind: TokenKind::Eof,
                        value: String::new(),
                        line: 0,
                        col: 0,
                    },
                };
            }
        };
        Self {
            source_lines,
            tokens,
            pos: 0,
            diags: Vec::new(),
            eof: Token {
                kind: TokenKind::Eof,
                value: String::new(),
                line: 0,
                col: 0,
            },
        }
    }

    /// Parse the source and return (module AST, diagnostics).
    pub fn parse(mut self) -> (Module, Vec<Diagnostic>) {
        // Empty token stream marks the lexer-failed path: the whole file
        // survives as one opaque block.
        if self.tokens.is_empty() {
            let code = self.source_lines.join("\n");
            return (
                Module {
                    body: vec![Stmt::Opaque { code, line: 1 }],
                },
                self.diags,
            );
        }

        let body = self.parse_block(true);
        (Module { body }, self.diags)
    }

    // ---------- Token stream helpers ----------

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        let tok = self.peek();
        if tok.kind != kind {
            return Err(ParseError::new(
                format!(
                    "Expected {:?}, got {:?} ({:?})",
                    kind, tok.kind, tok.value
                ),
                tok.line,
                tok.col,
            ));
        }
        Ok(self.advance())
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            return true;
        }
        false
    }

    /// Skip NEWLINE tokens, optionally collecting COMMENT tokens.
    fn skip_newlines(&mut self, collect: Option<&mut Vec<Stmt>>) {
        let mut sink = collect;
        loop {
            match self.peek_kind() {
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Comment => {
                    let tok = self.advance();
                    if let Some(stmts) = sink.as_mut() {
                        stmts.push(Stmt::Comment { text: tok.value });
                    }
                }
                _ => break,
            }
        }
    }

    // ---------- Block parsing ----------

    fn parse_block(&mut self, top_level: bool) -> Vec<Stmt> {
        let mut stmts: Vec<Stmt> = Vec::new();

        loop {
            self.skip_newlines(Some(&mut stmts));
            let kind = self.peek_kind();

            if kind == TokenKind::Eof {
                break;
            }
            if kind == TokenKind::Dedent && !top_level {
                self.advance();
                break;
            }
            if top_level && (kind == TokenKind::Dedent || kind == TokenKind::Indent) {
                // Recover from malformed top-level indentation by consuming it.
                self.diags.push(Diagnostic::warning(
                    "E1002",
                    format!("Unexpected {kind:?} at top level"),
                ));
                self.advance();
                continue;
            }

            match self.parse_statement() {
                Ok(Some(stmt)) => stmts.push(stmt),
                Ok(None) => {}
                Err(e) => {
                    self.diags
                        .push(Diagnostic::warning("E1002", format!("Parse error: {e}")));
                    if let Some(opaque) = self.recover_to_newline() {
                        stmts.push(opaque);
                    }
                }
            }
        }

        stmts
    }

    /// Skip tokens until the next NEWLINE, producing an Opaque statement
    /// holding the original stripped source line. Guarantees forward
    /// progress even when recovery starts on an indentation token.
    fn recover_to_newline(&mut self) -> Option<Stmt> {
        let line = self.peek().line;
        let start_pos = self.pos;
        let mut parts: Vec<String> = Vec::new();

        while !matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent
        ) {
            parts.push(self.advance().value);
        }

        if self.pos == start_pos
            && matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Indent)
        {
            self.advance();
        }

        if self.peek_kind() == TokenKind::Newline {
            self.advance();
        }

        if parts.is_empty() {
            return None;
        }

        let code = if line >= 1 && line <= self.source_lines.len() {
            self.source_lines[line - 1].trim().to_string()
        } else {
            parts.join(" ")
        };
        Some(Stmt::Opaque { code, line })
    }

    // ---------- Statement parsing ----------

    fn parse_statement(&mut self) -> PResult<Option<Stmt>> {
        let tok = self.peek().clone();

        match tok.kind {
            TokenKind::Comment => {
                self.advance();
                Ok(Some(Stmt::Comment { text: tok.value }))
            }
            TokenKind::Newline => {
                self.advance();
                Ok(None)
            }
            TokenKind::If => self.parse_if().map(Some),
            TokenKind::While => self.parse_while().map(Some),
            TokenKind::For => self.parse_for().map(Some),
            TokenKind::Def => self.parse_def().map(Some),
            TokenKind::Pass => {
                self.advance();
                self.matches(TokenKind::Newline);
                Ok(Some(Stmt::Pass))
            }
            TokenKind::Return => self.parse_return().map(Some),
            TokenKind::Break => {
                self.advance();
                self.matches(TokenKind::Newline);
                Ok(Some(Stmt::Break))
            }
            TokenKind::Continue => {
                self.advance();
                self.matches(TokenKind::Newline);
                Ok(Some(Stmt::Continue))
            }
            TokenKind::Import | TokenKind::From => self.parse_import().map(Some),
            _ => self.parse_assignment_or_expr().map(Some),
        }
    }

    /// Parse `name = expr`, an augmented assignment, or an expression
    /// statement.
    fn parse_assignment_or_expr(&mut self) -> PResult<Stmt> {
        let tok = self.peek().clone();
        let line = tok.line;

        if tok.kind == TokenKind::Identifier {
            if let Some(next) = self.tokens.get(self.pos + 1) {
                let aug = match next.kind {
                    TokenKind::Assign => Some(None),
                    TokenKind::PlusAssign => Some(Some("+")),
                    TokenKind::MinusAssign => Some(Some("-")),
                    TokenKind::StarAssign => Some(Some("*")),
                    TokenKind::SlashAssign => Some(Some("/")),
                    _ => None,
                };
                if let Some(op) = aug {
                    let name_tok = self.advance();
                    self.advance(); // the assignment operator
                    let value = self.parse_expression()?;
                    self.matches(TokenKind::Newline);

                    let value = match op {
                        None => value,
                        // x += 1 desugars to x = x + 1
                        Some(op_str) => Expr::Binary {
                            left: Box::new(Expr::Ident(name_tok.value.clone())),
                            op: op_str.to_string(),
                            right: Box::new(value),
                        },
                    };
                    return Ok(Stmt::Assign {
                        target: name_tok.value,
                        value,
                        line,
                    });
                }
            }
        }

        let expr = self.parse_expression()?;
        self.matches(TokenKind::Newline);
        Ok(Stmt::Expr { expr, line })
    }

    // ---------- Control flow ----------

    fn parse_if(&mut self) -> PResult<Stmt> {
        let tok = self.expect(TokenKind::If)?;
        let condition = self.parse_condition_resilient(tok.line, tok.col);
        self.matches(TokenKind::Newline);

        let body = self.parse_indented_body()?;

        let mut elifs: Vec<ElifClause> = Vec::new();
        let mut else_body: Vec<Stmt> = Vec::new();

        while self.peek_kind() == TokenKind::Elif {
            let elif_tok = self.advance();
            let elif_cond = self.parse_condition_resilient(elif_tok.line, elif_tok.col);
            self.matches(TokenKind::Newline);
            let elif_body = self.parse_indented_body()?;
            elifs.push(ElifClause {
                condition: elif_cond,
                body: elif_body,
            });
        }

        if self.peek_kind() == TokenKind::Else {
            self.advance();
            self.matches(TokenKind::Colon);
            self.matches(TokenKind::Newline);
            else_body = self.parse_indented_body()?;
        }

        Ok(Stmt::If {
            condition,
            body,
            elifs,
            else_body,
            line: tok.line,
        })
    }

    /// Parse a condition expression, recovering if it fails.
    ///
    /// First tries normal expression parsing followed by the colon. On
    /// failure, rewinds and collects raw tokens up to ':' as an identifier
    /// so the user's text survives (e.g. unquoted prose conditions).
    fn parse_condition_resilient(&mut self, _line: usize, _col: usize) -> Expr {
        let saved_pos = self.pos;
        let attempt = (|| -> PResult<Expr> {
            let condition = self.parse_expression()?;
            self.expect(TokenKind::Colon)?;
            Ok(condition)
        })();

        match attempt {
            Ok(condition) => condition,
            Err(_) => {
                self.pos = saved_pos;
                let mut parts: Vec<String> = Vec::new();
                while !matches!(
                    self.peek_kind(),
                    TokenKind::Colon | TokenKind::Newline | TokenKind::Eof
                ) {
                    parts.push(self.advance().value);
                }
                let mut raw_text = parts.join(" ").trim().to_string();
                if raw_text.is_empty() {
                    raw_text = "condition".to_string();
                }
                self.diags.push(Diagnostic::warning(
                    "W1003",
                    format!(
                        "Condition expression '{raw_text}' could not be fully parsed; preserved as raw text"
                    ),
                ));
                self.matches(TokenKind::Colon);
                Expr::Ident(raw_text)
            }
        }
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let tok = self.expect(TokenKind::While)?;
        let condition = self.parse_condition_resilient(tok.line, tok.col);
        self.matches(TokenKind::Newline);

        let body = self.parse_indented_body()?;

        Ok(Stmt::While {
            condition,
            body,
            line: tok.line,
        })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let tok = self.expect(TokenKind::For)?;
        let var_tok = self.expect(TokenKind::Identifier)?;
        self.expect(TokenKind::In)?;

        let mut start = Expr::Number(Number::Int(0));
        let mut end = Expr::Number(Number::Int(10));
        let mut step = Expr::Number(Number::Int(1));

        let range_tok = self.peek().clone();
        if range_tok.kind == TokenKind::Identifier && range_tok.value == "range" {
            self.advance();
            self.expect(TokenKind::LParen)?;
            let args = self.parse_call_args()?;

            match args.len() {
                0 => {}
                1 => {
                    end = args.into_iter().next().unwrap();
                }
                2 => {
                    let mut it = args.into_iter();
                    start = it.next().unwrap();
                    end = it.next().unwrap();
                }
                _ => {
                    let mut it = args.into_iter();
                    start = it.next().unwrap();
                    end = it.next().unwrap();
                    step = it.next().unwrap();
                }
            }
        } else {
            // Not a range() call; keep the defaults and skip to the colon.
            self.diags.push(Diagnostic::warning(
                "E1003",
                format!(
                    "Only 'for x in range(...)' is supported; found 'for {} in {}...'",
                    var_tok.value, range_tok.value
                ),
            ));
            while !matches!(
                self.peek_kind(),
                TokenKind::Colon | TokenKind::Newline | TokenKind::Eof
            ) {
                self.advance();
            }
        }

        self.expect(TokenKind::Colon)?;
        self.matches(TokenKind::Newline);
        let body = self.parse_indented_body()?;

        Ok(Stmt::ForRange {
            variable: var_tok.value,
            start,
            end,
            step,
            body,
            line: tok.line,
        })
    }

    /// Function definitions are captured so the lowering stage can locate
    /// the `execute_workflow` entry; parameters are skipped.
    fn parse_def(&mut self) -> PResult<Stmt> {
        let tok = self.expect(TokenKind::Def)?;
        let name_tok = self.expect(TokenKind::Identifier)?;

        while !matches!(
            self.peek_kind(),
            TokenKind::Colon | TokenKind::Newline | TokenKind::Eof
        ) {
            self.advance();
        }
        self.matches(TokenKind::Colon);
        self.matches(TokenKind::Newline);

        let body = self.parse_indented_body()?;

        self.diags.push(Diagnostic::info(
            "I4004",
            format!(
                "Function definition '{}' captured (may contain workflow entry)",
                name_tok.value
            ),
        ));

        Ok(Stmt::Def {
            name: name_tok.value,
            body,
            line: tok.line,
        })
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        self.advance(); // consume 'return'
        let value = if matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent
        ) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.matches(TokenKind::Newline);
        Ok(Stmt::Return { value })
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        let is_from = self.peek_kind() == TokenKind::From;

        let mut parts: Vec<String> = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof) {
            parts.push(self.advance().value);
        }
        self.matches(TokenKind::Newline);

        if is_from {
            // from X import Y, Z -- parts: ['from', 'X', 'import', 'Y', ',', 'Z']
            let mut module = String::new();
            let mut names: Vec<String> = Vec::new();
            let mut state = "from";
            for p in &parts {
                match p.as_str() {
                    "from" => state = "module",
                    "import" => state = "names",
                    "," => {}
                    other => match state {
                        "module" => {
                            if module.is_empty() {
                                module = other.to_string();
                            } else {
                                module = format!("{module}.{other}");
                            }
                        }
                        "names" => names.push(other.to_string()),
                        _ => {}
                    },
                }
            }
            Ok(Stmt::Import {
                module,
                names,
                is_from: true,
            })
        } else {
            let module = parts.get(1).cloned().unwrap_or_default();
            Ok(Stmt::Import {
                module,
                names: Vec::new(),
                is_from: false,
            })
        }
    }

    // ---------- Indented body ----------

    /// Parse an indented block (INDENT ... DEDENT), or a single inline
    /// statement for one-liners like `if True: pass`.
    fn parse_indented_body(&mut self) -> PResult<Vec<Stmt>> {
        self.skip_newlines(None);

        if self.peek_kind() == TokenKind::Indent {
            self.advance();
            return Ok(self.parse_block(false));
        }

        let mut stmts = Vec::new();
        if let Some(stmt) = self.parse_statement()? {
            stmts.push(stmt);
        }
        Ok(stmts)
    }

    // ---------- Expression parsing (precedence climbing) ----------

    fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and_expr()?;
        while self.peek_kind() == TokenKind::Or {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::BoolOp {
                left: Box::new(left),
                op: "or".to_string(),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_not_expr()?;
        while self.peek_kind() == TokenKind::And {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::BoolOp {
                left: Box::new(left),
                op: "and".to_string(),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> PResult<Expr> {
        if self.peek_kind() == TokenKind::Not {
            self.advance();
            let operand = self.parse_not_expr()?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut left = self.parse_addition()?;
        while matches!(
            self.peek_kind(),
            TokenKind::Eq
                | TokenKind::Neq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Lte
                | TokenKind::Gte
        ) {
            let op_tok = self.advance();
            let right = self.parse_addition()?;
            left = Expr::Compare {
                left: Box::new(left),
                op: op_tok.value,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_addition(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplication()?;
        while matches!(self.peek_kind(), TokenKind::Plus | TokenKind::Minus) {
            let op_tok = self.advance();
            let right = self.parse_multiplication()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: op_tok.value,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplication(&mut self) -> PResult<Expr> {
        let mut left = self.parse_power()?;
        while matches!(
            self.peek_kind(),
            TokenKind::Star | TokenKind::Slash | TokenKind::DoubleSlash | TokenKind::Percent
        ) {
            let op_tok = self.advance();
            let right = self.parse_power()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: op_tok.value,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        while self.peek_kind() == TokenKind::DoubleStar {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: "**".to_string(),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if matches!(self.peek_kind(), TokenKind::Minus | TokenKind::Plus) {
            let op_tok = self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: op_tok.value,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.peek().clone();

        match tok.kind {
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Integer => {
                self.advance();
                let value: i64 = tok.value.parse().map_err(|_| {
                    ParseError::new(
                        format!("Invalid integer literal: {:?}", tok.value),
                        tok.line,
                        tok.col,
                    )
                })?;
                Ok(Expr::Number(Number::Int(value)))
            }
            TokenKind::Float => {
                self.advance();
                let value: f64 = tok.value.parse().map_err(|_| {
                    ParseError::new(
                        format!("Invalid float literal: {:?}", tok.value),
                        tok.line,
                        tok.col,
                    )
                })?;
                Ok(Expr::Number(Number::Float(value)))
            }
            TokenKind::Str => {
                self.advance();
                Ok(Expr::Str(tok.value))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::None => {
                self.advance();
                Ok(Expr::Ident("None".to_string()))
            }
            TokenKind::Identifier => self.parse_identifier_or_call(),
            _ => Err(ParseError::new(
                format!("Unexpected token: {:?} ({:?})", tok.kind, tok.value),
                tok.line,
                tok.col,
            )),
        }
    }

    /// Parse identifier, dotted attribute chain, or function call.
    fn parse_identifier_or_call(&mut self) -> PResult<Expr> {
        let tok = self.advance();
        let mut node = Expr::Ident(tok.value);

        while self.peek_kind() == TokenKind::Dot {
            self.advance();
            let attr_tok = self.expect(TokenKind::Identifier)?;
            node = Expr::Attribute {
                object: Box::new(node),
                attribute: attr_tok.value,
            };
        }

        if self.peek_kind() == TokenKind::LParen {
            self.advance();
            let args = self.parse_call_args()?;
            node = Expr::Call {
                func: Box::new(node),
                args,
            };
        }

        // Index access: consumed but not modeled.
        if self.peek_kind() == TokenKind::LBracket {
            self.advance();
            while !matches!(
                self.peek_kind(),
                TokenKind::RBracket | TokenKind::Eof | TokenKind::Newline
            ) {
                self.advance();
            }
            self.matches(TokenKind::RBracket);
        }

        Ok(node)
    }

    /// Parse call arguments; the closing paren is consumed.
    fn parse_call_args(&mut self) -> PResult<Vec<Expr>> {
        let mut args: Vec<Expr> = Vec::new();
        if self.peek_kind() == TokenKind::RParen {
            self.advance();
            return Ok(args);
        }

        args.push(self.parse_expression()?);
        while self.peek_kind() == TokenKind::Comma {
            self.advance();
            if self.peek_kind() == TokenKind::RParen {
                break;
            }
            args.push(self.parse_expression()?);
        }

        self.expect(TokenKind::RParen)?;
        Ok(args)
    }
}
