use crate::ast::*;
use crate::errors::SyntaxError;
use crate::lexer::{Keyword, Lexer, Token, TokenKind};
use crate::source::SourceFile;

type Result<T> = std::result::Result<T, SyntaxError>;

/// Tokenizes and parses one source file.
pub fn parse(source: &SourceFile) -> Result<Module> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(source, tokens).parse()
}

#[derive(Copy, Clone, PartialEq, PartialOrd)]
enum Precedence {
    Lowest = 0,
    Coalesce,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equality,
    Relational,
    Shift,
    Additive,
    Multiplicative,
    Exponent,
}

impl Precedence {
    fn of(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::QuestionQuestion => Some(Precedence::Coalesce),
            TokenKind::PipePipe => Some(Precedence::Or),
            TokenKind::AmpersandAmpersand => Some(Precedence::And),
            TokenKind::Pipe => Some(Precedence::BitOr),
            TokenKind::Caret => Some(Precedence::BitXor),
            TokenKind::Ampersand => Some(Precedence::BitAnd),
            TokenKind::DoubleEqual
            | TokenKind::BangEqual
            | TokenKind::TripleEqual
            | TokenKind::BangDoubleEqual => Some(Precedence::Equality),
            TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::Keyword(Keyword::In)
            | TokenKind::Keyword(Keyword::Instanceof) => Some(Precedence::Relational),
            TokenKind::LessLess
            | TokenKind::GreaterGreater
            | TokenKind::GreaterGreaterGreater => Some(Precedence::Shift),
            TokenKind::Plus | TokenKind::Minus => Some(Precedence::Additive),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => {
                Some(Precedence::Multiplicative)
            }
            TokenKind::StarStar => Some(Precedence::Exponent),
            _ => None,
        }
    }
}

enum InfixOperator {
    Binary(BinaryOperator),
    Logical(LogicalOperator),
}

pub struct Parser<'a> {
    _source: &'a SourceFile,
    tokens: Vec<Token>,
    current: usize,
    next_node_id: u32,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a SourceFile, tokens: Vec<Token>) -> Self {
        Self {
            _source: source,
            tokens,
            current: 0,
            next_node_id: 0,
        }
    }

    fn span_from_token(token: &Token) -> SourceSpan {
        let len = token.lexeme.chars().count().max(1);
        SourceSpan::new(
            token.line,
            token.column,
            token.line,
            token.column + len.saturating_sub(1),
        )
    }

    fn union_spans(a: &SourceSpan, b: &SourceSpan) -> SourceSpan {
        SourceSpan::union(a, b)
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    fn make_expression(&mut self, span: SourceSpan, kind: ExpressionKind) -> Expression {
        Expression {
            id: self.node_id(),
            span,
            kind,
        }
    }

    fn make_statement(&mut self, span: SourceSpan, kind: StatementKind) -> Statement {
        Statement {
            id: self.node_id(),
            span,
            kind,
        }
    }

    fn make_identifier(&mut self, token: &Token) -> Identifier {
        Identifier {
            id: self.node_id(),
            name: token.lexeme.clone(),
            span: Self::span_from_token(token),
        }
    }

    pub fn parse(&mut self) -> Result<Module> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if matches!(self.peek_kind(), TokenKind::Semicolon) {
                self.advance();
                continue;
            }
            let statement = self.parse_statement()?;
            statements.push(statement);
        }

        Ok(Module::new(statements))
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.peek_kind() {
            TokenKind::Keyword(Keyword::Let | Keyword::Const | Keyword::Var) => {
                let declaration = self.parse_variable_declaration()?;
                self.consume_terminator()?;
                Ok(self.make_statement(declaration.span, StatementKind::Variable(declaration)))
            }
            TokenKind::Keyword(Keyword::Import) => self.parse_import(),
            TokenKind::Keyword(Keyword::Export) => self.parse_export(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::Function) => self.parse_function(),
            TokenKind::LBrace => {
                let (statements, span) = self.parse_braced_block()?;
                Ok(self.make_statement(span, StatementKind::Block(statements)))
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_variable_declaration(&mut self) -> Result<VariableDeclaration> {
        let keyword_token = self.advance().clone();
        let kind = match keyword_token.kind {
            TokenKind::Keyword(Keyword::Let) => DeclarationKind::Let,
            TokenKind::Keyword(Keyword::Const) => DeclarationKind::Const,
            _ => DeclarationKind::Var,
        };

        let mut span = Self::span_from_token(&keyword_token);
        let mut declarators = Vec::new();
        loop {
            let target = self.parse_binding_pattern()?;
            let init = if matches!(self.peek_kind(), TokenKind::Equal) {
                self.advance();
                Some(self.parse_assignment()?)
            } else {
                None
            };

            let declarator_span = match &init {
                Some(init) => Self::union_spans(&target.span, &init.span),
                None => target.span,
            };
            span = Self::union_spans(&span, &declarator_span);
            declarators.push(VariableDeclarator {
                id: self.node_id(),
                span: declarator_span,
                target,
                init,
            });

            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }

        Ok(VariableDeclaration {
            id: self.node_id(),
            span,
            kind,
            declarators,
        })
    }

    fn parse_binding_pattern(&mut self) -> Result<Pattern> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier => {
                self.advance();
                let identifier = self.make_identifier(&token);
                Ok(Pattern {
                    id: self.node_id(),
                    span: identifier.span,
                    kind: PatternKind::Identifier(identifier),
                })
            }
            TokenKind::LBrace => self.parse_object_pattern(),
            TokenKind::LBracket => self.parse_array_pattern(),
            _ => Err(self.unexpected(&token, "expected a binding name or pattern")),
        }
    }

    fn parse_object_pattern(&mut self) -> Result<Pattern> {
        let open_token = self.advance().clone();
        let mut properties = Vec::new();

        while !matches!(self.peek_kind(), TokenKind::RBrace) {
            let key_token = self.peek().clone();
            if !matches!(key_token.kind, TokenKind::Identifier) {
                return Err(self.unexpected(&key_token, "expected property name in pattern"));
            }
            self.advance();
            let key = self.make_identifier(&key_token);

            let value = if matches!(self.peek_kind(), TokenKind::Colon) {
                self.advance();
                self.parse_binding_pattern()?
            } else {
                let local = self.make_identifier(&key_token);
                Pattern {
                    id: self.node_id(),
                    span: local.span,
                    kind: PatternKind::Identifier(local),
                }
            };
            properties.push(PropertyPattern { key, value });

            if !self.consume_list_separator(TokenKind::RBrace, "expected ',' or '}' in pattern")? {
                break;
            }
        }

        self.expect_token(TokenKind::RBrace, "expected '}' to close object pattern")?;
        let span = Self::union_spans(&Self::span_from_token(&open_token), &self.previous_span());
        Ok(Pattern {
            id: self.node_id(),
            span,
            kind: PatternKind::Object(properties),
        })
    }

    fn parse_array_pattern(&mut self) -> Result<Pattern> {
        let open_token = self.advance().clone();
        let mut elements = Vec::new();

        while !matches!(self.peek_kind(), TokenKind::RBracket) {
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
                elements.push(None);
                continue;
            }
            elements.push(Some(self.parse_binding_pattern()?));
            if !self.consume_list_separator(TokenKind::RBracket, "expected ',' or ']' in pattern")? {
                break;
            }
        }

        self.expect_token(TokenKind::RBracket, "expected ']' to close array pattern")?;
        let span = Self::union_spans(&Self::span_from_token(&open_token), &self.previous_span());
        Ok(Pattern {
            id: self.node_id(),
            span,
            kind: PatternKind::Array(elements),
        })
    }

    fn parse_import(&mut self) -> Result<Statement> {
        let import_token = self.advance().clone();
        let mut specifiers = Vec::new();

        if !matches!(self.peek_kind(), TokenKind::StringLiteral(_)) {
            if matches!(self.peek_kind(), TokenKind::Identifier) {
                let local_token = self.advance().clone();
                let local = self.make_identifier(&local_token);
                specifiers.push(ImportSpecifier {
                    id: self.node_id(),
                    span: local.span,
                    local,
                    imported: ImportedName::Default,
                });
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                } else {
                    self.expect_contextual("from", "expected 'from' after import specifiers")?;
                    return self.finish_import(import_token, specifiers);
                }
            }

            match self.peek_kind() {
                TokenKind::Star => {
                    let star_token = self.advance().clone();
                    self.expect_contextual("as", "expected 'as' after '*' in import")?;
                    let local_token = self.expect_identifier("expected namespace name after 'as'")?;
                    let local = self.make_identifier(&local_token);
                    let span = Self::union_spans(&Self::span_from_token(&star_token), &local.span);
                    specifiers.push(ImportSpecifier {
                        id: self.node_id(),
                        span,
                        local,
                        imported: ImportedName::Namespace,
                    });
                }
                TokenKind::LBrace => {
                    self.advance();
                    self.parse_named_imports(&mut specifiers)?;
                }
                _ => {
                    let token = self.peek().clone();
                    return Err(self.unexpected(&token, "expected import specifiers"));
                }
            }
            self.expect_contextual("from", "expected 'from' after import specifiers")?;
        }

        self.finish_import(import_token, specifiers)
    }

    fn parse_named_imports(&mut self, specifiers: &mut Vec<ImportSpecifier>) -> Result<()> {
        while !matches!(self.peek_kind(), TokenKind::RBrace) {
            let imported_token = self.peek().clone();
            let imported = match imported_token.kind {
                TokenKind::Identifier => ImportedName::Named(imported_token.lexeme.clone()),
                TokenKind::Keyword(Keyword::Default) => ImportedName::Default,
                _ => return Err(self.unexpected(&imported_token, "expected imported name")),
            };
            self.advance();

            let local_token = if self.check_contextual("as") {
                self.advance();
                self.expect_identifier("expected local name after 'as'")?
            } else if matches!(imported, ImportedName::Default) {
                return Err(self.unexpected(&imported_token, "'default' must be renamed with 'as'"));
            } else {
                imported_token.clone()
            };
            let local = self.make_identifier(&local_token);
            let span = Self::union_spans(&Self::span_from_token(&imported_token), &local.span);
            specifiers.push(ImportSpecifier {
                id: self.node_id(),
                span,
                local,
                imported,
            });

            if !self.consume_list_separator(TokenKind::RBrace, "expected ',' or '}' in import list")? {
                break;
            }
        }
        self.expect_token(TokenKind::RBrace, "expected '}' to close import list")
    }

    fn finish_import(
        &mut self,
        import_token: Token,
        specifiers: Vec<ImportSpecifier>,
    ) -> Result<Statement> {
        let (source, source_span) = self.expect_string("expected module path string")?;
        self.consume_terminator()?;
        let span = Self::union_spans(&Self::span_from_token(&import_token), &source_span);
        Ok(self.make_statement(
            span,
            StatementKind::Import(ImportDeclaration {
                source,
                source_span,
                specifiers,
            }),
        ))
    }

    fn parse_export(&mut self) -> Result<Statement> {
        let export_token = self.advance().clone();
        let export_span = Self::span_from_token(&export_token);

        match self.peek_kind() {
            TokenKind::Keyword(Keyword::Default) => {
                self.advance();
                let expression = self.parse_assignment()?;
                self.consume_terminator()?;
                let span = Self::union_spans(&export_span, &expression.span);
                Ok(self.make_statement(span, StatementKind::ExportDefault(expression)))
            }
            TokenKind::Keyword(Keyword::Let | Keyword::Const | Keyword::Var) => {
                let declaration = self.parse_variable_declaration()?;
                self.consume_terminator()?;
                let span = Self::union_spans(&export_span, &declaration.span);
                Ok(self.make_statement(
                    span,
                    StatementKind::ExportNamed(ExportNamedDeclaration {
                        declaration: Some(declaration),
                        specifiers: Vec::new(),
                        source: None,
                    }),
                ))
            }
            TokenKind::Star => {
                self.advance();
                if self.check_contextual("as") {
                    self.advance();
                    self.expect_identifier("expected name after 'as'")?;
                }
                self.expect_contextual("from", "expected 'from' after 'export *'")?;
                let (source, source_span) = self.expect_string("expected module path string")?;
                self.consume_terminator()?;
                let span = Self::union_spans(&export_span, &source_span);
                Ok(self.make_statement(
                    span,
                    StatementKind::ExportAll(ExportAllDeclaration {
                        source,
                        source_span,
                    }),
                ))
            }
            TokenKind::LBrace => {
                self.advance();
                let specifiers = self.parse_export_specifiers()?;
                let mut span = Self::union_spans(&export_span, &self.previous_span());
                let source = if self.check_contextual("from") {
                    self.advance();
                    let (source, source_span) =
                        self.expect_string("expected module path string")?;
                    span = Self::union_spans(&span, &source_span);
                    Some(source)
                } else {
                    None
                };
                self.consume_terminator()?;
                Ok(self.make_statement(
                    span,
                    StatementKind::ExportNamed(ExportNamedDeclaration {
                        declaration: None,
                        specifiers,
                        source,
                    }),
                ))
            }
            _ => {
                let token = self.peek().clone();
                Err(self.unexpected(
                    &token,
                    "expected 'default', a variable declaration, '{' or '*' after 'export'",
                ))
            }
        }
    }

    fn parse_export_specifiers(&mut self) -> Result<Vec<ExportSpecifier>> {
        let mut specifiers = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBrace) {
            let local_token = self.expect_identifier("expected exported binding name")?;
            let local = self.make_identifier(&local_token);
            let exported = if self.check_contextual("as") {
                self.advance();
                let exported_token = self.peek().clone();
                let mut exported = match exported_token.kind {
                    TokenKind::Identifier | TokenKind::Keyword(Keyword::Default) => {
                        self.advance();
                        self.make_identifier(&exported_token)
                    }
                    _ => return Err(self.unexpected(&exported_token, "expected export name")),
                };
                if matches!(exported_token.kind, TokenKind::Keyword(Keyword::Default)) {
                    exported.name = DEFAULT_EXPORT.to_string();
                }
                exported
            } else {
                self.make_identifier(&local_token)
            };
            let span = Self::union_spans(&local.span, &exported.span);
            specifiers.push(ExportSpecifier {
                id: self.node_id(),
                span,
                local,
                exported,
            });

            if !self.consume_list_separator(TokenKind::RBrace, "expected ',' or '}' in export list")? {
                break;
            }
        }
        self.expect_token(TokenKind::RBrace, "expected '}' to close export list")?;
        Ok(specifiers)
    }

    fn parse_return(&mut self) -> Result<Statement> {
        let return_token = self.advance().clone();
        let mut span = Self::span_from_token(&return_token);
        let argument = if self.at_statement_end() {
            None
        } else {
            let expression = self.parse_expression()?;
            span = Self::union_spans(&span, &expression.span);
            Some(expression)
        };
        self.consume_terminator()?;
        Ok(self.make_statement(span, StatementKind::Return(argument)))
    }

    fn parse_if(&mut self) -> Result<Statement> {
        let if_token = self.advance().clone();
        self.expect_token(TokenKind::LParen, "expected '(' after 'if'")?;
        let test = self.parse_expression()?;
        self.expect_token(TokenKind::RParen, "expected ')' after condition")?;
        let consequent = self.parse_statement()?;
        let alternate = if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Else)) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        let end_span = alternate
            .as_ref()
            .map(|statement| statement.span)
            .unwrap_or(consequent.span);
        let span = Self::union_spans(&Self::span_from_token(&if_token), &end_span);
        Ok(self.make_statement(
            span,
            StatementKind::If(IfStatement {
                test,
                consequent: Box::new(consequent),
                alternate,
            }),
        ))
    }

    fn parse_function(&mut self) -> Result<Statement> {
        let function_token = self.advance().clone();
        let name_token = self.expect_identifier("expected function name")?;
        let name = self.make_identifier(&name_token);
        self.expect_token(TokenKind::LParen, "expected '(' after function name")?;
        let params = self.parse_parameter_list()?;
        let (body, body_span) = self.parse_braced_block()?;
        let span = Self::union_spans(&Self::span_from_token(&function_token), &body_span);
        Ok(self.make_statement(
            span,
            StatementKind::Function(FunctionDeclaration { name, params, body }),
        ))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement> {
        let expression = self.parse_expression()?;
        self.consume_terminator()?;
        Ok(self.make_statement(expression.span, StatementKind::Expression(expression)))
    }

    fn parse_braced_block(&mut self) -> Result<(Vec<Statement>, SourceSpan)> {
        let open_token = self.peek().clone();
        self.expect_token(TokenKind::LBrace, "expected '{' to start block")?;
        let mut statements = Vec::new();

        loop {
            match self.peek_kind() {
                TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    return Err(SyntaxError::new(
                        "unterminated block, expected '}'",
                        Self::span_from_token(&open_token),
                    ));
                }
                _ => statements.push(self.parse_statement()?),
            }
        }

        let span = Self::union_spans(&Self::span_from_token(&open_token), &self.previous_span());
        Ok((statements, span))
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expression> {
        if self.is_arrow_start() {
            return self.parse_arrow_function();
        }

        let target = self.parse_conditional()?;
        let operator = match self.peek_kind() {
            TokenKind::Equal => "=",
            TokenKind::CompoundAssign(operator) => *operator,
            _ => return Ok(target),
        };
        self.advance();
        let value = self.parse_assignment()?;
        let span = Self::union_spans(&target.span, &value.span);
        Ok(self.make_expression(
            span,
            ExpressionKind::Assignment(AssignmentExpression {
                operator: operator.to_string(),
                target: Box::new(target),
                value: Box::new(value),
            }),
        ))
    }

    fn is_arrow_start(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Identifier => {
                matches!(self.peek_kind_at(1), Some(TokenKind::FatArrow))
            }
            TokenKind::LParen => {
                let mut depth = 0usize;
                for (offset, token) in self.tokens[self.current..].iter().enumerate() {
                    match token.kind {
                        TokenKind::LParen => depth += 1,
                        TokenKind::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return matches!(
                                    self.peek_kind_at(offset + 1),
                                    Some(TokenKind::FatArrow)
                                );
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn parse_arrow_function(&mut self) -> Result<Expression> {
        let start_span = Self::span_from_token(self.peek());
        let params = if matches!(self.peek_kind(), TokenKind::Identifier) {
            vec![self.parse_binding_pattern()?]
        } else {
            self.expect_token(TokenKind::LParen, "expected '(' to start parameters")?;
            self.parse_parameter_list()?
        };
        self.expect_token(TokenKind::FatArrow, "expected '=>' after arrow parameters")?;

        let (body, body_span) = if matches!(self.peek_kind(), TokenKind::LBrace) {
            let (statements, span) = self.parse_braced_block()?;
            (ArrowBody::Block(statements), span)
        } else {
            let expression = self.parse_assignment()?;
            let span = expression.span;
            (ArrowBody::Expression(Box::new(expression)), span)
        };

        let span = Self::union_spans(&start_span, &body_span);
        Ok(self.make_expression(span, ExpressionKind::Arrow(ArrowFunction { params, body })))
    }

    /// Parses parameters after an already consumed '(' up to and including ')'.
    fn parse_parameter_list(&mut self) -> Result<Vec<Pattern>> {
        let mut params = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RParen) {
            params.push(self.parse_binding_pattern()?);
            if !self.consume_list_separator(TokenKind::RParen, "expected ',' or ')' in parameters")? {
                break;
            }
        }
        self.expect_token(TokenKind::RParen, "expected ')' after parameters")?;
        Ok(params)
    }

    fn parse_conditional(&mut self) -> Result<Expression> {
        let test = self.parse_binary(Precedence::Lowest)?;
        if !matches!(self.peek_kind(), TokenKind::Question) {
            return Ok(test);
        }
        self.advance();
        let consequent = self.parse_assignment()?;
        self.expect_token(TokenKind::Colon, "expected ':' in conditional expression")?;
        let alternate = self.parse_assignment()?;
        let span = Self::union_spans(&test.span, &alternate.span);
        Ok(self.make_expression(
            span,
            ExpressionKind::Conditional(ConditionalExpression {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            }),
        ))
    }

    fn parse_binary(&mut self, precedence: Precedence) -> Result<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let next_precedence = match Precedence::of(self.peek_kind()) {
                Some(p) => p,
                None => break,
            };
            if precedence >= next_precedence {
                break;
            }

            let operator_token = self.advance().clone();
            let operator = infix_operator_from_token(&operator_token)?;
            // `**` is right associative
            let right = if next_precedence == Precedence::Exponent {
                self.parse_binary(Precedence::Multiplicative)?
            } else {
                self.parse_binary(next_precedence)?
            };

            let span = Self::union_spans(&left.span, &right.span);
            let kind = match operator {
                InfixOperator::Binary(operator) => ExpressionKind::Binary(BinaryExpression {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                }),
                InfixOperator::Logical(operator) => ExpressionKind::Logical(LogicalExpression {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                }),
            };
            left = self.make_expression(span, kind);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let token = self.peek().clone();
        let operator = match token.kind {
            TokenKind::Minus => UnaryOperator::Minus,
            TokenKind::Plus => UnaryOperator::Plus,
            TokenKind::Bang => UnaryOperator::Not,
            TokenKind::Tilde => UnaryOperator::BitNot,
            TokenKind::Keyword(Keyword::Typeof) => UnaryOperator::Typeof,
            TokenKind::Keyword(Keyword::Void) => UnaryOperator::Void,
            TokenKind::Keyword(Keyword::Delete) => UnaryOperator::Delete,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                return Err(self.unexpected(&token, "update expressions are not supported"));
            }
            _ => return self.parse_postfix(),
        };
        self.advance();

        let operand = self.parse_unary()?;
        let span = Self::union_spans(&Self::span_from_token(&token), &operand.span);
        Ok(self.make_expression(
            span,
            ExpressionKind::Unary(UnaryExpression {
                operator,
                operand: Box::new(operand),
            }),
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek_kind() {
                TokenKind::LParen => expr = self.finish_call(expr)?,
                TokenKind::Dot => expr = self.finish_member(expr)?,
                TokenKind::LBracket => expr = self.finish_index(expr)?,
                TokenKind::PlusPlus | TokenKind::MinusMinus if !self.peek().newline_before => {
                    let token = self.peek().clone();
                    return Err(self.unexpected(&token, "update expressions are not supported"));
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let token = self.advance().clone();
        let token_span = Self::span_from_token(&token);
        let kind = match token.kind {
            TokenKind::Identifier => ExpressionKind::Identifier(token.lexeme.clone()),
            TokenKind::NumberLiteral(value) => ExpressionKind::Literal(Literal::Number(value)),
            TokenKind::BigIntLiteral(ref digits) => {
                ExpressionKind::Literal(Literal::BigInt(digits.clone()))
            }
            TokenKind::StringLiteral(ref value) => {
                ExpressionKind::Literal(Literal::String(value.clone()))
            }
            TokenKind::BooleanLiteral(value) => ExpressionKind::Literal(Literal::Boolean(value)),
            TokenKind::Keyword(Keyword::Null) => ExpressionKind::Literal(Literal::Null),
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect_token(TokenKind::RParen, "expected ')' after expression")?;
                return Ok(expr);
            }
            TokenKind::LBracket => return self.parse_array_literal(token_span),
            TokenKind::LBrace => return self.parse_object_literal(token_span),
            _ => return Err(self.unexpected(&token, "unexpected token")),
        };
        Ok(self.make_expression(token_span, kind))
    }

    fn parse_array_literal(&mut self, opening_span: SourceSpan) -> Result<Expression> {
        let mut elements = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBracket) {
            elements.push(self.parse_assignment()?);
            if !self.consume_list_separator(TokenKind::RBracket, "expected ',' or ']' in array literal")? {
                break;
            }
        }
        self.expect_token(TokenKind::RBracket, "expected ']' to close array literal")?;
        let span = Self::union_spans(&opening_span, &self.previous_span());
        Ok(self.make_expression(span, ExpressionKind::Array(elements)))
    }

    fn parse_object_literal(&mut self, opening_span: SourceSpan) -> Result<Expression> {
        let mut properties = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBrace) {
            let key_token = self.advance().clone();
            let key_span = Self::span_from_token(&key_token);
            let key = match &key_token.kind {
                TokenKind::Identifier | TokenKind::Keyword(_) => key_token.lexeme.clone(),
                TokenKind::StringLiteral(value) => value.clone(),
                TokenKind::NumberLiteral(_) => key_token.lexeme.clone(),
                _ => return Err(self.unexpected(&key_token, "expected property name")),
            };

            let value = if matches!(self.peek_kind(), TokenKind::Colon) {
                self.advance();
                self.parse_assignment()?
            } else if matches!(key_token.kind, TokenKind::Identifier) {
                self.make_expression(key_span, ExpressionKind::Identifier(key.clone()))
            } else {
                let token = self.peek().clone();
                return Err(self.unexpected(&token, "expected ':' after property name"));
            };
            properties.push(Property {
                key,
                key_span,
                value,
            });

            if !self.consume_list_separator(TokenKind::RBrace, "expected ',' or '}' in object literal")? {
                break;
            }
        }
        self.expect_token(TokenKind::RBrace, "expected '}' to close object literal")?;
        let span = Self::union_spans(&opening_span, &self.previous_span());
        Ok(self.make_expression(span, ExpressionKind::Object(properties)))
    }

    fn finish_call(&mut self, callee: Expression) -> Result<Expression> {
        self.expect_token(TokenKind::LParen, "expected '(' to start argument list")?;
        let mut arguments = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RParen) {
            arguments.push(self.parse_assignment()?);
            if !self.consume_list_separator(TokenKind::RParen, "expected ',' or ')' in argument list")? {
                break;
            }
        }
        self.expect_token(TokenKind::RParen, "expected ')' to close argument list")?;

        let span = Self::union_spans(&callee.span, &self.previous_span());
        Ok(self.make_expression(
            span,
            ExpressionKind::Call(CallExpression {
                callee: Box::new(callee),
                arguments,
            }),
        ))
    }

    fn finish_member(&mut self, object: Expression) -> Result<Expression> {
        self.expect_token(TokenKind::Dot, "expected '.' for member access")?;
        let name_token = self.peek().clone();
        let property = match name_token.kind {
            TokenKind::Identifier | TokenKind::Keyword(_) | TokenKind::BooleanLiteral(_) => {
                self.advance();
                name_token.lexeme.clone()
            }
            _ => return Err(self.unexpected(&name_token, "expected identifier after '.'")),
        };

        let span = Self::union_spans(&object.span, &Self::span_from_token(&name_token));
        Ok(self.make_expression(
            span,
            ExpressionKind::Member(MemberExpression {
                object: Box::new(object),
                property: MemberProperty::Named(property),
            }),
        ))
    }

    fn finish_index(&mut self, object: Expression) -> Result<Expression> {
        self.expect_token(TokenKind::LBracket, "expected '[' for index expression")?;
        let index = self.parse_expression()?;
        self.expect_token(TokenKind::RBracket, "expected ']' after index expression")?;

        let span = Self::union_spans(&object.span, &self.previous_span());
        Ok(self.make_expression(
            span,
            ExpressionKind::Member(MemberExpression {
                object: Box::new(object),
                property: MemberProperty::Computed(Box::new(index)),
            }),
        ))
    }

    /// Consumes a ',' between list items. Returns false once `closing` is next.
    fn consume_list_separator(&mut self, closing: TokenKind, message: &str) -> Result<bool> {
        if matches!(self.peek_kind(), TokenKind::Comma) {
            self.advance();
            return Ok(true);
        }
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(&closing) {
            return Ok(false);
        }
        let token = self.peek().clone();
        Err(self.unexpected(&token, message))
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) || self.peek().newline_before
    }

    /// Accepts ';' or an implied terminator before a line break, '}' or the end of input.
    fn consume_terminator(&mut self) -> Result<()> {
        if matches!(self.peek_kind(), TokenKind::Semicolon) {
            self.advance();
            return Ok(());
        }
        if self.at_statement_end() {
            return Ok(());
        }
        let token = self.peek().clone();
        Err(self.unexpected(&token, "expected ';' after statement"))
    }

    fn expect_token(&mut self, expected: TokenKind, message: &str) -> Result<()> {
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(&expected) {
            self.advance();
            Ok(())
        } else {
            let token = self.peek().clone();
            Err(self.unexpected(&token, message))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<Token> {
        let token = self.peek().clone();
        if matches!(token.kind, TokenKind::Identifier) {
            self.advance();
            Ok(token)
        } else {
            Err(self.unexpected(&token, message))
        }
    }

    fn expect_string(&mut self, message: &str) -> Result<(String, SourceSpan)> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::StringLiteral(ref value) => {
                self.advance();
                Ok((value.clone(), Self::span_from_token(&token)))
            }
            _ => Err(self.unexpected(&token, message)),
        }
    }

    fn check_contextual(&self, word: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Identifier) && self.peek().lexeme == word
    }

    fn expect_contextual(&mut self, word: &str, message: &str) -> Result<()> {
        if self.check_contextual(word) {
            self.advance();
            Ok(())
        } else {
            let token = self.peek().clone();
            Err(self.unexpected(&token, message))
        }
    }

    fn unexpected(&self, token: &Token, message: &str) -> SyntaxError {
        let found = if matches!(token.kind, TokenKind::Eof) {
            "end of input"
        } else {
            token.lexeme.as_str()
        };
        SyntaxError::new(
            format!(
                "{} at line {}, column {} (found '{}')",
                message, token.line, token.column, found
            ),
            Self::span_from_token(token),
        )
    }

    fn previous_span(&self) -> SourceSpan {
        self.tokens
            .get(self.current.wrapping_sub(1))
            .map(Self::span_from_token)
            .unwrap_or_default()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.current].kind
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens
            .get(self.current + offset)
            .map(|token| token.kind.clone())
    }

    fn advance(&mut self) -> &Token {
        if self.is_at_end() {
            return &self.tokens[self.current];
        }
        self.current += 1;
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }
}

fn infix_operator_from_token(token: &Token) -> Result<InfixOperator> {
    let operator = match token.kind {
        TokenKind::Plus => InfixOperator::Binary(BinaryOperator::Add),
        TokenKind::Minus => InfixOperator::Binary(BinaryOperator::Subtract),
        TokenKind::Star => InfixOperator::Binary(BinaryOperator::Multiply),
        TokenKind::Slash => InfixOperator::Binary(BinaryOperator::Divide),
        TokenKind::Percent => InfixOperator::Binary(BinaryOperator::Remainder),
        TokenKind::StarStar => InfixOperator::Binary(BinaryOperator::Exponent),
        TokenKind::Pipe => InfixOperator::Binary(BinaryOperator::BitOr),
        TokenKind::Ampersand => InfixOperator::Binary(BinaryOperator::BitAnd),
        TokenKind::Caret => InfixOperator::Binary(BinaryOperator::BitXor),
        TokenKind::LessLess => InfixOperator::Binary(BinaryOperator::ShiftLeft),
        TokenKind::GreaterGreater => InfixOperator::Binary(BinaryOperator::ShiftRight),
        TokenKind::GreaterGreaterGreater => {
            InfixOperator::Binary(BinaryOperator::UnsignedShiftRight)
        }
        TokenKind::Less => InfixOperator::Binary(BinaryOperator::Less),
        TokenKind::Greater => InfixOperator::Binary(BinaryOperator::Greater),
        TokenKind::LessEqual => InfixOperator::Binary(BinaryOperator::LessEqual),
        TokenKind::GreaterEqual => InfixOperator::Binary(BinaryOperator::GreaterEqual),
        TokenKind::DoubleEqual => InfixOperator::Binary(BinaryOperator::Equal),
        TokenKind::BangEqual => InfixOperator::Binary(BinaryOperator::NotEqual),
        TokenKind::TripleEqual => InfixOperator::Binary(BinaryOperator::StrictEqual),
        TokenKind::BangDoubleEqual => InfixOperator::Binary(BinaryOperator::StrictNotEqual),
        TokenKind::Keyword(Keyword::In) => InfixOperator::Binary(BinaryOperator::In),
        TokenKind::Keyword(Keyword::Instanceof) => {
            InfixOperator::Binary(BinaryOperator::InstanceOf)
        }
        TokenKind::AmpersandAmpersand => InfixOperator::Logical(LogicalOperator::And),
        TokenKind::PipePipe => InfixOperator::Logical(LogicalOperator::Or),
        TokenKind::QuestionQuestion => InfixOperator::Logical(LogicalOperator::Coalesce),
        ref other => {
            return Err(SyntaxError::new(
                format!(
                    "unsupported binary operator {:?} at line {}, column {}",
                    other, token.line, token.column
                ),
                Parser::span_from_token(token),
            ))
        }
    };
    Ok(operator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceId;

    fn parse_source(contents: &str) -> Module {
        let source = SourceFile::new(SourceId(0), "test.js".into(), contents.to_string());
        parse(&source).expect("parse")
    }

    fn single_expression(contents: &str) -> Expression {
        let module = parse_source(contents);
        match module.statements.into_iter().next().map(|s| s.kind) {
            Some(StatementKind::Expression(expression)) => expression,
            other => panic!("expected expression statement, found {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expression = single_expression("1 + 2 * 3");
        let ExpressionKind::Binary(binary) = expression.kind else {
            panic!("expected binary expression");
        };
        assert_eq!(binary.operator, BinaryOperator::Add);
        assert!(matches!(
            binary.right.kind,
            ExpressionKind::Binary(BinaryExpression {
                operator: BinaryOperator::Multiply,
                ..
            })
        ));
    }

    #[test]
    fn exponent_is_right_associative() {
        let expression = single_expression("2 ** 3 ** 2");
        let ExpressionKind::Binary(binary) = expression.kind else {
            panic!("expected binary expression");
        };
        assert!(matches!(binary.left.kind, ExpressionKind::Literal(_)));
        assert!(matches!(binary.right.kind, ExpressionKind::Binary(_)));
    }

    #[test]
    fn arrow_functions_with_conditional_bodies() {
        let module = parse_source("let factorial = n => n <= 1 ? 1 : n * factorial(n - 1);");
        let StatementKind::Variable(declaration) = &module.statements[0].kind else {
            panic!("expected variable declaration");
        };
        let init = declaration.declarators[0].init.as_ref().expect("initializer");
        let ExpressionKind::Arrow(arrow) = &init.kind else {
            panic!("expected arrow function, found {:?}", init.kind);
        };
        assert_eq!(arrow.params.len(), 1);
        assert!(matches!(
            arrow.body,
            ArrowBody::Expression(ref body) if matches!(body.kind, ExpressionKind::Conditional(_))
        ));
    }

    #[test]
    fn parenthesized_parameters_are_arrows_and_groups_are_not() {
        let arrow = single_expression("(x, y) => x + y");
        assert!(matches!(arrow.kind, ExpressionKind::Arrow(ref a) if a.params.len() == 2));
        let group = single_expression("(x + y) * 2");
        assert!(matches!(group.kind, ExpressionKind::Binary(_)));
    }

    #[test]
    fn import_forms() {
        let module = parse_source(
            "import def, { a, b as c } from './a.js'\nimport * as ns from \"./b.js\"\nimport './side.js'",
        );
        let imports: Vec<_> = module.imports().map(|(_, import)| import).collect();
        assert_eq!(imports.len(), 3);
        let names: Vec<_> = imports[0]
            .specifiers
            .iter()
            .map(|s| (s.local.name.as_str(), s.imported.clone()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("def", ImportedName::Default),
                ("a", ImportedName::Named("a".into())),
                ("c", ImportedName::Named("b".into())),
            ]
        );
        assert_eq!(imports[1].specifiers[0].imported, ImportedName::Namespace);
        assert!(imports[2].specifiers.is_empty());
    }

    #[test]
    fn export_forms() {
        let module = parse_source(
            "export let a = 1\nexport default a\nexport { a as b }\nexport * from './x.js'",
        );
        let kinds: Vec<_> = module.statements.iter().map(|s| s.node_kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::ExportNamedDeclaration,
                NodeKind::ExportDefaultDeclaration,
                NodeKind::ExportNamedDeclaration,
                NodeKind::ExportAllDeclaration,
            ]
        );
    }

    #[test]
    fn node_ids_are_unique() {
        let module = parse_source("let a = 1 + 2; let b = x => a(x, [1, 2]);");
        let mut ids = Vec::new();
        fn walk(expression: &Expression, ids: &mut Vec<NodeId>) {
            ids.push(expression.id);
            match &expression.kind {
                ExpressionKind::Binary(b) => {
                    walk(&b.left, ids);
                    walk(&b.right, ids);
                }
                ExpressionKind::Call(call) => {
                    walk(&call.callee, ids);
                    call.arguments.iter().for_each(|a| walk(a, ids));
                }
                ExpressionKind::Array(items) => items.iter().for_each(|a| walk(a, ids)),
                ExpressionKind::Arrow(arrow) => {
                    if let ArrowBody::Expression(body) = &arrow.body {
                        walk(body, ids);
                    }
                }
                _ => {}
            }
        }
        for statement in &module.statements {
            ids.push(statement.id);
            if let StatementKind::Variable(declaration) = &statement.kind {
                for declarator in &declaration.declarators {
                    ids.push(declarator.target.id);
                    if let Some(init) = &declarator.init {
                        walk(init, &mut ids);
                    }
                }
            }
        }
        let count = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count, "expected unique node ids");
    }

    #[test]
    fn missing_separator_reports_location() {
        let source = SourceFile::new(SourceId(0), "bad.js".into(), "let a = f(1 2)".into());
        let error = parse(&source).expect_err("should fail");
        assert!(
            error.message.contains("expected ',' or ')' in argument list at line 1, column 13"),
            "unexpected message: {}",
            error.message
        );
    }
}
