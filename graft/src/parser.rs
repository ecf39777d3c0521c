use crate::ast::{
    BinaryOp, Block, ClassDecl, Declarator, Expr, ExprKind, FieldDecl,
    Literal, LogicalOp, MethodDecl, Param, Segment, Stmt, StmtKind, TypeRef,
    UnaryOp, Unit, Using,
};
use crate::error::Diagnostic;
use crate::lexer::Lexer;
use crate::span::{Pos, Span};
use crate::token::{Keyword, RawSegment, Token, TokenKind};
use crate::types::RuntimeType;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for Diagnostic {
    fn from(err: ParseError) -> Self {
        Diagnostic::error(err.message, err.span)
    }
}

type PResult<T> = Result<T, ParseError>;

/// Levels of blocks, statement bodies and nested operands the parser
/// descends through before giving up on a statement.
pub const MAX_NESTING: usize = 24;

/// Height bound on a single expression tree.
pub const MAX_EXPR_DEPTH: usize = 48;

/// Number of binary operator tiers below `&&`.
const BINARY_TIERS: usize = 7;

/// Binary operator for `kind` at `tier`, loosest tier first. `&&` and
/// `||` sit above these and are handled by [`Parser::parse_logical`].
fn binary_op(tier: usize, kind: &TokenKind) -> Option<BinaryOp> {
    let op = match (tier, kind) {
        (0, TokenKind::Pipe) => BinaryOp::BitOr,
        (1, TokenKind::Caret) => BinaryOp::BitXor,
        (2, TokenKind::Amp) => BinaryOp::BitAnd,
        (3, TokenKind::EqEq) => BinaryOp::Eq,
        (3, TokenKind::NotEq) => BinaryOp::Ne,
        (4, TokenKind::Lt) => BinaryOp::Lt,
        (4, TokenKind::Gt) => BinaryOp::Gt,
        (4, TokenKind::Le) => BinaryOp::Le,
        (4, TokenKind::Ge) => BinaryOp::Ge,
        (5, TokenKind::Plus) => BinaryOp::Add,
        (5, TokenKind::Minus) => BinaryOp::Sub,
        (6, TokenKind::Star) => BinaryOp::Mul,
        (6, TokenKind::Slash) => BinaryOp::Div,
        (6, TokenKind::Percent) => BinaryOp::Rem,
        _ => return None,
    };
    Some(op)
}

/// Recursive-descent parser over a token buffer.
///
/// Errors inside a statement or member are recorded and the parser
/// resynchronizes at the next `;` or closing brace, so one pass reports
/// every syntax error in a unit.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(tokens: impl IntoIterator<Item = Token>) -> Self {
        let mut diagnostics = Vec::new();
        let tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|tok| match &tok.kind {
                TokenKind::Error(message) => {
                    diagnostics.push(Diagnostic::error(message.clone(), tok.span));
                    false
                }
                _ => true,
            })
            .collect();
        Self {
            tokens,
            pos: 0,
            depth: 0,
            diagnostics,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    // ── Token access ───────────────────────────────────────────────

    fn token_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn peek_kind(&self) -> &TokenKind {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &TokenKind {
        self.token_at(n).map_or(&TokenKind::Eof, |tok| &tok.kind)
    }

    fn peek_span(&self) -> Span {
        match self.token_at(0) {
            Some(tok) => tok.span,
            None => Span::point(self.prev_end()),
        }
    }

    fn prev_end(&self) -> Pos {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(tok) => tok.span.end,
            None => Pos::origin(),
        }
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(start.start, self.prev_end())
    }

    fn advance(&mut self) -> Token {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                let tok = tok.clone();
                if tok.kind != TokenKind::Eof {
                    self.pos += 1;
                }
                tok
            }
            None => Token::new(TokenKind::Eof, Span::point(self.prev_end())),
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        self.check(&TokenKind::Keyword(kw))
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &TokenKind) -> PResult<Token> {
        if self.check(expected) {
            Ok(self.advance())
        } else {
            Err(ParseError::new(
                format!(
                    "{} expected, found {}",
                    expected.name(),
                    self.peek_kind().name()
                ),
                self.peek_span(),
            ))
        }
    }

    fn expect_ident(&mut self) -> PResult<(String, Span)> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                let span = self.advance().span;
                Ok((name, span))
            }
            other => Err(ParseError::new(
                format!("identifier expected, found {}", other.name()),
                self.peek_span(),
            )),
        }
    }

    fn error(&mut self, err: ParseError) {
        self.diagnostics.push(err.into());
    }

    // ── Nesting ────────────────────────────────────────────────────

    /// Run `parse` one nesting level down.
    fn nested<T>(
        &mut self,
        what: &str,
        parse: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(too_deep(what, self.peek_span()));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Reject `expr` once its tree grows past [`MAX_EXPR_DEPTH`].
    fn bounded(&self, expr: Expr) -> PResult<Expr> {
        if expr.depth > MAX_EXPR_DEPTH {
            return Err(too_deep("expression", expr.span));
        }
        Ok(expr)
    }

    fn parse_body(&mut self) -> PResult<Box<Stmt>> {
        self.nested("statement", |p| p.parse_statement().map(Box::new))
    }

    // ── Recovery ───────────────────────────────────────────────────

    /// Skip to just past the next `;`, or up to the `}` closing the
    /// current block. Nested blocks are skipped whole.
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace if depth == 0 => return,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    // ── Unit structure ─────────────────────────────────────────────

    pub fn parse_unit(&mut self) -> Unit {
        let mut usings = Vec::new();
        while self.check_keyword(Keyword::Using) {
            match self.parse_using() {
                Ok(using) => usings.push(using),
                Err(err) => {
                    self.error(err);
                    self.synchronize();
                }
            }
        }

        let class = if self.check_keyword(Keyword::Namespace) {
            self.parse_namespace()
        } else {
            self.parse_class_item()
        };

        if !self.check(&TokenKind::Eof) {
            let message = if self.skip_to_class() {
                "only one class per unit is supported".to_string()
            } else {
                format!("unexpected {} after class declaration", self.peek_kind().name())
            };
            self.error(ParseError::new(message, self.peek_span()));
        }
        Unit { usings, class }
    }

    fn parse_using(&mut self) -> PResult<Using> {
        let start = self.advance().span;
        let (mut path, _) = self.expect_ident()?;
        while self.eat(&TokenKind::Dot) {
            let (segment, _) = self.expect_ident()?;
            path.push('.');
            path.push_str(&segment);
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(Using {
            path,
            span: self.span_from(start),
        })
    }

    fn parse_namespace(&mut self) -> Option<ClassDecl> {
        self.advance();
        let header = (|| {
            self.expect_ident()?;
            while self.eat(&TokenKind::Dot) {
                self.expect_ident()?;
            }
            self.expect(&TokenKind::LBrace)
        })();
        if let Err(err) = header {
            self.error(err);
            return None;
        }
        let class = self.parse_class_item();
        if let Err(err) = self.expect(&TokenKind::RBrace) {
            self.error(err);
        }
        class
    }

    fn parse_class_item(&mut self) -> Option<ClassDecl> {
        if self.check(&TokenKind::Eof) {
            return None;
        }
        match self.parse_class() {
            Ok(class) => Some(class),
            Err(err) => {
                self.error(err);
                None
            }
        }
    }

    /// Whether another `class` keyword follows before the end of input.
    fn skip_to_class(&self) -> bool {
        self.tokens[self.pos..]
            .iter()
            .any(|tok| tok.kind == TokenKind::Keyword(Keyword::Class))
    }

    fn skip_attributes(&mut self) -> PResult<()> {
        while self.check(&TokenKind::LBracket) {
            let open = self.advance().span;
            let mut depth = 1usize;
            while depth > 0 {
                match self.advance().kind {
                    TokenKind::LBracket => depth += 1,
                    TokenKind::RBracket => depth -= 1,
                    TokenKind::Eof => {
                        return Err(ParseError::new("`]` expected", open));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn skip_modifiers(&mut self) {
        while let TokenKind::Keyword(kw) = self.peek_kind() {
            if !kw.is_modifier() {
                break;
            }
            self.advance();
        }
    }

    fn parse_class(&mut self) -> PResult<ClassDecl> {
        let start = self.peek_span();
        self.skip_attributes()?;
        self.skip_modifiers();
        self.expect(&TokenKind::Keyword(Keyword::Class))?;
        let (name, _) = self.expect_ident()?;
        if self.eat(&TokenKind::Colon) {
            self.parse_type()?;
            while self.eat(&TokenKind::Comma) {
                self.parse_type()?;
            }
        }
        self.expect(&TokenKind::LBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            let before = self.pos;
            if let Err(err) = self.parse_member(&mut fields, &mut methods) {
                self.error(err);
                self.synchronize();
                if self.pos == before {
                    self.advance();
                }
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(ClassDecl {
            name,
            fields,
            methods,
            span: self.span_from(start),
        })
    }

    fn parse_member(
        &mut self,
        fields: &mut Vec<FieldDecl>,
        methods: &mut Vec<MethodDecl>,
    ) -> PResult<()> {
        self.skip_attributes()?;
        let start = self.peek_span();
        self.skip_modifiers();

        if self.eat(&TokenKind::Keyword(Keyword::Void)) {
            let (name, _) = self.expect_ident()?;
            methods.push(self.parse_method(name, start)?);
            return Ok(());
        }

        let ty = self.parse_type()?;
        let (name, name_span) = self.expect_ident()?;
        if self.check(&TokenKind::LParen) {
            let err = ParseError::new(
                format!(
                    "method `{name}` must return void, found `{}`",
                    ty.name()
                ),
                ty.span(),
            );
            // Parse the body anyway so the error is reported once.
            self.parse_method(name, start)?;
            self.error(err);
            return Ok(());
        }
        if self.check(&TokenKind::LBrace) {
            return Err(ParseError::new(
                format!("property `{name}` is not supported, declare a field"),
                name_span,
            ));
        }

        let mut name = name;
        let mut decl_start = start;
        loop {
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            fields.push(FieldDecl {
                ty: ty.clone(),
                name,
                init,
                span: self.span_from(decl_start),
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            let (next, next_span) = self.expect_ident()?;
            name = next;
            decl_start = next_span;
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(())
    }

    fn parse_method(&mut self, name: String, start: Span) -> PResult<MethodDecl> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let ty = self.parse_type()?;
                let (pname, pspan) = self.expect_ident()?;
                params.push(Param {
                    span: ty.span().to(pspan),
                    ty,
                    name: pname,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(MethodDecl {
            name,
            params,
            body,
            span: self.span_from(start),
        })
    }

    /// `Name`, `Ns.Name`, or `Name<Arg>`; array types are rejected.
    fn parse_type(&mut self) -> PResult<TypeRef> {
        if self.check_keyword(Keyword::Var) {
            return Ok(TypeRef::Var(self.advance().span));
        }
        let (mut name, start) = self.expect_ident()?;
        while self.check(&TokenKind::Dot) {
            self.advance();
            let (segment, _) = self.expect_ident()?;
            name.push('.');
            name.push_str(&segment);
        }
        if self.eat(&TokenKind::Lt) {
            let arg = self.parse_type()?;
            self.expect(&TokenKind::Gt)?;
            name = format!("{name}<{}>", arg.name());
        }
        if self.check(&TokenKind::LBracket) {
            return Err(ParseError::new(
                "array types are not supported",
                self.peek_span(),
            ));
        }
        Ok(TypeRef::Named {
            name,
            span: self.span_from(start),
        })
    }

    // ── Statements ─────────────────────────────────────────────────

    fn parse_block(&mut self) -> PResult<Block> {
        self.nested("block", Self::parse_block_inner)
    }

    fn parse_block_inner(&mut self) -> PResult<Block> {
        let start = self.expect(&TokenKind::LBrace)?.span;
        let mut stmts = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::RBrace => break,
                TokenKind::Eof => {
                    return Err(ParseError::new(
                        "`}` expected",
                        self.peek_span(),
                    ));
                }
                _ => {}
            }
            let before = self.pos;
            match self.parse_statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.error(err);
                    self.synchronize();
                    if self.pos == before {
                        self.advance();
                    }
                }
            }
        }
        self.advance();
        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    pub fn parse_statement(&mut self) -> PResult<Stmt> {
        let start = self.peek_span();
        let kind = match self.peek_kind() {
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if()?,
            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                let cond = self.parse_condition()?;
                let body = self.parse_body()?;
                StmtKind::While { cond, body }
            }
            TokenKind::Keyword(Keyword::Do) => {
                self.advance();
                let body = self.parse_body()?;
                self.expect(&TokenKind::Keyword(Keyword::While))?;
                let cond = self.parse_condition()?;
                self.expect(&TokenKind::Semicolon)?;
                StmtKind::DoWhile { body, cond }
            }
            TokenKind::Keyword(Keyword::For) => self.parse_for()?,
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                self.expect(&TokenKind::Semicolon)?;
                StmtKind::Break
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                self.expect(&TokenKind::Semicolon)?;
                StmtKind::Continue
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon)?;
                StmtKind::Return(value)
            }
            _ if self.at_local_declaration() => {
                let kind = self.parse_local()?;
                self.expect(&TokenKind::Semicolon)?;
                kind
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon)?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt::new(kind, self.span_from(start)))
    }

    fn parse_condition(&mut self) -> PResult<Expr> {
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        Ok(cond)
    }

    fn parse_if(&mut self) -> PResult<StmtKind> {
        self.advance();
        let cond = self.parse_condition()?;
        let then = self.parse_body()?;
        let otherwise = if self.eat(&TokenKind::Keyword(Keyword::Else)) {
            Some(self.parse_body()?)
        } else {
            None
        };
        Ok(StmtKind::If {
            cond,
            then,
            otherwise,
        })
    }

    fn parse_for(&mut self) -> PResult<StmtKind> {
        self.advance();
        self.expect(&TokenKind::LParen)?;

        let mut init = Vec::new();
        if !self.check(&TokenKind::Semicolon) {
            let start = self.peek_span();
            if self.at_local_declaration() {
                let kind = self.parse_local()?;
                init.push(Stmt::new(kind, self.span_from(start)));
            } else {
                for expr in self.parse_expr_list(&TokenKind::Semicolon)? {
                    let span = expr.span;
                    init.push(Stmt::new(StmtKind::Expr(expr), span));
                }
            }
        }
        self.expect(&TokenKind::Semicolon)?;

        let cond = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let step = if self.check(&TokenKind::RParen) {
            Vec::new()
        } else {
            self.parse_expr_list(&TokenKind::RParen)?
        };
        self.expect(&TokenKind::RParen)?;

        let body = self.parse_body()?;
        Ok(StmtKind::For {
            init,
            cond,
            step,
            body,
        })
    }

    fn parse_expr_list(&mut self, terminator: &TokenKind) -> PResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while !self.check(terminator) && self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    /// `var x`, `T x`, `Ns.T x` or `T<U> x` starts a local declaration.
    fn at_local_declaration(&self) -> bool {
        if self.check_keyword(Keyword::Var) {
            return matches!(self.peek_nth(1), TokenKind::Ident(_));
        }
        let mut n = 0;
        if !matches!(self.peek_nth(n), TokenKind::Ident(_)) {
            return false;
        }
        n += 1;
        while self.peek_nth(n) == &TokenKind::Dot
            && matches!(self.peek_nth(n + 1), TokenKind::Ident(_))
        {
            n += 2;
        }
        if self.peek_nth(n) == &TokenKind::Lt
            && matches!(self.peek_nth(n + 1), TokenKind::Ident(_))
            && self.peek_nth(n + 2) == &TokenKind::Gt
        {
            n += 3;
        }
        matches!(self.peek_nth(n), TokenKind::Ident(_))
    }

    fn parse_local(&mut self) -> PResult<StmtKind> {
        let ty = self.parse_type()?;
        let mut declarators = Vec::new();
        loop {
            let (name, start) = self.expect_ident()?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            declarators.push(Declarator {
                name,
                init,
                span: self.span_from(start),
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(StmtKind::Local { ty, declarators })
    }

    // ── Expressions ────────────────────────────────────────────────

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        let target = self.parse_conditional()?;
        let op = match self.peek_kind() {
            TokenKind::Assign => None,
            TokenKind::CompoundAssign(op) => Some(*op),
            _ => return self.bounded(target),
        };
        self.advance();
        let value = self.nested("expression", Self::parse_expr)?;
        let span = target.span.to(value.span);
        self.bounded(Expr::new(
            ExprKind::Assign {
                target: Box::new(target),
                op,
                value: Box::new(value),
            },
            span,
        ))
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let cond = self.parse_logical(LogicalOp::Or)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let then = self.nested("expression", Self::parse_expr)?;
        self.expect(&TokenKind::Colon)?;
        let otherwise = self.nested("expression", Self::parse_conditional)?;
        let span = cond.span.to(otherwise.span);
        Ok(Expr::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            span,
        ))
    }

    fn parse_logical(&mut self, op: LogicalOp) -> PResult<Expr> {
        let (token, next) = match op {
            LogicalOp::Or => (TokenKind::PipePipe, Some(LogicalOp::And)),
            LogicalOp::And => (TokenKind::AmpAmp, None),
        };
        let operand = |p: &mut Self| match next {
            Some(next) => p.parse_logical(next),
            None => p.parse_binary(0),
        };
        let mut lhs = operand(self)?;
        while self.eat(&token) {
            let rhs = operand(self)?;
            let span = lhs.span.to(rhs.span);
            lhs = self.bounded(Expr::new(
                ExprKind::Logical {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            ))?;
        }
        Ok(lhs)
    }

    fn parse_binary(&mut self, tier: usize) -> PResult<Expr> {
        if tier == BINARY_TIERS {
            return self.parse_unary();
        }
        let mut lhs = self.parse_binary(tier + 1)?;
        loop {
            let Some(op) = binary_op(tier, self.peek_kind()) else {
                return Ok(lhs);
            };
            self.advance();
            let rhs = self.parse_binary(tier + 1)?;
            let span = lhs.span.to(rhs.span);
            lhs = self.bounded(Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            ))?;
        }
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.peek_span();
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let increment = self.advance().kind == TokenKind::PlusPlus;
                let target = self.nested("expression", Self::parse_unary)?;
                return Ok(Expr::new(
                    ExprKind::Step {
                        target: Box::new(target),
                        increment,
                        prefix: true,
                    },
                    self.span_from(start),
                ));
            }
            TokenKind::LParen if self.at_cast() => {
                self.advance();
                let ty = self.parse_type()?;
                self.expect(&TokenKind::RParen)?;
                let expr = self.nested("expression", Self::parse_unary)?;
                return Ok(Expr::new(
                    ExprKind::Cast {
                        ty,
                        expr: Box::new(expr),
                    },
                    self.span_from(start),
                ));
            }
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_postfix();
        };
        if op == UnaryOp::Neg {
            if let Some(lit) = self.negated_min_value() {
                self.advance();
                self.advance();
                return Ok(Expr::new(ExprKind::Literal(lit), self.span_from(start)));
            }
        }
        self.advance();
        let operand = self.nested("expression", Self::parse_unary)?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            self.span_from(start),
        ))
    }

    /// `int.MinValue` or `long.MinValue` written as a literal, with the
    /// parser sitting on the minus sign.
    fn negated_min_value(&self) -> Option<Literal> {
        match self.peek_nth(1) {
            TokenKind::Int(2_147_483_648) => Some(Literal::Int(i32::MIN)),
            TokenKind::Int(i64::MIN) | TokenKind::Long(i64::MIN) => Some(Literal::Long(i64::MIN)),
            _ => None,
        }
    }

    /// `(T)` followed by an operand. Primitive keywords always cast;
    /// vector types only when an operand clearly follows.
    fn at_cast(&self) -> bool {
        let TokenKind::Ident(name) = self.peek_nth(1) else {
            return false;
        };
        if self.peek_nth(2) != &TokenKind::RParen {
            return false;
        }
        if RuntimeType::from_primitive(name).is_some() {
            return true;
        }
        if RuntimeType::from_name(name).is_none() {
            return false;
        }
        matches!(
            self.peek_nth(3),
            TokenKind::Ident(_)
                | TokenKind::LParen
                | TokenKind::Keyword(Keyword::New)
                | TokenKind::Int(_)
                | TokenKind::Long(_)
                | TokenKind::Float(_)
                | TokenKind::Double(_)
        )
    }

    /// `<T>(` after a callee name.
    fn at_generic_call(&self) -> bool {
        self.peek_kind() == &TokenKind::Lt
            && matches!(self.peek_nth(1), TokenKind::Ident(_))
            && self.peek_nth(2) == &TokenKind::Gt
            && self.peek_nth(3) == &TokenKind::LParen
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let (name, name_span) = self.expect_ident()?;
                    let span = expr.span.to(name_span);
                    expr = self.bounded(Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            name,
                        },
                        span,
                    ))?;
                }
                TokenKind::LParen => {
                    expr = self.parse_call(expr, None)?;
                }
                TokenKind::Lt if self.at_generic_call() => {
                    self.advance();
                    let ty = self.parse_type()?;
                    self.expect(&TokenKind::Gt)?;
                    expr = self.parse_call(expr, Some(ty))?;
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let tok = self.advance();
                    let span = expr.span.to(tok.span);
                    expr = self.bounded(Expr::new(
                        ExprKind::Step {
                            target: Box::new(expr),
                            increment: tok.kind == TokenKind::PlusPlus,
                            prefix: false,
                        },
                        span,
                    ))?;
                }
                TokenKind::LBracket => {
                    return Err(ParseError::new(
                        "element access is not supported",
                        self.peek_span(),
                    ));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_call(&mut self, callee: Expr, type_arg: Option<TypeRef>) -> PResult<Expr> {
        self.expect(&TokenKind::LParen)?;
        let args = self.parse_args()?;
        let span = self.span_from(callee.span);
        self.bounded(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                type_arg,
                args,
            },
            span,
        ))
    }

    /// Arguments after `(` up to and including `)`.
    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        self.nested("expression", Self::parse_args_inner)
    }

    fn parse_args_inner(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen)?;
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        // Closers are left in place for recovery to find.
        if matches!(
            self.peek_kind(),
            TokenKind::Semicolon
                | TokenKind::RParen
                | TokenKind::RBrace
                | TokenKind::RBracket
                | TokenKind::Comma
                | TokenKind::Eof
        ) {
            return Err(ParseError::new(
                format!("invalid expression term {}", self.peek_kind().name()),
                self.peek_span(),
            ));
        }
        let tok = self.advance();
        let span = tok.span;
        let literal =
            |lit: Literal| -> PResult<Expr> { Ok(Expr::new(ExprKind::Literal(lit), span)) };
        match tok.kind {
            TokenKind::Int(i64::MIN) | TokenKind::Long(i64::MIN) => Err(ParseError::new(
                "integral constant is too large",
                tok.span,
            )),
            TokenKind::Int(v) => match i32::try_from(v) {
                Ok(v) => literal(Literal::Int(v)),
                Err(_) => literal(Literal::Long(v)),
            },
            TokenKind::Long(v) => literal(Literal::Long(v)),
            TokenKind::Float(v) => literal(Literal::Float(v)),
            TokenKind::Double(v) => literal(Literal::Double(v)),
            TokenKind::Char(c) => literal(Literal::Char(c)),
            TokenKind::Str(ref s) => literal(Literal::Str(s.clone())),
            TokenKind::Keyword(Keyword::True) => literal(Literal::Bool(true)),
            TokenKind::Keyword(Keyword::False) => literal(Literal::Bool(false)),
            TokenKind::Keyword(Keyword::Null) => literal(Literal::Null),
            TokenKind::Interpolated(segments) => {
                let segments = self.parse_segments(segments)?;
                Ok(Expr::new(ExprKind::Interpolated(segments), tok.span))
            }
            TokenKind::Ident(name)
                if name == "this" && self.check(&TokenKind::Dot) =>
            {
                self.advance();
                let (name, span) = self.expect_ident()?;
                Ok(Expr::new(ExprKind::Name(name), tok.span.to(span)))
            }
            TokenKind::Ident(name) => Ok(Expr::new(ExprKind::Name(name), tok.span)),
            TokenKind::LParen => {
                let inner = self.nested("expression", Self::parse_expr)?;
                self.expect(&TokenKind::RParen)?;
                Ok(Expr::new(inner.kind, self.span_from(tok.span)))
            }
            TokenKind::Keyword(Keyword::New) => {
                let ty = self.parse_type()?;
                if !self.check(&TokenKind::LParen) {
                    return Err(ParseError::new(
                        format!("`(` expected after `new {}`", ty.name()),
                        self.peek_span(),
                    ));
                }
                self.advance();
                let args = self.parse_args()?;
                Ok(Expr::new(
                    ExprKind::New { ty, args },
                    self.span_from(tok.span),
                ))
            }
            other => Err(ParseError::new(
                format!("invalid expression term {}", other.name()),
                tok.span,
            )),
        }
    }

    fn parse_segments(&mut self, raw: Vec<RawSegment>) -> PResult<Vec<Segment>> {
        let mut segments = Vec::with_capacity(raw.len());
        for segment in raw {
            match segment {
                RawSegment::Text(text) => segments.push(Segment::Text(text)),
                RawSegment::Code { code, at, format } => {
                    let mut inner = Parser::new(Lexer::at(&code, at));
                    inner.depth = self.depth;
                    let expr = inner.nested("expression", Self::parse_expr);
                    let trailing = inner.expect(&TokenKind::Eof).err();
                    self.diagnostics.append(&mut inner.diagnostics);
                    let expr = expr?;
                    if let Some(err) = trailing {
                        return Err(err);
                    }
                    segments.push(Segment::Expr { expr, format });
                }
            }
        }
        Ok(segments)
    }
}

fn too_deep(what: &str, span: Span) -> ParseError {
    ParseError::new(format!("{what} nested too deeply"), span)
}

/// Parse a whole unit. The tree is always returned; it is only
/// meaningful when no error diagnostics were produced.
pub fn parse(src: &str) -> (Unit, Vec<Diagnostic>) {
    let mut parser = Parser::new(Lexer::new(src));
    let unit = parser.parse_unit();
    (unit, parser.into_diagnostics())
}
