use crate::language::{
    ast::*,
    errors::SyntaxError,
    interpolation::interpolate,
    span::{LeafNode, Position},
    token::{Token, TokenKind},
    types::{
        AliasType, ArrayType, ContractMember, ContractType, FunctionType, GenericType,
        GetterType, MethodSignature, StructMember, StructType, TypeNode, TypeParameter,
        UnionType, VarModifier, PRIMITIVE_TYPES,
    },
};
use std::collections::HashSet;
use tracing::{debug, trace};

#[cfg(test)]
mod tests;

type ParseResult<T> = Result<T, SyntaxError>;

#[derive(Debug)]
struct LoopFrame {
    id: String,
    label: Option<String>,
}

/// Parse-time view of the enclosing loops, used to bind `break` and `skip`.
#[derive(Debug, Default)]
struct LoopTracker {
    frames: Vec<LoopFrame>,
    next_id: usize,
}

enum LoopLookup<'a> {
    Found(&'a str),
    OutsideLoop,
    UnknownLabel,
}

impl LoopTracker {
    fn enter(&mut self, label: Option<String>) -> String {
        self.next_id += 1;
        let id = format!("loop_{}", self.next_id);
        self.frames.push(LoopFrame {
            id: id.clone(),
            label,
        });
        id
    }

    fn exit(&mut self) {
        self.frames.pop();
    }

    fn resolve(&self, label: Option<&str>) -> LoopLookup<'_> {
        let Some(innermost) = self.frames.last() else {
            return LoopLookup::OutsideLoop;
        };
        match label {
            None => LoopLookup::Found(&innermost.id),
            Some(label) => self
                .frames
                .iter()
                .rev()
                .find(|frame| frame.label.as_deref() == Some(label))
                .map(|frame| LoopLookup::Found(&frame.id))
                .unwrap_or(LoopLookup::UnknownLabel),
        }
    }
}

pub struct Parser {
    file: String,
    tokens: Vec<Token>,
    pos: usize,
    loops: LoopTracker,
    no_struct_literal: bool,
    aliases: HashSet<String>,
}

impl Parser {
    pub fn new(file: impl Into<String>, mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::EOF) {
            let position = tokens.last().map(|t| t.position).unwrap_or_default();
            tokens.push(Token::new(TokenKind::EOF, "EndOfFile", position));
        }
        Self {
            file: file.into(),
            tokens,
            pos: 0,
            loops: LoopTracker::default(),
            no_struct_literal: false,
            aliases: HashSet::new(),
        }
    }

    pub fn produce_ast(mut self) -> ParseResult<Program> {
        let mut body = Vec::new();
        while !self.check(TokenKind::EOF) {
            if self.matches(TokenKind::Semicolon) {
                continue;
            }
            body.push(self.parse_stmt()?);
        }
        debug!(file = %self.file, statements = body.len(), "parsed program");
        Ok(Program {
            file: self.file,
            body,
        })
    }

    /// Parses a single expression that must span the whole token stream.
    pub fn produce_expression(mut self) -> ParseResult<Expr> {
        let expr = self.parse_expr()?;
        if !self.check(TokenKind::EOF) {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expr)
    }

    // ---- token helpers -------------------------------------------------

    fn at(&self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn peek_kind(&self, ahead: usize) -> TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        self.tokens[idx].kind
    }

    fn previous(&self) -> &Token {
        let idx = self.pos.saturating_sub(1).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn eat(&mut self) -> Token {
        let token = self.at().clone();
        if token.kind != TokenKind::EOF {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.at().kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.eat();
            true
        } else {
            false
        }
    }

    fn on_same_line(&self) -> bool {
        self.previous().position.end.line == self.at().position.start.line
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.eat())
        } else {
            Err(self.unexpected(&format!("'{}'", kind.describe())))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<LeafNode<String>> {
        if self.check(TokenKind::Identifier) {
            let token = self.eat();
            Ok(LeafNode::new(token.value, token.position))
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_word(&mut self, word: &str) -> ParseResult<Token> {
        if self.at().is_word(word) {
            Ok(self.eat())
        } else {
            Err(self.unexpected(&format!("'{word}'")))
        }
    }

    fn error(&self, message: impl Into<String>, position: Position) -> SyntaxError {
        SyntaxError::new(message, self.file.clone(), position)
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let token = self.at();
        let shown = if token.value.is_empty() {
            token.kind.describe().to_string()
        } else {
            token.value.clone()
        };
        let err = self.error(
            format!("Unexpected token '{shown}', expected {expected}"),
            token.position,
        );
        match token.kind {
            TokenKind::EOF => err.with_help("the file ended before this construct was closed"),
            TokenKind::Dedent => err.with_help("the indented block ended early; check its indentation"),
            _ => err,
        }
    }

    fn with_restriction<T>(
        &mut self,
        no_struct_literal: bool,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let saved = std::mem::replace(&mut self.no_struct_literal, no_struct_literal);
        let result = f(self);
        self.no_struct_literal = saved;
        result
    }

    fn within_loop<T>(
        &mut self,
        label: Option<String>,
        f: impl FnOnce(&mut Self, String) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let id = self.loops.enter(label);
        trace!(loop_id = %id, "entering loop");
        let result = f(self, id);
        self.loops.exit();
        result
    }

    // ---- statements ------------------------------------------------------

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        match self.at().kind {
            TokenKind::Let | TokenKind::Var | TokenKind::Const | TokenKind::Final => {
                self.parse_var_declaration()
            }
            TokenKind::Fn => self
                .parse_function_declaration(false)
                .map(Stmt::FunctionDeclaration),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => self.parse_break(),
            TokenKind::Skip => self.parse_skip(),
            TokenKind::Type => self.parse_type_declaration(),
            TokenKind::Alias => self.parse_alias_declaration(),
            TokenKind::Fulfill => self.parse_fulfillment(),
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        let close = if self.matches(TokenKind::OpenBrace) {
            TokenKind::CloseBrace
        } else if self.matches(TokenKind::Indent) {
            TokenKind::Dedent
        } else {
            return Err(self.unexpected("'{' or an indented block"));
        };

        self.with_restriction(false, |p| {
            let mut body = Vec::new();
            while !p.check(close) && !p.check(TokenKind::EOF) {
                if p.matches(TokenKind::Semicolon) {
                    continue;
                }
                body.push(p.parse_stmt()?);
            }
            p.expect(close)?;
            Ok(body)
        })
    }

    fn parse_var_declaration(&mut self) -> ParseResult<Stmt> {
        let keyword = self.eat();
        let modifier = match keyword.kind {
            TokenKind::Let if self.matches(TokenKind::Mut) => VarModifier::Variable,
            TokenKind::Let | TokenKind::Final => VarModifier::Final,
            TokenKind::Const => VarModifier::Constant,
            _ => VarModifier::Variable,
        };

        let mut declarations = vec![self.parse_binding(modifier)?];
        while self.matches(TokenKind::Comma) {
            declarations.push(self.parse_binding(modifier)?);
        }

        if declarations.len() == 1 {
            Ok(Stmt::VarDeclaration(declarations.remove(0)))
        } else {
            Ok(Stmt::MultiVarDeclaration(MultiVarDeclaration { declarations }))
        }
    }

    fn parse_binding(&mut self, modifier: VarModifier) -> ParseResult<VarDeclaration> {
        let name = self.expect_identifier("a variable name")?;
        let ty = if self.matches(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let value = if self.matches(TokenKind::Equals) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        if value.is_none() && modifier.requires_initializer() {
            return Err(self.error(
                format!(
                    "Must assign value to {} declaration \"{}\"",
                    modifier.keyword(),
                    name.value
                ),
                name.position,
            ));
        }
        Ok(VarDeclaration {
            modifier,
            name,
            ty,
            value,
        })
    }

    fn parse_function_declaration(&mut self, allow_receiver: bool) -> ParseResult<FunctionDeclaration> {
        let start = self.expect(TokenKind::Fn)?.position;
        let name = self.expect_identifier("a function name")?;
        let type_params = if self.check(TokenKind::Less) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        self.expect(TokenKind::OpenParen)?;
        let mut receiver = None;
        if allow_receiver && self.at().is_word("self") {
            let token = self.eat();
            receiver = Some(LeafNode::new(token.value, token.position));
            self.skip_receiver_annotation()?;
            if !self.check(TokenKind::CloseParen) {
                self.expect(TokenKind::Comma)?;
            }
        }
        let params = self.parse_params()?;
        self.expect(TokenKind::CloseParen)?;

        let return_type = if self.matches(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let enclosing = std::mem::take(&mut self.loops.frames);
        let body = self.parse_block();
        self.loops.frames = enclosing;
        let body = body?;

        Ok(FunctionDeclaration {
            name,
            type_params,
            receiver,
            params,
            return_type,
            body,
            position: start.to(self.previous().position),
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        while !self.check(TokenKind::CloseParen) {
            let name = self.expect_identifier("a parameter name")?;
            let ty = if self.matches(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let default = if self.matches(TokenKind::Equals) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(Param { name, ty, default });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let keyword = self.eat();
        let ends_here = matches!(
            self.at().kind,
            TokenKind::CloseBrace | TokenKind::Dedent | TokenKind::EOF | TokenKind::Semicolon
        );
        let value = if !ends_here && self.on_same_line() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let position = match &value {
            Some(expr) => keyword.position.to(expr.position()),
            None => keyword.position,
        };
        Ok(Stmt::Return(ReturnStatement { value, position }))
    }

    fn parse_condition(&mut self) -> ParseResult<Expr> {
        self.with_restriction(true, |p| p.parse_expr())
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::If)?;
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;
        let mut branches = vec![ConditionalBranch { condition, body }];
        let mut else_body = None;

        while self.matches(TokenKind::Else) {
            if self.matches(TokenKind::If) {
                let condition = self.parse_condition()?;
                let body = self.parse_block()?;
                branches.push(ConditionalBranch { condition, body });
                continue;
            }
            else_body = Some(self.parse_block()?);
            break;
        }

        Ok(Stmt::IfElse(IfElseStatement {
            branches,
            else_body,
        }))
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::While)?;
        self.within_loop(None, |p, loop_id| {
            let condition = p.parse_condition()?;
            let body = p.parse_block()?;
            Ok(Stmt::While(WhileStatement {
                loop_id,
                condition,
                body,
            }))
        })
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::For)?;
        let label = if self.at().is_word("label") && self.peek_kind(1) == TokenKind::Identifier {
            self.eat();
            Some(self.expect_identifier("a loop label")?)
        } else {
            None
        };

        self.within_loop(label.as_ref().map(|l| l.value.clone()), |p, loop_id| {
            if p.check(TokenKind::OpenBrace) || p.check(TokenKind::Indent) {
                let body = p.parse_block()?;
                return Ok(Stmt::For(ForStatement {
                    loop_id,
                    label,
                    init: None,
                    condition: None,
                    update: None,
                    body,
                }));
            }

            if p.starts_iteration() {
                return p.parse_for_iteration(loop_id, label);
            }

            let init = if matches!(
                p.at().kind,
                TokenKind::Let | TokenKind::Var | TokenKind::Const | TokenKind::Final
            ) {
                Some(p.with_restriction(true, |p| p.parse_var_declaration())?)
            } else {
                let expr = p.parse_condition()?;
                if !p.check(TokenKind::Semicolon) {
                    let body = p.parse_block()?;
                    return Ok(Stmt::For(ForStatement {
                        loop_id,
                        label,
                        init: None,
                        condition: Some(expr),
                        update: None,
                        body,
                    }));
                }
                Some(Stmt::Expr(expr))
            };

            p.expect(TokenKind::Semicolon)?;
            let condition = p.parse_condition()?;
            p.expect(TokenKind::Semicolon)?;
            let update = p.parse_condition()?;
            let body = p.parse_block()?;
            Ok(Stmt::For(ForStatement {
                loop_id,
                label,
                init: init.map(Box::new),
                condition: Some(condition),
                update: Some(update),
                body,
            }))
        })
    }

    fn starts_iteration(&self) -> bool {
        if self.peek_kind(0) != TokenKind::Identifier {
            return false;
        }
        self.peek_kind(1) == TokenKind::In
            || (self.peek_kind(1) == TokenKind::Comma
                && self.peek_kind(2) == TokenKind::Identifier
                && self.peek_kind(3) == TokenKind::In)
    }

    fn parse_for_iteration(
        &mut self,
        loop_id: String,
        label: Option<LeafNode<String>>,
    ) -> ParseResult<Stmt> {
        let first = self.expect_identifier("a loop variable")?;
        let (index, value) = if self.matches(TokenKind::Comma) {
            (Some(first), self.expect_identifier("a loop variable")?)
        } else {
            (None, first)
        };
        self.expect(TokenKind::In)?;

        let range_follows = self.at().is_word("range")
            && !matches!(
                self.peek_kind(1),
                TokenKind::OpenBrace | TokenKind::Indent | TokenKind::Dot | TokenKind::OpenBracket
            );
        if !range_follows {
            let iterable = self.parse_condition()?;
            let body = self.parse_block()?;
            return Ok(Stmt::ForIn(ForInStatement {
                loop_id,
                label,
                index,
                value,
                iterable,
                body,
            }));
        }

        self.eat();
        let start = self.parse_condition()?;
        let inclusive = if self.at().is_word("to") {
            false
        } else if self.at().is_word("through") {
            true
        } else {
            return Err(self.unexpected("'to' or 'through'"));
        };
        self.eat();
        let end = self.parse_condition()?;
        let step = if self.at().is_word("step") {
            self.eat();
            Some(self.parse_condition()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(Stmt::ForRange(ForRangeStatement {
            loop_id,
            label,
            index,
            value,
            start,
            end,
            inclusive,
            step,
            body,
        }))
    }

    fn parse_loop_target(&mut self) -> ParseResult<(String, Option<LeafNode<String>>, Position)> {
        let keyword = self.eat();
        let label = if self.check(TokenKind::Identifier) && self.on_same_line() {
            Some(self.expect_identifier("a loop label")?)
        } else {
            None
        };
        let position = match &label {
            Some(label) => keyword.position.to(label.position),
            None => keyword.position,
        };
        match self.loops.resolve(label.as_ref().map(|l| l.as_str())) {
            LoopLookup::Found(id) => Ok((id.to_string(), label, position)),
            LoopLookup::OutsideLoop => Err(self
                .error("Unexpected break/continue statement outside of loop.", position)
                .with_help("`break` and `skip` only work inside `for` and `while` bodies")),
            LoopLookup::UnknownLabel => Err(self
                .error(
                    format!(
                        "Invalid label '{}' for break/skip statement.",
                        label.as_ref().map(|l| l.as_str()).unwrap_or_default()
                    ),
                    position,
                )
                .with_help("name an enclosing loop declared with `for label <name>`")),
        }
    }

    fn parse_break(&mut self) -> ParseResult<Stmt> {
        let (loop_id, label, position) = self.parse_loop_target()?;
        Ok(Stmt::Break(BreakStatement {
            loop_id,
            label,
            position,
        }))
    }

    fn parse_skip(&mut self) -> ParseResult<Stmt> {
        let (loop_id, label, position) = self.parse_loop_target()?;
        Ok(Stmt::Continue(ContinueStatement {
            loop_id,
            label,
            position,
        }))
    }

    // ---- type declarations ----------------------------------------------

    fn parse_type_declaration(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::Type)?;
        let name = self.expect_identifier("a type name")?;
        let type_params = if self.check(TokenKind::Less) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        let definition = if self.matches(TokenKind::Struct) {
            TypeNode::Struct(self.parse_struct_body()?)
        } else if self.matches(TokenKind::Contract) {
            TypeNode::Contract(self.parse_contract_body()?)
        } else if self.matches(TokenKind::Equals) {
            self.parse_type()?
        } else if self.check(TokenKind::OpenBrace) || self.check(TokenKind::Indent) {
            TypeNode::Struct(self.parse_struct_body()?)
        } else {
            return Err(self.unexpected("'struct', 'contract', '=' or a member block"));
        };

        Ok(Stmt::TypeDeclaration(TypeDeclaration {
            name,
            type_params,
            definition,
        }))
    }

    fn parse_alias_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::Alias)?.position;
        let name = self.expect_identifier("an alias name")?;
        self.expect(TokenKind::Equals)?;
        let target = self.parse_type()?;

        if let TypeNode::Named(target_name) = &target {
            if self.aliases.contains(&target_name.value) {
                return Err(self.error(
                    format!(
                        "Alias {} cannot refer to another alias {}",
                        name.value, target_name.value
                    ),
                    target_name.position,
                ));
            }
        }
        self.aliases.insert(name.value.clone());

        let position = start.to(target.position());
        Ok(Stmt::TypeDeclaration(TypeDeclaration {
            name,
            type_params: Vec::new(),
            definition: TypeNode::Alias(AliasType {
                target: Box::new(target),
                position,
            }),
        }))
    }

    /// Runs `item` for each entry of a `{ ... }` or indented block.
    fn parse_member_block(
        &mut self,
        mut item: impl FnMut(&mut Self) -> ParseResult<()>,
    ) -> ParseResult<Position> {
        let open = self.at().position;
        let close = if self.matches(TokenKind::OpenBrace) {
            TokenKind::CloseBrace
        } else if self.matches(TokenKind::Indent) {
            TokenKind::Dedent
        } else {
            return Err(self.unexpected("'{' or an indented block"));
        };
        while !self.check(close) && !self.check(TokenKind::EOF) {
            if self.matches(TokenKind::Comma) || self.matches(TokenKind::Semicolon) {
                continue;
            }
            item(self)?;
        }
        let end = self.expect(close)?.position;
        Ok(open.to(end))
    }

    fn parse_struct_body(&mut self) -> ParseResult<StructType> {
        let mut members = Vec::new();
        let position = self.parse_member_block(|p| {
            let name = p.expect_identifier("a field name")?;
            let optional = p.matches(TokenKind::Question);
            p.expect(TokenKind::Colon)?;
            let ty = p.parse_type()?;
            members.push(StructMember { name, ty, optional });
            Ok(())
        })?;
        Ok(StructType { members, position })
    }

    fn parse_contract_body(&mut self) -> ParseResult<ContractType> {
        let mut members = Vec::new();
        let position = self.parse_member_block(|p| {
            if p.matches(TokenKind::Fn) {
                let name = p.expect_identifier("a method name")?;
                p.expect(TokenKind::OpenParen)?;
                if p.at().is_word("self") {
                    p.eat();
                    p.skip_receiver_annotation()?;
                    if !p.check(TokenKind::CloseParen) {
                        p.expect(TokenKind::Comma)?;
                    }
                }
                let params = p
                    .parse_params()?
                    .into_iter()
                    .map(|param| param.ty)
                    .collect();
                p.expect(TokenKind::CloseParen)?;
                let return_type = if p.matches(TokenKind::Arrow) {
                    Some(p.parse_type()?)
                } else {
                    None
                };
                members.push(ContractMember::Method(MethodSignature {
                    name,
                    params,
                    return_type,
                }));
                Ok(())
            } else if p.at().is_word("get") {
                p.eat();
                let name = p.expect_identifier("a getter name")?;
                p.expect(TokenKind::Arrow)?;
                let return_type = p.parse_type()?;
                members.push(ContractMember::Getter(GetterType { name, return_type }));
                Ok(())
            } else {
                Err(p.unexpected("'fn' or 'get' in contract"))
            }
        })?;
        Ok(ContractType { members, position })
    }

    fn parse_fulfillment(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::Fulfill)?;
        let contract = self.expect_identifier("a contract name")?;
        self.expect(TokenKind::For)?;
        let target = self.expect_identifier("a struct name")?;

        let mut methods = Vec::new();
        let mut getters = Vec::new();
        self.parse_member_block(|p| {
            if p.check(TokenKind::Fn) {
                methods.push(p.parse_function_declaration(true)?);
                Ok(())
            } else if p.at().is_word("get") {
                p.eat();
                let name = p.expect_identifier("a getter name")?;
                p.expect(TokenKind::Arrow)?;
                let return_type = p.parse_type()?;
                let enclosing = std::mem::take(&mut p.loops.frames);
                let body = p.parse_block();
                p.loops.frames = enclosing;
                getters.push(GetterImpl {
                    name,
                    return_type,
                    body: body?,
                });
                Ok(())
            } else {
                Err(p.unexpected("'fn' or 'get' in fulfill block"))
            }
        })?;

        Ok(Stmt::ContractFulfillment(ContractFulfillment {
            contract,
            target,
            methods,
            getters,
        }))
    }

    fn parse_type_params(&mut self) -> ParseResult<Vec<TypeParameter>> {
        self.expect(TokenKind::Less)?;
        let mut params = Vec::new();
        loop {
            let name = self.expect_identifier("a type parameter")?;
            let constraint = if self.matches(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            params.push(TypeParameter { name, constraint });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Greater)?;
        Ok(params)
    }

    // ---- type syntax -------------------------------------------------------

    /// `self: Square` is accepted; the receiver is always the fulfilled struct.
    fn skip_receiver_annotation(&mut self) -> ParseResult<()> {
        if self.matches(TokenKind::Colon) {
            self.parse_type()?;
        }
        Ok(())
    }

    fn parse_type(&mut self) -> ParseResult<TypeNode> {
        let first = self.parse_postfix_type()?;
        if !self.check(TokenKind::Pipe) {
            return Ok(first);
        }
        let start = first.position();
        let mut members = vec![first];
        while self.matches(TokenKind::Pipe) {
            members.push(self.parse_postfix_type()?);
        }
        let position = start.to(self.previous().position);
        Ok(TypeNode::Union(UnionType { members, position }))
    }

    fn parse_postfix_type(&mut self) -> ParseResult<TypeNode> {
        let mut ty = self.parse_primary_type()?;
        while self.check(TokenKind::OpenBracket) && self.peek_kind(1) == TokenKind::CloseBracket {
            self.eat();
            let close = self.eat();
            let position = ty.position().to(close.position);
            ty = TypeNode::Array(ArrayType {
                element: Box::new(ty),
                position,
            });
        }
        Ok(ty)
    }

    fn parse_primary_type(&mut self) -> ParseResult<TypeNode> {
        match self.at().kind {
            TokenKind::Identifier => {
                let name = self.expect_identifier("a type")?;
                if PRIMITIVE_TYPES.contains(&name.as_str()) {
                    return Ok(TypeNode::Primitive(name));
                }
                if !self.matches(TokenKind::Less) {
                    return Ok(TypeNode::Named(name));
                }
                let mut args = vec![self.parse_type()?];
                while self.matches(TokenKind::Comma) {
                    args.push(self.parse_type()?);
                }
                self.expect(TokenKind::Greater)?;
                Ok(TypeNode::Generic(GenericType { name, args }))
            }
            TokenKind::Fn => {
                let start = self.eat().position;
                self.expect(TokenKind::OpenParen)?;
                let mut params = Vec::new();
                while !self.check(TokenKind::CloseParen) {
                    params.push(self.parse_type()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::CloseParen)?;
                let return_type = if self.matches(TokenKind::Arrow) {
                    Some(Box::new(self.parse_type()?))
                } else {
                    None
                };
                Ok(TypeNode::Function(FunctionType {
                    params,
                    return_type,
                    position: start.to(self.previous().position),
                }))
            }
            TokenKind::OpenParen => {
                self.eat();
                let inner = self.parse_type()?;
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected("a type")),
        }
    }

    // ---- expressions -------------------------------------------------------

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        let left = self.parse_or()?;
        let compound = match self.at().kind {
            TokenKind::Equals => None,
            TokenKind::PlusEquals => Some(BinaryOp::Add),
            TokenKind::MinusEquals => Some(BinaryOp::Sub),
            TokenKind::StarEquals => Some(BinaryOp::Mul),
            TokenKind::SlashEquals => Some(BinaryOp::Div),
            _ => return Ok(left),
        };
        let operator = self.eat();
        if !matches!(left, Expr::Identifier(_) | Expr::Member(_)) {
            return Err(self.error(
                format!("Invalid assignment target '{}'", left.kind()),
                operator.position,
            ));
        }

        let value = self.parse_assignment()?;
        let value = match compound {
            Some(op) => Expr::Binary(BinaryExpr {
                left: Box::new(left.clone()),
                op,
                right: Box::new(value),
            }),
            None => value,
        };
        Ok(Expr::Assignment(AssignmentExpr {
            assignee: Box::new(left),
            value: Box::new(value),
        }))
    }

    fn parse_binary_tier(
        &mut self,
        operand: fn(&mut Self) -> ParseResult<Expr>,
        operator: fn(TokenKind) -> Option<BinaryOp>,
    ) -> ParseResult<Expr> {
        let mut left = operand(self)?;
        while let Some(op) = operator(self.at().kind) {
            self.eat();
            let right = operand(self)?;
            left = Expr::Binary(BinaryExpr {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        self.parse_binary_tier(Self::parse_and, |kind| match kind {
            TokenKind::OrOr | TokenKind::Or => Some(BinaryOp::Or),
            _ => None,
        })
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        self.parse_binary_tier(Self::parse_equality, |kind| match kind {
            TokenKind::AndAnd | TokenKind::And => Some(BinaryOp::And),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        self.parse_binary_tier(Self::parse_relational, |kind| match kind {
            TokenKind::EqualsEquals => Some(BinaryOp::Eq),
            TokenKind::NotEquals => Some(BinaryOp::NotEq),
            _ => None,
        })
    }

    fn parse_relational(&mut self) -> ParseResult<Expr> {
        self.parse_binary_tier(Self::parse_additive, |kind| match kind {
            TokenKind::Less => Some(BinaryOp::Lt),
            TokenKind::Greater => Some(BinaryOp::Gt),
            TokenKind::LessEquals => Some(BinaryOp::LtEq),
            TokenKind::GreaterEquals => Some(BinaryOp::GtEq),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        self.parse_binary_tier(Self::parse_multiplicative, |kind| match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        self.parse_binary_tier(Self::parse_exponent, |kind| match kind {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Mod),
            _ => None,
        })
    }

    fn parse_exponent(&mut self) -> ParseResult<Expr> {
        let base = self.parse_unary()?;
        if !self.matches(TokenKind::Power) {
            return Ok(base);
        }
        let exponent = self.parse_exponent()?;
        Ok(Expr::Binary(BinaryExpr {
            left: Box::new(base),
            op: BinaryOp::Pow,
            right: Box::new(exponent),
        }))
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.at().kind {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang | TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_call_member(),
        };
        let start = self.eat().position;
        let operand = self.parse_unary()?;
        let position = start.to(operand.position());
        Ok(Expr::Unary(UnaryExpr {
            op,
            operand: Box::new(operand),
            position,
        }))
    }

    fn parse_call_member(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::Dot) {
                let property = self.expect_identifier("a property name")?;
                let position = expr.position().to(property.position);
                expr = Expr::Member(MemberExpr {
                    object: Box::new(expr),
                    property: Box::new(Expr::Identifier(property)),
                    computed: false,
                    position,
                });
            } else if self.check(TokenKind::OpenBracket) && self.on_same_line() {
                self.eat();
                let property = self.with_restriction(false, |p| p.parse_expr())?;
                let close = self.expect(TokenKind::CloseBracket)?;
                let position = expr.position().to(close.position);
                expr = Expr::Member(MemberExpr {
                    object: Box::new(expr),
                    property: Box::new(property),
                    computed: true,
                    position,
                });
            } else if self.check(TokenKind::OpenParen) && self.on_same_line() {
                self.eat();
                let args = self.with_restriction(false, |p| {
                    let mut args = Vec::new();
                    while !p.check(TokenKind::CloseParen) {
                        args.push(p.parse_expr()?);
                        if !p.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                    Ok(args)
                })?;
                let close = self.expect(TokenKind::CloseParen)?;
                let position = expr.position().to(close.position);
                expr = Expr::Call(CallExpr {
                    caller: Box::new(expr),
                    args,
                    position,
                });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let token = self.at().clone();
        match token.kind {
            TokenKind::Number => {
                self.eat();
                let value = token.value.parse::<f64>().map_err(|_| {
                    self.error(format!("Invalid number '{}'", token.value), token.position)
                })?;
                Ok(Expr::NumericLiteral(LeafNode::new(value, token.position)))
            }
            TokenKind::String => {
                self.eat();
                let literal = interpolate(&token.value, &self.file, token.position)?;
                Ok(Expr::StringLiteral(literal))
            }
            TokenKind::Identifier => {
                if !self.no_struct_literal {
                    if self.peek_kind(1) == TokenKind::Less {
                        if let Some(instance) = self.try_generic_instance()? {
                            return Ok(instance);
                        }
                    }
                    if self.peek_kind(1) == TokenKind::OpenBrace {
                        let name = self.expect_identifier("a struct name")?;
                        return self.parse_object_literal(Some(name), Vec::new());
                    }
                }
                self.eat();
                Ok(Expr::Identifier(LeafNode::new(token.value, token.position)))
            }
            TokenKind::OpenBrace if !self.no_struct_literal => {
                self.parse_object_literal(None, Vec::new())
            }
            TokenKind::OpenBracket => {
                self.eat();
                let elements = self.with_restriction(false, |p| {
                    let mut elements = Vec::new();
                    while !p.check(TokenKind::CloseBracket) {
                        elements.push(p.parse_expr()?);
                        if !p.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                    Ok(elements)
                })?;
                let close = self.expect(TokenKind::CloseBracket)?;
                Ok(Expr::ArrayLiteral(ArrayLiteral {
                    elements,
                    position: token.position.to(close.position),
                }))
            }
            TokenKind::OpenParen => {
                self.eat();
                let expr = self.with_restriction(false, |p| p.parse_expr())?;
                self.expect(TokenKind::CloseParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// `Name<T, ...> { ... }`. Falls back (returning `None`) when the `<` turns out
    /// to be a comparison.
    fn try_generic_instance(&mut self) -> ParseResult<Option<Expr>> {
        let checkpoint = self.pos;
        let name = self.expect_identifier("a struct name")?;
        self.eat();

        let mut args = Vec::new();
        loop {
            match self.parse_type() {
                Ok(ty) => args.push(ty),
                Err(_) => {
                    self.pos = checkpoint;
                    return Ok(None);
                }
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        if !self.matches(TokenKind::Greater) || !self.check(TokenKind::OpenBrace) {
            self.pos = checkpoint;
            return Ok(None);
        }
        self.parse_object_literal(Some(name), args).map(Some)
    }

    fn parse_object_literal(
        &mut self,
        instance_of: Option<LeafNode<String>>,
        type_args: Vec<TypeNode>,
    ) -> ParseResult<Expr> {
        let start = instance_of
            .as_ref()
            .map(|name| name.position)
            .unwrap_or(self.at().position);
        self.expect(TokenKind::OpenBrace)?;
        let properties = self.with_restriction(false, |p| {
            let mut properties = Vec::new();
            while !p.check(TokenKind::CloseBrace) {
                let key = p.expect_identifier("a property name")?;
                let value = if p.matches(TokenKind::Colon) {
                    Some(p.parse_expr()?)
                } else {
                    None
                };
                properties.push(Property { key, value });
                if !p.matches(TokenKind::Comma) && !p.check(TokenKind::Identifier) {
                    break;
                }
            }
            Ok(properties)
        })?;
        let close = self.expect(TokenKind::CloseBrace)?;
        Ok(Expr::ObjectLiteral(ObjectLiteral {
            instance_of,
            type_args,
            properties,
            position: start.to(close.position),
        }))
    }
}
