//! Recursive-descent parser
//!
//! Consumes the token stream from [`crate::lexer::tokenize`] and builds the
//! root [`Body`]. The first structural mismatch aborts parsing.
//!
//! Expression precedence, loosest first: `or`, `and`, `not`, comparisons
//! (`== != < <= > >= in`, `not in`), `+ -`, `* / %`, unary `-`, postfix
//! (call, index, attribute), primary.

use std::sync::Arc;

use crate::ast::{
    BinaryOperator, Body, Branch, CallArgument, MacroDef, MacroParameter, Node, UnaryOperator,
};
use crate::error::JinjaError;
use crate::lexer::{Position, Token, TokenKind};
use crate::value::Value;

type ParseResult<T> = Result<T, JinjaError>;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let end = tokens.last().map(|t| t.start).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "", end));
        }
        Self { tokens, pos: 0 }
    }

    /// Parse the whole token stream into the root body
    pub fn parse(mut self) -> ParseResult<Body> {
        let position = self.peek().start;
        let (body, _) = self.parse_nodes(position, &[])?;
        Ok(body)
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_nth_kind(&self, n: usize) -> TokenKind {
        let last = self.tokens.len() - 1;
        self.tokens[(self.pos + n).min(last)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    fn unexpected(&self, expected: impl Into<String>) -> JinjaError {
        let token = self.peek();
        JinjaError::Parse {
            position: token.start,
            expected: expected.into(),
            found: token.describe(),
        }
    }

    /// Parse nodes until end of input or a `{% <terminator>` tag. The
    /// terminator keyword is consumed and returned; its `%}` is not.
    fn parse_nodes(
        &mut self,
        position: Position,
        terminators: &[TokenKind],
    ) -> ParseResult<(Body, Option<Token>)> {
        let mut body = Body::new(position);

        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Eof => {
                    if terminators.is_empty() {
                        return Ok((body, None));
                    }
                    return Err(self.unexpected(describe_terminators(terminators)));
                }
                TokenKind::Text => {
                    self.advance();
                    body.append(Node::Text {
                        position: token.start,
                        text: token.text,
                    });
                }
                TokenKind::TrimmedWhitespace | TokenKind::Comment => {
                    self.advance();
                }
                TokenKind::ExprOpen => {
                    self.advance();
                    let expr = self.parse_expression()?;
                    self.expect(TokenKind::ExprClose)?;
                    body.append(Node::Output {
                        position: token.start,
                        expr: Box::new(expr),
                    });
                }
                TokenKind::StmtOpen => {
                    if terminators.contains(&self.peek_nth_kind(1)) {
                        self.advance();
                        let keyword = self.advance();
                        return Ok((body, Some(keyword)));
                    }
                    self.advance();
                    let node = self.parse_statement()?;
                    body.append(node);
                }
                _ => return Err(self.unexpected("template text or a tag")),
            }
        }
    }

    /// Parse the body of a block statement, which must end in a terminator
    fn parse_block(&mut self, terminators: &[TokenKind]) -> ParseResult<(Body, Token)> {
        let position = self.peek().start;
        match self.parse_nodes(position, terminators)? {
            (body, Some(end)) => Ok((body, end)),
            (_, None) => Err(self.unexpected(describe_terminators(terminators))),
        }
    }

    fn parse_statement(&mut self) -> ParseResult<Node> {
        let keyword = self.advance();
        match keyword.kind {
            TokenKind::If => self.parse_if(keyword.start),
            TokenKind::For => self.parse_for(keyword.start),
            TokenKind::Macro => self.parse_macro(keyword.start),
            TokenKind::Set => self.parse_set(keyword.start),
            _ => Err(JinjaError::Parse {
                position: keyword.start,
                expected: "statement keyword (`if`, `for`, `macro` or `set`)".to_string(),
                found: keyword.describe(),
            }),
        }
    }

    fn parse_if(&mut self, position: Position) -> ParseResult<Node> {
        const ARMS: &[TokenKind] = &[TokenKind::Elif, TokenKind::Else, TokenKind::EndIf];

        let mut branches = Vec::new();
        let mut otherwise = None;

        let condition = self.parse_expression()?;
        self.expect(TokenKind::StmtClose)?;
        let (body, mut end) = self.parse_block(ARMS)?;
        branches.push(Branch { condition, body });

        loop {
            match end.kind {
                TokenKind::Elif => {
                    let condition = self.parse_expression()?;
                    self.expect(TokenKind::StmtClose)?;
                    let (body, next) = self.parse_block(ARMS)?;
                    branches.push(Branch { condition, body });
                    end = next;
                }
                TokenKind::Else => {
                    self.expect(TokenKind::StmtClose)?;
                    let (body, next) = self.parse_block(&[TokenKind::EndIf])?;
                    otherwise = Some(body);
                    end = next;
                }
                _ => {
                    self.expect(TokenKind::StmtClose)?;
                    break;
                }
            }
        }

        Ok(Node::If {
            position,
            branches,
            otherwise,
        })
    }

    fn parse_for(&mut self, position: Position) -> ParseResult<Node> {
        let mut targets = vec![self.expect(TokenKind::Identifier)?.text];
        if self.eat(TokenKind::Comma).is_some() {
            targets.push(self.expect(TokenKind::Identifier)?.text);
        }

        self.expect(TokenKind::In)?;
        let iterable = self.parse_expression()?;
        self.expect(TokenKind::StmtClose)?;

        let (body, _) = self.parse_block(&[TokenKind::EndFor])?;
        self.expect(TokenKind::StmtClose)?;

        Ok(Node::For {
            position,
            targets,
            iterable: Box::new(iterable),
            body,
        })
    }

    fn parse_macro(&mut self, position: Position) -> ParseResult<Node> {
        let name = self.expect(TokenKind::Identifier)?.text;
        self.expect(TokenKind::LParen)?;

        let mut parameters: Vec<MacroParameter> = Vec::new();
        while !self.check(TokenKind::RParen) {
            let token = self.expect(TokenKind::Identifier)?;
            if parameters.iter().any(|p| p.name == token.text) {
                return Err(JinjaError::Parse {
                    position: token.start,
                    expected: "a unique parameter name".to_string(),
                    found: token.describe(),
                });
            }

            let default = match self.eat(TokenKind::Assign) {
                Some(_) => Some(self.parse_literal()?),
                None => None,
            };
            parameters.push(MacroParameter {
                name: token.text,
                default,
            });

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::StmtClose)?;

        let (body, _) = self.parse_block(&[TokenKind::EndMacro])?;
        self.expect(TokenKind::StmtClose)?;

        Ok(Node::Macro(Arc::new(MacroDef {
            position,
            name,
            parameters,
            body,
        })))
    }

    fn parse_set(&mut self, position: Position) -> ParseResult<Node> {
        let name = self.expect(TokenKind::Identifier)?.text;
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::StmtClose)?;

        Ok(Node::Set {
            position,
            name,
            value: Box::new(value),
        })
    }

    /// Macro parameter defaults: string, number (optionally negative) or boolean
    fn parse_literal(&mut self) -> ParseResult<Value> {
        const EXPECTED: &str = "literal default value (string, number or boolean)";

        let negative = self.eat(TokenKind::Minus).is_some();
        let token = self.peek().clone();
        let value = match token.kind {
            TokenKind::Number => {
                let n = self.parse_number(&token)?;
                Value::Number(if negative { -n } else { n })
            }
            _ if negative => return Err(self.unexpected("number")),
            TokenKind::String => Value::String(token.text),
            TokenKind::True => Value::Boolean(true),
            TokenKind::False => Value::Boolean(false),
            _ => return Err(self.unexpected(EXPECTED)),
        };
        self.advance();
        Ok(value)
    }

    fn parse_number(&self, token: &Token) -> ParseResult<f64> {
        token.text.parse().map_err(|_| JinjaError::Parse {
            position: token.start,
            expected: "number".to_string(),
            found: token.describe(),
        })
    }

    pub fn parse_expression(&mut self) -> ParseResult<Node> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_and()?;
        while let Some(op) = self.eat(TokenKind::Or) {
            let right = self.parse_and()?;
            left = binary(op.start, BinaryOperator::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_not()?;
        while let Some(op) = self.eat(TokenKind::And) {
            let right = self.parse_not()?;
            left = binary(op.start, BinaryOperator::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<Node> {
        if let Some(op) = self.eat(TokenKind::Not) {
            let operand = self.parse_not()?;
            return Ok(Node::UnaryOp {
                position: op.start,
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.peek_kind() {
                TokenKind::Eq => BinaryOperator::Eq,
                TokenKind::NotEq => BinaryOperator::NotEq,
                TokenKind::Lt => BinaryOperator::Lt,
                TokenKind::LtEq => BinaryOperator::LtEq,
                TokenKind::Gt => BinaryOperator::Gt,
                TokenKind::GtEq => BinaryOperator::GtEq,
                TokenKind::In => BinaryOperator::In,
                TokenKind::Not if self.peek_nth_kind(1) == TokenKind::In => {
                    self.advance();
                    BinaryOperator::NotIn
                }
                _ => break,
            };
            let token = self.advance();
            let right = self.parse_additive()?;
            left = binary(token.start, op, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            let token = self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(token.start, op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::Percent => BinaryOperator::Mod,
                _ => break,
            };
            let token = self.advance();
            let right = self.parse_unary()?;
            left = binary(token.start, op, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Node> {
        if let Some(op) = self.eat(TokenKind::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Node::UnaryOp {
                position: op.start,
                op: UnaryOperator::Neg,
                operand: Box::new(operand),
            });
        }
        if self.eat(TokenKind::Plus).is_some() {
            return self.parse_unary();
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Node> {
        let mut node = self.parse_primary()?;

        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let arguments = self.parse_arguments()?;
                    node = Node::FunctionCall {
                        position: node.position(),
                        callee: Box::new(node),
                        arguments,
                    };
                }
                TokenKind::LBracket => {
                    let open = self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket)?;
                    node = Node::Index {
                        position: open.start,
                        target: Box::new(node),
                        index: Box::new(index),
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect(TokenKind::Identifier)?;
                    node = Node::Attribute {
                        position: name.start,
                        target: Box::new(node),
                        name: name.text,
                    };
                }
                _ => return Ok(node),
            }
        }
    }

    /// Arguments after `(`, through the closing `)`
    fn parse_arguments(&mut self) -> ParseResult<Vec<CallArgument>> {
        let mut arguments = Vec::new();

        while !self.check(TokenKind::RParen) {
            let name = if self.check(TokenKind::Identifier)
                && self.peek_nth_kind(1) == TokenKind::Assign
            {
                let token = self.advance();
                let repeated = arguments
                    .iter()
                    .any(|arg: &CallArgument| arg.name.as_deref() == Some(token.text.as_str()));
                if repeated {
                    return Err(JinjaError::Parse {
                        position: token.start,
                        expected: "a unique argument name".to_string(),
                        found: token.describe(),
                    });
                }
                self.advance();
                Some(token.text)
            } else {
                None
            };

            let value = self.parse_expression()?;
            arguments.push(CallArgument { name, value });

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        self.expect(TokenKind::RParen)?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> ParseResult<Node> {
        let token = self.peek().clone();
        let position = token.start;

        let node = match token.kind {
            TokenKind::Number => Node::NumberLiteral {
                position,
                value: self.parse_number(&token)?,
            },
            TokenKind::String => Node::StringLiteral {
                position,
                value: token.text,
            },
            TokenKind::True => Node::BooleanLiteral {
                position,
                value: true,
            },
            TokenKind::False => Node::BooleanLiteral {
                position,
                value: false,
            },
            TokenKind::Identifier => Node::Variable {
                position,
                name: token.text,
            },
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(TokenKind::RBracket) {
                    items.push(self.parse_expression()?);
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                return Ok(Node::List { position, items });
            }
            _ => return Err(self.unexpected("expression")),
        };

        self.advance();
        Ok(node)
    }
}

fn binary(position: Position, op: BinaryOperator, left: Node, right: Node) -> Node {
    Node::BinaryOp {
        position,
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn describe_terminators(terminators: &[TokenKind]) -> String {
    let names: Vec<String> = terminators
        .iter()
        .map(|kind| format!("{{% {} %}}", kind.describe().trim_matches('`')))
        .collect();
    format!("`{}`", names.join("` or `"))
}
