//! Parsed templates

use crate::ast::Body;
use crate::context::ExecutionContext;
use crate::error::JinjaError;
use crate::lexer::tokenize;
use crate::parser::Parser;

/// A named, parsed template. Immutable once built, so one instance can be
/// rendered by several contexts at once.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub body: Body,
}

impl Template {
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, JinjaError> {
        let tokens = tokenize(source)?;
        let body = Parser::new(tokens).parse()?;
        Ok(Self {
            name: name.into(),
            body,
        })
    }

    /// Render into the context's current scope
    pub fn render(&self, ctx: &mut ExecutionContext<'_>) -> Result<String, JinjaError> {
        tracing::debug!(template = %self.name, "rendering template");
        ctx.render(&self.body)
    }
}
