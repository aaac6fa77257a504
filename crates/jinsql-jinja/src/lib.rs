//! Jinja-style template engine for SQL
//!
//! This crate handles:
//! - Tokenizing template text into positioned tokens
//! - Parsing tokens into an AST that renders back to source
//! - Evaluating the AST with lexically scoped macros
//! - Dispatching calls to built-in functions and user macros
//!
//! Names that are not bound in any scope are looked up through a host
//! supplied [`Resolver`], which is how macros defined in other files are found.

pub mod ast;
pub mod context;
pub mod error;
mod execute;
pub mod functions;
pub mod lexer;
mod operators;
pub mod parser;
pub mod template;
pub mod value;

pub use ast::{Body, MacroDef, Node};
pub use context::{ExecutionContext, Globals, Resolver, ScopeId, MAX_CALL_DEPTH};
pub use error::JinjaError;
pub use functions::{builtin_globals, string_argument};
pub use lexer::{tokenize, Position, Token, TokenKind};
pub use template::Template;
pub use value::{find_argument, Argument, Function, Value};

/// Parse and render `source` with the given globals and no resolver
pub fn render_str(source: &str, globals: &Globals) -> Result<String, JinjaError> {
    let template = Template::parse("<string>", source)?;
    let mut ctx = ExecutionContext::new(globals);
    template.render(&mut ctx)
}
