//! Execution context
//!
//! Scopes live in an arena owned by the context and refer to their parent by
//! index. A macro value records the index of the scope it was defined in, and
//! calling it pushes a scope whose parent is that index, so free names in a
//! macro body resolve where the macro was written rather than where it is
//! called.
//!
//! Name lookup walks the scope chain, then the values bound for this context
//! alone, then the shared globals, then asks the
//! [`Resolver`] for a template of that name. A resolved template is executed
//! once per context in its own root scope and the name is read from there.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::{Body, MacroDef, Node};
use crate::error::JinjaError;
use crate::lexer::Position;
use crate::template::Template;
use crate::value::{Argument, Function, Value};

/// Maximum number of nested macro calls
pub const MAX_CALL_DEPTH: usize = 100;

/// Values visible from every scope, shared read-only between contexts
pub type Globals = HashMap<String, Value>;

/// Host capability mapping a name to a parsed template
pub trait Resolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<Template>>;
}

/// Index of a scope in the context's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<String, Value>,
    parent: Option<ScopeId>,
}

pub struct ExecutionContext<'a> {
    /// Released slots are `None`; trailing released slots are popped
    scopes: Vec<Option<Scope>>,
    current: ScopeId,
    globals: &'a Globals,
    /// Per-render values, visible from every scope including imported roots
    overlay: HashMap<String, Value>,
    resolver: Option<&'a dyn Resolver>,
    /// Root scope of each template imported through the resolver
    imported: HashMap<String, ScopeId>,
    depth: usize,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(globals: &'a Globals) -> Self {
        Self {
            scopes: vec![Some(Scope::default())],
            current: ScopeId(0),
            globals,
            overlay: HashMap::new(),
            resolver: None,
            imported: HashMap::new(),
            depth: 0,
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn Resolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Bind a name for this context only, shadowing the shared globals.
    /// Unlike [`set_variable`](Self::set_variable) on the root scope, the
    /// binding is also seen by templates imported through the resolver.
    pub fn with_global(mut self, name: impl Into<String>, value: Value) -> Self {
        self.overlay.insert(name.into(), value);
        self
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0).and_then(Option::as_ref)
    }

    /// Look a name up along the scope chain, then in the globals
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut next = Some(self.current);
        while let Some(id) = next {
            let Some(scope) = self.scope(id) else {
                break;
            };
            if let Some(value) = scope.bindings.get(name) {
                return Some(value);
            }
            next = scope.parent;
        }
        self.overlay
            .get(name)
            .or_else(|| self.globals.get(name))
    }

    /// Resolve a name, importing it through the resolver on a miss.
    /// Unknown names are `Undefined`, not an error.
    pub fn get_variable(&mut self, name: &str, position: Position) -> Result<Value, JinjaError> {
        if let Some(value) = self.lookup(name) {
            return Ok(value.clone());
        }

        let Some(resolver) = self.resolver else {
            return Ok(Value::Undefined);
        };
        let Some(template) = resolver.resolve(name) else {
            return Ok(Value::Undefined);
        };

        let scope = self.import(&template, position)?;
        Ok(self
            .scope(scope)
            .and_then(|scope| scope.bindings.get(name))
            .cloned()
            .unwrap_or_default())
    }

    /// Bind a name in the current scope
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.get_mut(self.current.0).and_then(Option::as_mut) {
            scope.bindings.insert(name.into(), value);
        }
    }

    fn import(&mut self, template: &Template, position: Position) -> Result<ScopeId, JinjaError> {
        if let Some(&scope) = self.imported.get(&template.name) {
            return Ok(scope);
        }

        debug!(template = %template.name, "importing template");

        // Registered before executing so a cyclic import sees the partial scope
        let scope = self.push_scope(None);
        self.imported.insert(template.name.clone(), scope);

        let saved = std::mem::replace(&mut self.current, scope);
        let result = template.body.render(self);
        self.current = saved;

        result.map_err(|err| JinjaError::Runtime {
            position,
            message: format!("in `{}`: {err}", template.name),
        })?;
        Ok(scope)
    }

    fn push_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(Some(Scope {
            bindings: HashMap::new(),
            parent,
        }));
        ScopeId(self.scopes.len() - 1)
    }

    fn release(&mut self, id: ScopeId) {
        if let Some(slot) = self.scopes.get_mut(id.0) {
            *slot = None;
        }
        while matches!(self.scopes.last(), Some(None)) {
            self.scopes.pop();
        }
    }

    /// Run `f` in a fresh scope with the given parent, discarding the scope
    /// afterwards
    fn in_scope<T>(
        &mut self,
        parent: ScopeId,
        f: impl FnOnce(&mut Self) -> Result<T, JinjaError>,
    ) -> Result<T, JinjaError> {
        let scope = self.push_scope(Some(parent));
        let saved = std::mem::replace(&mut self.current, scope);
        let result = f(self);
        self.current = saved;
        self.release(scope);
        result
    }

    /// Run `f` in a child of the current scope
    pub fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, JinjaError>,
    ) -> Result<T, JinjaError> {
        self.in_scope(self.current, f)
    }

    /// Invoke a function value with evaluated arguments
    pub fn call(
        &mut self,
        function: &Function,
        position: Position,
        arguments: Vec<Argument>,
    ) -> Result<Value, JinjaError> {
        match function {
            Function::Native { func, .. } => {
                let func = Arc::clone(func);
                self.scoped(|ctx| func(ctx, position, arguments))
            }
            Function::Macro { definition, scope } => {
                self.call_macro(definition, *scope, position, arguments)
            }
        }
    }

    fn call_macro(
        &mut self,
        definition: &MacroDef,
        scope: ScopeId,
        position: Position,
        arguments: Vec<Argument>,
    ) -> Result<Value, JinjaError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(JinjaError::RecursionLimit {
                position,
                limit: MAX_CALL_DEPTH,
            });
        }

        let bindings = bind_arguments(definition, position, arguments)?;
        trace!(name = %definition.name, depth = self.depth, "calling macro");

        self.depth += 1;
        let result = self.in_scope(scope, |ctx| {
            for (name, value) in bindings {
                ctx.set_variable(name, value);
            }
            definition.body.render(ctx)
        });
        self.depth -= 1;

        result.map(Value::String)
    }

    pub fn render(&mut self, body: &Body) -> Result<String, JinjaError> {
        body.render(self)
    }

    pub fn error_at(&self, position: Position, message: impl Into<String>) -> JinjaError {
        JinjaError::Runtime {
            position,
            message: message.into(),
        }
    }

    /// Error for an expression that had to produce a value but was undefined
    pub fn nil_result_for(&self, node: &Node) -> JinjaError {
        self.error_at(node.position(), format!("`{node}` is undefined"))
    }
}

/// Pair every parameter with its value: positional arguments first, then
/// named arguments by name, then literal defaults
fn bind_arguments(
    definition: &MacroDef,
    position: Position,
    arguments: Vec<Argument>,
) -> Result<Vec<(String, Value)>, JinjaError> {
    let parameters = &definition.parameters;
    let (named, positional): (Vec<Argument>, Vec<Argument>) =
        arguments.into_iter().partition(|arg| arg.name.is_some());

    if positional.len() > parameters.len() {
        return Err(JinjaError::TooManyArguments {
            position,
            name: definition.name.clone(),
            expected: parameters.len(),
            found: positional.len(),
        });
    }

    let mut values: Vec<Option<Value>> = vec![None; parameters.len()];
    for (slot, arg) in values.iter_mut().zip(positional) {
        *slot = Some(arg.value);
    }

    for arg in named {
        let name = arg.name.unwrap_or_default();
        let Some(index) = parameters.iter().position(|p| p.name == name) else {
            return Err(JinjaError::UnknownArgument {
                position,
                name: definition.name.clone(),
                argument: name,
            });
        };
        values[index] = Some(arg.value);
    }

    parameters
        .iter()
        .zip(values)
        .map(|(parameter, value)| match value.or_else(|| parameter.default.clone()) {
            Some(value) => Ok((parameter.name.clone(), value)),
            None => Err(JinjaError::MissingArgument {
                position,
                name: definition.name.clone(),
                parameter: parameter.name.clone(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct MapResolver(HashMap<String, Arc<Template>>);

    impl Resolver for MapResolver {
        fn resolve(&self, name: &str) -> Option<Arc<Template>> {
            self.0.get(name).cloned()
        }
    }

    fn pos() -> Position {
        Position::new(1, 1)
    }

    #[test]
    fn test_lookup_walks_scopes_then_globals() {
        let mut globals = Globals::new();
        globals.insert("g".to_string(), Value::from("global"));
        globals.insert("x".to_string(), Value::from("shadowed"));

        let mut ctx = ExecutionContext::new(&globals);
        ctx.set_variable("x", Value::from(1_i64));

        let inner = ctx
            .scoped(|ctx| {
                ctx.set_variable("y", Value::from(2_i64));
                Ok((ctx.get_variable("x", pos())?, ctx.get_variable("g", pos())?))
            })
            .unwrap();
        assert_eq!(inner, (Value::from(1_i64), Value::from("global")));

        assert_eq!(ctx.get_variable("y", pos()).unwrap(), Value::Undefined);
        assert_eq!(ctx.get_variable("missing", pos()).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_child_scopes_are_released() {
        let globals = Globals::new();
        let mut ctx = ExecutionContext::new(&globals);
        ctx.scoped(|ctx| ctx.scoped(|_| Ok(()))).unwrap();
        assert_eq!(ctx.scopes.len(), 1);
        assert_eq!(ctx.current_scope(), ScopeId(0));
    }

    #[test]
    fn test_resolver_imports_template_once() {
        let template = Template::parse(
            "helpers",
            "{% set calls = 1 %}{% macro helpers(x) %}<{{ x }}>{% endmacro %}",
        )
        .unwrap();
        let mut templates = HashMap::new();
        templates.insert("helpers".to_string(), Arc::new(template));
        let resolver = MapResolver(templates);

        let globals = Globals::new();
        let mut ctx = ExecutionContext::new(&globals).with_resolver(&resolver);

        let first = ctx.get_variable("helpers", pos()).unwrap();
        let second = ctx.get_variable("helpers", pos()).unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.imported.len(), 1);

        let Value::Function(function) = first else {
            panic!("expected macro");
        };
        let out = ctx
            .call(&function, pos(), vec![Argument::positional("a")])
            .unwrap();
        assert_eq!(out, Value::from("<a>"));
    }

    #[test]
    fn test_import_errors_name_the_template() {
        let template = Template::parse("broken", "{{ 1 / 0 }}").unwrap();
        let mut templates = HashMap::new();
        templates.insert("broken".to_string(), Arc::new(template));
        let resolver = MapResolver(templates);

        let globals = Globals::new();
        let mut ctx = ExecutionContext::new(&globals).with_resolver(&resolver);
        let err = ctx.get_variable("broken", Position::new(3, 7)).unwrap_err();

        assert_eq!(err.position(), Position::new(3, 7));
        assert!(err.to_string().contains("in `broken`"));
    }

    #[test]
    fn test_native_calls_get_a_fresh_scope() {
        let globals = Globals::new();
        let mut ctx = ExecutionContext::new(&globals);
        ctx.set_variable("outer", Value::from(1_i64));

        let f = Function::native("peek", |ctx, position, _| {
            ctx.set_variable("leak", Value::Boolean(true));
            ctx.get_variable("outer", position)
        });
        assert_eq!(ctx.call(&f, pos(), vec![]).unwrap(), Value::from(1_i64));
        assert_eq!(ctx.lookup("leak"), None);
    }

    #[test]
    fn test_context_globals_reach_imported_templates() {
        let template = Template::parse(
            "naming",
            "{% macro naming() %}{{ this }}{% endmacro %}",
        )
        .unwrap();
        let mut templates = HashMap::new();
        templates.insert("naming".to_string(), Arc::new(template));
        let resolver = MapResolver(templates);

        let mut globals = Globals::new();
        globals.insert("this".to_string(), Value::from("shared"));
        let mut ctx = ExecutionContext::new(&globals)
            .with_resolver(&resolver)
            .with_global("this", Value::from("analytics.orders"));

        let Value::Function(function) = ctx.get_variable("naming", pos()).unwrap() else {
            panic!("expected macro");
        };
        let out = ctx.call(&function, pos(), vec![]).unwrap();
        assert_eq!(out, Value::from("analytics.orders"));

        // Scope bindings still shadow the overlay
        ctx.set_variable("this", Value::from("local"));
        assert_eq!(ctx.lookup("this"), Some(&Value::from("local")));
    }
}
