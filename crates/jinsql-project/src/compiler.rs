//! Project compiler
//!
//! Renders every model and test of a project into plain SQL. Files are parsed
//! in parallel first so syntax errors surface before any rendering starts,
//! then rendered in parallel with one execution context per file. Macros in
//! other files are found through the catalog, which acts as the resolver.
//!
//! Besides the engine built-ins, templates see the project functions:
//! - `ref('model')` renders the relation name of another model
//! - `source('source', 'table')` renders a source table's relation name
//! - `var('name', default)` reads `[vars]` from the project config
//! - `env_var('NAME', default)` reads the process environment
//! - `config(...)` accepts model settings and renders nothing
//! - `target` holds the target's `name`, `schema` and `database`
//! - `this` is the relation name of the model being rendered

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use jinsql_core::{Config, Diagnostic, DiagnosticCode, Location, TargetConfig};
use jinsql_jinja::{
    builtin_globals, find_argument, string_argument, Argument, ExecutionContext, Function,
    Globals, JinjaError, Position, Value,
};
use parking_lot::Mutex;

use crate::catalog::FileCatalog;
use crate::error::{CompileError, ProjectError};
use crate::file::{File, FileType};
use crate::workpool::WorkPool;

/// Rendered SQL of every model and test, keyed by project-relative path
#[derive(Debug, Default)]
pub struct CompiledProject {
    pub files: BTreeMap<PathBuf, String>,
    /// Non-fatal findings, ordered by path
    pub warnings: Vec<Diagnostic>,
}

impl CompiledProject {
    pub fn get(&self, path: impl Into<PathBuf>) -> Option<&str> {
        self.files.get(&path.into()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

pub struct ProjectCompiler {
    config: Config,
    catalog: Arc<FileCatalog>,
    globals: Globals,
    pool: WorkPool,
}

impl ProjectCompiler {
    pub fn new(config: Config, catalog: FileCatalog) -> Self {
        let catalog = Arc::new(catalog);
        let globals = project_globals(&config, &catalog);
        let pool = WorkPool::new(config.threads);
        tracing::debug!(threads = pool.threads(), files = catalog.len(), "project compiler ready");

        Self {
            config,
            catalog,
            globals,
            pool,
        }
    }

    /// Discover the project's files and build a compiler over them
    pub fn load(config: Config) -> Result<Self, ProjectError> {
        let catalog = FileCatalog::discover(&config)?;
        Ok(Self::new(config, catalog))
    }

    pub fn catalog(&self) -> &FileCatalog {
        &self.catalog
    }

    /// Parse every file in the catalog, stopping at the first syntax error
    pub fn parse_all(&self) -> Result<usize, CompileError> {
        let files: Vec<Arc<File>> = self.catalog.files().cloned().collect();
        self.pool
            .run(files, |file| file.parse().map(|_| ()))
            .into_result()
    }

    /// Render a single file
    pub fn compile_file(&self, file: &File) -> Result<String, CompileError> {
        let template = file.parse()?;

        let mut ctx = ExecutionContext::new(&self.globals).with_resolver(self.catalog.as_ref());
        if file.file_type == FileType::Model {
            // Macros imported from macros/ read `this` too
            let this = relation_name(&self.config.target, &file.name);
            ctx = ctx.with_global("this", Value::String(this));
        }

        let sql = template
            .render(&mut ctx)
            .map_err(|err| CompileError::new(&file.path, err))?;
        tracing::debug!(path = %file.path.display(), "compiled");
        Ok(sql)
    }

    /// Render one model, looked up by any suffix of its path
    pub fn compile_model(&self, name: &str) -> Result<String, ProjectError> {
        let file = self
            .catalog
            .model(name)
            .ok_or_else(|| ProjectError::ModelNotFound(name.to_string()))?;

        // Broken macro files would otherwise only show up as undefined functions
        let macros: Vec<Arc<File>> = self.catalog.macros().into_iter().cloned().collect();
        self.pool
            .run(macros, |file| file.parse().map(|_| ()))
            .into_result()?;

        Ok(self.compile_file(file)?)
    }

    /// Parse every file, then render every model and test.
    ///
    /// Fails with the first error any worker hits; files not yet started at
    /// that point are skipped.
    pub fn compile_all(&self) -> Result<CompiledProject, CompileError> {
        let parsed = self.parse_all()?;
        tracing::info!(files = parsed, "parsed project");

        let targets: Vec<Arc<File>> = self
            .catalog
            .models()
            .into_iter()
            .chain(self.catalog.tests())
            .cloned()
            .collect();

        let compiled = Mutex::new(BTreeMap::new());
        let outcome = self.pool.run(targets, |file| {
            let sql = self.compile_file(file)?;
            compiled.lock().insert(file.path.clone(), sql);
            Ok(())
        });

        if let Some(err) = outcome.error {
            tracing::warn!(skipped = outcome.skipped, "compilation stopped at first error");
            return Err(err);
        }

        let files = compiled.into_inner();
        let warnings = files
            .iter()
            .filter(|(_, sql)| sql.trim().is_empty())
            .map(|(path, _)| {
                Diagnostic::warn(DiagnosticCode::EmptyOutput, "compiled to empty SQL")
                .with_location(Location::new(path.display().to_string()))
            })
            .collect();

        tracing::info!(files = outcome.executed, "compiled project");
        Ok(CompiledProject { files, warnings })
    }
}

/// `database.schema.name`, or `schema.name` without a database
fn relation_name(target: &TargetConfig, name: &str) -> String {
    match &target.database {
        Some(database) => format!("{database}.{}.{name}", target.schema),
        None => format!("{}.{name}", target.schema),
    }
}

fn project_globals(config: &Config, catalog: &Arc<FileCatalog>) -> Globals {
    let mut globals = builtin_globals();

    let catalog = Arc::clone(catalog);
    let target = config.target.clone();
    let ref_function = Function::native("ref", move |_ctx, position, args| {
        let name = string_argument(&args, 0, "name", "ref", position)?;
        let model = catalog.model(&name).ok_or_else(|| JinjaError::Runtime {
            position,
            message: format!("ref() to unknown model `{name}`"),
        })?;
        Ok(Value::String(relation_name(&target, &model.name)))
    });

    let database = config.target.database.clone();
    let source_function = Function::native("source", move |_ctx, position, args| {
        let source = string_argument(&args, 0, "source_name", "source", position)?;
        let table = string_argument(&args, 1, "table_name", "source", position)?;
        Ok(Value::String(match &database {
            Some(database) => format!("{database}.{source}.{table}"),
            None => format!("{source}.{table}"),
        }))
    });

    let vars: BTreeMap<String, Value> = config
        .vars
        .iter()
        .map(|(name, value)| (name.clone(), toml_to_value(value)))
        .collect();
    let var_function = Function::native("var", move |_ctx, position, args| {
        let name = string_argument(&args, 0, "name", "var", position)?;
        match vars.get(&name) {
            Some(value) => Ok(value.clone()),
            None => default_or(&args, position, || format!("var `{name}` is not defined")),
        }
    });

    let env_var_function = Function::native("env_var", |_ctx, position, args| {
        let name = string_argument(&args, 0, "name", "env_var", position)?;
        match std::env::var(&name) {
            Ok(value) => Ok(Value::String(value)),
            Err(_) => default_or(&args, position, || {
                format!("environment variable `{name}` is not set")
            }),
        }
    });

    let config_function = Function::native("config", |_ctx, _position, _args| Ok(Value::Undefined));

    for function in [
        ref_function,
        source_function,
        var_function,
        env_var_function,
        config_function,
    ] {
        globals.insert(function.name().to_string(), Value::Function(function));
    }

    globals.insert("target".to_string(), target_value(&config.target));
    globals
}

/// The second argument (`default`) if given, otherwise a runtime error
fn default_or(
    args: &[Argument],
    position: Position,
    message: impl FnOnce() -> String,
) -> Result<Value, JinjaError> {
    find_argument(args, 1, "default")
        .cloned()
        .ok_or_else(|| JinjaError::Runtime {
            position,
            message: message(),
        })
}

fn target_value(target: &TargetConfig) -> Value {
    let mut map = BTreeMap::new();
    map.insert("name".to_string(), Value::from(target.name.as_str()));
    map.insert("schema".to_string(), Value::from(target.schema.as_str()));
    if let Some(database) = &target.database {
        map.insert("database".to_string(), Value::from(database.as_str()));
    }
    Value::Mapping(map)
}

fn toml_to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::Number(*f),
        toml::Value::Boolean(b) => Value::Boolean(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(toml_to_value).collect()),
        toml::Value::Table(table) => Value::Mapping(
            table
                .iter()
                .map(|(key, value)| (key.clone(), toml_to_value(value)))
                .collect(),
        ),
    }
}
