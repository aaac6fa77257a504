//! Integration tests for project discovery and compilation
//!
//! Each test lays a small project out in a temporary directory, discovers it
//! the way the CLI does and compiles it.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p jinsql-project --test integration_tests
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use jinsql_core::{Config, DiagnosticCode};
use jinsql_jinja::JinjaError;
use jinsql_project::{CatalogError, FileCatalog, FileType, ProjectCompiler, ProjectError, WorkPool};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn write(root: &Path, path: &str, contents: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project(config: &str, files: &[(&str, &str)]) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "jinsql.toml", config);
    for (path, contents) in files {
        write(dir.path(), path, contents);
    }
    let config = Config::from_file(&dir.path().join("jinsql.toml")).unwrap();
    (dir, config)
}

const CONFIG: &str = r#"
name = "shop"
threads = 3

[paths]
exclude = ["models/legacy/*"]

[target]
schema = "dbt_dev"

[vars]
min_amount = 5
"#;

// =============================================================================
// Discovery
// =============================================================================

#[test]
fn test_discovery_classifies_files() {
    let (_dir, config) = project(
        CONFIG,
        &[
            ("macros/money.sql", "{% macro money(c) %}{{ c }} / 100.0{% endmacro %}"),
            ("models/staging/stg_orders.sql", "select * from raw.orders"),
            ("models/orders.sql", "select * from {{ ref('stg_orders') }}"),
            ("models/legacy/old.sql", "this is not parsed"),
            ("models/README.md", "not sql"),
            ("tests/no_negative.sql", "select 1"),
        ],
    );

    let catalog = FileCatalog::discover(&config).unwrap();

    let models: Vec<PathBuf> = catalog.models().iter().map(|f| f.path.clone()).collect();
    assert_eq!(
        models,
        vec![
            PathBuf::from("models/orders.sql"),
            PathBuf::from("models/staging/stg_orders.sql"),
        ]
    );
    assert_eq!(catalog.macros().len(), 1);
    assert_eq!(catalog.tests().len(), 1);
    assert_eq!(catalog.len(), 4);
    assert_eq!(
        catalog.model("staging/stg_orders").unwrap().file_type,
        FileType::Model
    );
}

#[test]
fn test_missing_directories_are_skipped() {
    let (_dir, config) = project(CONFIG, &[("models/only.sql", "select 1")]);

    let catalog = FileCatalog::discover(&config).unwrap();
    assert_eq!(catalog.len(), 1);
    assert!(catalog.macros().is_empty());
    assert!(catalog.tests().is_empty());
}

#[test]
fn test_duplicate_model_names_across_folders() {
    let (_dir, config) = project(
        CONFIG,
        &[
            ("models/a/customers.sql", "select 1"),
            ("models/b/customers.sql", "select 2"),
        ],
    );

    let err = FileCatalog::discover(&config).unwrap_err();
    match &err {
        CatalogError::DuplicateDefinition {
            kind,
            name,
            first,
            second,
        } => {
            assert_eq!(*kind, FileType::Model);
            assert_eq!(name, "customers");
            assert_eq!(first, &PathBuf::from("models/a/customers.sql"));
            assert_eq!(second, &PathBuf::from("models/b/customers.sql"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.to_diagnostic().code, DiagnosticCode::DuplicateDefinition);
}

#[test]
fn test_duplicate_macro_files() {
    let (_dir, config) = project(
        CONFIG,
        &[
            ("macros/one/helpers.sql", ""),
            ("macros/two/helpers.sql", ""),
        ],
    );

    let err = ProjectCompiler::load(config).err().unwrap();
    assert!(matches!(
        err,
        ProjectError::Catalog(CatalogError::DuplicateDefinition {
            kind: FileType::Macro,
            ..
        })
    ));
}

// =============================================================================
// Compilation
// =============================================================================

#[test]
fn test_compile_project_end_to_end() {
    let (_dir, config) = project(
        CONFIG,
        &[
            (
                "macros/money.sql",
                "{% macro money(column, decimals=2) -%}\n\
                 round({{ column }} / 100.0, {{ decimals }})\n\
                 {%- endmacro %}",
            ),
            (
                "models/staging/stg_payments.sql",
                "select id, {{ money('amount_cents') }} as amount from raw.payments",
            ),
            (
                "models/payments.sql",
                "{{ config(materialized='view') -}}\n\
                 select * from {{ ref('stg_payments') }}\n\
                 where amount >= {{ var('min_amount') }}",
            ),
            (
                "tests/payments_positive.sql",
                "select * from {{ ref('payments') }} where amount < 0",
            ),
        ],
    );

    let compiler = ProjectCompiler::load(config).unwrap();
    let compiled = compiler.compile_all().unwrap();

    assert_eq!(compiled.len(), 3);
    assert_eq!(
        compiled.get("models/staging/stg_payments.sql"),
        Some("select id, round(amount_cents / 100.0, 2) as amount from raw.payments")
    );
    assert_eq!(
        compiled.get("models/payments.sql"),
        Some("select * from dbt_dev.stg_payments\nwhere amount >= 5")
    );
    assert_eq!(
        compiled.get("tests/payments_positive.sql"),
        Some("select * from dbt_dev.payments where amount < 0")
    );
}

#[test]
fn test_macro_calls_macro_in_another_file() {
    let (_dir, config) = project(
        CONFIG,
        &[
            ("macros/quote.sql", "{% macro quote(name) %}\"{{ name }}\"{% endmacro %}"),
            (
                "macros/columns.sql",
                "{% macro columns(names) %}{% for n in names %}{{ quote(n) }}{% if not loop.last %}, {% endif %}{% endfor %}{% endmacro %}",
            ),
            ("models/wide.sql", "select {{ columns(['a', 'b', 'c']) }} from t"),
        ],
    );

    let compiler = ProjectCompiler::load(config).unwrap();
    assert_eq!(
        compiler.compile_model("wide").unwrap(),
        "select \"a\", \"b\", \"c\" from t"
    );
}

#[test]
fn test_error_importing_macro_file_points_at_call_site() {
    let (_dir, config) = project(
        CONFIG,
        &[
            ("macros/bad.sql", "{{ nope() }}{% macro bad() %}x{% endmacro %}"),
            ("models/m.sql", "select\n  {{ bad() }}"),
        ],
    );

    let compiler = ProjectCompiler::load(config).unwrap();
    let err = compiler.compile_model("m").unwrap_err();
    let err = match err {
        ProjectError::Compile(err) => err,
        other => panic!("expected a compile error, got {other}"),
    };

    assert_eq!(err.path, PathBuf::from("models/m.sql"));
    match err.source {
        JinjaError::Runtime { position, message } => {
            assert_eq!((position.line, position.column), (2, 6));
            assert_eq!(message, "in `macros/bad`: 1:4: function `nope` not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_compile_all_stops_at_first_error() {
    let (_dir, config) = project(
        "threads = 1",
        &[
            ("models/a.sql", "select 1"),
            ("models/b.sql", "{{ raise_error('b is broken') }}"),
            ("models/c.sql", "{{ raise_error('c is broken') }}"),
        ],
    );

    let compiler = ProjectCompiler::load(config).unwrap();
    let err = compiler.compile_all().unwrap_err();

    // One worker visits files in path order, so `b` fails first
    assert_eq!(err.path, PathBuf::from("models/b.sql"));
    assert!(err.to_string().contains("b is broken"));
}

#[test]
fn test_show_unknown_model() {
    let (_dir, config) = project(CONFIG, &[("models/a.sql", "select 1")]);
    let compiler = ProjectCompiler::load(config).unwrap();

    let err = compiler.compile_model("b").unwrap_err();
    assert_eq!(err.to_string(), "model `b` not found");
    assert_eq!(err.to_diagnostic().code, DiagnosticCode::ModelNotFound);
}

// =============================================================================
// Worker Pool
// =============================================================================

#[test]
fn test_no_work_starts_after_failure() {
    let started_after_failure = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let outcome = WorkPool::new(4).run((0..500).collect(), |n: &u32| {
        if failed.load(Ordering::SeqCst) > 0 {
            // A worker may already be past its check when the flag is set,
            // but at most one item per worker can slip through this way
            started_after_failure.fetch_add(1, Ordering::SeqCst);
        }
        if *n == 10 {
            failed.fetch_add(1, Ordering::SeqCst);
            return Err(format!("{n} failed"));
        }
        thread::sleep(Duration::from_micros(100));
        Ok(())
    });

    assert_eq!(outcome.error.as_deref(), Some("10 failed"));
    assert_eq!(outcome.executed + outcome.skipped, 500);
    assert!(started_after_failure.load(Ordering::SeqCst) < 4);
    assert!(outcome.skipped > 0);
}
