use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use termspread::config::{FieldSpec, FieldSpecs};
use termspread::persist::{load_analysis, load_store, save_analysis, save_store, SnapshotPaths};
use termspread::{Analysis, Fields, MemoryStore, TermPredicate};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(flatten)]
    fields: Fields,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Load scoped documents and query their term analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load JSON/JSONL documents into a scope and build its analysis
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Store directory; existing contents are loaded and extended
        #[arg(long)]
        output: String,
        /// Scope the documents belong to
        #[arg(long)]
        scope: String,
        /// Field to index, as `name` or `name=weight` (repeatable)
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, FieldSpec)>,
    },
    /// Print the text index configuration of one scope, or of all scopes
    Indices {
        #[arg(long)]
        index: String,
        #[arg(long)]
        scope: Option<String>,
    },
    /// Query a saved analysis
    Query {
        #[arg(long)]
        index: String,
        #[arg(long)]
        scope: String,
        #[command(subcommand)]
        query: Query,
    },
}

#[derive(Subcommand)]
enum Query {
    /// All indexed terms
    Terms,
    /// Distinct weighted counts for a term, highest first
    Scores { term: String },
    /// Document with the highest count for a term
    Top { term: String },
    /// Every document containing a term, lowest count first
    All { term: String },
    /// Terms matching `prefix:`, `suffix:`, `exact:`, `contains:` or `regex:`
    Filter {
        expr: String,
        /// Also fetch the referenced documents
        #[arg(long, default_value_t = false)]
        fetch: bool,
    },
    /// Highlight a term inside a stored document field
    Highlight {
        term: String,
        #[arg(long)]
        doc: String,
        #[arg(long)]
        field: String,
        #[arg(long, default_value = "<em>{{_}}</em>")]
        template: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, scope, fields } => build(&input, &output, &scope, fields),
        Commands::Indices { index, scope } => indices(&index, scope.as_deref()),
        Commands::Query { index, scope, query } => run_query(&index, &scope, query),
    }
}

/// `title` enables a field at the default weight; `title=3` sets its weight.
/// A weight that is not a positive integer excludes the field.
fn parse_field(s: &str) -> Result<(String, FieldSpec), String> {
    let (name, spec) = match s.split_once('=') {
        None => (s, FieldSpec::Enabled(true)),
        Some((name, "true")) => (name, FieldSpec::Enabled(true)),
        Some((name, "false")) => (name, FieldSpec::Enabled(false)),
        Some((name, w)) => match w.parse::<u32>() {
            Ok(weight) => (name, FieldSpec::Weighted { weight }),
            Err(_) => (name, FieldSpec::Invalid(serde_json::Value::String(w.to_string()))),
        },
    };
    if name.is_empty() {
        return Err(format!("missing field name in {s:?}"));
    }
    Ok((name.to_string(), spec))
}

fn open_store(paths: &SnapshotPaths) -> Result<MemoryStore> {
    if paths.root.join("meta.json").exists() {
        Ok(MemoryStore::from_snapshot(load_store(paths)?))
    } else {
        Ok(MemoryStore::new())
    }
}

fn build(input: &str, output: &str, scope: &str, fields: Vec<(String, FieldSpec)>) -> Result<()> {
    let paths = SnapshotPaths::new(output);
    let store = open_store(&paths)?;

    if !fields.is_empty() {
        let specs: FieldSpecs = fields.into_iter().collect();
        store.text_index(scope, &specs);
    }

    let mut ingested = 0usize;
    for file in input_files(Path::new(input))? {
        ingested += ingest_file(&store, scope, &file)?;
    }
    tracing::info!(scope, ingested, total = store.len(scope), "ingested documents");

    save_store(&paths, &store.snapshot())?;
    match store.text_analysis(scope) {
        Some(analysis) => {
            save_analysis(&paths, scope, &analysis)?;
            tracing::info!(scope, terms = analysis.len(), "analysis build complete");
        }
        None => tracing::warn!(scope, "no text index configured; pass --field to build an analysis"),
    }
    Ok(())
}

fn input_files(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input not found: {}", input.display());
    }
    Ok(files)
}

fn ingest_file(store: &MemoryStore, scope: &str, file: &Path) -> Result<usize> {
    let reader = BufReader::new(File::open(file)?);
    let mut n = 0;
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let doc: InputDoc = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
            store.insert(scope, doc.id, doc.fields);
            n += 1;
        }
    } else {
        let json: serde_json::Value = serde_json::from_reader(reader)?;
        let docs = match json {
            serde_json::Value::Array(arr) => arr,
            obj @ serde_json::Value::Object(_) => vec![obj],
            _ => Vec::new(),
        };
        for v in docs {
            let doc: InputDoc = serde_json::from_value(v).with_context(|| file.display().to_string())?;
            store.insert(scope, doc.id, doc.fields);
            n += 1;
        }
    }
    Ok(n)
}

fn indices(index: &str, scope: Option<&str>) -> Result<()> {
    let store = open_store(&SnapshotPaths::new(index))?;
    let out = match scope {
        Some(scope) => serde_json::to_value(store.dump_indices(scope))?,
        None => serde_json::to_value(store.dump_all_indices())?,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn run_query(index: &str, scope: &str, query: Query) -> Result<()> {
    let paths = SnapshotPaths::new(index);
    let analysis = load_analysis(&paths, scope)?;
    let out = match query {
        Query::Filter { expr, fetch: true } => {
            let store = open_store(&paths)?;
            let (mut out, ids) = filter(&analysis, &expr);
            out["documents"] = serde_json::to_value(store.get_many(scope, &ids))?;
            out
        }
        Query::Highlight { term, doc, field, template } => {
            let store = open_store(&paths)?;
            let doc = store.get(scope, &doc).with_context(|| format!("no document {doc:?} in scope {scope:?}"))?;
            let text = doc.text(&field).unwrap_or_default();
            json!(analysis.highlight(&term, text, &template))
        }
        other => answer(&analysis, other),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn filter(analysis: &Analysis, expr: &str) -> (serde_json::Value, Vec<String>) {
    let selected = analysis.filter(&TermPredicate::parse(expr));
    let ids = analysis.serialize(&selected);
    (json!({ "terms": selected, "ids": ids }), ids)
}

/// Queries answered from the analysis alone.
fn answer(analysis: &Analysis, query: Query) -> serde_json::Value {
    match query {
        Query::Terms => json!(analysis.terms()),
        Query::Scores { term } => json!(analysis.scores(&term)),
        Query::Top { term } => json!(analysis.top(&term)),
        Query::All { term } => json!(analysis.all(&term)),
        Query::Filter { expr, .. } => filter(analysis, &expr).0,
        Query::Highlight { .. } => serde_json::Value::Null,
    }
}
