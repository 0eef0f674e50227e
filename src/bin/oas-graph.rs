//! oas-graph CLI
//!
//! Command-line interface for resolving multi-file API descriptions and
//! inspecting the resulting schema graph.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use oas_graph::{
    collect_inlined_schemas, collect_referenced_schema_names, detect_kind, parse, parse_entry,
    resolve_references, Archive, Document, Location, NodeId, ResolveOptions,
};

#[derive(Parser)]
#[command(name = "oas-graph")]
#[command(about = "Resolve references and inspect the schema graph of API descriptions")]
#[command(version)]
struct Cli {
    /// Log level for this crate's diagnostics (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inline external references and print the resolved document
    Resolve {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the names assigned to inline schemas, keyed by JSON pointer
    Names {
        #[command(flatten)]
        source: SourceArgs,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the component schemas reachable from responses, one per line
    Reachable {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print what the document describes: api, sla or unknown
    Kind {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Document path, or a ZIP archive when --entry is given
    source: PathBuf,

    /// Entry inside the archive to load as the root document
    #[arg(long)]
    entry: Option<String>,

    /// Extra root for relative references (repeatable, tried in order)
    #[arg(long = "search-path")]
    search_paths: Vec<PathBuf>,

    /// Maximum nesting of external references
    #[arg(long)]
    max_depth: Option<usize>,
}

impl SourceArgs {
    fn options(&self) -> ResolveOptions {
        let options = self
            .search_paths
            .iter()
            .fold(ResolveOptions::new(), |opts, path| opts.search_path(path));
        match self.max_depth {
            Some(depth) => options.max_depth(depth),
            None => options,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        Commands::Resolve {
            source,
            output,
            pretty,
        } => run_resolve(&source, output, pretty),
        Commands::Names { source, pretty } => run_names(&source, pretty),
        Commands::Reachable { source } => run_reachable(&source),
        Commands::Kind { source } => run_kind(&source),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(level: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| format!("oas_graph={}", level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(EnvFilter::new(filter));

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: tracing subscriber already initialized");
    }
}

fn load(args: &SourceArgs) -> Result<(Document, Location), u8> {
    match &args.entry {
        Some(entry) => {
            let archive = Archive::open(&args.source).map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
            let doc = parse_entry(&archive, entry).map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
            Ok((doc, Location::entry(Arc::new(archive), entry)))
        }
        None => {
            let doc = parse(&args.source).map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
            Ok((doc, Location::file(&args.source)))
        }
    }
}

fn load_resolved(args: &SourceArgs) -> Result<Document, u8> {
    let (mut doc, location) = load(args)?;
    let report = resolve_references(&mut doc, &location, &args.options()).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    for limit in &report.limits {
        eprintln!("Warning: {}", limit);
    }
    for (wanted, registered) in &report.renamed {
        eprintln!(
            "Warning: component {} already names a different schema, registered as {}",
            wanted, registered
        );
    }
    for reference in &report.dropped_siblings {
        eprintln!("Warning: keys next to {} were replaced by its non-mapping target", reference);
    }
    Ok(doc)
}

fn render(value: &Value, pretty: bool) -> Result<String, u8> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })
}

fn run_resolve(source: &SourceArgs, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let doc = load_resolved(source)?;
    let json_output = render(&doc.to_json(doc.root()), pretty)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_names(source: &SourceArgs, pretty: bool) -> Result<(), u8> {
    let doc = load_resolved(source)?;
    let names = collect_inlined_schemas(&doc);
    let pointers = doc.locate();

    let table: Map<String, Value> = names
        .iter()
        .filter_map(|(id, name)| {
            let pointer = pointers.get(&id)?;
            Some((pointer.clone(), Value::String(name.to_string())))
        })
        .collect();
    println!("{}", render(&Value::Object(table), pretty)?);

    for limit in names.limits() {
        eprintln!("Warning: {}", limit);
    }
    for collision in names.collisions() {
        let at = |id: NodeId| pointers.get(&id).map(String::as_str).unwrap_or("?");
        eprintln!(
            "Warning: name {} derived for {} is already used by {}",
            collision.name,
            at(collision.node),
            at(collision.existing)
        );
    }
    Ok(())
}

fn run_reachable(source: &SourceArgs) -> Result<(), u8> {
    let doc = load_resolved(source)?;
    let reachable = collect_referenced_schema_names(&doc);
    for name in reachable.iter() {
        println!("{}", name);
    }
    for limit in &reachable.limits {
        eprintln!("Warning: {}", limit);
    }
    Ok(())
}

fn run_kind(source: &SourceArgs) -> Result<(), u8> {
    let (doc, _) = load(source)?;
    println!("{}", detect_kind(&doc).as_str());
    Ok(())
}
