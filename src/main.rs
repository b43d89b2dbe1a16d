//! Command-line interface for exi-schema-resolver

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use exi_schema_resolver::{
    CompileOptions, DuplicatePolicy, EntityResolver, Error, GrammarCompiler, IndexBuilder, IndexOptions,
    NamespaceResolver, Resolution, ResolutionRequest,
};

/// Exit status for a request nothing is indexed under
#[cfg(feature = "cli")]
const EXIT_UNRESOLVED: i32 = 2;

/// Exit status for an internal consistency violation
#[cfg(feature = "cli")]
const EXIT_CONSISTENCY: i32 = 3;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "exi-schema-resolver")]
#[command(author, version, about = "Namespace-indexed schema resolution for EXI grammars", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the namespace index of a directory and print it
    Index {
        /// Directory holding the schema documents
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Extension of indexed documents (repeatable)
        #[arg(long = "ext", default_value = "xsd")]
        extensions: Vec<String>,

        /// Duplicate namespace handling: first, last, reject
        #[arg(long, default_value = "first")]
        duplicates: DuplicatePolicy,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Resolve one request against the index of a directory
    Resolve {
        /// Directory holding the schema documents
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Namespace of the referenced document
        #[arg(short, long)]
        namespace: Option<String>,

        /// Public identifier of the referenced document
        #[arg(short, long)]
        public_id: Option<String>,
    },

    /// Compile a schema set, resolving imports through the index of a directory
    Compile {
        /// Entry schema document
        #[arg(value_name = "ENTRY")]
        entry: PathBuf,

        /// Directory holding the schema documents
        #[arg(short, long)]
        dir: PathBuf,

        /// Continue past imports that cannot be located
        #[arg(long)]
        lenient: bool,

        /// Output the compiled documents and components as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Index {
            dir,
            extensions,
            duplicates,
            json,
        } => cmd_index(dir, extensions, duplicates, json),
        Commands::Resolve {
            dir,
            namespace,
            public_id,
        } => cmd_resolve(dir, namespace, public_id),
        Commands::Compile {
            entry,
            dir,
            lenient,
            json,
        } => cmd_compile(entry, dir, lenient, json),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            let code = if e.is_consistency_violation() { EXIT_CONSISTENCY } else { 1 };
            std::process::exit(code);
        }
    }
}

#[cfg(feature = "cli")]
fn cmd_index(dir: PathBuf, extensions: Vec<String>, duplicates: DuplicatePolicy, json: bool) -> Result<i32, Error> {
    let options = IndexOptions::default()
        .with_extensions(extensions)
        .with_duplicates(duplicates);
    let index = IndexBuilder::new(&dir).with_options(options).build()?;

    if json {
        let output = serde_json::to_string_pretty(&index).map_err(|e| Error::Resource(e.to_string()))?;
        println!("{}", output);
    } else {
        println!("Index of {} ({} entries)", index.directory().display(), index.len());
        for (key, entry) in index.iter() {
            let key = if key.is_empty() { "(no namespace)" } else { key };
            println!("  {} -> {}", key, entry.path.display());
        }
    }
    Ok(0)
}

#[cfg(feature = "cli")]
fn cmd_resolve(dir: PathBuf, namespace: Option<String>, public_id: Option<String>) -> Result<i32, Error> {
    let resolver = NamespaceResolver::from_directory(&dir)?;

    let mut request = ResolutionRequest::new();
    if let Some(ns) = namespace {
        request = request.with_namespace(ns);
    }
    if let Some(id) = public_id {
        request = request.with_public_id(id);
    }

    match resolver.resolve(&request) {
        Resolution::Skip => {
            println!("skip");
            Ok(0)
        }
        Resolution::Resolved(entity) => {
            println!("resolved {} -> {}", entity.key, entity.system_id.display());
            Ok(0)
        }
        Resolution::Unresolved { key } => {
            println!("unresolved {}", key);
            Ok(EXIT_UNRESOLVED)
        }
    }
}

#[cfg(feature = "cli")]
fn cmd_compile(entry: PathBuf, dir: PathBuf, lenient: bool, json: bool) -> Result<i32, Error> {
    let resolver = NamespaceResolver::from_directory(&dir)?;
    let options = CompileOptions::default().with_strict_imports(!lenient);
    let grammars = GrammarCompiler::new(resolver).with_options(options).compile(&entry)?;

    if json {
        let output = serde_json::to_string_pretty(&grammars).map_err(|e| Error::Resource(e.to_string()))?;
        println!("{}", output);
    } else {
        println!("✓ Schema set compiled");
        println!("  Entry: {}", grammars.entry().display());
        println!("  Documents: {}", grammars.document_count());
        println!("  Components: {}", grammars.component_count());
        println!("  Namespaces:");
        for ns in grammars.namespaces() {
            println!("    {}", if ns.is_empty() { "(no namespace)" } else { ns });
        }
    }
    Ok(0)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
