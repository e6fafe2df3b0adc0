/// modref - Module Reference CLI
///
/// `reference` plays the producer: it prints the module reference emitted for
/// a client reference. `resolve` plays the consumer: it loads the chunks a
/// serialized reference names and prints the export it resolves to.
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use modref::{
    new_shared_registry, BundlerManifest, ClientReference, ModuleReference, ResolveOptions,
    Resolver,
};

#[derive(Parser, Debug)]
#[command(name = "modref", version, about = "Module reference registry and chunk-loading resolver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the module reference a producer emits for a client reference
    Reference {
        /// Bundler manifest (.toml or .json)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Source file the value is exported from (e.g. src/app/Clock.tsx)
        file_path: String,

        /// Export name within that file
        export_name: String,
    },

    /// Resolve a serialized module reference against the manifest's modules
    Resolve {
        /// Bundler manifest (.toml or .json)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Fail any chunk load that takes longer than this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Reference as JSON, e.g. '{"id":"Clock.tsx","name":"Clock","chunks":["pika"]}'
        reference: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modref=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_manifest(path: &Path) -> Result<BundlerManifest> {
    BundlerManifest::load(path)
        .with_context(|| format!("Failed to load manifest '{}'", path.display()))
}

fn emit_reference(manifest: &Path, file_path: &str, export_name: &str) -> Result<String> {
    let manifest = load_manifest(manifest)?;
    let client = ClientReference::new(file_path, export_name);
    let reference = manifest.reference_for(&client)?;
    Ok(reference.to_json()?)
}

async fn resolve_reference(manifest: &Path, timeout_ms: Option<u64>, json: &str) -> Result<String> {
    let manifest = load_manifest(manifest)?;
    let reference = ModuleReference::from_json(json).context("Invalid module reference")?;

    // Exported values are stand-ins naming the client reference they came from.
    let registry = new_shared_registry();
    let loader = manifest.build_loader(&registry, |client, _| client.to_string());

    let mut options = ResolveOptions::new();
    if let Some(ms) = timeout_ms {
        options = options.with_load_timeout(Duration::from_millis(ms));
    }

    let resolver = Resolver::with_options(Arc::clone(&registry), loader, options);
    let value = resolver.resolve(&reference).await?;
    tracing::info!(
        reference = %reference,
        chunks = ?resolver.loaded_chunks(),
        "resolved"
    );
    Ok(value)
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Reference {
            manifest,
            file_path,
            export_name,
        } => emit_reference(&manifest, &file_path, &export_name),
        Command::Resolve {
            manifest,
            timeout_ms,
            reference,
        } => resolve_reference(&manifest, timeout_ms, &reference).await,
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
