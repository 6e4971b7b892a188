//! Hiveswap extractor command-line interface.
//!
//! Configuration is loaded from environment variables (via .env file).
//! Command-line arguments override environment variables.
//!
//! Usage:
//!   hiveswap export             - Write JSON and transcript documents per category
//!   hiveswap refs <archive> <id> - Show what references a record and what it references
//!   hiveswap drift              - List fields the schemas do not know about

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hiveswap_core::{
    loader, ArchiveStore, Category, ExportConfig, Exporter, LoaderConfig, RecordKey,
    ReferenceGraph, ResolverConfig,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "hiveswap", version, about = "Extract narrative data from Hiveswap dumps")]
struct Cli {
    #[command(flatten)]
    load: LoadArgs,

    /// Fail instead of degrading when this reference is missing (archive/id).
    #[arg(long = "strict-ref", global = true, value_name = "KEY")]
    strict_refs: Vec<RecordKey>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct LoadArgs {
    /// Folder holding one subfolder per exported archive.
    #[arg(
        long,
        env = "HIVESWAP_GAME_ROOT",
        default_value = "Act2-AssetStudio/ExportDev2",
        global = true
    )]
    game_root: PathBuf,

    /// Archive cache file.
    #[arg(long, env = "HIVESWAP_CACHE", default_value = "archives.json", global = true)]
    cache: PathBuf,

    /// Neither read nor write the caches.
    #[arg(long, global = true)]
    no_cache: bool,

    /// Maximum number of files read at once.
    #[arg(long, default_value_t = 20, global = true)]
    concurrency: usize,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write <Category>.json and <Category>Transcript.md files.
    Export {
        /// Output directory.
        #[arg(long, env = "HIVESWAP_OUT", default_value = "out")]
        out: PathBuf,

        /// Only these categories (repeatable); all when omitted.
        #[arg(long = "category", value_name = "CATEGORY")]
        categories: Vec<Category>,

        /// Leave out the "Referenced by" lines.
        #[arg(long)]
        no_references: bool,
    },

    /// Show the references into and out of one record.
    Refs {
        archive: String,
        id: i64,

        /// Print the HTML fragment instead of plain text.
        #[arg(long)]
        html: bool,
    },

    /// List unclaimed fields per node kind.
    Drift {
        /// Only these categories (repeatable); all when omitted.
        #[arg(long = "category", value_name = "CATEGORY")]
        categories: Vec<Category>,
    },
}

impl LoadArgs {
    fn config(&self) -> LoaderConfig {
        LoaderConfig::new(&self.game_root)
            .with_cache_path(&self.cache)
            .with_cache(!self.no_cache)
            .with_concurrency(self.concurrency)
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "hiveswap=debug,hiveswap_core=debug"
    } else {
        "hiveswap=info,hiveswap_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load.config();
    let loaded = loader::load_or_build(&config)
        .await
        .with_context(|| format!("loading archives from {}", config.game_root.display()))?;
    tracing::info!(
        records = loaded.store.len(),
        from_cache = loaded.from_cache,
        "archives ready"
    );
    let store = loaded.store;
    let resolver = ResolverConfig::new().with_strict_ids(cli.strict_refs);

    match cli.command {
        Command::Export {
            out,
            categories,
            no_references,
        } => {
            let mut export = ExportConfig::new(out).with_references(!no_references);
            if !categories.is_empty() {
                export = export.with_categories(categories);
            }
            let graph = if export.references {
                loader::load_graph(&config, &store).await
            } else {
                ReferenceGraph::default()
            };
            let summary = Exporter::new(&store, &resolver)
                .with_graph(&graph)
                .export(&export)
                .await?;
            for (category, roots) in &summary.categories {
                println!("{category}: {roots} roots");
            }
            for file in &summary.files {
                println!("wrote {}", file.display());
            }
        }
        Command::Refs { archive, id, html } => {
            let graph = loader::load_graph(&config, &store).await;
            let key = RecordKey::new(archive, id);
            if html {
                print!("{}", graph.references_html(&store, &key));
            } else {
                print_refs(&store, &graph, &key);
            }
        }
        Command::Drift { categories } => {
            let categories = if categories.is_empty() {
                Category::ALL.to_vec()
            } else {
                categories
            };
            let report = Exporter::new(&store, &resolver).drift(&categories)?;
            if report.is_empty() {
                println!("No unclaimed fields.");
            }
            for (kind, fields) in report.iter() {
                let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
                println!("{kind}: {}", fields.join(", "));
            }
        }
    }
    Ok(())
}

fn print_refs(store: &ArchiveStore, graph: &ReferenceGraph, key: &RecordKey) {
    println!("{}", ReferenceGraph::record_label(store, key));
    for (heading, references) in [
        ("Referenced by", graph.referrers(key)),
        ("References", graph.referents(key)),
    ] {
        println!();
        println!("{heading}:");
        if references.is_empty() {
            println!("  (none)");
        }
        for (other, paths) in references {
            println!(
                "  {} as {}",
                ReferenceGraph::record_label(store, &other),
                paths.join(", ")
            );
        }
    }
}
