//! # Product Sheet Generator CLI (`psg`)
//!
//! ## Usage
//!
//! ```bash
//! psg --config ./config/psg.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `psg init` | Create the SQLite database and schema |
//! | `psg serve` | Start the HTTP API server |
//! | `psg search <ean>` | Search an EAN and record the evidence |
//! | `psg generate <ean>` | Generate a product (and a sheet) from an EAN |
//! | `psg products list\|get\|delete` | Inspect or remove products |
//! | `psg sheets create\|list\|get\|status\|export` | Work with sheets |
//! | `psg stats` | Catalog statistics |
//!
//! Command output is JSON on stdout. Logs go to stderr and are filtered with
//! `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use product_sheets::catalog;
use product_sheets::config::{self, Config};
use product_sheets::db;
use product_sheets::export::ExportFormat;
use product_sheets::migrate;
use product_sheets::models::SheetStatus;
use product_sheets::pipeline::{GenerateRequest, Pipeline};
use product_sheets::server;
use product_sheets::store::{ProductQuery, SheetQuery, SqliteStore, DEFAULT_LIST_LIMIT};

/// Product Sheet Generator: build e-commerce product records and catalog
/// sheets from an EAN barcode.
#[derive(Parser)]
#[command(
    name = "psg",
    about = "Generate e-commerce product records and catalog sheets from an EAN barcode",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/psg.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Start the HTTP API server on `[server].bind`.
    Serve,

    /// Search an EAN, extract evidence and record the search.
    Search {
        ean: String,
    },

    /// Run the full pipeline for an EAN.
    Generate {
        ean: String,

        /// Skip sheet generation.
        #[arg(long)]
        no_sheet: bool,
    },

    /// Inspect or delete products.
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },

    /// Create, inspect and export sheets.
    Sheets {
        #[command(subcommand)]
        action: SheetAction,
    },

    /// Show catalog statistics.
    Stats,
}

#[derive(Subcommand)]
enum ProductAction {
    List {
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long)]
        category: Option<String>,
    },
    Get {
        id: String,
    },
    /// Delete a product and all of its sheets.
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum SheetAction {
    /// Generate a new sheet for a stored product.
    Create {
        product_id: String,

        /// Use the deterministic template even if a provider is configured.
        #[arg(long)]
        template: bool,
    },
    List {
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// draft, published or exported.
        #[arg(long)]
        status: Option<String>,
        /// Only sheets of this product.
        #[arg(long)]
        product: Option<String>,
    },
    Get {
        id: String,
    },
    /// Set the status of a sheet (draft, published, exported).
    Status {
        id: String,
        status: String,
    },
    /// Export a sheet (prestashop or json).
    Export {
        id: String,
        #[arg(long, default_value = "prestashop")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search { ean } => {
            let pipeline = open_pipeline(&cfg).await?;
            print_json(&pipeline.search_ean(&ean).await?)?;
        }
        Commands::Generate { ean, no_sheet } => {
            let pipeline = open_pipeline(&cfg).await?;
            let response = pipeline
                .generate(GenerateRequest {
                    ean_code: ean,
                    generate_sheet: !no_sheet,
                })
                .await?;
            print_json(&response)?;
        }
        Commands::Products { action } => {
            let pipeline = open_pipeline(&cfg).await?;
            let store = pipeline.store();
            match action {
                ProductAction::List {
                    limit,
                    offset,
                    category,
                } => {
                    let query = ProductQuery {
                        limit,
                        offset,
                        category,
                    };
                    print_json(&catalog::list_products(store, &query).await?)?;
                }
                ProductAction::Get { id } => {
                    print_json(&catalog::get_product(store, &id).await?)?;
                }
                ProductAction::Delete { id } => {
                    let removed = catalog::delete_product(store, &id).await?;
                    println!("Deleted product {} ({} sheets removed)", id, removed);
                }
            }
        }
        Commands::Sheets { action } => {
            let pipeline = open_pipeline(&cfg).await?;
            let store = pipeline.store();
            match action {
                SheetAction::Create {
                    product_id,
                    template,
                } => {
                    print_json(&pipeline.create_sheet(&product_id, !template).await?)?;
                }
                SheetAction::List {
                    limit,
                    offset,
                    status,
                    product,
                } => {
                    let status = status
                        .as_deref()
                        .map(str::parse::<SheetStatus>)
                        .transpose()?;
                    let query = SheetQuery {
                        limit,
                        offset,
                        status,
                        product_id: product,
                    };
                    print_json(&catalog::list_sheets(store, &query).await?)?;
                }
                SheetAction::Get { id } => {
                    print_json(&catalog::get_sheet(store, &id).await?)?;
                }
                SheetAction::Status { id, status } => {
                    let status: SheetStatus = status.parse()?;
                    print_json(&catalog::set_sheet_status(store, &id, status).await?)?;
                }
                SheetAction::Export { id, format } => {
                    let format: ExportFormat = format.parse()?;
                    print_json(&catalog::export(store, &id, format).await?)?;
                }
            }
        }
        Commands::Stats => {
            let pipeline = open_pipeline(&cfg).await?;
            let stats = catalog::stats(pipeline.store(), pipeline.api_status()).await?;

            println!("Product Sheet Generator — Catalog Stats");
            println!("=======================================");
            println!();
            println!("  Database:    {}", cfg.db.path.display());
            println!();
            println!("  Products:    {}", stats.total_products);
            println!("  Sheets:      {}", stats.total_sheets);
            println!("  Searches:    {}", stats.total_searches);
            println!();
            if !stats.categories.is_empty() {
                println!("  {:<24} {:>8}", "CATEGORY", "PRODUCTS");
                for (category, count) in &stats.categories {
                    println!("  {:<24} {:>8}", category, count);
                }
                println!();
            }
            println!(
                "  Generation:  {}",
                configured(stats.api_status.generation_configured)
            );
            println!(
                "  Search:      {}",
                configured(stats.api_status.search_configured)
            );
        }
    }

    Ok(())
}

async fn open_pipeline(cfg: &Config) -> Result<Pipeline> {
    let pool = db::connect(cfg).await?;
    migrate::migrate_pool(&pool).await?;
    Pipeline::from_config(cfg, Arc::new(SqliteStore::new(pool)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn configured(flag: bool) -> &'static str {
    if flag {
        "configured"
    } else {
        "not configured (fallback)"
    }
}
