//! Labelforge: dataset version materialization.
//!
//! Labelforge turns uploaded images and freeform bounding-box annotations
//! into trainable dataset versions: a per-version class registry, one label
//! file per image, a train/val/test split on disk and a `data.yaml`
//! manifest, with a SQLite catalog kept in step with the files.
//!
//! # Modules
//!
//! - [`engine`]: Request-level operations (upload, save, show, delete, training)
//! - [`registry`]: Per-version label class allocation
//! - [`assets`]: Copying images into version directories
//! - [`annotations`]: Annotation replacement and label-file rendering
//! - [`split`]: Train/val/test partitioning
//! - [`layout`]: Split directories and the manifest
//! - [`gc`]: Dataset deletion
//! - [`catalog`]: The relational record
//! - [`validation`]: Save request validation and reporting
//! - [`error`]: Error types for labelforge operations

pub mod annotations;
pub mod assets;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod gc;
pub mod layout;
pub mod logging;
pub mod model;
pub mod registry;
pub mod request;
pub mod split;
pub mod training;
pub mod validation;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::LabelforgeError;

use model::{DatasetId, UserId};
use request::SaveRequest;
use split::{ShuffleMode, SplitRatios};

/// The labelforge CLI application.
#[derive(Parser)]
#[command(name = "labelforge")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by every subcommand.
#[derive(clap::Args)]
struct GlobalArgs {
    /// Root directory for dataset files.
    #[arg(long, global = true, env = "LABELFORGE_DATA_ROOT", default_value = config::DEFAULT_DATA_ROOT)]
    data_root: PathBuf,

    /// Catalog database file (default: <data-root>/catalog.db).
    #[arg(long, global = true, env = "LABELFORGE_CATALOG")]
    catalog: Option<PathBuf>,

    /// Split ratios as 'train,val,test'; must sum to 1.
    #[arg(long, global = true, env = "LABELFORGE_SPLIT", default_value = "0.8,0.1,0.1")]
    split: SplitRatios,

    /// Seed the shuffle from the version id so re-saves keep their split.
    #[arg(long, global = true, env = "LABELFORGE_SEED_PER_VERSION")]
    seed_per_version: bool,

    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

impl GlobalArgs {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(&self.data_root).with_ratios(self.split);
        if let Some(catalog) = &self.catalog {
            config = config.with_catalog(catalog);
        }
        if self.seed_per_version {
            config = config.with_shuffle(ShuffleMode::PerVersion);
        }
        config
    }
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Upload images into a dataset's base version (created if needed).
    Upload(UploadArgs),
    /// Save annotations from a JSON request and rebuild the version layout.
    Save(SaveArgs),
    /// Show one version with its classes, assets and annotations.
    Show(ShowArgs),
    /// List datasets and their versions.
    List(ListArgs),
    /// Delete a dataset with all its versions and files.
    Delete(DeleteArgs),
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args)]
struct UploadArgs {
    /// Owner user id.
    #[arg(long)]
    owner: i64,

    /// Dataset name, unique per owner.
    #[arg(long)]
    name: String,

    #[arg(long)]
    description: Option<String>,

    /// Image files to upload.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct SaveArgs {
    /// Owner user id.
    #[arg(long)]
    owner: i64,

    /// Save request JSON file.
    request: PathBuf,

    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct ShowArgs {
    /// Owner user id.
    #[arg(long)]
    owner: i64,

    dataset_id: i64,

    version_tag: String,

    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct ListArgs {
    /// Owner user id.
    #[arg(long)]
    owner: i64,

    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct DeleteArgs {
    /// Owner user id.
    #[arg(long)]
    owner: i64,

    dataset_id: i64,

    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

/// Run the labelforge CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), LabelforgeError> {
    let cli = Cli::parse();

    // A subscriber installed by an embedding process wins.
    let _ = logging::init_logging(cli.global.verbose);

    let engine = Engine::new(cli.global.engine_config());

    match cli.command {
        Some(Commands::Upload(args)) => run_upload(&engine, args),
        Some(Commands::Save(args)) => run_save(&engine, args),
        Some(Commands::Show(args)) => run_show(&engine, args),
        Some(Commands::List(args)) => run_list(&engine, args),
        Some(Commands::Delete(args)) => run_delete(&engine, args),
        None => {
            println!("labelforge {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Dataset version materialization engine.");
            println!();
            println!("Run 'labelforge --help' for usage information.");
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), LabelforgeError> {
    let rendered = serde_json::to_string_pretty(value).map_err(LabelforgeError::Render)?;
    println!("{rendered}");
    Ok(())
}

fn run_upload(engine: &Engine, args: UploadArgs) -> Result<(), LabelforgeError> {
    let summary = engine.upload(
        UserId(args.owner),
        &args.name,
        args.description.as_deref(),
        &args.files,
    )?;

    match args.output {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Text => {
            println!(
                "Dataset {} ('{}'){}",
                summary.dataset.id,
                summary.dataset.name,
                if summary.dataset_created {
                    " created"
                } else {
                    ""
                }
            );
            println!(
                "Uploaded {} image(s) to {}",
                summary.uploaded.len(),
                summary.version.tag
            );
            for name in &summary.skipped {
                println!("  skipped {name}: already present");
            }
            Ok(())
        }
    }
}

fn run_save(engine: &Engine, args: SaveArgs) -> Result<(), LabelforgeError> {
    let request = SaveRequest::from_json_file(&args.request)?;

    let summary = match engine.save(UserId(args.owner), &request) {
        Ok(summary) => summary,
        Err(LabelforgeError::ValidationFailed {
            error_count,
            warning_count,
            report,
        }) => {
            match args.output {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => print!("{}", report),
            }
            return Err(LabelforgeError::ValidationFailed {
                error_count,
                warning_count,
                report,
            });
        }
        Err(err) => return Err(err),
    };

    match args.output {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Text => {
            println!(
                "Saved dataset {} version {}{}",
                summary.dataset_id,
                summary.version.tag,
                if summary.version_created {
                    " (new)"
                } else {
                    ""
                }
            );
            println!(
                "  images: {} processed, {} skipped",
                summary.images_processed, summary.images_skipped
            );
            println!(
                "  assets: {} copied, {} reused",
                summary.assets_copied, summary.assets_reused
            );
            println!(
                "  annotations: {}, new classes: {}",
                summary.annotations_written, summary.classes_created
            );
            println!("  split: {}", summary.counts);
            Ok(())
        }
    }
}

fn run_show(engine: &Engine, args: ShowArgs) -> Result<(), LabelforgeError> {
    let detail = engine.dataset_detail(
        UserId(args.owner),
        DatasetId(args.dataset_id),
        &args.version_tag,
    )?;

    match args.output {
        OutputFormat::Json => print_json(&detail),
        OutputFormat::Text => {
            println!(
                "Dataset {} ('{}') version {}",
                detail.dataset.id, detail.dataset.name, detail.version.tag
            );
            if let Some(stats) = &detail.version.stats {
                println!("Split: {}", stats.counts);
            }
            println!("Classes ({}):", detail.classes.len());
            for class in &detail.classes {
                println!("  {} {}", class.class_id, class.name);
            }
            println!("Assets ({}):", detail.assets.len());
            for item in &detail.assets {
                let split = item
                    .asset
                    .split
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  [{}] {} split={} boxes={}",
                    item.asset.id,
                    item.asset.name,
                    split,
                    item.annotations.len()
                );
            }
            Ok(())
        }
    }
}

fn run_list(engine: &Engine, args: ListArgs) -> Result<(), LabelforgeError> {
    let overview = engine.list_datasets(UserId(args.owner))?;

    match args.output {
        OutputFormat::Json => print_json(&overview),
        OutputFormat::Text => {
            if overview.is_empty() {
                println!("No datasets");
            }
            for entry in &overview {
                println!("{} {}", entry.dataset.id, entry.dataset.name);
                for version in &entry.versions {
                    match &version.stats {
                        Some(stats) => println!("  {} {}", version.tag, stats.counts),
                        None => println!("  {} (not materialized)", version.tag),
                    }
                }
            }
            Ok(())
        }
    }
}

fn run_delete(engine: &Engine, args: DeleteArgs) -> Result<(), LabelforgeError> {
    let summary = engine.delete_dataset(UserId(args.owner), DatasetId(args.dataset_id))?;

    match args.output {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Text => {
            println!(
                "Deleted dataset {}: {} version(s), {} asset(s), {} path(s) removed",
                args.dataset_id, summary.versions, summary.assets, summary.paths_removed
            );
            Ok(())
        }
    }
}
