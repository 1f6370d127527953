use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_summarizer::cli::{Cli, Commands};
use video_summarizer::config::{self, Config};
use video_summarizer::pipeline::{
    discover_videos, InstructionSource, ItemKind, ItemStatus, Pipeline, RunReport,
    StaticInstruction,
};
use video_summarizer::{console, utils, web};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "summarizer=debug,video_summarizer=debug"
    } else {
        "summarizer=info,video_summarizer=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;

    match cli.command {
        Commands::Run {
            folder,
            instruction,
            output,
        } => {
            warn_on_missing_tools(&config).await;
            let pipeline = build_pipeline(&config)?;

            match output {
                Some(root) => {
                    let folder = match folder {
                        Some(folder) => folder,
                        None => anyhow::bail!("--output requires the folder argument"),
                    };
                    let report =
                        run_batch_into(&pipeline, &folder, &root, instruction).await?;
                    println!(
                        "Done: {}/{} items fully processed.",
                        report.completed(),
                        report.items.len()
                    );
                }
                None => console::run(&pipeline, folder, instruction).await?,
            }
        }
        Commands::File {
            path,
            kind,
            instruction,
            output,
        } => {
            warn_on_missing_tools(&config).await;
            let pipeline = build_pipeline(&config)?;

            let root = output
                .or_else(|| config.app.output_root.clone())
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

            let report = pipeline
                .run_single(&path, kind.into(), instruction, &root)
                .await;

            match &report.status {
                ItemStatus::Completed => {
                    if let Some(path) = &report.summary_path {
                        println!("Summary saved to: {}", path.display());
                    }
                }
                status => println!("{}: {status:?}", path.display()),
            }
        }
        Commands::Serve { addr } => {
            warn_on_missing_tools(&config).await;
            let pipeline = Arc::new(build_pipeline(&config)?);

            let root = config
                .app
                .output_root
                .clone()
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

            let state = web::AppState::new(pipeline, root, config.app.max_upload_mb);
            web::serve(&addr, state).await?;
        }
        Commands::Setup { max_upload_mb } => {
            let key = std::env::var(config::API_KEY_ENV).map_err(|_| {
                anyhow::anyhow!(
                    "Environment variable {} not found, aborting setup",
                    config::API_KEY_ENV
                )
            })?;

            let secrets_path = config::store_api_key_in(&Config::config_dir()?, &key)?;
            println!("API key stored in {}", secrets_path.display());

            let mut config = config;
            config.app.max_upload_mb = max_upload_mb;
            config.save()?;
            println!("Maximum upload size set to {max_upload_mb} MB");
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Edit the config file manually, or run `summarizer setup`.");
            }
        }
    }

    Ok(())
}

/// Credentials are a hard precondition: resolve the key before building
/// any pipeline so a missing key aborts the run up front.
fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let api_key = config::resolve_api_key()?;
    Pipeline::from_config(config, api_key)
}

async fn warn_on_missing_tools(config: &Config) {
    let missing = utils::check_dependencies(&config.media).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {dep}");
        }
        eprintln!("   (Continuing anyway - tools may become available per item)");
    }
}

/// Batch runs normally derive the output root from the folder's parent;
/// an explicit --output processes the same items into the given root.
async fn run_batch_into(
    pipeline: &Pipeline,
    folder: &std::path::Path,
    root: &std::path::Path,
    instruction: Option<String>,
) -> Result<RunReport> {
    let items = discover_videos(folder)?;
    let mut source = StaticInstruction(instruction);
    let mut report = RunReport::default();
    for item in items {
        let item_report = pipeline
            .run_single(&item, ItemKind::Video, source.instruction(), root)
            .await;
        report.items.push(item_report);
    }
    Ok(report)
}
