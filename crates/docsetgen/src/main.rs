use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docsetgen_core::config::{DocsetConfig, load_config};
use docsetgen_core::http::{HttpClientConfig, WikiHttpClient};
use docsetgen_core::index::{IndexStats, load_index_stats};
use docsetgen_core::pipeline::{BuildReport, run_build};
use docsetgen_core::runtime::{
    BundlePaths, InitOptions, PathOverrides, init_layout, inspect_bundle, normalize_for_display,
    resolve_paths,
};
use docsetgen_core::sanitize::{SanitizeReport, sanitize_documents};

#[derive(Debug, Parser)]
#[command(
    name = "docsetgen",
    version,
    about = "Build a Dash docset from the LÖVE wiki"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Docset bundle root")]
    bundle: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    bundle: Option<PathBuf>,
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            bundle: cli.bundle.clone(),
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Crawl the wiki and rebuild the docset (default)")]
    Build(BuildArgs),
    #[command(about = "Create the bundle layout and Info.plist")]
    Init(InitArgs),
    #[command(about = "Unwrap dangling links in already generated pages")]
    Sanitize,
    #[command(about = "Show bundle and index status")]
    Status,
}

#[derive(Debug, Args, Default)]
struct BuildArgs {
    #[arg(long, help = "Print the build report as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing Info.plist")]
    force: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Build(args)) => run_build_command(&runtime, args),
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::Sanitize) => run_sanitize(&runtime),
        Some(Commands::Status) => run_status(&runtime),
        None => run_build_command(&runtime, BuildArgs::default()),
    }
}

fn run_build_command(runtime: &RuntimeOptions, args: BuildArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_runtime_config(&paths)?;
    let mut client = WikiHttpClient::new(HttpClientConfig::from_section(&config.http))?;

    let report = run_build(&paths, &config, &mut client)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("docset build");
        println!("bundle_root: {}", normalize_for_display(&paths.bundle_root));
        print_build_report(&report);
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = init_layout(&paths, &InitOptions { force: args.force })?;
    println!("Initialized docset bundle layout");
    println!("bundle_root: {}", normalize_for_display(&paths.bundle_root));
    println!(
        "documents_dir: {}",
        normalize_for_display(&paths.documents_dir)
    );
    println!(
        "info_plist: {}",
        normalize_for_display(&paths.info_plist_path)
    );
    println!("created_dirs: {}", report.created_dirs.len());
    println!("wrote_info_plist: {}", report.wrote_info_plist);
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn run_sanitize(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = sanitize_documents(&paths.documents_dir)?;
    println!("docset sanitize");
    println!(
        "documents_dir: {}",
        normalize_for_display(&paths.documents_dir)
    );
    print_sanitize_report("sanitize", &report);
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn run_status(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_bundle(&paths)?;
    println!("docset status");
    println!("bundle_root: {}", normalize_for_display(&paths.bundle_root));
    println!("bundle_exists: {}", format_flag(status.bundle_exists));
    println!("info_plist_exists: {}", format_flag(status.info_plist_exists));
    println!("index_exists: {}", format_flag(status.index_exists));
    println!("stylesheet_exists: {}", format_flag(status.stylesheet_exists));
    println!("documents.html: {}", status.html_files);
    println!("documents.media: {}", status.media_files);
    match load_index_stats(&paths.index_path)? {
        Some(stats) => print_index_stats("index", &stats),
        None => println!("index.storage: <not built> (run `docsetgen build`)"),
    }
    if !status.warnings.is_empty() {
        println!("warnings:");
        for warning in &status.warnings {
            println!("  - {warning}");
        }
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn print_build_report(report: &BuildReport) {
    for category in &report.categories {
        println!(
            "category.{}: listed={} written={} inserted={} duplicates={}",
            category.entry_type,
            category.listed,
            category.written,
            category.inserted,
            category.duplicates
        );
    }
    println!("pages_written: {}", report.pages_written);
    println!("entries_inserted: {}", report.entries_inserted);
    println!("media.downloaded: {}", report.media_downloaded);
    println!("media.cached: {}", report.media_cached);
    println!("links.kept: {}", report.links_kept);
    println!("links.unwrapped: {}", report.links_unwrapped);
    println!("requests: {}", report.requests);
    print_sanitize_report("sanitize", &report.sanitize);
    print_index_stats("index", &report.index);
}

fn print_sanitize_report(prefix: &str, report: &SanitizeReport) {
    println!("{prefix}.scanned: {}", report.scanned);
    println!("{prefix}.rewritten: {}", report.rewritten);
    println!("{prefix}.unwrapped_links: {}", report.unwrapped_links);
    println!(
        "{prefix}.removed_see_also_items: {}",
        report.removed_see_also_items
    );
    println!(
        "{prefix}.removed_see_also_sections: {}",
        report.removed_see_also_sections
    );
}

fn print_index_stats(prefix: &str, stats: &IndexStats) {
    println!("{prefix}.total_entries: {}", stats.total_entries);
    if stats.by_type.is_empty() {
        println!("{prefix}.by_type: <empty>");
    } else {
        for (entry_type, count) in &stats.by_type {
            println!("{prefix}.type.{entry_type}: {count}");
        }
    }
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<BundlePaths> {
    let cwd = env::current_dir().context("failed to read current directory")?;
    let overrides = PathOverrides {
        bundle: runtime.bundle.clone(),
        config: runtime.config.clone(),
    };
    Ok(resolve_paths(&cwd, &overrides))
}

fn load_runtime_config(paths: &BundlePaths) -> Result<DocsetConfig> {
    let config = load_config(&paths.config_path)?;
    tracing::debug!(
        path = %normalize_for_display(&paths.config_path),
        exists = paths.config_path.exists(),
        "loaded config"
    );
    Ok(config)
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
