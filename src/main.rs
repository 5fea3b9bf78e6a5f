//! Phone Importer CLI
//!
//! Copies camera files from a connected phone to staging, and from staging
//! into the dated archive.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use phone_importer::{
    classify_dir, find_latest_folder, import_staging, sync_to_staging, DeviceAdapter,
    ImportConfig, ImportConfigBuilder, ImportErrorKind, ListingSource, MountedDeviceBackend,
    ProgressReporter,
};

const ABOUT: &str = r#"
Phone Importer - copy camera files from a phone and sort them by date

Examples:
  phone_importer copy                       Copy new files from the phone to staging
  phone_importer import                     Sort staged files into the archive
  phone_importer --test import              Import into the test archive instead
  phone_importer import --dry-run --json    Show what an import would do
  phone_importer latest                     Show the newest archive folder
  phone_importer classify Staging           Classify staged files by name
"#;

/// Phone media importer
#[derive(Parser)]
#[command(name = "phone_importer")]
#[command(author, version, about = ABOUT, long_about = None)]
#[command(disable_help_flag = true)]
#[command(help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Import into the test archive
    #[arg(long, global = true, help = "Redirect the archive to the test directory")]
    test: bool,

    /// JSON config file
    #[arg(short = 'c', long, global = true, help = "Read settings from a JSON file")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true, help = "Print the result as JSON")]
    json: bool,

    /// Progress lines on stderr
    #[arg(long, global = true, help = "Write JSON progress lines to stderr")]
    progress: bool,

    /// Size threshold in bytes
    #[arg(long, global = true, help = "Minimum file size in bytes")]
    min_size: Option<u64>,

    /// Show help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::Help, global = true)]
    help: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy new files from the phone camera folder to staging
    #[command(about = "Copy new files from the phone to staging", disable_help_flag = true)]
    Copy {
        /// Only copy files listed when the phone was opened
        #[arg(long, help = "Use the listing taken at connect time")]
        snapshot: bool,
    },

    /// Sort staged files into dated archive folders
    #[command(about = "Sort staged files into the archive", disable_help_flag = true)]
    Import {
        /// Compute outcomes without touching the archive
        #[arg(long, help = "Report what would happen without copying")]
        dry_run: bool,
    },

    /// Show the newest dated archive folder
    #[command(about = "Show the newest dated archive folder", disable_help_flag = true)]
    Latest {
        /// Only count folders with a description separator
        #[arg(long, help = "Ignore folders named by a bare date")]
        require_marker: bool,
    },

    /// Classify files as photo, video or unknown by name
    #[command(about = "Classify files by name", disable_help_flag = true)]
    Classify {
        /// File or directory, staging by default
        path: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("{}", ABOUT);
        println!("Use 'phone_importer --help' for the full help");
        return ExitCode::SUCCESS;
    };

    let config = match load_config(cli.config.as_deref(), cli.test, cli.min_size, cli.progress) {
        Ok(config) => config,
        Err(message) => {
            error!("{}", message);
            return ExitCode::from(1);
        }
    };

    match command {
        Commands::Copy { snapshot } => run_copy(&config, snapshot, cli.json),
        Commands::Import { dry_run } => {
            let config = ImportConfigBuilder::from_config(config).dry_run(dry_run).build();
            run_import(&config, cli.json)
        }
        Commands::Latest { require_marker } => run_latest(&config, require_marker, cli.json),
        Commands::Classify { path } => {
            let path = path.unwrap_or_else(|| config.staging_dir.clone());
            run_classify(&path, cli.json)
        }
    }
}

fn load_config(
    path: Option<&Path>,
    test: bool,
    min_size: Option<u64>,
    progress: bool,
) -> Result<ImportConfig, String> {
    let base = match path {
        Some(path) => ImportConfig::load(path).map_err(|e| e.to_string())?,
        None => ImportConfig::default(),
    };

    let mut builder = ImportConfigBuilder::from_config(base);
    if test {
        builder = builder.test_mode(true);
    }
    if let Some(bytes) = min_size {
        builder = builder.min_file_size(bytes);
    }
    if progress {
        builder = builder.show_progress(true);
    }
    let config = builder.build();
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Cannot serialize result: {}", e),
    }
}

fn run_copy(config: &ImportConfig, snapshot: bool, json: bool) -> ExitCode {
    info!("Copying from device to {}", config.staging_dir.display());
    info!("Device root: {}", config.device_root.display());

    let reporter = ProgressReporter::new(config.show_progress);
    let backend = MountedDeviceBackend::new(&config.device_root);
    let mut adapter = DeviceAdapter::new(backend, config);
    let listing = if snapshot {
        ListingSource::Snapshot
    } else {
        ListingSource::Live
    };

    let result = sync_to_staging(&mut adapter, &config.staging_dir, listing, &reporter);

    if json {
        print_json(&result);
    } else {
        println!("Copy completed:");
        println!("  Listed: {}", result.listed);
        println!("  Copied: {}", result.copied);
        println!("  Already staged: {}", result.skipped);
        println!("  Errors: {}", result.error_count);
        for name in &result.failed_files {
            println!("    {}", name);
        }
        println!("  Duration: {}ms", result.duration_ms);
    }

    let device_missing = result.errors.iter().any(|e| {
        matches!(
            e.kind,
            ImportErrorKind::DeviceUnavailable | ImportErrorKind::NotConnected
        )
    });
    if device_missing {
        println!("Make sure the phone is connected and set to file transfer mode");
        ExitCode::from(2)
    } else if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn run_import(config: &ImportConfig, json: bool) -> ExitCode {
    info!(
        "Importing {} into {}",
        config.staging_dir.display(),
        config.effective_archive_dir().display()
    );
    if config.test_mode {
        info!("Test mode: archive redirected");
    }
    if config.dry_run {
        info!("Dry run: nothing will be copied");
    }

    let reporter = ProgressReporter::new(config.show_progress);
    let result = import_staging(config, &reporter);

    if json {
        print_json(&result);
    } else {
        for file in &result.files {
            println!("{} {}", file.name, file.describe());
        }
        println!("Import completed:");
        println!("  Copied: {}", result.copied);
        println!("  Overwritten: {}", result.overwritten);
        println!("  Skipped: {}", result.skipped);
        println!("  Excluded: {}", result.policy_skipped);
        println!("  Failed: {}", result.failed);
        println!("  Folders created: {}", result.folders_created);
        println!("  Bytes copied: {}", result.bytes_copied);
        for e in &result.errors {
            println!("  Error: {}", e.message);
        }
        println!("  Duration: {}ms", result.duration_ms);
    }

    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn run_latest(config: &ImportConfig, require_marker: bool, json: bool) -> ExitCode {
    let root = config.effective_archive_dir();
    let latest = find_latest_folder(root, require_marker);

    if json {
        let value = match &latest {
            Some((date, path)) => serde_json::json!({
                "date": date.to_string(),
                "folder": path.to_string_lossy(),
            }),
            None => serde_json::Value::Null,
        };
        print_json(&value);
    } else {
        match &latest {
            Some((date, path)) => println!("{} ({})", date, path.display()),
            None => println!("No dated folder under {}", root.display()),
        }
    }
    ExitCode::SUCCESS
}

fn run_classify(path: &Path, json: bool) -> ExitCode {
    let classes = match classify_dir(path) {
        Ok(classes) => classes,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    if json {
        print_json(&classes);
    } else {
        for (name, class) in &classes {
            println!("{} {}", name, class);
        }
    }
    ExitCode::SUCCESS
}
