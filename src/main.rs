use clap::{Parser, Subcommand};
use image_autoresize::config::{self, AutoresizeConfig};
use image_autoresize::imaging::{self, ImageBackend};
use image_autoresize::notify::TracingNotifier;
use image_autoresize::output;
use image_autoresize::resizer::{ImageResizer, ResizeOutcome, ResizeRequest};
use image_autoresize::statistics::Statistics;
use image_autoresize::upload::{self, Folder, PathType, Storage, UploadInterceptor};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "image-autoresize")]
#[command(about = "Shrink oversized images the way an upload hook would")]
#[command(long_about = "\
Shrink oversized images the way an upload hook would

Files in configured directories whose size exceeds the threshold are resized
to fit the configured box, optionally converted (bmp => jpg) and stripped of
metadata. Everything else is left untouched.

Rules are matched by directory (relative to site_root), extension and user
group. Group rule sets come first; the general rule is the fallback:

  image-autoresize.toml
  ├── directories / file_types / threshold / max_width ...   # general rule
  ├── [processor]                                            # imagemagick | graphicsmagick | builtin
  └── [[rulesets]]                                           # per user group overrides

Set RUST_LOG=image_autoresize=debug to see why a file was skipped.

Run 'image-autoresize gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Configuration file (missing = stock defaults)
    #[arg(long, default_value = "image-autoresize.toml", global = true)]
    config: PathBuf,

    /// User group of the uploader; repeat for several groups
    #[arg(long = "user-group", value_name = "ID", global = true)]
    user_groups: Vec<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resize files in place
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Run the upload hooks on a temporary file and store it in a folder
    Upload {
        /// Temporary upload, usually without extension
        temp: PathBuf,
        /// Target folder (relative paths are below site_root)
        #[arg(long)]
        folder: PathBuf,
        /// File name the user uploaded
        #[arg(long)]
        name: String,
    },
    /// Resize every matching file below a directory
    Batch { directory: PathBuf },
    /// Print how much storage resizing has saved
    Stats,
    /// Validate the configuration and list the resulting rules
    Check,
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("image_autoresize=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let notifier = TracingNotifier;

    match cli.command {
        Command::Process { files } => {
            let resizer = load_resizer(&cli.config)?;
            let outcomes: Vec<ResizeOutcome> = files
                .iter()
                .map(|file| {
                    let request = ResizeRequest::new(file).user_groups(&cli.user_groups);
                    let outcome = resizer.evaluate(&request, &notifier);
                    output::print_outcome(file, &outcome);
                    outcome
                })
                .collect();
            println!("{}", output::format_summary(&outcomes));
        }
        Command::Upload { temp, folder, name } => {
            // Like a host integration: a broken config disables resizing
            // instead of rejecting the upload.
            let (config, rules) = config::load_or_disabled(&cli.config, &notifier);
            let resizer = ImageResizer::configured(
                &config,
                rules,
                imaging::backend_from_config(&config.processor),
            );
            let interceptor = UploadInterceptor::new(&resizer, &notifier);
            let folder = local_folder(&folder);

            let sanitized = interceptor.sanitize_file_name(&name, &folder, &cli.user_groups);
            let mut target = sanitized
                .as_ref()
                .map_or_else(|| name.clone(), |s| s.sanitized.clone());
            let outcome = interceptor.pre_file_add(
                &mut target,
                &folder,
                &temp,
                sanitized.as_ref(),
                &cli.user_groups,
            );
            if let Some(outcome) = &outcome {
                output::print_outcome(&temp, outcome);
            }

            let directory = folder
                .physical_path(resizer.site_root())
                .ok_or("target folder is not on local storage")?;
            let stored = upload::store_file(&temp, &directory, &target)?;
            println!("Stored as {}", stored.display());
        }
        Command::Batch { directory } => {
            let resizer = load_resizer(&cli.config)?;
            let files = collect_files(&directory)?;
            let outcomes: Vec<ResizeOutcome> = files
                .iter()
                .map(|file| {
                    let request = ResizeRequest::new(file).user_groups(&cli.user_groups);
                    let outcome = resizer.evaluate(&request, &notifier);
                    if outcome.is_resized() {
                        output::print_outcome(file, &outcome);
                    }
                    outcome
                })
                .collect();
            println!("{}", output::format_summary(&outcomes));
        }
        Command::Stats => {
            let config = config::load_config(&cli.config)?;
            // An unreadable statistics file just means there is nothing to show
            if let Some(stats) = config.statistics_path().and_then(|p| Statistics::load(&p)) {
                output::print_banner(&stats);
            }
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            let config = config::load_config(&cli.config)?;
            let rules = config.rule_set()?;
            output::print_rule_set(&rules);
            println!("==> Configuration is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config strictly (errors abort) and build a resizer from it.
fn load_resizer(path: &Path) -> Result<ImageResizer<Box<dyn ImageBackend>>, config::ConfigError> {
    let config: AutoresizeConfig = config::load_config(path)?;
    let rules = config.rule_set()?;
    let backend = imaging::backend_from_config(&config.processor);
    Ok(ImageResizer::configured(&config, rules, backend))
}

/// A plain directory as a local storage folder.
fn local_folder(directory: &Path) -> Folder {
    let path_type = if directory.is_absolute() {
        PathType::Absolute
    } else {
        PathType::Relative
    };
    Folder::new(
        Storage::local(directory.to_string_lossy(), path_type),
        "/",
    )
}

/// All regular files below `directory`, skipping hidden entries.
fn collect_files(directory: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    let walker = WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
