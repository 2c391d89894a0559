use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use downsize::config::{self, DownsizeConfig, Overrides};
use downsize::imaging::RustBackend;
use downsize::pool::BufferPool;
use downsize::{output, process};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, error, warn};

/// Encoding flags shared by the single-file and batch commands.
#[derive(clap::Args, Clone, Debug)]
struct EncodeArgs {
    /// Target size in bytes; 0 or negative keeps the full size [default: 204800]
    #[arg(short, long, allow_negative_numbers = true)]
    size: Option<i64>,

    /// Output format: jpeg (jpg), png or gif [default: same as input]
    #[arg(short, long)]
    format: Option<String>,

    /// JPEG quality, 1-100 [default: 80]
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,
}

impl EncodeArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            size: self.size,
            format: self.format.clone(),
            quality: self.quality,
        }
    }
}

#[derive(Parser)]
#[command(name = "downsize")]
#[command(about = "Shrink an image until it fits a target file size")]
#[command(long_about = "\
Shrink an image until it fits a target file size

The image is re-encoded at full size first. If that already fits, it is
written as is. Otherwise the width is binary searched (aspect ratio kept)
until the encoding lands within 5% under the target.

Settings are read from downsize.toml (or --config) and overridden by flags.
Run 'downsize gen-config' to generate a documented config file.")]
#[command(version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(flatten)]
    encode: EncodeArgs,

    /// Input image
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output image
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file [default: ./downsize.toml if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Downsize every image under a directory into a mirrored tree
    Batch {
        /// Directory to read images from
        input_dir: PathBuf,
        /// Directory to write results to
        output_dir: PathBuf,
        #[command(flatten)]
        encode: EncodeArgs,
        /// Disable the result cache and re-encode every image
        #[arg(long)]
        no_cache: bool,
    },
    /// Print a stock downsize.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Some(Command::GenConfig) => {
            print!("{}", config::stock_config_toml());
        }
        Some(Command::Batch {
            input_dir,
            output_dir,
            encode,
            no_cache,
        }) => {
            let config = load_settings(cli.config.as_deref(), &encode)?;
            init_thread_pool(&config.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = process::process_dir(
                &RustBackend::new(),
                &input_dir,
                &output_dir,
                &config,
                !no_cache,
                Some(tx),
            );
            if printer.join().is_err() {
                warn!("progress printer panicked");
            }
            output::print_batch_summary(&result?);
        }
        None => {
            let (Some(input), Some(output_path)) = (cli.input, cli.output) else {
                Cli::command().print_help()?;
                return Ok(());
            };
            let config = load_settings(cli.config.as_deref(), &cli.encode)?;
            let pool = BufferPool::new(2);
            let report =
                process::downsize_file(&RustBackend::new(), &pool, &input, &output_path, &config)?;
            output::print_file_report(&report);
        }
    }

    Ok(())
}

/// Load the config file and apply command-line overrides.
///
/// The format tag is checked when the encode configuration is built, so an
/// unsupported `-f` surfaces as an imaging error rather than a config error.
fn load_settings(
    explicit: Option<&Path>,
    encode: &EncodeArgs,
) -> Result<DownsizeConfig, Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    let mut config = config::load_config(explicit, &cwd)?;
    config.apply(&encode.overrides());
    Ok(config)
}

/// Install the stderr log subscriber. Default level is `warn`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the config can lower it, not raise it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
