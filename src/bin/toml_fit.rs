use clap::Parser;
use endureio::config::toml_config::TomlConfig;
use endureio::core::ConfigProvider;
use endureio::fit::{DecodeOptions, FitFrame, FitReader};
use endureio::utils::{logger, validation::Validate};
use endureio::{EtlEngine, FitPipeline, LocalStorage};

#[derive(Parser)]
#[command(name = "toml-fit")]
#[command(about = "Convert FIT files using a TOML configuration")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "endureio.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Decode file headers and report what would be written, without writing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    tracing::info!("Loading configuration from: {}", args.config);

    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config file '{}': {}", args.config, e);
            eprintln!("Make sure the file exists and is valid TOML");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("{}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("Dry run, nothing will be written");
        perform_dry_run(&config);
        return;
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("System monitoring enabled");
    }

    let storage = LocalStorage::new(".");
    let pipeline = FitPipeline::new(storage, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("Conversion completed");
            println!("Output saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "Conversion failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("{}", e.user_friendly_message());
            eprintln!("Suggestion: {}", e.recovery_suggestion());

            std::process::exit(e.exit_code());
        }
    }
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("Configuration Summary:");
    println!("  Pipeline: {}", config.pipeline.name);
    if let Some(description) = &config.pipeline.description {
        println!("  Description: {}", description);
    }
    println!("  Inputs: {}", config.input_files().len());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.output_formats().join(", "));
    if let Some(archive) = config.archive_name() {
        println!("  Archive: {}", archive);
    }

    let read = config.read_options();
    println!(
        "  Columns: opinionated={} unopinionated={} overwrites={}",
        read.opinionated, read.include_unopinionated, read.allow_column_overwrites
    );

    if args.dry_run {
        println!("  DRY RUN MODE ENABLED");
    }
    println!();
}

fn perform_dry_run(config: &TomlConfig) {
    let options = DecodeOptions {
        check_crc: config.read_options().check_crc,
    };

    for path in config.input_files() {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                println!("  {}: unreadable ({})", path, e);
                continue;
            }
        };

        let mut files = 0;
        let mut messages = 0;
        let mut records = 0;
        let mut error = None;
        for frame in FitReader::with_options(&bytes, options) {
            match frame {
                Ok(FitFrame::Header(header)) => {
                    files += 1;
                    tracing::debug!(
                        "{}: protocol {} profile {} ({} bytes)",
                        path,
                        header.protocol_version,
                        header.profile_version,
                        header.data_size
                    );
                }
                Ok(FitFrame::Data(message)) => {
                    messages += 1;
                    if message.name == Some("record") {
                        records += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }

        match error {
            None => println!(
                "  {}: {} file(s), {} messages, {} records",
                path, files, messages, records
            ),
            Some(e) => println!("  {}: decode error after {} messages: {}", path, messages, e),
        }
    }
}
