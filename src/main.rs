use clap::{Args, Parser, Subcommand};
use csv2midi::{Config, ConversionResult, Converter, TempoUnit, TimeUnit};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// CSV-to-MIDI Converter
#[derive(Parser)]
#[command(name = "csv2midi")]
#[command(about = "Convert CSV event lists to Standard MIDI Files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "CSV format:\n  \
    track,time,type,channel,note,velocity,program,controller,value,tempo,meta_text")]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV file to a MIDI file
    Convert {
        /// Input CSV file
        input: PathBuf,

        /// Output MIDI file
        output: PathBuf,

        #[command(flatten)]
        options: ConvertOptions,
    },
    /// Check a CSV file without writing any output
    Validate {
        /// Input CSV file
        input: PathBuf,

        #[command(flatten)]
        options: ConvertOptions,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig {
        /// Write the configuration to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ConvertOptions {
    /// Custom configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pulses per quarter note [default: 480]
    #[arg(long)]
    ppq: Option<u16>,

    /// Time unit: ticks, beats or ms [default: ticks]
    #[arg(long = "time-units")]
    time_units: Option<TimeUnit>,

    /// Tempo unit: bpm or uspb [default: uspb]
    #[arg(long = "tempo-unit")]
    tempo_unit: Option<TempoUnit>,

    /// Disable automatic note-off generation
    #[arg(long = "no-auto-noteoff")]
    no_auto_note_off: bool,

    /// Duration of automatic note-offs in ticks [default: 480]
    #[arg(long = "auto-noteoff-duration")]
    auto_note_off_duration: Option<u32>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl ConvertOptions {
    /// Start from the config file (or defaults) and apply command-line overrides
    fn resolve(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => csv2midi::config::load_config(path)?,
            None => Config::default(),
        };

        if let Some(ppq) = self.ppq {
            config.ppq = ppq;
        }
        if let Some(unit) = self.time_units {
            config.time_unit = unit;
        }
        if let Some(unit) = self.tempo_unit {
            config.tempo_unit = unit;
        }
        if self.no_auto_note_off {
            config.auto_note_off = false;
        }
        if let Some(duration) = self.auto_note_off_duration {
            config.auto_note_off_duration = duration;
        }

        csv2midi::config::validate_config(&config)?;
        Ok(config)
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_result(result: &ConversionResult, output: Option<&Path>, quiet: bool) {
    if result.success {
        if !quiet {
            println!("✓ Conversion successful!");
            println!("  Tracks: {}", result.track_count);
            println!("  Events: {}", result.event_count);
            if let Some(ms) = result.conversion_time_ms {
                println!("  Time: {:.2}ms", ms);
            }
            if let Some(output) = output {
                println!("  Output: {}", output.display());
            }
        }
    } else {
        eprintln!("✗ Conversion failed!");
        eprintln!("\nErrors:");
        for error in &result.errors {
            eprintln!("  ✗ {}", error);
        }
    }

    if !result.warnings.is_empty() && !quiet {
        println!("\nWarnings:");
        for warning in &result.warnings {
            println!("  ⚠ {}", warning);
        }
    }
}

fn exit_code(result: &ConversionResult) -> ExitCode {
    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    if cli.verbose && cli.quiet {
        anyhow::bail!("Cannot specify both --verbose and --quiet");
    }
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Convert {
            input,
            output,
            options,
        } => {
            let config = options.resolve()?;
            if !input.exists() {
                anyhow::bail!("Input file not found: {}", input.display());
            }

            let converter = Converter::new(config);
            if !cli.quiet && !options.json {
                println!("Converting {} → {}...", input.display(), output.display());
            }

            let result = converter.convert_file(&input, &output);
            if options.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result, Some(&output), cli.quiet);
            }
            Ok(exit_code(&result))
        }
        Commands::Validate { input, options } => {
            let config = options.resolve()?;
            let csv_content = std::fs::read_to_string(&input)?;
            let result = Converter::new(config).convert(&csv_content);

            if options.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.success {
                if !cli.quiet {
                    println!(
                        "{} is valid ({} tracks, {} events)",
                        input.display(),
                        result.track_count,
                        result.event_count
                    );
                    for warning in &result.warnings {
                        println!("  ⚠ {}", warning);
                    }
                }
            } else {
                print_result(&result, None, cli.quiet);
            }
            Ok(exit_code(&result))
        }
        Commands::ValidateConfig { config } => {
            let config = csv2midi::config::load_config(config)?;
            println!("Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::ShowConfig { output } => {
            let config = Config::default();
            match output {
                Some(path) => {
                    csv2midi::config::save_config(&config, &path)?;
                    if !cli.quiet {
                        println!("Default configuration written to {}", path.display());
                    }
                }
                None => println!("{}", serde_json::to_string_pretty(&config)?),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
