use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use spex_batch::config::Config;
use spex_batch::dispatch::{PlanRecorder, dispatch};
use spex_batch::driver::{self, SynthesisOptions};
use spex_batch::log::{load_log, write_log};
use spex_batch::record;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "spex-batch")]
#[command(about = "Plan batch reductions of SpeX/uSpeX spectra", long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML file with `[parameters]` and `[standards]` tables.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parameter override, applied after the config file. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

impl ConfigArgs {
    fn load(&self) -> Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => {
                Config::load(path).with_context(|| format!("load config {}", path.display()))?
            }
            None => Config::default(),
        };
        for assignment in &self.overrides {
            cfg.set(assignment)?;
        }
        Ok(cfg)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Read raw headers and write the observation log (.csv/.tsv/.psv/.json/.html).
    Log {
        #[arg(long)]
        data: PathBuf,

        #[arg(short = 'o', long)]
        out: PathBuf,
    },

    /// Write a driver file from raw headers or from an edited log.
    Driver {
        /// Raw data folder (DATA_FOLDER).
        #[arg(long)]
        data: PathBuf,

        /// Use this observation log instead of reading the headers.
        #[arg(long)]
        log: Option<PathBuf>,

        #[arg(short = 'o', long)]
        out: PathBuf,

        /// Create missing cals/proc/qa folders.
        #[arg(long)]
        create_folders: bool,

        /// Comment written under the banner.
        #[arg(long)]
        comment: Option<String>,

        /// Read the written file back and print it as JSON.
        #[arg(long)]
        check: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Parse a driver file and print the resulting document as JSON.
    Check {
        driver: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the reduction steps a driver file would run.
    Plan {
        driver: PathBuf,

        /// Print the steps as JSON.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_driver(path: &Path, config: &ConfigArgs) -> Result<driver::DriverDocument> {
    let base = config.load()?.parameters()?;
    let doc = driver::read_driver(path, &base)
        .with_context(|| format!("read driver {}", path.display()))?;
    Ok(doc)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Commands::Log { data, out } => {
            let records = record::ingest(&data)
                .with_context(|| format!("ingest {}", data.display()))?;
            write_log(&records, &out).with_context(|| format!("write log {}", out.display()))?;
            println!("Wrote {}", out.display());
        }
        Commands::Driver {
            data,
            log,
            out,
            create_folders,
            comment,
            check,
            config,
        } => {
            // 1) Records, from the log if one was given.
            let records = match &log {
                Some(path) => load_log(path).with_context(|| format!("load log {}", path.display()))?,
                None => record::ingest(&data).with_context(|| format!("ingest {}", data.display()))?,
            };

            // 2) Globals: defaults, config file, --set, then the data folder.
            let cfg = config.load()?;
            let mut parameters = cfg.parameters()?;
            parameters.data_folder = data;
            let options = SynthesisOptions {
                parameters,
                create_folders,
                tie_break: cfg.tie_break,
            };

            // 3) Synthesize + write.
            let doc = driver::synthesize(&records, &options)?;
            driver::write_driver(&out, &doc, comment.as_deref())
                .with_context(|| format!("write driver {}", out.display()))?;
            info!("{} observation sets", doc.sets.len());
            println!("Wrote {}", out.display());

            if check {
                let back = read_driver(&out, &config)?;
                println!("{}", serde_json::to_string_pretty(&back)?);
            }
        }
        Commands::Check { driver, config } => {
            let doc = read_driver(&driver, &config)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Commands::Plan {
            driver,
            json,
            config,
        } => {
            let doc = read_driver(&driver, &config)?;
            let mut recorder = PlanRecorder::default();
            let summary = dispatch(&doc, &mut recorder)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&recorder.steps)?);
            } else {
                for step in &recorder.steps {
                    println!("{}", step);
                }
            }
            info!(
                "{} calibration sets, {} observation sets, {} without telluric correction",
                summary.calibration_sets,
                summary.observation_sets,
                summary.skipped_telluric.len()
            );
        }
    }

    Ok(())
}
