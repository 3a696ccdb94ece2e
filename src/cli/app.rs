// ABOUTME: Main application orchestration for the labforge CLI
// ABOUTME: Coordinates between CLI arguments, configuration, and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        match self.config.logging.format.as_str() {
            "compact" => {
                tracing_subscriber::fmt()
                    .compact()
                    .with_env_filter(env_filter)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .init();
            }
            _ => {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .init();
            }
        }

        debug!("logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments.
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("starting labforge v{}", env!("CARGO_PKG_VERSION"));

        match args.command {
            Commands::Run {
                plan,
                max_concurrent,
                output,
                rollback,
            } => commands::run_plan(plan, max_concurrent, output, rollback, &self.config).await,

            Commands::Validate { plan } => commands::validate_plan(plan).await,

            Commands::Report { report } => commands::show_report(report).await,
        }
    }

    /// Create application from command line arguments.
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = Config::load(args.config.clone())?;
        Ok(Self::new(config))
    }
}
