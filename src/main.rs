use autopatch::cli::{self, Cli, Commands};
use autopatch::errors::AutopatchError;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.with_ansi(!cli.no_color).init();
    }

    let result = match cli.command {
        Commands::Run(args) => cli::run::handle_run(args).await,
        Commands::Plan(args) => cli::plan::handle_plan(args).await,
        Commands::Verify(args) => cli::verify::handle_verify(args).await,
        Commands::Validate(args) => cli::verify::handle_validate(args).await,
    };

    if let Err(e) = result {
        match &e {
            AutopatchError::NoFindings => eprintln!("{}", e),
            _ => eprintln!("Error: {}", e),
        }
        std::process::exit(e.exit_code());
    }
}
