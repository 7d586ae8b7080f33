use clap::{Args, Parser, Subcommand};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "autopatch",
    version,
    long_version = LONG_VERSION,
    about = "Usage-aware vulnerability remediation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remediate every finding in a scan report
    Run(RunArgs),
    /// Print the staged rollout playbook for an approved package
    Plan(PlanArgs),
    /// Check an approved package's artifact against its checksum
    Verify(VerifyArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Scan report (JSON, or YAML by extension)
    #[arg(short, long, alias = "tenable-file")]
    pub report: String,

    /// Maintenance window identifier
    #[arg(short, long)]
    pub window: String,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Project checkout to remediate
    #[arg(short, long)]
    pub project: Option<String>,

    /// Approved-packages directory
    #[arg(long)]
    pub trust_root: Option<String>,

    /// Library directory inside the project
    #[arg(long)]
    pub lib_dir: Option<String>,

    /// Remediation mode: commit, execute
    #[arg(long)]
    pub mode: Option<String>,

    /// Patch without checking the project for the vulnerable artifact
    #[arg(long)]
    pub skip_usage_check: bool,

    /// Only remediate critical findings
    #[arg(long)]
    pub critical_only: bool,

    /// Findings processed concurrently
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-command timeout in seconds
    #[arg(long)]
    pub step_timeout: Option<u64>,
}

#[derive(Args, Clone)]
pub struct PackageArgs {
    /// Package name
    #[arg(long)]
    pub package: String,

    /// Approved version
    #[arg(long)]
    pub version: String,

    /// Approved-packages directory
    #[arg(long)]
    pub trust_root: Option<String>,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Args, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub package: PackageArgs,

    /// Print JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub package: PackageArgs,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_accepts_tenable_alias() {
        let cli = Cli::try_parse_from([
            "autopatch", "run", "--tenable-file", "r.json", "--window", "mw-42",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.report, "r.json");
                assert_eq!(args.window, "mw-42");
                assert!(!args.skip_usage_check);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_window() {
        assert!(Cli::try_parse_from(["autopatch", "run", "--report", "r.json"]).is_err());
    }

    #[test]
    fn test_plan_args() {
        let cli = Cli::try_parse_from([
            "autopatch", "-vv", "plan", "--package", "log4j", "--version", "2.17.0", "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Plan(args) => {
                assert_eq!(args.package.package, "log4j");
                assert!(args.json);
            }
            _ => panic!("expected plan"),
        }
    }
}
