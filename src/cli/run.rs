use std::path::{Path, PathBuf};
use crate::cli::commands::RunArgs;
use crate::config::{validate_config, AutopatchConfig, RemediationMode};
use crate::errors::AutopatchError;
use crate::pipeline::Orchestrator;
use tracing::info;

pub async fn handle_run(args: RunArgs) -> Result<(), AutopatchError> {
    let config = build_config(&args).await?;
    info!(
        report = %args.report,
        project = %config.project_dir.display(),
        trust_root = %config.trust_root.display(),
        "Starting remediation"
    );

    let orchestrator = Orchestrator::new(config);
    let result = orchestrator.run_report(Path::new(&args.report)).await;

    if let Ok(outcomes) = &result {
        for outcome in outcomes {
            println!("{}", serde_json::to_string(outcome)?);
        }
    }

    orchestrator.shutdown().await;
    result.map(|_| ())
}

async fn build_config(args: &RunArgs) -> Result<AutopatchConfig, AutopatchError> {
    let mut config = super::load_base_config(args.config.as_deref()).await?;
    super::override_trust_root(&mut config, args.trust_root.as_deref());
    apply_run_args(&mut config, args)?;
    validate_config(&config)?;
    Ok(config)
}

fn apply_run_args(config: &mut AutopatchConfig, args: &RunArgs) -> Result<(), AutopatchError> {
    if let Some(project) = &args.project {
        config.project_dir = PathBuf::from(project);
    }
    if let Some(lib_dir) = &args.lib_dir {
        config.lib_dir = PathBuf::from(lib_dir);
    }
    if let Some(mode) = &args.mode {
        config.mode = mode.parse::<RemediationMode>().map_err(AutopatchError::Config)?;
    }
    if args.skip_usage_check {
        config.detect_usage = false;
    }
    if args.critical_only {
        config.critical_only = true;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(timeout) = args.step_timeout {
        config.step_timeout_secs = timeout;
    }
    if args.window.trim().is_empty() {
        return Err(AutopatchError::Config("maintenance window must not be empty".into()));
    }
    config.window = Some(args.window.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            report: "report.json".into(),
            window: "mw-1".into(),
            config: None,
            project: Some("/srv/app".into()),
            trust_root: None,
            lib_dir: None,
            mode: Some("execute".into()),
            skip_usage_check: true,
            critical_only: true,
            workers: Some(2),
            step_timeout: Some(30),
        }
    }

    #[test]
    fn test_cli_flags_override_config() {
        let mut config = AutopatchConfig::default();
        apply_run_args(&mut config, &args()).unwrap();
        assert_eq!(config.project_dir, PathBuf::from("/srv/app"));
        assert_eq!(config.mode, RemediationMode::Execute);
        assert!(!config.detect_usage);
        assert!(config.critical_only);
        assert_eq!(config.workers, 2);
        assert_eq!(config.step_timeout_secs, 30);
        assert_eq!(config.window.as_deref(), Some("mw-1"));
    }

    #[test]
    fn test_unknown_mode_is_config_error() {
        let mut config = AutopatchConfig::default();
        let bad = RunArgs { mode: Some("deploy".into()), ..args() };
        let err = apply_run_args(&mut config, &bad).unwrap_err();
        assert!(matches!(err, AutopatchError::Config(_)));
    }

    #[test]
    fn test_blank_window_rejected() {
        let mut config = AutopatchConfig::default();
        let bad = RunArgs { window: " ".into(), ..args() };
        assert!(apply_run_args(&mut config, &bad).is_err());
    }
}
