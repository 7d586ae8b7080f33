use std::path::PathBuf;
use crate::cli::commands::{ValidateArgs, VerifyArgs};
use crate::config::parse_config;
use crate::errors::AutopatchError;
use crate::trust::{verify_specification, TrustStore};

pub async fn handle_verify(args: VerifyArgs) -> Result<(), AutopatchError> {
    let mut config = super::load_base_config(args.package.config.as_deref()).await?;
    super::override_trust_root(&mut config, args.package.trust_root.as_deref());

    let store = TrustStore::new(&config.trust_root);
    let resolved = store.resolve(&args.package.package, &args.package.version)?;
    verify_specification(&resolved.spec)?;

    println!(
        "Verified {}-{}: {} matches {}",
        resolved.spec.package,
        resolved.spec.version,
        resolved.spec.artifact_path.display(),
        resolved.spec.expected_digest
    );
    Ok(())
}

pub async fn handle_validate(args: ValidateArgs) -> Result<(), AutopatchError> {
    let path = PathBuf::from(&args.config);
    let _config = parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    Ok(())
}
