use crate::cli::commands::PlanArgs;
use crate::errors::AutopatchError;
use crate::rollout::build_plan;
use crate::trust::TrustStore;
use tracing::info;

pub async fn handle_plan(args: PlanArgs) -> Result<(), AutopatchError> {
    let mut config = super::load_base_config(args.package.config.as_deref()).await?;
    super::override_trust_root(&mut config, args.package.trust_root.as_deref());

    let store = TrustStore::new(&config.trust_root);
    let resolved = store.resolve(&args.package.package, &args.package.version)?;
    info!(dir = %resolved.dir.display(), "Resolved approved package");

    let plan = build_plan(&resolved.spec);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan.playbook())?);
    } else {
        print!("{}", plan.to_playbook_yaml()?);
    }
    Ok(())
}
