use colored::Colorize;
use converge_core::{Collection, RemoteCollection, converge_collection, reconcile};
use converge_remote::ControlPlaneClient;
use std::path::Path;

pub async fn handle(
    client: &ControlPlaneClient,
    resource_id: &str,
    desired: &Path,
    dry_run: bool,
) -> anyhow::Result<()> {
    let desired = super::load_labels(desired, "desired")?;
    let api = client.labels(resource_id);

    println!("{} {}", "Labels of".blue(), resource_id.cyan());

    if dry_run {
        let observed = Collection::try_from_items(api.observe().await?)
            .map_err(|e| e.in_side("observed"))?;
        let delta = reconcile(&desired, &observed);
        super::print_delta(&delta);
        if !delta.is_empty() {
            println!("{}", "Dry run, nothing was changed".yellow());
        }
        return Ok(());
    }

    let delta = converge_collection(&api, &desired).await?;
    super::print_delta(&delta);
    if !delta.is_empty() {
        println!("{}", "✓ Labels converged".green().bold());
    }
    Ok(())
}
