use converge_core::reconcile;
use std::path::Path;

pub fn handle(desired: &Path, observed: &Path) -> anyhow::Result<()> {
    let desired = super::load_labels(desired, "desired")?;
    let observed = super::load_labels(observed, "observed")?;

    let delta = reconcile(&desired, &observed);
    super::print_delta(&delta);
    Ok(())
}
