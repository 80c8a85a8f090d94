pub mod diff;
pub mod labels;
pub mod normalize;
pub mod onboard;

use anyhow::Context;
use colored::Colorize;
use converge_core::{Collection, Delta, Label};
use std::collections::BTreeMap;
use std::path::Path;

/// Read a JSON object of `key -> value` into a label collection
pub fn load_labels(path: &Path, side: &str) -> anyhow::Result<Collection<Label>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let map: BTreeMap<String, String> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON object of string labels", path.display()))?;

    let labels = map.into_iter().map(|(k, v)| Label::new(k, v));
    Ok(Collection::try_from_items(labels).map_err(|e| e.in_side(side))?)
}

/// Print a label delta, one line per key, sorted by key
pub fn print_delta(delta: &Delta<Label>) {
    if delta.is_empty() {
        println!("{}", "✓ Already converged".green());
        return;
    }

    let mut lines: Vec<(&str, u8, String)> = Vec::new();
    for label in &delta.to_remove {
        lines.push((label.key.as_str(), 0, format!("- {}", label).red().to_string()));
    }
    for label in &delta.to_add {
        lines.push((label.key.as_str(), 1, format!("+ {}", label).green().to_string()));
    }
    lines.sort();

    for (_, _, line) in lines {
        println!("{}", line);
    }
    println!();
    println!("{} {}", "Plan:".bold(), delta.summary_by(|l| l.key.clone()));
}
