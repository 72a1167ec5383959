use crate::output::{print_json, print_table};
use actions_core::resolver::{self, UsageRanking, YamlRanking};
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path, resources: &[String], workspace: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let targets = super::targets(root, resources, workspace)?;
    let ranking = YamlRanking::open(root).context("failed to read action usage")?;
    let actions = resolver::candidates(&targets, &config, &ranking)?;

    if json {
        return print_json(&actions);
    }

    let rows = actions
        .iter()
        .map(|action| {
            vec![
                action.name.clone(),
                action.environment.to_string(),
                action
                    .extensions
                    .as_deref()
                    .map(|e| e.join(","))
                    .unwrap_or_else(|| "*".to_string()),
                ranking
                    .last_used(&action.name)
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["NAME", "ENVIRONMENT", "EXTENSIONS", "LAST USED"], rows);
    Ok(())
}
