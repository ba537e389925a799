use crate::output::print_json;
use anyhow::Context;
use flowm_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let dirs = [paths::FLOW_DIR, paths::STATE_DIR, paths::PROJECTS_DIR];
    for dir in dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_created = !paths::config_path(root).exists();
    if config_created {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
    }

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "config_created": config_created,
        }))?;
    } else {
        println!("Initialized Flow Maestro in: {}", root.display());
        let status = if config_created { "created" } else { "exists: " };
        println!("  {status} {}", paths::CONFIG_FILE);
        println!("\nNext: flowm projects add <slug>");
    }
    Ok(())
}
