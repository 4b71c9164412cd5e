use std::path::Path;

use anyhow::bail;
use dbgrid_core::GridConfig;

pub fn init(path: &Path, name: &str, db_nodes: usize, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let config = GridConfig::scaffold(name, db_nodes);
    std::fs::write(path, config.to_toml_string()?)?;
    println!("✓ Generated {}", path.display());
    Ok(())
}
