use std::{collections::HashSet, fs, path::Path};

use anyhow::{bail, Context, Result};
use stowage_core::{ContainerId, ItemTemplate};
use stowage_system_spawning::RespawnPolicy;

const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// Spawn configuration for one container, read from TOML.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub(crate) struct SpawnConfig {
    version: u32,
    /// What happens when a spawned item has been taken.
    #[serde(default)]
    pub(crate) respawn: RespawnPolicy,
    /// Container the templates spawn into.
    pub(crate) container: ContainerSection,
    /// Templates evaluated on every spawn pass, in order.
    #[serde(default)]
    pub(crate) templates: Vec<ItemTemplate>,
}

/// Identity and dimensions of the configured container.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub(crate) struct ContainerSection {
    /// Identity used for spawn-state records.
    pub(crate) id: ContainerId,
    /// Host-defined container kind.
    #[serde(default)]
    pub(crate) kind: String,
    /// Number of columns.
    pub(crate) columns: u32,
    /// Number of rows.
    pub(crate) rows: u32,
}

impl SpawnConfig {
    /// Reads and validates the configuration stored at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read spawn config at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid spawn config at {}", path.display()))
    }

    /// Parses and validates configuration text.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).context("failed to parse spawn config toml contents")?;
        if config.version != SUPPORTED_CONFIG_VERSION {
            bail!(
                "unsupported spawn config version {}; expected {}",
                config.version,
                SUPPORTED_CONFIG_VERSION
            );
        }
        if config.container.columns == 0 || config.container.rows == 0 {
            bail!(
                "container `{}` must have at least one column and one row",
                config.container.id
            );
        }

        let mut seen = HashSet::new();
        for template in &config.templates {
            if template.size.is_empty() {
                bail!("template `{}` has an empty footprint", template.id);
            }
            if !seen.insert(template.id.clone()) {
                bail!("spawn config contains duplicate template `{}`", template.id);
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::{CellCoord, CellRectSize, PlacementKind, ScanPattern};

    const SAMPLE: &str = r#"
version = 1
respawn = "after-consumption"

[container]
id = "locker-1"
kind = "locker"
columns = 8
rows = 6

[[templates]]
id = "rifle"
size = { width = 4, height = 1 }
allow_rotation = true

[[templates]]
id = "ammo"
size = { width = 1, height = 1 }
quantity = 30
scan_pattern = "spiral-out"
placement = { kind = "exact", position = { column = 7, row = 5 } }
"#;

    #[test]
    fn parses_sample_config() {
        let config = SpawnConfig::parse(SAMPLE).expect("config parses");
        assert_eq!(config.respawn, RespawnPolicy::AfterConsumption);
        assert_eq!(config.container.id, ContainerId::new("locker-1"));
        assert_eq!(config.container.kind, "locker");
        assert_eq!(config.templates.len(), 2);

        let rifle = &config.templates[0];
        assert_eq!(rifle.size, CellRectSize::new(4, 1));
        assert!(rifle.allow_rotation);
        assert_eq!(rifle.placement, PlacementKind::Smart);
        assert_eq!(rifle.quantity, 1);

        let ammo = &config.templates[1];
        assert_eq!(ammo.quantity, 30);
        assert_eq!(ammo.scan_pattern, ScanPattern::SpiralOut);
        assert_eq!(
            ammo.placement,
            PlacementKind::Exact {
                position: CellCoord::new(7, 5)
            }
        );
    }

    #[test]
    fn rejects_unknown_version() {
        let contents = SAMPLE.replace("version = 1", "version = 2");
        let error = SpawnConfig::parse(&contents).expect_err("version 2 is rejected");
        assert!(error.to_string().contains("unsupported spawn config version 2"));
    }

    #[test]
    fn rejects_duplicate_templates() {
        let contents = SAMPLE.replace("id = \"ammo\"", "id = \"rifle\"");
        let error = SpawnConfig::parse(&contents).expect_err("duplicates are rejected");
        assert!(error.to_string().contains("duplicate template `rifle`"));
    }
}
