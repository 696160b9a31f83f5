//! groups.toml definition-file parsing.

use crate::types::GroupConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk scaling-group definitions, one `[[group]]` entry per group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupsFile {
    #[serde(default, rename = "group")]
    pub groups: Vec<GroupConfig>,
}

impl GroupsFile {
    /// Load and validate every group definition in the file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let file: GroupsFile = toml::from_str(content)?;
        for group in &file.groups {
            group
                .validate()
                .map_err(|e| anyhow::anyhow!("group {}: {e}", group.name))?;
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[group]]
name = "web"
min_size = 1
max_size = 6
desired_capacity = 2
cooldown = 60
home_subnet = "subnet-home"
overflow_subnet = "subnet-ovf"
overflow_region = "region-two"
lb_pool = "pool-web"

[group.launch_template]
image = "img-web"
flavor = "m1.small"
security_groups = ["default"]
"#;

    #[test]
    fn test_parse_sample() {
        let file = GroupsFile::from_toml(SAMPLE).unwrap();
        assert_eq!(file.groups.len(), 1);
        let group = &file.groups[0];
        assert_eq!(group.name, "web");
        assert_eq!(group.cooldown, 60);
        // Defaults kick in for fields the file leaves out.
        assert_eq!(group.member_port, 80);
        assert_eq!(group.rolling_update.max_batch_size, 1);
    }

    #[test]
    fn test_invalid_group_rejected_at_load() {
        let broken = SAMPLE.replace("min_size = 1", "min_size = 9");
        let err = GroupsFile::from_toml(&broken).unwrap_err();
        assert!(err.to_string().contains("group web"));
    }

    #[test]
    fn test_empty_file() {
        let file = GroupsFile::from_toml("").unwrap();
        assert!(file.groups.is_empty());
    }
}
