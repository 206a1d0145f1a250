//! Key-level comparison of rendered files against what is on disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::parse::IfcfgFile;
use super::render::RenderedConfig;

/// Difference between one rendered file and the file on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiff {
    /// Interface name.
    pub name: String,
    /// Path of the managed file.
    pub path: PathBuf,
    /// The file does not exist yet.
    pub created: bool,
    /// Keys only in the rendered file.
    pub added: Vec<(String, String)>,
    /// Keys only in the existing file.
    pub removed: Vec<(String, String)>,
    /// Keys in both with different values (key, old, new).
    pub changed: Vec<(String, String, String)>,
    /// Bytes differ although every key matches (order, quoting, header).
    pub rewrite: bool,
    /// A previous apply wrote the file but did not finish activating it.
    pub pending: bool,
}

impl FileDiff {
    /// Compare rendered content with the existing file content.
    ///
    /// An unparseable existing file counts as empty and is rewritten.
    pub fn compute(path: PathBuf, existing: Option<&str>, rendered: &RenderedConfig) -> Self {
        let mut diff = Self {
            name: rendered.name().to_string(),
            path,
            created: existing.is_none(),
            ..Default::default()
        };

        let content = rendered.content();
        let Some(existing) = existing else {
            diff.added = rendered.lines().to_vec();
            return diff;
        };
        if existing == content {
            return diff;
        }

        let old: BTreeMap<String, String> = IfcfgFile::parse(existing)
            .map(|f| f.to_map())
            .unwrap_or_default();
        let new: BTreeMap<&str, &str> = rendered
            .lines()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        for (key, value) in rendered.lines() {
            match old.get(key) {
                None => diff.added.push((key.clone(), value.clone())),
                Some(old_value) if old_value != value => {
                    diff.changed
                        .push((key.clone(), old_value.clone(), value.clone()))
                }
                Some(_) => {}
            }
        }
        for (key, value) in &old {
            if !new.contains_key(key.as_str()) {
                diff.removed.push((key.clone(), value.clone()));
            }
        }

        diff.rewrite = diff.added.is_empty() && diff.removed.is_empty() && diff.changed.is_empty();
        diff
    }

    /// Check if the file is already in its desired state.
    pub fn is_empty(&self) -> bool {
        !self.created
            && self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && !self.rewrite
            && !self.pending
    }

    /// Check if the file content will change.
    pub fn content_changes(&self) -> bool {
        self.created
            || !self.added.is_empty()
            || !self.removed.is_empty()
            || !self.changed.is_empty()
            || self.rewrite
    }

    /// Get the number of key-level changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        let header = if self.created {
            format!("+ file {}", self.path.display())
        } else {
            format!("~ file {}", self.path.display())
        };
        lines.push(header);

        for (key, value) in &self.added {
            lines.push(format!("  + {}={}", key, value));
        }
        for (key, value) in &self.removed {
            lines.push(format!("  - {}={}", key, value));
        }
        for (key, old, new) in &self.changed {
            lines.push(format!("  ~ {}: {} -> {}", key, old, new));
        }
        if self.rewrite {
            lines.push("  ~ formatting only".to_string());
        }
        if self.pending {
            lines.push("  ! activation pending from a previous run".to_string());
        }

        lines.join("\n")
    }
}

/// Difference between the desired configuration and the files on disk.
#[derive(Debug, Clone, Default)]
pub struct ConfigDiff {
    /// Files that need work, in apply order.
    pub files: Vec<FileDiff>,
    /// Interfaces already in their desired state.
    pub unchanged: Vec<String>,
}

impl ConfigDiff {
    /// Check if no changes are needed.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Get the total number of key-level changes.
    pub fn change_count(&self) -> usize {
        self.files.iter().map(FileDiff::change_count).sum()
    }

    /// Get a human-readable summary of the changes.
    pub fn summary(&self) -> String {
        if self.files.is_empty() {
            return "No changes needed".to_string();
        }
        self.files
            .iter()
            .map(FileDiff::summary)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for ConfigDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InterfaceKind, InterfaceParams, InterfaceSpec, OneOrMany};
    use crate::facts::StaticFacts;

    fn rendered(mask: &str) -> RenderedConfig {
        let params = InterfaceParams {
            ipaddress: Some(OneOrMany::from("10.0.0.5")),
            netmask: Some(OneOrMany::from(mask)),
            ..Default::default()
        };
        InterfaceSpec::from_params("eth0", InterfaceKind::Static, &params, &StaticFacts::new())
            .unwrap()
            .render()
    }

    fn path() -> PathBuf {
        PathBuf::from("/etc/sysconfig/network-scripts/ifcfg-eth0")
    }

    #[test]
    fn test_new_file() {
        let r = rendered("255.255.255.0");
        let diff = FileDiff::compute(path(), None, &r);
        assert!(diff.created);
        assert_eq!(diff.added.len(), r.lines().len());
        assert!(diff.content_changes());
        assert!(diff.summary().starts_with("+ file "));
    }

    #[test]
    fn test_identical_file() {
        let r = rendered("255.255.255.0");
        let diff = FileDiff::compute(path(), Some(&r.content()), &r);
        assert!(diff.is_empty());
        assert_eq!(diff.change_count(), 0);
    }

    #[test]
    fn test_changed_netmask() {
        let old = rendered("255.255.255.0").content();
        let r = rendered("255.255.255.128");
        let diff = FileDiff::compute(path(), Some(&old), &r);
        assert_eq!(
            diff.changed,
            vec![(
                "NETMASK".to_string(),
                "255.255.255.0".to_string(),
                "255.255.255.128".to_string()
            )]
        );
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert!(diff.summary().contains("~ NETMASK: 255.255.255.0 -> 255.255.255.128"));
    }

    #[test]
    fn test_removed_and_formatting() {
        let r = rendered("255.255.255.0");
        let with_extra = format!("{}NM_CONTROLLED=no\n", r.content());
        let diff = FileDiff::compute(path(), Some(&with_extra), &r);
        assert_eq!(diff.removed, vec![("NM_CONTROLLED".into(), "no".into())]);
        assert!(!diff.rewrite);

        let reordered: String = r
            .content()
            .lines()
            .skip(1)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|l| format!("{}\n", l))
            .collect();
        let diff = FileDiff::compute(path(), Some(&reordered), &r);
        assert!(diff.rewrite);
        assert_eq!(diff.change_count(), 0);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_config_diff_summary() {
        let diff = ConfigDiff::default();
        assert!(diff.is_empty());
        assert_eq!(diff.summary(), "No changes needed");
    }
}
