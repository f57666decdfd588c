//! Tracked state (`converge.state.toml`)
//!
//! Records, per address, the server object a manifest entry was last
//! converged onto and the attributes observed at that time.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reconciler::{Address, AttributeBag, Outcome, ResourceKind, StateChange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// State Structures
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConvergeState {
    /// Incremented on every save
    #[serde(default)]
    pub serial: u64,

    /// Last time the state was saved
    pub last_updated: DateTime<Utc>,

    /// Tracked resources keyed by address (`kind.label`)
    #[serde(default)]
    pub resources: BTreeMap<String, TrackedResource>,
}

/// One tracked server object
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TrackedResource {
    pub kind: ResourceKind,
    pub id: String,
    #[serde(default)]
    pub attributes: AttributeBag,
}

impl Default for ConvergeState {
    fn default() -> Self {
        Self {
            serial: 0,
            last_updated: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl ConvergeState {
    /// Load state from disk, or return default if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!(
            "Loaded state serial {} from {} ({} resources)",
            state.serial,
            path.display(),
            state.resources.len()
        );
        Ok(state)
    }

    /// Bump the serial and write the state
    ///
    /// The file is written next to its destination and renamed into place.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.serial += 1;
        self.last_updated = Utc::now();
        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, &content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

        log::debug!("Saved state serial {} to {}", self.serial, path.display());
        Ok(())
    }

    // ========================================================================
    // Resource Helpers
    // ========================================================================

    /// Tracked attributes keyed by address
    ///
    /// Entries whose key is not a valid address are skipped with a warning.
    pub fn tracked(&self) -> BTreeMap<Address, AttributeBag> {
        self.resources
            .iter()
            .filter_map(|(key, tracked)| match Address::parse(key) {
                Some(address) if address.kind == tracked.kind => {
                    Some((address, tracked.attributes.clone()))
                }
                _ => {
                    log::warn!("Ignoring malformed state entry '{key}'");
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, address: &Address) -> Option<&TrackedResource> {
        self.resources.get(&address.to_string())
    }

    pub fn upsert(&mut self, address: &Address, attributes: AttributeBag) {
        let id = attributes
            .get_str(reconciler::descriptor::ID)
            .unwrap_or_default()
            .to_string();
        self.resources.insert(
            address.to_string(),
            TrackedResource {
                kind: address.kind,
                id,
                attributes,
            },
        );
    }

    pub fn remove(&mut self, address: &Address) -> Option<TrackedResource> {
        self.resources.remove(&address.to_string())
    }

    /// Record the result of applying one change
    pub fn apply_outcome(&mut self, outcome: &Outcome) {
        match &outcome.state {
            StateChange::Keep => {}
            StateChange::Upsert(attributes) => self.upsert(&outcome.address, attributes.clone()),
            StateChange::Remove => {
                self.remove(&outcome.address);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reconciler::{Action, ApplyResult, Diagnostics};
    use tempfile::TempDir;

    fn role_bag(name: &str) -> AttributeBag {
        AttributeBag::new()
            .with("database", "app")
            .with("name", name)
            .with("id", format!("app.{name}"))
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let state = ConvergeState::load(&dir.path().join("none.toml")).unwrap();
        assert_eq!(state.serial, 0);
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("converge.state.toml");
        let address = Address::new(ResourceKind::Role, "readers");

        let mut state = ConvergeState::default();
        state.upsert(&address, role_bag("readers"));
        state.save(&path).unwrap();
        state.save(&path).unwrap();

        let loaded = ConvergeState::load(&path).unwrap();
        assert_eq!(loaded.serial, 2);
        assert_eq!(loaded.get(&address).unwrap().id, "app.readers");
        assert_eq!(loaded.tracked()[&address], role_bag("readers"));
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_apply_outcome() {
        let address = Address::new(ResourceKind::Role, "readers");
        let mut state = ConvergeState::default();

        let outcome = |change| Outcome {
            address: address.clone(),
            action: Action::Create,
            result: ApplyResult::Created,
            state: change,
            diagnostics: Diagnostics::new(),
        };

        state.apply_outcome(&outcome(StateChange::Upsert(role_bag("readers"))));
        assert!(state.get(&address).is_some());

        state.apply_outcome(&outcome(StateChange::Keep));
        assert!(state.get(&address).is_some());

        state.apply_outcome(&outcome(StateChange::Remove));
        assert!(state.get(&address).is_none());
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let mut state = ConvergeState::default();
        state.resources.insert(
            "nonsense".to_string(),
            TrackedResource {
                kind: ResourceKind::Role,
                id: "x".to_string(),
                attributes: AttributeBag::new(),
            },
        );
        state.resources.insert(
            "login.app".to_string(),
            TrackedResource {
                kind: ResourceKind::Role,
                id: "x".to_string(),
                attributes: AttributeBag::new(),
            },
        );
        assert!(state.tracked().is_empty());
    }
}
