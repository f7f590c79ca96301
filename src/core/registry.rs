//! Profile registry - Durable, ordered set of profiles backed by a JSON file

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::profile::{validate_name, Profile, ProfileColor, ProfileError, ProfileId};

/// Errors reported by registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a profile with id '{0}' already exists")]
    DuplicateProfileId(ProfileId),
    #[error("profile '{0}' not found")]
    ProfileNotFound(ProfileId),
    #[error(transparent)]
    Invalid(#[from] ProfileError),
    #[error("failed to create storage directory {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The in-memory change was kept; calling `save` again retries the write.
    #[error("failed to persist registry to {path:?}: {source}")]
    PersistenceWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub color: Option<ProfileColor>,
    pub enabled: Option<bool>,
}

impl ProfileUpdate {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn color(mut self, color: ProfileColor) -> Self {
        self.color = Some(color);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }
}

#[derive(Serialize)]
struct RegistryFileRef<'a> {
    profiles: &'a [Profile],
}

/// Both the current object layout and the bare-array layout are readable.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRegistry {
    Object { profiles: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

/// Ordered profile collection with persistence-on-mutation
#[derive(Debug)]
pub struct ProfileRegistry {
    config_path: PathBuf,
    profiles_root: PathBuf,
    profiles: Vec<Profile>,
}

impl ProfileRegistry {
    /// Open the registry stored at `config_path`.
    ///
    /// A missing, unreadable or corrupt file yields an empty registry. Single
    /// malformed entries are skipped. Duplicate ids already present in the
    /// file are kept as-is; uniqueness is enforced by `add`.
    pub fn open(config_path: impl Into<PathBuf>, profiles_root: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let profiles = load_profiles(&config_path);
        info!(
            "Loaded {} profiles from {:?}",
            profiles.len(),
            config_path
        );

        Self {
            config_path,
            profiles_root: profiles_root.into(),
            profiles,
        }
    }

    /// Create the profiles root directory if needed
    pub fn ensure_profiles_root(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.profiles_root)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn profiles_root(&self) -> &Path {
        &self.profiles_root
    }

    /// Storage directory of a profile; never deleted by the registry
    pub fn storage_path(&self, profile_id: &ProfileId) -> PathBuf {
        self.profiles_root.join(profile_id.as_str())
    }

    /// Add a new, enabled profile
    pub fn add(
        &mut self,
        name: impl Into<String>,
        profile_id: ProfileId,
        color: ProfileColor,
    ) -> Result<(), RegistryError> {
        if self.get(&profile_id).is_some() {
            debug!("Rejected duplicate profile id '{}'", profile_id);
            return Err(RegistryError::DuplicateProfileId(profile_id));
        }

        let profile = Profile::new(profile_id, name, color)?;

        let storage = self.storage_path(&profile.profile_id);
        std::fs::create_dir_all(&storage).map_err(|source| RegistryError::Storage {
            path: storage.clone(),
            source,
        })?;

        info!("Added profile '{}' ({})", profile.name, profile.profile_id);
        self.profiles.push(profile);
        self.save()
    }

    /// Apply the provided fields to an existing profile
    pub fn update(
        &mut self,
        profile_id: &ProfileId,
        update: ProfileUpdate,
    ) -> Result<(), RegistryError> {
        let name = update.name.map(validate_name).transpose()?;

        let profile = self
            .profiles
            .iter_mut()
            .find(|p| &p.profile_id == profile_id)
            .ok_or_else(|| RegistryError::ProfileNotFound(profile_id.clone()))?;

        if let Some(name) = name {
            profile.name = name;
        }
        if let Some(color) = update.color {
            profile.color = color;
        }
        if let Some(enabled) = update.enabled {
            profile.enabled = enabled;
        }

        debug!("Updated profile {}", profile_id);
        self.save()
    }

    /// Remove a profile from the list; its storage directory stays on disk
    pub fn remove(&mut self, profile_id: &ProfileId) -> Result<(), RegistryError> {
        let before = self.profiles.len();
        self.profiles.retain(|p| &p.profile_id != profile_id);

        if self.profiles.len() == before {
            return Ok(());
        }

        info!(
            "Removed profile {} (data kept at {:?})",
            profile_id,
            self.storage_path(profile_id)
        );
        self.save()
    }

    pub fn get(&self, profile_id: &ProfileId) -> Option<&Profile> {
        self.profiles.iter().find(|p| &p.profile_id == profile_id)
    }

    /// All profiles in insertion order
    pub fn get_all(&self) -> &[Profile] {
        &self.profiles
    }

    /// Enabled profiles in insertion order
    pub fn get_enabled(&self) -> Vec<Profile> {
        self.profiles.iter().filter(|p| p.enabled).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Serialize the full registry to disk
    pub fn save(&self) -> Result<(), RegistryError> {
        write_profiles(&self.config_path, &self.profiles).map_err(|source| {
            error!("Failed to save profiles to {:?}: {}", self.config_path, source);
            RegistryError::PersistenceWrite {
                path: self.config_path.clone(),
                source,
            }
        })?;
        debug!("Saved {} profiles", self.profiles.len());
        Ok(())
    }
}

fn load_profiles(path: &Path) -> Vec<Profile> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Failed to read profiles from {:?}: {}", path, e);
            return Vec::new();
        }
    };

    let entries = match serde_json::from_str::<StoredRegistry>(&content) {
        Ok(StoredRegistry::Object { profiles }) | Ok(StoredRegistry::Bare(profiles)) => profiles,
        Err(e) => {
            warn!("Profiles file {:?} is corrupt, starting empty: {}", path, e);
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Profile>(entry) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Skipping malformed profile entry: {}", e);
                None
            }
        })
        .collect()
}

fn write_profiles(path: &Path, profiles: &[Profile]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(&RegistryFileRef { profiles })
        .map_err(io::Error::other)?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn id(raw: &str) -> ProfileId {
        ProfileId::parse(raw).unwrap()
    }

    fn color(raw: &str) -> ProfileColor {
        ProfileColor::parse(raw).unwrap()
    }

    fn open_in(dir: &Path) -> ProfileRegistry {
        ProfileRegistry::open(dir.join("profiles_config.json"), dir.join("profiles"))
    }

    #[test]
    fn test_add_creates_enabled_profile_and_storage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = open_in(temp_dir.path());

        registry
            .add("Suporte", id("zap_suporte"), color("#b71c1c"))
            .unwrap();

        let all = registry.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Suporte");
        assert!(all[0].enabled);
        assert!(temp_dir.path().join("profiles/zap_suporte").is_dir());
    }

    #[test]
    fn test_duplicate_add_leaves_state_unchanged() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = open_in(temp_dir.path());
        registry.add("Vendas", id("vendas"), color("#0d7377")).unwrap();

        let before = registry.get_all().to_vec();
        let file_before = std::fs::read(registry.config_path()).unwrap();

        let result = registry.add("Other", id("vendas"), color("#ffffff"));
        assert!(matches!(result, Err(RegistryError::DuplicateProfileId(_))));
        assert_eq!(registry.get_all(), before.as_slice());
        assert_eq!(std::fs::read(registry.config_path()).unwrap(), file_before);
    }

    #[test]
    fn test_remove_keeps_storage_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = open_in(temp_dir.path());
        registry.add("Financeiro", id("fin"), color("#333333")).unwrap();

        let storage = registry.storage_path(&id("fin"));
        std::fs::write(storage.join("Cookies"), b"session").unwrap();

        registry.remove(&id("fin")).unwrap();
        assert!(registry.is_empty());
        assert!(storage.join("Cookies").exists());

        // Removing again is a no-op
        registry.remove(&id("fin")).unwrap();
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = open_in(temp_dir.path());
        registry.add("A", id("a"), color("#111111")).unwrap();

        registry
            .update(&id("a"), ProfileUpdate::default().enabled(false))
            .unwrap();
        let profile = registry.get(&id("a")).unwrap();
        assert_eq!(profile.name, "A");
        assert_eq!(profile.color, color("#111111"));
        assert!(!profile.enabled);

        registry
            .update(&id("a"), ProfileUpdate::default().name("Alpha").color(color("#222222")))
            .unwrap();
        let profile = registry.get(&id("a")).unwrap();
        assert_eq!(profile.name, "Alpha");
        assert_eq!(profile.color, color("#222222"));
        assert!(!profile.enabled);
    }

    #[test]
    fn test_update_missing_profile_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = open_in(temp_dir.path());
        let result = registry.update(&id("ghost"), ProfileUpdate::default().enabled(true));
        assert!(matches!(result, Err(RegistryError::ProfileNotFound(_))));
    }

    #[test]
    fn test_mutations_are_persisted() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let mut registry = open_in(temp_dir.path());
            registry.add("One", id("one"), color("#010101")).unwrap();
            registry.add("Two", id("two"), color("#020202")).unwrap();
            registry
                .update(&id("one"), ProfileUpdate::default().enabled(false))
                .unwrap();
        }

        let reopened = open_in(temp_dir.path());
        let ids: Vec<_> = reopened
            .get_all()
            .iter()
            .map(|p| p.profile_id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["one", "two"]);
        assert!(!reopened.get(&id("one")).unwrap().enabled);
    }

    #[test]
    fn test_get_enabled_preserves_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = open_in(temp_dir.path());
        for raw in ["a", "b", "c", "d"] {
            registry.add(raw.to_uppercase(), id(raw), color("#000000")).unwrap();
        }
        registry
            .update(&id("b"), ProfileUpdate::default().enabled(false))
            .unwrap();

        let enabled: Vec<_> = registry
            .get_enabled()
            .into_iter()
            .map(|p| p.profile_id)
            .collect();
        assert_eq!(enabled, vec![id("a"), id("c"), id("d")]);
    }

    #[test]
    fn test_corrupt_file_yields_empty_registry() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("profiles_config.json"), "{ not json").unwrap();

        let registry = open_in(temp_dir.path());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reads_bare_array_and_skips_bad_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let json = r##"[
            {"name": "Suporte", "profile_id": "zap_suporte", "color": "#b71c1c", "enabled": false},
            {"name": "Broken", "profile_id": "../etc", "color": "#b71c1c"},
            {"name": "Vendas", "profile_id": "zap_vendas", "color": "#0D7377"}
        ]"##;
        std::fs::write(temp_dir.path().join("profiles_config.json"), json).unwrap();

        let registry = open_in(temp_dir.path());
        assert_eq!(registry.len(), 2);
        assert!(!registry.get(&id("zap_suporte")).unwrap().enabled);
        assert!(registry.get(&id("zap_vendas")).unwrap().enabled);
    }

    #[test]
    fn test_write_failure_keeps_in_memory_change() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut registry = ProfileRegistry::open(
            blocker.join("profiles_config.json"),
            temp_dir.path().join("profiles"),
        );
        let result = registry.add("Kept", id("kept"), color("#abcdef"));

        assert!(matches!(result, Err(RegistryError::PersistenceWrite { .. })));
        assert!(registry.get(&id("kept")).is_some());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        Update(u8, bool),
        Remove(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6).prop_map(Op::Add),
            (0u8..6, any::<bool>()).prop_map(|(i, e)| Op::Update(i, e)),
            (0u8..6).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_ids_stay_unique(ops in proptest::collection::vec(op_strategy(), 1..40)) {
            let temp_dir = tempfile::tempdir().unwrap();
            let mut registry = open_in(temp_dir.path());

            for op in ops {
                match op {
                    Op::Add(i) => {
                        let _ = registry.add(format!("P{}", i), id(&format!("p{}", i)), color("#123456"));
                    }
                    Op::Update(i, enabled) => {
                        let _ = registry.update(
                            &id(&format!("p{}", i)),
                            ProfileUpdate::default().enabled(enabled),
                        );
                    }
                    Op::Remove(i) => {
                        let _ = registry.remove(&id(&format!("p{}", i)));
                    }
                }

                let mut seen = HashSet::new();
                for profile in registry.get_all() {
                    prop_assert!(seen.insert(profile.profile_id.clone()));
                }

                let filtered: Vec<_> = registry
                    .get_all()
                    .iter()
                    .filter(|p| p.enabled)
                    .cloned()
                    .collect();
                prop_assert_eq!(registry.get_enabled(), filtered);
            }
        }
    }
}
