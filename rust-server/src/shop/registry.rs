//! Vendor Registry
//!
//! Loads vendor definitions from TOML files, falling back to the built-in stalls.

use super::definition::{builtin_vendors, VendorDefinition};
use crate::dice::DiceExpr;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum VendorLoadError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Registry for all vendor definitions, keyed by display name
pub struct VendorRegistry {
    vendors: BTreeMap<String, VendorDefinition>,
}

impl VendorRegistry {
    /// Create a new empty vendor registry
    pub fn new() -> Self {
        Self {
            vendors: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for vendor in builtin_vendors() {
            registry.insert(vendor);
        }
        registry
    }

    /// Load `<data_dir>/vendors/*.toml`, or the built-in stalls if none are found
    pub fn load_or_builtin(data_dir: &Path) -> Self {
        let mut registry = Self::new();
        if let Err(e) = registry.load_from_directory(&data_dir.join("vendors")) {
            error!("Failed to load vendor definitions: {}", e);
            return Self::builtin();
        }

        if registry.is_empty() {
            info!("No vendor files found, using built-in vendors");
            return Self::builtin();
        }
        registry
    }

    /// Load all vendor definitions from a directory, one vendor per file
    pub fn load_from_directory(&mut self, path: &Path) -> Result<(), VendorLoadError> {
        if !path.exists() {
            warn!("Vendor directory does not exist: {:?}", path);
            return Ok(());
        }

        let read_err = |source| VendorLoadError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(path).map_err(read_err)? {
            let file_path = entry.map_err(read_err)?.path();
            if file_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                files.push(file_path);
            }
        }
        // Later files win on duplicate names, so make "later" well defined
        files.sort();

        for file_path in files {
            let contents = fs::read_to_string(&file_path).map_err(|source| VendorLoadError::Read {
                path: file_path.clone(),
                source,
            })?;

            let vendor: VendorDefinition =
                toml::from_str(&contents).map_err(|source| VendorLoadError::Parse {
                    path: file_path.clone(),
                    source,
                })?;

            if self.vendors.contains_key(&vendor.name) {
                warn!("Duplicate vendor '{}' in {:?}, overwriting", vendor.name, file_path);
            }
            self.insert(vendor);
        }

        info!("Loaded {} vendor definitions", self.vendors.len());
        Ok(())
    }

    /// Add a vendor, warning about rules that will never stock anything
    pub fn insert(&mut self, vendor: VendorDefinition) {
        for (rarity, expr) in &vendor.rules {
            match DiceExpr::parse(expr) {
                Ok(dice) if dice.max_roll() == 0 => warn!(
                    "Vendor '{}' rule for {} ({}) can never roll above zero",
                    vendor.name,
                    rarity.as_str(),
                    dice
                ),
                Ok(_) => {
                    if let Some((min, max)) = vendor.quantity_range(*rarity) {
                        debug!("Vendor '{}' stocks {}..={} {}", vendor.name, min, max, rarity.as_str());
                    }
                }
                Err(e) => warn!(
                    "Vendor '{}' rule for {} is invalid and will stock nothing: {}",
                    vendor.name,
                    rarity.as_str(),
                    e
                ),
            }
        }
        if vendor.multiplier == 0 {
            warn!("Vendor '{}' has multiplier 0 and will stock nothing", vendor.name);
        }
        if vendor.stock.is_empty() {
            warn!("Vendor '{}' has no stock criteria", vendor.name);
        } else if vendor.has_catch_all() {
            warn!("Vendor '{}' has an empty stock criterion and accepts every card", vendor.name);
        }

        self.vendors.insert(vendor.name.clone(), vendor);
    }

    /// Get a vendor definition by name
    pub fn get(&self, name: &str) -> Option<&VendorDefinition> {
        self.vendors.get(name)
    }

    /// All vendors in name order
    pub fn all(&self) -> impl Iterator<Item = &VendorDefinition> {
        self.vendors.values()
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

impl Default for VendorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Rarity;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_vendors_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        let vendors_dir = temp_dir.path().join("vendors");
        std::fs::create_dir(&vendors_dir).unwrap();

        write_file(
            &vendors_dir,
            "alchemist.toml",
            r#"
name = "Alchemist"
multiplier = 2

[[stock]]
item_type = "potion"

[[stock]]
property = "consumable"
min_rarity = "uncommon"

[rules]
common = "1d4+1"
uncommon = "1d2"
"#,
        );
        write_file(&vendors_dir, "notes.txt", "ignored");

        let registry = VendorRegistry::load_or_builtin(temp_dir.path());
        assert_eq!(registry.len(), 1);

        let alchemist = registry.get("Alchemist").unwrap();
        assert_eq!(alchemist.multiplier, 2);
        assert_eq!(alchemist.stock.len(), 2);
        assert_eq!(alchemist.stock[1].min_rarity, Some(Rarity::Uncommon));
        assert_eq!(alchemist.rules.get(&Rarity::Common).map(String::as_str), Some("1d4+1"));
        assert!(!alchemist.rules.contains_key(&Rarity::Rare));
    }

    #[test]
    fn test_missing_directory_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let registry = VendorRegistry::load_or_builtin(temp_dir.path());
        assert_eq!(registry.len(), 7);
        assert!(registry.get("Ювелир").is_some());
    }

    #[test]
    fn test_malformed_file_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let vendors_dir = temp_dir.path().join("vendors");
        std::fs::create_dir(&vendors_dir).unwrap();
        write_file(&vendors_dir, "broken.toml", "name = ");

        let mut registry = VendorRegistry::new();
        let err = registry.load_from_directory(&vendors_dir).unwrap_err();
        assert!(matches!(err, VendorLoadError::Parse { .. }));

        assert_eq!(VendorRegistry::load_or_builtin(temp_dir.path()).len(), 7);
    }

    #[test]
    fn test_misspelled_key_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_file(
            temp_dir.path(),
            "smith.toml",
            "name = \"Smith\"\n\n[[stock]]\nitem_typ = \"weapon\"\n\n[rules]\ncommon = \"1d4\"\n",
        );

        let mut registry = VendorRegistry::new();
        let err = registry.load_from_directory(temp_dir.path()).unwrap_err();
        assert!(matches!(err, VendorLoadError::Parse { .. }));
        assert!(err.to_string().contains("item_typ"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_misspelled_top_level_key_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "smith.toml", "name = \"Smith\"\nmultipler = 2\n");

        let mut registry = VendorRegistry::new();
        let err = registry.load_from_directory(temp_dir.path()).unwrap_err();
        assert!(matches!(err, VendorLoadError::Parse { .. }));
    }

    #[test]
    fn test_empty_stock_table_is_catch_all() {
        let temp_dir = TempDir::new().unwrap();
        write_file(
            temp_dir.path(),
            "bazaar.toml",
            "name = \"Bazaar\"\n\n[[stock]]\n\n[[stock]]\nitem_type = \"ring\"\n",
        );

        let mut registry = VendorRegistry::new();
        registry.load_from_directory(temp_dir.path()).unwrap();
        let bazaar = registry.get("Bazaar").unwrap();
        assert!(bazaar.has_catch_all());
        assert!(!VendorRegistry::builtin().all().any(VendorDefinition::has_catch_all));
    }

    #[test]
    fn test_duplicate_names_last_file_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.toml", "name = \"Stall\"\nmultiplier = 1\n");
        write_file(temp_dir.path(), "b.toml", "name = \"Stall\"\nmultiplier = 3\n");

        let mut registry = VendorRegistry::new();
        registry.load_from_directory(temp_dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Stall").unwrap().multiplier, 3);
    }
}
