use crate::registry::FieldRegistry;
use crate::types::RegistryFile;
use anyhow::Context;
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Built registries keyed by appliance kind.
#[derive(Debug, Default, Clone)]
pub struct RegistrySet {
    pub registries: HashMap<String, Arc<FieldRegistry>>,
}

impl RegistrySet {
    pub fn insert(&mut self, kind: impl Into<String>, registry: FieldRegistry) {
        self.registries.insert(kind.into(), Arc::new(registry));
    }

    pub fn get(&self, kind: &str) -> Option<Arc<FieldRegistry>> {
        self.registries.get(kind).cloned()
    }
}

pub fn load_registry_file(path: impl AsRef<Path>) -> anyhow::Result<RegistryFile> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading registry: {}", path.display()))?;
    let val: Value =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?;
    let file: RegistryFile = serde_yaml::from_value(val)
        .with_context(|| format!("decoding registry: {}", path.display()))?;
    Ok(file)
}

/// Load and build every `.yml`/`.yaml` file in `dir`, in file name order.
pub fn load_registries_dir(dir: impl AsRef<Path>) -> anyhow::Result<RegistrySet> {
    let mut set = RegistrySet::default();
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "yml" || ext == "yaml" {
                entries.push(path);
            }
        }
    }
    entries.sort();
    for p in entries {
        let file = load_registry_file(&p)?;
        let registry = file
            .build()
            .with_context(|| format!("building registry: {}", p.display()))?;
        if set.registries.contains_key(&file.kind) {
            anyhow::bail!("duplicate registry kind {} in {}", file.kind, p.display());
        }
        set.insert(file.kind, registry);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use erd_transport::Erd;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("erd-registry-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_dir_skips_other_files() -> anyhow::Result<()> {
        let dir = scratch_dir("dir");
        fs::write(
            dir.join("a.yaml"),
            "kind: fridge\nbase: \"0x1000\"\nfields:\n  - { name: doorStatus, format: UInt8 }\n",
        )?;
        fs::write(
            dir.join("b.yml"),
            "kind: oven\nbase: \"20480\"\nfields:\n  - { name: cavityTemp, format: UInt16 }\n",
        )?;
        fs::write(dir.join("notes.txt"), "not a registry")?;

        let set = load_registries_dir(&dir)?;
        assert_eq!(set.registries.len(), 2);
        let oven = set.get("oven").unwrap();
        assert_eq!(oven.get("cavityTemp").map(|d| d.erd()), Some(Erd::new(0x5000)));
        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_build_error_names_the_file() -> anyhow::Result<()> {
        let dir = scratch_dir("dup");
        fs::write(
            dir.join("bad.yaml"),
            "kind: bad\nbase: \"0x1000\"\nfields:\n  - { name: a, format: UInt8 }\n  - { name: a, format: UInt8 }\n",
        )?;
        let err = load_registries_dir(&dir).unwrap_err();
        assert!(format!("{err:#}").contains("bad.yaml"));
        assert!(format!("{err:#}").contains("duplicate field name: a"));
        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
