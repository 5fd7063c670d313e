use crate::descriptor::{FieldDescriptor, FieldSpec};
use crate::error::ConfigError;
use crate::host::{FieldAccessor, FieldHost};
use erd_transport::Erd;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered table of descriptors for one appliance kind.
///
/// Identifiers are assigned from `base` in list order when the registry is
/// built and never change afterwards: they are part of the wire contract with
/// the appliance.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    base: Erd,
    descriptors: Vec<Arc<FieldDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl FieldRegistry {
    /// Assign `base`, `base + 1`, ... to `specs` in order.
    ///
    /// Fails without producing a registry if a name is empty or repeated, or if
    /// the identifiers would run past `0xFFFF`.
    pub fn build(
        base: Erd,
        specs: impl IntoIterator<Item = FieldSpec>,
    ) -> Result<Self, ConfigError> {
        let specs: Vec<FieldSpec> = specs.into_iter().collect();
        let mut descriptors = Vec::with_capacity(specs.len());
        let mut by_name = HashMap::with_capacity(specs.len());
        let count = specs.len();
        for (i, spec) in specs.into_iter().enumerate() {
            if spec.name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if by_name.contains_key(&spec.name) {
                return Err(ConfigError::DuplicateName(spec.name));
            }
            let erd = base
                .offset(i)
                .ok_or(ConfigError::ErdOverflow { base, count })?;
            by_name.insert(spec.name.clone(), i);
            descriptors.push(Arc::new(FieldDescriptor::new(erd, spec)));
        }
        info!(base = %base, fields = count, "field registry built");
        Ok(Self {
            base,
            descriptors,
            by_name,
        })
    }

    pub fn base(&self) -> Erd {
        self.base
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| self.descriptors[i].as_ref())
    }

    pub fn by_erd(&self, erd: Erd) -> Option<&FieldDescriptor> {
        let idx = erd.raw().checked_sub(self.base.raw())? as usize;
        self.descriptors.get(idx).map(|d| d.as_ref())
    }

    /// Descriptors in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.descriptors.iter().map(|d| d.as_ref())
    }

    /// Attach one accessor per field to `host`, keyed by field name.
    ///
    /// Rebinding the same registry replaces each accessor with an identical one.
    pub fn bind<H: FieldHost + ?Sized>(&self, host: &mut H) {
        let transport = host.transport();
        for desc in &self.descriptors {
            host.attach(FieldAccessor::new(desc.clone(), transport.clone()));
        }
        debug!(base = %self.base, fields = self.descriptors.len(), "registry bound");
    }
}
