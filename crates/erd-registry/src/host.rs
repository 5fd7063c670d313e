use crate::descriptor::FieldDescriptor;
use crate::error::{Error, Result};
use crate::format::FieldValue;
use crate::metrics::ErdMetrics;
use crate::record::FieldRecord;
use erd_transport::{Erd, ErdTransport};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;

/// Anything a [`crate::FieldRegistry`] can be bound to.
pub trait FieldHost {
    /// Link the bound accessors will talk through.
    fn transport(&self) -> Arc<dyn ErdTransport>;

    /// Install `accessor` under its field name, replacing any previous one.
    fn attach(&mut self, accessor: FieldAccessor);
}

/// Read/write handle for one field on one appliance.
#[derive(Clone)]
pub struct FieldAccessor {
    descriptor: Arc<FieldDescriptor>,
    transport: Arc<dyn ErdTransport>,
    metrics: Option<ErdMetrics>,
}

impl FieldAccessor {
    pub fn new(descriptor: Arc<FieldDescriptor>, transport: Arc<dyn ErdTransport>) -> Self {
        Self {
            descriptor,
            transport,
            metrics: None,
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn erd(&self) -> Erd {
        self.descriptor.erd()
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    pub fn is_writable(&self) -> bool {
        self.descriptor.is_writable()
    }

    pub fn read(&self) -> Result<FieldValue> {
        let res = self.descriptor.read(self.transport.as_ref());
        if let Some(m) = &self.metrics {
            m.record_read(res.is_ok());
        }
        res
    }

    pub fn write(&self, value: &FieldValue) -> Result<()> {
        let res = self.descriptor.write(self.transport.as_ref(), value);
        if let Some(m) = &self.metrics {
            m.record_write(res.is_ok());
        }
        res
    }

    /// Read and stamp with the current time.
    pub fn sample(&self) -> Result<FieldRecord> {
        let value = self.read()?;
        Ok(FieldRecord::new(
            &self.descriptor,
            value,
            Some(OffsetDateTime::now_utc()),
        ))
    }
}

impl fmt::Debug for FieldAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name())
            .field("erd", &self.erd())
            .finish()
    }
}

/// One appliance on the bus, with the fields bound to it so far.
#[derive(Clone)]
pub struct Appliance {
    name: String,
    pub address: Option<u8>,
    pub version: Option<String>,
    transport: Arc<dyn ErdTransport>,
    metrics: Option<ErdMetrics>,
    fields: BTreeMap<String, FieldAccessor>,
}

impl Appliance {
    pub fn new(name: impl Into<String>, transport: Arc<dyn ErdTransport>) -> Self {
        Self {
            name: name.into(),
            address: None,
            version: None,
            transport,
            metrics: None,
            fields: BTreeMap::new(),
        }
    }

    /// Count reads, writes and failures of every accessor bound from now on.
    pub fn with_metrics(mut self, metrics: ErdMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> Option<&ErdMetrics> {
        self.metrics.as_ref()
    }

    pub fn field(&self, name: &str) -> Option<&FieldAccessor> {
        self.fields.get(name)
    }

    /// Bound accessors, ordered by name.
    pub fn fields(&self) -> impl Iterator<Item = &FieldAccessor> {
        self.fields.values()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn read(&self, name: &str) -> Result<FieldValue> {
        self.accessor(name)?.read()
    }

    pub fn write(&self, name: &str, value: &FieldValue) -> Result<()> {
        self.accessor(name)?.write(value)
    }

    /// Raw register access, bypassing any bound format.
    pub fn read_erd(&self, erd: Erd) -> erd_transport::Result<Vec<u8>> {
        self.transport.request_read(erd)
    }

    /// Read every bound field in identifier order. Stops at the first failure.
    pub fn snapshot(&self) -> Result<Vec<FieldRecord>> {
        let mut accessors: Vec<&FieldAccessor> = self.fields.values().collect();
        accessors.sort_by_key(|a| a.erd());
        accessors.into_iter().map(FieldAccessor::sample).collect()
    }

    fn accessor(&self, name: &str) -> Result<&FieldAccessor> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }
}

impl FieldHost for Appliance {
    fn transport(&self) -> Arc<dyn ErdTransport> {
        self.transport.clone()
    }

    fn attach(&mut self, mut accessor: FieldAccessor) {
        accessor.metrics = self.metrics.clone();
        let name = accessor.name().to_string();
        if self.fields.insert(name, accessor).is_none() {
            if let Some(m) = &self.metrics {
                m.fields_bound.inc();
            }
        }
    }
}

impl fmt::Debug for Appliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Appliance")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("version", &self.version)
            .field("fields", &self.fields.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldSpec;
    use crate::format::{CompositeFormat, ScalarFormat};
    use crate::metrics::MetricsHub;
    use crate::FieldRegistry;
    use erd_transport::{MockTransport, TransportError};

    fn registry() -> FieldRegistry {
        FieldRegistry::build(
            Erd::new(0x2000),
            vec![
                FieldSpec::new("machineStatus", ScalarFormat::UINT8).read_only(),
                FieldSpec::new(
                    "tankSelected",
                    CompositeFormat::builder()
                        .field("tankType", ScalarFormat::UINT8)
                        .field("tankEnabled", ScalarFormat::UINT8)
                        .build()
                        .unwrap(),
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_read_and_write_through_host() -> anyhow::Result<()> {
        let bus = Arc::new(MockTransport::new().with_register(0x2000, &[0x03]));
        let mut appliance = Appliance::new("laundry", bus.clone());
        registry().bind(&mut appliance);

        assert_eq!(appliance.read("machineStatus")?, FieldValue::Int(3));
        appliance.write(
            "tankSelected",
            &FieldValue::composite([("tankType", 1), ("tankEnabled", 1)]),
        )?;
        assert_eq!(bus.get(0x2001), Some(vec![0x01, 0x01]));
        assert!(!appliance.field("machineStatus").unwrap().is_writable());
        Ok(())
    }

    #[test]
    fn test_unknown_field() {
        let appliance = Appliance::new("laundry", Arc::new(MockTransport::new()));
        assert!(matches!(
            appliance.read("cycleCount"),
            Err(Error::UnknownField(name)) if name == "cycleCount"
        ));
    }

    #[test]
    fn test_snapshot_in_erd_order() -> anyhow::Result<()> {
        let bus = MockTransport::new()
            .with_register(0x2000, &[0x01])
            .with_register(0x2001, &[0x02, 0x00]);
        let mut appliance = Appliance::new("laundry", Arc::new(bus));
        registry().bind(&mut appliance);
        let snap = appliance.snapshot()?;
        let names: Vec<&str> = snap.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["machineStatus", "tankSelected"]);
        assert!(snap.iter().all(|r| r.ts.is_some()));
        Ok(())
    }

    #[test]
    fn test_metrics_count_traffic() -> anyhow::Result<()> {
        let hub = MetricsHub::new()?;
        let bus = Arc::new(MockTransport::new().with_register(0x2000, &[0x01]));
        bus.fail_on(0x2001, TransportError::Timeout);
        let mut appliance = Appliance::new("laundry", bus).with_metrics(hub.erd.clone());
        let reg = registry();
        reg.bind(&mut appliance);
        reg.bind(&mut appliance);

        appliance.read("machineStatus")?;
        assert!(appliance.read("tankSelected").is_err());
        assert!(appliance
            .write("tankSelected", &FieldValue::composite([("tankType", 1)]))
            .is_err());

        assert_eq!(hub.erd.reads.get(), 2);
        assert_eq!(hub.erd.writes.get(), 1);
        assert_eq!(hub.erd.errors.get(), 2);
        assert_eq!(hub.erd.fields_bound.get(), 2);
        assert!(hub.encode_text().contains("erd_reads_total 2"));
        Ok(())
    }
}
