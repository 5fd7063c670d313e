//! Laundry (washer/dryer) ERDs and the bus plugin that binds them.

use crate::bus::{ApplianceBus, ApplianceHook};
use crate::descriptor::FieldSpec;
use crate::error::{ConfigError, Result};
use crate::format::{CompositeFormat, ScalarFormat};
use crate::host::Appliance;
use crate::registry::FieldRegistry;
use erd_transport::Erd;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const LAUNDRY_BASE: Erd = Erd::new(0x2000);
pub const LAUNDRY_KIND: &str = "laundry";

/// Field names, in ERD order starting at [`LAUNDRY_BASE`].
pub mod fields {
    pub const MACHINE_STATUS: &str = "machineStatus";
    pub const MACHINE_SUB_CYCLE: &str = "machineSubCycle";
    pub const END_OF_CYCLE: &str = "endOfCycle";
    pub const CYCLE_COUNT: &str = "cycleCount";
    pub const DRYER_SERVICE_ERROR_CODES: &str = "dryerServiceErrorCodes";
    pub const DSM_OVERRIDES_ALLOWED: &str = "dsmOverridesAllowed";
    pub const MAXIMUM_WATER_TEMPERATURE: &str = "maximumWaterTemperature";
    pub const TIME_REMAINING_IN_SECONDS: &str = "timeRemainingInSeconds";
    pub const TANK_STATUS: &str = "tankStatus";
    pub const TANK_SELECTED: &str = "tankSelected";
    pub const CYCLE_SELECTED: &str = "cycleSelected";
    pub const WASHER_USER_INTERFACE_SERVICE_ERROR_CODES: &str =
        "washerUserInterfaceServiceErrorCodes";
    pub const WASHER_INVERTER_SERVICE_ERROR_CODES: &str = "washerInverterServiceErrorCodes";
    pub const WASHER_MAIN_CONTROL_SERVICE_ERROR_CODES: &str = "washerMainControlServiceErrorCodes";
    pub const OPERATING_MODE: &str = "operatingMode";
    pub const DRYER_CRITICAL_RESPONSE_ENABLED: &str = "dryerCriticalResponseEnabled";
    pub const DELAY_TIME_REMAINING_IN_MINUTES: &str = "delayTimeRemainingInMinutes";
}

pub fn laundry_specs() -> Result<Vec<FieldSpec>, ConfigError> {
    use fields::*;
    let byte = ScalarFormat::UINT8;
    let word = ScalarFormat::UINT16;
    let dword = ScalarFormat::UINT32;
    let tank_status = CompositeFormat::builder()
        .field("tankType", byte)
        .field("tankPercentageRemaining", byte)
        .build()?;
    let tank_selected = CompositeFormat::builder()
        .field("tankType", byte)
        .field("tankEnabled", byte)
        .build()?;
    Ok(vec![
        FieldSpec::new(MACHINE_STATUS, byte),
        FieldSpec::new(MACHINE_SUB_CYCLE, byte),
        FieldSpec::new(END_OF_CYCLE, byte),
        FieldSpec::new(CYCLE_COUNT, word),
        FieldSpec::new(DRYER_SERVICE_ERROR_CODES, dword),
        FieldSpec::new(DSM_OVERRIDES_ALLOWED, byte),
        FieldSpec::new(MAXIMUM_WATER_TEMPERATURE, byte),
        FieldSpec::new(TIME_REMAINING_IN_SECONDS, word),
        FieldSpec::new(TANK_STATUS, tank_status),
        FieldSpec::new(TANK_SELECTED, tank_selected),
        FieldSpec::new(CYCLE_SELECTED, byte),
        FieldSpec::new(WASHER_USER_INTERFACE_SERVICE_ERROR_CODES, dword),
        FieldSpec::new(WASHER_INVERTER_SERVICE_ERROR_CODES, dword),
        FieldSpec::new(WASHER_MAIN_CONTROL_SERVICE_ERROR_CODES, dword),
        FieldSpec::new(OPERATING_MODE, byte),
        FieldSpec::new(DRYER_CRITICAL_RESPONSE_ENABLED, byte),
        FieldSpec::new(DELAY_TIME_REMAINING_IN_MINUTES, word),
    ])
}

pub fn laundry_registry() -> Result<FieldRegistry, ConfigError> {
    FieldRegistry::build(LAUNDRY_BASE, laundry_specs()?)
}

/// Values stamped onto appliances created as `"laundry"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct PluginConfig {
    #[serde(default)]
    pub address: Option<u8>,
    #[serde(default)]
    pub version: Option<String>,
}

pub struct LaundryPlugin {
    registry: Arc<FieldRegistry>,
    config: PluginConfig,
}

impl LaundryPlugin {
    pub fn new(config: PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            registry: Arc::new(laundry_registry()?),
            config,
        })
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }
}

impl ApplianceHook for LaundryPlugin {
    /// Appliances answering at the laundry base ERD get the laundry fields and
    /// are published as `"laundry"`.
    fn on_announced(&self, bus: &ApplianceBus, appliance: &mut Appliance) -> Result<()> {
        match appliance.read_erd(self.registry.base()) {
            Ok(_) => {
                self.registry.bind(appliance);
                info!(appliance = appliance.name(), "laundry appliance detected");
                bus.emit(LAUNDRY_KIND, appliance);
            }
            Err(e) => {
                debug!(appliance = appliance.name(), error = %e, "not a laundry appliance");
            }
        }
        Ok(())
    }

    fn on_created(&self, kind: &str, appliance: &mut Appliance) -> Result<()> {
        if kind == LAUNDRY_KIND {
            appliance.address = self.config.address;
            appliance.version = self.config.version.clone();
            self.registry.bind(appliance);
        }
        Ok(())
    }
}

/// Build the laundry plugin and subscribe it to `bus`.
pub fn plugin(bus: &ApplianceBus, config: PluginConfig) -> Result<Arc<LaundryPlugin>, ConfigError> {
    let plugin = Arc::new(LaundryPlugin::new(config)?);
    bus.register(plugin.clone());
    info!(base = %LAUNDRY_BASE, fields = plugin.registry.len(), "laundry plugin registered");
    Ok(plugin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FieldValue;
    use crate::loader::load_registry_file;
    use crate::metrics::MetricsHub;
    use erd_transport::MockTransport;

    #[test]
    fn test_laundry_table_layout() -> anyhow::Result<()> {
        let reg = laundry_registry()?;
        assert_eq!(reg.len(), 17);
        let erd = |name: &str| reg.get(name).map(|d| d.erd().raw());
        assert_eq!(erd(fields::MACHINE_STATUS), Some(0x2000));
        assert_eq!(erd(fields::CYCLE_COUNT), Some(0x2003));
        assert_eq!(erd(fields::TANK_STATUS), Some(0x2008));
        assert_eq!(erd(fields::TANK_SELECTED), Some(0x2009));
        assert_eq!(erd(fields::OPERATING_MODE), Some(0x200E));
        assert_eq!(erd(fields::DELAY_TIME_REMAINING_IN_MINUTES), Some(0x2010));

        let width = |name: &str| reg.get(name).map(|d| d.format().width_bytes());
        assert_eq!(width(fields::DRYER_SERVICE_ERROR_CODES), Some(4));
        assert_eq!(width(fields::TIME_REMAINING_IN_SECONDS), Some(2));
        assert_eq!(width(fields::TANK_SELECTED), Some(2));
        Ok(())
    }

    #[test]
    fn test_config_file_matches_builtin_table() -> anyhow::Result<()> {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../configs/registries/laundry.yaml");
        let file = load_registry_file(path)?;
        assert_eq!(file.kind, LAUNDRY_KIND);
        let from_file = file.build()?;
        let builtin = laundry_registry()?;
        assert_eq!(from_file.base(), builtin.base());
        assert!(from_file.iter().eq(builtin.iter()));
        Ok(())
    }

    #[test]
    fn test_announce_binds_and_emits() -> anyhow::Result<()> {
        let bus = ApplianceBus::new();
        plugin(&bus, PluginConfig::default())?;
        let rx = bus.subscribe();
        let transport = MockTransport::new()
            .with_register(0x2000, &[0x01])
            .with_register(0x2008, &[0x02, 0x64]);

        let appliance = bus.announce(Appliance::new("washer", Arc::new(transport)))?;
        assert_eq!(appliance.fields().count(), 17);

        let ev = rx.try_recv()?;
        assert_eq!(ev.kind, LAUNDRY_KIND);
        assert_eq!(
            ev.appliance.read(fields::TANK_STATUS)?,
            FieldValue::composite([("tankType", 2), ("tankPercentageRemaining", 100)])
        );
        Ok(())
    }

    #[test]
    fn test_announce_counts_into_bus_metrics() -> anyhow::Result<()> {
        let hub = MetricsHub::new()?;
        let bus = ApplianceBus::new().with_metrics(hub.erd.clone());
        plugin(&bus, PluginConfig::default())?;
        let transport = MockTransport::new().with_register(0x2000, &[0x01]);

        let appliance = bus.announce(Appliance::new("washer", Arc::new(transport)))?;
        assert_eq!(appliance.read(fields::MACHINE_STATUS)?, FieldValue::Int(1));
        assert!(appliance.read(fields::CYCLE_COUNT).is_err());

        assert_eq!(hub.erd.fields_bound.get(), 17);
        assert_eq!(hub.erd.reads.get(), 2);
        assert_eq!(hub.erd.errors.get(), 1);
        Ok(())
    }

    #[test]
    fn test_announce_keeps_own_metrics() -> anyhow::Result<()> {
        let own = MetricsHub::new()?;
        let shared = MetricsHub::new()?;
        let bus = ApplianceBus::new().with_metrics(shared.erd.clone());
        plugin(&bus, PluginConfig::default())?;
        let transport = MockTransport::new().with_register(0x2000, &[0x01]);

        let appliance =
            Appliance::new("washer", Arc::new(transport)).with_metrics(own.erd.clone());
        bus.announce(appliance)?;
        assert_eq!(own.erd.fields_bound.get(), 17);
        assert_eq!(shared.erd.fields_bound.get(), 0);
        Ok(())
    }

    #[test]
    fn test_announce_ignores_other_appliances() -> anyhow::Result<()> {
        let bus = ApplianceBus::new();
        plugin(&bus, PluginConfig::default())?;
        let rx = bus.subscribe();
        let appliance = bus.announce(Appliance::new("fridge", Arc::new(MockTransport::new())))?;
        assert_eq!(appliance.fields().count(), 0);
        assert!(rx.try_recv().is_err());
        Ok(())
    }

    #[test]
    fn test_create_applies_config() -> anyhow::Result<()> {
        let bus = ApplianceBus::new();
        let config: PluginConfig = serde_yaml::from_str("address: 192\nversion: \"1.2\"\n")?;
        plugin(&bus, config)?;
        let transport = Arc::new(MockTransport::new().with_register(0x2003, &[0x00, 0x07]));

        let laundry = bus.create(LAUNDRY_KIND, transport.clone())?;
        assert_eq!(laundry.address, Some(0xC0));
        assert_eq!(laundry.version.as_deref(), Some("1.2"));
        assert_eq!(laundry.read(fields::CYCLE_COUNT)?, FieldValue::Int(7));

        let other = bus.create("dishwasher", transport)?;
        assert_eq!(other.address, None);
        assert_eq!(other.fields().count(), 0);
        Ok(())
    }

    #[test]
    fn test_created_then_announced_binds_once() -> anyhow::Result<()> {
        let bus = ApplianceBus::new();
        plugin(&bus, PluginConfig::default())?;
        let transport = Arc::new(MockTransport::new().with_register(0x2000, &[0x00]));
        let created = bus.create(LAUNDRY_KIND, transport)?;
        let names: Vec<String> = created.fields().map(|a| a.name().to_string()).collect();
        let announced = bus.announce(created)?;
        let again: Vec<String> = announced.fields().map(|a| a.name().to_string()).collect();
        assert_eq!(names, again);
        assert_eq!(again.len(), 17);
        Ok(())
    }

    #[test]
    fn test_write_cycle_selected() -> anyhow::Result<()> {
        let bus = ApplianceBus::new();
        plugin(&bus, PluginConfig::default())?;
        let transport = Arc::new(MockTransport::new());
        let laundry = bus.create(LAUNDRY_KIND, transport.clone())?;
        laundry.write(fields::CYCLE_SELECTED, &FieldValue::Int(4))?;
        laundry.write(fields::TIME_REMAINING_IN_SECONDS, &FieldValue::Int(3600))?;
        assert_eq!(transport.get(0x200A), Some(vec![0x04]));
        assert_eq!(transport.get(0x2007), Some(vec![0x0E, 0x10]));
        Ok(())
    }
}
