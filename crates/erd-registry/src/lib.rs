//! erd-registry: typed field registries over appliance ERDs
//!
//! A [`FieldRegistry`] assigns sequential ERDs to named [`FieldFormat`]s and binds
//! one accessor per field onto an [`Appliance`]. Reads and writes go through the
//! appliance's [`erd_transport::ErdTransport`].

mod error;
pub use error::{ConfigError, Error, FormatError, Result};

pub mod format;
pub use format::{
    CompositeBuilder, CompositeFormat, Endian, FieldFormat, FieldValue, Placement, ScalarFormat,
    Signedness, SubField, Width,
};

mod descriptor;
pub use descriptor::{Access, FieldDescriptor, FieldSpec};

mod registry;
pub use registry::FieldRegistry;

mod host;
pub use host::{Appliance, FieldAccessor, FieldHost};

mod record;
pub use record::FieldRecord;

pub mod bus;
pub use bus::{ApplianceBus, ApplianceHook, BusEvent};

mod types;
pub use types::{FieldDef, FormatDef, RegistryFile, SubFieldDef};

mod loader;
pub use loader::{load_registries_dir, load_registry_file, RegistrySet};

mod metrics;
pub use metrics::{ErdMetrics, MetricsHub};

pub mod laundry;
