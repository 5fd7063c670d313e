use crate::error::{Error, Result};
use crate::format::{FieldFormat, FieldValue};
use erd_transport::{Erd, ErdTransport};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub enum Access {
    #[default]
    ReadWrite,
    ReadOnly,
}

/// One entry handed to [`crate::FieldRegistry::build`]; the ERD is assigned there.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub format: FieldFormat,
    pub access: Access,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, format: impl Into<FieldFormat>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            access: Access::ReadWrite,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.access = Access::ReadOnly;
        self
    }
}

/// A named field bound to its ERD. Immutable once built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    erd: Erd,
    format: FieldFormat,
    access: Access,
}

impl FieldDescriptor {
    pub(crate) fn new(erd: Erd, spec: FieldSpec) -> Self {
        Self {
            name: spec.name,
            erd,
            format: spec.format,
            access: spec.access,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn erd(&self) -> Erd {
        self.erd
    }

    pub fn format(&self) -> &FieldFormat {
        &self.format
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }

    /// Fetch the register and decode it.
    pub fn read(&self, transport: &dyn ErdTransport) -> Result<FieldValue> {
        let bytes = transport
            .request_read(self.erd)
            .map_err(|e| self.transport_error(e))?;
        let value = self.format.decode(&bytes)?;
        debug!(erd = %self.erd, field = %self.name, %value, "read");
        Ok(value)
    }

    /// Encode `value` and store it in the register.
    pub fn write(&self, transport: &dyn ErdTransport, value: &FieldValue) -> Result<()> {
        if !self.is_writable() {
            return Err(Error::ReadOnly {
                name: self.name.clone(),
            });
        }
        let bytes = self.format.encode(value)?;
        transport
            .request_write(self.erd, &bytes)
            .map_err(|e| self.transport_error(e))?;
        debug!(erd = %self.erd, field = %self.name, %value, "write");
        Ok(())
    }

    fn transport_error(&self, source: erd_transport::TransportError) -> Error {
        warn!(erd = %self.erd, field = %self.name, error = %source, "transport failure");
        Error::Transport {
            erd: self.erd,
            name: self.name.clone(),
            source,
        }
    }
}
