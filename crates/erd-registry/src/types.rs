//! On-disk registry definitions.

use crate::descriptor::{Access, FieldSpec};
use crate::error::ConfigError;
use crate::format::{CompositeFormat, Endian, FieldFormat, ScalarFormat};
use crate::registry::FieldRegistry;
use erd_transport::Erd;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct RegistryFile {
    pub kind: String,
    /// First ERD, `"0x2000"` or `"8192"`.
    pub base: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl RegistryFile {
    pub fn base_erd(&self) -> Result<Erd, ConfigError> {
        Erd::parse(&self.base).ok_or_else(|| ConfigError::InvalidErd(self.base.clone()))
    }

    pub fn to_specs(&self) -> Result<Vec<FieldSpec>, ConfigError> {
        self.fields.iter().map(FieldDef::to_spec).collect()
    }

    pub fn build(&self) -> Result<FieldRegistry, ConfigError> {
        FieldRegistry::build(self.base_erd()?, self.to_specs()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct FieldDef {
    pub name: String,
    pub format: FormatDef,
    /// Applies to the scalar, or to every byte-aligned member of a composite.
    #[serde(default)]
    pub endian: Endian,
    #[serde(default)]
    pub access: Access,
}

impl FieldDef {
    pub fn to_spec(&self) -> Result<FieldSpec, ConfigError> {
        Ok(FieldSpec {
            name: self.name.clone(),
            format: self.format.to_format(self.endian)?,
            access: self.access,
        })
    }
}

/// `UInt16`, or a list of sub-fields laid out back to back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub enum FormatDef {
    Scalar(String),
    Composite(Vec<SubFieldDef>),
}

impl FormatDef {
    pub fn to_format(&self, endian: Endian) -> Result<FieldFormat, ConfigError> {
        match self {
            FormatDef::Scalar(s) => Ok(s.parse::<ScalarFormat>()?.with_endian(endian).into()),
            FormatDef::Composite(subs) => {
                let mut b = CompositeFormat::builder();
                for sub in subs {
                    b = match sub {
                        SubFieldDef::Named(entry) => {
                            let (name, fmt) = entry
                                .split_once(':')
                                .ok_or_else(|| ConfigError::UnknownFormat(entry.clone()))?;
                            let fmt = fmt.parse::<ScalarFormat>()?.with_endian(endian);
                            b.field(name.trim(), fmt)
                        }
                        SubFieldDef::Bits { name, bits, signed } if *signed => {
                            b.signed_bits(name.as_str(), *bits)
                        }
                        SubFieldDef::Bits { name, bits, .. } => b.bits(name.as_str(), *bits),
                        SubFieldDef::Pad { pad } => b.pad(*pad),
                    };
                }
                Ok(b.build()?.into())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub enum SubFieldDef {
    /// `"tankType:UInt8"`
    Named(String),
    Bits {
        name: String,
        bits: u32,
        #[serde(default)]
        signed: bool,
    },
    /// Reserved bits.
    Pad { pad: u32 },
}
