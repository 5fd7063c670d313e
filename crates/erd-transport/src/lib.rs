//! erd-transport: link abstraction for appliance ERD registers
//!
//! This crate provides the identifier type and the trait used to read and write
//! fixed-size binary registers on a remote appliance. Link framing belongs to the
//! backend. The default build enables a `mock` backend so that consumers can be
//! exercised without hardware.

mod types;
pub use types::Erd;

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::ErdTransport;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockTransport;
