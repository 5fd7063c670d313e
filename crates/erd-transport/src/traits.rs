use crate::{Erd, Result};

/// A request/response link to one appliance.
///
/// Methods take `&self` so a single transport can serve concurrent requests for
/// different ERDs. Implementations may block the caller until the appliance
/// answers or a timeout fires.
pub trait ErdTransport: Send + Sync {
    /// Read the raw bytes currently held by `erd`.
    fn request_read(&self, erd: Erd) -> Result<Vec<u8>>;

    /// Store `data` at `erd`.
    fn request_write(&self, erd: Erd, data: &[u8]) -> Result<()>;
}
