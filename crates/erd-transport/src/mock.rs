use crate::{Erd, ErdTransport, Result, TransportError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// An in-process register file. Each instance is independent.
///
/// Reads of an unknown ERD fail with [`TransportError::UnknownErd`]; writes always
/// create or replace the register. Individual ERDs can be made to fail to
/// exercise error paths.
#[derive(Default)]
pub struct MockTransport {
    registers: RwLock<HashMap<Erd, Vec<u8>>>,
    failures: RwLock<HashMap<Erd, TransportError>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style preload of one register.
    pub fn with_register(self, raw: u16, data: &[u8]) -> Self {
        self.set(raw, data);
        self
    }

    pub fn set(&self, raw: u16, data: &[u8]) {
        if let Ok(mut regs) = self.registers.write() {
            regs.insert(Erd::new(raw), data.to_vec());
        }
    }

    pub fn get(&self, raw: u16) -> Option<Vec<u8>> {
        self.registers.read().ok()?.get(&Erd::new(raw)).cloned()
    }

    /// Make every request touching ERD `raw` fail with `err`.
    pub fn fail_on(&self, raw: u16, err: TransportError) {
        if let Ok(mut f) = self.failures.write() {
            f.insert(Erd::new(raw), err);
        }
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn injected(&self, erd: Erd) -> Result<()> {
        let failures = self
            .failures
            .read()
            .map_err(|_| TransportError::Io("mock failure table poisoned".into()))?;
        match failures.get(&erd) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl ErdTransport for MockTransport {
    fn request_read(&self, erd: Erd) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%erd, "mock read");
        self.injected(erd)?;
        let regs = self
            .registers
            .read()
            .map_err(|_| TransportError::Io("mock registers poisoned".into()))?;
        regs.get(&erd).cloned().ok_or(TransportError::UnknownErd(erd))
    }

    fn request_write(&self, erd: Erd, data: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%erd, len = data.len(), "mock write");
        self.injected(erd)?;
        let mut regs = self
            .registers
            .write()
            .map_err(|_| TransportError::Io("mock registers poisoned".into()))?;
        regs.insert(erd, data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_preloaded_register() -> anyhow::Result<()> {
        let bus = MockTransport::new().with_register(0x2000, &[0x05]);
        assert_eq!(bus.request_read(Erd::new(0x2000))?, vec![0x05]);
        assert_eq!(bus.read_count(), 1);
        Ok(())
    }

    #[test]
    fn test_unknown_erd() {
        let bus = MockTransport::new();
        let err = bus.request_read(Erd::new(0x2001)).unwrap_err();
        assert_eq!(err, TransportError::UnknownErd(Erd::new(0x2001)));
    }

    #[test]
    fn test_write_then_read() -> anyhow::Result<()> {
        let bus = MockTransport::new();
        bus.request_write(Erd::new(0x2003), &[0x01, 0x02])?;
        assert_eq!(bus.get(0x2003), Some(vec![0x01, 0x02]));
        assert_eq!(bus.write_count(), 1);
        Ok(())
    }

    #[test]
    fn test_injected_failure() {
        let bus = MockTransport::new().with_register(0x2000, &[0x00]);
        bus.fail_on(0x2000, TransportError::Timeout);
        assert_eq!(
            bus.request_read(Erd::new(0x2000)).unwrap_err(),
            TransportError::Timeout
        );
        assert_eq!(
            bus.request_write(Erd::new(0x2000), &[0x01]).unwrap_err(),
            TransportError::Timeout
        );
        assert_eq!(bus.get(0x2000), Some(vec![0x00]));
    }
}
