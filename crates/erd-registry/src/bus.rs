//! Appliance lifecycle hooks.
//!
//! Plugins register an [`ApplianceHook`] and are called back when an appliance
//! announces itself or when one is created by kind. Hooks typically bind a
//! [`crate::FieldRegistry`] and [`ApplianceBus::emit`] a kind-specific event.

use crate::error::Result;
use crate::host::Appliance;
use crate::metrics::ErdMetrics;
use erd_transport::ErdTransport;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

/// An appliance published under `kind` by a hook.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub kind: String,
    pub appliance: Appliance,
}

pub trait ApplianceHook: Send + Sync {
    /// An appliance appeared on the bus.
    fn on_announced(&self, _bus: &ApplianceBus, _appliance: &mut Appliance) -> Result<()> {
        Ok(())
    }

    /// An appliance of `kind` was created explicitly.
    fn on_created(&self, _kind: &str, _appliance: &mut Appliance) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct ApplianceBus {
    hooks: RwLock<Vec<Arc<dyn ApplianceHook>>>,
    subscribers: Mutex<Vec<Sender<BusEvent>>>,
    metrics: Option<ErdMetrics>,
}

impl ApplianceBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `metrics` to every appliance this bus creates, and to announced
    /// appliances that carry none of their own.
    pub fn with_metrics(mut self, metrics: ErdMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn register(&self, hook: Arc<dyn ApplianceHook>) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    pub fn subscribe(&self) -> Receiver<BusEvent> {
        let (tx, rx) = channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Publish `appliance` under `kind`. Dropped subscribers are pruned.
    pub fn emit(&self, kind: &str, appliance: &Appliance) {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subs.retain(|tx| {
            tx.send(BusEvent {
                kind: kind.to_string(),
                appliance: appliance.clone(),
            })
            .is_ok()
        });
        info!(kind, appliance = appliance.name(), subscribers = subs.len(), "event emitted");
    }

    /// Run every hook's `on_announced` over `appliance` and hand it back.
    pub fn announce(&self, mut appliance: Appliance) -> Result<Appliance> {
        debug!(appliance = appliance.name(), "appliance announced");
        if appliance.metrics().is_none() {
            if let Some(m) = &self.metrics {
                appliance = appliance.with_metrics(m.clone());
            }
        }
        for hook in self.hooks() {
            hook.on_announced(self, &mut appliance)?;
        }
        Ok(appliance)
    }

    /// Build an appliance of `kind` on `transport` and run every hook's
    /// `on_created` over it.
    pub fn create(&self, kind: &str, transport: Arc<dyn ErdTransport>) -> Result<Appliance> {
        let mut appliance = Appliance::new(kind, transport);
        if let Some(m) = &self.metrics {
            appliance = appliance.with_metrics(m.clone());
        }
        for hook in self.hooks() {
            hook.on_created(kind, &mut appliance)?;
        }
        debug!(kind, fields = appliance.fields().count(), "appliance created");
        Ok(appliance)
    }

    // Snapshot so hooks may call back into the bus without holding the lock.
    fn hooks(&self) -> Vec<Arc<dyn ApplianceHook>> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
