use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct ErdMetrics {
    pub reads: IntCounter,
    pub writes: IntCounter,
    pub errors: IntCounter,
    pub fields_bound: IntGauge,
}

impl ErdMetrics {
    pub(crate) fn record_read(&self, ok: bool) {
        self.reads.inc();
        if !ok {
            self.errors.inc();
        }
    }

    pub(crate) fn record_write(&self, ok: bool) {
        self.writes.inc();
        if !ok {
            self.errors.inc();
        }
    }
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub erd: ErdMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let reads = IntCounter::new("erd_reads_total", "Total ERD read requests")?;
        let writes = IntCounter::new("erd_writes_total", "Total ERD write requests")?;
        let errors = IntCounter::new("erd_errors_total", "ERD requests that failed")?;
        let fields_bound = IntGauge::new("erd_fields_bound", "Field accessors bound to appliances")?;
        let erd = ErdMetrics {
            reads,
            writes,
            errors,
            fields_bound,
        };
        registry.register(Box::new(erd.reads.clone()))?;
        registry.register(Box::new(erd.writes.clone()))?;
        registry.register(Box::new(erd.errors.clone()))?;
        registry.register(Box::new(erd.fields_bound.clone()))?;
        Ok(Self { registry, erd })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
