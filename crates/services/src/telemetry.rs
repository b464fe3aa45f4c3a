use prometheus::{IntCounterVec, IntGauge, Opts, Registry};

const NAMESPACE: &str = "livecast";

/// Handles to the application metrics, registered against an explicitly
/// provided registry at boot. Cloning shares the underlying collectors.
#[derive(Clone)]
pub struct Metrics {
    session_total: IntGauge,
    service_operations: IntCounterVec,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let session_total = IntGauge::with_opts(
            Opts::new("total", "Number of active user sessions")
                .namespace(NAMESPACE)
                .subsystem("session"),
        )?;
        registry.register(Box::new(session_total.clone()))?;

        let service_operations = IntCounterVec::new(
            Opts::new("service_operations_total", "Service operation outcomes")
                .namespace(NAMESPACE),
            &["operation", "status", "reason"],
        )?;
        registry.register(Box::new(service_operations.clone()))?;

        Ok(Self {
            session_total,
            service_operations,
        })
    }

    pub fn session_started(&self) {
        self.session_total.inc();
    }

    pub fn session_closed(&self) {
        self.session_total.dec();
    }

    pub fn session_total(&self) -> i64 {
        self.session_total.get()
    }

    pub fn ice_connection_success(&self) {
        self.service_operations
            .with_label_values(&["ice_connection", "success", ""])
            .inc();
    }

    pub fn ice_connection_failed(&self, reason: &str) {
        self.service_operations
            .with_label_values(&["ice_connection", "error", reason])
            .inc();
    }
}
