use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub deliveries_created_total: IntCounterVec,
    pub status_updates_total: IntCounterVec,
    pub assignment_latency_seconds: HistogramVec,
    pub registrations_total: IntCounterVec,
    pub available_drivers: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let deliveries_created_total = IntCounterVec::new(
            Opts::new(
                "deliveries_created_total",
                "Deliveries created, by initial status",
            ),
            &["outcome"],
        )
        .expect("valid deliveries_created_total metric");

        let status_updates_total = IntCounterVec::new(
            Opts::new("status_updates_total", "Status updates by target status"),
            &["status"],
        )
        .expect("valid status_updates_total metric");

        let assignment_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "assignment_latency_seconds",
                "Time spent selecting and claiming a driver",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let registrations_total = IntCounterVec::new(
            Opts::new("registrations_total", "Accounts registered by role"),
            &["role"],
        )
        .expect("valid registrations_total metric");

        let available_drivers = IntGauge::new(
            "available_drivers",
            "Drivers currently available and verified",
        )
        .expect("valid available_drivers metric");

        registry
            .register(Box::new(deliveries_created_total.clone()))
            .expect("register deliveries_created_total");
        registry
            .register(Box::new(status_updates_total.clone()))
            .expect("register status_updates_total");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(registrations_total.clone()))
            .expect("register registrations_total");
        registry
            .register(Box::new(available_drivers.clone()))
            .expect("register available_drivers");

        Self {
            registry,
            deliveries_created_total,
            status_updates_total,
            assignment_latency_seconds,
            registrations_total,
            available_drivers,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
