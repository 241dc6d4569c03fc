use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub assignment_latency_seconds: HistogramVec,
    pub events_published_total: IntCounterVec,
    pub commit_conflicts_total: IntCounter,
    pub telemetry_samples_total: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Assignment attempts by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let assignment_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "assignment_latency_seconds",
                "Latency of assignment units of work in seconds",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let events_published_total = IntCounterVec::new(
            Opts::new("events_published_total", "Published domain events by kind"),
            &["kind"],
        )
        .expect("valid events_published_total metric");

        let commit_conflicts_total = IntCounter::new(
            "commit_conflicts_total",
            "Commits rejected because an aggregate version moved",
        )
        .expect("valid commit_conflicts_total metric");

        let telemetry_samples_total =
            IntCounter::new("telemetry_samples_total", "Telemetry samples ingested")
                .expect("valid telemetry_samples_total metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(events_published_total.clone()))
            .expect("register events_published_total");
        registry
            .register(Box::new(commit_conflicts_total.clone()))
            .expect("register commit_conflicts_total");
        registry
            .register(Box::new(telemetry_samples_total.clone()))
            .expect("register telemetry_samples_total");

        Self {
            registry,
            assignments_total,
            assignment_latency_seconds,
            events_published_total,
            commit_conflicts_total,
            telemetry_samples_total,
        }
    }

    pub fn record_assignment(&self, outcome: &str, elapsed_secs: f64) {
        self.assignment_latency_seconds
            .with_label_values(&[outcome])
            .observe(elapsed_secs);
        self.assignments_total.with_label_values(&[outcome]).inc();
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
