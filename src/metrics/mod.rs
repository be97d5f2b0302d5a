use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;

lazy_static! {
    pub static ref NOTIFICATIONS_PROCESSED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "notifications_processed",
            "Raw change notifications consumed from the feed"
        ),
        &["collection"]
    )
    .expect("Should succeed to create metric");

    pub static ref DELTAS_EMITTED: IntCounterVec = IntCounterVec::new(
        Opts::new("deltas_emitted", "Observable entity deltas produced"),
        &["kind"]
    )
    .expect("Should succeed to create metric");

    pub static ref RECONCILE_FAILURES: IntCounter = IntCounter::new(
        "reconcile_failures",
        "Notifications or fan-out owners that failed reconciliation"
    )
    .expect("Should succeed to create metric");

    pub static ref RESYNC_TOTAL: IntCounter = IntCounter::new(
        "resync_total",
        "Full resynchronization passes, including the initial one"
    )
    .expect("Should succeed to create metric");

    pub static ref ACTIVE_WATCHERS: IntGauge = IntGauge::new(
        "active_watchers",
        "Watchers currently attached to the store manager"
    )
    .expect("Should succeed to create metric");

    pub static ref REGISTRY: Registry = Registry::new();
}

pub fn register_custom_metrics() {
    REGISTRY
        .register(Box::new(NOTIFICATIONS_PROCESSED.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(DELTAS_EMITTED.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(RECONCILE_FAILURES.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(RESYNC_TOTAL.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(ACTIVE_WATCHERS.clone()))
        .expect("collector can be registered");
}
