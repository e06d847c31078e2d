use tracing::info;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer();
    let subscriber = Registry::default().with(env_filter).with(fmt_layer);

    // Keep the first subscriber when initialized more than once.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn run_started(run_id: &str, topic: &str) {
    info!(
        target = "telemetry.gui",
        run_id,
        topic,
        event = "run_started"
    );
}

pub fn run_completed(run_id: &str) {
    info!(target = "telemetry.gui", run_id, event = "run_completed");
}

pub fn run_failed(run_id: &str, error: &str) {
    info!(
        target = "telemetry.gui",
        run_id,
        error,
        event = "run_failed"
    );
}
