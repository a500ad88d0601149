//! Shared application state

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use chatflow_config::Settings;
use chatflow_engine::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub settings: Settings,
    pub prometheus: PrometheusHandle,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, settings: Settings, prometheus: PrometheusHandle) -> Self {
        Self {
            engine,
            settings,
            prometheus,
        }
    }
}
