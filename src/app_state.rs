use std::sync::Arc;

use crate::{analysis::AnalysisService, config::AppConfig};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub analysis: AnalysisService,
}
