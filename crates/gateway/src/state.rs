use inference::InferenceService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<InferenceService>,
}

impl AppState {
    pub fn new(service: InferenceService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
