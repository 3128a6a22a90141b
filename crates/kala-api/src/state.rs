use std::sync::Arc;

use kala_collection::{KalaConfig, KalaHttp};
use kala_store::MemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub http: Arc<KalaHttp<Arc<MemoryStore>>>,
}

impl AppState {
    pub fn new(store: Arc<MemoryStore>, config: KalaConfig) -> Self {
        Self {
            http: Arc::new(KalaHttp::new(store, Arc::new(config))),
        }
    }
}
