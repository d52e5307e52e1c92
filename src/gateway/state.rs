use crate::transfer::TransferEngine;

/// Gateway application state (shared)
///
/// The store handle lives inside the engine; handlers never reach a store
/// any other way.
#[derive(Clone)]
pub struct AppState {
    pub engine: TransferEngine,
}

impl AppState {
    pub fn new(engine: TransferEngine) -> Self {
        Self { engine }
    }
}
