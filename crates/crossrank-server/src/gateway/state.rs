use crossrank::{HealthReporter, RerankService};

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct HandlerState {
    pub service: RerankService,
}

impl HandlerState {
    pub fn new(service: RerankService) -> Self {
        Self { service }
    }

    pub fn health(&self) -> &HealthReporter {
        self.service.health()
    }
}
