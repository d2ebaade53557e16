//! Fixed-repeat generator

use stampede_core::{Request, RequestGenerator};

/// Emits the same base request forever
#[derive(Debug, Clone)]
pub struct FixedGenerator {
    request: Request,
}

impl FixedGenerator {
    /// Repeat `request`
    pub fn new(request: Request) -> Self {
        Self { request }
    }
}

impl RequestGenerator for FixedGenerator {
    fn name(&self) -> &str {
        "fixed"
    }

    fn next_request(&mut self) -> Option<Request> {
        Some(self.request.clone())
    }
}
