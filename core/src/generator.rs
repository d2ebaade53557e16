//! Generation stage: drives a [`RequestGenerator`] into the request queue

use crate::request::{Request, RequestId};
use crate::traits::RequestGenerator;
use tokio_util::sync::CancellationToken;

/// Why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationEnd {
    /// The generation window was cancelled
    Cancelled,
    /// The generator ran out of requests
    Exhausted,
    /// Every downstream receiver went away
    Disconnected,
}

/// Generation stage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorStats {
    /// Requests successfully enqueued
    pub generated: u64,
    /// Reason the stage stopped
    pub end: GenerationEnd,
}

/// Run the generation stage until `cancel` fires or the generator ends
///
/// Ids are assigned in emission order starting at zero. A full queue blocks
/// the stage (flow control); cancellation is checked before each request is
/// created and while waiting to enqueue it. The queue is closed exactly once
/// when this function returns, by dropping the only sender it owns.
pub async fn generate<G>(
    generator: &mut G,
    cancel: CancellationToken,
    output: async_channel::Sender<Request>,
) -> GeneratorStats
where
    G: RequestGenerator + ?Sized,
{
    let mut generated = 0u64;

    tracing::debug!(generator = generator.name(), "Generation started");

    let end = loop {
        if cancel.is_cancelled() {
            break GenerationEnd::Cancelled;
        }

        let Some(mut request) = generator.next_request() else {
            break GenerationEnd::Exhausted;
        };
        request.id = RequestId(generated);

        tokio::select! {
            biased;

            _ = cancel.cancelled() => break GenerationEnd::Cancelled,

            sent = output.send(request) => {
                if sent.is_err() {
                    break GenerationEnd::Disconnected;
                }
                generated += 1;
            }
        }
    };

    drop(output);

    tracing::debug!(
        generator = generator.name(),
        generated,
        end = ?end,
        "Generation finished"
    );

    GeneratorStats { generated, end }
}

/// Caps any generator at a fixed number of requests
pub struct Bounded<G> {
    inner: G,
    remaining: u64,
}

impl<G: RequestGenerator> Bounded<G> {
    /// Wrap `inner`, stopping after `limit` requests
    pub fn new(inner: G, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }

    /// Requests left before exhaustion
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<G: RequestGenerator> RequestGenerator for Bounded<G> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn next_request(&mut self) -> Option<Request> {
        if self.remaining == 0 {
            return None;
        }
        let request = self.inner.next_request()?;
        self.remaining -= 1;
        Some(request)
    }
}
