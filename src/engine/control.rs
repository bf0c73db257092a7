use anyhow::Result;
use core::future::Future;
use core::pin::Pin;
use tokio_util::sync::CancellationToken;

pub type ControlFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Control surface the orchestrator drives on the external engine.
pub trait EngineControl: Send + 'static {
    /// Asks the engine to wind down. The engine answers later with a
    /// `stop-acknowledged` (or `completed`) event on its stream.
    fn request_stop(&mut self) -> ControlFuture<'_>;
}

/// Engine control backed by a [`CancellationToken`] the engine task observes.
#[derive(Debug, Clone, Default)]
pub struct CancellationControl {
    token: CancellationToken,
}

impl CancellationControl {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl EngineControl for CancellationControl {
    fn request_stop(&mut self) -> ControlFuture<'_> {
        self.token.cancel();
        Box::pin(async { Ok(()) })
    }
}
