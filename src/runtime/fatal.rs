use anyhow::Error as AnyError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Why a run left the `Running` state early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    Interrupted,
    Fatal(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Interrupted => write!(f, "operator interrupt"),
            AbortReason::Fatal(message) => write!(f, "unrecoverable fault: {message}"),
        }
    }
}

/// Cloneable handle that turns operator interrupts and unrecoverable faults into a
/// graceful-stop request for the orchestrator.
///
/// The first trigger cancels the abort token. A repeated interrupt additionally
/// cancels the force token, which skips the remaining shutdown waits.
#[derive(Clone)]
pub struct AbortTrigger {
    inner: Arc<AbortInner>,
}

struct AbortInner {
    triggered: AtomicBool,
    abort: CancellationToken,
    force: CancellationToken,
    reason: Mutex<Option<AbortReason>>,
}

impl Default for AbortTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AbortTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortTrigger")
            .field("triggered", &self.is_triggered())
            .field("forced", &self.is_forced())
            .field("reason", &self.reason())
            .finish()
    }
}

impl AbortTrigger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AbortInner {
                triggered: AtomicBool::new(false),
                abort: CancellationToken::new(),
                force: CancellationToken::new(),
                reason: Mutex::new(None),
            }),
        }
    }

    /// Operator interrupt (Ctrl-C). Escalates to a forced stop when repeated.
    pub fn interrupt(&self) {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            tracing::warn!(target: "simwatch::runtime", "interrupt received again; forcing shutdown");
            self.inner.force.cancel();
            return;
        }

        tracing::info!(target: "simwatch::runtime", "interrupt received; stopping simulation");
        self.capture(AbortReason::Interrupted);
    }

    /// Unrecoverable process-level fault. Only the first trigger is recorded.
    pub fn fatal(&self, context: &str, error: AnyError) {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            tracing::debug!(
                target: "simwatch::runtime",
                context,
                error = %error,
                "additional fatal error after abort"
            );
            return;
        }

        tracing::error!(
            target: "simwatch::runtime",
            context,
            error = %error,
            "unrecoverable fault; initiating graceful stop"
        );
        self.capture(AbortReason::Fatal(format!("{context}: {error:#}")));
    }

    fn capture(&self, reason: AbortReason) {
        {
            let mut slot = self
                .inner
                .reason
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.inner.abort.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.abort.is_cancelled()
    }

    pub fn is_forced(&self) -> bool {
        self.inner.force.is_cancelled()
    }

    pub fn reason(&self) -> Option<AbortReason> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn abort_token(&self) -> CancellationToken {
        self.inner.abort.clone()
    }

    pub fn force_token(&self) -> CancellationToken {
        self.inner.force.clone()
    }

    /// Forwards every Ctrl-C (SIGINT) to [`AbortTrigger::interrupt`] until `shutdown`
    /// is cancelled.
    pub fn spawn_signal_listener(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let trigger = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    result = signal::ctrl_c() => match result {
                        Ok(()) => trigger.interrupt(),
                        Err(err) => {
                            tracing::warn!(
                                target: "simwatch::runtime",
                                error = %err,
                                "failed to listen for Ctrl-C; interrupts will not stop the run"
                            );
                            break;
                        }
                    },
                }
            }
        })
    }

    /// Routes panics from any thread into [`AbortTrigger::fatal`] before running the
    /// previously installed hook.
    pub fn install_panic_hook(&self) {
        let trigger = self.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            trigger.fatal("panic", anyhow::anyhow!("{info}"));
            previous(info);
        }));
    }
}
