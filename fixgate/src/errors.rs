//! §7 error handling design: every unrecoverable condition a component
//! cannot resolve as a state transition funnels through one
//! [`ErrorHandler`] handle rather than an ambient global.

use fixgate_core::GatewayError;
use tracing::error;

pub trait ErrorHandler: Send + Sync {
    fn on_error(&self, component: &str, err: &GatewayError);
}

/// Default handler: logs through `tracing` at `error` level. Sufficient
/// for a standalone gateway process; a clustered deployment would swap
/// this for one that also raises an alert, without touching call sites.
#[derive(Default)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn on_error(&self, component: &str, err: &GatewayError) {
        error!(component, %err, "unrecoverable error");
    }
}
