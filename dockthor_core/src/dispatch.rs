/**
 * Detached submission seam.
 *
 * Integrations that must never wait on delivery (the request span
 * collector, the panic hook) talk to this trait instead of to `Client`
 * directly. Implementations schedule the work and return immediately;
 * the outcome is never reported back.
 */
use crate::protocol::exception::Exception;
use crate::protocol::span::Span;

pub trait Dispatch: Send + Sync {
    /// Schedules an exception capture.
    fn dispatch_exception(&self, exception: Exception);

    /// Schedules a transaction named `name` carrying `spans`.
    fn dispatch_transaction(&self, name: String, spans: Vec<Span>);
}

impl<D: Dispatch + ?Sized> Dispatch for std::sync::Arc<D> {
    fn dispatch_exception(&self, exception: Exception) {
        (**self).dispatch_exception(exception)
    }

    fn dispatch_transaction(&self, name: String, spans: Vec<Span>) {
        (**self).dispatch_transaction(name, spans)
    }
}
