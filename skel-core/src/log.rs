//! Per-component logging context.
//!
//! Components receive a [`LogContext`] when they are built instead of
//! reaching for a process global. The context is a `tracing` span carrying
//! the component name and, once known, the remote sample id; the sink and
//! level are chosen by whoever installs the subscriber.

use tracing::Span;

use crate::types::SampleId;

#[derive(Debug, Clone)]
pub struct LogContext {
    span: Span,
}

impl LogContext {
    /// Root context for a process or a test.
    pub fn root(component: &'static str) -> Self {
        Self {
            span: tracing::info_span!("skelenox", component, sample = tracing::field::Empty),
        }
    }

    /// Child context for a sub-component.
    pub fn child(&self, component: &'static str) -> Self {
        Self {
            span: tracing::info_span!(parent: &self.span, "component", component),
        }
    }

    /// A context that records nothing.
    pub fn disabled() -> Self {
        Self {
            span: Span::none(),
        }
    }

    /// Attach the sample id once the session resolved it.
    pub fn record_sample(&self, sample: SampleId) {
        self.span.record("sample", sample.0);
    }

    /// Run `f` with the context entered so every event inside is tagged.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.span.in_scope(f)
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::root("skelenox")
    }
}
