//! Instrumentation hooks for decoding and selection.
//!
//! Library code logs through `trace_span!`, `trace_event!` and `trace_warn!`
//! only. Builds with the `tracing` feature record anchor counts, decoded
//! instances and kept detections; default builds keep the call sites but emit
//! nothing.

/// Span named after the public entry point it wraps (`decode_boxes`,
/// `select_top_k_with_nms`), with the layer sizes as fields.
///
/// Without `tracing` the fields are dropped and a [`NoopSpan`] is returned.
#[cfg(feature = "tracing")]
macro_rules! trace_span {
    ($name:expr $(, $($field:tt)*)?) => {
        tracing::info_span!($name $(, $($field)*)?)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_span {
    ($name:expr $(, $($field:tt)*)?) => {
        $crate::trace::NoopSpan
    };
}

/// Debug event with the counts one call produced, e.g. `kept = out.len()`.
#[cfg(feature = "tracing")]
macro_rules! trace_event {
    ($name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        tracing::debug!(name: $name, $($key = $value),+)
    };
    ($name:expr) => {
        tracing::debug!(name: $name)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_event {
    ($name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        let _ = ($($value,)+);
    };
    ($name:expr) => {};
}

/// Warning for a layer configuration that is accepted but probably unintended,
/// such as a `max_size` that does not exceed `min_size`.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)+) => {
        tracing::warn!($($arg)+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)+) => {};
}

pub(crate) use trace_event;
pub(crate) use trace_span;
pub(crate) use trace_warn;

/// Guard held by `let _span = trace_span!(..).entered();` in default builds.
#[cfg(not(feature = "tracing"))]
pub(crate) struct NoopSpan;

#[cfg(not(feature = "tracing"))]
impl NoopSpan {
    #[inline]
    pub(crate) fn entered(self) -> Self {
        self
    }
}
