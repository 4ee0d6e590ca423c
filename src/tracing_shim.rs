//! Either `tracing` or equivalent stubs that can be used in its place.
//!
//! Import logging macros from here rather than from `tracing` directly, so that call sites do not
//! each need a `#[cfg]`. The only exception is the `#[instrument]` attribute, which needs to be
//! used as `#[cfg_attr(feature = "tracing", tracing::instrument)]`.

#![allow(unused_imports, unused_macros, dead_code)]

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, error, info, trace, trace_span, warn};
#[cfg(feature = "tracing")]
pub(crate) use tracing_futures::Instrument;

#[cfg(not(feature = "tracing"))]
macro_rules! event {
    ($($x:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! event_span {
    ($($x:tt)*) => {
        ()
    };
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {
    event as debug, event as error, event as info, event as trace, event as warn,
    event_span as trace_span,
};

#[cfg(not(feature = "tracing"))]
pub(crate) trait Instrument {
    fn instrument(self, span: ()) -> Self;
}

#[cfg(not(feature = "tracing"))]
impl<T> Instrument for T {
    fn instrument(self, _: ()) -> Self {
        self
    }
}
