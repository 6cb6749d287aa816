//! Query batching.

mod coalescer;

pub use coalescer::{BatchCoalescer, ResultCache, DEFAULT_DEBOUNCE};
