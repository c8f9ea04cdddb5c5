//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements | Connects to        |
//! |------------|------------|--------------------|
//! | `log_sink` | EventSink  | Serial / stderr log|

pub mod log_sink;
