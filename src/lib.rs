//! Detrace - declarative call tracer
//!
//! Describe a native function's signature (or a vtable slot layout) and a
//! typed schema for its arguments and return value; the engine compiles the
//! schema into entry/exit decode actions, intercepts every invocation
//! through a host-supplied mechanism, decodes the raw call words into a
//! structured event, and hands the event to a consumer.

pub mod binder;
pub mod compiler;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod memory;
pub mod resolver;
pub mod value;
