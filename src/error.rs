//! Error taxonomy for trace setup and per-call decoding
//!
//! Setup-time failures (resolution, schema compilation) are per-target and
//! non-fatal: the offending target is skipped and reported through the error
//! callback. Configuration errors abort setup before any hook is installed.
//! Decode failures are per-call and abort delivery of only that call's event.

use thiserror::Error;

use crate::value::{Address, DecodedValue};

/// Compile-time failure of one function's argument schema.
///
/// A schema that fails to compile is never hooked.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The dependency closure converged with these descriptors still
    /// unsatisfiable (declaration order preserved).
    #[error("circular dependency among arguments {unresolved:?}")]
    CircularDependency { unresolved: Vec<String> },

    /// Two descriptors share a name within one function schema.
    #[error("duplicate argument name `{0}`")]
    DuplicateName(String),

    /// `result` names the synthetic return-value descriptor only.
    #[error("`result` is reserved for the return value")]
    ReservedName,

    /// A condition or type-parameter binding references a name that no
    /// descriptor in the schema declares.
    #[error("`{name}` depends on `{dependency}`, which is not declared")]
    UnknownSource { name: String, dependency: String },

    /// `$`-prefixed names are reserved for internal scheduling sentinels.
    #[error("argument name `{0}` collides with a reserved sentinel")]
    SentinelName(String),

    /// The fixed-point scan kept making progress past its ceiling. This
    /// cannot happen for a well-formed scan; the guard turns an unexpected
    /// runaway into a diagnosable error instead of a hang.
    #[error("dependency scan did not converge within {0} passes")]
    ScanCeiling(usize),
}

/// Run-time failure while decoding one value of one invocation.
#[derive(Debug, Error)]
pub enum DecodeFailure {
    /// The type needs a runtime parameter (e.g. a buffer length) that the
    /// schema never bound.
    #[error("type parameter `{0}` not bound")]
    MissingParameter(&'static str),

    /// A bound parameter decoded to something unusable as a length.
    #[error("type parameter `{parameter}` must be a non-negative integer, got {value}")]
    BadParameter {
        parameter: &'static str,
        value: DecodedValue,
    },

    /// A binding source was never decoded into the event.
    #[error("dependency `{0}` is absent from the event")]
    MissingSource(String),

    /// The captured raw words do not cover this action's position.
    #[error("no raw value captured at position {0}")]
    RawValueUnavailable(usize),

    /// The external memory-read collaborator failed.
    #[error("memory read at {address:#x} failed: {source}")]
    MemoryRead {
        address: Address,
        #[source]
        source: anyhow::Error,
    },
}

/// Top-level error channel for a trace session.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Export lookup found nothing; only this function is skipped.
    #[error("`{module}!{function}`: export not found")]
    Resolution { module: String, function: String },

    /// A vtable slot could not be read; the remaining walk is aborted.
    #[error("vtable slot read at {address:#x} failed: {source}")]
    VtableRead {
        address: Address,
        #[source]
        source: anyhow::Error,
    },

    /// One function's schema failed to compile; that function is never hooked.
    #[error("schema for `{function}` failed to compile: {source}")]
    SchemaCompile {
        function: String,
        #[source]
        source: CompileError,
    },

    /// Neither a module nor a vtable locator was configured. Fatal.
    #[error("no trace target configured: set either a module or a vtable base")]
    MissingTarget,

    /// Both locators were configured; the modes are mutually exclusive. Fatal.
    #[error("ambiguous trace target: module and vtable locators are mutually exclusive")]
    AmbiguousTarget,

    /// The interception mechanism refused the hook; only this target is skipped.
    #[error("hook attach at {address:#x} failed: {source}")]
    Attach {
        address: Address,
        #[source]
        source: anyhow::Error,
    },

    /// Decoding one value of one in-flight call failed; that event is not
    /// delivered, the hook stays attached.
    #[error("decoding `{field}` of `{function}` failed: {source}")]
    Decode {
        function: String,
        field: String,
        #[source]
        source: DecodeFailure,
    },
}
