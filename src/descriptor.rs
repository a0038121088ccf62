//! Declarative argument descriptors and function schemas
//!
//! A descriptor names one logical value of a call, an argument or the
//! return value, with its direction, its type, an optional presence
//! condition, and an optional runtime type-parameter binding. Schemas are
//! pure data; all scheduling happens in [`crate::compiler`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::value::{DecodedValue, ValueType, LENGTH_PARAM};

/// Reserved name of the synthetic return-value descriptor.
pub const RESULT_NAME: &str = "result";

/// Sentinel dependency meaning "all exit-time values are now available".
pub(crate) const OUT_SENTINEL: &str = "$out";

/// Which time window a value becomes meaningful in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Readable at call entry.
    In,
    /// Meaningful only after the callee returns.
    Out,
    /// Readable at entry, rewritten by the callee.
    InOut,
}

/// Presence condition: decode this value only if `predicate` holds for the
/// already-decoded value named `source`.
#[derive(Clone)]
pub struct Condition {
    pub source: String,
    pub predicate: Arc<dyn Fn(&DecodedValue) -> bool + Send + Sync>,
}

impl Condition {
    pub fn new(
        source: impl Into<String>,
        predicate: impl Fn(&DecodedValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: source.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Runtime type-parameter binding: `parameter` is supplied from the decoded
/// value named `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    pub parameter: String,
    pub source: String,
}

/// Declarative spec for one argument or the return value.
#[derive(Debug, Clone)]
pub struct ArgumentDescriptor {
    pub name: String,
    pub direction: Direction,
    pub value_type: ValueType,
    pub binding: Option<ParamBinding>,
    pub condition: Option<Condition>,
}

impl ArgumentDescriptor {
    fn new(name: impl Into<String>, direction: Direction, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            direction,
            value_type,
            binding: None,
            condition: None,
        }
    }

    /// An argument the caller supplies; decoded at call entry.
    pub fn input(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, Direction::In, value_type)
    }

    /// An argument the callee fills in; decoded at call exit.
    pub fn output(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, Direction::Out, value_type)
    }

    /// An argument both sides touch; decoded at call exit.
    pub fn in_out(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, Direction::InOut, value_type)
    }

    /// The synthetic return-value descriptor.
    pub fn result(value_type: ValueType) -> Self {
        Self::new(RESULT_NAME, Direction::Out, value_type)
    }

    /// Decode this value only when `predicate` holds for the decoded value
    /// named `source`; otherwise omit it from the event entirely.
    pub fn when(
        mut self,
        source: impl Into<String>,
        predicate: impl Fn(&DecodedValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.condition = Some(Condition::new(source, predicate));
        self
    }

    /// Take this value's `length` type parameter from the decoded value
    /// named `source`.
    pub fn with_length_from(mut self, source: impl Into<String>) -> Self {
        self.binding = Some(ParamBinding {
            parameter: LENGTH_PARAM.to_string(),
            source: source.into(),
        });
        self
    }

    /// Names that must be satisfied before this value can decode: the exit
    /// sentinel for non-input directions, plus any binding/condition source.
    pub(crate) fn requires(&self) -> BTreeSet<&str> {
        let mut set = BTreeSet::new();
        if self.direction != Direction::In {
            set.insert(OUT_SENTINEL);
        }
        if let Some(binding) = &self.binding {
            set.insert(binding.source.as_str());
        }
        if let Some(condition) = &self.condition {
            set.insert(condition.source.as_str());
        }
        set
    }
}

/// Ordered argument descriptors of one function, plus an optional return
/// descriptor. Argument position is declaration order; the return value
/// occupies the extra slot appended at call exit.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    name: String,
    args: Vec<ArgumentDescriptor>,
    ret: Option<ArgumentDescriptor>,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            ret: None,
        }
    }

    /// Append one argument descriptor; position is declaration order.
    pub fn arg(mut self, descriptor: ArgumentDescriptor) -> Self {
        self.args.push(descriptor);
        self
    }

    /// Declare the return value, optionally conditioned/bound like any
    /// other Out descriptor.
    pub fn returns(mut self, value_type: ValueType) -> Self {
        self.ret = Some(ArgumentDescriptor::result(value_type));
        self
    }

    /// Declare the return value from a pre-built descriptor. The name is
    /// forced to `result` regardless of what was passed in.
    pub fn returns_descriptor(mut self, mut descriptor: ArgumentDescriptor) -> Self {
        descriptor.name = RESULT_NAME.to_string();
        descriptor.direction = Direction::Out;
        self.ret = Some(descriptor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of argument slots (the return slot is not counted).
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[ArgumentDescriptor] {
        &self.args
    }

    pub fn ret(&self) -> Option<&ArgumentDescriptor> {
        self.ret.as_ref()
    }

    /// Total descriptor count including the return value.
    pub fn descriptor_count(&self) -> usize {
        self.args.len() + usize::from(self.ret.is_some())
    }
}
