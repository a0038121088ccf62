//! Decoded call event
//!
//! One [`Event`] is created per invocation, filled by the compiled decode
//! actions (and optionally by user hooks), then handed to the sink exactly
//! once. Field insertion order is the compiled action order, so it is stable
//! across runs for a given schema.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::descriptor::RESULT_NAME;
use crate::value::DecodedValue;

/// Structured record of one intercepted call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Function name from the schema.
    pub name: String,
    /// Decoded argument fields in decode order.
    args: Vec<(String, DecodedValue)>,
    /// Decoded return value, if the schema declared one.
    pub result: Option<DecodedValue>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            result: None,
        }
    }

    /// Set a field, routing `result` to the return-value slot.
    ///
    /// Re-setting an existing field overwrites it in place, preserving its
    /// original position.
    pub fn set(&mut self, name: &str, value: DecodedValue) {
        if name == RESULT_NAME {
            self.result = Some(value);
            return;
        }
        if let Some(slot) = self.args.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.args.push((name.to_string(), value));
        }
    }

    /// Look up a field by name; `result` reads the return-value slot.
    pub fn get(&self, name: &str) -> Option<&DecodedValue> {
        if name == RESULT_NAME {
            return self.result.as_ref();
        }
        self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Argument fields in decode order (the return value is not included).
    pub fn args(&self) -> impl Iterator<Item = (&str, &DecodedValue)> {
        self.args.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of decoded argument fields.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }
}

impl fmt::Display for Event {
    /// strace-like rendering: `name(a=5, b="x") = 0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, (name, value)) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, ")")?;
        if let Some(result) = &self.result {
            write!(f, " = {result}")?;
        }
        Ok(())
    }
}
