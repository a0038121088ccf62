//! Action compiler: dependency-closure scheduling of decode steps
//!
//! Compiles one function's descriptors into two ordered action lists. Entry
//! actions depend only on values available at call entry; everything that
//! needs the exit window (outputs, the return value, or anything conditioned
//! on them) lands in the exit list. Scheduling is a fixed-point rescan over a
//! growing satisfied-name set with declaration order as the tie-break, so a
//! given schema always compiles to the same action order. The `$out`
//! sentinel inserted between the two passes marks the crossing into the exit
//! window, letting one closure routine serve both.

use std::collections::HashSet;

use crate::descriptor::{
    ArgumentDescriptor, Condition, FunctionSpec, ParamBinding, OUT_SENTINEL, RESULT_NAME,
};
use crate::error::{CompileError, DecodeFailure};
use crate::event::Event;
use crate::memory::MemoryReader;
use crate::value::{ParamValues, RawWord, ValueType};

/// One compiled decode step.
///
/// Closes over everything it needs (position, output name, type, binding
/// and condition data), copied out of the descriptor, so later schema
/// mutation cannot affect a compiled list. Running an action never mutates
/// the action itself.
#[derive(Debug, Clone)]
pub struct Action {
    position: usize,
    name: String,
    value_type: ValueType,
    binding: Option<ParamBinding>,
    condition: Option<Condition>,
}

impl Action {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index into the captured raw words (the return word sits at
    /// `arg_count`).
    pub fn position(&self) -> usize {
        self.position
    }

    /// Decode this action's raw word into the event.
    ///
    /// A condition whose source is absent, or whose predicate is false,
    /// skips the decode entirely: the field is omitted, not defaulted.
    pub fn run(
        &self,
        raw: &[RawWord],
        event: &mut Event,
        mem: &dyn MemoryReader,
    ) -> Result<(), DecodeFailure> {
        if let Some(condition) = &self.condition {
            match event.get(&condition.source) {
                Some(value) if (condition.predicate)(value) => {}
                _ => return Ok(()),
            }
        }

        let mut params = ParamValues::default();
        if let Some(binding) = &self.binding {
            let value = event
                .get(&binding.source)
                .ok_or_else(|| DecodeFailure::MissingSource(binding.source.clone()))?;
            params.bind(binding.parameter.clone(), value.clone());
        }

        let word = raw
            .get(self.position)
            .copied()
            .ok_or(DecodeFailure::RawValueUnavailable(self.position))?;
        let value = self.value_type.parse(word, &params, mem)?;
        event.set(&self.name, value);
        Ok(())
    }
}

/// Entry and exit action lists for one function. Built once at setup,
/// immutable afterwards, shared read-only across threads.
#[derive(Debug, Clone, Default)]
pub struct CompiledActions {
    pub entry: Vec<Action>,
    pub exit: Vec<Action>,
}

impl CompiledActions {
    pub fn len(&self) -> usize {
        self.entry.len() + self.exit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty() && self.exit.is_empty()
    }
}

/// Compile one function schema into ordered entry/exit actions.
///
/// Fails on duplicate or reserved argument names, on dependencies naming
/// undeclared values, and on circular dependencies (descriptors left
/// unsatisfiable after both windows converge).
pub fn compile(spec: &FunctionSpec) -> Result<CompiledActions, CompileError> {
    // (position, descriptor) in declaration order, return value last.
    let mut descriptors: Vec<(usize, &ArgumentDescriptor)> =
        spec.args().iter().enumerate().collect();
    if let Some(ret) = spec.ret() {
        descriptors.push((spec.arg_count(), ret));
    }

    validate_names(spec, &descriptors)?;

    let mut satisfied: HashSet<&str> = HashSet::new();
    let mut scheduled = vec![false; descriptors.len()];
    let mut actions = CompiledActions::default();

    close_over(&descriptors, &mut satisfied, &mut scheduled, &mut actions.entry)?;
    // Entry window exhausted; outputs and the return value are now in scope.
    satisfied.insert(OUT_SENTINEL);
    close_over(&descriptors, &mut satisfied, &mut scheduled, &mut actions.exit)?;

    let unresolved: Vec<String> = descriptors
        .iter()
        .zip(&scheduled)
        .filter(|(_, done)| !**done)
        .map(|((_, d), _)| d.name.clone())
        .collect();
    if !unresolved.is_empty() {
        return Err(CompileError::CircularDependency { unresolved });
    }

    tracing::debug!(
        function = spec.name(),
        entry = actions.entry.len(),
        exit = actions.exit.len(),
        "compiled decode actions"
    );
    Ok(actions)
}

fn validate_names(
    spec: &FunctionSpec,
    descriptors: &[(usize, &ArgumentDescriptor)],
) -> Result<(), CompileError> {
    // Only the synthetic return descriptor may carry the reserved name.
    if spec.args().iter().any(|d| d.name == RESULT_NAME) {
        return Err(CompileError::ReservedName);
    }
    // A `$`-prefixed name would satisfy the scheduler's sentinels from
    // inside the schema: a descriptor named `$out` unlocks every output at
    // entry time once it schedules.
    if let Some((_, descriptor)) = descriptors.iter().find(|(_, d)| d.name.starts_with('$')) {
        return Err(CompileError::SentinelName(descriptor.name.clone()));
    }
    let mut seen: HashSet<&str> = HashSet::new();
    for (_, descriptor) in descriptors {
        let name = descriptor.name.as_str();
        if !seen.insert(name) {
            return Err(CompileError::DuplicateName(name.to_string()));
        }
    }
    for (_, descriptor) in descriptors {
        for dependency in descriptor.requires() {
            if dependency != OUT_SENTINEL && !seen.contains(dependency) {
                return Err(CompileError::UnknownSource {
                    name: descriptor.name.clone(),
                    dependency: dependency.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// One fixed-point pass: rescan unscheduled descriptors in declaration order,
/// appending each as soon as its requirements are all satisfied, until a full
/// scan adds nothing. Each productive scan schedules at least one descriptor,
/// so `count + 1` scans always suffice; the ceiling converts an unexpected
/// runaway into a compile error.
fn close_over<'a>(
    descriptors: &[(usize, &'a ArgumentDescriptor)],
    satisfied: &mut HashSet<&'a str>,
    scheduled: &mut [bool],
    out: &mut Vec<Action>,
) -> Result<(), CompileError> {
    let ceiling = descriptors.len() + 1;
    for _ in 0..ceiling {
        let mut progress = false;
        for (i, (position, descriptor)) in descriptors.iter().enumerate() {
            if scheduled[i] {
                continue;
            }
            if !descriptor
                .requires()
                .iter()
                .all(|name| satisfied.contains(name))
            {
                continue;
            }
            out.push(Action {
                position: *position,
                name: descriptor.name.clone(),
                value_type: descriptor.value_type.clone(),
                binding: descriptor.binding.clone(),
                condition: descriptor.condition.clone(),
            });
            scheduled[i] = true;
            satisfied.insert(descriptor.name.as_str());
            progress = true;
        }
        if !progress {
            return Ok(());
        }
    }
    Err(CompileError::ScanCeiling(ceiling))
}
