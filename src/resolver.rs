//! Target resolution and trace setup
//!
//! Maps a trace configuration (a named module's exports or a vtable
//! layout) to concrete addresses, compiles each function's schema, and
//! binds hooks. Per-target failures (unresolved export, schema compile
//! error, unreadable vtable slot) are reported through the error callback
//! and degrade coverage; only a missing/ambiguous locator is fatal.

use std::sync::Arc;

use crate::binder::{Callbacks, FunctionHook, Interceptor};
use crate::compiler::{compile, CompiledActions};
use crate::descriptor::FunctionSpec;
use crate::error::TraceError;
use crate::memory::MemoryReader;
use crate::value::Address;

/// Export-lookup collaborator.
pub trait SymbolResolver: Send + Sync {
    /// Address of `function` exported by `module`, if present.
    fn resolve_export(&self, module: &str, function: &str) -> Option<Address>;
}

/// Trace every listed export of one named module.
pub struct ModuleTarget {
    pub name: String,
    pub functions: Vec<FunctionSpec>,
}

/// One element of a vtable layout.
pub enum VtableEntry {
    /// A slot holding an implementation pointer to hook.
    Function(FunctionSpec),
    /// Skip this many pointer-sized slots without reading memory.
    Padding(usize),
}

/// Trace implementations reached through consecutive vtable slots.
pub struct VtableTarget {
    pub base: Address,
    pub entries: Vec<VtableEntry>,
}

/// Where to find the functions to trace. Exactly one locator must be set.
#[derive(Default)]
pub struct TraceConfig {
    pub module: Option<ModuleTarget>,
    pub vtable: Option<VtableTarget>,
}

impl TraceConfig {
    pub fn module(name: impl Into<String>, functions: Vec<FunctionSpec>) -> Self {
        Self {
            module: Some(ModuleTarget {
                name: name.into(),
                functions,
            }),
            vtable: None,
        }
    }

    pub fn vtable(base: Address, entries: Vec<VtableEntry>) -> Self {
        Self {
            module: None,
            vtable: Some(VtableTarget { base, entries }),
        }
    }
}

/// A configured trace: collaborators plus the hooks installed so far.
pub struct TraceSession {
    resolver: Box<dyn SymbolResolver>,
    interceptor: Arc<dyn Interceptor>,
    memory: Arc<dyn MemoryReader>,
    callbacks: Arc<Callbacks>,
    installed: Vec<Address>,
}

impl TraceSession {
    pub fn new(
        resolver: Box<dyn SymbolResolver>,
        interceptor: Arc<dyn Interceptor>,
        memory: Arc<dyn MemoryReader>,
        callbacks: Callbacks,
    ) -> Self {
        Self {
            resolver,
            interceptor,
            memory,
            callbacks: Arc::new(callbacks),
            installed: Vec::new(),
        }
    }

    /// Addresses with hooks currently installed, in install order.
    pub fn installed(&self) -> &[Address] {
        &self.installed
    }

    /// Compile schemas, resolve addresses, and bind hooks.
    ///
    /// Returns the number of hooks installed. Per-target failures flow to
    /// the error callback; a missing or ambiguous locator returns `Err`
    /// before anything is installed.
    pub fn install(&mut self, config: TraceConfig) -> Result<usize, TraceError> {
        match (config.module, config.vtable) {
            (None, None) => Err(TraceError::MissingTarget),
            (Some(_), Some(_)) => Err(TraceError::AmbiguousTarget),
            (Some(module), None) => Ok(self.install_module(module)),
            (None, Some(vtable)) => Ok(self.install_vtable(vtable)),
        }
    }

    /// Detach every installed hook. Safe between invocations; an in-flight
    /// entry/exit pair still completes with its own state.
    pub fn detach_all(&mut self) {
        for address in self.installed.drain(..) {
            if let Err(source) = self.interceptor.detach(address) {
                tracing::warn!(address, error = %source, "failed to detach hook");
            }
        }
    }

    fn install_module(&mut self, target: ModuleTarget) -> usize {
        let mut count = 0;
        for spec in target.functions {
            let Some(actions) = self.compile_or_report(&spec) else {
                continue;
            };
            let Some(address) = self.resolver.resolve_export(&target.name, spec.name()) else {
                (self.callbacks.on_error)(TraceError::Resolution {
                    module: target.name.clone(),
                    function: spec.name().to_string(),
                });
                tracing::warn!(module = %target.name, function = spec.name(), "export not found");
                continue;
            };
            if self.bind(address, &spec, actions) {
                count += 1;
            }
        }
        count
    }

    fn install_vtable(&mut self, target: VtableTarget) -> usize {
        let width = self.memory.pointer_width();
        let mut offset: u64 = 0;
        let mut count = 0;
        for entry in target.entries {
            match entry {
                VtableEntry::Padding(slots) => {
                    offset += slots as u64 * width;
                }
                VtableEntry::Function(spec) => {
                    let slot = target.base + offset;
                    offset += width;
                    let Some(actions) = self.compile_or_report(&spec) else {
                        continue;
                    };
                    let address = match self.memory.read_pointer(slot) {
                        Ok(address) => address,
                        Err(source) => {
                            // An unreadable slot aborts the remaining walk;
                            // hooks bound so far stay in place.
                            (self.callbacks.on_error)(TraceError::VtableRead {
                                address: slot,
                                source,
                            });
                            return count;
                        }
                    };
                    if self.bind(address, &spec, actions) {
                        count += 1;
                    }
                }
            }
        }
        count
    }

    fn compile_or_report(&self, spec: &FunctionSpec) -> Option<Arc<CompiledActions>> {
        match compile(spec) {
            Ok(actions) => Some(Arc::new(actions)),
            Err(source) => {
                (self.callbacks.on_error)(TraceError::SchemaCompile {
                    function: spec.name().to_string(),
                    source,
                });
                None
            }
        }
    }

    fn bind(&mut self, address: Address, spec: &FunctionSpec, actions: Arc<CompiledActions>) -> bool {
        let hook = FunctionHook::new(spec, actions, self.memory.clone(), self.callbacks.clone());
        match self.interceptor.attach(address, Arc::new(hook)) {
            Ok(()) => {
                tracing::debug!(function = spec.name(), address, "hook installed");
                self.installed.push(address);
                true
            }
            Err(source) => {
                (self.callbacks.on_error)(TraceError::Attach { address, source });
                false
            }
        }
    }
}
