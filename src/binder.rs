//! Interception binder: runs compiled actions around each call
//!
//! One [`FunctionHook`] per bound address. The host interception mechanism
//! calls [`CallListener::enter`] before the target body runs and
//! [`CallListener::exit`] after it returns, handing the per-invocation
//! [`Invocation`] record back by ownership so nested and concurrent calls
//! can never share in-flight state. The hook itself holds only immutable
//! shared data and is safe to invoke from any thread.

use std::sync::Arc;

use crate::compiler::CompiledActions;
use crate::descriptor::FunctionSpec;
use crate::error::TraceError;
use crate::event::Event;
use crate::memory::MemoryReader;
use crate::value::{Address, RawWord};

/// Private state of one in-flight call, created at entry and consumed at
/// exit. The host correlates the entry/exit pair of one invocation; this
/// record is never stored in a shared slot.
#[derive(Debug)]
pub struct Invocation {
    values: Vec<RawWord>,
    event: Event,
    failed: bool,
}

impl Invocation {
    /// Raw words captured so far (arguments; plus the return word at exit).
    pub fn raw_values(&self) -> &[RawWord] {
        &self.values
    }

    pub fn event(&self) -> &Event {
        &self.event
    }
}

/// Entry/exit pair the interception mechanism drives for one address.
pub trait CallListener: Send + Sync {
    /// Runs on the invoking thread before the target body executes.
    fn enter(&self, raw_args: &[RawWord]) -> Invocation;

    /// Runs on the invoking thread after the target returns, exactly once
    /// per `enter`, with that invocation's own state.
    fn exit(&self, invocation: Invocation, raw_return: RawWord);
}

/// Host interception mechanism.
pub trait Interceptor: Send + Sync {
    /// Install a listener at `address`; `enter` fires before the call body,
    /// `exit` after it returns, on the invoking thread.
    fn attach(&self, address: Address, listener: Arc<dyn CallListener>) -> anyhow::Result<()>;

    /// Stop intercepting `address`. Must be safe between invocations; an
    /// in-flight entry/exit pair still completes.
    fn detach(&self, address: Address) -> anyhow::Result<()>;
}

/// User-facing callbacks of one trace session.
pub struct Callbacks {
    /// Receives each finished event exactly once.
    pub on_event: Box<dyn Fn(Event) + Send + Sync>,
    /// Receives every setup and per-call error; nothing is silently dropped.
    pub on_error: Box<dyn Fn(TraceError) + Send + Sync>,
    /// Runs after entry actions, before the call body. May mutate the event.
    pub on_enter: Option<Box<dyn Fn(&mut Event, &[RawWord]) + Send + Sync>>,
    /// Runs after exit actions, before delivery. May mutate the event.
    pub on_leave: Option<Box<dyn Fn(&mut Event, RawWord) + Send + Sync>>,
}

impl Callbacks {
    pub fn new(
        on_event: impl Fn(Event) + Send + Sync + 'static,
        on_error: impl Fn(TraceError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_event: Box::new(on_event),
            on_error: Box::new(on_error),
            on_enter: None,
            on_leave: None,
        }
    }

    pub fn on_enter(mut self, hook: impl Fn(&mut Event, &[RawWord]) + Send + Sync + 'static) -> Self {
        self.on_enter = Some(Box::new(hook));
        self
    }

    pub fn on_leave(mut self, hook: impl Fn(&mut Event, RawWord) + Send + Sync + 'static) -> Self {
        self.on_leave = Some(Box::new(hook));
        self
    }
}

/// Compiled listener for one function: captures raw words, runs the entry
/// and exit action lists, invokes user hooks, and delivers the event.
pub struct FunctionHook {
    name: String,
    arg_count: usize,
    actions: Arc<CompiledActions>,
    memory: Arc<dyn MemoryReader>,
    callbacks: Arc<Callbacks>,
}

impl FunctionHook {
    pub fn new(
        spec: &FunctionSpec,
        actions: Arc<CompiledActions>,
        memory: Arc<dyn MemoryReader>,
        callbacks: Arc<Callbacks>,
    ) -> Self {
        Self {
            name: spec.name().to_string(),
            arg_count: spec.arg_count(),
            actions,
            memory,
            callbacks,
        }
    }

    /// Report a decode failure for one field of one in-flight call.
    fn report(&self, field: &str, failure: crate::error::DecodeFailure) {
        (self.callbacks.on_error)(TraceError::Decode {
            function: self.name.clone(),
            field: field.to_string(),
            source: failure,
        });
    }
}

impl CallListener for FunctionHook {
    fn enter(&self, raw_args: &[RawWord]) -> Invocation {
        let mut invocation = Invocation {
            values: raw_args.iter().copied().take(self.arg_count).collect(),
            event: Event::new(&self.name),
            failed: false,
        };

        for action in &self.actions.entry {
            if let Err(failure) =
                action.run(&invocation.values, &mut invocation.event, self.memory.as_ref())
            {
                self.report(action.name(), failure);
                // Poison the invocation: exit still pairs up but nothing
                // more is decoded and the partial event is not delivered.
                invocation.failed = true;
                return invocation;
            }
        }

        if let Some(hook) = &self.callbacks.on_enter {
            hook(&mut invocation.event, &invocation.values);
        }
        invocation
    }

    fn exit(&self, mut invocation: Invocation, raw_return: RawWord) {
        invocation.values.push(raw_return);
        if invocation.failed {
            return;
        }

        for action in &self.actions.exit {
            if let Err(failure) =
                action.run(&invocation.values, &mut invocation.event, self.memory.as_ref())
            {
                self.report(action.name(), failure);
                return;
            }
        }

        if let Some(hook) = &self.callbacks.on_leave {
            hook(&mut invocation.event, raw_return);
        }
        (self.callbacks.on_event)(invocation.event);
    }
}
