//! Vtable-mode target resolution
//!
//! Slot walking with padding, partial failure on unreadable slots, and the
//! interaction between schema compile errors and slot advancement.

mod utils;

use std::sync::Arc;

use detrace::descriptor::{ArgumentDescriptor, FunctionSpec};
use detrace::error::TraceError;
use detrace::resolver::{TraceConfig, TraceSession, VtableEntry};
use detrace::value::{DecodedValue, ValueType};

use utils::{collectors, MapResolver, MockInterceptor, MockMemory};

const BASE: u64 = 0x10_0000;
const WIDTH: u64 = 8;

fn vtable_session(
    memory: MockMemory,
) -> (
    TraceSession,
    Arc<MockInterceptor>,
    Arc<std::sync::Mutex<Vec<detrace::event::Event>>>,
    Arc<std::sync::Mutex<Vec<TraceError>>>,
) {
    let (callbacks, events, errors) = collectors();
    let interceptor = Arc::new(MockInterceptor::new());
    let session = TraceSession::new(
        Box::new(MapResolver::new()),
        interceptor.clone(),
        Arc::new(memory),
        callbacks,
    );
    (session, interceptor, events, errors)
}

#[test]
fn padding_advances_the_slot_offset_without_reads() {
    let mut memory = MockMemory::new();
    // Implementation pointer lives two slots in; slots 0 and 1 are unmapped,
    // so any stray read of them would fail the walk.
    memory.map_pointer(BASE + 2 * WIDTH, 0x7000);
    let (mut session, interceptor, events, errors) = vtable_session(memory);

    let spec = FunctionSpec::new("slot2")
        .arg(ArgumentDescriptor::input("a", ValueType::Word))
        .returns(ValueType::Word);
    let installed = session
        .install(TraceConfig::vtable(
            BASE,
            vec![VtableEntry::Padding(2), VtableEntry::Function(spec)],
        ))
        .unwrap();

    assert_eq!(installed, 1);
    assert_eq!(interceptor.attached(), [0x7000]);

    interceptor.invoke(0x7000, &[11], 22);
    let events = events.lock().unwrap();
    assert_eq!(events[0].get("a"), Some(&DecodedValue::Word(11)));
    assert_eq!(events[0].result, Some(DecodedValue::Word(22)));
    assert!(errors.lock().unwrap().is_empty());
}

#[test]
fn unreadable_slot_aborts_the_walk_but_keeps_earlier_hooks() {
    let mut memory = MockMemory::new();
    memory.map_pointer(BASE, 0x7000);
    // Slot 1 unmapped; slot 2 mapped but must never be reached.
    memory.map_pointer(BASE + 2 * WIDTH, 0x9000);
    let (mut session, interceptor, _events, errors) = vtable_session(memory);

    let entries = vec![
        VtableEntry::Function(FunctionSpec::new("first").returns(ValueType::Word)),
        VtableEntry::Function(FunctionSpec::new("second").returns(ValueType::Word)),
        VtableEntry::Function(FunctionSpec::new("third").returns(ValueType::Word)),
    ];
    let installed = session.install(TraceConfig::vtable(BASE, entries)).unwrap();

    assert_eq!(installed, 1);
    assert_eq!(interceptor.attached(), [0x7000]);
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], TraceError::VtableRead { address, .. }
        if *address == BASE + WIDTH));
}

#[test]
fn compile_failure_skips_the_slot_but_still_advances() {
    let mut memory = MockMemory::new();
    memory.map_pointer(BASE + WIDTH, 0x8000);
    let (mut session, interceptor, _events, errors) = vtable_session(memory);

    // First slot's schema has a dependency cycle and is never hooked.
    let cyclic = FunctionSpec::new("broken")
        .arg(ArgumentDescriptor::input("a", ValueType::Word).when("b", |_| true))
        .arg(ArgumentDescriptor::input("b", ValueType::Word).when("a", |_| true));
    let good = FunctionSpec::new("good").returns(ValueType::Word);

    let installed = session
        .install(TraceConfig::vtable(
            BASE,
            vec![VtableEntry::Function(cyclic), VtableEntry::Function(good)],
        ))
        .unwrap();

    assert_eq!(installed, 1);
    // The good function's pointer came from slot 1, not slot 0.
    assert_eq!(interceptor.attached(), [0x8000]);
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], TraceError::SchemaCompile { function, .. }
        if function == "broken"));
}
