//! End-to-end execution scenarios driven through the public API: modules
//! are assembled in memory the way a compiler front end would build them.

use zata_vm::opcode::Opcode;
use zata_vm::types::{
    create_class, create_code, create_function, create_int, create_list, create_module,
    create_str, state_true,
};
use zata_vm::{run_module, ErrorKind, ObjectRef, Payload, State};

use std::cell::RefCell;
use std::rc::Rc;

fn op(code: Opcode) -> i32 {
    code as i32
}

fn module_with(
    local_count: usize,
    consts: Vec<ObjectRef>,
    code_names: &[&str],
    module_names: &[&str],
    words: Vec<i32>,
) -> ObjectRef {
    let code_names = code_names.iter().map(|s| s.to_string()).collect();
    let module_names = module_names.iter().map(|s| s.to_string()).collect();
    let code = create_code(local_count, consts, code_names, words, vec![]);
    create_module("test", "test.zir", module_names, code, vec![])
}

fn expect_int(value: &ObjectRef) -> i32 {
    match &value.payload {
        Payload::Int(v) => *v,
        other => panic!("expected int, found {}", other.tag()),
    }
}

#[test]
fn arithmetic_scenario() {
    let module = module_with(
        0,
        vec![create_int(2), create_int(3)],
        &[],
        &[],
        vec![
            op(Opcode::LoadConst), 0,
            op(Opcode::LoadConst), 1,
            op(Opcode::BCalc), 0,
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(expect_int(&stack[0]), 5);
}

#[test]
fn conditional_scenario() {
    let module = module_with(
        0,
        vec![create_int(1), create_int(10), create_int(20), state_true()],
        &[],
        &[],
        vec![
            op(Opcode::LoadConst), 3,
            op(Opcode::JmpIfTrue), 4,
            op(Opcode::LoadConst), 2,
            op(Opcode::Jmp), 2,
            op(Opcode::LoadConst), 1,
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(expect_int(&stack[0]), 10);
}

#[test]
fn call_scenario() {
    // f(x) = x * x
    let square_code = create_code(
        1,
        vec![],
        vec![],
        vec![
            op(Opcode::LoadLocal), 0,
            op(Opcode::LoadLocal), 0,
            op(Opcode::BCalc), 2,
            op(Opcode::Ret),
        ],
        vec![],
    );
    let square = create_function("square", 1, square_code, vec![], None);

    let module = module_with(
        0,
        vec![square, create_int(7)],
        &[],
        &[],
        vec![
            op(Opcode::LoadConst), 1,
            op(Opcode::LoadConst), 0,
            op(Opcode::Call), 1,
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(expect_int(&stack[0]), 49);
}

#[test]
fn instance_attribute_scenario() {
    let class = create_class("C", vec![], vec!["k".to_string()], vec![]);

    let module = module_with(
        0,
        vec![class, create_int(5)],
        &["k"],
        &[],
        vec![
            op(Opcode::MakeInstance), 0,
            op(Opcode::Dup),
            op(Opcode::LoadConst), 1,
            op(Opcode::SetAttr), 0,
            op(Opcode::GetAttr), 0,
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(expect_int(&stack[0]), 5);
}

#[test]
fn builtin_print_scenario() {
    let module = module_with(
        0,
        vec![create_str("hi")],
        &[],
        &["print"],
        vec![
            op(Opcode::LoadConst), 0,
            op(Opcode::LoadGlobal), 0,
            op(Opcode::Call), 1,
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 1);
    assert!(matches!(stack[0].payload, Payload::State(State::None)));
}

#[test]
fn division_by_zero_scenario() {
    let module = module_with(
        0,
        vec![create_int(1), create_int(0)],
        &[],
        &[],
        vec![
            op(Opcode::LoadConst), 0,
            op(Opcode::LoadConst), 1,
            op(Opcode::BCalc), 3,
            op(Opcode::Halt),
        ],
    );

    let err = run_module(module, vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Calc);
    assert_ne!(err.code, 0);
}

#[test]
fn dup_preserves_identity() {
    let module = module_with(
        0,
        vec![create_int(11)],
        &[],
        &[],
        vec![op(Opcode::LoadConst), 0, op(Opcode::Dup), op(Opcode::Halt)],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 2);
    assert_eq!(stack[0].id, stack[1].id);
}

#[test]
fn swap_twice_is_identity() {
    let module = module_with(
        0,
        vec![create_int(1), create_int(2)],
        &[],
        &[],
        vec![
            op(Opcode::LoadConst), 0,
            op(Opcode::LoadConst), 1,
            op(Opcode::Swap),
            op(Opcode::Swap),
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(expect_int(&stack[0]), 1);
    assert_eq!(expect_int(&stack[1]), 2);
}

#[test]
fn stack_underflow_errors() {
    for words in vec![
        vec![op(Opcode::Pop), op(Opcode::Halt)],
        vec![op(Opcode::Swap), op(Opcode::Halt)],
        vec![op(Opcode::Dup), op(Opcode::Halt)],
        vec![op(Opcode::BCalc), 0, op(Opcode::Halt)],
        vec![op(Opcode::UCalc), 0, op(Opcode::Halt)],
    ] {
        let module = module_with(0, vec![], &[], &[], words);
        let err = run_module(module, vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OpStack);
    }
}

#[test]
fn conditional_requires_state_operand() {
    let module = module_with(
        0,
        vec![create_int(1)],
        &[],
        &[],
        vec![
            op(Opcode::LoadConst), 0,
            op(Opcode::JmpIfFalse), 2,
            op(Opcode::Halt),
        ],
    );

    let err = run_module(module, vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
}

#[test]
fn unknown_opcode_is_bytecode_error() {
    let module = module_with(0, vec![], &[], &[], vec![0x59]);
    let err = run_module(module, vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Bytecode);
}

#[test]
fn ret_on_empty_call_stack_errors() {
    let module = module_with(0, vec![], &[], &[], vec![op(Opcode::Ret)]);
    let err = run_module(module, vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CallStack);
}

#[test]
fn runaway_recursion_overflows_call_stack() {
    // f() = f(), recursing through a module global
    let f_code = create_code(
        0,
        vec![],
        vec![],
        vec![
            op(Opcode::LoadGlobal), 0,
            op(Opcode::Call), 0,
            op(Opcode::Ret),
        ],
        vec![],
    );
    let f = create_function("f", 0, f_code, vec![], None);

    let module = module_with(
        0,
        vec![f],
        &[],
        &["f"],
        vec![
            op(Opcode::LoadConst), 0,
            op(Opcode::StoreGlobal), 0,
            op(Opcode::LoadGlobal), 0,
            op(Opcode::Call), 0,
            op(Opcode::Halt),
        ],
    );

    let err = run_module(module, vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CallStack);
}

#[test]
fn call_arity_mismatch_errors() {
    let square_code = create_code(1, vec![], vec![], vec![op(Opcode::Ret)], vec![]);
    let square = create_function("square", 1, square_code, vec![], None);

    let module = module_with(
        0,
        vec![square, create_int(1), create_int(2)],
        &[],
        &[],
        vec![
            op(Opcode::LoadConst), 1,
            op(Opcode::LoadConst), 2,
            op(Opcode::LoadConst), 0,
            op(Opcode::Call), 2,
            op(Opcode::Halt),
        ],
    );

    let err = run_module(module, vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::OpStack);
}

#[test]
fn closure_reads_captured_environment() {
    let env = Rc::new(RefCell::new(hashbrown_map(vec![(
        "x".to_string(),
        create_int(42),
    )])));

    let f_code = create_code(
        0,
        vec![],
        vec!["x".to_string()],
        vec![op(Opcode::LoadClosure), 0, op(Opcode::Ret)],
        vec![],
    );
    let f = create_function("f", 0, f_code, vec!["x".to_string()], Some(env));

    let module = module_with(
        0,
        vec![f],
        &[],
        &[],
        vec![
            op(Opcode::LoadConst), 0,
            op(Opcode::Call), 0,
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(expect_int(&stack[0]), 42);
}

fn hashbrown_map(
    entries: Vec<(String, ObjectRef)>,
) -> hashbrown::HashMap<String, ObjectRef> {
    entries.into_iter().collect()
}

#[test]
fn user_defined_add_dispatches_to_method() {
    let add_code = create_code(
        2,
        vec![create_int(42)],
        vec![],
        vec![op(Opcode::LoadConst), 0, op(Opcode::Ret)],
        vec![],
    );
    let add = create_function("__add__", 2, add_code, vec![], None);
    let class = create_class("Vec", vec![], vec![], vec![("__add__".to_string(), add)]);

    let module = module_with(
        0,
        vec![class],
        &[],
        &[],
        vec![
            op(Opcode::MakeInstance), 0,
            op(Opcode::MakeInstance), 0,
            op(Opcode::BCalc), 0,
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(expect_int(&stack[0]), 42);
}

#[test]
fn class_call_runs_user_init() {
    // __init__(self, x): self.k = x
    let init_code = create_code(
        2,
        vec![],
        vec!["k".to_string()],
        vec![
            op(Opcode::LoadLocal), 0,
            op(Opcode::LoadLocal), 1,
            op(Opcode::SetAttr), 0,
            op(Opcode::Ret),
        ],
        vec![],
    );
    let init = create_function("__init__", 2, init_code, vec![], None);
    let class = create_class("Point", vec![], vec![], vec![("__init__".to_string(), init)]);

    let module = module_with(
        0,
        vec![class, create_int(9)],
        &["k"],
        &[],
        vec![
            op(Opcode::LoadConst), 1,
            op(Opcode::LoadConst), 0,
            op(Opcode::Call), 1,
            op(Opcode::GetAttr), 0,
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(expect_int(&stack[0]), 9);
}

#[test]
fn iteration_sums_a_list() {
    let list = create_list(vec![create_int(1), create_int(2), create_int(3)]);

    let module = module_with(
        1,
        vec![list, create_int(0)],
        &[],
        &[],
        vec![
            op(Opcode::LoadConst), 1,
            op(Opcode::StoreLocal), 0,
            op(Opcode::LoadConst), 0,
            op(Opcode::GetIter),
            op(Opcode::NextIter),
            op(Opcode::JmpIfFalse), 8,
            op(Opcode::LoadLocal), 0,
            op(Opcode::BCalc), 0,
            op(Opcode::StoreLocal), 0,
            op(Opcode::Jmp), -11,
            op(Opcode::LoadLocal), 0,
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(expect_int(&stack[0]), 6);
}

#[test]
fn throw_transfers_to_catch_handler() {
    let module = module_with(
        0,
        vec![create_str("boom"), create_int(7)],
        &[],
        &[],
        vec![
            op(Opcode::SetupCatch), 4,
            op(Opcode::LoadConst), 0,
            op(Opcode::Throw),
            op(Opcode::Halt),
            op(Opcode::LoadConst), 1,
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 2);
    assert!(matches!(&stack[0].payload, Payload::Str(s) if s == "boom"));
    assert_eq!(expect_int(&stack[1]), 7);
}

#[test]
fn uncaught_throw_is_runtime_error() {
    let module = module_with(
        0,
        vec![create_str("boom")],
        &[],
        &[],
        vec![
            op(Opcode::LoadConst), 0,
            op(Opcode::Throw),
            op(Opcode::Halt),
        ],
    );

    let err = run_module(module, vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.message.contains("boom"));
}

#[test]
fn heap_cells_store_and_load() {
    let module = module_with(
        0,
        vec![create_int(8), create_int(99)],
        &[],
        &[],
        vec![
            op(Opcode::Alloc), 0,
            op(Opcode::Dup),
            op(Opcode::LoadConst), 1,
            op(Opcode::StoreMem),
            op(Opcode::LoadMem),
            op(Opcode::Halt),
        ],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(expect_int(&stack[0]), 99);
}

#[test]
fn double_free_is_memory_error() {
    let module = module_with(
        0,
        vec![create_int(8)],
        &[],
        &[],
        vec![
            op(Opcode::Alloc), 0,
            op(Opcode::Dup),
            op(Opcode::Free),
            op(Opcode::Free),
            op(Opcode::Halt),
        ],
    );

    let err = run_module(module, vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Memory);
}

#[test]
fn native_library_load_failure_is_io_error() {
    let lib_code = create_code(0, vec![], vec![], vec![], vec![]);
    let native = create_module(
        "ext",
        "/nonexistent/libzata_ext.so",
        vec![],
        lib_code,
        vec!["zata_ext_fn".to_string()],
    );

    let module = module_with(
        0,
        vec![native],
        &[],
        &[],
        vec![
            op(Opcode::LoadConst), 0,
            op(Opcode::LoadSll), 0, 0,
            op(Opcode::Halt),
        ],
    );

    let err = run_module(module, vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Io);
}

#[test]
fn falling_off_the_end_halts() {
    let module = module_with(
        0,
        vec![create_int(4)],
        &[],
        &[],
        vec![op(Opcode::LoadConst), 0],
    );

    let stack = run_module(module, vec![]).unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(expect_int(&stack[0]), 4);
}
