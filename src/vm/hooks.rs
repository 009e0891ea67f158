//! The built-in function registry.
//!
//! A process-wide name → native callable map consulted on every `CALL` by
//! callee name. Registration happens once at library load; at VM startup
//! each registered name is also installed into the executing module's
//! globals as a function stub so bytecode can address built-ins through
//! `LOAD_GLOBAL` like any other value.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use hashbrown::HashMap;

use crate::error::VmError;
use crate::types::{create_code, create_float, create_function, create_str, state_none};
use crate::vm::mem::{Module, ObjectRef, Payload};
use crate::vm::meta::{Slot, SlotId};

pub type BuiltinFn = fn(&[ObjectRef]) -> Result<ObjectRef, VmError>;

lazy_static! {
    static ref BUILTINS: HashMap<&'static str, BuiltinFn> = {
        let mut map = HashMap::new();
        map.insert("print", zata_print as BuiltinFn);
        map.insert("input", zata_input as BuiltinFn);
        map.insert("now", zata_now as BuiltinFn);
        map
    };

    // Reference point for `now`. The epoch is unspecified by contract, so
    // first-use of the registry is as good as process start.
    static ref VM_EPOCH: Instant = Instant::now();
}

pub fn builtin(name: &str) -> Option<BuiltinFn> {
    BUILTINS.get(name).copied()
}

/// Installs a stub function value for every registered built-in into the
/// module's global map, skipping names the module already defines.
pub fn register_builtins(module: &Module) {
    let mut globals = module.globals.borrow_mut();
    for name in BUILTINS.keys() {
        if !globals.contains_key(*name) {
            debug!("registering builtin {} into module {}", name, module.name);
            let stub_code = create_code(0, vec![], vec![], vec![], vec![]);
            globals.insert(
                name.to_string(),
                create_function(*name, 0, stub_code, vec![], None),
            );
        }
    }
}

fn expect_arity(name: &str, args: &[ObjectRef], count: usize) -> Result<(), VmError> {
    if args.len() != count {
        return Err(VmError::op_stack(format!(
            "{} expects {} argument(s), got {}",
            name,
            count,
            args.len()
        )));
    }
    Ok(())
}

/// Renders the argument through its metatype's native `str` slot and writes
/// it to stdout with a trailing newline.
fn zata_print(args: &[ObjectRef]) -> Result<ObjectRef, VmError> {
    expect_arity("print", args, 1)?;

    let rendered = match args[0].meta.slot(SlotId::Str) {
        Slot::Native(f) => f(&args[..1])?,
        _ => None,
    };

    match rendered.as_ref().map(|r| &r.payload) {
        Some(Payload::Str(text)) => {
            println!("{}", text);
            Ok(state_none())
        }
        _ => Err(VmError::runtime(
            "cannot print a value without a str rendering",
        )),
    }
}

/// Prints the prompt without a newline and reads one line from stdin.
fn zata_input(args: &[ObjectRef]) -> Result<ObjectRef, VmError> {
    expect_arity("input", args, 1)?;
    let prompt = args[0].expect_str()?;

    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(create_str(line))
}

/// Monotonic seconds since an unspecified epoch, as a float value.
fn zata_now(args: &[ObjectRef]) -> Result<ObjectRef, VmError> {
    expect_arity("now", args, 0)?;
    Ok(create_float(VM_EPOCH.elapsed().as_secs_f32()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{create_int, create_module};
    use crate::vm::mem::State;

    #[test]
    fn registry_contains_required_entries() {
        assert!(builtin("print").is_some());
        assert!(builtin("input").is_some());
        assert!(builtin("now").is_some());
        assert!(builtin("missing").is_none());
    }

    #[test]
    fn register_installs_stubs_once() {
        let code = create_code(0, vec![], vec![], vec![], vec![]);
        let module = create_module("m", "m.zir", vec![], code, vec![]);
        let module_data = module.expect_module().unwrap();

        register_builtins(module_data);
        let print_stub = module_data.globals.borrow().get("print").cloned().unwrap();
        assert!(print_stub.as_function().is_some());

        // idempotent: a second pass keeps the same stub
        register_builtins(module_data);
        let again = module_data.globals.borrow().get("print").cloned().unwrap();
        assert_eq!(print_stub.id, again.id);
    }

    #[test]
    fn print_returns_none_state() {
        let result = zata_print(&[create_int(42)]).unwrap();
        assert!(matches!(result.payload, Payload::State(State::None)));
    }

    #[test]
    fn print_arity_is_checked() {
        let err = zata_print(&[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OpStack);
    }

    #[test]
    fn now_is_monotonic() {
        let a = zata_now(&[]).unwrap();
        let b = zata_now(&[]).unwrap();
        match (&a.payload, &b.payload) {
            (Payload::Float(x), Payload::Float(y)) => assert!(y >= x),
            _ => panic!("now must return float values"),
        }
    }
}
