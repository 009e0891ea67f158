//! The Zata virtual machine: a stack-based bytecode interpreter for a
//! dynamically-typed, object-oriented language.
//!
//! A host hands [`run_module`] a fully constructed module value (constant
//! pool, bytecode, name tables) plus optional diagnostic contexts and gets
//! the final operand stack back. [`execute_module`] is the fatal variant:
//! it reports a red traceback and exits the process on failure, matching
//! the language runtime's command-line behavior.

// Ensure each result error is either unwrapped or returned
#![deny(unused_must_use)]

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

pub mod error;
pub mod opcode;
pub mod types;
pub mod vm;

pub use crate::error::{ErrorKind, VmError};
pub use crate::vm::mem::{Object, ObjectRef, Payload, State};
pub use crate::vm::{Context, ZataVm};

/// Executes a module to completion and returns the final operand stack,
/// bottom first. Errors come back to the caller untouched.
pub fn run_module(
    module: ObjectRef,
    contexts: Vec<Context>,
) -> Result<Vec<ObjectRef>, VmError> {
    let mut vm = ZataVm::new(module, contexts)?;
    vm.run()
}

/// Executes a module; on error prints the traceback and terminates the
/// process with the error's code.
pub fn execute_module(module: ObjectRef, contexts: Vec<Context>) -> Vec<ObjectRef> {
    let mut vm = match ZataVm::new(module, contexts) {
        Ok(vm) => vm,
        Err(err) => {
            error::report_traceback(&[], &err);
            std::process::exit(err.code);
        }
    };

    match vm.run() {
        Ok(stack) => stack,
        Err(err) => {
            error::report_traceback(&vm.traceback(), &err);
            std::process::exit(err.code);
        }
    }
}
