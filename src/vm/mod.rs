//! The execution engine: VM state, the fetch/decode loop, and frame
//! management. Opcode effects live in the `ops` submodule.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::SystemTime;

use hashbrown::HashMap;
use num_traits::FromPrimitive;

use crate::error::{TracebackFrame, VmError};
use crate::opcode::Opcode;
use crate::vm::frame::{Block, CallFrame};
use crate::vm::mem::{Allocation, CodeObject, ObjectRef, Payload};
use crate::vm::sll::NativeLibraries;

pub mod frame;
pub mod hooks;
pub mod mem;
pub mod meta;
pub mod sll;

mod ops;

/// Upper bound on call-stack depth; past this, recursion is assumed runaway.
pub const CALL_STACK_LIMIT: usize = 10_000;

/// Diagnostic context for one source file, carried for the error reporter.
/// The content is reserved for source excerpts in tracebacks.
pub struct Context {
    pub file_path: PathBuf,
    pub file_content: String,
    pub modified: SystemTime,
}

pub struct ZataVm {
    op_stack: Vec<ObjectRef>,
    call_stack: Vec<CallFrame>,
    block_stack: Vec<Block>,

    heap: HashMap<i64, Allocation>,
    next_address: i64,
    libraries: NativeLibraries,

    module: ObjectRef,
    module_names: Vec<String>,
    globals: Rc<RefCell<HashMap<String, ObjectRef>>>,
    contexts: Vec<Context>,

    // the running activation
    pc: usize,
    code: Rc<CodeObject>,
    locals: Vec<ObjectRef>,
    closure: Option<Rc<RefCell<HashMap<String, ObjectRef>>>>,
    frame_name: String,
    running: bool,
}

impl ZataVm {
    /// Builds a VM around a fully constructed module value, installing the
    /// built-in function registry into the module's globals.
    pub fn new(module: ObjectRef, contexts: Vec<Context>) -> Result<ZataVm, VmError> {
        let (code, locals, name, names, globals) = {
            let data = module.expect_module()?;
            hooks::register_builtins(data);
            (
                data.code.clone(),
                data.code.locals.clone(),
                data.name.clone(),
                data.names.clone(),
                data.globals.clone(),
            )
        };

        Ok(ZataVm {
            op_stack: Vec::new(),
            call_stack: Vec::new(),
            block_stack: Vec::new(),
            heap: HashMap::new(),
            next_address: 1,
            libraries: NativeLibraries::new(),
            module,
            module_names: names,
            globals,
            contexts,
            pc: 0,
            code,
            locals,
            closure: None,
            frame_name: name,
            running: false,
        })
    }

    /// Executes the module's code object until `HALT`, until execution falls
    /// off the end of the code stream, or until an error propagates out.
    /// Returns the final operand stack, bottom first.
    pub fn run(&mut self) -> Result<Vec<ObjectRef>, VmError> {
        debug!("entering module {}", self.frame_name);
        self.running = true;

        while self.running {
            if self.pc >= self.code.code.len() {
                self.running = false;
                break;
            }

            let word = self.code.code[self.pc];
            self.pc += 1;

            let op = Opcode::from_i32(word)
                .ok_or_else(|| VmError::bytecode(format!("unknown opcode: {:#x}", word)))?;
            self.step(op)?;
        }

        debug!(
            "module {} halted with {} stack value(s)",
            self.frame_name,
            self.op_stack.len()
        );
        Ok(std::mem::take(&mut self.op_stack))
    }

    /// Active frames, innermost first, for the error reporter.
    pub fn traceback(&self) -> Vec<TracebackFrame> {
        let mut frames = vec![TracebackFrame {
            name: self.frame_name.clone(),
            line: self.code.line_for(self.pc.saturating_sub(1)),
        }];

        for frame in self.call_stack.iter().rev() {
            frames.push(TracebackFrame {
                name: frame.name.clone(),
                line: frame.code.line_for(frame.pc.saturating_sub(1)),
            });
        }
        frames
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    /// The module value this VM was built around.
    pub fn module(&self) -> &ObjectRef {
        &self.module
    }

    // --- word stream -------------------------------------------------------

    /// Reads the next operand word. Running past the end of the stream means
    /// the assembler emitted a truncated instruction.
    fn fetch(&mut self, op: Opcode) -> Result<i32, VmError> {
        match self.code.code.get(self.pc) {
            Some(word) => {
                self.pc += 1;
                Ok(*word)
            }
            None => Err(VmError::bytecode(format!(
                "{} opcode: truncated operand at offset {}",
                op.mnemonic(),
                self.pc
            ))),
        }
    }

    fn fetch_index(&mut self, op: Opcode) -> Result<usize, VmError> {
        let word = self.fetch(op)?;
        if word < 0 {
            return Err(VmError::bytecode(format!(
                "{} opcode: negative operand {}",
                op.mnemonic(),
                word
            )));
        }
        Ok(word as usize)
    }

    // --- operand stack -----------------------------------------------------

    fn push(&mut self, value: ObjectRef) {
        self.op_stack.push(value);
    }

    fn pop(&mut self, op: Opcode) -> Result<ObjectRef, VmError> {
        self.op_stack.pop().ok_or_else(|| {
            VmError::op_stack(format!("{} opcode: stack underflow", op.mnemonic()))
        })
    }

    fn pop_args(&mut self, count: usize, op: Opcode) -> Result<Vec<ObjectRef>, VmError> {
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.pop(op)?);
        }
        args.reverse();
        Ok(args)
    }

    // --- frames ------------------------------------------------------------

    /// Suspends the running activation and installs the callee. Arguments
    /// occupy the leading local slots in argument order.
    fn push_frame(&mut self, callee: &ObjectRef, args: Vec<ObjectRef>) -> Result<(), VmError> {
        let function = match &callee.payload {
            Payload::Function(f) => f,
            _ => {
                return Err(VmError::runtime(format!(
                    "cannot build a frame for a {} value",
                    callee.type_tag()
                )))
            }
        };

        if self.call_stack.len() >= CALL_STACK_LIMIT {
            return Err(VmError::call_stack(format!(
                "call stack overflow at depth {}",
                CALL_STACK_LIMIT
            )));
        }

        let mut locals = function.code.locals.clone();
        if locals.len() < args.len() {
            locals.resize(args.len(), crate::types::state_none());
        }
        for (slot, arg) in locals.iter_mut().zip(args.into_iter()) {
            *slot = arg;
        }

        trace!("enter function {}", function.name);
        let saved = CallFrame {
            pc: self.pc,
            locals: std::mem::replace(&mut self.locals, locals),
            return_address: self.pc,
            code: std::mem::replace(&mut self.code, function.code.clone()),
            name: std::mem::replace(&mut self.frame_name, function.name.clone()),
            closure: std::mem::replace(&mut self.closure, function.env.clone()),
        };
        self.call_stack.push(saved);
        self.pc = 0;
        Ok(())
    }

    /// Restores the most recent suspended activation. Returns false when the
    /// call stack is empty. Blocks opened by the exiting frame are dropped.
    fn pop_frame(&mut self) -> bool {
        let frame = match self.call_stack.pop() {
            Some(f) => f,
            None => return false,
        };

        trace!("leave function {}", self.frame_name);
        self.pc = frame.return_address;
        self.locals = frame.locals;
        self.code = frame.code;
        self.frame_name = frame.name;
        self.closure = frame.closure;

        let depth = self.call_stack.len();
        while self
            .block_stack
            .last()
            .map_or(false, |b| b.frame_depth > depth)
        {
            self.block_stack.pop();
        }
        true
    }

    // --- shared lookups ----------------------------------------------------

    fn const_at(&self, index: usize, op: Opcode) -> Result<ObjectRef, VmError> {
        self.code.consts.get(index).cloned().ok_or_else(|| {
            VmError::bytecode(format!(
                "{} opcode: constant index {} out of range",
                op.mnemonic(),
                index
            ))
        })
    }

    /// Identifier from the running code object's name table; attribute and
    /// closure opcodes address through this.
    fn code_name(&self, index: usize, op: Opcode) -> Result<String, VmError> {
        self.code.names.get(index).cloned().ok_or_else(|| {
            VmError::bytecode(format!(
                "{} opcode: name index {} out of range",
                op.mnemonic(),
                index
            ))
        })
    }

    /// Identifier from the module's name table; global opcodes address
    /// through this.
    fn module_name(&self, index: usize, op: Opcode) -> Result<String, VmError> {
        self.module_names.get(index).cloned().ok_or_else(|| {
            VmError::bytecode(format!(
                "{} opcode: name index {} out of range",
                op.mnemonic(),
                index
            ))
        })
    }
}
