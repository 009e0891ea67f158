//! Activation records and block descriptors.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::vm::mem::{CodeObject, ObjectRef};

/// A suspended activation: everything needed to resume the caller once the
/// callee returns. The program counter and return address are saved
/// separately even though frame push records the same position in both; the
/// exception machinery unwinds through `return_address`.
pub struct CallFrame {
    pub pc: usize,
    pub locals: Vec<ObjectRef>,
    pub return_address: usize,
    pub code: Rc<CodeObject>,
    pub name: String,
    pub closure: Option<Rc<RefCell<HashMap<String, ObjectRef>>>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Catch,
    Finally,
    Loop,
}

/// One entry of the block stack. `stack_depth` is the operand-stack depth at
/// block entry, `frame_depth` the call-stack depth, and `handler` the
/// absolute pc transferred to when the block handles a throw.
pub struct Block {
    pub kind: BlockKind,
    pub stack_depth: usize,
    pub frame_depth: usize,
    pub handler: usize,
}
