//! Opcode effects. Each arm of [`ZataVm::step`] implements one instruction
//! against the stacks and the running frame; the fetch/halt plumbing lives
//! in the parent module.

use crate::error::VmError;
use crate::opcode::Opcode;
use crate::types::{
    create_int, create_int64, display_value, is_not_found, state_false, state_true,
};
use crate::vm::frame::{Block, BlockKind};
use crate::vm::mem::{Allocation, ObjectRef, Payload, State};
use crate::vm::meta::{Slot, SlotId};
use crate::vm::{hooks, ZataVm};

impl ZataVm {
    pub(super) fn step(&mut self, op: Opcode) -> Result<(), VmError> {
        match op {
            Opcode::BCalc => self.op_binary(),
            Opcode::UCalc => self.op_unary(),

            Opcode::LoadConst => self.op_load_const(),
            Opcode::LoadLocal => self.op_load_local(),
            Opcode::StoreLocal => self.op_store_local(),
            Opcode::LoadGlobal => self.op_load_global(),
            Opcode::StoreGlobal => self.op_store_global(),
            Opcode::LoadClosure => self.op_load_closure(),
            Opcode::Swap => self.op_swap(),
            Opcode::Dup => self.op_dup(),
            Opcode::Pop => self.pop(Opcode::Pop).map(|_| ()),
            Opcode::LoadSll => self.op_load_sll(),

            Opcode::Jmp => {
                let offset = self.fetch(Opcode::Jmp)?;
                self.branch(offset, Opcode::Jmp)
            }
            Opcode::JmpIfTrue => self.op_conditional(Opcode::JmpIfTrue, true),
            Opcode::JmpIfFalse => self.op_conditional(Opcode::JmpIfFalse, false),
            Opcode::Call => self.op_call(),
            Opcode::Ret => self.op_ret(),
            Opcode::Nop => Ok(()),

            Opcode::MakeInstance => self.op_make_instance(),
            Opcode::GetAttr => self.op_get_attr(),
            Opcode::SetAttr => self.op_set_attr(),
            Opcode::GetIter => self.op_get_iter(),
            Opcode::NextIter => self.op_next_iter(),

            Opcode::Alloc => self.op_alloc(),
            Opcode::Free => self.op_free(),
            Opcode::LoadMem => self.op_load_mem(),
            Opcode::StoreMem => self.op_store_mem(),

            Opcode::SetupFinally => self.op_setup_block(Opcode::SetupFinally, BlockKind::Finally),
            Opcode::SetupCatch => self.op_setup_block(Opcode::SetupCatch, BlockKind::Catch),
            Opcode::EndFinally => self.op_pop_block(Opcode::EndFinally),
            Opcode::BsPop => self.op_pop_block(Opcode::BsPop),
            Opcode::Throw => self.op_throw(),

            Opcode::Halt => {
                self.running = false;
                Ok(())
            }
        }
    }

    // --- operator dispatch -------------------------------------------------

    fn unsupported(target: &ObjectRef, label: &str) -> VmError {
        VmError::type_error(format!(
            "<object id={}> cannot support op {}",
            target.id, label
        ))
    }

    /// Applies the slot to the argument vector; `args[0]` is the dispatch
    /// target. Native slots push their result directly; user slots push a
    /// frame whose `RET` leaves the result on the shared operand stack.
    fn invoke_slot(&mut self, id: SlotId, label: &str, args: Vec<ObjectRef>) -> Result<(), VmError> {
        let target = args[0].clone();
        match target.meta.slot(id).clone() {
            Slot::Native(f) => match f(&args)? {
                Some(value) => {
                    self.push(value);
                    Ok(())
                }
                None => Err(Self::unsupported(&target, label)),
            },
            Slot::User(function) => self.push_frame(&function, args),
            Slot::Unbound => Err(Self::unsupported(&target, label)),
        }
    }

    fn op_binary(&mut self) -> Result<(), VmError> {
        let pattern = self.fetch(Opcode::BCalc)?;
        let id = SlotId::from_binary_pattern(pattern).ok_or_else(|| {
            VmError::bytecode(format!("B_CALC opcode: unknown binary pattern {}", pattern))
        })?;

        let b = self.pop(Opcode::BCalc)?;
        let a = self.pop(Opcode::BCalc)?;
        self.invoke_slot(id, &pattern.to_string(), vec![a, b])
    }

    fn op_unary(&mut self) -> Result<(), VmError> {
        let pattern = self.fetch(Opcode::UCalc)?;
        let id = SlotId::from_unary_pattern(pattern).ok_or_else(|| {
            VmError::bytecode(format!("U_CALC opcode: unknown unary pattern {}", pattern))
        })?;

        let a = self.pop(Opcode::UCalc)?;
        self.invoke_slot(id, &pattern.to_string(), vec![a])
    }

    // --- stack shuffling ---------------------------------------------------

    fn op_swap(&mut self) -> Result<(), VmError> {
        let b = self.pop(Opcode::Swap)?;
        let a = self.pop(Opcode::Swap)?;
        self.push(b);
        self.push(a);
        Ok(())
    }

    fn op_dup(&mut self) -> Result<(), VmError> {
        let top = self
            .op_stack
            .last()
            .cloned()
            .ok_or_else(|| VmError::op_stack("DUP opcode: stack underflow"))?;
        self.push(top);
        Ok(())
    }

    // --- load/store --------------------------------------------------------

    fn op_load_const(&mut self) -> Result<(), VmError> {
        let index = self.fetch_index(Opcode::LoadConst)?;
        let value = self.const_at(index, Opcode::LoadConst)?;
        self.push(value);
        Ok(())
    }

    fn op_load_local(&mut self) -> Result<(), VmError> {
        let index = self.fetch_index(Opcode::LoadLocal)?;
        let value = self.locals.get(index).cloned().ok_or_else(|| {
            VmError::bytecode(format!(
                "LOAD_LOCAL opcode: local index {} out of range",
                index
            ))
        })?;
        self.push(value);
        Ok(())
    }

    fn op_store_local(&mut self) -> Result<(), VmError> {
        let index = self.fetch_index(Opcode::StoreLocal)?;
        let value = self.pop(Opcode::StoreLocal)?;
        match self.locals.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(VmError::bytecode(format!(
                "STORE_LOCAL opcode: local index {} out of range",
                index
            ))),
        }
    }

    fn op_load_global(&mut self) -> Result<(), VmError> {
        let index = self.fetch_index(Opcode::LoadGlobal)?;
        let name = self.module_name(index, Opcode::LoadGlobal)?;
        let value = self.globals.borrow().get(&name).cloned();
        match value {
            Some(v) => {
                self.push(v);
                Ok(())
            }
            None => Err(VmError::runtime(format!(
                "LOAD_GLOBAL opcode: undefined global '{}'",
                name
            ))),
        }
    }

    fn op_store_global(&mut self) -> Result<(), VmError> {
        let index = self.fetch_index(Opcode::StoreGlobal)?;
        let name = self.module_name(index, Opcode::StoreGlobal)?;
        let value = self.pop(Opcode::StoreGlobal)?;
        self.globals.borrow_mut().insert(name, value);
        Ok(())
    }

    fn op_load_closure(&mut self) -> Result<(), VmError> {
        let index = self.fetch_index(Opcode::LoadClosure)?;
        let name = self.code_name(index, Opcode::LoadClosure)?;
        let env = self.closure.as_ref().ok_or_else(|| {
            VmError::runtime("LOAD_CLOSURE opcode: no captured environment")
        })?;
        let value = env.borrow().get(&name).cloned().ok_or_else(|| {
            VmError::runtime(format!(
                "LOAD_CLOSURE opcode: undefined closure variable '{}'",
                name
            ))
        })?;
        self.push(value);
        Ok(())
    }

    // --- control flow ------------------------------------------------------

    /// Adds a signed offset to the pc. Offsets are relative to the
    /// instruction following the jump, the operand word included.
    fn branch(&mut self, offset: i32, op: Opcode) -> Result<(), VmError> {
        let target = self.pc as i64 + i64::from(offset);
        if target < 0 {
            return Err(VmError::bytecode(format!(
                "{} opcode: jump target {} out of range",
                op.mnemonic(),
                target
            )));
        }
        self.pc = target as usize;
        Ok(())
    }

    fn op_conditional(&mut self, op: Opcode, jump_on_true: bool) -> Result<(), VmError> {
        let offset = self.fetch(op)?;
        let cond = self.pop(op)?;

        let state = match &cond.payload {
            Payload::State(s) => *s,
            _ => {
                return Err(VmError::runtime(format!(
                    "{} opcode: top of the stack is not a state value",
                    op.mnemonic()
                )))
            }
        };

        // True is the single truthy state; None and NotFound branch as false.
        let taken = (state == State::True) == jump_on_true;
        if taken {
            self.branch(offset, op)?;
        }
        Ok(())
    }

    fn op_call(&mut self) -> Result<(), VmError> {
        let arg_count = self.fetch_index(Opcode::Call)?;
        let callee = self.pop(Opcode::Call)?;
        let args = self.pop_args(arg_count, Opcode::Call)?;

        match &callee.payload {
            Payload::Function(f) => {
                if let Some(native) = hooks::builtin(&f.name) {
                    trace!("builtin call {}", f.name);
                    let result = native(&args)?;
                    self.push(result);
                    Ok(())
                } else {
                    if f.arg_count != args.len() {
                        return Err(VmError::op_stack(format!(
                            "CALL opcode: function {} expects {} argument(s), got {}",
                            f.name,
                            f.arg_count,
                            args.len()
                        )));
                    }
                    self.push_frame(&callee, args)
                }
            }
            Payload::Class(_) => self.construct(&callee, args),
            Payload::Instance(_) => {
                let mut full = vec![callee.clone()];
                full.extend(args);
                self.invoke_slot(SlotId::Call, "call", full)
            }
            _ => Err(VmError::runtime(format!(
                "CALL opcode: {} value is not callable",
                callee.type_tag()
            ))),
        }
    }

    fn op_ret(&mut self) -> Result<(), VmError> {
        if !self.pop_frame() {
            return Err(VmError::call_stack("RET opcode: call stack is empty"));
        }
        Ok(())
    }

    // --- object model ------------------------------------------------------

    /// Runs the class metatype's `new` slot to allocate a fresh instance.
    fn instantiate(&mut self, class_obj: &ObjectRef) -> Result<ObjectRef, VmError> {
        match class_obj.meta.slot(SlotId::New).clone() {
            Slot::Native(f) => match f(&[class_obj.clone()])? {
                Some(instance) => Ok(instance),
                None => Err(Self::unsupported(class_obj, "new")),
            },
            _ => Err(VmError::runtime(format!(
                "class {} has no native constructor",
                class_obj.expect_class()?.name
            ))),
        }
    }

    /// `CALL` applied to a class value: allocate, push the instance as the
    /// call result, then run `init`. A user `__init__` runs as a normal
    /// frame and leaves nothing on the stack by convention.
    fn construct(&mut self, class_obj: &ObjectRef, args: Vec<ObjectRef>) -> Result<(), VmError> {
        let instance = self.instantiate(class_obj)?;
        self.push(instance.clone());

        match class_obj.meta.slot(SlotId::Init).clone() {
            Slot::User(init) => {
                let mut init_args = vec![instance];
                init_args.extend(args);
                self.push_frame(&init, init_args)
            }
            Slot::Native(f) => {
                let mut init_args = vec![instance];
                init_args.extend(args);
                f(&init_args)?;
                Ok(())
            }
            Slot::Unbound => {
                if args.is_empty() {
                    Ok(())
                } else {
                    Err(VmError::op_stack(format!(
                        "CALL opcode: class {} takes no constructor arguments, got {}",
                        class_obj.expect_class()?.name,
                        args.len()
                    )))
                }
            }
        }
    }

    fn op_make_instance(&mut self) -> Result<(), VmError> {
        let index = self.fetch_index(Opcode::MakeInstance)?;
        let class_obj = self.const_at(index, Opcode::MakeInstance)?;
        if !matches!(class_obj.payload, Payload::Class(_)) {
            return Err(VmError::runtime(format!(
                "MAKE_INSTANCE opcode: constant {} is not a class",
                index
            )));
        }
        let instance = self.instantiate(&class_obj)?;
        self.push(instance);
        Ok(())
    }

    fn op_get_attr(&mut self) -> Result<(), VmError> {
        let index = self.fetch_index(Opcode::GetAttr)?;
        let name = self.code_name(index, Opcode::GetAttr)?;
        let target = self.pop(Opcode::GetAttr)?;

        let found = match &target.payload {
            // instance fields shadow class attributes
            Payload::Instance(instance) => instance
                .fields
                .borrow()
                .get(&name)
                .cloned()
                .or_else(|| class_attr(&instance.class, &name)),
            Payload::Class(_) => class_attr(&target, &name),
            Payload::Record(map) => map.borrow().get(&name).cloned(),
            Payload::Module(module) => module.globals.borrow().get(&name).cloned(),
            _ => {
                return Err(VmError::type_error(format!(
                    "GET_ATTR opcode: {} value has no attributes",
                    target.type_tag()
                )))
            }
        };

        match found {
            Some(value) => {
                self.push(value);
                Ok(())
            }
            None => Err(VmError::runtime(format!(
                "GET_ATTR opcode: no attribute '{}' on {}",
                name,
                display_value(&target)
            ))),
        }
    }

    fn op_set_attr(&mut self) -> Result<(), VmError> {
        let index = self.fetch_index(Opcode::SetAttr)?;
        let name = self.code_name(index, Opcode::SetAttr)?;
        let value = self.pop(Opcode::SetAttr)?;
        let target = self.pop(Opcode::SetAttr)?;

        match &target.payload {
            Payload::Instance(instance) => {
                instance.fields.borrow_mut().insert(name, value);
                Ok(())
            }
            Payload::Class(class) => {
                class.attrs.borrow_mut().insert(name, value);
                Ok(())
            }
            Payload::Record(map) => {
                map.borrow_mut().insert(name, value);
                Ok(())
            }
            _ => Err(VmError::type_error(format!(
                "SET_ATTR opcode: cannot set attribute on {} value",
                target.type_tag()
            ))),
        }
    }

    // --- iteration ---------------------------------------------------------

    /// Pushes the target back followed by a zero cursor. The target must
    /// support container access for `NEXT_ITER` to make progress.
    fn op_get_iter(&mut self) -> Result<(), VmError> {
        let target = self.pop(Opcode::GetIter)?;
        if !target.meta.is_bound(SlotId::GetItem) {
            return Err(Self::unsupported(&target, "getitem"));
        }
        self.push(target);
        self.push(create_int(0));
        Ok(())
    }

    /// Advances iteration: on a hit pushes target, cursor+1, the element and
    /// state(True); on exhaustion pushes state(False) only. Pairs with
    /// `JMP_IF_FALSE` in compiled loops.
    fn op_next_iter(&mut self) -> Result<(), VmError> {
        let cursor_obj = self.pop(Opcode::NextIter)?;
        let target = self.pop(Opcode::NextIter)?;
        let cursor = cursor_obj.expect_int()?;

        let item = match target.meta.slot(SlotId::GetItem).clone() {
            Slot::Native(f) => f(&[target.clone(), cursor_obj])?,
            _ => {
                return Err(VmError::runtime(
                    "NEXT_ITER opcode: iteration requires a native getitem",
                ))
            }
        };

        match item {
            Some(value) if !is_not_found(&value) => {
                self.push(target);
                self.push(create_int(cursor.wrapping_add(1)));
                self.push(value);
                self.push(state_true());
            }
            _ => self.push(state_false()),
        }
        Ok(())
    }

    // --- managed heap cells ------------------------------------------------

    fn heap_address(value: &ObjectRef) -> Result<i64, VmError> {
        match &value.payload {
            Payload::Int(v) => Ok(i64::from(*v)),
            Payload::Int64(v) => Ok(*v),
            _ => Err(VmError::memory(format!(
                "memory address must be an integer, found {}",
                value.type_tag()
            ))),
        }
    }

    fn op_alloc(&mut self) -> Result<(), VmError> {
        let index = self.fetch_index(Opcode::Alloc)?;
        let size_obj = self.const_at(index, Opcode::Alloc)?;
        let size = match &size_obj.payload {
            Payload::Int(v) if *v >= 0 => *v as usize,
            Payload::Int64(v) if *v >= 0 => *v as usize,
            _ => {
                return Err(VmError::memory(
                    "ALLOC opcode: size constant must be a non-negative integer",
                ))
            }
        };

        let address = self.next_address;
        self.next_address += 1;
        self.heap.insert(address, Allocation { size, data: None });
        trace!("alloc cell {} ({} bytes requested)", address, size);
        self.push(create_int64(address));
        Ok(())
    }

    fn op_free(&mut self) -> Result<(), VmError> {
        let address = Self::heap_address(&self.pop(Opcode::Free)?)?;
        match self.heap.remove(&address) {
            Some(_) => Ok(()),
            None => Err(VmError::memory(format!(
                "FREE opcode: free of unallocated address {}",
                address
            ))),
        }
    }

    fn op_store_mem(&mut self) -> Result<(), VmError> {
        let value = self.pop(Opcode::StoreMem)?;
        let address = Self::heap_address(&self.pop(Opcode::StoreMem)?)?;
        match self.heap.get_mut(&address) {
            Some(cell) => {
                cell.data = Some(value);
                Ok(())
            }
            None => Err(VmError::memory(format!(
                "STORE_MEM opcode: store to unmapped address {}",
                address
            ))),
        }
    }

    fn op_load_mem(&mut self) -> Result<(), VmError> {
        let address = Self::heap_address(&self.pop(Opcode::LoadMem)?)?;
        let cell = self.heap.get(&address).ok_or_else(|| {
            VmError::memory(format!(
                "LOAD_MEM opcode: load from unmapped address {}",
                address
            ))
        })?;
        let value = cell.data.clone().ok_or_else(|| {
            VmError::memory(format!(
                "LOAD_MEM opcode: load from uninitialized address {}",
                address
            ))
        })?;
        self.push(value);
        Ok(())
    }

    // --- exception machinery -----------------------------------------------

    fn op_setup_block(&mut self, op: Opcode, kind: BlockKind) -> Result<(), VmError> {
        let offset = self.fetch(op)?;
        let handler = self.pc as i64 + i64::from(offset);
        if handler < 0 || handler as usize > self.code.code.len() {
            return Err(VmError::bytecode(format!(
                "{} opcode: handler target {} out of range",
                op.mnemonic(),
                handler
            )));
        }

        self.block_stack.push(Block {
            kind,
            stack_depth: self.op_stack.len(),
            frame_depth: self.call_stack.len(),
            handler: handler as usize,
        });
        Ok(())
    }

    fn op_pop_block(&mut self, op: Opcode) -> Result<(), VmError> {
        match self.block_stack.pop() {
            Some(_) => Ok(()),
            None => Err(VmError::runtime(format!(
                "{} opcode: block stack is empty",
                op.mnemonic()
            ))),
        }
    }

    /// Unwinds to the nearest catch block: call frames are popped back to
    /// the block's depth, the operand stack is cut to its recorded depth,
    /// the thrown value is pushed, and control transfers to the handler.
    fn op_throw(&mut self) -> Result<(), VmError> {
        let value = self.pop(Opcode::Throw)?;

        loop {
            match self.block_stack.pop() {
                Some(block) if block.kind == BlockKind::Catch => {
                    while self.call_stack.len() > block.frame_depth {
                        self.pop_frame();
                    }
                    self.op_stack.truncate(block.stack_depth);
                    self.pc = block.handler;
                    self.push(value);
                    return Ok(());
                }
                // finally and loop blocks unwind without handling
                Some(_) => continue,
                None => {
                    return Err(VmError::runtime(format!(
                        "uncaught exception: {}",
                        display_value(&value)
                    )))
                }
            }
        }
    }

    // --- dynamic libraries -------------------------------------------------

    fn op_load_sll(&mut self) -> Result<(), VmError> {
        let fn_index = self.fetch_index(Opcode::LoadSll)?;
        let arg_count = self.fetch_index(Opcode::LoadSll)?;
        let module_val = self.pop(Opcode::LoadSll)?;
        let args = self.pop_args(arg_count, Opcode::LoadSll)?;

        let (path, exports) = match &module_val.payload {
            Payload::Module(m) => (m.path.clone(), m.exports.clone()),
            _ => {
                return Err(VmError::runtime(
                    "LOAD_SLL opcode: top of the stack is not a module",
                ))
            }
        };

        let fn_name = exports.get(fn_index).cloned().ok_or_else(|| {
            VmError::bytecode(format!(
                "LOAD_SLL opcode: export index {} out of range",
                fn_index
            ))
        })?;

        let result = {
            let lib = self.libraries.load(&path, &exports)?;
            lib.call(&fn_name, &args)?
        };
        self.push(result);
        Ok(())
    }
}

/// Attribute lookup through a class and its parents, depth first.
fn class_attr(class_obj: &ObjectRef, name: &str) -> Option<ObjectRef> {
    let class = match &class_obj.payload {
        Payload::Class(c) => c,
        _ => return None,
    };

    if let Some(value) = class.attrs.borrow().get(name) {
        return Some(value.clone());
    }
    for parent in &class.parents {
        if let Some(value) = class_attr(parent, name) {
            return Some(value);
        }
    }
    None
}
