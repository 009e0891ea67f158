//! Metatype records: the per-type operator slot tables.
//!
//! The dispatch loop never inspects variant tags to choose behavior. Every
//! operator, conversion, and container access indexes the value's metatype
//! by [`SlotId`]. A slot is unbound, a native callable, or a user function
//! value; the loop treats the three cases uniformly.

use std::fmt::{self, Debug, Formatter};

use crate::error::VmError;
use crate::vm::mem::ObjectRef;

/// `Ok(None)` means "operation not supported" and is converted into a type
/// error naming the left operand. `Err` carries an already-typed failure
/// such as a calc error.
pub type SlotResult = Result<Option<ObjectRef>, VmError>;

pub type NativeSlotFn = fn(&[ObjectRef]) -> SlotResult;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotId {
    New,
    Init,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Weq,
    Lt,
    Gt,
    Le,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Neg,
    BitNot,
    GetItem,
    SetItem,
    DelItem,
    Str,
    Nil,
    Call,
    Del,
}

impl SlotId {
    pub const COUNT: usize = 25;

    pub const ALL: [SlotId; SlotId::COUNT] = [
        SlotId::New,
        SlotId::Init,
        SlotId::Add,
        SlotId::Sub,
        SlotId::Mul,
        SlotId::Div,
        SlotId::Mod,
        SlotId::Eq,
        SlotId::Weq,
        SlotId::Lt,
        SlotId::Gt,
        SlotId::Le,
        SlotId::Ge,
        SlotId::BitAnd,
        SlotId::BitOr,
        SlotId::BitXor,
        SlotId::Neg,
        SlotId::BitNot,
        SlotId::GetItem,
        SlotId::SetItem,
        SlotId::DelItem,
        SlotId::Str,
        SlotId::Nil,
        SlotId::Call,
        SlotId::Del,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SlotId::New => "new",
            SlotId::Init => "init",
            SlotId::Add => "add",
            SlotId::Sub => "sub",
            SlotId::Mul => "mul",
            SlotId::Div => "div",
            SlotId::Mod => "mod",
            SlotId::Eq => "eq",
            SlotId::Weq => "weq",
            SlotId::Lt => "lt",
            SlotId::Gt => "gt",
            SlotId::Le => "le",
            SlotId::Ge => "ge",
            SlotId::BitAnd => "bit_and",
            SlotId::BitOr => "bit_or",
            SlotId::BitXor => "bit_xor",
            SlotId::Neg => "neg",
            SlotId::BitNot => "bit_not",
            SlotId::GetItem => "getitem",
            SlotId::SetItem => "setitem",
            SlotId::DelItem => "delitem",
            SlotId::Str => "str",
            SlotId::Nil => "nil",
            SlotId::Call => "call",
            SlotId::Del => "del",
        }
    }

    /// Method name a user class defines to override this slot, e.g.
    /// `__add__`. `New` is excluded: instance allocation always goes
    /// through the native constructor.
    pub fn dunder(self) -> Option<&'static str> {
        match self {
            SlotId::New => None,
            SlotId::Init => Some("__init__"),
            SlotId::Add => Some("__add__"),
            SlotId::Sub => Some("__sub__"),
            SlotId::Mul => Some("__mul__"),
            SlotId::Div => Some("__div__"),
            SlotId::Mod => Some("__mod__"),
            SlotId::Eq => Some("__eq__"),
            SlotId::Weq => Some("__weq__"),
            SlotId::Lt => Some("__lt__"),
            SlotId::Gt => Some("__gt__"),
            SlotId::Le => Some("__le__"),
            SlotId::Ge => Some("__ge__"),
            SlotId::BitAnd => Some("__bit_and__"),
            SlotId::BitOr => Some("__bit_or__"),
            SlotId::BitXor => Some("__bit_xor__"),
            SlotId::Neg => Some("__neg__"),
            SlotId::BitNot => Some("__bit_not__"),
            SlotId::GetItem => Some("__getitem__"),
            SlotId::SetItem => Some("__setitem__"),
            SlotId::DelItem => Some("__delitem__"),
            SlotId::Str => Some("__str__"),
            SlotId::Nil => Some("__nil__"),
            SlotId::Call => Some("__call__"),
            SlotId::Del => Some("__del__"),
        }
    }

    /// Slot addressed by a `B_CALC` pattern operand.
    pub fn from_binary_pattern(pattern: i32) -> Option<SlotId> {
        Some(match pattern {
            0 => SlotId::Add,
            1 => SlotId::Sub,
            2 => SlotId::Mul,
            3 => SlotId::Div,
            4 => SlotId::Mod,
            5 => SlotId::Eq,
            6 => SlotId::Weq,
            7 => SlotId::Lt,
            8 => SlotId::Gt,
            9 => SlotId::Le,
            10 => SlotId::Ge,
            11 => SlotId::BitAnd,
            12 => SlotId::BitOr,
            13 => SlotId::BitXor,
            _ => return None,
        })
    }

    /// Slot addressed by a `U_CALC` pattern operand.
    pub fn from_unary_pattern(pattern: i32) -> Option<SlotId> {
        Some(match pattern {
            0 => SlotId::Neg,
            1 => SlotId::BitNot,
            _ => return None,
        })
    }
}

#[derive(Clone)]
pub enum Slot {
    Unbound,
    Native(NativeSlotFn),
    User(ObjectRef),
}

pub struct MetaType {
    pub name: String,
    slots: Vec<Slot>,
}

impl MetaType {
    pub fn new(name: impl Into<String>) -> MetaType {
        MetaType {
            name: name.into(),
            slots: vec![Slot::Unbound; SlotId::COUNT],
        }
    }

    pub fn bind(&mut self, id: SlotId, f: NativeSlotFn) {
        self.slots[id as usize] = Slot::Native(f);
    }

    pub fn bind_user(&mut self, id: SlotId, function: ObjectRef) {
        self.slots[id as usize] = Slot::User(function);
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id as usize]
    }

    pub fn is_bound(&self, id: SlotId) -> bool {
        !matches!(self.slots[id as usize], Slot::Unbound)
    }
}

impl Debug for MetaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<metatype {}>", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::create_int;

    #[test]
    fn binary_patterns_cover_the_table() {
        for pattern in 0..=13 {
            assert!(SlotId::from_binary_pattern(pattern).is_some());
        }
        assert_eq!(SlotId::from_binary_pattern(14), None);
        assert_eq!(SlotId::from_binary_pattern(-1), None);
        assert_eq!(SlotId::from_binary_pattern(6), Some(SlotId::Weq));
    }

    #[test]
    fn binding_replaces_unbound() {
        fn noop(_: &[ObjectRef]) -> SlotResult {
            Ok(None)
        }

        let mut meta = MetaType::new("test");
        assert!(!meta.is_bound(SlotId::Add));
        meta.bind(SlotId::Add, noop);
        assert!(meta.is_bound(SlotId::Add));

        meta.bind_user(SlotId::Sub, create_int(0));
        assert!(matches!(meta.slot(SlotId::Sub), Slot::User(_)));
    }

    #[test]
    fn every_overridable_slot_has_a_dunder() {
        for id in SlotId::ALL.iter() {
            if *id != SlotId::New {
                assert!(id.dunder().is_some(), "{} missing dunder", id.name());
            }
        }
    }
}
