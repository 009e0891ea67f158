//! Operator slots for the immutable UTF-8 string type.

use crate::types::{create_bool, create_str, state_false};
use crate::vm::mem::{ObjectRef, Payload};
use crate::vm::meta::{MetaType, SlotId, SlotResult};

fn str_pair(args: &[ObjectRef]) -> Option<(&str, &str)> {
    match (&args.get(0)?.payload, &args.get(1)?.payload) {
        (Payload::Str(a), Payload::Str(b)) => Some((a, b)),
        _ => None,
    }
}

fn str_add(args: &[ObjectRef]) -> SlotResult {
    let (a, b) = match str_pair(args) {
        Some(v) => v,
        None => return Ok(None),
    };
    let mut out = String::with_capacity(a.len() + b.len());
    out.push_str(a);
    out.push_str(b);
    Ok(Some(create_str(out)))
}

fn str_eq(args: &[ObjectRef]) -> SlotResult {
    match str_pair(args) {
        Some((a, b)) => Ok(Some(create_bool(a == b))),
        None => Ok(Some(state_false())),
    }
}

macro_rules! str_cmp_slot {
    ($name:ident, ($a:ident, $b:ident) => $res:expr) => {
        fn $name(args: &[ObjectRef]) -> SlotResult {
            let ($a, $b) = match str_pair(args) {
                Some(v) => v,
                None => return Ok(None),
            };
            Ok(Some(create_bool($res)))
        }
    };
}

str_cmp_slot! {str_lt, (a, b) => a < b}
str_cmp_slot! {str_gt, (a, b) => a > b}
str_cmp_slot! {str_le, (a, b) => a <= b}
str_cmp_slot! {str_ge, (a, b) => a >= b}

/// Character at an integer index, as a fresh one-character string. An index
/// past the end is "unsupported", which ends iteration cleanly.
fn str_getitem(args: &[ObjectRef]) -> SlotResult {
    let (text, index) = match (&args.get(0).map(|a| &a.payload), &args.get(1).map(|a| &a.payload)) {
        (Some(Payload::Str(s)), Some(Payload::Int(i))) => (s, *i),
        _ => return Ok(None),
    };
    if index < 0 {
        return Ok(None);
    }
    Ok(text
        .chars()
        .nth(index as usize)
        .map(|c| create_str(c.to_string())))
}

fn str_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Str(_)) => Ok(Some(args[0].clone())),
        _ => Ok(None),
    }
}

pub(super) fn build() -> MetaType {
    let mut meta = MetaType::new("str");
    meta.bind(SlotId::Add, str_add);
    meta.bind(SlotId::Eq, str_eq);
    meta.bind(SlotId::Weq, str_eq);
    meta.bind(SlotId::Lt, str_lt);
    meta.bind(SlotId::Gt, str_gt);
    meta.bind(SlotId::Le, str_le);
    meta.bind(SlotId::Ge, str_ge);
    meta.bind(SlotId::GetItem, str_getitem);
    meta.bind(SlotId::Str, str_str);
    meta
}
