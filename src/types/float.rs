//! Operator slots for the IEEE-754 floating point types. A zero divisor is
//! a calc error here as well; everything else follows IEEE semantics.

use crate::error::VmError;
use crate::types::{create_bool, create_double, create_float, numeric_weq, state_false};
use crate::vm::mem::{ObjectRef, Payload};
use crate::vm::meta::{MetaType, SlotId, SlotResult};

fn float_pair(args: &[ObjectRef]) -> Option<(f32, f32)> {
    match (&args.get(0)?.payload, &args.get(1)?.payload) {
        (Payload::Float(a), Payload::Float(b)) => Some((*a, *b)),
        _ => None,
    }
}

fn double_pair(args: &[ObjectRef]) -> Option<(f64, f64)> {
    match (&args.get(0)?.payload, &args.get(1)?.payload) {
        (Payload::Double(a), Payload::Double(b)) => Some((*a, *b)),
        _ => None,
    }
}

macro_rules! float_slot {
    ($name:ident, $pair:ident, ($a:ident, $b:ident) => $res:expr) => {
        fn $name(args: &[ObjectRef]) -> SlotResult {
            let ($a, $b) = match $pair(args) {
                Some(v) => v,
                None => return Ok(None),
            };
            Ok(Some($res))
        }
    };
}

macro_rules! float_cmp_slot {
    ($name:ident, $pair:ident, ($a:ident, $b:ident) => $res:expr) => {
        fn $name(args: &[ObjectRef]) -> SlotResult {
            let ($a, $b) = match $pair(args) {
                Some(v) => v,
                None => return Ok(None),
            };
            Ok(Some(create_bool($res)))
        }
    };
}

macro_rules! float_div_slot {
    ($name:ident, $pair:ident, $make:ident, $op:tt, $what:literal) => {
        fn $name(args: &[ObjectRef]) -> SlotResult {
            let (a, b) = match $pair(args) {
                Some(v) => v,
                None => return Ok(None),
            };
            if b == 0.0 {
                return Err(VmError::calc(concat!($what, " by zero")));
            }
            Ok(Some($make(a $op b)))
        }
    };
}

float_slot! {float_add, float_pair, (a, b) => create_float(a + b)}
float_slot! {float_sub, float_pair, (a, b) => create_float(a - b)}
float_slot! {float_mul, float_pair, (a, b) => create_float(a * b)}
float_div_slot! {float_div, float_pair, create_float, /, "division"}
float_div_slot! {float_mod, float_pair, create_float, %, "modulo"}

float_cmp_slot! {float_lt, float_pair, (a, b) => a < b}
float_cmp_slot! {float_gt, float_pair, (a, b) => a > b}
float_cmp_slot! {float_le, float_pair, (a, b) => a <= b}
float_cmp_slot! {float_ge, float_pair, (a, b) => a >= b}

float_slot! {double_add, double_pair, (a, b) => create_double(a + b)}
float_slot! {double_sub, double_pair, (a, b) => create_double(a - b)}
float_slot! {double_mul, double_pair, (a, b) => create_double(a * b)}
float_div_slot! {double_div, double_pair, create_double, /, "division"}
float_div_slot! {double_mod, double_pair, create_double, %, "modulo"}

float_cmp_slot! {double_lt, double_pair, (a, b) => a < b}
float_cmp_slot! {double_gt, double_pair, (a, b) => a > b}
float_cmp_slot! {double_le, double_pair, (a, b) => a <= b}
float_cmp_slot! {double_ge, double_pair, (a, b) => a >= b}

fn float_eq(args: &[ObjectRef]) -> SlotResult {
    match float_pair(args) {
        Some((a, b)) => Ok(Some(create_bool(a == b))),
        None => Ok(Some(state_false())),
    }
}

fn double_eq(args: &[ObjectRef]) -> SlotResult {
    match double_pair(args) {
        Some((a, b)) => Ok(Some(create_bool(a == b))),
        None => Ok(Some(state_false())),
    }
}

fn float_neg(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Float(a)) => Ok(Some(create_float(-a))),
        _ => Ok(None),
    }
}

fn double_neg(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Double(a)) => Ok(Some(create_double(-a))),
        _ => Ok(None),
    }
}

fn float_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Float(a)) => Ok(Some(crate::types::create_str(a.to_string()))),
        _ => Ok(None),
    }
}

fn double_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Double(a)) => Ok(Some(crate::types::create_str(a.to_string()))),
        _ => Ok(None),
    }
}

pub(super) fn build_float() -> MetaType {
    let mut meta = MetaType::new("float");
    meta.bind(SlotId::Add, float_add);
    meta.bind(SlotId::Sub, float_sub);
    meta.bind(SlotId::Mul, float_mul);
    meta.bind(SlotId::Div, float_div);
    meta.bind(SlotId::Mod, float_mod);
    meta.bind(SlotId::Eq, float_eq);
    meta.bind(SlotId::Weq, numeric_weq);
    meta.bind(SlotId::Lt, float_lt);
    meta.bind(SlotId::Gt, float_gt);
    meta.bind(SlotId::Le, float_le);
    meta.bind(SlotId::Ge, float_ge);
    meta.bind(SlotId::Neg, float_neg);
    meta.bind(SlotId::Str, float_str);
    meta
}

pub(super) fn build_double() -> MetaType {
    let mut meta = MetaType::new("double");
    meta.bind(SlotId::Add, double_add);
    meta.bind(SlotId::Sub, double_sub);
    meta.bind(SlotId::Mul, double_mul);
    meta.bind(SlotId::Div, double_div);
    meta.bind(SlotId::Mod, double_mod);
    meta.bind(SlotId::Eq, double_eq);
    meta.bind(SlotId::Weq, numeric_weq);
    meta.bind(SlotId::Lt, double_lt);
    meta.bind(SlotId::Gt, double_gt);
    meta.bind(SlotId::Le, double_le);
    meta.bind(SlotId::Ge, double_ge);
    meta.bind(SlotId::Neg, double_neg);
    meta.bind(SlotId::Str, double_str);
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::vm::mem::State;

    #[test]
    fn basic_arithmetic() {
        let sum = float_add(&[create_float(1.5), create_float(2.25)]).unwrap().unwrap();
        assert!(matches!(sum.payload, Payload::Float(v) if v == 3.75));

        let quot = double_div(&[create_double(7.0), create_double(2.0)]).unwrap().unwrap();
        assert!(matches!(quot.payload, Payload::Double(v) if v == 3.5));
    }

    #[test]
    fn zero_divisor_is_calc_error() {
        let err = float_div(&[create_float(1.0), create_float(0.0)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Calc);
        let err = double_mod(&[create_double(1.0), create_double(0.0)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Calc);
    }

    #[test]
    fn mismatched_equality_is_false() {
        let result = float_eq(&[create_float(1.0), create_double(1.0)]).unwrap().unwrap();
        assert!(matches!(result.payload, Payload::State(State::False)));
    }
}
