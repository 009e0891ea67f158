//! Operator slots for the two fixed-width integer types. Arithmetic wraps
//! two's-complement at the declared width; zero divisors raise calc errors.

use crate::error::VmError;
use crate::types::{create_bool, create_int, create_int64, numeric_weq, state_false};
use crate::vm::mem::{ObjectRef, Payload};
use crate::vm::meta::{MetaType, SlotId, SlotResult};

fn int_pair(args: &[ObjectRef]) -> Option<(i32, i32)> {
    match (&args.get(0)?.payload, &args.get(1)?.payload) {
        (Payload::Int(a), Payload::Int(b)) => Some((*a, *b)),
        _ => None,
    }
}

fn int64_pair(args: &[ObjectRef]) -> Option<(i64, i64)> {
    match (&args.get(0)?.payload, &args.get(1)?.payload) {
        (Payload::Int64(a), Payload::Int64(b)) => Some((*a, *b)),
        _ => None,
    }
}

macro_rules! int_slot {
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

macro_rules! int_cmp_slot {
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

macro_rules! int_div_slot {
    ($name:ident, $pair:ident, $make:ident, $op:ident, $what:literal) => {
        fn $name(args: &[ObjectRef]) -> SlotResult {
            let (a, b) = match $pair(args) {
                Some(v) => v,
                None => return Ok(None),
            };
            if b == 0 {
                return Err(VmError::calc(concat!($what, " by zero")));
            }
            Ok(Some($make(a.$op(b))))
        }
    };
}

int_slot! {int_add, int_pair, (a, b) => create_int(a.wrapping_add(b))}
int_slot! {int_sub, int_pair, (a, b) => create_int(a.wrapping_sub(b))}
int_slot! {int_mul, int_pair, (a, b) => create_int(a.wrapping_mul(b))}
int_slot! {int_bit_and, int_pair, (a, b) => create_int(a & b)}
int_slot! {int_bit_or, int_pair, (a, b) => create_int(a | b)}
int_slot! {int_bit_xor, int_pair, (a, b) => create_int(a ^ b)}

int_div_slot! {int_div, int_pair, create_int, wrapping_div, "division"}
int_div_slot! {int_mod, int_pair, create_int, wrapping_rem, "modulo"}

int_cmp_slot! {int_lt, int_pair, (a, b) => a < b}
int_cmp_slot! {int_gt, int_pair, (a, b) => a > b}
int_cmp_slot! {int_le, int_pair, (a, b) => a <= b}
int_cmp_slot! {int_ge, int_pair, (a, b) => a >= b}

int_slot! {int64_add, int64_pair, (a, b) => create_int64(a.wrapping_add(b))}
int_slot! {int64_sub, int64_pair, (a, b) => create_int64(a.wrapping_sub(b))}
int_slot! {int64_mul, int64_pair, (a, b) => create_int64(a.wrapping_mul(b))}
int_slot! {int64_bit_and, int64_pair, (a, b) => create_int64(a & b)}
int_slot! {int64_bit_or, int64_pair, (a, b) => create_int64(a | b)}
int_slot! {int64_bit_xor, int64_pair, (a, b) => create_int64(a ^ b)}

int_div_slot! {int64_div, int64_pair, create_int64, wrapping_div, "division"}
int_div_slot! {int64_mod, int64_pair, create_int64, wrapping_rem, "modulo"}

int_cmp_slot! {int64_lt, int64_pair, (a, b) => a < b}
int_cmp_slot! {int64_gt, int64_pair, (a, b) => a > b}
int_cmp_slot! {int64_le, int64_pair, (a, b) => a <= b}
int_cmp_slot! {int64_ge, int64_pair, (a, b) => a >= b}

// Equality between mismatched variants is state(False), not "unsupported".
fn int_eq(args: &[ObjectRef]) -> SlotResult {
    match int_pair(args) {
        Some((a, b)) => Ok(Some(create_bool(a == b))),
        None => Ok(Some(state_false())),
    }
}

fn int64_eq(args: &[ObjectRef]) -> SlotResult {
    match int64_pair(args) {
        Some((a, b)) => Ok(Some(create_bool(a == b))),
        None => Ok(Some(state_false())),
    }
}

fn int_neg(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Int(a)) => Ok(Some(create_int(a.wrapping_neg()))),
        _ => Ok(None),
    }
}

fn int_bit_not(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Int(a)) => Ok(Some(create_int(!a))),
        _ => Ok(None),
    }
}

fn int64_neg(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Int64(a)) => Ok(Some(create_int64(a.wrapping_neg()))),
        _ => Ok(None),
    }
}

fn int64_bit_not(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Int64(a)) => Ok(Some(create_int64(!a))),
        _ => Ok(None),
    }
}

fn int_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Int(a)) => Ok(Some(crate::types::create_str(a.to_string()))),
        _ => Ok(None),
    }
}

fn int64_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Int64(a)) => Ok(Some(crate::types::create_str(a.to_string()))),
        _ => Ok(None),
    }
}

pub(super) fn build_int() -> MetaType {
    let mut meta = MetaType::new("int");
    meta.bind(SlotId::Add, int_add);
    meta.bind(SlotId::Sub, int_sub);
    meta.bind(SlotId::Mul, int_mul);
    meta.bind(SlotId::Div, int_div);
    meta.bind(SlotId::Mod, int_mod);
    meta.bind(SlotId::Eq, int_eq);
    meta.bind(SlotId::Weq, numeric_weq);
    meta.bind(SlotId::Lt, int_lt);
    meta.bind(SlotId::Gt, int_gt);
    meta.bind(SlotId::Le, int_le);
    meta.bind(SlotId::Ge, int_ge);
    meta.bind(SlotId::BitAnd, int_bit_and);
    meta.bind(SlotId::BitOr, int_bit_or);
    meta.bind(SlotId::BitXor, int_bit_xor);
    meta.bind(SlotId::Neg, int_neg);
    meta.bind(SlotId::BitNot, int_bit_not);
    meta.bind(SlotId::Str, int_str);
    meta
}

pub(super) fn build_int64() -> MetaType {
    let mut meta = MetaType::new("long");
    meta.bind(SlotId::Add, int64_add);
    meta.bind(SlotId::Sub, int64_sub);
    meta.bind(SlotId::Mul, int64_mul);
    meta.bind(SlotId::Div, int64_div);
    meta.bind(SlotId::Mod, int64_mod);
    meta.bind(SlotId::Eq, int64_eq);
    meta.bind(SlotId::Weq, numeric_weq);
    meta.bind(SlotId::Lt, int64_lt);
    meta.bind(SlotId::Gt, int64_gt);
    meta.bind(SlotId::Le, int64_le);
    meta.bind(SlotId::Ge, int64_ge);
    meta.bind(SlotId::BitAnd, int64_bit_and);
    meta.bind(SlotId::BitOr, int64_bit_or);
    meta.bind(SlotId::BitXor, int64_bit_xor);
    meta.bind(SlotId::Neg, int64_neg);
    meta.bind(SlotId::BitNot, int64_bit_not);
    meta.bind(SlotId::Str, int64_str);
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::vm::mem::State;

    fn int_value(obj: &ObjectRef) -> i32 {
        match &obj.payload {
            Payload::Int(v) => *v,
            other => panic!("expected int, found {:?}", other.tag()),
        }
    }

    #[test]
    fn arithmetic_wraps() {
        let sum = int_add(&[create_int(i32::MAX), create_int(1)]).unwrap().unwrap();
        assert_eq!(int_value(&sum), i32::MIN);

        let product = int_mul(&[create_int(i32::MAX), create_int(2)]).unwrap().unwrap();
        assert_eq!(int_value(&product), -2);
    }

    #[test]
    fn division_round_trip_law() {
        // ((x / y) * y) + (x % y) == x
        for &(x, y) in &[(17, 5), (-17, 5), (17, -5), (-17, -5), (0, 3)] {
            let div = int_value(&int_div(&[create_int(x), create_int(y)]).unwrap().unwrap());
            let rem = int_value(&int_mod(&[create_int(x), create_int(y)]).unwrap().unwrap());
            assert_eq!(div * y + rem, x, "x={} y={}", x, y);
        }
    }

    #[test]
    fn zero_divisor_is_calc_error() {
        let err = int_div(&[create_int(1), create_int(0)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Calc);
        let err = int64_mod(&[create_int64(1), create_int64(0)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Calc);
    }

    #[test]
    fn mismatched_equality_is_false() {
        let result = int_eq(&[create_int(1), create_int64(1)]).unwrap().unwrap();
        assert!(matches!(result.payload, Payload::State(State::False)));
    }

    #[test]
    fn mismatched_ordering_is_unsupported() {
        assert!(int_lt(&[create_int(1), create_int64(2)]).unwrap().is_none());
    }

    #[test]
    fn min_division_does_not_trap() {
        let quot = int_div(&[create_int(i32::MIN), create_int(-1)]).unwrap().unwrap();
        assert_eq!(int_value(&quot), i32::MIN);
    }
}
