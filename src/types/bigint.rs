//! Arbitrary-precision integers: sign + base-10^9 limbs, and the operator
//! slots bound to the bigint metatype. Limbs are stored little-endian with
//! no leading zero limbs; zero is the single limb `0` with a positive sign.
//!
//! Division and modulo are deliberately left unbound on this type.

use std::cmp::Ordering;

use crate::types::{create_big_int, create_bool, numeric_weq, state_false};
use crate::vm::mem::{ObjectRef, Payload};
use crate::vm::meta::{MetaType, SlotId, SlotResult};

pub const LIMB_BASE: u64 = 1_000_000_000;
pub const LIMB_DIGITS: usize = 9;

#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct BigInt {
    pub negative: bool,
    pub limbs: Vec<u64>,
}

impl BigInt {
    pub fn zero() -> BigInt {
        BigInt {
            negative: false,
            limbs: vec![0],
        }
    }

    pub fn from_i64(value: i64) -> BigInt {
        let negative = value < 0;
        // Widen before negating so i64::MIN survives.
        let mut magnitude = (value as i128).abs() as u128;
        let mut limbs = Vec::new();
        loop {
            limbs.push((magnitude % u128::from(LIMB_BASE)) as u64);
            magnitude /= u128::from(LIMB_BASE);
            if magnitude == 0 {
                break;
            }
        }
        BigInt { negative, limbs }.normalized()
    }

    /// Parses an optionally signed decimal string. Used by hosts building
    /// constant pools; not wired to any opcode.
    pub fn parse(text: &str) -> Option<BigInt> {
        let (negative, digits) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut limbs = Vec::with_capacity(digits.len() / LIMB_DIGITS + 1);
        let bytes = digits.as_bytes();
        let mut end = bytes.len();
        while end > 0 {
            let start = end.saturating_sub(LIMB_DIGITS);
            let chunk = &digits[start..end];
            limbs.push(chunk.parse::<u64>().ok()?);
            end = start;
        }
        Some(BigInt { negative, limbs }.normalized())
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&l| l == 0)
    }

    fn normalized(mut self) -> BigInt {
        while self.limbs.len() > 1 && *self.limbs.last().unwrap() == 0 {
            self.limbs.pop();
        }
        if self.is_zero() {
            self.negative = false;
        }
        self
    }

    fn cmp_abs(a: &[u64], b: &[u64]) -> Ordering {
        if a.len() != b.len() {
            return a.len().cmp(&b.len());
        }
        for (x, y) in a.iter().rev().zip(b.iter().rev()) {
            if x != y {
                return x.cmp(y);
            }
        }
        Ordering::Equal
    }

    pub(crate) fn add_abs(a: &[u64], b: &[u64]) -> Vec<u64> {
        let mut out = Vec::with_capacity(a.len().max(b.len()) + 1);
        let mut carry = 0u64;
        for i in 0..a.len().max(b.len()) {
            let sum = a.get(i).copied().unwrap_or(0) + b.get(i).copied().unwrap_or(0) + carry;
            out.push(sum % LIMB_BASE);
            carry = sum / LIMB_BASE;
        }
        if carry > 0 {
            out.push(carry);
        }
        out
    }

    /// Magnitude subtraction; callers guarantee `a >= b`.
    pub(crate) fn sub_abs(a: &[u64], b: &[u64]) -> Vec<u64> {
        let mut out = Vec::with_capacity(a.len());
        let mut borrow = 0i64;
        for i in 0..a.len() {
            let mut diff = a[i] as i64 - b.get(i).copied().unwrap_or(0) as i64 - borrow;
            if diff < 0 {
                diff += LIMB_BASE as i64;
                borrow = 1;
            } else {
                borrow = 0;
            }
            out.push(diff as u64);
        }
        out
    }

    fn mul_abs(a: &[u64], b: &[u64]) -> Vec<u64> {
        let mut out = vec![0u128; a.len() + b.len()];
        for (i, &x) in a.iter().enumerate() {
            for (j, &y) in b.iter().enumerate() {
                out[i + j] += u128::from(x) * u128::from(y);
            }
        }

        let mut limbs = Vec::with_capacity(out.len());
        let mut carry = 0u128;
        for cell in out {
            let value = cell + carry;
            limbs.push((value % u128::from(LIMB_BASE)) as u64);
            carry = value / u128::from(LIMB_BASE);
        }
        while carry > 0 {
            limbs.push((carry % u128::from(LIMB_BASE)) as u64);
            carry /= u128::from(LIMB_BASE);
        }
        limbs
    }

    pub fn add(&self, other: &BigInt) -> BigInt {
        if self.negative == other.negative {
            return BigInt {
                negative: self.negative,
                limbs: Self::add_abs(&self.limbs, &other.limbs),
            }
            .normalized();
        }

        match Self::cmp_abs(&self.limbs, &other.limbs) {
            Ordering::Less => BigInt {
                negative: other.negative,
                limbs: Self::sub_abs(&other.limbs, &self.limbs),
            }
            .normalized(),
            _ => BigInt {
                negative: self.negative,
                limbs: Self::sub_abs(&self.limbs, &other.limbs),
            }
            .normalized(),
        }
    }

    pub fn sub(&self, other: &BigInt) -> BigInt {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &BigInt) -> BigInt {
        BigInt {
            negative: self.negative != other.negative,
            limbs: Self::mul_abs(&self.limbs, &other.limbs),
        }
        .normalized()
    }

    pub fn neg(&self) -> BigInt {
        BigInt {
            negative: !self.negative && !self.is_zero(),
            limbs: self.limbs.clone(),
        }
    }

    pub fn cmp(&self, other: &BigInt) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => Self::cmp_abs(&self.limbs, &other.limbs),
            (true, true) => Self::cmp_abs(&other.limbs, &self.limbs),
        }
    }

    /// Lossy conversion used only by coercing equality.
    pub fn to_f64(&self) -> f64 {
        let mut value = 0.0;
        for &limb in self.limbs.iter().rev() {
            value = value * LIMB_BASE as f64 + limb as f64;
        }
        if self.negative {
            -value
        } else {
            value
        }
    }

    pub fn to_decimal_string(&self) -> String {
        let mut out = String::new();
        if self.negative {
            out.push('-');
        }
        for (i, limb) in self.limbs.iter().rev().enumerate() {
            if i == 0 {
                out.push_str(&limb.to_string());
            } else {
                out.push_str(&format!("{:09}", limb));
            }
        }
        out
    }
}

fn bigint_pair(args: &[ObjectRef]) -> Option<(&BigInt, &BigInt)> {
    match (&args.get(0)?.payload, &args.get(1)?.payload) {
        (Payload::BigInt(a), Payload::BigInt(b)) => Some((a, b)),
        _ => None,
    }
}

macro_rules! bigint_arith_slot {
    ($name:ident, $op:ident) => {
        fn $name(args: &[ObjectRef]) -> SlotResult {
            let (a, b) = match bigint_pair(args) {
                Some(v) => v,
                None => return Ok(None),
            };
            Ok(Some(create_big_int(a.$op(b))))
        }
    };
}

macro_rules! bigint_cmp_slot {
    ($name:ident, $($ord:pat)|+) => {
        fn $name(args: &[ObjectRef]) -> SlotResult {
            let (a, b) = match bigint_pair(args) {
                Some(v) => v,
                None => return Ok(None),
            };
            Ok(Some(create_bool(matches!(a.cmp(b), $($ord)|+))))
        }
    };
}

bigint_arith_slot!(bigint_add, add);
bigint_arith_slot!(bigint_sub, sub);
bigint_arith_slot!(bigint_mul, mul);

bigint_cmp_slot!(bigint_lt, Ordering::Less);
bigint_cmp_slot!(bigint_gt, Ordering::Greater);
bigint_cmp_slot!(bigint_le, Ordering::Less | Ordering::Equal);
bigint_cmp_slot!(bigint_ge, Ordering::Greater | Ordering::Equal);

fn bigint_eq(args: &[ObjectRef]) -> SlotResult {
    match bigint_pair(args) {
        Some((a, b)) => Ok(Some(create_bool(a == b))),
        None => Ok(Some(state_false())),
    }
}

fn bigint_neg(args: &[ObjectRef]) -> SlotResult {
    match &args.get(0).map(|a| &a.payload) {
        Some(Payload::BigInt(a)) => Ok(Some(create_big_int(a.neg()))),
        _ => Ok(None),
    }
}

fn bigint_str(args: &[ObjectRef]) -> SlotResult {
    match &args.get(0).map(|a| &a.payload) {
        Some(Payload::BigInt(a)) => Ok(Some(crate::types::create_str(a.to_decimal_string()))),
        _ => Ok(None),
    }
}

pub(super) fn build() -> MetaType {
    let mut meta = MetaType::new("bigint");
    meta.bind(SlotId::Add, bigint_add);
    meta.bind(SlotId::Sub, bigint_sub);
    meta.bind(SlotId::Mul, bigint_mul);
    meta.bind(SlotId::Eq, bigint_eq);
    meta.bind(SlotId::Weq, numeric_weq);
    meta.bind(SlotId::Lt, bigint_lt);
    meta.bind(SlotId::Gt, bigint_gt);
    meta.bind(SlotId::Le, bigint_le);
    meta.bind(SlotId::Ge, bigint_ge);
    meta.bind(SlotId::Neg, bigint_neg);
    meta.bind(SlotId::Str, bigint_str);
    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(text: &str) -> BigInt {
        BigInt::parse(text).unwrap()
    }

    #[test]
    fn parse_and_render_round_trip() {
        for text in &["0", "7", "-7", "1000000000", "123456789012345678901234567890"] {
            assert_eq!(big(text).to_decimal_string(), *text);
        }
        assert_eq!(big("-0").to_decimal_string(), "0");
        assert_eq!(big("0012").to_decimal_string(), "12");
    }

    #[test]
    fn addition_carries_across_limbs() {
        let a = big("999999999999999999");
        let b = big("1");
        assert_eq!(a.add(&b).to_decimal_string(), "1000000000000000000");
    }

    #[test]
    fn mixed_sign_addition() {
        assert_eq!(big("100").add(&big("-30")).to_decimal_string(), "70");
        assert_eq!(big("-100").add(&big("30")).to_decimal_string(), "-70");
        assert_eq!(big("5").add(&big("-5")).to_decimal_string(), "0");
    }

    #[test]
    fn subtraction_borrows() {
        let a = big("1000000000000000000");
        let b = big("1");
        assert_eq!(a.sub(&b).to_decimal_string(), "999999999999999999");
        assert_eq!(b.sub(&a).to_decimal_string(), "-999999999999999999");
    }

    #[test]
    fn multiplication_with_signs() {
        let a = big("123456789");
        let b = big("-987654321");
        assert_eq!(a.mul(&b).to_decimal_string(), "-121932631112635269");
        assert_eq!(big("0").mul(&b).to_decimal_string(), "0");
    }

    #[test]
    fn ordering_respects_sign_and_magnitude() {
        assert_eq!(big("-10").cmp(&big("3")), Ordering::Less);
        assert_eq!(big("-10").cmp(&big("-3")), Ordering::Less);
        assert_eq!(big("10").cmp(&big("3")), Ordering::Greater);
        assert_eq!(big("10").cmp(&big("10")), Ordering::Equal);
    }

    #[test]
    fn from_i64_extremes() {
        assert_eq!(
            BigInt::from_i64(i64::MIN).to_decimal_string(),
            i64::MIN.to_string()
        );
        assert_eq!(
            BigInt::from_i64(i64::MAX).to_decimal_string(),
            i64::MAX.to_string()
        );
    }
}
