//! Fixed-point decimals: sign + base-10^9 limbs for the integer part
//! (little-endian) and the fractional part (most significant group first).
//!
//! Only addition, subtraction, negation, equality, and rendering are bound;
//! multiplication and division stay unbound on this type.

use crate::types::bigint::{BigInt, LIMB_BASE, LIMB_DIGITS};
use crate::types::{create_bool, create_dec, create_str, numeric_weq, state_false};
use crate::vm::mem::{ObjectRef, Payload};
use crate::vm::meta::{MetaType, SlotId, SlotResult};

#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Decimal {
    pub negative: bool,
    pub int_limbs: Vec<u64>,
    pub frac_limbs: Vec<u64>,
}

impl Decimal {
    pub fn zero() -> Decimal {
        Decimal {
            negative: false,
            int_limbs: vec![0],
            frac_limbs: Vec::new(),
        }
    }

    /// Parses `[-+]digits[.digits]`. Fractional digits are grouped into
    /// base-10^9 limbs left to right, the final group padded with zeros.
    pub fn parse(text: &str) -> Option<Decimal> {
        let (negative, rest) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };

        let (int_part, frac_part) = match rest.find('.') {
            Some(dot) => (&rest[..dot], &rest[dot + 1..]),
            None => (rest, ""),
        };
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let int_limbs = BigInt::parse(int_part)?.limbs;

        let mut frac_limbs = Vec::with_capacity(frac_part.len() / LIMB_DIGITS + 1);
        let mut cursor = frac_part;
        while !cursor.is_empty() {
            let take = cursor.len().min(LIMB_DIGITS);
            let mut group = cursor[..take].parse::<u64>().ok()?;
            // Pad a short trailing group up to the full limb width.
            for _ in take..LIMB_DIGITS {
                group *= 10;
            }
            frac_limbs.push(group);
            cursor = &cursor[take..];
        }

        Some(
            Decimal {
                negative,
                int_limbs,
                frac_limbs,
            }
            .normalized(),
        )
    }

    pub fn is_zero(&self) -> bool {
        self.int_limbs.iter().all(|&l| l == 0) && self.frac_limbs.iter().all(|&l| l == 0)
    }

    fn normalized(mut self) -> Decimal {
        while self.int_limbs.len() > 1 && *self.int_limbs.last().unwrap() == 0 {
            self.int_limbs.pop();
        }
        while self.frac_limbs.last() == Some(&0) {
            self.frac_limbs.pop();
        }
        if self.is_zero() {
            self.negative = false;
        }
        self
    }

    /// Flattens to a scaled magnitude with `scale` fractional limbs,
    /// least-significant limb first, so the bigint limb routines apply.
    fn scaled(&self, scale: usize) -> Vec<u64> {
        let mut limbs = Vec::with_capacity(scale + self.int_limbs.len());
        for i in (0..scale).rev() {
            limbs.push(self.frac_limbs.get(i).copied().unwrap_or(0));
        }
        limbs.extend_from_slice(&self.int_limbs);
        limbs
    }

    fn from_scaled(negative: bool, mut limbs: Vec<u64>, scale: usize) -> Decimal {
        while limbs.len() < scale + 1 {
            limbs.push(0);
        }
        let int_limbs = limbs.split_off(scale);
        limbs.reverse();
        Decimal {
            negative,
            int_limbs,
            frac_limbs: limbs,
        }
        .normalized()
    }

    fn cmp_abs(a: &[u64], b: &[u64]) -> std::cmp::Ordering {
        if a.len() != b.len() {
            return a.len().cmp(&b.len());
        }
        for (x, y) in a.iter().rev().zip(b.iter().rev()) {
            if x != y {
                return x.cmp(y);
            }
        }
        std::cmp::Ordering::Equal
    }

    pub fn add(&self, other: &Decimal) -> Decimal {
        let scale = self.frac_limbs.len().max(other.frac_limbs.len());
        let a = self.scaled(scale);
        let b = other.scaled(scale);

        if self.negative == other.negative {
            return Decimal::from_scaled(self.negative, BigInt::add_abs(&a, &b), scale);
        }

        match Decimal::cmp_abs(&a, &b) {
            std::cmp::Ordering::Less => {
                Decimal::from_scaled(other.negative, BigInt::sub_abs(&b, &a), scale)
            }
            _ => Decimal::from_scaled(self.negative, BigInt::sub_abs(&a, &b), scale),
        }
    }

    pub fn sub(&self, other: &Decimal) -> Decimal {
        self.add(&other.neg())
    }

    pub fn neg(&self) -> Decimal {
        Decimal {
            negative: !self.negative && !self.is_zero(),
            int_limbs: self.int_limbs.clone(),
            frac_limbs: self.frac_limbs.clone(),
        }
    }

    /// Lossy conversion used only by coercing equality.
    pub fn to_f64(&self) -> f64 {
        let mut value = 0.0;
        for &limb in self.int_limbs.iter().rev() {
            value = value * LIMB_BASE as f64 + limb as f64;
        }
        let mut unit = 1.0 / LIMB_BASE as f64;
        for &limb in &self.frac_limbs {
            value += limb as f64 * unit;
            unit /= LIMB_BASE as f64;
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
        for (i, limb) in self.int_limbs.iter().rev().enumerate() {
            if i == 0 {
                out.push_str(&limb.to_string());
            } else {
                out.push_str(&format!("{:09}", limb));
            }
        }
        if !self.frac_limbs.is_empty() {
            out.push('.');
            let mut frac = String::new();
            for limb in &self.frac_limbs {
                frac.push_str(&format!("{:09}", limb));
            }
            out.push_str(frac.trim_end_matches('0'));
        }
        out
    }
}

fn dec_pair(args: &[ObjectRef]) -> Option<(&Decimal, &Decimal)> {
    match (&args.get(0)?.payload, &args.get(1)?.payload) {
        (Payload::Dec(a), Payload::Dec(b)) => Some((a, b)),
        _ => None,
    }
}

fn dec_add(args: &[ObjectRef]) -> SlotResult {
    let (a, b) = match dec_pair(args) {
        Some(v) => v,
        None => return Ok(None),
    };
    Ok(Some(create_dec(a.add(b))))
}

fn dec_sub(args: &[ObjectRef]) -> SlotResult {
    let (a, b) = match dec_pair(args) {
        Some(v) => v,
        None => return Ok(None),
    };
    Ok(Some(create_dec(a.sub(b))))
}

fn dec_eq(args: &[ObjectRef]) -> SlotResult {
    match dec_pair(args) {
        Some((a, b)) => Ok(Some(create_bool(a == b))),
        None => Ok(Some(state_false())),
    }
}

fn dec_neg(args: &[ObjectRef]) -> SlotResult {
    match &args.get(0).map(|a| &a.payload) {
        Some(Payload::Dec(a)) => Ok(Some(create_dec(a.neg()))),
        _ => Ok(None),
    }
}

fn dec_str(args: &[ObjectRef]) -> SlotResult {
    match &args.get(0).map(|a| &a.payload) {
        Some(Payload::Dec(a)) => Ok(Some(create_str(a.to_decimal_string()))),
        _ => Ok(None),
    }
}

pub(super) fn build() -> MetaType {
    let mut meta = MetaType::new("dec");
    meta.bind(SlotId::Add, dec_add);
    meta.bind(SlotId::Sub, dec_sub);
    meta.bind(SlotId::Eq, dec_eq);
    meta.bind(SlotId::Weq, numeric_weq);
    meta.bind(SlotId::Neg, dec_neg);
    meta.bind(SlotId::Str, dec_str);
    meta
}
