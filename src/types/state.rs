//! Operator slots for the four-valued state type. Logical negation in the
//! source language compiles down to equality against these states, so the
//! type only needs comparison and rendering.

use crate::types::{create_bool, create_str, state_false, state_none};
use crate::vm::mem::{ObjectRef, Payload};
use crate::vm::meta::{MetaType, SlotId, SlotResult};

fn state_eq(args: &[ObjectRef]) -> SlotResult {
    match (&args.get(0).map(|a| &a.payload), &args.get(1).map(|a| &a.payload)) {
        (Some(Payload::State(a)), Some(Payload::State(b))) => Ok(Some(create_bool(a == b))),
        (Some(_), Some(_)) => Ok(Some(state_false())),
        _ => Ok(None),
    }
}

fn state_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::State(v)) => Ok(Some(create_str(v.name()))),
        _ => Ok(None),
    }
}

fn state_nil(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::State(_)) => Ok(Some(state_none())),
        _ => Ok(None),
    }
}

pub(super) fn build() -> MetaType {
    let mut meta = MetaType::new("state");
    meta.bind(SlotId::Eq, state_eq);
    meta.bind(SlotId::Weq, state_eq);
    meta.bind(SlotId::Str, state_str);
    meta.bind(SlotId::Nil, state_nil);
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{create_int, state_not_found, state_true};
    use crate::vm::mem::State;

    #[test]
    fn states_compare_by_value() {
        let eq = state_eq(&[state_true(), state_true()]).unwrap().unwrap();
        assert!(matches!(eq.payload, Payload::State(State::True)));

        let ne = state_eq(&[state_true(), state_not_found()]).unwrap().unwrap();
        assert!(matches!(ne.payload, Payload::State(State::False)));
    }

    #[test]
    fn mismatched_equality_is_false() {
        let result = state_eq(&[state_true(), create_int(1)]).unwrap().unwrap();
        assert!(matches!(result.payload, Payload::State(State::False)));
    }

    #[test]
    fn renders_names() {
        let rendered = state_str(&[state_not_found()]).unwrap().unwrap();
        assert!(matches!(&rendered.payload, Payload::Str(s) if s == "NotFound"));
    }
}
