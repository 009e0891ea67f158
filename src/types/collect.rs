//! Operator slots for the container types: list, dict, tuple, and record.
//!
//! Index access past the end of a sequence reports "unsupported" rather
//! than an error so the iteration protocol can detect exhaustion; a missing
//! dict or record key comes back as the NotFound sentinel.

use crate::types::{create_bool, create_list, create_str, display_value, state_none, state_not_found, state_true};
use crate::vm::mem::{structural_eq, DictKey, ObjectRef, Payload};
use crate::vm::meta::{MetaType, SlotId, SlotResult};

fn sequence_index(args: &[ObjectRef]) -> Option<usize> {
    match args.get(1).map(|a| &a.payload) {
        Some(Payload::Int(i)) if *i >= 0 => Some(*i as usize),
        _ => None,
    }
}

// --- list ------------------------------------------------------------------

fn list_add(args: &[ObjectRef]) -> SlotResult {
    let (a, b) = match (&args.get(0).map(|a| &a.payload), &args.get(1).map(|a| &a.payload)) {
        (Some(Payload::List(a)), Some(Payload::List(b))) => (a, b),
        _ => return Ok(None),
    };
    let mut items = a.borrow().clone();
    items.extend(b.borrow().iter().cloned());
    Ok(Some(create_list(items)))
}

fn list_eq(args: &[ObjectRef]) -> SlotResult {
    let (a, b) = match (&args.get(0).map(|a| &a.payload), &args.get(1).map(|a| &a.payload)) {
        (Some(Payload::List(a)), Some(Payload::List(b))) => (a.borrow(), b.borrow()),
        _ => return Ok(Some(crate::types::state_false())),
    };
    let equal =
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| structural_eq(x, y));
    Ok(Some(create_bool(equal)))
}

fn list_getitem(args: &[ObjectRef]) -> SlotResult {
    let items = match args.get(0).map(|a| &a.payload) {
        Some(Payload::List(items)) => items,
        _ => return Ok(None),
    };
    let index = match sequence_index(args) {
        Some(i) => i,
        None => return Ok(None),
    };
    Ok(items.borrow().get(index).cloned())
}

fn list_setitem(args: &[ObjectRef]) -> SlotResult {
    let items = match args.get(0).map(|a| &a.payload) {
        Some(Payload::List(items)) => items,
        _ => return Ok(None),
    };
    let index = match sequence_index(args) {
        Some(i) => i,
        None => return Ok(None),
    };
    let value = match args.get(2) {
        Some(v) => v.clone(),
        None => return Ok(None),
    };

    let mut items = items.borrow_mut();
    if index >= items.len() {
        return Ok(None);
    }
    items[index] = value;
    Ok(Some(state_true()))
}

fn list_delitem(args: &[ObjectRef]) -> SlotResult {
    let items = match args.get(0).map(|a| &a.payload) {
        Some(Payload::List(items)) => items,
        _ => return Ok(None),
    };
    let index = match sequence_index(args) {
        Some(i) => i,
        None => return Ok(None),
    };

    let mut items = items.borrow_mut();
    if index >= items.len() {
        return Ok(None);
    }
    items.remove(index);
    Ok(Some(state_none()))
}

fn list_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::List(_)) => Ok(Some(create_str(display_value(&args[0])))),
        _ => Ok(None),
    }
}

// --- dict ------------------------------------------------------------------

fn dict_getitem(args: &[ObjectRef]) -> SlotResult {
    let map = match args.get(0).map(|a| &a.payload) {
        Some(Payload::Dict(map)) => map,
        _ => return Ok(None),
    };
    let key = match args.get(1) {
        Some(k) => DictKey(k.clone()),
        None => return Ok(None),
    };
    Ok(Some(
        map.borrow().get(&key).cloned().unwrap_or_else(state_not_found),
    ))
}

fn dict_setitem(args: &[ObjectRef]) -> SlotResult {
    let map = match args.get(0).map(|a| &a.payload) {
        Some(Payload::Dict(map)) => map,
        _ => return Ok(None),
    };
    let (key, value) = match (args.get(1), args.get(2)) {
        (Some(k), Some(v)) => (DictKey(k.clone()), v.clone()),
        _ => return Ok(None),
    };
    map.borrow_mut().insert(key, value);
    Ok(Some(state_true()))
}

fn dict_delitem(args: &[ObjectRef]) -> SlotResult {
    let map = match args.get(0).map(|a| &a.payload) {
        Some(Payload::Dict(map)) => map,
        _ => return Ok(None),
    };
    let key = match args.get(1) {
        Some(k) => DictKey(k.clone()),
        None => return Ok(None),
    };
    Ok(Some(match map.borrow_mut().remove(&key) {
        Some(_) => state_none(),
        None => state_not_found(),
    }))
}

fn dict_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Dict(_)) => Ok(Some(create_str(display_value(&args[0])))),
        _ => Ok(None),
    }
}

// --- tuple -----------------------------------------------------------------

fn tuple_getitem(args: &[ObjectRef]) -> SlotResult {
    let items = match args.get(0).map(|a| &a.payload) {
        Some(Payload::Tuple(items)) => items,
        _ => return Ok(None),
    };
    let index = match sequence_index(args) {
        Some(i) => i,
        None => return Ok(None),
    };
    Ok(items.get(index).cloned())
}

fn tuple_eq(args: &[ObjectRef]) -> SlotResult {
    match (args.get(0), args.get(1)) {
        (Some(a), Some(b)) => Ok(Some(create_bool(structural_eq(a, b)))),
        _ => Ok(None),
    }
}

fn tuple_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Tuple(_)) => Ok(Some(create_str(display_value(&args[0])))),
        _ => Ok(None),
    }
}

// --- record ----------------------------------------------------------------

fn record_key(args: &[ObjectRef]) -> Option<&str> {
    match args.get(1).map(|a| &a.payload) {
        Some(Payload::Str(name)) => Some(name),
        _ => None,
    }
}

fn record_getitem(args: &[ObjectRef]) -> SlotResult {
    let map = match args.get(0).map(|a| &a.payload) {
        Some(Payload::Record(map)) => map,
        _ => return Ok(None),
    };
    let name = match record_key(args) {
        Some(n) => n,
        None => return Ok(None),
    };
    Ok(Some(
        map.borrow().get(name).cloned().unwrap_or_else(state_not_found),
    ))
}

fn record_setitem(args: &[ObjectRef]) -> SlotResult {
    let map = match args.get(0).map(|a| &a.payload) {
        Some(Payload::Record(map)) => map,
        _ => return Ok(None),
    };
    let (name, value) = match (record_key(args), args.get(2)) {
        (Some(n), Some(v)) => (n.to_string(), v.clone()),
        _ => return Ok(None),
    };
    map.borrow_mut().insert(name, value);
    Ok(Some(state_true()))
}

fn record_delitem(args: &[ObjectRef]) -> SlotResult {
    let map = match args.get(0).map(|a| &a.payload) {
        Some(Payload::Record(map)) => map,
        _ => return Ok(None),
    };
    let name = match record_key(args) {
        Some(n) => n,
        None => return Ok(None),
    };
    Ok(Some(match map.borrow_mut().remove(name) {
        Some(_) => state_none(),
        None => state_not_found(),
    }))
}

fn record_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Record(_)) => Ok(Some(create_str(display_value(&args[0])))),
        _ => Ok(None),
    }
}

// --- metatype assembly -----------------------------------------------------

pub(super) fn build_list() -> MetaType {
    let mut meta = MetaType::new("list");
    meta.bind(SlotId::Add, list_add);
    meta.bind(SlotId::Eq, list_eq);
    meta.bind(SlotId::GetItem, list_getitem);
    meta.bind(SlotId::SetItem, list_setitem);
    meta.bind(SlotId::DelItem, list_delitem);
    meta.bind(SlotId::Str, list_str);
    meta
}

pub(super) fn build_dict() -> MetaType {
    let mut meta = MetaType::new("dict");
    meta.bind(SlotId::GetItem, dict_getitem);
    meta.bind(SlotId::SetItem, dict_setitem);
    meta.bind(SlotId::DelItem, dict_delitem);
    meta.bind(SlotId::Str, dict_str);
    meta
}

pub(super) fn build_tuple() -> MetaType {
    let mut meta = MetaType::new("tuple");
    meta.bind(SlotId::Eq, tuple_eq);
    meta.bind(SlotId::GetItem, tuple_getitem);
    meta.bind(SlotId::Str, tuple_str);
    meta
}

pub(super) fn build_record() -> MetaType {
    let mut meta = MetaType::new("record");
    meta.bind(SlotId::GetItem, record_getitem);
    meta.bind(SlotId::SetItem, record_setitem);
    meta.bind(SlotId::DelItem, record_delitem);
    meta.bind(SlotId::Str, record_str);
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{create_dict, create_int, create_int64, create_tuple, is_not_found};
    use crate::vm::mem::State;

    #[test]
    fn list_concat_preserves_order() {
        let a = create_list(vec![create_int(1), create_int(2)]);
        let b = create_list(vec![create_int(3)]);
        let joined = list_add(&[a, b]).unwrap().unwrap();
        match &joined.payload {
            Payload::List(items) => {
                let items = items.borrow();
                assert_eq!(items.len(), 3);
                assert!(matches!(items[2].payload, Payload::Int(3)));
            }
            other => panic!("expected list, found {}", other.tag()),
        }
    }

    #[test]
    fn list_set_and_del() {
        let list = create_list(vec![create_int(1), create_int(2)]);
        list_setitem(&[list.clone(), create_int(0), create_int(9)]).unwrap().unwrap();
        let head = list_getitem(&[list.clone(), create_int(0)]).unwrap().unwrap();
        assert!(matches!(head.payload, Payload::Int(9)));

        list_delitem(&[list.clone(), create_int(0)]).unwrap().unwrap();
        let head = list_getitem(&[list.clone(), create_int(0)]).unwrap().unwrap();
        assert!(matches!(head.payload, Payload::Int(2)));

        // past the end: unsupported, so iteration can stop
        assert!(list_getitem(&[list, create_int(5)]).unwrap().is_none());
    }

    #[test]
    fn dict_round_trip_and_missing_key() {
        let dict = create_dict(vec![]);
        dict_setitem(&[dict.clone(), create_str("k"), create_int(5)]).unwrap().unwrap();
        let hit = dict_getitem(&[dict.clone(), create_str("k")]).unwrap().unwrap();
        assert!(matches!(hit.payload, Payload::Int(5)));

        let miss = dict_getitem(&[dict.clone(), create_str("absent")]).unwrap().unwrap();
        assert!(is_not_found(&miss));

        // Int and Int64 keys are interchangeable.
        dict_setitem(&[dict.clone(), create_int(1), create_str("one")]).unwrap().unwrap();
        let wide = dict_getitem(&[dict, create_int64(1)]).unwrap().unwrap();
        assert!(matches!(&wide.payload, Payload::Str(s) if s == "one"));
    }

    #[test]
    fn tuple_equality_is_structural() {
        let a = create_tuple(vec![create_int(1), create_str("x")]);
        let b = create_tuple(vec![create_int(1), create_str("x")]);
        let eq = tuple_eq(&[a, b]).unwrap().unwrap();
        assert!(matches!(eq.payload, Payload::State(State::True)));
    }

    #[test]
    fn record_fields() {
        let rec = crate::types::create_record(vec![("x".to_string(), create_int(1))]);
        let x = record_getitem(&[rec.clone(), create_str("x")]).unwrap().unwrap();
        assert!(matches!(x.payload, Payload::Int(1)));

        record_delitem(&[rec.clone(), create_str("x")]).unwrap().unwrap();
        let gone = record_getitem(&[rec, create_str("x")]).unwrap().unwrap();
        assert!(is_not_found(&gone));
    }
}
