//! The built-in type library.
//!
//! One metatype per primitive variant, built once per thread and shared by
//! every value of that variant. Classes get their own metatype at creation
//! (see [`create_class`]). The constructor helpers here are the only way
//! values come to life, so everything is born with a valid metatype.

pub mod bigint;
pub mod decimal;

mod collect;
mod float;
mod int;
mod state;
mod string;

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::vm::mem::{
    Class, CodeObject, DictKey, Function, Instance, Module, Object, ObjectRef, Payload, State,
};
use crate::vm::meta::{MetaType, SlotId, SlotResult};

use self::bigint::BigInt;
use self::decimal::Decimal;

pub struct TypeRegistry {
    pub int: Rc<MetaType>,
    pub int64: Rc<MetaType>,
    pub big_int: Rc<MetaType>,
    pub float: Rc<MetaType>,
    pub double: Rc<MetaType>,
    pub dec: Rc<MetaType>,
    pub string: Rc<MetaType>,
    pub list: Rc<MetaType>,
    pub dict: Rc<MetaType>,
    pub tuple: Rc<MetaType>,
    pub record: Rc<MetaType>,
    pub state: Rc<MetaType>,
    pub function: Rc<MetaType>,
    pub code: Rc<MetaType>,
    pub module: Rc<MetaType>,
    pub meta: Rc<MetaType>,
}

impl TypeRegistry {
    fn bootstrap() -> TypeRegistry {
        TypeRegistry {
            int: Rc::new(int::build_int()),
            int64: Rc::new(int::build_int64()),
            big_int: Rc::new(bigint::build()),
            float: Rc::new(float::build_float()),
            double: Rc::new(float::build_double()),
            dec: Rc::new(decimal::build()),
            string: Rc::new(string::build()),
            list: Rc::new(collect::build_list()),
            dict: Rc::new(collect::build_dict()),
            tuple: Rc::new(collect::build_tuple()),
            record: Rc::new(collect::build_record()),
            state: Rc::new(state::build()),
            function: Rc::new(build_function_type()),
            code: Rc::new(MetaType::new("code")),
            module: Rc::new(build_module_type()),
            meta: Rc::new(MetaType::new("metatype")),
        }
    }
}

thread_local! {
    static TYPES: TypeRegistry = TypeRegistry::bootstrap();

    // Canonical state singletons, indexed by the state's numeric value.
    static STATES: [ObjectRef; 4] = [
        Object::new(state_type(), Payload::State(State::False)),
        Object::new(state_type(), Payload::State(State::True)),
        Object::new(state_type(), Payload::State(State::None)),
        Object::new(state_type(), Payload::State(State::NotFound)),
    ];
}

pub fn int_type() -> Rc<MetaType> {
    TYPES.with(|t| t.int.clone())
}

pub fn int64_type() -> Rc<MetaType> {
    TYPES.with(|t| t.int64.clone())
}

pub fn big_int_type() -> Rc<MetaType> {
    TYPES.with(|t| t.big_int.clone())
}

pub fn float_type() -> Rc<MetaType> {
    TYPES.with(|t| t.float.clone())
}

pub fn double_type() -> Rc<MetaType> {
    TYPES.with(|t| t.double.clone())
}

pub fn dec_type() -> Rc<MetaType> {
    TYPES.with(|t| t.dec.clone())
}

pub fn str_type() -> Rc<MetaType> {
    TYPES.with(|t| t.string.clone())
}

pub fn list_type() -> Rc<MetaType> {
    TYPES.with(|t| t.list.clone())
}

pub fn dict_type() -> Rc<MetaType> {
    TYPES.with(|t| t.dict.clone())
}

pub fn tuple_type() -> Rc<MetaType> {
    TYPES.with(|t| t.tuple.clone())
}

pub fn record_type() -> Rc<MetaType> {
    TYPES.with(|t| t.record.clone())
}

pub fn state_type() -> Rc<MetaType> {
    TYPES.with(|t| t.state.clone())
}

pub fn function_type() -> Rc<MetaType> {
    TYPES.with(|t| t.function.clone())
}

pub fn code_type() -> Rc<MetaType> {
    TYPES.with(|t| t.code.clone())
}

pub fn module_type() -> Rc<MetaType> {
    TYPES.with(|t| t.module.clone())
}

pub fn meta_type() -> Rc<MetaType> {
    TYPES.with(|t| t.meta.clone())
}

// ---------------------------------------------------------------------------
// constructor helpers

pub fn create_int(value: i32) -> ObjectRef {
    Object::new(int_type(), Payload::Int(value))
}

pub fn create_int64(value: i64) -> ObjectRef {
    Object::new(int64_type(), Payload::Int64(value))
}

pub fn create_big_int(value: BigInt) -> ObjectRef {
    Object::new(big_int_type(), Payload::BigInt(value))
}

pub fn create_float(value: f32) -> ObjectRef {
    Object::new(float_type(), Payload::Float(value))
}

pub fn create_double(value: f64) -> ObjectRef {
    Object::new(double_type(), Payload::Double(value))
}

pub fn create_dec(value: Decimal) -> ObjectRef {
    Object::new(dec_type(), Payload::Dec(value))
}

pub fn create_str(value: impl Into<String>) -> ObjectRef {
    Object::new(str_type(), Payload::Str(value.into()))
}

pub fn create_list(items: Vec<ObjectRef>) -> ObjectRef {
    Object::new(list_type(), Payload::List(RefCell::new(items)))
}

pub fn create_dict(entries: Vec<(ObjectRef, ObjectRef)>) -> ObjectRef {
    let map = entries
        .into_iter()
        .map(|(k, v)| (DictKey(k), v))
        .collect::<HashMap<_, _>>();
    Object::new(dict_type(), Payload::Dict(RefCell::new(map)))
}

pub fn create_tuple(items: Vec<ObjectRef>) -> ObjectRef {
    Object::new(tuple_type(), Payload::Tuple(items))
}

pub fn create_record(entries: Vec<(String, ObjectRef)>) -> ObjectRef {
    let map = entries.into_iter().collect::<HashMap<_, _>>();
    Object::new(record_type(), Payload::Record(RefCell::new(map)))
}

/// Returns the canonical singleton for a state value; `state(None)` returned
/// here is the same object every time.
pub fn create_state(value: State) -> ObjectRef {
    STATES.with(|s| s[value as usize].clone())
}

pub fn create_bool(value: bool) -> ObjectRef {
    create_state(if value { State::True } else { State::False })
}

pub fn state_true() -> ObjectRef {
    create_state(State::True)
}

pub fn state_false() -> ObjectRef {
    create_state(State::False)
}

pub fn state_none() -> ObjectRef {
    create_state(State::None)
}

pub fn state_not_found() -> ObjectRef {
    create_state(State::NotFound)
}

pub fn is_not_found(obj: &ObjectRef) -> bool {
    matches!(obj.payload, Payload::State(State::NotFound))
}

pub fn create_code(
    local_count: usize,
    consts: Vec<ObjectRef>,
    names: Vec<String>,
    code: Vec<i32>,
    line_map: Vec<(usize, usize)>,
) -> Rc<CodeObject> {
    Rc::new(CodeObject {
        locals: vec![state_none(); local_count],
        consts,
        names,
        code,
        line_map,
    })
}

pub fn create_function(
    name: impl Into<String>,
    arg_count: usize,
    code: Rc<CodeObject>,
    free_names: Vec<String>,
    env: Option<Rc<RefCell<HashMap<String, ObjectRef>>>>,
) -> ObjectRef {
    Object::new(
        function_type(),
        Payload::Function(Function {
            name: name.into(),
            arg_count,
            code,
            free_names,
            env,
        }),
    )
}

pub fn create_module(
    name: impl Into<String>,
    path: impl Into<PathBuf>,
    names: Vec<String>,
    code: Rc<CodeObject>,
    exports: Vec<String>,
) -> ObjectRef {
    Object::new(
        module_type(),
        Payload::Module(Module {
            name: name.into(),
            path: path.into(),
            names,
            globals: Rc::new(RefCell::new(HashMap::new())),
            code,
            exports,
        }),
    )
}

pub fn create_code_value(code: Rc<CodeObject>) -> ObjectRef {
    Object::new(code_type(), Payload::Code(code))
}

pub fn create_meta_value(meta: Rc<MetaType>) -> ObjectRef {
    Object::new(meta_type(), Payload::Meta(meta))
}

/// Builds a class value together with its metatype. Attributes whose names
/// match an overridable slot's dunder form and hold a function become user
/// slots, so instances of the class dispatch operators to them.
pub fn create_class(
    name: impl Into<String>,
    parents: Vec<ObjectRef>,
    names: Vec<String>,
    attrs: Vec<(String, ObjectRef)>,
) -> ObjectRef {
    let name = name.into();
    let mut meta = MetaType::new(name.clone());
    meta.bind(SlotId::New, class_new);
    meta.bind(SlotId::Str, class_str);

    for (attr_name, value) in &attrs {
        if value.as_function().is_none() {
            continue;
        }
        for id in SlotId::ALL.iter() {
            if id.dunder() == Some(attr_name.as_str()) {
                meta.bind_user(*id, value.clone());
            }
        }
    }

    Object::new(
        Rc::new(meta),
        Payload::Class(Class {
            name,
            parents,
            names,
            attrs: RefCell::new(attrs.into_iter().collect()),
        }),
    )
}

/// Native `new` slot shared by every class metatype: allocates an empty
/// instance bound to the class and its metatype.
fn class_new(args: &[ObjectRef]) -> SlotResult {
    let class_obj = match args.get(0) {
        Some(obj) => obj,
        None => return Ok(None),
    };
    let class = match &class_obj.payload {
        Payload::Class(c) => c,
        _ => return Ok(None),
    };

    Ok(Some(Object::new(
        class_obj.meta.clone(),
        Payload::Instance(Instance {
            class: class_obj.clone(),
            names: class.names.clone(),
            fields: RefCell::new(HashMap::new()),
        }),
    )))
}

// Shared by class values and their instances, which use the same metatype.
fn class_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Class(_)) | Some(Payload::Instance(_)) => {
            Ok(Some(create_str(display_value(&args[0]))))
        }
        _ => Ok(None),
    }
}

fn build_function_type() -> MetaType {
    let mut meta = MetaType::new("function");
    meta.bind(SlotId::Str, function_str);
    meta
}

fn function_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Function(f)) => Ok(Some(create_str(format!("<function {}>", f.name)))),
        _ => Ok(None),
    }
}

fn build_module_type() -> MetaType {
    let mut meta = MetaType::new("module");
    meta.bind(SlotId::Str, module_str);
    meta
}

fn module_str(args: &[ObjectRef]) -> SlotResult {
    match args.get(0).map(|a| &a.payload) {
        Some(Payload::Module(m)) => Ok(Some(create_str(format!("<module {}>", m.name)))),
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// shared rendering and coercion

/// Human-readable rendering used by the native `str` slots and diagnostics.
pub fn display_value(obj: &ObjectRef) -> String {
    match &obj.payload {
        Payload::Int(v) => v.to_string(),
        Payload::Int64(v) => v.to_string(),
        Payload::BigInt(v) => v.to_decimal_string(),
        Payload::Float(v) => v.to_string(),
        Payload::Double(v) => v.to_string(),
        Payload::Dec(v) => v.to_decimal_string(),
        Payload::Str(v) => v.clone(),
        Payload::State(v) => v.name().to_string(),
        Payload::List(items) => {
            let rendered: Vec<String> = items.borrow().iter().map(display_value).collect();
            format!("[{}]", rendered.join(", "))
        }
        Payload::Tuple(items) => {
            let rendered: Vec<String> = items.iter().map(display_value).collect();
            format!("({})", rendered.join(", "))
        }
        Payload::Dict(map) => {
            let rendered: Vec<String> = map
                .borrow()
                .iter()
                .map(|(k, v)| format!("{}: {}", display_value(&k.0), display_value(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
        Payload::Record(map) => {
            let rendered: Vec<String> = map
                .borrow()
                .iter()
                .map(|(k, v)| format!("{}: {}", k, display_value(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
        Payload::Function(f) => format!("<function {}>", f.name),
        Payload::Class(c) => format!("<class {}>", c.name),
        Payload::Instance(inst) => match &inst.class.payload {
            Payload::Class(c) => format!("<instance of {}>", c.name),
            _ => "<instance>".to_string(),
        },
        Payload::Code(_) => "<code>".to_string(),
        Payload::Module(m) => format!("<module {}>", m.name),
        Payload::Meta(m) => format!("<metatype {}>", m.name),
    }
}

pub(crate) fn numeric_value(obj: &ObjectRef) -> Option<f64> {
    match &obj.payload {
        Payload::Int(v) => Some(f64::from(*v)),
        Payload::Int64(v) => Some(*v as f64),
        Payload::BigInt(v) => Some(v.to_f64()),
        Payload::Float(v) => Some(f64::from(*v)),
        Payload::Double(v) => Some(*v),
        Payload::Dec(v) => Some(v.to_f64()),
        _ => None,
    }
}

/// Weak equality: any two numeric variants compare through f64 coercion.
/// Bound as the `weq` slot of every numeric metatype.
pub(crate) fn numeric_weq(args: &[ObjectRef]) -> SlotResult {
    if args.len() != 2 {
        return Ok(None);
    }
    match (numeric_value(&args[0]), numeric_value(&args[1])) {
        (Some(a), Some(b)) => Ok(Some(create_bool(a == b))),
        _ => Ok(Some(state_false())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::meta::Slot;

    #[test]
    fn state_singletons_are_canonical() {
        assert_eq!(state_none().id, state_none().id);
        assert_eq!(state_true().id, create_bool(true).id);
        assert_ne!(state_true().id, state_false().id);
    }

    #[test]
    fn values_are_born_with_metatypes() {
        assert_eq!(create_int(1).meta.name, "int");
        assert_eq!(create_str("x").meta.name, "str");
        assert_eq!(create_list(vec![]).meta.name, "list");
        assert_eq!(create_dec(Decimal::zero()).meta.name, "dec");
    }

    #[test]
    fn class_metatype_binds_dunder_methods() {
        let code = create_code(2, vec![], vec![], vec![], vec![]);
        let add = create_function("__add__", 2, code, vec![], None);
        let class = create_class("Point", vec![], vec![], vec![("__add__".to_string(), add)]);

        assert!(matches!(class.meta.slot(SlotId::Add), Slot::User(_)));
        assert!(matches!(class.meta.slot(SlotId::New), Slot::Native(_)));
        assert!(!class.meta.is_bound(SlotId::Sub));
    }

    #[test]
    fn weak_equality_coerces_numerics() {
        let result = numeric_weq(&[create_int(3), create_double(3.0)]).unwrap().unwrap();
        assert!(matches!(result.payload, Payload::State(State::True)));

        let result = numeric_weq(&[create_int(3), create_str("3")]).unwrap().unwrap();
        assert!(matches!(result.payload, Payload::State(State::False)));
    }

    #[test]
    fn display_covers_containers() {
        let list = create_list(vec![create_int(1), create_str("a")]);
        assert_eq!(display_value(&list), "[1, a]");
        let tuple = create_tuple(vec![create_int(1), create_int(2)]);
        assert_eq!(display_value(&tuple), "(1, 2)");
    }
}
