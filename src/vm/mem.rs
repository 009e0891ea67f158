//! The runtime value model.
//!
//! Every value is an [`Object`]: a unique identity, a shared pointer to the
//! [`MetaType`] that provides operator dispatch, and a variant payload. All
//! sharing goes through `Rc`; containers and instance fields use `RefCell`
//! for interior mutability. Reference counting is the only reclamation
//! mechanism, so cyclic structures leak — an accepted property of the design.

use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hashbrown::HashMap;

use crate::error::VmError;
use crate::types::bigint::BigInt;
use crate::types::decimal::Decimal;
use crate::vm::meta::MetaType;

pub type ObjectRef = Rc<Object>;

/// Process-wide monotonic identity source. Identities are never reused; they
/// back `is`-style comparisons and show up in diagnostics.
static NEXT_OBJECT_ID: AtomicUsize = AtomicUsize::new(0);

pub fn next_object_id() -> usize {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

pub struct Object {
    pub id: usize,
    pub meta: Rc<MetaType>,
    pub payload: Payload,
}

/// The four-valued logic variant. `None` doubles as the generic unit value
/// and `NotFound` as the missing-lookup sentinel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum State {
    False = 0,
    True = 1,
    None = 2,
    NotFound = 3,
}

impl State {
    pub fn name(self) -> &'static str {
        match self {
            State::False => "False",
            State::True => "True",
            State::None => "None",
            State::NotFound => "NotFound",
        }
    }
}

pub enum Payload {
    Int(i32),
    Int64(i64),
    BigInt(BigInt),
    Float(f32),
    Double(f64),
    Dec(Decimal),
    Str(String),
    List(RefCell<Vec<ObjectRef>>),
    Dict(RefCell<HashMap<DictKey, ObjectRef>>),
    Tuple(Vec<ObjectRef>),
    Record(RefCell<HashMap<String, ObjectRef>>),
    State(State),
    Function(Function),
    Class(Class),
    Instance(Instance),
    Code(Rc<CodeObject>),
    Module(Module),
    Meta(Rc<MetaType>),
}

impl Payload {
    pub fn tag(&self) -> &'static str {
        match self {
            Payload::Int(_) => "int",
            Payload::Int64(_) => "long",
            Payload::BigInt(_) => "bigint",
            Payload::Float(_) => "float",
            Payload::Double(_) => "double",
            Payload::Dec(_) => "dec",
            Payload::Str(_) => "str",
            Payload::List(_) => "list",
            Payload::Dict(_) => "dict",
            Payload::Tuple(_) => "tuple",
            Payload::Record(_) => "record",
            Payload::State(_) => "state",
            Payload::Function(_) => "function",
            Payload::Class(_) => "class",
            Payload::Instance(_) => "instance",
            Payload::Code(_) => "code",
            Payload::Module(_) => "module",
            Payload::Meta(_) => "metatype",
        }
    }
}

/// A user or module function. Built-in functions appear as stubs whose names
/// match the registry; the dispatch loop intercepts those before framing.
pub struct Function {
    pub name: String,
    pub arg_count: usize,
    pub code: Rc<CodeObject>,
    pub free_names: Vec<String>,
    pub env: Option<Rc<RefCell<HashMap<String, ObjectRef>>>>,
}

pub struct Class {
    pub name: String,
    pub parents: Vec<ObjectRef>,
    pub names: Vec<String>,
    pub attrs: RefCell<HashMap<String, ObjectRef>>,
}

pub struct Instance {
    pub class: ObjectRef,
    pub names: Vec<String>,
    pub fields: RefCell<HashMap<String, ObjectRef>>,
}

/// Immutable once built. The locals vector is a template: frames clone it
/// and its length fixes the frame's local count.
pub struct CodeObject {
    pub locals: Vec<ObjectRef>,
    pub consts: Vec<ObjectRef>,
    pub names: Vec<String>,
    pub code: Vec<i32>,
    /// Pairs of (instruction offset, source line), offsets ascending.
    pub line_map: Vec<(usize, usize)>,
}

impl CodeObject {
    /// Source line covering the given instruction offset, if mapped.
    pub fn line_for(&self, offset: usize) -> Option<usize> {
        let mut line = None;
        for (start, src_line) in &self.line_map {
            if *start <= offset {
                line = Some(*src_line);
            } else {
                break;
            }
        }
        line
    }
}

pub struct Module {
    pub name: String,
    pub path: PathBuf,
    pub names: Vec<String>,
    pub globals: Rc<RefCell<HashMap<String, ObjectRef>>>,
    pub code: Rc<CodeObject>,
    /// Symbol names resolved by the native loader when this module backs a
    /// shared library.
    pub exports: Vec<String>,
}

/// One managed heap cell reserved by `ALLOC`.
pub struct Allocation {
    pub size: usize,
    pub data: Option<ObjectRef>,
}

impl Object {
    pub fn new(meta: Rc<MetaType>, payload: Payload) -> ObjectRef {
        Rc::new(Object {
            id: next_object_id(),
            meta,
            payload,
        })
    }

    pub fn type_tag(&self) -> &'static str {
        self.payload.tag()
    }

    pub fn expect_int(&self) -> Result<i32, VmError> {
        match &self.payload {
            Payload::Int(v) => Ok(*v),
            _ => Err(VmError::type_error(format!(
                "expected int, found {}",
                self.type_tag()
            ))),
        }
    }

    pub fn expect_state(&self) -> Result<State, VmError> {
        match &self.payload {
            Payload::State(v) => Ok(*v),
            _ => Err(VmError::type_error(format!(
                "expected state, found {}",
                self.type_tag()
            ))),
        }
    }

    pub fn expect_str(&self) -> Result<&str, VmError> {
        match &self.payload {
            Payload::Str(v) => Ok(v),
            _ => Err(VmError::type_error(format!(
                "expected str, found {}",
                self.type_tag()
            ))),
        }
    }

    pub fn expect_module(&self) -> Result<&Module, VmError> {
        match &self.payload {
            Payload::Module(v) => Ok(v),
            _ => Err(VmError::type_error(format!(
                "expected module, found {}",
                self.type_tag()
            ))),
        }
    }

    pub fn expect_class(&self) -> Result<&Class, VmError> {
        match &self.payload {
            Payload::Class(v) => Ok(v),
            _ => Err(VmError::type_error(format!(
                "expected class, found {}",
                self.type_tag()
            ))),
        }
    }

    pub fn expect_instance(&self) -> Result<&Instance, VmError> {
        match &self.payload {
            Payload::Instance(v) => Ok(v),
            _ => Err(VmError::type_error(format!(
                "expected instance, found {}",
                self.type_tag()
            ))),
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.payload {
            Payload::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl Debug for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{} id={}>", self.type_tag(), self.id)
    }
}

/// Structural equality for container membership and dict keys. Primitive
/// variants compare by value (floats by bit pattern so `Eq` stays lawful),
/// tuples recursively, everything else by identity.
pub fn structural_eq(a: &ObjectRef, b: &ObjectRef) -> bool {
    match (&a.payload, &b.payload) {
        (Payload::Int(x), Payload::Int(y)) => x == y,
        (Payload::Int64(x), Payload::Int64(y)) => x == y,
        (Payload::BigInt(x), Payload::BigInt(y)) => x == y,
        (Payload::Float(x), Payload::Float(y)) => x.to_bits() == y.to_bits(),
        (Payload::Double(x), Payload::Double(y)) => x.to_bits() == y.to_bits(),
        (Payload::Dec(x), Payload::Dec(y)) => x == y,
        (Payload::Str(x), Payload::Str(y)) => x == y,
        (Payload::State(x), Payload::State(y)) => x == y,
        (Payload::Tuple(x), Payload::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| structural_eq(a, b))
        }
        _ => a.id == b.id,
    }
}

fn hash_value<H: Hasher>(obj: &ObjectRef, state: &mut H) {
    match &obj.payload {
        Payload::Int(v) => {
            0u8.hash(state);
            (*v as i64).hash(state);
        }
        Payload::Int64(v) => {
            0u8.hash(state);
            v.hash(state);
        }
        Payload::BigInt(v) => {
            1u8.hash(state);
            v.negative.hash(state);
            v.limbs.hash(state);
        }
        Payload::Float(v) => {
            2u8.hash(state);
            (f64::from(*v)).to_bits().hash(state);
        }
        Payload::Double(v) => {
            2u8.hash(state);
            v.to_bits().hash(state);
        }
        Payload::Dec(v) => {
            3u8.hash(state);
            v.negative.hash(state);
            v.int_limbs.hash(state);
            v.frac_limbs.hash(state);
        }
        Payload::Str(v) => {
            4u8.hash(state);
            v.hash(state);
        }
        Payload::State(v) => {
            5u8.hash(state);
            v.hash(state);
        }
        Payload::Tuple(items) => {
            6u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        _ => {
            7u8.hash(state);
            obj.id.hash(state);
        }
    }
}

/// Dict key wrapper: identity-or-structural equality depending on the
/// wrapped value's variant.
#[derive(Clone, Debug)]
pub struct DictKey(pub ObjectRef);

impl PartialEq for DictKey {
    fn eq(&self, other: &Self) -> bool {
        // Int and Int64 keys are interchangeable when numerically equal.
        match (&self.0.payload, &other.0.payload) {
            (Payload::Int(x), Payload::Int64(y)) | (Payload::Int64(y), Payload::Int(x)) => {
                i64::from(*x) == *y
            }
            _ => structural_eq(&self.0, &other.0),
        }
    }
}

impl Eq for DictKey {}

impl Hash for DictKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}
