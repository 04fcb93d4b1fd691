//! Runtime values and the object model.
//!
//! TyrtLang values are strictly tagged: there is no implicit coercion
//! between strings and integers.  Sequences and mappings are shared,
//! mutable containers (assigning one to another name aliases it), and class
//! instances hold a shared reference to their class's method table.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use super::error::RuntimeError;

/// A shared, mutable ordered list.
pub type Sequence = Rc<RefCell<Vec<Value>>>;

/// A shared, mutable key → value mapping.
pub type Mapping = Rc<RefCell<BTreeMap<MapKey, Value>>>;

/// Method name of the initializer overload.
pub const INIT_METHOD: &str = "___init___";

// ── Value ─────────────────────────────────────────────────────────────────────

/// A TyrtLang runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Produced by a call whose body falls off the end.
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Seq(Sequence),
    Map(Mapping),
    Instance(Rc<Instance>),
    /// A caught error, bound by `Except as name`.
    Error(Rc<RuntimeError>),
}

impl Value {
    pub fn seq(items: Vec<Value>) -> Self {
        Value::Seq(Rc::new(RefCell::new(items)))
    }

    pub fn empty_map() -> Self {
        Value::Map(Rc::new(RefCell::new(BTreeMap::new())))
    }

    /// Truthiness used by conditionals and pre-test loops.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Seq(items) => !items.borrow().is_empty(),
            Value::Map(map) => !map.borrow().is_empty(),
            Value::Instance(_) | Value::Error(_) => true,
        }
    }

    /// Name of the value's tag, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Str(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "mapping",
            Value::Instance(_) => "instance",
            Value::Error(_) => "error",
        }
    }

    /// Integer view of integers and booleans.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Rendering used for elements nested inside a sequence or mapping:
    /// strings are quoted.
    pub fn repr(&self) -> String {
        struct Nested<'a>(&'a Value);
        impl fmt::Display for Nested<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.write_within(f, &mut Vec::new(), true)
            }
        }
        Nested(self).to_string()
    }

    // ── Native operators ──────────────────────────────────────────────────────

    /// Native `+`: integer addition, string or sequence concatenation.
    pub fn add(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::Seq(a), Value::Seq(b)) => {
                let mut joined = a.borrow().clone();
                joined.extend(b.borrow().iter().cloned());
                Ok(Value::seq(joined))
            }
            _ => match (self.as_int(), rhs.as_int()) {
                (Some(a), Some(b)) => a
                    .checked_add(b)
                    .map(Value::Int)
                    .ok_or_else(|| RuntimeError::failure(format!("integer overflow in {a} + {b}"))),
                _ => Err(RuntimeError::failure(format!(
                    "unsupported operand types for +: {} and {}",
                    self.type_name(),
                    rhs.type_name()
                ))),
            },
        }
    }

    /// Native ordering for `>` and `<`: integers numerically, strings
    /// lexically.
    pub fn compare(&self, rhs: &Value) -> Result<std::cmp::Ordering, RuntimeError> {
        if let (Value::Str(a), Value::Str(b)) = (self, rhs) {
            return Ok(a.cmp(b));
        }
        match (self.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => Ok(a.cmp(&b)),
            _ => Err(RuntimeError::failure(format!(
                "cannot compare {} with {}",
                self.type_name(),
                rhs.type_name()
            ))),
        }
    }

    // ── Native element access ─────────────────────────────────────────────────

    /// `value[index]` on a sequence or mapping.
    pub fn get_index(&self, index: &Value) -> Result<Value, RuntimeError> {
        match self {
            Value::Seq(items) => {
                let items = items.borrow();
                let slot = seq_slot(items.len(), index)?;
                Ok(items[slot].clone())
            }
            Value::Map(map) => {
                let key = MapKey::try_from(index)?;
                map.borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| RuntimeError::failure(format!("key {} not found", index.repr())))
            }
            other => Err(RuntimeError::failure(format!(
                "value of type {} is not indexable",
                other.type_name()
            ))),
        }
    }

    /// `value[index] = new` on a sequence or mapping.
    pub fn set_index(&self, index: &Value, new: Value) -> Result<(), RuntimeError> {
        match self {
            Value::Seq(items) => {
                let mut items = items.borrow_mut();
                let slot = seq_slot(items.len(), index)?;
                items[slot] = new;
                Ok(())
            }
            Value::Map(map) => {
                let key = MapKey::try_from(index)?;
                map.borrow_mut().insert(key, new);
                Ok(())
            }
            other => Err(RuntimeError::failure(format!(
                "value of type {} does not support item assignment",
                other.type_name()
            ))),
        }
    }
}

/// Resolve a (possibly negative) index into a slot of a sequence of `len`.
pub fn seq_slot(len: usize, index: &Value) -> Result<usize, RuntimeError> {
    let i = index.as_int().ok_or_else(|| {
        RuntimeError::failure(format!("sequence index must be an integer, not {}", index.type_name()))
    })?;
    let resolved = if i < 0 { len as i64 + i } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(RuntimeError::failure(format!("index {i} out of range")));
    }
    Ok(resolved as usize)
}

/// Address of a shared container, used to spot self-reference.
type Addr = *const ();

impl Value {
    /// Structural equality that treats a pair of containers already under
    /// comparison as equal, so self-containing values terminate.
    fn eq_within(&self, other: &Value, open: &mut Vec<(Addr, Addr)>) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => {
                let pair = (Rc::as_ptr(a).cast::<()>(), Rc::as_ptr(b).cast::<()>());
                if Rc::ptr_eq(a, b) || open.contains(&pair) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                open.push(pair);
                let same = a.iter().zip(b.iter()).all(|(x, y)| x.eq_within(y, open));
                open.pop();
                same
            }
            (Value::Map(a), Value::Map(b)) => {
                let pair = (Rc::as_ptr(a).cast::<()>(), Rc::as_ptr(b).cast::<()>());
                if Rc::ptr_eq(a, b) || open.contains(&pair) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                open.push(pair);
                let same = a
                    .iter()
                    .zip(b.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && va.eq_within(vb, open));
                open.pop();
                same
            }
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            _ => match (self.as_int(), other.as_int()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Render into `f`.  A container met again while it is still being
    /// rendered prints as `[...]` / `{...}`.
    fn write_within(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<Addr>, nested: bool) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) if nested => write!(f, "'{s}'"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Seq(items) => {
                let addr = Rc::as_ptr(items).cast::<()>();
                if open.contains(&addr) {
                    return write!(f, "[...]");
                }
                open.push(addr);
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.write_within(f, open, true)?;
                }
                open.pop();
                write!(f, "]")
            }
            Value::Map(map) => {
                let addr = Rc::as_ptr(map).cast::<()>();
                if open.contains(&addr) {
                    return write!(f, "{{...}}");
                }
                open.push(addr);
                write!(f, "{{")?;
                for (i, (k, v)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    Value::from(k.clone()).write_within(f, open, true)?;
                    write!(f, ": ")?;
                    v.write_within(f, open, true)?;
                }
                open.pop();
                write!(f, "}}")
            }
            Value::Instance(inst) => write!(f, "{inst}"),
            Value::Error(e) => write!(f, "{e}"),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality; instances and errors compare by identity.
    fn eq(&self, other: &Value) -> bool {
        self.eq_within(other, &mut Vec::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_within(f, &mut Vec::new(), false)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

// ── MapKey ────────────────────────────────────────────────────────────────────

/// A hashable/orderable mapping key.  Booleans are stored as `0`/`1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Int(i64),
    Str(String),
}

impl TryFrom<&Value> for MapKey {
    type Error = RuntimeError;

    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        match v {
            Value::Str(s) => Ok(MapKey::Str(s.clone())),
            other => other.as_int().map(MapKey::Int).ok_or_else(|| {
                RuntimeError::failure(format!("{} cannot be used as a mapping key", other.type_name()))
            }),
        }
    }
}

impl From<MapKey> for Value {
    fn from(k: MapKey) -> Self {
        match k {
            MapKey::Int(n) => Value::Int(n),
            MapKey::Str(s) => Value::Str(s),
        }
    }
}

// ── Operators ─────────────────────────────────────────────────────────────────

/// A surface operator or pseudo-operator that a class may overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Gt,
    Lt,
    GetItem,
    SetItem,
    Print,
    Len,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::GetItem => "getitem",
            Operator::SetItem => "setitem",
            Operator::Print => "print",
            Operator::Len => "len",
        }
    }

    /// The overload method a class defines to implement this operator.
    pub fn method_name(self) -> &'static str {
        match self {
            Operator::Add => "___add___",
            Operator::Sub => "___sub___",
            Operator::Mul => "___mul___",
            Operator::Div => "___truediv___",
            Operator::Eq => "___eq___",
            Operator::Ne => "___ne___",
            Operator::Gt => "___gt___",
            Operator::Lt => "___lt___",
            Operator::GetItem => "___getitem___",
            Operator::SetItem => "___setitem___",
            Operator::Print => "___print___",
            Operator::Len => "___len___",
        }
    }

    /// Pseudo-operators invoked with no operand.
    pub fn is_unary(self) -> bool {
        matches!(self, Operator::Print | Operator::Len)
    }
}

// ── Functions, classes, instances ─────────────────────────────────────────────

/// A user-defined function or method: parameter names plus raw body lines.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Rc<[String]>,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<String>, body: Vec<String>) -> Self {
        Function { name: name.into(), params, body: body.into() }
    }

    /// Parameters bound from call arguments when invoked as a method: a
    /// leading `self` is the receiver and does not count towards arity.
    pub fn method_params(&self) -> &[String] {
        match self.params.first() {
            Some(first) if first == "self" => &self.params[1..],
            _ => &self.params,
        }
    }
}

/// A class: its name and method table.
#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub methods: HashMap<String, Rc<Function>>,
}

impl Class {
    pub fn new(name: impl Into<String>, methods: HashMap<String, Rc<Function>>) -> Self {
        Class { name: name.into(), methods }
    }

    pub fn method(&self, name: &str) -> Option<&Rc<Function>> {
        self.methods.get(name)
    }
}

/// An object created by calling a class.
#[derive(Debug)]
pub struct Instance {
    class: Rc<Class>,
    fields: RefCell<BTreeMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Instance { class, fields: RefCell::new(BTreeMap::new()) }
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    pub fn method(&self, name: &str) -> Option<&Rc<Function>> {
        self.class.method(name)
    }

    /// The overload implementing `op`, if the class defines one.
    pub fn overload(&self, op: Operator) -> Option<&Rc<Function>> {
        self.class.method(op.method_name())
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_owned(), value);
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields.borrow();
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        write!(f, "<{} {{{}}}>", self.class.name, names.join(", "))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn point_class() -> Rc<Class> {
        let mut methods = HashMap::new();
        methods.insert(
            "___add___".to_owned(),
            Rc::new(Function::new("___add___", vec!["self".into(), "other".into()], vec![])),
        );
        Rc::new(Class::new("Point", methods))
    }

    #[test]
    fn display() {
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::None.to_string(), "None");
        let seq = Value::seq(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(seq.to_string(), "[1, 'a']");
        assert_eq!(Value::empty_map().to_string(), "{}");
    }

    #[test]
    fn self_containing_sequence_renders_and_compares() {
        let xs = Value::seq(vec![Value::Int(1)]);
        let Value::Seq(inner) = &xs else { unreachable!() };
        inner.borrow_mut().push(xs.clone());
        assert_eq!(xs.to_string(), "[1, [...]]");
        assert_eq!(xs.repr(), "[1, [...]]");

        let ys = Value::seq(vec![Value::Int(1)]);
        let Value::Seq(inner) = &ys else { unreachable!() };
        inner.borrow_mut().push(ys.clone());
        assert!(xs == ys);
        assert!(xs == xs.clone());

        let m = Value::empty_map();
        m.set_index(&Value::from("me"), m.clone()).unwrap();
        assert_eq!(m.to_string(), "{'me': {...}}");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Int(0).truthy());
        assert!(Value::Int(3).truthy());
        assert!(!Value::from("").truthy());
        assert!(!Value::seq(vec![]).truthy());
        assert!(!Value::None.truthy());
        assert!(Value::Instance(Rc::new(Instance::new(point_class()))).truthy());
    }

    #[test]
    fn add_is_strictly_typed() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)).unwrap(), Value::Int(5));
        assert_eq!(Value::from("ab").add(&Value::from("c")).unwrap(), Value::from("abc"));
        assert!(Value::Int(1).add(&Value::from("1")).is_err());
        assert!(Value::Int(i64::MAX).add(&Value::Int(1)).is_err());
    }

    #[test]
    fn sequence_concatenation_makes_a_new_sequence() {
        let a = Value::seq(vec![Value::Int(1)]);
        let b = Value::seq(vec![Value::Int(2)]);
        let joined = a.add(&b).unwrap();
        assert_eq!(joined.to_string(), "[1, 2]");
        assert_eq!(a.to_string(), "[1]");
    }

    #[test]
    fn compare_integers_and_strings() {
        use std::cmp::Ordering;
        assert_eq!(Value::Int(5).compare(&Value::Int(3)).unwrap(), Ordering::Greater);
        assert_eq!(Value::from("a").compare(&Value::from("b")).unwrap(), Ordering::Less);
        assert!(Value::from("a").compare(&Value::Int(1)).is_err());
    }

    #[test]
    fn equality() {
        assert_eq!(Value::Int(1), Value::Bool(true));
        assert_ne!(Value::Int(1), Value::from("1"));
        assert_eq!(
            Value::seq(vec![Value::Int(1)]),
            Value::seq(vec![Value::Int(1)])
        );
        let class = point_class();
        let a = Value::Instance(Rc::new(Instance::new(class.clone())));
        let b = Value::Instance(Rc::new(Instance::new(class)));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn sequence_indexing() {
        let seq = Value::seq(vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
        assert_eq!(seq.get_index(&Value::Int(0)).unwrap(), Value::Int(10));
        assert_eq!(seq.get_index(&Value::Int(-1)).unwrap(), Value::Int(30));
        assert!(seq.get_index(&Value::Int(3)).is_err());
        seq.set_index(&Value::Int(1), Value::Int(99)).unwrap();
        assert_eq!(seq.to_string(), "[10, 99, 30]");
    }

    #[test]
    fn mapping_indexing() {
        let map = Value::empty_map();
        map.set_index(&Value::from("k"), Value::Int(5)).unwrap();
        assert_eq!(map.get_index(&Value::from("k")).unwrap(), Value::Int(5));
        assert!(map.get_index(&Value::from("missing")).is_err());
        assert!(map.set_index(&Value::seq(vec![]), Value::Int(1)).is_err());
        assert_eq!(map.to_string(), "{'k': 5}");
    }

    #[test]
    fn operator_names() {
        assert_eq!(Operator::Gt.symbol(), ">");
        assert_eq!(Operator::Add.method_name(), "___add___");
        assert_eq!(Operator::Div.method_name(), "___truediv___");
        assert!(Operator::Print.is_unary());
        assert!(!Operator::GetItem.is_unary());
    }

    #[test]
    fn method_params_skip_self() {
        let m = Function::new("m", vec!["self".into(), "x".into()], vec![]);
        assert_eq!(m.method_params(), ["x".to_owned()]);
        let f = Function::new("f", vec!["a".into()], vec![]);
        assert_eq!(f.method_params(), ["a".to_owned()]);
    }

    #[test]
    fn instance_fields_and_overloads() {
        let inst = Instance::new(point_class());
        assert!(inst.overload(Operator::Add).is_some());
        assert!(inst.overload(Operator::Sub).is_none());
        inst.set_field("y", Value::Int(2));
        inst.set_field("x", Value::Int(1));
        assert_eq!(inst.field("x"), Some(Value::Int(1)));
        assert_eq!(inst.to_string(), "<Point {x, y}>");
    }
}
