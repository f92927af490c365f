use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Custom "convert to serializable form" hook attached to an [`Object`].
///
/// The hook receives the object itself and returns the value to serialize
/// in its place. Only the `json` profile applies it.
pub type ToJson = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Shared handle to an [`Array`].
pub type ArrayRef = Arc<Array>;

/// Shared handle to an [`Object`].
pub type ObjectRef = Arc<Object>;

/// A message value.
///
/// Arrays and objects are shared handles: cloning a `Value` clones the
/// handle, not the contents, so structural sharing and cycles can be built
/// with [`Array::push`] and [`Object::set`].
#[derive(Clone, Default)]
pub enum Value {
    /// The "absent" sentinel.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    /// Arbitrary-precision integer, as decimal digits.
    BigInt(String),
    String(String),
    /// Unique unforgeable token, with its optional description.
    Symbol(Option<String>),
    /// Invokable unit of code, by name.
    Function(String),
    /// Deferred/async result.
    Promise,
    /// Interception wrapper around a target value.
    Proxy(Box<Value>),
    /// Locale/internationalization object, by constructor name.
    Intl(String),
    /// Milliseconds since the Unix epoch (may be NaN for an invalid date).
    Date(f64),
    Bytes(Vec<u8>),
    Array(ArrayRef),
    Object(ObjectRef),
}

/// Ordered, shared list of values.
#[derive(Default)]
pub struct Array {
    items: RwLock<Vec<Value>>,
}

/// Ordered, shared string-keyed map of values.
#[derive(Default)]
pub struct Object {
    props: RwLock<Vec<(String, Value)>>,
    to_json: RwLock<Option<ToJson>>,
}

impl Value {
    /// Build an array value from items.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Arc::new(Array {
            items: RwLock::new(items.into_iter().collect()),
        }))
    }

    /// Build an object value from `(key, value)` entries.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let object = Object::default();
        for (key, value) in entries {
            object.set(key, value);
        }
        Value::Object(Arc::new(object))
    }

    /// Build an arbitrary-precision integer.
    pub fn bigint(digits: impl Into<String>) -> Self {
        Value::BigInt(digits.into())
    }

    /// Short name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Function(_) => "function",
            Value::Promise => "promise",
            Value::Proxy(_) => "proxy",
            Value::Intl(_) => "Intl object",
            Value::Date(_) => "date",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Identity of an array or object; `None` for every other kind.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(array) => Some(Arc::as_ptr(array) as usize),
            Value::Object(object) => Some(Arc::as_ptr(object) as usize),
            _ => None,
        }
    }

    /// True when both values are the same array or object.
    pub fn same_compound(&self, other: &Value) -> bool {
        matches!((self.identity(), other.identity()), (Some(a), Some(b)) if a == b)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Property of an object value.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(object) => object.get(key),
            _ => None,
        }
    }

    /// Item of an array value.
    pub fn at(&self, index: usize) -> Option<Value> {
        match self {
            Value::Array(array) => array.get(index),
            _ => None,
        }
    }
}

impl Array {
    pub fn push(&self, value: Value) {
        self.items.write().push(value);
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Snapshot of the current items.
    pub fn items(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    pub(crate) fn replace(&self, items: Vec<Value>) {
        *self.items.write() = items;
    }
}

impl Object {
    /// Insert or overwrite a property, keeping first-insertion order.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let mut props = self.props.write();
        match props.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => props.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.props
            .read()
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
    }

    pub fn len(&self) -> usize {
        self.props.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.read().is_empty()
    }

    /// Snapshot of the current properties.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.props.read().clone()
    }

    /// Attach a custom serialization hook.
    pub fn set_to_json<F>(&self, hook: F)
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        *self.to_json.write() = Some(Arc::new(hook));
    }

    pub fn to_json_hook(&self) -> Option<ToJson> {
        self.to_json.read().clone()
    }

    pub(crate) fn replace(&self, props: Vec<(String, Value)>) {
        *self.props.write() = props;
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stack = RefCell::new(Vec::new());
        fmt::Debug::fmt(
            &Guarded {
                value: self,
                stack: &stack,
            },
            f,
        )
    }
}

/// Debug view that prints `[Circular]` instead of re-entering an ancestor.
struct Guarded<'a> {
    value: &'a Value,
    stack: &'a RefCell<Vec<usize>>,
}

impl Guarded<'_> {
    fn child<'b>(&'b self, value: &'b Value) -> Guarded<'b> {
        Guarded {
            value,
            stack: self.stack,
        }
    }
}

impl fmt::Debug for Guarded<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.value.identity() {
            if self.stack.borrow().contains(&id) {
                return f.write_str("[Circular]");
            }
            self.stack.borrow_mut().push(id);
        }

        let result = match self.value {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::BigInt(digits) => write!(f, "{digits}n"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Symbol(desc) => write!(f, "Symbol({})", desc.as_deref().unwrap_or("")),
            Value::Function(name) => write!(f, "[Function {name}]"),
            Value::Promise => f.write_str("Promise {}"),
            Value::Proxy(target) => f.debug_tuple("Proxy").field(&self.child(target)).finish(),
            Value::Intl(name) => write!(f, "Intl.{name} {{}}"),
            Value::Date(ms) => write!(f, "Date({ms})"),
            Value::Bytes(bytes) => write!(f, "Bytes({bytes:?})"),
            Value::Array(array) => {
                let items = array.items();
                f.debug_list()
                    .entries(items.iter().map(|item| self.child(item)))
                    .finish()
            }
            Value::Object(object) => {
                let entries = object.entries();
                f.debug_map()
                    .entries(entries.iter().map(|(k, v)| (k, self.child(v))))
                    .finish()
            }
        };

        if self.value.identity().is_some() {
            self.stack.borrow_mut().pop();
        }
        result
    }
}

impl PartialEq for Value {
    /// Structural equality. Cycles compare equal when both sides loop back
    /// at the same point.
    fn eq(&self, other: &Self) -> bool {
        let mut seen = Vec::new();
        structural_eq(self, other, &mut seen)
    }
}

fn structural_eq(a: &Value, b: &Value, seen: &mut Vec<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined)
        | (Value::Null, Value::Null)
        | (Value::Promise, Value::Promise) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) | (Value::Date(x), Value::Date(y)) => {
            x == y || (x.is_nan() && y.is_nan())
        }
        (Value::BigInt(x), Value::BigInt(y))
        | (Value::String(x), Value::String(y))
        | (Value::Function(x), Value::Function(y))
        | (Value::Intl(x), Value::Intl(y)) => x == y,
        (Value::Symbol(_), Value::Symbol(_)) => false,
        (Value::Proxy(x), Value::Proxy(y)) => structural_eq(x, y, seen),
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let pair = (Arc::as_ptr(x) as usize, Arc::as_ptr(y) as usize);
            if seen.contains(&pair) {
                return true;
            }
            let (xs, ys) = (x.items(), y.items());
            if xs.len() != ys.len() {
                return false;
            }
            seen.push(pair);
            let equal = xs
                .iter()
                .zip(ys.iter())
                .all(|(l, r)| structural_eq(l, r, seen));
            seen.pop();
            equal
        }
        (Value::Object(x), Value::Object(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let pair = (Arc::as_ptr(x) as usize, Arc::as_ptr(y) as usize);
            if seen.contains(&pair) {
                return true;
            }
            let (xs, ys) = (x.entries(), y.entries());
            if xs.len() != ys.len() {
                return false;
            }
            seen.push(pair);
            let equal = xs
                .iter()
                .zip(ys.iter())
                .all(|((lk, lv), (rk, rv))| lk == rk && structural_eq(lv, rv, seen));
            seen.pop();
            equal
        }
        _ => false,
    }
}
