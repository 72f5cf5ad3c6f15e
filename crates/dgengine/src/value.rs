// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values flowing through plugs and the type hierarchy they are rated against.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A class in the single-inheritance value hierarchy.
///
/// Descriptors are compared by address, so declare them as `static` items:
///
/// ```
/// use dgengine::value::{ValueType, OBJECT};
///
/// static MESH: ValueType = ValueType::new("Mesh", Some(&OBJECT));
/// static SKINNED_MESH: ValueType = ValueType::new("SkinnedMesh", Some(&MESH));
///
/// assert!(SKINNED_MESH.is_subtype_of(&MESH));
/// ```
pub struct ValueType {
    name: &'static str,
    parent: Option<&'static ValueType>,
}

impl ValueType {
    /// Declare a type deriving from `parent` (only the root has none)
    pub const fn new(name: &'static str, parent: Option<&'static ValueType>) -> Self {
        Self { name, parent }
    }

    /// Type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Direct base type
    pub fn parent(&self) -> Option<&'static ValueType> {
        self.parent
    }

    /// Inheritance chain starting at this type and ending at the root
    pub fn mro(&'static self) -> Vec<&'static ValueType> {
        let mut chain = vec![self];
        let mut current = self.parent;
        while let Some(ty) = current {
            chain.push(ty);
            current = ty.parent;
        }
        chain
    }

    /// Whether `self` is `other` or derives from it
    pub fn is_subtype_of(&'static self, other: &'static ValueType) -> bool {
        self.mro().into_iter().any(|ty| ty == other)
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for ValueType {}

impl Hash for ValueType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Root of the hierarchy
pub static OBJECT: ValueType = ValueType::new("object", None);
/// Type of [`Value::Null`]
pub static NONE: ValueType = ValueType::new("none", Some(&OBJECT));
/// Base of all numbers
pub static NUMBER: ValueType = ValueType::new("number", Some(&OBJECT));
/// Integers
pub static INT: ValueType = ValueType::new("int", Some(&NUMBER));
/// Booleans, a refinement of integers
pub static BOOL: ValueType = ValueType::new("bool", Some(&INT));
/// Floating point numbers
pub static FLOAT: ValueType = ValueType::new("float", Some(&NUMBER));
/// Strings
pub static STRING: ValueType = ValueType::new("string", Some(&OBJECT));
/// Lists of values
pub static LIST: ValueType = ValueType::new("list", Some(&OBJECT));
/// Type of class values ([`Value::Type`])
pub static TYPE: ValueType = ValueType::new("type", Some(&OBJECT));

/// Opaque user payload tagged with its class
#[derive(Clone)]
pub struct Object {
    ty: &'static ValueType,
    data: Arc<dyn Any + Send + Sync>,
}

impl Object {
    /// Wrap `data` as an instance of `ty`
    pub fn new<T: Any + Send + Sync>(ty: &'static ValueType, data: T) -> Self {
        Self {
            ty,
            data: Arc::new(data),
        }
    }

    /// Class of the payload
    pub fn value_type(&self) -> &'static ValueType {
        self.ty
    }

    /// Borrow the payload as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object<{}>", self.ty.name)
    }
}

/// Value that can be stored in a plug
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value; computes must never produce it
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    String(String),
    /// List of values
    List(Vec<Value>),
    /// A class, for attributes flagged [`CLS`](crate::AttributeFlags::CLS)
    Type(&'static ValueType),
    /// User defined instance
    Object(Object),
}

impl Value {
    /// Get the class of this value
    pub fn value_type(&self) -> &'static ValueType {
        match self {
            Self::Null => &NONE,
            Self::Bool(_) => &BOOL,
            Self::Int(_) => &INT,
            Self::Float(_) => &FLOAT,
            Self::String(_) => &STRING,
            Self::List(_) => &LIST,
            Self::Type(_) => &TYPE,
            Self::Object(o) => o.value_type(),
        }
    }

    /// Whether this is [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer content, accepting booleans
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Numeric content as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Boolean content
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// List content
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Class content
    pub fn as_type(&self) -> Option<&'static ValueType> {
        match self {
            Self::Type(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<&'static ValueType> for Value {
    fn from(v: &'static ValueType) -> Self {
        Self::Type(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Self::Object(v)
    }
}

/// Evaluation hint handed through to [`Node::compute`](crate::Node::compute).
///
/// The engine never looks inside; what a mode means is up to the node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mode(pub Option<Value>);

impl Mode {
    /// No particular mode
    pub const NONE: Mode = Mode(None);

    /// Mode carrying the given token
    pub fn new(token: impl Into<Value>) -> Self {
        Self(Some(token.into()))
    }

    /// The token, if any
    pub fn token(&self) -> Option<&Value> {
        self.0.as_ref()
    }
}
