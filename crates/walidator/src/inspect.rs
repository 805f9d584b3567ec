//! Runtime type description and value access
//!
//! Rust has no runtime reflection, so every validated type describes itself
//! through [`Inspect`]: a static [`Shape`] used when compiling a validation
//! routine, and a borrowed [`View`] used when running it.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::{self, Write};
use std::hash::{BuildHasher, Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

// ============================================================================
// Inspect Trait
// ============================================================================

/// A type whose values can be walked by the validator.
///
/// Implementations for primitives, strings, `Option`, smart pointers,
/// sequences, maps and `Box<dyn Inspect>` ship with the crate. Structs
/// normally get theirs from [`inspect!`](crate::inspect).
pub trait Inspect: 'static {
    /// Static description of the type.
    fn shape() -> Shape
    where
        Self: Sized;

    /// Identity of the concrete type behind `self`.
    fn type_ref(&self) -> TypeRef;

    /// Borrowed view of the value.
    fn view(&self) -> View<'_>;
}

// ============================================================================
// TypeRef
// ============================================================================

/// Copyable handle to a type: identity, name and a lazily computed shape.
///
/// The shape is only produced on demand, which lets a struct mention itself
/// (through `Option<Box<Self>>`, `Vec<Self>`, ...) without the description
/// recursing forever.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: fn() -> TypeId,
    name: fn() -> &'static str,
    shape: fn() -> Shape,
}

impl TypeRef {
    /// Handle for `T`.
    pub fn of<T: Inspect>() -> Self {
        Self {
            id: TypeId::of::<T>,
            name: std::any::type_name::<T>,
            shape: T::shape,
        }
    }

    pub fn id(&self) -> TypeId {
        (self.id)()
    }

    pub fn name(&self) -> &'static str {
        (self.name)()
    }

    pub fn shape(&self) -> Shape {
        (self.shape)()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Shape
// ============================================================================

/// Structural category of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    Str,
    Optional,
    Boxed,
    Seq,
    Array,
    Map,
    Struct,
    Dynamic,
    Opaque,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Str => "string",
            Self::Optional => "optional",
            Self::Boxed => "pointer",
            Self::Seq => "slice",
            Self::Array => "array",
            Self::Map => "map",
            Self::Struct => "struct",
            Self::Dynamic => "dynamic",
            Self::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// Static description of a type
#[derive(Debug, Clone)]
pub enum Shape {
    Bool,
    /// Signed integer of any width
    Int,
    /// Unsigned integer of any width
    Uint,
    /// `f32` or `f64`
    Float,
    Str,
    /// A value that may be absent (`Option<T>`)
    Optional(TypeRef),
    /// A value behind an owning pointer that is always present
    Boxed(TypeRef),
    /// Growable sequence
    Seq(TypeRef),
    /// Fixed-size array
    Array(TypeRef, usize),
    Map {
        key: TypeRef,
        value: TypeRef,
    },
    Struct(StructShape),
    /// A value whose concrete type is only known at run time
    Dynamic,
    /// A value with nothing to inspect
    Opaque,
}

impl Shape {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Bool => Kind::Bool,
            Self::Int => Kind::Int,
            Self::Uint => Kind::Uint,
            Self::Float => Kind::Float,
            Self::Str => Kind::Str,
            Self::Optional(_) => Kind::Optional,
            Self::Boxed(_) => Kind::Boxed,
            Self::Seq(_) => Kind::Seq,
            Self::Array(..) => Kind::Array,
            Self::Map { .. } => Kind::Map,
            Self::Struct(_) => Kind::Struct,
            Self::Dynamic => Kind::Dynamic,
            Self::Opaque => Kind::Opaque,
        }
    }
}

/// Description of a struct and its fields in declaration order
#[derive(Debug, Clone)]
pub struct StructShape {
    pub name: &'static str,
    pub fields: Vec<FieldShape>,
}

impl StructShape {
    pub fn new(name: &'static str, fields: Vec<FieldShape>) -> Self {
        Self { name, fields }
    }
}

/// Description of one struct field
#[derive(Debug, Clone)]
pub struct FieldShape {
    /// Declared field name
    pub name: &'static str,
    /// Field annotations as `(tag name, tag value)` pairs
    pub tags: &'static [(&'static str, &'static str)],
    pub ty: TypeRef,
}

impl FieldShape {
    pub fn new(
        name: &'static str,
        tags: &'static [(&'static str, &'static str)],
        ty: TypeRef,
    ) -> Self {
        Self { name, tags, ty }
    }

    /// Value of the annotation named `key`, if present
    pub fn tag(&self, key: &str) -> Option<&'static str> {
        self.tags
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
    }
}

// ============================================================================
// View
// ============================================================================

/// Borrowed access to a value, one variant per [`Shape`] category
pub enum View<'a> {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(&'a str),
    /// `None` when the optional value is absent
    Pointer(Option<&'a dyn Inspect>),
    Seq(&'a dyn SeqAccess),
    Map(&'a dyn MapAccess),
    /// Field values in declaration order
    Struct(Vec<&'a dyn Inspect>),
    Dynamic(&'a dyn Inspect),
    Opaque,
}

impl View<'_> {
    /// Number of items for strings (in characters) and collections
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => Some(s.chars().count()),
            Self::Seq(items) => Some(items.len()),
            Self::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }
}

/// Indexed access to the items of a sequence
pub trait SeqAccess {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Option<&dyn Inspect>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Access to the entries of a map
pub trait MapAccess {
    fn len(&self) -> usize;

    fn entries(&self) -> Box<dyn Iterator<Item = (&dyn Inspect, &dyn Inspect)> + '_>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Textual Form
// ============================================================================

/// Natural textual form of a value, as used in map path segments.
///
/// Structs render as `{field:value other:value}`, sequences as `[a b]`,
/// maps as `map[k:v]` and absent optionals as `<nil>`.
pub fn describe(value: &dyn Inspect) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &dyn Inspect) {
    match value.view() {
        View::Bool(b) => {
            let _ = write!(out, "{}", b);
        }
        View::Int(n) => {
            let _ = write!(out, "{}", n);
        }
        View::Uint(n) => {
            let _ = write!(out, "{}", n);
        }
        View::Float(x) => {
            let _ = write!(out, "{}", x);
        }
        View::Str(s) => out.push_str(s),
        View::Pointer(None) => out.push_str("<nil>"),
        View::Pointer(Some(inner)) | View::Dynamic(inner) => write_value(out, inner),
        View::Seq(items) => {
            out.push('[');
            for i in 0..items.len() {
                if i > 0 {
                    out.push(' ');
                }
                if let Some(item) = items.get(i) {
                    write_value(out, item);
                }
            }
            out.push(']');
        }
        View::Map(entries) => {
            out.push_str("map[");
            for (i, (k, v)) in entries.entries().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_value(out, k);
                out.push(':');
                write_value(out, v);
            }
            out.push(']');
        }
        View::Struct(fields) => {
            let names: Vec<&'static str> = match value.type_ref().shape() {
                Shape::Struct(shape) => shape.fields.into_iter().map(|f| f.name).collect(),
                _ => Vec::new(),
            };
            out.push('{');
            for (i, field) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                if let Some(name) = names.as_slice().get(i) {
                    out.push_str(name);
                    out.push(':');
                }
                write_value(out, field);
            }
            out.push('}');
        }
        View::Opaque => out.push_str(value.type_ref().name()),
    }
}

// ============================================================================
// Implementations: Primitives
// ============================================================================

macro_rules! inspect_primitive {
    ($shape:ident, $view:ident as $wide:ty: $($t:ty),+) => {
        $(
            impl Inspect for $t {
                fn shape() -> Shape {
                    Shape::$shape
                }

                fn type_ref(&self) -> TypeRef {
                    TypeRef::of::<Self>()
                }

                fn view(&self) -> View<'_> {
                    View::$view(<$wide>::from(*self))
                }
            }
        )+
    };
}

inspect_primitive!(Int, Int as i64: i8, i16, i32, i64);
inspect_primitive!(Uint, Uint as u64: u8, u16, u32, u64);
inspect_primitive!(Float, Float as f64: f32, f64);
inspect_primitive!(Bool, Bool as bool: bool);

impl Inspect for isize {
    fn shape() -> Shape {
        Shape::Int
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        // isize is at most 64 bits wide on every supported target
        View::Int(*self as i64)
    }
}

impl Inspect for usize {
    fn shape() -> Shape {
        Shape::Uint
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        View::Uint(*self as u64)
    }
}

impl Inspect for String {
    fn shape() -> Shape {
        Shape::Str
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        View::Str(self)
    }
}

impl Inspect for &'static str {
    fn shape() -> Shape {
        Shape::Str
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        View::Str(self)
    }
}

impl Inspect for () {
    fn shape() -> Shape {
        Shape::Opaque
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        View::Opaque
    }
}

// ============================================================================
// Implementations: Pointers
// ============================================================================

impl<T: Inspect> Inspect for Option<T> {
    fn shape() -> Shape {
        Shape::Optional(TypeRef::of::<T>())
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        View::Pointer(self.as_ref().map(|v| v as &dyn Inspect))
    }
}

macro_rules! inspect_pointer {
    ($($ptr:ident),+) => {
        $(
            impl<T: Inspect> Inspect for $ptr<T> {
                fn shape() -> Shape {
                    Shape::Boxed(TypeRef::of::<T>())
                }

                fn type_ref(&self) -> TypeRef {
                    TypeRef::of::<Self>()
                }

                fn view(&self) -> View<'_> {
                    View::Pointer(Some(&**self as &dyn Inspect))
                }
            }
        )+
    };
}

inspect_pointer!(Box, Rc, Arc);

impl Inspect for Box<dyn Inspect> {
    fn shape() -> Shape {
        Shape::Dynamic
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        View::Dynamic(&**self)
    }
}

// ============================================================================
// Implementations: Collections
// ============================================================================

impl<T: Inspect> SeqAccess for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, index: usize) -> Option<&dyn Inspect> {
        self.as_slice().get(index).map(|v| v as &dyn Inspect)
    }
}

impl<T: Inspect> Inspect for Vec<T> {
    fn shape() -> Shape {
        Shape::Seq(TypeRef::of::<T>())
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        View::Seq(self)
    }
}

impl<T: Inspect> SeqAccess for VecDeque<T> {
    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn get(&self, index: usize) -> Option<&dyn Inspect> {
        VecDeque::get(self, index).map(|v| v as &dyn Inspect)
    }
}

impl<T: Inspect> Inspect for VecDeque<T> {
    fn shape() -> Shape {
        Shape::Seq(TypeRef::of::<T>())
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        View::Seq(self)
    }
}

impl<T: Inspect, const N: usize> SeqAccess for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn get(&self, index: usize) -> Option<&dyn Inspect> {
        self.as_slice().get(index).map(|v| v as &dyn Inspect)
    }
}

impl<T: Inspect, const N: usize> Inspect for [T; N] {
    fn shape() -> Shape {
        Shape::Array(TypeRef::of::<T>(), N)
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        View::Seq(self)
    }
}

impl<K: Inspect, V: Inspect, S: 'static> MapAccess for HashMap<K, V, S> {
    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&dyn Inspect, &dyn Inspect)> + '_> {
        Box::new(
            self.iter()
                .map(|(k, v)| (k as &dyn Inspect, v as &dyn Inspect)),
        )
    }
}

impl<K, V, S> Inspect for HashMap<K, V, S>
where
    K: Inspect + Eq + Hash,
    V: Inspect,
    S: BuildHasher + 'static,
{
    fn shape() -> Shape {
        Shape::Map {
            key: TypeRef::of::<K>(),
            value: TypeRef::of::<V>(),
        }
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        View::Map(self)
    }
}

impl<K: Inspect, V: Inspect> MapAccess for BTreeMap<K, V> {
    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&dyn Inspect, &dyn Inspect)> + '_> {
        Box::new(
            self.iter()
                .map(|(k, v)| (k as &dyn Inspect, v as &dyn Inspect)),
        )
    }
}

impl<K: Inspect + Ord, V: Inspect> Inspect for BTreeMap<K, V> {
    fn shape() -> Shape {
        Shape::Map {
            key: TypeRef::of::<K>(),
            value: TypeRef::of::<V>(),
        }
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<Self>()
    }

    fn view(&self) -> View<'_> {
        View::Map(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_shapes() {
        assert_eq!(i8::shape().kind(), Kind::Int);
        assert_eq!(u32::shape().kind(), Kind::Uint);
        assert_eq!(f32::shape().kind(), Kind::Float);
        assert_eq!(String::shape().kind(), Kind::Str);
        assert_eq!(<()>::shape().kind(), Kind::Opaque);
        assert_eq!(<Option<i64>>::shape().kind(), Kind::Optional);
        assert_eq!(<Box<i64>>::shape().kind(), Kind::Boxed);
        assert_eq!(<[u8; 4]>::shape().kind(), Kind::Array);
        assert_eq!(<Box<dyn Inspect>>::shape().kind(), Kind::Dynamic);
    }

    #[test]
    fn test_type_ref_identity() {
        assert_eq!(TypeRef::of::<i64>(), TypeRef::of::<i64>());
        assert_ne!(TypeRef::of::<i64>(), TypeRef::of::<i32>());
        assert_eq!(TypeRef::of::<Vec<String>>().name(), std::any::type_name::<Vec<String>>());
    }

    #[test]
    fn test_dynamic_type_ref_is_concrete() {
        let boxed: Box<dyn Inspect> = Box::new(7u16);
        match boxed.view() {
            View::Dynamic(inner) => assert_eq!(inner.type_ref(), TypeRef::of::<u16>()),
            _ => panic!("expected dynamic view"),
        }
    }

    #[test]
    fn test_view_len_counts_characters() {
        let s = String::from("héllo");
        assert_eq!(s.view().len(), Some(5));
        assert_eq!(vec![1, 2, 3].view().len(), Some(3));
        assert_eq!(5i64.view().len(), None);
    }

    crate::inspect! {
        struct Pair {
            a: i64,
            b: String,
        }
    }

    #[test]
    fn test_describe_struct_uses_field_names() {
        let pair = Pair { a: 3, b: "x".to_string() };
        assert_eq!(describe(&pair), "{a:3 b:x}");
        assert_eq!(describe(&Some(Box::new(pair))), "{a:3 b:x}");
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&42i32), "42");
        assert_eq!(describe(&String::from("abc")), "abc");
        assert_eq!(describe(&None::<i64>), "<nil>");
        assert_eq!(describe(&Some(3.5f64)), "3.5");
        assert_eq!(describe(&vec![1u8, 2, 3]), "[1 2 3]");

        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1i64);
        map.insert("b".to_string(), 2i64);
        assert_eq!(describe(&map), "map[a:1 b:2]");
    }
}
