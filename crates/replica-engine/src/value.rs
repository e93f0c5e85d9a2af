//! The tagged value model the clone engine traverses.
//!
//! A [`Value`] is exactly one of the variants below. Rust's `Clone` on a
//! `Value` is a *shadow copy*: scalars, arrays, structs and variants are
//! copied by value while pointers, sequences, maps and channels keep
//! sharing their referent. The deep copy lives in the engine.
//!
//! Absent and empty are distinct for every container: a nil sequence is
//! not an empty one, a nil map is not an empty map, and an empty variant
//! is not a variant holding a zero.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use replica_core::{FieldDesc, Kind, Type, TypeKind, ValueError};

/// Storage a [`Pointer`] refers to.
pub type Cell = Arc<RwLock<Value>>;

/// Backing buffer of a [`Sequence`]; its length is the full capacity.
pub type Buffer = Arc<RwLock<Vec<Value>>>;

type MapData = IndexMap<MapKey, Value>;
type FuncBody = dyn Fn(&[Value]) -> Value + Send + Sync;

fn addr_of<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

fn mismatch(expected: Type, found: Type) -> ValueError {
    ValueError::TypeMismatch {
        expected: expected.name().to_string(),
        found: found.name().to_string(),
    }
}

fn elem_of(ty: Type) -> Type {
    match ty.elem() {
        Some(elem) => elem,
        None => panic!("replica: <bug> '{ty}' has no element type"),
    }
}

/// An indivisible callable, compared by identity.
#[derive(Clone)]
pub struct Func(Arc<FuncBody>);

impl Func {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the callable.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    /// Address of the closure, used as its identity.
    pub fn addr(&self) -> usize {
        addr_of(&self.0)
    }

    /// Whether both handles refer to the same closure.
    pub fn ptr_eq(&self, other: &Func) -> bool {
        self.addr() == other.addr()
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func@{:#x}", self.addr())
    }
}

/// A runtime value of any [`Type`].
#[derive(Clone)]
pub enum Value {
    /// `bool`.
    Bool(bool),
    /// `int`.
    Int(i64),
    /// `uint`.
    Uint(u64),
    /// `float`.
    Float(f64),
    /// `str`.
    Str(Arc<str>),
    /// `func`; `None` is the nil callable.
    Func(Option<Func>),
    /// `raw_addr`, never dereferenced.
    RawAddr(usize),
    /// `type`; `None` is the nil type handle.
    TypeHandle(Option<Type>),
    /// Owns or aliases one referent.
    Pointer(Pointer),
    /// View over a shared buffer.
    Sequence(Sequence),
    /// Fixed-length inline elements.
    Array(ArrayValue),
    /// Key to value mapping.
    Map(MapValue),
    /// Named members in slot order.
    Struct(StructValue),
    /// Dynamically typed slot.
    Variant(Variant),
    /// Handle to a bounded buffer.
    Channel(Channel),
}

impl Value {
    /// The zero value of `ty`: false, 0, empty text, or a nil handle.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is a struct that was declared but never defined.
    pub fn zero(ty: Type) -> Value {
        match ty.kind() {
            TypeKind::Bool => Value::Bool(false),
            TypeKind::Int => Value::Int(0),
            TypeKind::Uint => Value::Uint(0),
            TypeKind::Float => Value::Float(0.0),
            TypeKind::Str => Value::Str(Arc::from("")),
            TypeKind::Func => Value::Func(None),
            TypeKind::RawAddr => Value::RawAddr(0),
            TypeKind::TypeHandle => Value::TypeHandle(None),
            TypeKind::Pointer { .. } => Value::Pointer(Pointer::null(ty)),
            TypeKind::Sequence { .. } => Value::Sequence(Sequence::nil(ty)),
            TypeKind::Array { elem, len } => Value::Array(ArrayValue {
                ty,
                elems: (0..len).map(|_| Value::zero(elem)).collect(),
            }),
            TypeKind::Map { .. } => Value::Map(MapValue::nil(ty)),
            TypeKind::Channel { .. } => Value::Channel(Channel::nil(ty)),
            TypeKind::Struct { fields } => Value::Struct(StructValue {
                ty,
                slots: fields.iter().map(|f| Value::zero(f.ty)).collect(),
            }),
            TypeKind::Variant => Value::Variant(Variant::empty(ty)),
        }
    }

    /// The static type of this value.
    pub fn ty(&self) -> Type {
        match self {
            Value::Bool(_) => Type::BOOL,
            Value::Int(_) => Type::INT,
            Value::Uint(_) => Type::UINT,
            Value::Float(_) => Type::FLOAT,
            Value::Str(_) => Type::STR,
            Value::Func(_) => Type::FUNC,
            Value::RawAddr(_) => Type::RAW_ADDR,
            Value::TypeHandle(_) => Type::TYPE_HANDLE,
            Value::Pointer(p) => p.ty,
            Value::Sequence(s) => s.ty,
            Value::Array(a) => a.ty,
            Value::Map(m) => m.ty,
            Value::Struct(s) => s.ty,
            Value::Variant(v) => v.ty,
            Value::Channel(c) => c.ty,
        }
    }

    /// Flat kind of this value.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Uint(_) => Kind::Uint,
            Value::Float(_) => Kind::Float,
            Value::Str(_) => Kind::Str,
            Value::Func(_) => Kind::Func,
            Value::RawAddr(_) => Kind::RawAddr,
            Value::TypeHandle(_) => Kind::TypeHandle,
            Value::Pointer(_) => Kind::Pointer,
            Value::Sequence(_) => Kind::Sequence,
            Value::Array(_) => Kind::Array,
            Value::Map(_) => Kind::Map,
            Value::Struct(_) => Kind::Struct,
            Value::Variant(_) => Kind::Variant,
            Value::Channel(_) => Kind::Channel,
        }
    }

    /// Convert this value for storage in a slot of type `ty`.
    ///
    /// A value of exactly `ty` passes through. A slot of variant type
    /// accepts any value and wraps it; a variant is re-tagged with `ty`
    /// while keeping its payload.
    pub fn convert(self, ty: Type) -> Result<Value, ValueError> {
        let found = self.ty();
        if found == ty {
            return Ok(self);
        }
        if ty.flat_kind() == Kind::Variant {
            return Ok(Value::Variant(Variant::new(ty, self)));
        }
        Err(mismatch(ty, found))
    }

    /// Cycle-tolerant deep equality.
    ///
    /// Pointers are equal when both are nil, identical, or point to deeply
    /// equal values. Sequences and maps must agree on nil-ness. Callables
    /// and channels are compared by identity. Floats use `==`, so `NaN` is
    /// never equal to itself.
    pub fn deep_eq(&self, other: &Value) -> bool {
        deep_eq(self, other, &mut HashSet::new())
    }

    /// The boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The signed integer payload.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The unsigned integer payload.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(u) => Some(*u),
            _ => None,
        }
    }

    /// The float payload.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// The text payload.
    pub fn as_str(&self) -> Option<&Arc<str>> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The pointer payload.
    pub fn as_pointer(&self) -> Option<&Pointer> {
        match self {
            Value::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// The sequence payload.
    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// The array payload.
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The map payload.
    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// The struct payload.
    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// The variant payload.
    pub fn as_variant(&self) -> Option<&Variant> {
        match self {
            Value::Variant(v) => Some(v),
            _ => None,
        }
    }

    /// The channel payload.
    pub fn as_channel(&self) -> Option<&Channel> {
        match self {
            Value::Channel(c) => Some(c),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Uint(u)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Func> for Value {
    fn from(f: Func) -> Self {
        Value::Func(Some(f))
    }
}

impl From<Type> for Value {
    fn from(t: Type) -> Self {
        Value::TypeHandle(Some(t))
    }
}

impl From<Pointer> for Value {
    fn from(p: Pointer) -> Self {
        Value::Pointer(p)
    }
}

impl From<Sequence> for Value {
    fn from(s: Sequence) -> Self {
        Value::Sequence(s)
    }
}

impl From<ArrayValue> for Value {
    fn from(a: ArrayValue) -> Self {
        Value::Array(a)
    }
}

impl From<MapValue> for Value {
    fn from(m: MapValue) -> Self {
        Value::Map(m)
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}

impl From<Variant> for Value {
    fn from(v: Variant) -> Self {
        Value::Variant(v)
    }
}

impl From<Channel> for Value {
    fn from(c: Channel) -> Self {
        Value::Channel(c)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Uint(u) => write!(f, "{u}u"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Func(Some(func)) => fmt::Debug::fmt(func, f),
            Value::Func(None) => f.write_str("func(nil)"),
            Value::RawAddr(a) => write!(f, "raw({a:#x})"),
            Value::TypeHandle(Some(t)) => write!(f, "type({t})"),
            Value::TypeHandle(None) => f.write_str("type(nil)"),
            Value::Pointer(p) => fmt::Debug::fmt(p, f),
            Value::Sequence(s) => fmt::Debug::fmt(s, f),
            Value::Array(a) => fmt::Debug::fmt(a, f),
            Value::Map(m) => fmt::Debug::fmt(m, f),
            Value::Struct(s) => fmt::Debug::fmt(s, f),
            Value::Variant(v) => fmt::Debug::fmt(v, f),
            Value::Channel(c) => fmt::Debug::fmt(c, f),
        }
    }
}

/// A possibly-nil reference to one [`Cell`].
#[derive(Clone)]
pub struct Pointer {
    ty: Type,
    cell: Option<Cell>,
}

impl Pointer {
    /// A nil pointer of pointer type `ty`.
    pub fn null(ty: Type) -> Self {
        Self { ty, cell: None }
    }

    /// Box `value` into a fresh cell and point at it.
    pub fn to(value: Value) -> Self {
        let ty = Type::pointer_to(value.ty());
        Self {
            ty,
            cell: Some(Arc::new(RwLock::new(value))),
        }
    }

    /// Point at an existing cell. The cell must hold a value of the
    /// pointer's element type.
    pub fn from_cell(ty: Type, cell: Cell) -> Result<Self, ValueError> {
        let elem = elem_of(ty);
        let found = cell.read_recursive().ty();
        if found != elem {
            return Err(mismatch(elem, found));
        }
        Ok(Self {
            ty,
            cell: Some(cell),
        })
    }

    /// Pointer type.
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Type of the referent.
    pub fn elem_type(&self) -> Type {
        elem_of(self.ty)
    }

    /// Whether this pointer is nil.
    pub fn is_null(&self) -> bool {
        self.cell.is_none()
    }

    /// The referenced cell.
    pub fn cell(&self) -> Option<&Cell> {
        self.cell.as_ref()
    }

    /// Address of the referenced cell, or 0 when nil.
    pub fn addr(&self) -> usize {
        self.cell.as_ref().map_or(0, addr_of)
    }

    /// Whether both pointers refer to the same cell (or are both nil).
    pub fn ptr_eq(&self, other: &Pointer) -> bool {
        self.addr() == other.addr()
    }

    /// Shared read access to the referent. Re-entrant.
    pub fn read(&self) -> Option<RwLockReadGuard<'_, Value>> {
        self.cell.as_ref().map(|c| c.read_recursive())
    }

    /// Exclusive write access to the referent.
    pub fn write(&self) -> Option<RwLockWriteGuard<'_, Value>> {
        self.cell.as_ref().map(|c| c.write())
    }

    /// A shadow copy of the referent.
    pub fn load(&self) -> Result<Value, ValueError> {
        self.read()
            .map(|v| v.clone())
            .ok_or(ValueError::NilDereference {
                kind: Kind::Pointer,
            })
    }

    /// Replace the referent.
    pub fn store(&self, value: Value) -> Result<(), ValueError> {
        let value = value.convert(self.elem_type())?;
        let mut slot = self.write().ok_or(ValueError::NilDereference {
            kind: Kind::Pointer,
        })?;
        *slot = value;
        Ok(())
    }

    /// Read a member of the pointed-to struct.
    pub fn field(&self, name: &str) -> Result<Value, ValueError> {
        let guard = self.read().ok_or(ValueError::NilDereference {
            kind: Kind::Pointer,
        })?;
        match &*guard {
            Value::Struct(s) => s.field(name).cloned(),
            other => Err(ValueError::TypeMismatch {
                expected: "struct".into(),
                found: other.ty().name().to_string(),
            }),
        }
    }

    /// Set an exported member of the pointed-to struct.
    pub fn set_field(&self, name: &str, value: Value) -> Result<(), ValueError> {
        let mut guard = self.write().ok_or(ValueError::NilDereference {
            kind: Kind::Pointer,
        })?;
        match &mut *guard {
            Value::Struct(s) => s.set_field(name, value),
            other => Err(ValueError::TypeMismatch {
                expected: "struct".into(),
                found: other.ty().name().to_string(),
            }),
        }
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cell {
            None => write!(f, "{}(nil)", self.ty),
            Some(cell) => write!(f, "{}@{:#x}", self.ty, addr_of(cell)),
        }
    }
}

/// A `len`/`cap` view starting at `start` of a shared [`Buffer`].
#[derive(Clone)]
pub struct Sequence {
    ty: Type,
    buf: Option<Buffer>,
    start: usize,
    len: usize,
    cap: usize,
}

impl Sequence {
    /// A nil sequence of sequence type `ty`.
    pub fn nil(ty: Type) -> Self {
        Self {
            ty,
            buf: None,
            start: 0,
            len: 0,
            cap: 0,
        }
    }

    /// A fresh buffer of `max(len, cap)` zero elements viewed as `len`.
    pub fn make(ty: Type, len: usize, cap: usize) -> Self {
        let cap = cap.max(len);
        let elem = elem_of(ty);
        let values = (0..cap).map(|_| Value::zero(elem)).collect();
        Self {
            ty,
            buf: Some(Arc::new(RwLock::new(values))),
            start: 0,
            len,
            cap,
        }
    }

    /// A non-nil sequence holding `values`, converted to the element type.
    pub fn from_values(ty: Type, values: Vec<Value>) -> Result<Self, ValueError> {
        let elem = elem_of(ty);
        let values = values
            .into_iter()
            .map(|v| v.convert(elem))
            .collect::<Result<Vec<_>, _>>()?;
        let len = values.len();
        Ok(Self {
            ty,
            buf: Some(Arc::new(RwLock::new(values))),
            start: 0,
            len,
            cap: len,
        })
    }

    /// Sequence type.
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Element type.
    pub fn elem_type(&self) -> Type {
        elem_of(self.ty)
    }

    /// Number of visible elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no visible elements (nil or empty).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements available from the start of the view.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Whether this sequence has no buffer at all.
    pub fn is_nil(&self) -> bool {
        self.buf.is_none()
    }

    /// Address of the backing buffer, or 0 when nil.
    pub fn addr(&self) -> usize {
        self.buf.as_ref().map_or(0, addr_of)
    }

    /// Offset of the view into the backing buffer.
    pub fn offset(&self) -> usize {
        self.start
    }

    /// Whether both views cover the same elements of the same buffer.
    pub fn ptr_eq(&self, other: &Sequence) -> bool {
        self.addr() == other.addr() && self.start == other.start && self.len == other.len
    }

    pub(crate) fn buffer(&self) -> Option<&Buffer> {
        self.buf.as_ref()
    }

    pub(crate) fn write_prefix(&self, values: Vec<Value>) {
        if let Some(buf) = &self.buf {
            let mut buf = buf.write();
            for (slot, value) in buf[self.start..].iter_mut().zip(values) {
                *slot = value;
            }
        }
    }

    fn out_of_range(&self, index: usize) -> ValueError {
        ValueError::IndexOutOfRange {
            index,
            len: self.len,
        }
    }

    /// A shadow copy of element `index`.
    pub fn get(&self, index: usize) -> Result<Value, ValueError> {
        match &self.buf {
            Some(buf) if index < self.len => Ok(buf.read_recursive()[self.start + index].clone()),
            _ => Err(self.out_of_range(index)),
        }
    }

    /// Replace element `index`. Visible through every view of the buffer.
    pub fn set(&self, index: usize, value: Value) -> Result<(), ValueError> {
        let value = value.convert(self.elem_type())?;
        match &self.buf {
            Some(buf) if index < self.len => {
                buf.write()[self.start + index] = value;
                Ok(())
            }
            _ => Err(self.out_of_range(index)),
        }
    }

    /// The sub-view `[lo, hi)`; `hi` may extend up to the capacity.
    pub fn slice(&self, lo: usize, hi: usize) -> Result<Self, ValueError> {
        if lo > hi || hi > self.cap {
            return Err(ValueError::IndexOutOfRange {
                index: hi.max(lo),
                len: self.cap,
            });
        }
        Ok(Self {
            ty: self.ty,
            buf: self.buf.clone(),
            start: self.start + lo,
            len: hi - lo,
            cap: self.cap - lo,
        })
    }

    /// Append `value`, writing into spare capacity when there is some and
    /// moving to a new buffer (doubling) when there is not.
    pub fn push(&self, value: Value) -> Result<Self, ValueError> {
        let value = value.convert(self.elem_type())?;
        if let Some(buf) = &self.buf {
            if self.len < self.cap {
                buf.write()[self.start + self.len] = value;
                return Ok(Self {
                    len: self.len + 1,
                    ..self.clone()
                });
            }
        }

        let cap = (self.cap * 2).max(self.len + 1);
        let grown = Self::make(self.ty, self.len + 1, cap);
        if let (Some(dst), Some(src)) = (&grown.buf, &self.buf) {
            let src = src.read_recursive();
            let mut dst = dst.write();
            dst[..self.len].clone_from_slice(&src[self.start..self.start + self.len]);
            dst[self.len] = value;
        } else if let Some(dst) = &grown.buf {
            dst.write()[0] = value;
        }
        Ok(grown)
    }

    /// Shadow copies of the visible elements.
    pub fn to_vec(&self) -> Vec<Value> {
        match &self.buf {
            Some(buf) => buf.read_recursive()[self.start..self.start + self.len].to_vec(),
            None => Vec::new(),
        }
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.buf {
            None => write!(f, "{}(nil)", self.ty),
            Some(buf) => write!(
                f,
                "{}{{len: {}, cap: {}}}@{:#x}+{}",
                self.ty,
                self.len,
                self.cap,
                addr_of(buf),
                self.start
            ),
        }
    }
}

/// Fixed-length elements stored by value.
#[derive(Clone)]
pub struct ArrayValue {
    ty: Type,
    elems: Box<[Value]>,
}

impl ArrayValue {
    /// Build an array of array type `ty`; `values` must match its length.
    pub fn new(ty: Type, values: Vec<Value>) -> Result<Self, ValueError> {
        let (elem, len) = match ty.kind() {
            TypeKind::Array { elem, len } => (elem, len),
            _ => {
                return Err(ValueError::TypeMismatch {
                    expected: "array".into(),
                    found: ty.name().to_string(),
                })
            }
        };
        if values.len() != len {
            return Err(ValueError::IndexOutOfRange {
                index: values.len(),
                len,
            });
        }
        let elems = values
            .into_iter()
            .map(|v| v.convert(elem))
            .collect::<Result<Box<[_]>, _>>()?;
        Ok(Self { ty, elems })
    }

    /// Array type.
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Element type.
    pub fn elem_type(&self) -> Type {
        elem_of(self.ty)
    }

    /// Fixed length.
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Whether the length is zero.
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Element `index`.
    pub fn get(&self, index: usize) -> Result<&Value, ValueError> {
        self.elems.get(index).ok_or(ValueError::IndexOutOfRange {
            index,
            len: self.elems.len(),
        })
    }

    /// Replace element `index`.
    pub fn set(&mut self, index: usize, value: Value) -> Result<(), ValueError> {
        let len = self.elems.len();
        let value = value.convert(elem_of(self.ty))?;
        let slot = self
            .elems
            .get_mut(index)
            .ok_or(ValueError::IndexOutOfRange { index, len })?;
        *slot = value;
        Ok(())
    }

    /// All elements.
    pub fn elems(&self) -> &[Value] {
        &self.elems
    }

    pub(crate) fn elems_mut(&mut self) -> &mut [Value] {
        &mut self.elems
    }
}

impl fmt::Debug for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)?;
        f.debug_list().entries(self.elems.iter()).finish()
    }
}

/// A comparable value usable as a map key.
///
/// Pointers and channels compare by identity, text by content, floats by
/// `==` (so `-0.0` and `0.0` are the same key). Sequences, maps and
/// callables are not comparable.
#[derive(Clone, Debug)]
pub struct MapKey(Value);

impl MapKey {
    /// Check that `value` is comparable.
    pub fn new(value: Value) -> Result<Self, ValueError> {
        check_comparable(&value)?;
        Ok(Self(value))
    }

    pub(crate) fn new_unchecked(value: Value) -> Self {
        Self(value)
    }

    /// The key value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Unwrap the key value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

fn check_comparable(value: &Value) -> Result<(), ValueError> {
    match value {
        Value::Sequence(_) | Value::Map(_) | Value::Func(_) => Err(ValueError::UnhashableKey {
            kind: value.kind(),
        }),
        Value::Array(a) => a.elems.iter().try_for_each(check_comparable),
        Value::Struct(s) => s.slots.iter().try_for_each(check_comparable),
        Value::Variant(v) => v.inner.as_deref().map_or(Ok(()), check_comparable),
        _ => Ok(()),
    }
}

fn hash_key<H: Hasher>(value: &Value, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        Value::Bool(b) => b.hash(state),
        Value::Int(i) => i.hash(state),
        Value::Uint(u) => u.hash(state),
        Value::Float(x) => {
            let bits = if *x == 0.0 { 0 } else { x.to_bits() };
            bits.hash(state)
        }
        Value::Str(s) => s.hash(state),
        Value::RawAddr(a) => a.hash(state),
        Value::TypeHandle(t) => t.hash(state),
        Value::Pointer(p) => p.addr().hash(state),
        Value::Channel(c) => c.addr().hash(state),
        Value::Array(a) => a.elems.iter().for_each(|e| hash_key(e, state)),
        Value::Struct(s) => {
            s.ty.hash(state);
            s.slots.iter().for_each(|e| hash_key(e, state));
        }
        Value::Variant(v) => match v.inner.as_deref() {
            None => 0u8.hash(state),
            Some(inner) => {
                1u8.hash(state);
                hash_key(inner, state);
            }
        },
        Value::Sequence(_) | Value::Map(_) | Value::Func(_) => {}
    }
}

fn key_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Uint(x), Value::Uint(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::RawAddr(x), Value::RawAddr(y)) => x == y,
        (Value::TypeHandle(x), Value::TypeHandle(y)) => x == y,
        (Value::Pointer(x), Value::Pointer(y)) => x.ty == y.ty && x.ptr_eq(y),
        (Value::Channel(x), Value::Channel(y)) => x.ty == y.ty && x.addr() == y.addr(),
        (Value::Array(x), Value::Array(y)) => {
            x.ty == y.ty && x.elems.iter().zip(y.elems.iter()).all(|(p, q)| key_eq(p, q))
        }
        (Value::Struct(x), Value::Struct(y)) => {
            x.ty == y.ty && x.slots.iter().zip(y.slots.iter()).all(|(p, q)| key_eq(p, q))
        }
        (Value::Variant(x), Value::Variant(y)) => match (x.inner.as_deref(), y.inner.as_deref()) {
            (None, None) => true,
            (Some(p), Some(q)) => key_eq(p, q),
            _ => false,
        },
        _ => false,
    }
}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_key(&self.0, state);
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        key_eq(&self.0, &other.0)
    }
}

impl Eq for MapKey {}

/// A possibly-nil associative container.
#[derive(Clone)]
pub struct MapValue {
    ty: Type,
    data: Option<Arc<RwLock<MapData>>>,
}

impl MapValue {
    /// A nil map of map type `ty`.
    pub fn nil(ty: Type) -> Self {
        Self { ty, data: None }
    }

    /// An empty, non-nil map.
    pub fn new(ty: Type) -> Self {
        Self::with_capacity(ty, 0)
    }

    /// An empty, non-nil map with room for `n` entries.
    pub fn with_capacity(ty: Type, n: usize) -> Self {
        Self {
            ty,
            data: Some(Arc::new(RwLock::new(IndexMap::with_capacity(n)))),
        }
    }

    /// Map type.
    pub fn ty(&self) -> Type {
        self.ty
    }

    fn key_value_types(&self) -> (Type, Type) {
        match self.ty.kind() {
            TypeKind::Map { key, value } => (key, value),
            _ => panic!("replica: <bug> map value of non-map type '{}'", self.ty),
        }
    }

    /// Key type.
    pub fn key_type(&self) -> Type {
        self.key_value_types().0
    }

    /// Value type.
    pub fn value_type(&self) -> Type {
        self.key_value_types().1
    }

    /// Whether this map has no storage at all.
    pub fn is_nil(&self) -> bool {
        self.data.is_none()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.read_recursive().len())
    }

    /// Whether there are no entries (nil or empty).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the storage, or 0 when nil.
    pub fn addr(&self) -> usize {
        self.data.as_ref().map_or(0, addr_of)
    }

    /// Whether both handles share storage (or are both nil).
    pub fn ptr_eq(&self, other: &MapValue) -> bool {
        self.addr() == other.addr()
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&self, key: Value, value: Value) -> Result<Option<Value>, ValueError> {
        let (key_ty, value_ty) = self.key_value_types();
        let key = MapKey::new(key.convert(key_ty)?)?;
        let value = value.convert(value_ty)?;
        let data = self.data.as_ref().ok_or(ValueError::NilDereference { kind: Kind::Map })?;
        Ok(data.write().insert(key, value))
    }

    pub(crate) fn insert_key(&self, key: MapKey, value: Value) {
        if let Some(data) = &self.data {
            data.write().insert(key, value);
        }
    }

    /// A shadow copy of the value stored under `key`.
    pub fn get(&self, key: &Value) -> Option<Value> {
        let data = self.data.as_ref()?;
        let (key_ty, _) = self.key_value_types();
        let key = MapKey::new(key.clone().convert(key_ty).ok()?).ok()?;
        data.read_recursive().get(&key).cloned()
    }

    /// Remove `key`, returning its value.
    pub fn remove(&self, key: &Value) -> Option<Value> {
        let data = self.data.as_ref()?;
        let (key_ty, _) = self.key_value_types();
        let key = MapKey::new(key.clone().convert(key_ty).ok()?).ok()?;
        data.write().shift_remove(&key)
    }

    /// Shadow copies of all entries in iteration order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        match &self.data {
            Some(data) => data
                .read_recursive()
                .iter()
                .map(|(k, v)| (k.0.clone(), v.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn read(&self) -> Option<RwLockReadGuard<'_, MapData>> {
        self.data.as_ref().map(|d| d.read_recursive())
    }
}

impl fmt::Debug for MapValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            None => write!(f, "{}(nil)", self.ty),
            Some(data) => write!(
                f,
                "{}{{len: {}}}@{:#x}",
                self.ty,
                data.read_recursive().len(),
                addr_of(data)
            ),
        }
    }
}

/// Member values of a struct in slot order.
#[derive(Clone)]
pub struct StructValue {
    ty: Type,
    slots: Box<[Value]>,
}

impl StructValue {
    /// The zero value of struct type `ty`.
    pub fn new(ty: Type) -> Result<Self, ValueError> {
        match Value::zero(ty) {
            Value::Struct(s) => Ok(s),
            other => Err(ValueError::TypeMismatch {
                expected: "struct".into(),
                found: other.ty().name().to_string(),
            }),
        }
    }

    /// A `Timestamp` at `secs` plus `nanos` in `zone` (a `*Zone`, may be nil).
    pub fn timestamp(secs: i64, nanos: i64, zone: Pointer) -> Result<Self, ValueError> {
        if zone.ty() != Type::ZONE_PTR {
            return Err(mismatch(Type::ZONE_PTR, zone.ty()));
        }
        Ok(Self {
            ty: Type::TIMESTAMP,
            slots: vec![Value::Int(secs), Value::Int(nanos), Value::Pointer(zone)].into(),
        })
    }

    /// Struct type.
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Member descriptors in slot order.
    pub fn fields(&self) -> Arc<[FieldDesc]> {
        match self.ty.fields() {
            Some(fields) => fields,
            None => panic!("replica: <bug> struct value of non-struct type '{}'", self.ty),
        }
    }

    fn index_of(&self, name: &str) -> Result<(usize, FieldDesc), ValueError> {
        let fields = self.fields();
        fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| (i, fields[i].clone()))
            .ok_or_else(|| ValueError::UnknownField {
                ty: self.ty.name().to_string(),
                field: name.to_string(),
            })
    }

    /// Read any member, private ones included.
    pub fn field(&self, name: &str) -> Result<&Value, ValueError> {
        let (index, _) = self.index_of(name)?;
        Ok(&self.slots[index])
    }

    /// Member in slot `index`.
    pub fn field_at(&self, index: usize) -> Option<&Value> {
        self.slots.get(index)
    }

    /// Set an exported member.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), ValueError> {
        let (index, desc) = self.index_of(name)?;
        if !desc.exported {
            return Err(ValueError::FieldNotExported {
                ty: self.ty.name().to_string(),
                field: name.to_string(),
            });
        }
        self.slots[index] = value.convert(desc.ty)?;
        Ok(())
    }

    /// Builder form of [`set_field`](Self::set_field).
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, ValueError> {
        self.set_field(name, value.into())?;
        Ok(self)
    }

    /// All members in slot order.
    pub fn slots(&self) -> &[Value] {
        &self.slots
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut Value {
        &mut self.slots[index]
    }
}

impl fmt::Debug for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.ty.name();
        let fields = self.fields();
        let mut s = f.debug_struct(&name);
        for (desc, slot) in fields.iter().zip(self.slots.iter()) {
            s.field(&desc.name, slot);
        }
        s.finish()
    }
}

/// A dynamically typed slot.
#[derive(Clone)]
pub struct Variant {
    ty: Type,
    inner: Option<Box<Value>>,
}

impl Variant {
    /// A variant of variant type `ty` holding nothing.
    pub fn empty(ty: Type) -> Self {
        Self { ty, inner: None }
    }

    /// A variant of variant type `ty` holding `value`. A variant argument
    /// contributes its payload rather than nesting.
    pub fn new(ty: Type, value: Value) -> Self {
        let inner = match value {
            Value::Variant(v) => v.inner,
            other => Some(Box::new(other)),
        };
        Self { ty, inner }
    }

    /// `any` holding `value`.
    pub fn any(value: impl Into<Value>) -> Self {
        Self::new(Type::ANY, value.into())
    }

    /// Variant type.
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// The payload.
    pub fn get(&self) -> Option<&Value> {
        self.inner.as_deref()
    }

    /// Type of the payload.
    pub fn dynamic_type(&self) -> Option<Type> {
        self.inner.as_ref().map(|v| v.ty())
    }

    /// Whether the variant holds nothing.
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            None => write!(f, "{}(nil)", self.ty),
            Some(inner) => write!(f, "{}({inner:?})", self.ty),
        }
    }
}

/// Both ends of a bounded channel.
pub struct ChannelHandle {
    tx: Sender<Value>,
    rx: Receiver<Value>,
    cap: usize,
}

impl ChannelHandle {
    /// A channel buffering up to `cap` values; 0 is a rendezvous channel.
    pub fn new(cap: usize) -> Self {
        let (tx, rx) = bounded(cap);
        Self { tx, rx, cap }
    }
}

/// A possibly-nil handle to a bounded channel.
#[derive(Clone)]
pub struct Channel {
    ty: Type,
    inner: Option<Arc<ChannelHandle>>,
}

impl Channel {
    /// A nil channel of channel type `ty`.
    pub fn nil(ty: Type) -> Self {
        Self { ty, inner: None }
    }

    /// A fresh channel buffering up to `cap` values.
    pub fn new(ty: Type, cap: usize) -> Self {
        Self {
            ty,
            inner: Some(Arc::new(ChannelHandle::new(cap))),
        }
    }

    /// Channel type.
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Whether this handle is nil.
    pub fn is_nil(&self) -> bool {
        self.inner.is_none()
    }

    /// Buffer capacity, 0 when nil.
    pub fn cap(&self) -> usize {
        self.inner.as_ref().map_or(0, |h| h.cap)
    }

    /// Number of queued values.
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |h| h.rx.len())
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the shared handle, or 0 when nil.
    pub fn addr(&self) -> usize {
        self.inner.as_ref().map_or(0, addr_of)
    }

    /// Queue `value` without blocking. `Ok(false)` when the buffer is full.
    pub fn try_send(&self, value: Value) -> Result<bool, ValueError> {
        let handle = self.inner.as_ref().ok_or(ValueError::NilDereference {
            kind: Kind::Channel,
        })?;
        let value = value.convert(elem_of(self.ty))?;
        match handle.tx.try_send(value) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => Ok(false),
        }
    }

    /// Take a queued value without blocking.
    pub fn try_recv(&self) -> Option<Value> {
        self.inner.as_ref()?.rx.try_recv().ok()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            None => write!(f, "{}(nil)", self.ty),
            Some(h) => write!(f, "{}{{cap: {}}}@{:#x}", self.ty, h.cap, addr_of(h)),
        }
    }
}

type Seen = HashSet<(usize, usize, Type)>;

fn deep_eq(a: &Value, b: &Value, seen: &mut Seen) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Uint(x), Value::Uint(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Func(x), Value::Func(y)) => match (x, y) {
            (None, None) => true,
            (Some(f), Some(g)) => f.ptr_eq(g),
            _ => false,
        },
        (Value::RawAddr(x), Value::RawAddr(y)) => x == y,
        (Value::TypeHandle(x), Value::TypeHandle(y)) => x == y,
        (Value::Pointer(p), Value::Pointer(q)) => {
            if p.ty != q.ty {
                return false;
            }
            match (&p.cell, &q.cell) {
                (None, None) => true,
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(x, y) || !seen.insert((addr_of(x), addr_of(y), p.ty)) {
                        return true;
                    }
                    let (x, y) = (x.read_recursive(), y.read_recursive());
                    deep_eq(&x, &y, seen)
                }
                _ => false,
            }
        }
        (Value::Sequence(s), Value::Sequence(t)) => {
            if s.ty != t.ty || s.len != t.len {
                return false;
            }
            match (&s.buf, &t.buf) {
                (None, None) => true,
                (Some(x), Some(y)) => {
                    if s.ptr_eq(t)
                        || !seen.insert((addr_of(x) + s.start, addr_of(y) + t.start, s.ty))
                    {
                        return true;
                    }
                    let (x, y) = (x.read_recursive(), y.read_recursive());
                    let xs = &x[s.start..s.start + s.len];
                    let ys = &y[t.start..t.start + t.len];
                    xs.iter().zip(ys).all(|(p, q)| deep_eq(p, q, seen))
                }
                _ => false,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.ty == y.ty
                && x.elems
                    .iter()
                    .zip(y.elems.iter())
                    .all(|(p, q)| deep_eq(p, q, seen))
        }
        (Value::Map(m), Value::Map(n)) => {
            if m.ty != n.ty {
                return false;
            }
            match (&m.data, &n.data) {
                (None, None) => true,
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(x, y) || !seen.insert((addr_of(x), addr_of(y), m.ty)) {
                        return true;
                    }
                    let (x, y) = (x.read_recursive(), y.read_recursive());
                    x.len() == y.len()
                        && x.iter().all(|(k, v)| match y.get(k) {
                            Some(w) => deep_eq(v, w, seen),
                            None => false,
                        })
                }
                _ => false,
            }
        }
        (Value::Struct(x), Value::Struct(y)) => {
            x.ty == y.ty
                && x.slots
                    .iter()
                    .zip(y.slots.iter())
                    .all(|(p, q)| deep_eq(p, q, seen))
        }
        (Value::Variant(x), Value::Variant(y)) => {
            x.ty == y.ty
                && match (x.inner.as_deref(), y.inner.as_deref()) {
                    (None, None) => true,
                    (Some(p), Some(q)) => deep_eq(p, q, seen),
                    _ => false,
                }
        }
        (Value::Channel(x), Value::Channel(y)) => x.ty == y.ty && x.addr() == y.addr(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Type {
        Type::new_struct(
            "Point",
            vec![FieldDesc::new("x", Type::INT), FieldDesc::new("y", Type::INT)],
        )
        .unwrap()
    }

    #[test]
    fn zero_values_are_absent_not_empty() {
        let seq = Value::zero(Type::sequence_of(Type::INT));
        assert!(seq.as_sequence().unwrap().is_nil());
        let map = Value::zero(Type::map_of(Type::STR, Type::INT));
        assert!(map.as_map().unwrap().is_nil());
        let any = Value::zero(Type::ANY);
        assert!(any.as_variant().unwrap().is_empty());

        let empty = Sequence::from_values(Type::sequence_of(Type::INT), vec![]).unwrap();
        assert_ne!(Value::from(empty), seq);
    }

    #[test]
    fn set_field_refuses_private_members() {
        let ty = Type::new_struct(
            "Secret",
            vec![
                FieldDesc::new("open", Type::INT),
                FieldDesc::private("hidden", Type::INT),
            ],
        )
        .unwrap();
        let mut s = StructValue::new(ty).unwrap();
        s.set_field("open", Value::Int(1)).unwrap();
        assert!(matches!(
            s.set_field("hidden", Value::Int(2)),
            Err(ValueError::FieldNotExported { .. })
        ));
        assert_eq!(s.field("hidden").unwrap(), &Value::Int(0));
        assert!(matches!(
            s.field("nope"),
            Err(ValueError::UnknownField { .. })
        ));
    }

    #[test]
    fn set_field_checks_types() {
        let mut s = StructValue::new(point()).unwrap();
        assert!(matches!(
            s.set_field("x", Value::from("one")),
            Err(ValueError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn variant_slots_accept_anything() {
        let holder = Type::new_struct("Holder", vec![FieldDesc::new("v", Type::ANY)]).unwrap();
        let s = StructValue::new(holder).unwrap().with("v", 7i64).unwrap();
        let v = s.field("v").unwrap().as_variant().unwrap();
        assert_eq!(v.dynamic_type(), Some(Type::INT));
    }

    #[test]
    fn sequence_views_share_their_buffer() {
        let ty = Type::sequence_of(Type::INT);
        let full = Sequence::make(ty, 4, 8);
        let tail = full.slice(2, 4).unwrap();
        tail.set(0, Value::Int(9)).unwrap();
        assert_eq!(full.get(2).unwrap(), Value::Int(9));
        assert_eq!(tail.cap(), 6);
        assert_eq!(tail.addr(), full.addr());
        assert!(!tail.ptr_eq(&full));
    }

    #[test]
    fn push_reuses_spare_capacity() {
        let ty = Type::sequence_of(Type::INT);
        let s = Sequence::make(ty, 1, 2);
        let t = s.push(Value::Int(5)).unwrap();
        assert_eq!(t.addr(), s.addr());
        let u = t.push(Value::Int(6)).unwrap();
        assert_ne!(u.addr(), s.addr());
        assert_eq!(u.to_vec(), vec![Value::Int(0), Value::Int(5), Value::Int(6)]);
        assert_eq!(u.cap(), 4);
    }

    #[test]
    fn push_onto_nil_allocates() {
        let s = Sequence::nil(Type::sequence_of(Type::STR));
        let t = s.push(Value::from("a")).unwrap();
        assert!(!t.is_nil());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn map_rejects_incomparable_keys() {
        let seq_ty = Type::sequence_of(Type::INT);
        let m = MapValue::new(Type::map_of(Type::ANY, Type::INT));
        let key = Value::from(Sequence::make(seq_ty, 0, 0));
        assert!(matches!(
            m.insert(key, Value::Int(1)),
            Err(ValueError::UnhashableKey {
                kind: Kind::Sequence
            })
        ));
        m.insert(Value::from("k"), Value::Int(1)).unwrap();
        assert_eq!(m.get(&Value::from("k")), Some(Value::Int(1)));
    }

    #[test]
    fn insert_into_nil_map_fails() {
        let m = MapValue::nil(Type::map_of(Type::STR, Type::INT));
        assert!(matches!(
            m.insert(Value::from("k"), Value::Int(1)),
            Err(ValueError::NilDereference { kind: Kind::Map })
        ));
    }

    #[test]
    fn float_zero_keys_coincide() {
        let m = MapValue::new(Type::map_of(Type::FLOAT, Type::INT));
        m.insert(Value::Float(0.0), Value::Int(1)).unwrap();
        m.insert(Value::Float(-0.0), Value::Int(2)).unwrap();
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn deep_eq_tolerates_cycles() {
        let node = Type::declare_struct("Loop");
        node.define_struct(vec![FieldDesc::new("next", Type::pointer_to(node))])
            .unwrap();
        let make = || {
            let p = Pointer::to(Value::zero(node));
            p.set_field("next", p.clone().into()).unwrap();
            p
        };
        let (a, b) = (make(), make());
        assert!(!a.ptr_eq(&b));
        assert_eq!(Value::from(a), Value::from(b));
    }

    #[test]
    fn channels_queue_up_to_capacity() {
        let ch = Channel::new(Type::channel_of(Type::INT), 1);
        assert!(ch.try_send(Value::Int(1)).unwrap());
        assert!(!ch.try_send(Value::Int(2)).unwrap());
        assert_eq!(ch.len(), 1);
        assert_eq!(ch.try_recv(), Some(Value::Int(1)));
        assert!(Channel::nil(ch.ty()).try_send(Value::Int(1)).is_err());
    }

    #[test]
    fn array_length_is_checked() {
        let ty = Type::array_of(Type::INT, 2);
        assert!(ArrayValue::new(ty, vec![Value::Int(1)]).is_err());
        let mut a = ArrayValue::new(ty, vec![Value::Int(1), Value::Int(2)]).unwrap();
        a.set(1, Value::Int(3)).unwrap();
        assert_eq!(a.get(1).unwrap(), &Value::Int(3));
        assert!(a.get(2).is_err());
    }

    #[test]
    fn timestamp_keeps_private_zone() {
        let zone = Pointer::to(
            StructValue::new(Type::ZONE)
                .unwrap()
                .with("name", "UTC")
                .unwrap()
                .into(),
        );
        let ts = StructValue::timestamp(10, 5, zone.clone()).unwrap();
        assert!(ts.field("zone").unwrap().as_pointer().unwrap().ptr_eq(&zone));
        assert!(StructValue::timestamp(0, 0, Pointer::null(Type::pointer_to(Type::INT))).is_err());
    }
}
