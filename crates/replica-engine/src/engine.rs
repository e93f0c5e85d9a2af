//! The recursive graph copy.
//!
//! Every referent is allocated and registered in the visited table before
//! its contents are cloned, so a cycle that leads back to it finds the new
//! destination instead of recursing. No fix-up pass is needed.

use std::collections::HashMap;
use std::sync::Arc;

use replica_core::{Kind, Type};

use crate::alloc::Allocator;
use crate::custom::Cloner;
use crate::value::{
    ArrayValue, Channel, MapKey, MapValue, Pointer, Sequence, StructValue, Value, Variant,
};

/// Identity of a source referent in the visited table.
///
/// `offset` and `extra` tell apart different views over one sequence
/// buffer: same buffer, different start or length, different target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct VisitKey {
    addr: usize,
    offset: usize,
    extra: usize,
    ty: Type,
}

impl VisitKey {
    fn new(addr: usize, ty: Type) -> Self {
        Self {
            addr,
            offset: 0,
            extra: 0,
            ty,
        }
    }
}

/// State of one top-level clone call.
pub(crate) struct CloneState<'a> {
    allocator: &'a Allocator,
    visited: Option<HashMap<VisitKey, Value>>,
    excluded: Option<(usize, Type)>,
}

impl<'a> CloneState<'a> {
    pub(crate) fn new(allocator: &'a Allocator, safe: bool) -> Self {
        Self {
            allocator,
            visited: safe.then(HashMap::new),
            excluded: None,
        }
    }

    /// Let `value` bypass its own override for the rest of this call.
    pub(crate) fn excluding(mut self, value: &Value) -> Self {
        self.excluded = Some((value as *const Value as usize, value.ty()));
        self
    }

    fn is_excluded(&self, value: &Value) -> bool {
        self.excluded == Some((value as *const Value as usize, value.ty()))
    }

    fn lookup(&self, key: &VisitKey) -> Option<Value> {
        self.visited.as_ref()?.get(key).cloned()
    }

    fn remember(&mut self, key: VisitKey, dst: Value) {
        if let Some(visited) = &mut self.visited {
            visited.insert(key, dst);
        }
    }

    pub(crate) fn clone_value(&mut self, src: &Value) -> Value {
        match src {
            Value::Bool(_)
            | Value::Int(_)
            | Value::Uint(_)
            | Value::Float(_)
            | Value::Func(_)
            | Value::RawAddr(_)
            | Value::TypeHandle(_) => src.clone(),
            Value::Str(s) => {
                if self.allocator.is_scalar_kind(Kind::Str) {
                    src.clone()
                } else {
                    Value::Str(Arc::from(&**s))
                }
            }
            Value::Pointer(p) => self.clone_pointer(p),
            Value::Sequence(s) => self.clone_sequence(s),
            Value::Array(a) => Value::Array(self.clone_array(a)),
            Value::Map(m) => self.clone_map(m),
            Value::Struct(s) => Value::Struct(self.clone_struct(src, s)),
            Value::Variant(v) => match v.get() {
                None => src.clone(),
                Some(inner) => {
                    let inner = self.clone_value(inner);
                    Value::Variant(Variant::new(v.ty(), inner))
                }
            },
            Value::Channel(c) => self.clone_channel(c),
        }
    }

    fn clone_pointer(&mut self, src: &Pointer) -> Value {
        let cell = match src.cell() {
            Some(cell) if !self.allocator.is_opaque(src.ty()) => cell,
            _ => return Value::Pointer(src.clone()),
        };
        let key = VisitKey::new(src.addr(), src.ty());
        if let Some(dst) = self.lookup(&key) {
            return dst;
        }

        let dst = self.allocator.alloc(src.elem_type());
        self.remember(key, Value::Pointer(dst.clone()));
        let value = {
            let guard = cell.read_recursive();
            self.clone_value(&guard)
        };
        if let Some(mut slot) = dst.write() {
            *slot = value;
        }
        Value::Pointer(dst)
    }

    fn clone_sequence(&mut self, src: &Sequence) -> Value {
        let buf = match src.buffer() {
            Some(buf) => buf,
            None => return Value::Sequence(src.clone()),
        };
        let key = VisitKey {
            addr: src.addr(),
            offset: src.offset(),
            extra: src.len(),
            ty: src.ty(),
        };
        if let Some(dst) = self.lookup(&key) {
            return dst;
        }

        let dst = self
            .allocator
            .make_sequence(src.ty(), src.len(), src.cap());
        self.remember(key, Value::Sequence(dst.clone()));
        let range = src.offset()..src.offset() + src.len();
        let values = {
            let guard = buf.read_recursive();
            if self.allocator.is_elidable(src.elem_type()) {
                guard[range].to_vec()
            } else {
                guard[range].iter().map(|v| self.clone_value(v)).collect()
            }
        };
        dst.write_prefix(values);
        Value::Sequence(dst)
    }

    fn clone_array(&mut self, src: &ArrayValue) -> ArrayValue {
        let mut dst = src.clone();
        if !self.allocator.is_elidable(src.elem_type()) {
            for (d, s) in dst.elems_mut().iter_mut().zip(src.elems()) {
                *d = self.clone_value(s);
            }
        }
        dst
    }

    fn clone_map(&mut self, src: &MapValue) -> Value {
        let data = match src.read() {
            Some(data) => data,
            None => return Value::Map(src.clone()),
        };
        let key = VisitKey::new(src.addr(), src.ty());
        if let Some(dst) = self.lookup(&key) {
            return dst;
        }

        let dst = self.allocator.make_map(src.ty(), data.len());
        self.remember(key, Value::Map(dst.clone()));
        let keys_elidable = self.allocator.is_elidable(src.key_type());
        let values_elidable = self.allocator.is_elidable(src.value_type());
        for (k, v) in data.iter() {
            let k = if keys_elidable {
                k.clone()
            } else {
                MapKey::new_unchecked(self.clone_value(k.value()))
            };
            let v = if values_elidable {
                v.clone()
            } else {
                self.clone_value(v)
            };
            dst.insert_key(k, v);
        }
        Value::Map(dst)
    }

    fn clone_struct(&mut self, whole: &Value, src: &StructValue) -> StructValue {
        let ty = src.ty();
        let meta = self.allocator.classify(ty);

        if let Some(f) = &meta.override_fn {
            if !self.is_excluded(whole) {
                let mut dst = Value::zero(ty);
                f(&Cloner::new(self.allocator), whole, &mut dst);
                return match dst {
                    Value::Struct(s) if s.ty() == ty => s,
                    other => panic!(
                        "replica: <bug> override for '{ty}' produced a value of type '{}'",
                        other.ty()
                    ),
                };
            }
        }

        let mut dst = src.clone();
        if meta.is_shallow() {
            return dst;
        }
        if !meta.zero_slots.is_empty() {
            let fields = src.fields();
            for &slot in &meta.zero_slots {
                *dst.slot_mut(slot) = Value::zero(fields[slot].ty);
            }
        }
        for &slot in &meta.ref_slots {
            *dst.slot_mut(slot) = self.clone_value(&src.slots()[slot]);
        }
        dst
    }

    fn clone_channel(&mut self, src: &Channel) -> Value {
        if src.is_nil() {
            return Value::Channel(src.clone());
        }
        let key = VisitKey::new(src.addr(), src.ty());
        if let Some(dst) = self.lookup(&key) {
            return dst;
        }
        let dst = self.allocator.make_channel(src.ty(), src.cap());
        self.remember(key, Value::Channel(dst.clone()));
        Value::Channel(dst)
    }
}

impl Allocator {
    /// Deep clone `value` with every new referent allocated from this
    /// allocator.
    ///
    /// This is the fast path: it keeps no visited table, so shared
    /// referents are duplicated and a cyclic `value` never terminates.
    /// Use [`clone_value_safely`](Self::clone_value_safely) for graphs
    /// that may contain cycles.
    pub fn clone_value(&self, value: &Value) -> Value {
        CloneState::new(self, false).clone_value(value)
    }

    /// Deep clone `value`, reproducing cycles and shared referents.
    ///
    /// Two references to one referent in `value` become two references to
    /// one new referent in the result.
    pub fn clone_value_safely(&self, value: &Value) -> Value {
        CloneState::new(self, true).clone_value(value)
    }
}
