//! Dynamic view over configuration values.
//!
//! [`Inspect`] is the object-safe contract every member value implements:
//! declared type, equality, JSON read/write, and access to nested aggregates.
//! [`fork`] produces a copy that shares no node with the source.
//! [`Aggregate`] adds catalog-indexed member access for configuration objects.
//!
//! Implementations are provided for scalars, `String`, `PathBuf`, `Vec<T>`,
//! string-keyed `HashMap`/`BTreeMap`, `Option<T>`, `Box<T>` and shared nodes
//! `Arc<parking_lot::RwLock<T>>`. Structs get theirs from `#[derive(Config)]`.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::catalog::{Catalog, TypeInfo, TypeKind};
use crate::equality::VisitGuard;
use crate::error::{ValueError, ValueResult};

// ─── Traits ───────────────────────────────────────────────────────────────────

/// Object-safe view of a configuration value.
pub trait Inspect: Any + Send + Sync + 'static {
    /// Declared type of `Self`.
    fn declared() -> TypeInfo
    where
        Self: Sized;

    /// Declared type of this value.
    fn type_info(&self) -> TypeInfo;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Semantic equality with another value.
    ///
    /// Values of a different concrete type are never equal. `guard` tracks
    /// shared nodes currently being compared.
    fn eq_inspect(&self, other: &dyn Inspect, guard: &mut VisitGuard) -> bool;

    /// Address of the shared node behind this value, if it is one.
    fn identity(&self) -> Option<usize> {
        None
    }

    /// Direct access to a nested aggregate.
    fn as_aggregate(&self) -> Option<&dyn Aggregate> {
        None
    }

    /// Calls `visit` with the nested aggregate, if any.
    ///
    /// Unlike [`as_aggregate`](Inspect::as_aggregate) this also reaches
    /// aggregates behind a lock.
    fn visit_aggregate(&self, visit: &mut dyn FnMut(&dyn Aggregate)) {
        if let Some(aggregate) = self.as_aggregate() {
            visit(aggregate);
        }
    }

    /// Serializes the value. Ignored members of aggregates are omitted.
    fn to_json(&self) -> Value;

    /// Populates the value from JSON.
    ///
    /// Aggregates keep members absent from the JSON object; sequences and
    /// mappings are replaced.
    fn assign_json(&mut self, value: &Value) -> ValueResult<()>;

    /// Replaces every shared node reachable from this value with its copy
    /// in `copies`, creating copies on first visit.
    fn detach(&mut self, _copies: &mut SharedCopies) {}
}

/// A configuration object whose members are described by a [`Catalog`].
pub trait Aggregate: Inspect + 'static {
    /// The member catalog of the concrete type.
    fn catalog(&self) -> &'static Catalog;

    /// Reads the member at catalog `index`.
    fn field(&self, index: usize) -> Option<&dyn Inspect>;

    /// Mutable access to the member at catalog `index`.
    fn field_mut(&mut self, index: usize) -> Option<&mut dyn Inspect>;
}

// ─── Forking ──────────────────────────────────────────────────────────────────

/// Copies of shared nodes made during one [`fork`], keyed by source address.
#[derive(Default)]
pub struct SharedCopies {
    copies: HashMap<usize, Box<dyn Any + Send + Sync>>,
}

impl SharedCopies {
    pub fn new() -> Self {
        Self::default()
    }

    /// The copy made for the node at `id`.
    pub fn get<N: Clone + 'static>(&self, id: usize) -> Option<N> {
        self.copies.get(&id)?.downcast_ref::<N>().cloned()
    }

    pub fn insert<N: Any + Send + Sync>(&mut self, id: usize, copy: N) {
        self.copies.insert(id, Box::new(copy));
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}

/// Clones `value` and gives the clone its own shared nodes.
///
/// `Clone` on `Arc<RwLock<T>>` aliases the node. The fork copies each
/// reachable node once, so aliasing and cycles inside the value keep their
/// shape while writes to the fork never reach `value`.
pub fn fork<T: Inspect + Clone>(value: &T) -> T {
    let mut copy = value.clone();
    let mut copies = SharedCopies::new();
    copy.detach(&mut copies);
    if !copies.is_empty() {
        trace!(nodes = copies.len(), "Forked shared nodes");
    }
    copy
}

// ─── Aggregate helpers (used by the derive) ──────────────────────────────────

/// Serializes the non-ignored members of an aggregate into a JSON object.
pub fn aggregate_to_json(aggregate: &dyn Aggregate) -> Value {
    let mut object = Map::new();
    for member in aggregate.catalog().members() {
        if member.is_ignored() {
            continue;
        }
        if let Some(value) = member.get(aggregate) {
            object.insert(member.name().to_string(), value.to_json());
        }
    }
    Value::Object(object)
}

/// Populates the non-ignored members of an aggregate from a JSON object.
///
/// Unknown keys are skipped and absent members keep their current value.
pub fn aggregate_assign_json(aggregate: &mut dyn Aggregate, value: &Value) -> ValueResult<()> {
    let Value::Object(object) = value else {
        return Err(ValueError::mismatch("object", value));
    };

    let catalog = aggregate.catalog();
    for member in catalog.members() {
        if member.is_ignored() {
            continue;
        }
        let Some(json) = object.get(member.name()) else {
            continue;
        };
        if let Some(field) = member.get_mut(aggregate) {
            field
                .assign_json(json)
                .map_err(|e| e.within(member.name()))?;
        }
    }

    for key in object.keys() {
        if catalog.find(key).is_none() {
            trace!(aggregate = catalog.type_name(), key = %key, "Skipping unknown member");
        }
    }
    Ok(())
}

// ─── Scalars ──────────────────────────────────────────────────────────────────

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl Inspect for $ty {
            fn declared() -> TypeInfo {
                TypeInfo::of::<$ty>(TypeKind::Scalar)
            }

            fn type_info(&self) -> TypeInfo {
                <Self as Inspect>::declared()
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn eq_inspect(&self, other: &dyn Inspect, _guard: &mut VisitGuard) -> bool {
                other
                    .as_any()
                    .downcast_ref::<$ty>()
                    .is_some_and(|other| self == other)
            }

            fn to_json(&self) -> Value {
                serde_json::to_value(self).unwrap_or(Value::Null)
            }

            fn assign_json(&mut self, value: &Value) -> ValueResult<()> {
                *self = <$ty>::deserialize(value).map_err(|e| ValueError::invalid(e.to_string()))?;
                Ok(())
            }
        }
    )*};
}

impl_scalar!(
    bool, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String, PathBuf,
);

// ─── Sequences ────────────────────────────────────────────────────────────────

impl<T: Inspect + Default> Inspect for Vec<T> {
    fn declared() -> TypeInfo {
        TypeInfo::of::<Self>(TypeKind::Sequence)
    }

    fn type_info(&self) -> TypeInfo {
        <Self as Inspect>::declared()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_inspect(&self, other: &dyn Inspect, guard: &mut VisitGuard) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        self.len() == other.len()
            && self
                .iter()
                .zip(other)
                .all(|(left, right)| left.eq_inspect(right, guard))
    }

    fn to_json(&self) -> Value {
        Value::Array(self.iter().map(|item| item.to_json()).collect())
    }

    fn assign_json(&mut self, value: &Value) -> ValueResult<()> {
        let Value::Array(items) = value else {
            return Err(ValueError::mismatch("array", value));
        };
        let mut values = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let mut element = T::default();
            element
                .assign_json(item)
                .map_err(|e| e.within(&i.to_string()))?;
            values.push(element);
        }
        *self = values;
        Ok(())
    }

    fn detach(&mut self, copies: &mut SharedCopies) {
        for item in self.iter_mut() {
            item.detach(copies);
        }
    }
}

// ─── Mappings ─────────────────────────────────────────────────────────────────

macro_rules! impl_mapping {
    ($($map:ident),* $(,)?) => {$(
        impl<V: Inspect + Default> Inspect for $map<String, V> {
            fn declared() -> TypeInfo {
                TypeInfo::of::<Self>(TypeKind::Mapping)
            }

            fn type_info(&self) -> TypeInfo {
                <Self as Inspect>::declared()
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn eq_inspect(&self, other: &dyn Inspect, guard: &mut VisitGuard) -> bool {
                let Some(other) = other.as_any().downcast_ref::<Self>() else {
                    return false;
                };
                self.len() == other.len()
                    && self.iter().all(|(key, left)| {
                        other
                            .get(key)
                            .is_some_and(|right| left.eq_inspect(right, guard))
                    })
            }

            fn to_json(&self) -> Value {
                Value::Object(
                    self.iter()
                        .map(|(key, value)| (key.clone(), value.to_json()))
                        .collect(),
                )
            }

            fn assign_json(&mut self, value: &Value) -> ValueResult<()> {
                let Value::Object(entries) = value else {
                    return Err(ValueError::mismatch("object", value));
                };
                let mut values = $map::new();
                for (key, item) in entries {
                    let mut element = V::default();
                    element.assign_json(item).map_err(|e| e.within(key))?;
                    values.insert(key.clone(), element);
                }
                *self = values;
                Ok(())
            }

            fn detach(&mut self, copies: &mut SharedCopies) {
                for value in self.values_mut() {
                    value.detach(copies);
                }
            }
        }
    )*};
}

impl_mapping!(HashMap, BTreeMap);

// ─── Option / Box ─────────────────────────────────────────────────────────────

impl<T: Inspect + Default> Inspect for Option<T> {
    fn declared() -> TypeInfo {
        TypeInfo::wrapping::<Self>(T::declared())
    }

    fn type_info(&self) -> TypeInfo {
        <Self as Inspect>::declared()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_inspect(&self, other: &dyn Inspect, guard: &mut VisitGuard) -> bool {
        match (self, other.as_any().downcast_ref::<Self>()) {
            (Some(left), Some(Some(right))) => left.eq_inspect(right, guard),
            (None, Some(None)) => true,
            _ => false,
        }
    }

    fn identity(&self) -> Option<usize> {
        self.as_ref().and_then(Inspect::identity)
    }

    fn as_aggregate(&self) -> Option<&dyn Aggregate> {
        self.as_ref().and_then(Inspect::as_aggregate)
    }

    fn visit_aggregate(&self, visit: &mut dyn FnMut(&dyn Aggregate)) {
        if let Some(inner) = self {
            inner.visit_aggregate(visit);
        }
    }

    fn to_json(&self) -> Value {
        self.as_ref().map_or(Value::Null, Inspect::to_json)
    }

    fn assign_json(&mut self, value: &Value) -> ValueResult<()> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        match self {
            Some(inner) => inner.assign_json(value),
            None => {
                let mut inner = T::default();
                inner.assign_json(value)?;
                *self = Some(inner);
                Ok(())
            }
        }
    }

    fn detach(&mut self, copies: &mut SharedCopies) {
        if let Some(inner) = self {
            inner.detach(copies);
        }
    }
}

impl<T: Inspect> Inspect for Box<T> {
    fn declared() -> TypeInfo {
        TypeInfo::wrapping::<Self>(T::declared())
    }

    fn type_info(&self) -> TypeInfo {
        <Self as Inspect>::declared()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_inspect(&self, other: &dyn Inspect, guard: &mut VisitGuard) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| (**self).eq_inspect(&**other, guard))
    }

    fn identity(&self) -> Option<usize> {
        (**self).identity()
    }

    fn as_aggregate(&self) -> Option<&dyn Aggregate> {
        (**self).as_aggregate()
    }

    fn visit_aggregate(&self, visit: &mut dyn FnMut(&dyn Aggregate)) {
        (**self).visit_aggregate(visit);
    }

    fn to_json(&self) -> Value {
        (**self).to_json()
    }

    fn assign_json(&mut self, value: &Value) -> ValueResult<()> {
        (**self).assign_json(value)
    }

    fn detach(&mut self, copies: &mut SharedCopies) {
        (**self).detach(copies);
    }
}

// ─── Shared nodes ─────────────────────────────────────────────────────────────

thread_local! {
    /// Shared nodes currently being serialized on this thread.
    static SERIALIZING: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// A node shared by reference; the only way to build cyclic graphs.
///
/// Equality and change detection guard against revisiting a node that is
/// mid-comparison. Serialization writes `null` for a back-reference.
impl<T: Inspect + Default + Clone> Inspect for Arc<RwLock<T>> {
    fn declared() -> TypeInfo {
        TypeInfo::wrapping::<Self>(T::declared())
    }

    fn type_info(&self) -> TypeInfo {
        <Self as Inspect>::declared()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_inspect(&self, other: &dyn Inspect, guard: &mut VisitGuard) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        if Arc::ptr_eq(self, other) {
            return true;
        }

        let (left, right) = (Arc::as_ptr(self) as usize, Arc::as_ptr(other) as usize);
        if !guard.enter(left, right) {
            trace!(left, right, "Cycle detected during equality check");
            return false;
        }
        let equal = {
            let left = self.read_recursive();
            let right = other.read_recursive();
            (*left).eq_inspect(&*right, guard)
        };
        guard.leave(left, right);
        equal
    }

    fn identity(&self) -> Option<usize> {
        Some(Arc::as_ptr(self) as usize)
    }

    fn visit_aggregate(&self, visit: &mut dyn FnMut(&dyn Aggregate)) {
        let inner = self.read_recursive();
        (*inner).visit_aggregate(visit);
    }

    fn to_json(&self) -> Value {
        let id = Arc::as_ptr(self) as usize;
        let entered = SERIALIZING.with(|nodes| nodes.borrow_mut().insert(id));
        if !entered {
            trace!(node = id, "Back-reference serialized as null");
            return Value::Null;
        }
        let json = self.read_recursive().to_json();
        SERIALIZING.with(|nodes| nodes.borrow_mut().remove(&id));
        json
    }

    fn assign_json(&mut self, value: &Value) -> ValueResult<()> {
        let Some(mut inner) = self.try_write() else {
            return Err(ValueError::invalid("shared value is locked"));
        };
        inner.assign_json(value)
    }

    fn detach(&mut self, copies: &mut SharedCopies) {
        let id = Arc::as_ptr(self) as usize;
        if let Some(copy) = copies.get::<Self>(id) {
            *self = copy;
            return;
        }
        let copy = Arc::new(RwLock::new(self.read_recursive().clone()));
        copies.insert(id, Arc::clone(&copy));
        copy.write().detach(copies);
        *self = copy;
    }
}
