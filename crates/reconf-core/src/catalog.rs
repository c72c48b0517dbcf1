//! Member catalog: the static, per-type description of a configuration object.
//!
//! A [`Catalog`] is generated once per type by `#[derive(Config)]` and stored in
//! a `static`; enumeration is a slice walk in declaration order, so it is stable
//! across calls and identical on both sides of a diff.

use std::any::{TypeId, type_name};
use std::borrow::Cow;

use serde::Serialize;

use crate::annotation::{self, Annotation, Ignore, Label, ReloadRequired};
use crate::entity::Scope;
use crate::inspect::{Aggregate, Inspect};
use crate::label;

// ─── TypeKind / TypeInfo ──────────────────────────────────────────────────────

/// Structural category of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Primitive or immutable value compared with native equality.
    Scalar,
    /// Ordered sequence (`Vec`).
    Sequence,
    /// String-keyed mapping (`HashMap`, `BTreeMap`).
    Mapping,
    /// Nested configuration object with its own catalog.
    Aggregate,
}

/// Description of a declared type: identity, category and type-level annotations.
///
/// `Option<T>`, `Box<T>` and `Arc<RwLock<T>>` are transparent: they report
/// `T`'s kind and annotations under their own name and [`TypeId`].
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    /// Fully qualified type name.
    pub name: &'static str,
    /// Runtime type identity.
    pub type_id: TypeId,
    /// Structural category.
    pub kind: TypeKind,
    /// Annotations declared on the type itself.
    pub annotations: &'static [Annotation],
    /// Member catalog of an aggregate type.
    pub catalog: Option<fn() -> &'static Catalog>,
}

impl TypeInfo {
    /// Describes `T` with the given kind and no annotations.
    pub fn of<T: ?Sized + 'static>(kind: TypeKind) -> Self {
        Self {
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            kind,
            annotations: &[],
            catalog: None,
        }
    }

    /// Describes the wrapper `W` around a value described by `inner`.
    pub fn wrapping<W: ?Sized + 'static>(inner: TypeInfo) -> Self {
        Self {
            name: type_name::<W>(),
            type_id: TypeId::of::<W>(),
            ..inner
        }
    }

    /// Replaces the type-level annotations.
    pub fn with_annotations(mut self, annotations: &'static [Annotation]) -> Self {
        self.annotations = annotations;
        self
    }

    /// Attaches the member catalog of an aggregate type.
    pub fn with_catalog(mut self, catalog: fn() -> &'static Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Returns `true` for nested configuration objects.
    pub fn is_aggregate(&self) -> bool {
        self.kind == TypeKind::Aggregate
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeInfo {}

// ─── Member ───────────────────────────────────────────────────────────────────

/// One inspectable field of a configuration type.
///
/// Values are read and written through the owning [`Aggregate`] by catalog
/// index, so a `Member` is plain `'static` data.
#[derive(Debug, Clone, Copy)]
pub struct Member {
    name: &'static str,
    index: usize,
    annotations: &'static [Annotation],
    declared: fn() -> TypeInfo,
}

impl Member {
    /// Creates a catalog entry. Called by `#[derive(Config)]`.
    pub const fn new(
        name: &'static str,
        index: usize,
        annotations: &'static [Annotation],
        declared: fn() -> TypeInfo,
    ) -> Self {
        Self {
            name,
            index,
            annotations,
            declared,
        }
    }

    /// Field name, also the persistence key.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Position in the catalog.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Annotations attached to the member itself.
    pub fn annotations(&self) -> &'static [Annotation] {
        self.annotations
    }

    /// Declared type of the member.
    pub fn declared(&self) -> TypeInfo {
        (self.declared)()
    }

    /// Reads the member's value from `owner`.
    pub fn get<'a>(&self, owner: &'a dyn Aggregate) -> Option<&'a dyn Inspect> {
        owner.field(self.index)
    }

    /// Mutable access to the member's value in `owner`.
    pub fn get_mut<'a>(&self, owner: &'a mut dyn Aggregate) -> Option<&'a mut dyn Inspect> {
        owner.field_mut(self.index)
    }

    /// Whether the member resolves [`Ignore`].
    pub fn is_ignored(&self) -> bool {
        annotation::resolve::<Ignore>(self).is_some()
    }

    /// Whether the member resolves [`ReloadRequired`].
    pub fn is_reload_required(&self) -> bool {
        annotation::resolve::<ReloadRequired>(self).is_some()
    }

    /// Display label: an explicit [`Label`], otherwise derived from the name.
    pub fn label(&self) -> Cow<'static, str> {
        match annotation::resolve::<Label>(self) {
            Some(Label(text)) => Cow::Borrowed(text),
            None => Cow::Owned(label::member_label(self.name)),
        }
    }
}

// ─── Catalog ──────────────────────────────────────────────────────────────────

/// Ordered member list of one configuration type.
#[derive(Debug)]
pub struct Catalog {
    type_name: &'static str,
    members: &'static [Member],
}

impl Catalog {
    /// Creates a catalog. Called by `#[derive(Config)]`.
    pub const fn new(type_name: &'static str, members: &'static [Member]) -> Self {
        Self { type_name, members }
    }

    /// Name of the described type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Members in declaration order.
    pub fn members(&self) -> &'static [Member] {
        self.members
    }

    /// Looks up a member by name.
    pub fn find(&self, name: &str) -> Option<&'static Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the type has no catalog members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

// ─── Configurable ─────────────────────────────────────────────────────────────

/// Static metadata of a derived configuration type.
///
/// Implemented by `#[derive(Config)]`; nested objects implement it as well,
/// only top-level entities additionally implement
/// [`ConfigEntity`](crate::ConfigEntity).
pub trait Configurable: Aggregate + Sized {
    /// Local name, used in the identity `owner/name`.
    const NAME: &'static str;

    /// Synchronization scope of the type.
    const SCOPE: Scope = Scope::ClientOnly;

    /// Explicit display label.
    const LABEL: Option<&'static str> = None;

    /// The type's member catalog.
    fn members() -> &'static Catalog;
}
