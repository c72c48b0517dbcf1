//! Member and type annotations, and their resolution.
//!
//! Annotations are attached by `#[derive(Config)]`:
//!
//! | Attribute | Annotation |
//! |-----------|------------|
//! | `#[config(ignore)]` | [`Annotation::Ignore`] |
//! | `#[config(reload_required)]` | [`Annotation::ReloadRequired`] |
//! | `#[config(label = "…")]` | [`Annotation::Label`] |
//!
//! The same attributes on the struct itself annotate the *type*, which every
//! member declared with that type inherits unless it carries its own.

use crate::catalog::Member;

/// One annotation attached to a member or to a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// Excluded from change detection, equality and persistence.
    Ignore,
    /// A difference in this value alone mandates a full reload.
    ReloadRequired,
    /// Explicit display label.
    Label(&'static str),
}

/// A kind of annotation that can be looked up with [`resolve`].
pub trait AnnotationKind: Sized {
    /// Extracts `Self` from an annotation of the matching kind.
    fn extract(annotation: &Annotation) -> Option<Self>;
}

/// Marker returned when [`Annotation::Ignore`] is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ignore;

/// Marker returned when [`Annotation::ReloadRequired`] is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadRequired;

/// Display label resolved from [`Annotation::Label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(pub &'static str);

impl AnnotationKind for Ignore {
    fn extract(annotation: &Annotation) -> Option<Self> {
        matches!(annotation, Annotation::Ignore).then_some(Ignore)
    }
}

impl AnnotationKind for ReloadRequired {
    fn extract(annotation: &Annotation) -> Option<Self> {
        matches!(annotation, Annotation::ReloadRequired).then_some(ReloadRequired)
    }
}

impl AnnotationKind for Label {
    fn extract(annotation: &Annotation) -> Option<Self> {
        match annotation {
            Annotation::Label(text) => Some(Label(text)),
            _ => None,
        }
    }
}

/// Finds the first annotation of kind `A` in a list.
pub fn find<A: AnnotationKind>(annotations: &[Annotation]) -> Option<A> {
    annotations.iter().find_map(A::extract)
}

/// Resolves annotation kind `A` for a member.
///
/// The member's own annotations win; the member's declared type is consulted
/// only when the member carries none of that kind.
pub fn resolve<A: AnnotationKind>(member: &Member) -> Option<A> {
    find::<A>(member.annotations()).or_else(|| find::<A>(member.declared().annotations))
}
