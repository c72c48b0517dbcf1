//! # Reconf Core
//!
//! Change detection and acceptance for typed configuration objects.
//!
//! A configuration type derives [`Config`], which generates a static member
//! [`Catalog`] and the [`Inspect`]/[`Aggregate`] implementations the engine
//! walks. Top-level types additionally implement [`ConfigEntity`] to take part
//! in the lifecycle.
//!
//! ## Components
//!
//! - **Member Catalog**: ordered, per-type member list ([`Catalog`], [`Member`])
//! - **Attribute Resolver**: member-then-type annotation lookup ([`resolve`])
//! - **Equality Oracle**: deep, cycle-safe equality ([`equals`])
//! - **Change Detector**: bounded recursive diff deciding on full reloads
//!   ([`ChangeDetector`])
//! - **Acceptance Protocol**: reload check, authority check, commit
//!   ([`Proposal`], [`Outcome`])
//!
//! ```text
//! pending ──▶ CheckingReload ──▶ CheckingAcceptance ──▶ Committed
//!                  │                     │
//!                  ▼                     ▼
//!           NeedsFullReload       PolicyRejected
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use reconf_core::{Config, ConfigEntity, PartyId, propose};
//!
//! #[derive(Config, Clone, Default)]
//! #[config(name = "Display")]
//! struct Display {
//!     #[config(reload_required)]
//!     width: u32,
//!     brightness: u8,
//! }
//!
//! impl ConfigEntity for Display {}
//!
//! let mut active = Display::default();
//! let mut pending = active.clone();
//! pending.brightness = 80;
//! assert!(propose(&mut active, pending, PartyId::LOCAL).is_committed());
//! ```

extern crate self as reconf_core;

pub mod annotation;
pub mod catalog;
pub mod detector;
pub mod entity;
pub mod equality;
pub mod error;
pub mod inspect;
pub mod label;
pub mod protocol;
pub mod view;

#[cfg(test)]
mod fixtures;

pub use annotation::{Annotation, AnnotationKind, Ignore, Label, ReloadRequired, resolve};
pub use catalog::{Catalog, Configurable, Member, TypeInfo, TypeKind};
pub use detector::{ChangeDetector, DEFAULT_MAX_DEPTH, DescendPredicate};
pub use entity::{ConfigEntity, Identity, PartyId, Rejection, Scope};
pub use equality::{VisitGuard, equals, members_equal};
pub use error::{CoreError, CoreResult, ValueError, ValueResult};
pub use inspect::{
    Aggregate, Inspect, SharedCopies, aggregate_assign_json, aggregate_to_json, fork,
};
pub use protocol::{Outcome, Proposal, ProposalState, propose};
pub use view::{FieldView, describe, set_member};

pub use reconf_macros::Config;

#[doc(hidden)]
pub mod __private {
    pub use serde_json::Value;
}
