//! Editor-facing view of an aggregate's members.

use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::catalog::TypeKind;
use crate::error::{CoreError, CoreResult};
use crate::inspect::Aggregate;

/// One editable member as presented to an editor.
#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    /// Member name, used as the edit key.
    pub name: &'static str,
    /// Display label.
    pub label: String,
    /// Declared type name.
    pub type_name: &'static str,
    /// Structural category.
    pub kind: TypeKind,
    /// Current value.
    pub value: Value,
    /// Whether changing the member requires a full reload.
    pub reload_required: bool,
}

/// Lists the editable members of an aggregate in catalog order.
///
/// Ignored members are not editable and are left out.
pub fn describe(aggregate: &dyn Aggregate) -> Vec<FieldView> {
    aggregate
        .catalog()
        .members()
        .iter()
        .filter(|member| !member.is_ignored())
        .filter_map(|member| {
            let value = member.get(aggregate)?;
            let declared = member.declared();
            Some(FieldView {
                name: member.name(),
                label: member.label().into_owned(),
                type_name: declared.name,
                kind: declared.kind,
                value: value.to_json(),
                reload_required: member.is_reload_required(),
            })
        })
        .collect()
}

/// Writes a JSON value into the named member of an aggregate.
///
/// # Errors
///
/// Fails if the member does not exist, is ignored, or the value does not fit.
pub fn set_member(aggregate: &mut dyn Aggregate, name: &str, value: &Value) -> CoreResult<()> {
    let catalog = aggregate.catalog();
    let member = catalog.find(name).ok_or_else(|| CoreError::UnknownMember {
        aggregate: catalog.type_name(),
        member: name.to_string(),
    })?;
    if member.is_ignored() {
        return Err(CoreError::IgnoredMember {
            member: name.to_string(),
        });
    }

    let field = member
        .get_mut(aggregate)
        .ok_or_else(|| CoreError::UnknownMember {
            aggregate: catalog.type_name(),
            member: name.to_string(),
        })?;
    field.assign_json(value).map_err(|e| e.within(name))?;
    trace!(aggregate = catalog.type_name(), member = name, "Member edited");
    Ok(())
}
