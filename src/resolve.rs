//! Name resolution (spec §4.5): downward scan from a scope, then upward
//! retry through enclosing containers until the root.

use crate::arena::{Arena, FieldId};
use crate::error::KittyError;

/// Depth-first downward scan starting at `from`: matches `from`'s own name,
/// then a direct child's name, then recurses into child containers.
pub fn scan_for_field(arena: &Arena, from: FieldId, key: &str) -> Option<FieldId> {
    if arena.name_of(from) == Some(key) {
        return Some(from);
    }
    if !arena.is_container(from) {
        return None;
    }
    if let Some(&direct) = arena.container(from).by_name.get(key) {
        return Some(direct);
    }
    for child in arena.children_of(from) {
        if arena.is_container(child) {
            if let Some(found) = scan_for_field(arena, child, key) {
                return Some(found);
            }
        }
    }
    None
}

/// Resolve `key` relative to `from`: scan `from` downward, then its parent,
/// its parent's parent, and so on up to the root. `UnresolvedField` if no
/// enclosing scope's subtree contains it.
pub fn resolve_field(arena: &Arena, from: FieldId, key: &str) -> Result<FieldId, KittyError> {
    let mut scope = Some(from);
    while let Some(s) = scope {
        if let Some(found) = scan_for_field(arena, s, key) {
            return Ok(found);
        }
        scope = arena.parent_of(s);
    }
    Err(KittyError::UnresolvedField(key.to_string()))
}
