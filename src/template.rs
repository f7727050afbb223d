//! The root handle exposed to users of a built field tree (spec §6).
//! Forbids copy: a template is the one mutable, stateful instance driving
//! an enumeration; duplicating one mid-run has no sensible semantics here
//! (sub-trees copy freely via [`crate::arena::Arena::copy_subtree`], used
//! internally by `TakeFrom`).

use crate::arena::{Arena, FieldId};
use crate::bitbuf::BitBuffer;
use crate::error::KittyError;
use crate::field::Info;
use crate::session::SessionData;

#[derive(Debug)]
pub struct Template {
    name: String,
    arena: Arena,
    root: FieldId,
}

impl Template {
    pub(crate) fn from_parts(name: String, arena: Arena, root: FieldId) -> Self {
        Template { name, arena, root }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total number of distinct mutations this template enumerates.
    pub fn num_mutations(&mut self) -> Result<u64, KittyError> {
        self.arena.num_mutations(self.root)
    }

    /// `-1` before the first `mutate`, else the index of the most recently
    /// applied mutation.
    pub fn current_index(&self) -> i64 {
        self.arena.current_index(self.root)
    }

    /// Advance to the next mutation in the deterministic enumeration order.
    /// `Ok(false)` once every mutation has been visited; call [`Self::reset`]
    /// to start over.
    pub fn mutate(&mut self) -> Result<bool, KittyError> {
        self.arena.mutate(self.root)
    }

    /// Returns to the default, non-mutating state and rewinds
    /// `current_index` to `-1`.
    pub fn reset(&mut self) {
        self.arena.reset(self.root)
    }

    /// Render the tree's current state to a byte-aligned [`BitBuffer`]
    /// (the root container forces byte alignment, spec §4.3 Template).
    pub fn render(&mut self) -> Result<BitBuffer, KittyError> {
        self.arena.render(self.root)
    }

    /// Structural hash (spec §4.4): stable across `mutate`/`reset`, changes
    /// only when the tree's shape or fixed parameters change.
    pub fn hash(&self) -> u32 {
        self.arena.hash(self.root)
    }

    /// Resolve a field by name using the same rules `If`/`IfNot`/`ForEach`
    /// use internally (spec §4.5), starting from the root.
    pub fn resolve_field(&self, name: &str) -> Result<FieldId, KittyError> {
        self.arena.resolve_field(self.root, name)
    }

    pub fn set_session_data(&mut self, data: &SessionData) {
        self.arena.set_session_data(self.root, data)
    }

    /// Diagnostic snapshot of the field currently being mutated, prefixed
    /// and enriched with template-level bookkeeping (spec §6): `name`,
    /// `current mutation index` as `i/(N-1)`, and the rendered value's hex
    /// and length.
    pub fn get_info(&mut self) -> Result<Info, KittyError> {
        let rendered = self.render()?;
        let base = self.arena.get_info(self.root)?;

        let mut info = Info::new();
        for (k, v) in base {
            info.insert(format!("field/{k}"), v);
        }
        info.insert("name".to_string(), serde_json::json!(self.name));
        let last_index = self.num_mutations()? as i64 - 1;
        info.insert(
            "current mutation index".to_string(),
            serde_json::json!(format!("{}/{}", self.current_index(), last_index)),
        );
        let bytes = rendered.to_bytes();
        info.insert("value/rendered/hex".to_string(), serde_json::json!(hex::encode(&bytes)));
        info.insert("value/rendered/len".to_string(), serde_json::json!(bytes.len()));
        Ok(info)
    }
}
