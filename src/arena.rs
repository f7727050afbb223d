//! Tree storage (spec §9 design note: "parent back-references → arena +
//! index"). Fields are nodes in a single arena addressed by [`FieldId`];
//! parent back-references are plain, `Copy` indices rather than
//! `Rc`/`Weak`, so deep copy and mutation never fight the borrow checker.

use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::instrument;

use crate::bitbuf::BitBuffer;
use crate::condition::Condition;
use crate::container::{ContainerKind, ContainerNode};
use crate::encoder::{ByteAlignedEncoder, DefaultEncoder, Encoder};
use crate::error::KittyError;
use crate::field::{Info, LeafField};
use crate::hash::khash;
use crate::session::SessionData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) usize);

#[derive(Debug)]
pub(crate) enum Payload {
    Leaf(Box<dyn LeafField>),
    Container(ContainerNode),
}

#[derive(Debug)]
pub(crate) struct Node {
    pub parent: Option<FieldId>,
    pub name: Option<String>,
    pub payload: Payload,
}

/// Owns every field in one template's tree.
#[derive(Debug, Default)]
pub struct Arena {
    pub(crate) nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Arena { nodes: Vec::new() }
    }

    pub(crate) fn node(&self, id: FieldId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: FieldId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn parent_of(&self, id: FieldId) -> Option<FieldId> {
        self.node(id).parent
    }

    pub fn name_of(&self, id: FieldId) -> Option<&str> {
        self.node(id).name.as_deref()
    }

    pub fn is_container(&self, id: FieldId) -> bool {
        matches!(self.node(id).payload, Payload::Container(_))
    }

    pub(crate) fn container(&self, id: FieldId) -> &ContainerNode {
        match &self.node(id).payload {
            Payload::Container(c) => c,
            Payload::Leaf(_) => panic!("field {} is not a container", id.0),
        }
    }

    pub(crate) fn container_mut(&mut self, id: FieldId) -> &mut ContainerNode {
        match &mut self.node_mut(id).payload {
            Payload::Container(c) => c,
            Payload::Leaf(_) => panic!("field {} is not a container", id.0),
        }
    }

    pub fn children_of(&self, id: FieldId) -> Vec<FieldId> {
        match &self.node(id).payload {
            Payload::Container(c) => c.children.clone(),
            Payload::Leaf(_) => Vec::new(),
        }
    }

    // ---- construction -----------------------------------------------

    fn alloc(&mut self, parent: Option<FieldId>, name: Option<String>, payload: Payload) -> FieldId {
        let id = FieldId(self.nodes.len());
        self.nodes.push(Node { parent, name, payload });
        id
    }

    pub fn new_container(
        &mut self,
        parent: Option<FieldId>,
        name: Option<String>,
        kind: ContainerKind,
        encoder: Rc<dyn Encoder>,
    ) -> FieldId {
        let node = ContainerNode::new(kind, encoder);
        self.alloc(parent, name, Payload::Container(node))
    }

    /// Attach a named or anonymous leaf as the last direct child of
    /// `parent`, per `Container::push` (spec §4.2).
    pub fn attach_leaf(
        &mut self,
        parent: FieldId,
        name: Option<String>,
        leaf: Box<dyn LeafField>,
    ) -> Result<FieldId, KittyError> {
        if let Some(n) = &name {
            if self.container(parent).by_name.contains_key(n) {
                return Err(KittyError::DuplicateName(n.clone()));
            }
        }
        let id = self.alloc(Some(parent), name.clone(), Payload::Leaf(leaf));
        let c = self.container_mut(parent);
        c.children.push(id);
        if let Some(n) = name {
            c.by_name.insert(n, id);
        }
        c.ready = false;
        Ok(id)
    }

    /// Attach a new, empty container as the last direct child of `parent`.
    pub fn attach_container(
        &mut self,
        parent: FieldId,
        name: Option<String>,
        kind: ContainerKind,
        encoder: Rc<dyn Encoder>,
    ) -> Result<FieldId, KittyError> {
        if let Some(n) = &name {
            if self.container(parent).by_name.contains_key(n) {
                return Err(KittyError::DuplicateName(n.clone()));
            }
        }
        let id = self.new_container(Some(parent), name.clone(), kind, encoder);
        let c = self.container_mut(parent);
        c.children.push(id);
        if let Some(n) = name {
            c.by_name.insert(n, id);
        }
        c.ready = false;
        Ok(id)
    }

    // ---- ready ---------------------------------------------------------

    /// Idempotent. Recursively readies every descendant so their
    /// `num_mutations` is final, then freezes `id`'s own mutation count
    /// (spec §4.2 "Ready").
    #[instrument(level = "debug", skip(self))]
    pub fn get_ready(&mut self, id: FieldId) -> Result<(), KittyError> {
        if !self.is_container(id) || self.container(id).ready {
            return Ok(());
        }
        // TakeFrom replaces its children with sampled sub-containers before
        // anything downstream sums mutation counts or resolves references
        // against them.
        crate::container::rebuild_if_take_from(self, id)?;
        let children = self.children_of(id);
        let mut sum = 0u64;
        for child in &children {
            self.get_ready(*child)?;
            sum += self.num_mutations(*child)?;
        }
        crate::container::resolve_kind_references(self, id)?;
        let total = crate::container::calculate_mutations(self, id, sum)?;
        self.container_mut(id).state.num_mutations = total;
        self.container_mut(id).ready = true;
        Ok(())
    }

    pub fn num_mutations(&mut self, id: FieldId) -> Result<u64, KittyError> {
        match &self.node(id).payload {
            Payload::Leaf(leaf) => Ok(leaf.num_mutations()),
            Payload::Container(_) => {
                self.get_ready(id)?;
                Ok(self.container(id).state.num_mutations)
            }
        }
    }

    pub fn current_index(&self, id: FieldId) -> i64 {
        match &self.node(id).payload {
            Payload::Leaf(leaf) => leaf.current_index(),
            Payload::Container(c) => c.state.current_index,
        }
    }

    // ---- mutate / reset / render ---------------------------------------

    /// Advance to the next mutation. Returns `true` iff advanced. For
    /// containers, `current_index` bookkeeping (the "last index" check and
    /// the increment) happens here, once, exactly like the Field contract
    /// requires; the variant-specific `mutate_step` hook only has to make
    /// the container's internal cursors reflect the now-current index.
    #[instrument(level = "trace", skip(self))]
    pub fn mutate(&mut self, id: FieldId) -> Result<bool, KittyError> {
        self.get_ready(id)?;
        match &self.node(id).payload {
            Payload::Leaf(_) => match &mut self.node_mut(id).payload {
                Payload::Leaf(leaf) => Ok(leaf.mutate()),
                _ => unreachable!(),
            },
            Payload::Container(_) => {
                let num = self.container(id).state.num_mutations;
                let cur = self.container(id).state.current_index;
                if num == 0 || cur >= num as i64 - 1 {
                    return Ok(false);
                }
                self.container_mut(id).state.current_index = cur + 1;
                crate::container::mutate_step(self, id)?;
                Ok(true)
            }
        }
    }

    pub fn reset(&mut self, id: FieldId) {
        match &mut self.node_mut(id).payload {
            Payload::Leaf(leaf) => leaf.reset(),
            Payload::Container(_) => {
                let children = self.children_of(id);
                for child in children {
                    self.reset(child);
                }
                crate::container::reset_kind(self, id);
                let c = self.container_mut(id);
                c.field_idx = 0;
                c.state.current_index = -1;
                c.state.current_rendered = BitBuffer::new();
            }
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub fn render(&mut self, id: FieldId) -> Result<BitBuffer, KittyError> {
        match &self.node(id).payload {
            Payload::Leaf(leaf) => {
                let raw = leaf.render_value().map_err(|e| match self.name_of(id) {
                    Some(n) => e.in_field(n.to_string()),
                    None => e,
                })?;
                Ok(leaf.encoder().encode(&raw))
            }
            Payload::Container(_) => crate::container::render(self, id),
        }
    }

    // ---- diagnostics -----------------------------------------------------

    pub fn hash(&self, id: FieldId) -> u32 {
        match &self.node(id).payload {
            Payload::Leaf(leaf) => leaf.hash(),
            Payload::Container(_) => crate::container::hash(self, id),
        }
    }

    pub fn get_info(&mut self, id: FieldId) -> Result<Info, KittyError> {
        match &self.node(id).payload {
            Payload::Leaf(leaf) => Ok(leaf.get_info()),
            Payload::Container(_) => crate::container::get_info(self, id),
        }
    }

    pub fn set_session_data(&mut self, id: FieldId, data: &SessionData) {
        match &mut self.node_mut(id).payload {
            Payload::Leaf(leaf) => leaf.set_session_data(data),
            Payload::Container(_) => {
                let children = self.children_of(id);
                for child in children {
                    self.set_session_data(child, data);
                }
            }
        }
    }

    // ---- name resolution -------------------------------------------------

    pub fn resolve_field(&self, from: FieldId, key: &str) -> Result<FieldId, KittyError> {
        crate::resolve::resolve_field(self, from, key)
    }

    pub fn scan_for_field(&self, from: FieldId, key: &str) -> Option<FieldId> {
        crate::resolve::scan_for_field(self, from, key)
    }

    // ---- copy --------------------------------------------------------

    /// Deep structural copy of the subtree rooted at `id`, appended into
    /// this same arena with `new_parent` as its (rebound) parent. State is
    /// reset (`current_index = -1`); container kinds with cached scope
    /// resolution (conditions, `ForEach` targets) are invalidated so they
    /// re-resolve lazily against the copy.
    pub fn copy_subtree(&mut self, id: FieldId, new_parent: Option<FieldId>) -> FieldId {
        match &self.node(id).payload {
            Payload::Leaf(leaf) => {
                let copied = leaf.copy_leaf();
                let name = self.node(id).name.clone();
                self.alloc(new_parent, name, Payload::Leaf(copied))
            }
            Payload::Container(_) => {
                let name = self.node(id).name.clone();
                let kind = crate::container::copy_kind(self.container(id));
                let encoder = self.container(id).state.encoder.clone();
                let new_id = self.new_container(new_parent, name, kind, encoder);
                let children = crate::container::copy_source_children(self, id);
                for child in children {
                    let child_name = self.node(child).name.clone();
                    let new_child = self.copy_subtree(child, Some(new_id));
                    let c = self.container_mut(new_id);
                    c.children.push(new_child);
                    if let Some(n) = child_name {
                        c.by_name.insert(n, new_child);
                    }
                }
                new_id
            }
        }
    }
}

pub(crate) fn default_encoder() -> Rc<dyn Encoder> {
    Rc::new(DefaultEncoder)
}

pub(crate) fn byte_aligned_encoder() -> Rc<dyn Encoder> {
    Rc::new(ByteAlignedEncoder)
}

pub(crate) fn khash_value(h: u32, v: &Value) -> u32 {
    khash(h, crate::hash::khash_str(0, &v.to_string()))
}

pub(crate) fn take_condition(arena: &mut Arena, id: FieldId) -> Option<Box<dyn Condition>> {
    match &mut arena.container_mut(id).kind {
        ContainerKind::If { condition } | ContainerKind::IfNot { condition } => condition.take(),
        _ => None,
    }
}

pub(crate) fn put_condition(arena: &mut Arena, id: FieldId, cond: Box<dyn Condition>) {
    if let ContainerKind::If { condition } | ContainerKind::IfNot { condition } =
        &mut arena.container_mut(id).kind
    {
        *condition = Some(cond);
    }
}
