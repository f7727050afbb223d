//! Construction-phase concern only (spec §9 design note 3): the
//! push/pop-of-open-containers stack lives here, separate from
//! [`crate::container::ContainerNode`], which carries no memory of how it
//! was built once the tree is frozen into a [`crate::template::Template`].

use std::rc::Rc;

use crate::arena::{default_encoder, Arena, FieldId};
use crate::container::ContainerKind;
use crate::encoder::Encoder;
use crate::error::KittyError;
use crate::field::LeafField;
use crate::template::Template;

/// Builds a field tree top-down: push a container, push leaves and nested
/// containers into it, pop back out, and finally freeze the whole thing
/// into a [`Template`].
pub struct TemplateBuilder {
    arena: Arena,
    root: FieldId,
    open: Vec<FieldId>,
    name: String,
}

impl TemplateBuilder {
    /// Starts a new builder with an already-open root [`Template`]
    /// container (forced byte-aligned per spec §4.3).
    pub fn new(name: impl Into<String>) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_container(None, None, ContainerKind::template(), crate::arena::byte_aligned_encoder());
        TemplateBuilder { arena, root, open: vec![root], name: name.into() }
    }

    fn current(&self) -> Result<FieldId, KittyError> {
        self.open.last().copied().ok_or(KittyError::NoContainerToPop)
    }

    /// Pushes a leaf into the currently open container.
    pub fn push_leaf(&mut self, name: Option<&str>, leaf: Box<dyn LeafField>) -> Result<FieldId, KittyError> {
        let parent = self.current()?;
        self.arena.attach_leaf(parent, name.map(str::to_string), leaf)
    }

    /// Opens a new container as a child of the currently open one, and
    /// descends into it: subsequent pushes land inside it until [`Self::pop`].
    pub fn push_container(&mut self, name: Option<&str>, kind: ContainerKind) -> Result<FieldId, KittyError> {
        self.push_container_with_encoder(name, kind, default_encoder())
    }

    pub fn push_container_with_encoder(
        &mut self,
        name: Option<&str>,
        kind: ContainerKind,
        encoder: Rc<dyn Encoder>,
    ) -> Result<FieldId, KittyError> {
        let parent = self.current()?;
        let id = self.arena.attach_container(parent, name.map(str::to_string), kind, encoder)?;
        self.open.push(id);
        Ok(id)
    }

    /// Closes the currently open container, returning to its parent.
    pub fn pop(&mut self) -> Result<(), KittyError> {
        if self.open.len() <= 1 {
            return Err(KittyError::NoContainerToPop);
        }
        self.open.pop();
        Ok(())
    }

    /// Runs `body` with a freshly pushed container open, then pops it
    /// automatically, regardless of whether `body` errors out.
    pub fn with_container(
        &mut self,
        name: Option<&str>,
        kind: ContainerKind,
        body: impl FnOnce(&mut Self) -> Result<(), KittyError>,
    ) -> Result<FieldId, KittyError> {
        let id = self.push_container(name, kind)?;
        let result = body(self);
        self.pop()?;
        result?;
        Ok(id)
    }

    /// Closes every still-open container and freezes the tree.
    pub fn build(mut self) -> Result<Template, KittyError> {
        while self.open.len() > 1 {
            self.pop()?;
        }
        self.arena.get_ready(self.root)?;
        Ok(Template::from_parts(self.name, self.arena, self.root))
    }
}
