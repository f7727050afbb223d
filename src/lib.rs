//! Core of a generation-based fuzzing engine: a tree of fields and
//! containers that enumerates its mutations deterministically and renders
//! each one to an exact bit-for-bit wire form.
//!
//! Concrete leaf kinds (integers, strings, delimiters, checksums) are not
//! part of this crate; [`field::LeafField`] is the contract external leaf
//! implementations satisfy. [`builder::TemplateBuilder`] assembles a tree
//! out of leaves and [`container::ContainerKind`] variants; [`template::Template`]
//! is the handle you mutate, render and reset.

pub mod arena;
pub mod bitbuf;
pub mod builder;
pub mod condition;
pub mod container;
pub mod encoder;
pub mod error;
pub mod field;
pub mod hash;
pub mod resolve;
pub mod session;
pub mod template;

pub use arena::{Arena, FieldId};
pub use bitbuf::BitBuffer;
pub use builder::TemplateBuilder;
pub use condition::Condition;
pub use container::ContainerKind;
pub use encoder::{ByteAlignedEncoder, DefaultEncoder, Encoder};
pub use error::KittyError;
pub use field::{Info, LeafField};
pub use session::{SessionData, SessionValue};
pub use template::Template;
