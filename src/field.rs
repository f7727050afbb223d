//! The abstract Field contract (spec §4.1).
//!
//! Concrete leaf-field kinds (strings, integers, delimiters, groups,
//! checksums) are external to this crate — only the contract they must
//! satisfy lives here. Containers (`crate::container`) implement the same
//! contract over a composite of children instead of a single value.

use std::rc::Rc;

use crate::encoder::Encoder;
use crate::error::KittyError;
use crate::session::SessionData;
use crate::{bitbuf::BitBuffer, hash::khash};

/// Diagnostic snapshot returned by `get_info`, backed by an order-preserving
/// `serde_json::Map` (`preserve_order` feature).
pub type Info = serde_json::Map<String, serde_json::Value>;

/// The contract every leaf field must satisfy. Implemented externally;
/// this crate ships no concrete leaf kinds (see SPEC_FULL.md §4 — the two
/// fixtures used by the integration tests live under `tests/support`, not
/// here).
pub trait LeafField: std::fmt::Debug {
    /// Render the field's current logical value as raw, pre-encoding bits.
    /// A leaf that cannot produce bits for its current state (a structural
    /// bug) returns [`KittyError::RenderTypeError`] instead of panicking.
    fn render_value(&self) -> Result<BitBuffer, KittyError>;

    /// Advance to the next mutation. Returns `true` iff advanced.
    fn mutate(&mut self) -> bool;

    /// Restore the default (non-mutating) state.
    fn reset(&mut self);

    /// Total number of mutations; `0` if not fuzzable or unenumerable.
    fn num_mutations(&self) -> u64;

    /// `-1` when not mutating, else the last index passed to `mutate`.
    fn current_index(&self) -> i64;

    fn is_fuzzable(&self) -> bool {
        true
    }

    /// Encoder this leaf frames its raw value with.
    fn encoder(&self) -> Rc<dyn Encoder>;

    /// Deep, state-independent copy (`current_index` reset to `-1`).
    fn copy_leaf(&self) -> Box<dyn LeafField>;

    fn get_info(&self) -> Info {
        Info::new()
    }

    fn set_session_data(&mut self, _data: &SessionData) {}

    /// Structural hash contribution; default folds the implementor's type
    /// name, which is sufficient for fixed-shape leaves. Leaves with
    /// meaningful parameters (length, delimiter text, ...) should fold
    /// those in too.
    fn hash(&self) -> u32 {
        khash(0, khash_type_name(self))
    }
}

fn khash_type_name<T: ?Sized>(_value: &T) -> u32 {
    khash(0, khash_str_const(std::any::type_name::<T>()))
}

fn khash_str_const(s: &str) -> u32 {
    crate::hash::khash_str(0, s)
}

/// `true` iff `current_index` is within the mutating range
/// (`0 <= current_index < num_mutations`), per spec §3.
pub fn is_mutating(current_index: i64, num_mutations: u64) -> bool {
    current_index >= 0 && (current_index as u64) < num_mutations
}

/// Field-contract state shared by every container (spec §4.2); leaves keep
/// the equivalent state privately behind [`LeafField`].
#[derive(Debug)]
pub(crate) struct FieldState {
    pub current_index: i64,
    pub current_rendered: BitBuffer,
    pub num_mutations: u64,
    pub encoder: Rc<dyn Encoder>,
}

impl FieldState {
    pub fn new(encoder: Rc<dyn Encoder>) -> Self {
        FieldState { current_index: -1, current_rendered: BitBuffer::new(), num_mutations: 0, encoder }
    }
}
