//! Container mechanics (spec §4.2) and the ten container variants (§4.3),
//! modeled as one [`ContainerNode`] type carrying a tagged [`ContainerKind`],
//! dispatched through three hook points: [`calculate_mutations`],
//! [`mutate_step`] and [`render`] (the render hook also handles
//! post-processing, since every variant either transforms or entirely
//! replaces the base concatenation).

use std::rc::Rc;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::arena::{put_condition, take_condition, Arena, FieldId};
use crate::bitbuf::BitBuffer;
use crate::condition::Condition;
use crate::encoder::Encoder;
use crate::error::KittyError;
use crate::field::FieldState;

#[derive(Debug)]
pub struct ContainerNode {
    pub(crate) kind: ContainerKind,
    pub(crate) state: FieldState,
    pub(crate) children: Vec<FieldId>,
    pub(crate) by_name: IndexMap<String, FieldId>,
    pub(crate) field_idx: usize,
    pub(crate) ready: bool,
}

impl ContainerNode {
    pub(crate) fn new(kind: ContainerKind, encoder: Rc<dyn Encoder>) -> Self {
        ContainerNode {
            kind,
            state: FieldState::new(encoder),
            children: Vec::new(),
            by_name: IndexMap::new(),
            field_idx: 0,
            ready: false,
        }
    }

    pub fn current_index(&self) -> i64 {
        self.state.current_index
    }

    pub fn num_mutations(&self) -> u64 {
        self.state.num_mutations
    }
}

#[derive(Debug)]
pub enum ContainerKind {
    Plain,
    ForEach { target_name: String, target: Option<FieldId> },
    If { condition: Option<Box<dyn Condition>> },
    IfNot { condition: Option<Box<dyn Condition>> },
    Meta,
    Pad { pad_length_bits: u64, pad_byte: u8 },
    Repeat { min_times: u64, max_times: u64, step: u64, repeats: u64 },
    OneOf,
    TakeFrom {
        min_elements: Option<usize>,
        max_elements: Option<usize>,
        rng: StdRng,
        subcontainer_encoder: Rc<dyn Encoder>,
        /// The fields originally pushed, captured the first time this
        /// container is readied. Kept separately from `children` (which
        /// get replaced by sampled sub-containers) so a later `copy` can
        /// re-derive fresh subsets instead of sampling subsets-of-subsets.
        original_children: Option<Vec<FieldId>>,
    },
    Trunc { max_size_bits: u64, current_value: BitBuffer },
    Template,
}

impl ContainerKind {
    pub fn plain() -> Self {
        ContainerKind::Plain
    }

    pub fn template() -> Self {
        ContainerKind::Template
    }

    pub fn meta() -> Self {
        ContainerKind::Meta
    }

    pub fn one_of() -> Self {
        ContainerKind::OneOf
    }

    pub fn for_each(target_name: impl Into<String>) -> Self {
        ContainerKind::ForEach { target_name: target_name.into(), target: None }
    }

    pub fn if_cond(condition: Box<dyn Condition>) -> Self {
        ContainerKind::If { condition: Some(condition) }
    }

    pub fn if_not(condition: Box<dyn Condition>) -> Self {
        ContainerKind::IfNot { condition: Some(condition) }
    }

    pub fn pad(pad_length_bits: u64, pad_byte: u8) -> Self {
        ContainerKind::Pad { pad_length_bits, pad_byte }
    }

    pub fn trunc(max_size_bits: u64) -> Self {
        ContainerKind::Trunc { max_size_bits, current_value: BitBuffer::new() }
    }

    pub fn repeat(min_times: u64, max_times: u64, step: u64) -> Result<Self, KittyError> {
        if max_times == 0 || max_times < min_times || step == 0 {
            return Err(KittyError::InvalidRange {
                min_times: min_times as i64,
                max_times: max_times as i64,
                step: step as i64,
            });
        }
        let repeats = (max_times - min_times) / step;
        Ok(ContainerKind::Repeat { min_times, max_times, step, repeats })
    }

    pub fn take_from(
        min_elements: Option<usize>,
        max_elements: Option<usize>,
        subcontainer_encoder: Rc<dyn Encoder>,
    ) -> Self {
        let seed = takefrom_seed(min_elements.unwrap_or(0), max_elements.unwrap_or(0));
        ContainerKind::TakeFrom {
            min_elements,
            max_elements,
            rng: StdRng::seed_from_u64(seed),
            subcontainer_encoder,
            original_children: None,
        }
    }
}

fn takefrom_seed(min_elements: usize, max_elements: usize) -> u64 {
    0x1234u64.wrapping_mul(max_elements as u64).wrapping_add(min_elements as u64)
}

fn type_tag(kind: &ContainerKind) -> &'static str {
    match kind {
        ContainerKind::Plain => "Container",
        ContainerKind::ForEach { .. } => "ForEach",
        ContainerKind::If { .. } => "If",
        ContainerKind::IfNot { .. } => "IfNot",
        ContainerKind::Meta => "Meta",
        ContainerKind::Pad { .. } => "Pad",
        ContainerKind::Repeat { .. } => "Repeat",
        ContainerKind::OneOf => "OneOf",
        ContainerKind::TakeFrom { .. } => "TakeFrom",
        ContainerKind::Trunc { .. } => "Trunc",
        ContainerKind::Template => "Template",
    }
}

// ---- ready: resolving lazy references, rebuilding TakeFrom -------------

pub(crate) fn resolve_kind_references(arena: &mut Arena, id: FieldId) -> Result<(), KittyError> {
    let needs = matches!(arena.container(id).kind, ContainerKind::ForEach { target: None, .. });
    if !needs {
        return Ok(());
    }
    let name = match &arena.container(id).kind {
        ContainerKind::ForEach { target_name, .. } => target_name.clone(),
        _ => unreachable!(),
    };
    let resolved = arena.resolve_field(id, &name)?;
    if let ContainerKind::ForEach { target, .. } = &mut arena.container_mut(id).kind {
        *target = Some(resolved);
    }
    Ok(())
}

pub(crate) fn rebuild_if_take_from(arena: &mut Arena, id: FieldId) -> Result<(), KittyError> {
    let already_built = match &arena.container(id).kind {
        ContainerKind::TakeFrom { original_children, .. } => original_children.is_some(),
        _ => return Ok(()),
    };
    if already_built {
        return Ok(());
    }

    let original_children = arena.children_of(id);
    let name = arena.name_of(id).map(|s| s.to_string());

    let (mut min_elements, mut max_elements, subcontainer_encoder) = match &arena.container(id).kind {
        ContainerKind::TakeFrom { min_elements, max_elements, subcontainer_encoder, .. } => {
            (min_elements.unwrap_or(0), max_elements.unwrap_or(original_children.len()), subcontainer_encoder.clone())
        }
        _ => unreachable!(),
    };
    max_elements = max_elements.min(original_children.len());
    if min_elements > max_elements {
        min_elements = max_elements;
    }

    let seed = takefrom_seed(min_elements, max_elements);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut subsets: Vec<Vec<FieldId>> = Vec::new();
    let mut field_list_len = min_elements;
    while field_list_len <= max_elements {
        let how_many = max_elements + 1 - field_list_len;
        let mut drawn = 0usize;
        let max_attempts = how_many.saturating_mul(64).max(256);
        let mut attempts = 0usize;
        while drawn < how_many && attempts < max_attempts {
            attempts += 1;
            let mut sample: Vec<FieldId> =
                original_children.choose_multiple(&mut rng, field_list_len).copied().collect();
            sample.sort_by_key(|f| f.0);
            if !subsets.iter().any(|existing| existing == &sample) {
                subsets.push(sample);
                drawn += 1;
            }
        }
        field_list_len += 1;
    }

    debug!(count = subsets.len(), min_elements, max_elements, "rebuilt TakeFrom subsets");

    let mut new_children = Vec::new();
    let mut new_by_name = IndexMap::new();
    for (i, subset) in subsets.into_iter().enumerate() {
        let sub_name = match &name {
            Some(n) => format!("{n}_sublist_{i}"),
            None => format!("sublist_{i}"),
        };
        let sub_id =
            arena.new_container(Some(id), Some(sub_name.clone()), ContainerKind::Plain, subcontainer_encoder.clone());
        for orig in subset {
            let orig_name = arena.name_of(orig).map(|s| s.to_string());
            let copied = arena.copy_subtree(orig, Some(sub_id));
            let c = arena.container_mut(sub_id);
            c.children.push(copied);
            if let Some(n) = orig_name {
                c.by_name.insert(n, copied);
            }
        }
        new_children.push(sub_id);
        new_by_name.insert(sub_name, sub_id);
    }

    let c = arena.container_mut(id);
    c.children = new_children;
    c.by_name = new_by_name;
    if let ContainerKind::TakeFrom { min_elements: me, max_elements: mx, rng: kind_rng, original_children: oc, .. } =
        &mut c.kind
    {
        *me = Some(min_elements);
        *mx = Some(max_elements);
        *kind_rng = rng;
        *oc = Some(original_children);
    }
    Ok(())
}

// ---- calculate_mutations hook ------------------------------------------

pub(crate) fn calculate_mutations(arena: &mut Arena, id: FieldId, base_sum: u64) -> Result<u64, KittyError> {
    enum Plan {
        Sum,
        ForEach(FieldId),
        Repeat(u64),
        OneOf(usize),
    }
    let plan = match &arena.container(id).kind {
        ContainerKind::ForEach { target, .. } => {
            let t = target.ok_or_else(|| KittyError::TypeAssertion("ForEach target not resolved".into()))?;
            Plan::ForEach(t)
        }
        ContainerKind::Repeat { repeats, .. } => Plan::Repeat(*repeats),
        ContainerKind::OneOf => Plan::OneOf(arena.container(id).children.len()),
        ContainerKind::TakeFrom { .. } => Plan::OneOf(arena.container(id).children.len()),
        _ => Plan::Sum,
    };
    match plan {
        Plan::Sum => Ok(base_sum),
        Plan::Repeat(repeats) => Ok(base_sum + repeats),
        Plan::OneOf(n) => Ok(base_sum + n as u64),
        Plan::ForEach(target) => {
            let target_mutations = arena.num_mutations(target)?.max(1);
            Ok(base_sum.saturating_mul(target_mutations))
        }
    }
}

// ---- mutate_step hook ---------------------------------------------------

fn default_mutate_step(arena: &mut Arena, id: FieldId) -> Result<bool, KittyError> {
    let children = arena.children_of(id);
    let mut idx = arena.container(id).field_idx;
    while idx < children.len() {
        arena.container_mut(id).field_idx = idx;
        if arena.mutate(children[idx])? {
            return Ok(true);
        }
        arena.reset(children[idx]);
        idx += 1;
    }
    Ok(false)
}

fn reset_children_only(arena: &mut Arena, id: FieldId) {
    let children = arena.children_of(id);
    for child in children {
        arena.reset(child);
    }
    arena.container_mut(id).field_idx = 0;
}

/// Port of `ForEach._mutate` (container.py): on the first internal mutation,
/// mutate the target once; run the children's own odometer; whenever it
/// exhausts, reset the children (not the target), advance the target one
/// more step and restart the children's odometer. The source expresses the
/// "restart" as self-recursion (`self._mutate()` calling itself once the
/// children have been reset) — turned into a loop here since `current_index`
/// bookkeeping already guarantees termination (the target's own exhaustion
/// bounds the number of restarts).
fn foreach_mutate_step(arena: &mut Arena, id: FieldId, target: FieldId) -> Result<(), KittyError> {
    if arena.container(id).state.current_index == 0 {
        arena.mutate(target)?;
    }
    while !default_mutate_step(arena, id)? {
        reset_children_only(arena, id);
        if !arena.mutate(target)? {
            break;
        }
    }
    Ok(())
}

fn repeat_mutate_step(arena: &mut Arena, id: FieldId, repeats: u64) -> Result<(), KittyError> {
    let cur = arena.container(id).state.current_index as u64;
    if cur >= repeats {
        default_mutate_step(arena, id)?;
    }
    Ok(())
}

fn one_of_mutate_step(arena: &mut Arena, id: FieldId) -> Result<(), KittyError> {
    let n = arena.container(id).children.len() as i64;
    let cur = arena.container(id).state.current_index;
    if cur < n {
        arena.container_mut(id).field_idx = cur as usize;
    } else {
        if cur == n {
            arena.container_mut(id).field_idx = 0;
        }
        default_mutate_step(arena, id)?;
    }
    Ok(())
}

pub(crate) fn mutate_step(arena: &mut Arena, id: FieldId) -> Result<(), KittyError> {
    enum Plan {
        Default,
        ForEach(FieldId),
        Repeat(u64),
        OneOfLike,
    }
    let plan = match &arena.container(id).kind {
        ContainerKind::ForEach { target, .. } => {
            Plan::ForEach(target.expect("target resolved during get_ready"))
        }
        ContainerKind::Repeat { repeats, .. } => Plan::Repeat(*repeats),
        ContainerKind::OneOf | ContainerKind::TakeFrom { .. } => Plan::OneOfLike,
        _ => Plan::Default,
    };
    match plan {
        Plan::Default => {
            default_mutate_step(arena, id)?;
            Ok(())
        }
        Plan::ForEach(t) => foreach_mutate_step(arena, id, t),
        Plan::Repeat(r) => repeat_mutate_step(arena, id, r),
        Plan::OneOfLike => one_of_mutate_step(arena, id),
    }
}

// ---- render hook ---------------------------------------------------------

fn render_children_concat(arena: &mut Arena, id: FieldId) -> Result<BitBuffer, KittyError> {
    let children = arena.children_of(id);
    let mut acc = BitBuffer::new();
    for child in children {
        let rendered = arena.render(child).map_err(|e| match arena.name_of(id) {
            Some(n) => e.in_field(n.to_string()),
            None => e,
        })?;
        acc.append(&rendered);
    }
    Ok(acc)
}

fn pad_buffer(mut buf: BitBuffer, pad_length_bits: u64, pad_byte: u8) -> BitBuffer {
    let to_pad = pad_length_bits.saturating_sub(buf.len_bits());
    if to_pad > 0 {
        let pattern = BitBuffer::from_bytes(vec![pad_byte]);
        let reps = to_pad / pattern.len_bits() + 1;
        let padding = pattern.repeat(reps).slice(to_pad);
        buf.append(&padding);
    }
    buf
}

pub(crate) fn render(arena: &mut Arena, id: FieldId) -> Result<BitBuffer, KittyError> {
    #[derive(Clone, Copy)]
    enum Plan {
        Concat,
        Meta,
        SelectedChild,
        Pad { pad_length_bits: u64, pad_byte: u8 },
        Repeat { times: u64 },
        Trunc { max_size_bits: u64 },
        IfLike { invert: bool },
    }

    let plan = match &arena.container(id).kind {
        ContainerKind::Meta => Plan::Meta,
        ContainerKind::OneOf | ContainerKind::TakeFrom { .. } => Plan::SelectedChild,
        ContainerKind::Pad { pad_length_bits, pad_byte } => {
            Plan::Pad { pad_length_bits: *pad_length_bits, pad_byte: *pad_byte }
        }
        ContainerKind::Repeat { min_times, step, repeats, .. } => {
            let cur = arena.container(id).state.current_index;
            // Length phase: the k-th such mutation (0-based) reaches
            // min_times + (k+1)*step, so the *last* one lands exactly on
            // max_times (repeats == (max_times-min_times)/step).
            let times = if cur >= 0 && (cur as u64) < *repeats {
                min_times + (cur as u64 + 1) * step
            } else {
                *min_times
            };
            Plan::Repeat { times }
        }
        ContainerKind::Trunc { max_size_bits, .. } => Plan::Trunc { max_size_bits: *max_size_bits },
        ContainerKind::If { .. } => Plan::IfLike { invert: false },
        ContainerKind::IfNot { .. } => Plan::IfLike { invert: true },
        _ => Plan::Concat,
    };

    let raw = match plan {
        Plan::Meta => BitBuffer::new(),
        Plan::SelectedChild => {
            let idx = arena.container(id).field_idx;
            let children = arena.children_of(id);
            match children.get(idx) {
                Some(&child) => arena.render(child)?,
                None => BitBuffer::new(),
            }
        }
        Plan::Pad { pad_length_bits, pad_byte } => {
            let inner = render_children_concat(arena, id)?;
            pad_buffer(inner, pad_length_bits, pad_byte)
        }
        Plan::Repeat { times } => {
            let inner = render_children_concat(arena, id)?;
            inner.repeat(times)
        }
        Plan::Trunc { max_size_bits } => {
            let inner = render_children_concat(arena, id)?;
            let truncated = inner.slice(max_size_bits);
            if let ContainerKind::Trunc { current_value, .. } = &mut arena.container_mut(id).kind {
                *current_value = inner;
            }
            truncated
        }
        Plan::IfLike { invert } => {
            let cond = take_condition(arena, id)
                .ok_or_else(|| KittyError::TypeAssertion("If/IfNot missing condition".into()))?;
            let applies = cond.applies(arena, id);
            put_condition(arena, id, cond);
            let should_render = applies != invert;
            if should_render {
                render_children_concat(arena, id)?
            } else {
                BitBuffer::new()
            }
        }
        Plan::Concat => render_children_concat(arena, id)?,
    };

    let encoder = arena.container(id).state.encoder.clone();
    let encoded = encoder.encode(&raw);
    arena.container_mut(id).state.current_rendered = encoded.clone();
    Ok(encoded)
}

// ---- reset_kind hook ------------------------------------------------------

pub(crate) fn reset_kind(arena: &mut Arena, id: FieldId) {
    match &mut arena.container_mut(id).kind {
        ContainerKind::TakeFrom { min_elements, max_elements, rng, .. } => {
            let seed = takefrom_seed(min_elements.unwrap_or(0), max_elements.unwrap_or(0));
            *rng = StdRng::seed_from_u64(seed);
        }
        ContainerKind::Trunc { current_value, .. } => {
            *current_value = BitBuffer::new();
        }
        _ => {}
    }
}

// ---- hash -----------------------------------------------------------------

pub(crate) fn hash(arena: &Arena, id: FieldId) -> u32 {
    let c = arena.container(id);
    let mut h = crate::hash::khash(0, crate::hash::khash_str(0, type_tag(&c.kind)));
    for &child in &c.children {
        h = crate::hash::khash(h, arena.hash(child));
    }
    match &c.kind {
        ContainerKind::ForEach { target_name, .. } => {
            h = crate::hash::khash(h, crate::hash::khash_str(0, target_name));
        }
        ContainerKind::If { condition } | ContainerKind::IfNot { condition } => {
            if let Some(cond) = condition {
                h = crate::hash::khash(h, cond.hash());
            }
        }
        ContainerKind::Pad { pad_length_bits, pad_byte } => {
            h = crate::hash::khash(h, crate::hash::khash_u64(0, *pad_length_bits));
            h = crate::hash::khash(h, *pad_byte as u32);
        }
        ContainerKind::Repeat { min_times, max_times, step, repeats } => {
            h = crate::hash::khash(h, crate::hash::khash_u64(0, *min_times));
            h = crate::hash::khash(h, crate::hash::khash_u64(0, *max_times));
            h = crate::hash::khash(h, crate::hash::khash_u64(0, *step));
            h = crate::hash::khash(h, crate::hash::khash_u64(0, *repeats));
        }
        ContainerKind::Trunc { max_size_bits, .. } => {
            h = crate::hash::khash(h, crate::hash::khash_u64(0, *max_size_bits));
        }
        ContainerKind::TakeFrom { min_elements, max_elements, .. } => {
            h = crate::hash::khash(h, crate::hash::khash_u64(0, min_elements.unwrap_or(0) as u64));
            h = crate::hash::khash(h, crate::hash::khash_u64(0, max_elements.unwrap_or(0) as u64));
        }
        _ => {}
    }
    h
}

// ---- get_info ---------------------------------------------------------------

pub(crate) fn get_info(arena: &mut Arena, id: FieldId) -> Result<crate::field::Info, KittyError> {
    let mut cur = id;
    loop {
        let (field_idx, children) = {
            let c = arena.container(cur);
            (c.field_idx, c.children.clone())
        };
        match children.get(field_idx) {
            Some(&child) if arena.is_container(child) => cur = child,
            Some(&child) => return arena.get_info(child),
            None => break,
        }
    }
    let mut info = crate::field::Info::new();
    let c = arena.container(id);
    info.insert("current_index".to_string(), serde_json::json!(c.state.current_index));
    info.insert("num_mutations".to_string(), serde_json::json!(c.state.num_mutations));
    Ok(info)
}

// ---- copy -------------------------------------------------------------------

/// Which children `Arena::copy_subtree` should walk for this container: for
/// an already-rebuilt `TakeFrom`, that's the stashed pre-rebuild fields, not
/// the sampled sub-containers currently sitting in `children` — otherwise a
/// copy-then-ready would sample subsets of subsets.
pub(crate) fn copy_source_children(arena: &Arena, id: FieldId) -> Vec<FieldId> {
    if let ContainerKind::TakeFrom { original_children: Some(oc), .. } = &arena.container(id).kind {
        return oc.clone();
    }
    arena.children_of(id)
}

pub(crate) fn copy_kind(container: &ContainerNode) -> ContainerKind {
    match &container.kind {
        ContainerKind::Plain => ContainerKind::Plain,
        ContainerKind::ForEach { target_name, .. } => {
            ContainerKind::ForEach { target_name: target_name.clone(), target: None }
        }
        ContainerKind::If { condition } => {
            let mut c = condition.as_ref().map(|c| c.copy_condition());
            if let Some(c) = &mut c {
                c.invalidate();
            }
            ContainerKind::If { condition: c }
        }
        ContainerKind::IfNot { condition } => {
            let mut c = condition.as_ref().map(|c| c.copy_condition());
            if let Some(c) = &mut c {
                c.invalidate();
            }
            ContainerKind::IfNot { condition: c }
        }
        ContainerKind::Meta => ContainerKind::Meta,
        ContainerKind::Pad { pad_length_bits, pad_byte } => {
            ContainerKind::Pad { pad_length_bits: *pad_length_bits, pad_byte: *pad_byte }
        }
        ContainerKind::Repeat { min_times, max_times, step, repeats } => {
            ContainerKind::Repeat { min_times: *min_times, max_times: *max_times, step: *step, repeats: *repeats }
        }
        ContainerKind::OneOf => ContainerKind::OneOf,
        ContainerKind::TakeFrom { min_elements, max_elements, subcontainer_encoder, .. } => {
            let seed = takefrom_seed(min_elements.unwrap_or(0), max_elements.unwrap_or(0));
            ContainerKind::TakeFrom {
                min_elements: *min_elements,
                max_elements: *max_elements,
                rng: StdRng::seed_from_u64(seed),
                subcontainer_encoder: subcontainer_encoder.clone(),
                original_children: None,
            }
        }
        ContainerKind::Trunc { max_size_bits, .. } => {
            ContainerKind::Trunc { max_size_bits: *max_size_bits, current_value: BitBuffer::new() }
        }
        ContainerKind::Template => ContainerKind::Template,
    }
}
