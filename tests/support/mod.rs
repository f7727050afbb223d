//! Minimal `LeafField`/`Condition` fixtures for integration tests: `Static`
//! never mutates, `Group` cycles through a fixed list of byte strings, `Eq`
//! compares a named field's current rendering against a literal.

use std::rc::Rc;

use kitty_fields::{Arena, BitBuffer, Condition, DefaultEncoder, Encoder, FieldId, Info, KittyError, LeafField};

#[derive(Debug, Clone)]
pub struct Static {
    value: Vec<u8>,
}

impl Static {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Static { value: value.into() }
    }
}

impl LeafField for Static {
    fn render_value(&self) -> Result<BitBuffer, KittyError> {
        Ok(BitBuffer::from_bytes(self.value.clone()))
    }

    fn mutate(&mut self) -> bool {
        false
    }

    fn reset(&mut self) {}

    fn num_mutations(&self) -> u64 {
        0
    }

    fn current_index(&self) -> i64 {
        -1
    }

    fn is_fuzzable(&self) -> bool {
        false
    }

    fn encoder(&self) -> Rc<dyn Encoder> {
        Rc::new(DefaultEncoder)
    }

    fn copy_leaf(&self) -> Box<dyn LeafField> {
        Box::new(self.clone())
    }

    fn get_info(&self) -> Info {
        let mut info = Info::new();
        info.insert("value".to_string(), serde_json::json!(hex::encode(&self.value)));
        info
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    values: Vec<Vec<u8>>,
    current_index: i64,
}

impl Group {
    pub fn new(values: Vec<Vec<u8>>) -> Self {
        Group { values, current_index: -1 }
    }
}

impl LeafField for Group {
    // The first value is the default (shown at current_index == -1); the
    // remaining values are what `mutate` cycles through.
    fn render_value(&self) -> Result<BitBuffer, KittyError> {
        let value = if self.current_index < 0 {
            &self.values[0]
        } else {
            &self.values[self.current_index as usize + 1]
        };
        Ok(BitBuffer::from_bytes(value.clone()))
    }

    fn mutate(&mut self) -> bool {
        let next = self.current_index + 1;
        if (next as u64) < self.num_mutations() {
            self.current_index = next;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.current_index = -1;
    }

    fn num_mutations(&self) -> u64 {
        self.values.len().saturating_sub(1) as u64
    }

    fn current_index(&self) -> i64 {
        self.current_index
    }

    fn encoder(&self) -> Rc<dyn Encoder> {
        Rc::new(DefaultEncoder)
    }

    fn copy_leaf(&self) -> Box<dyn LeafField> {
        Box::new(Group { values: self.values.clone(), current_index: -1 })
    }

    fn get_info(&self) -> Info {
        let mut info = Info::new();
        info.insert("current_index".to_string(), serde_json::json!(self.current_index));
        info
    }
}

/// Resolves `field_name` relative to the `If`/`IfNot` scope it's attached to
/// and compares its current rendering against a fixed byte string.
#[derive(Debug, Clone)]
pub struct Eq {
    field_name: String,
    expected: Vec<u8>,
}

impl Eq {
    pub fn new(field_name: impl Into<String>, expected: impl Into<Vec<u8>>) -> Self {
        Eq { field_name: field_name.into(), expected: expected.into() }
    }
}

impl Condition for Eq {
    fn applies(&self, arena: &mut Arena, scope: FieldId) -> bool {
        let target = match arena.resolve_field(scope, &self.field_name) {
            Ok(id) => id,
            Err(_) => return false,
        };
        match arena.render(target) {
            Ok(rendered) => rendered.to_bytes() == self.expected,
            Err(_) => false,
        }
    }

    fn copy_condition(&self) -> Box<dyn Condition> {
        Box::new(self.clone())
    }

    fn invalidate(&mut self) {}

    fn hash(&self) -> u32 {
        kitty_fields::hash::khash_str(0, &format!("Eq({},{})", self.field_name, hex::encode(&self.expected)))
    }
}
