//! Error taxonomy (spec §7). Every fallible core operation returns
//! `Result<T, KittyError>`; nothing is recovered locally.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KittyError {
    #[error("a field named '{0}' already exists in this container")]
    DuplicateName(String),

    #[error("could not resolve field '{0}'")]
    UnresolvedField(String),

    #[error("field '{0:?}' rendered a non-bit value")]
    RenderTypeError(Option<String>),

    #[error(
        "invalid repeat range: min_times={min_times}, max_times={max_times}, step={step} \
         (require min_times >= 0, max_times > 0, max_times >= min_times, step > 0)"
    )]
    InvalidRange { min_times: i64, max_times: i64, step: i64 },

    #[error("no container to pop")]
    NoContainerToPop,

    #[error("Template should not be copied")]
    TemplateNotCopyable,

    #[error("type assertion failed: {0}")]
    TypeAssertion(String),

    #[error("in field '{field}': {source}")]
    InField {
        field: String,
        #[source]
        source: Box<KittyError>,
    },
}

impl KittyError {
    /// Wrap `self` as having occurred while processing a named child.
    pub fn in_field(self, field: impl Into<String>) -> KittyError {
        KittyError::InField { field: field.into(), source: Box::new(self) }
    }
}
