use crate::{error::InternalError, value::Value};
use std::collections::{BTreeMap, BTreeSet};

///
/// RowSource
///
/// Forward-only cursor over the current row. Each alias may be read at most
/// once per row visit; implementations report a second read as an error.
///

pub trait RowSource {
    fn read(&mut self, alias: &str) -> Result<Value, InternalError>;
}

///
/// BufferedRow
///
/// In-memory `RowSource` that enforces the single-read rule and remembers
/// the order in which aliases were read.
///

#[derive(Clone, Debug, Default)]
pub struct BufferedRow {
    values: BTreeMap<String, Value>,
    consumed: BTreeSet<String>,
    reads: Vec<String>,
}

impl BufferedRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, alias: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(alias.into(), value.into());
        self
    }

    /// Aliases read so far, in read order.
    #[must_use]
    pub fn reads(&self) -> &[String] {
        &self.reads
    }
}

impl RowSource for BufferedRow {
    fn read(&mut self, alias: &str) -> Result<Value, InternalError> {
        if self.consumed.contains(alias) {
            return Err(InternalError::invalid_row(format!(
                "column '{alias}' was already read for this row"
            )));
        }
        let value = self
            .values
            .get(alias)
            .cloned()
            .ok_or_else(|| InternalError::invalid_row(format!("row has no column '{alias}'")))?;

        self.consumed.insert(alias.to_string());
        self.reads.push(alias.to_string());

        Ok(value)
    }
}
