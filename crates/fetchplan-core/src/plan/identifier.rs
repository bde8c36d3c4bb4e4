use crate::{error::InternalError, plan::NodeId, value::Value};
use std::collections::BTreeMap;

///
/// HydratedValueExtractor
///
/// Pulls one identifier component out of the owning reference's already
/// hydrated identifier, so the component never needs a second row read.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HydratedValueExtractor {
    /// The component is the whole identifier (derived identity).
    Whole,
    /// The component sits at `index` of the owner's identifier tuple.
    Component { index: usize, property: String },
}

impl HydratedValueExtractor {
    pub fn extract(&self, owner_hydrated: &Value) -> Result<Value, InternalError> {
        match self {
            Self::Whole => Ok(owner_hydrated.clone()),
            Self::Component { index, property } => owner_hydrated
                .as_tuple()
                .and_then(|items| items.get(*index))
                .cloned()
                .ok_or_else(|| {
                    InternalError::invalid_row(format!(
                        "hydrated identifier {owner_hydrated} has no component {index} ('{property}')"
                    ))
                }),
        }
    }
}

///
/// IdentifierDescription
///
/// Ordered fetches composing one entity reference's identifier, plus the
/// extractor map (non-encapsulated identifiers only). Built once when the
/// identifier subtree is left and immutable afterwards.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IdentifierDescription {
    fetches: Vec<NodeId>,
    extractors: Option<BTreeMap<NodeId, HydratedValueExtractor>>,
}

impl IdentifierDescription {
    #[must_use]
    pub(crate) const fn new(
        fetches: Vec<NodeId>,
        extractors: Option<BTreeMap<NodeId, HydratedValueExtractor>>,
    ) -> Self {
        Self {
            fetches,
            extractors,
        }
    }

    #[must_use]
    pub fn fetches(&self) -> &[NodeId] {
        &self.fetches
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fetches.is_empty()
    }

    #[must_use]
    pub const fn has_extractors(&self) -> bool {
        self.extractors.is_some()
    }

    #[must_use]
    pub fn extractor_for(&self, fetch: NodeId) -> Option<&HydratedValueExtractor> {
        self.extractors.as_ref().and_then(|map| map.get(&fetch))
    }
}
