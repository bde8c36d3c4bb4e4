use crate::model::attribute::AttributeType;

///
/// CollectionDescriptor
/// Runtime metadata for one collection role.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectionDescriptor {
    /// Fully-qualified role, e.g. `Order.lines`.
    pub role: String,
    /// Element type; never itself a collection.
    pub element: AttributeType,
    /// Index (map key / list position) type, for indexed collections.
    pub index: Option<AttributeType>,
}

impl CollectionDescriptor {
    #[must_use]
    pub fn new(role: impl Into<String>, element: AttributeType) -> Self {
        Self {
            role: role.into(),
            element,
            index: None,
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: AttributeType) -> Self {
        self.index = Some(index);
        self
    }

    /// Element graphs exist only for associative or composite elements.
    #[must_use]
    pub const fn element_has_graph(&self) -> bool {
        has_graph(&self.element)
    }

    #[must_use]
    pub const fn index_has_graph(&self) -> bool {
        match &self.index {
            Some(index) => has_graph(index),
            None => false,
        }
    }
}

const fn has_graph(ty: &AttributeType) -> bool {
    ty.is_association() || ty.is_composite()
}
