use crate::{
    model::attribute::{AttributeDescriptor, AttributeType, BasicType, CompositeType},
    path::PropertyPath,
};
use std::sync::Arc;

///
/// EntityDescriptor
/// Runtime metadata for one persistent entity type.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntityDescriptor {
    /// Stable entity name used in keys and diagnostics.
    pub name: String,
    /// Direct supertype within the entity hierarchy, if any.
    pub super_entity: Option<String>,
    pub identifier: IdentifierDescriptor,
    /// Ordered non-identifier attributes (authoritative visitation order).
    pub attributes: Vec<AttributeDescriptor>,
}

impl EntityDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, identifier: IdentifierDescriptor) -> Self {
        Self {
            name: name.into(),
            super_entity: None,
            identifier,
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn extending(mut self, super_entity: impl Into<String>) -> Self {
        self.super_entity = Some(super_entity.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }
}

///
/// IdentifierMode
///
/// Encapsulated: one (possibly synthetic) attribute carries the whole id,
/// whether basic, composite, or a to-one association.
/// NonEncapsulated: several directly-declared properties, addressed through
/// the synthetic `<id>` segment.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IdentifierMode {
    Encapsulated,
    NonEncapsulated,
}

///
/// IdentifierDescriptor
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IdentifierDescriptor {
    pub attribute: AttributeDescriptor,
    pub mode: IdentifierMode,
}

impl IdentifierDescriptor {
    /// Single basic-typed identifier column.
    #[must_use]
    pub fn simple(name: impl Into<String>, ty: BasicType) -> Self {
        Self::encapsulated(AttributeDescriptor::basic(name, ty).not_null())
    }

    #[must_use]
    pub const fn encapsulated(attribute: AttributeDescriptor) -> Self {
        Self {
            attribute,
            mode: IdentifierMode::Encapsulated,
        }
    }

    /// Identifier spread over the properties of `composite`.
    #[must_use]
    pub fn non_encapsulated(composite: Arc<CompositeType>) -> Self {
        Self {
            attribute: AttributeDescriptor::composite(PropertyPath::IDENTIFIER_SEGMENT, composite)
                .not_null(),
            mode: IdentifierMode::NonEncapsulated,
        }
    }

    /// Declared identifier property name (`<id>` when non-encapsulated).
    #[must_use]
    pub fn property_name(&self) -> &str {
        &self.attribute.name
    }

    #[must_use]
    pub const fn is_encapsulated(&self) -> bool {
        matches!(self.mode, IdentifierMode::Encapsulated)
    }

    #[must_use]
    pub fn composite(&self) -> Option<&CompositeType> {
        match &self.attribute.ty {
            AttributeType::Composite(composite) => Some(composite),
            _ => None,
        }
    }

    /// True when walking the identifier can produce fetches at all.
    #[must_use]
    pub fn contains_association(&self) -> bool {
        self.attribute.ty.contains_association()
    }
}
