use crate::model::{collection::CollectionDescriptor, fetch::FetchStrategy};
use serde::Serialize;
use std::sync::Arc;

///
/// AttributeDescriptor
/// Runtime attribute metadata used by the walker and the plan builder.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttributeDescriptor {
    /// Attribute name as it appears in property paths.
    pub name: String,
    /// Declared type of the attribute.
    pub ty: AttributeType,
    pub nullable: bool,
    /// Physical columns, in declaration order. Associations list their
    /// foreign-key columns; composites and collections list none.
    pub columns: Vec<String>,
    /// Mapping-level fetch declaration; strategies may override it.
    pub fetch: FetchStrategy,
}

impl AttributeDescriptor {
    /// Basic attribute stored in one column named after the attribute.
    #[must_use]
    pub fn basic(name: impl Into<String>, ty: BasicType) -> Self {
        let name = name.into();

        Self {
            columns: vec![name.clone()],
            name,
            ty: AttributeType::Basic(ty),
            nullable: true,
            fetch: FetchStrategy::IMMEDIATE_JOIN,
        }
    }

    /// To-one association joined eagerly unless overridden.
    #[must_use]
    pub fn to_one<S: Into<String>>(
        name: impl Into<String>,
        target: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            ty: AttributeType::Entity {
                target: target.into(),
            },
            nullable: true,
            columns: columns.into_iter().map(Into::into).collect(),
            fetch: FetchStrategy::IMMEDIATE_JOIN,
        }
    }

    #[must_use]
    pub fn composite(name: impl Into<String>, composite: Arc<CompositeType>) -> Self {
        Self {
            name: name.into(),
            ty: AttributeType::Composite(composite),
            nullable: true,
            columns: Vec::new(),
            fetch: FetchStrategy::IMMEDIATE_JOIN,
        }
    }

    /// Collection-valued attribute, deferred unless overridden.
    #[must_use]
    pub fn collection(name: impl Into<String>, collection: Arc<CollectionDescriptor>) -> Self {
        Self {
            name: name.into(),
            ty: AttributeType::Collection(collection),
            nullable: true,
            columns: Vec::new(),
            fetch: FetchStrategy::DEFERRED_SELECT,
        }
    }

    #[must_use]
    pub const fn with_fetch(mut self, fetch: FetchStrategy) -> Self {
        self.fetch = fetch;
        self
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self.ty, AttributeType::Collection(_))
    }
}

///
/// AttributeType
///
/// Closed classification driving the walk: basic leaves, composite values,
/// and the two association shapes.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttributeType {
    Basic(BasicType),
    Composite(Arc<CompositeType>),
    Entity { target: String },
    Collection(Arc<CollectionDescriptor>),
}

impl AttributeType {
    #[must_use]
    pub const fn is_basic(&self) -> bool {
        matches!(self, Self::Basic(_))
    }

    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }

    #[must_use]
    pub const fn is_association(&self) -> bool {
        matches!(self, Self::Entity { .. } | Self::Collection(_))
    }

    /// True when this type is, or transitively contains, an association.
    #[must_use]
    pub fn contains_association(&self) -> bool {
        match self {
            Self::Basic(_) => false,
            Self::Entity { .. } | Self::Collection(_) => true,
            Self::Composite(composite) => composite
                .properties
                .iter()
                .any(|property| property.ty.contains_association()),
        }
    }

    /// Short label used by explain output.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Basic(basic) => basic.as_str().to_string(),
            Self::Composite(composite) => composite.name.clone(),
            Self::Entity { target } => target.clone(),
            Self::Collection(collection) => collection.role.clone(),
        }
    }
}

///
/// BasicType
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum BasicType {
    Bool,
    Int,
    Text,
    Uint,
}

impl BasicType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Text => "text",
            Self::Uint => "uint",
        }
    }
}

///
/// CompositeType
///
/// Value type made of ordered sub-properties. Property order is the order of
/// the hydrated tuple.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompositeType {
    pub name: String,
    pub properties: Vec<AttributeDescriptor>,
}

impl CompositeType {
    #[must_use]
    pub fn new(name: impl Into<String>, properties: Vec<AttributeDescriptor>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|property| property.name.as_str())
    }

    /// Linear search over declared sub-property names.
    #[must_use]
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.property_names().position(|candidate| candidate == name)
    }
}
