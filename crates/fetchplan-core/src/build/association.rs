use derive_more::Display;

///
/// AssociationKey
///
/// Identifies one association by its declaring type and property name.
/// A walker that meets the same key twice on one walk is going in circles.
///

#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{source}.{property}")]
pub struct AssociationKey {
    pub source: String,
    pub property: String,
}

impl AssociationKey {
    #[must_use]
    pub fn new(source: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            property: property.into(),
        }
    }
}
