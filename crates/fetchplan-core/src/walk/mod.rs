//! Depth-first metadata walker.
//!
//! Emits builder events in declaration order: identifier first, then the
//! ordered attributes, descending only where the builder accepted the
//! attribute. Association keys seen earlier on the same walk are skipped so
//! bidirectional mappings terminate.

#[cfg(test)]
mod tests;

use crate::{
    build::{AssociationKey, LoadPlanBuilder, LoadPlanBuildingStrategy},
    error::InternalError,
    model::{
        AttributeDescriptor, AttributeType, CollectionDescriptor, EntityDescriptor,
        IdentifierMode, MetadataRegistry,
    },
};

///
/// MetadataWalker
///

#[derive(Clone, Copy, Debug)]
pub struct MetadataWalker<'m> {
    registry: &'m MetadataRegistry,
}

impl<'m> MetadataWalker<'m> {
    #[must_use]
    pub const fn new(registry: &'m MetadataRegistry) -> Self {
        Self { registry }
    }

    /// Walk `entity` as a root return. `finish` runs whether or not the
    /// walk succeeds.
    pub fn walk_entity<S: LoadPlanBuildingStrategy>(
        &self,
        builder: &mut LoadPlanBuilder<'_, S>,
        entity: &str,
    ) -> Result<(), InternalError> {
        builder.start()?;
        let result = self
            .registry
            .entity(entity)
            .and_then(|entity| self.visit_entity(builder, entity));
        builder.finish();

        result
    }

    /// Walk the collection `role` as a root return.
    pub fn walk_collection<S: LoadPlanBuildingStrategy>(
        &self,
        builder: &mut LoadPlanBuilder<'_, S>,
        role: &str,
    ) -> Result<(), InternalError> {
        builder.start()?;
        // Roles are "{owner}.{property}"; a path back to the root collection
        // stops there.
        if let Some((source, property)) = role.rsplit_once('.') {
            builder.association_key_registered(AssociationKey::new(source, property));
        }
        let result = self
            .registry
            .collection(role)
            .and_then(|collection| self.visit_collection(builder, collection));
        builder.finish();

        result
    }

    fn visit_entity<S: LoadPlanBuildingStrategy>(
        &self,
        builder: &mut LoadPlanBuilder<'_, S>,
        entity: &EntityDescriptor,
    ) -> Result<(), InternalError> {
        builder.entering_entity(entity)?;
        self.visit_identifier(builder, entity)?;
        self.visit_attributes(builder, &entity.name, &entity.attributes)?;

        builder.exiting_entity(entity)
    }

    fn visit_identifier<S: LoadPlanBuildingStrategy>(
        &self,
        builder: &mut LoadPlanBuilder<'_, S>,
        entity: &EntityDescriptor,
    ) -> Result<(), InternalError> {
        let identifier = &entity.identifier;
        builder.entering_entity_identifier(entity)?;

        // Identifiers without associations produce no fetches; the row
        // processor reads them whole.
        if identifier.contains_association() {
            match (identifier.mode, identifier.composite()) {
                (IdentifierMode::NonEncapsulated, Some(composite)) => {
                    self.visit_attributes(builder, &entity.name, &composite.properties)?;
                }
                _ => self.visit_attribute(builder, &entity.name, &identifier.attribute)?,
            }
        }

        builder.exiting_entity_identifier(entity)
    }

    fn visit_attributes<S: LoadPlanBuildingStrategy>(
        &self,
        builder: &mut LoadPlanBuilder<'_, S>,
        source: &str,
        attributes: &[AttributeDescriptor],
    ) -> Result<(), InternalError> {
        attributes
            .iter()
            .try_for_each(|attribute| self.visit_attribute(builder, source, attribute))
    }

    fn visit_attribute<S: LoadPlanBuildingStrategy>(
        &self,
        builder: &mut LoadPlanBuilder<'_, S>,
        source: &str,
        attribute: &AttributeDescriptor,
    ) -> Result<(), InternalError> {
        match &attribute.ty {
            AttributeType::Basic(_) => builder.visiting_attribute(attribute).map(|_| ()),
            AttributeType::Composite(composite) => {
                if !builder.visiting_attribute(attribute)? {
                    return Ok(());
                }
                self.visit_attributes(builder, &composite.name, &composite.properties)?;

                builder.exiting_composite(attribute)
            }
            AttributeType::Entity { target } => {
                let key = AssociationKey::new(source, attribute.name.clone());
                if !self.accept_association(builder, attribute, &key)? {
                    return Ok(());
                }
                builder.association_key_registered(key);

                let target = self.registry.entity(target)?;
                self.visit_entity(builder, target)
            }
            AttributeType::Collection(collection) => {
                let key = AssociationKey::new(source, attribute.name.clone());
                if !self.accept_association(builder, attribute, &key)? {
                    return Ok(());
                }
                builder.association_key_registered(key);

                self.visit_collection(builder, collection)
            }
        }
    }

    fn accept_association<S: LoadPlanBuildingStrategy>(
        &self,
        builder: &mut LoadPlanBuilder<'_, S>,
        attribute: &AttributeDescriptor,
        key: &AssociationKey,
    ) -> Result<bool, InternalError> {
        if builder.is_duplicate_association_key(key) {
            builder.found_circular_association(attribute);
            return Ok(false);
        }

        builder.visiting_attribute(attribute)
    }

    fn visit_collection<S: LoadPlanBuildingStrategy>(
        &self,
        builder: &mut LoadPlanBuilder<'_, S>,
        collection: &CollectionDescriptor,
    ) -> Result<(), InternalError> {
        builder.entering_collection(collection)?;

        if let Some(index) = &collection.index {
            builder.entering_collection_index(collection)?;
            self.visit_collection_part(builder, &collection.role, index)?;
            builder.exiting_collection_index(collection)?;
        }

        builder.entering_collection_elements(collection)?;
        self.visit_collection_part(builder, &collection.role, &collection.element)?;
        builder.exiting_collection_elements(collection)?;

        builder.exiting_collection(collection)
    }

    fn visit_collection_part<S: LoadPlanBuildingStrategy>(
        &self,
        builder: &mut LoadPlanBuilder<'_, S>,
        role: &str,
        ty: &AttributeType,
    ) -> Result<(), InternalError> {
        match ty {
            AttributeType::Basic(_) => Ok(()),
            AttributeType::Entity { target } => {
                let target = self.registry.entity(target)?;
                self.visit_entity(builder, target)
            }
            AttributeType::Composite(composite) => {
                let source = format!("{role}.{}", composite.name);
                self.visit_attributes(builder, &source, &composite.properties)
            }
            AttributeType::Collection(nested) => Err(InternalError::metadata_lookup(format!(
                "collection '{role}' holds collection '{}'",
                nested.role
            ))),
        }
    }
}
