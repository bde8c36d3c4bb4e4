use crate::{
    error::InternalError,
    model::{
        attribute::{AttributeDescriptor, AttributeType},
        collection::CollectionDescriptor,
        entity::{EntityDescriptor, IdentifierMode},
    },
};
use std::{collections::BTreeMap, sync::Arc};

///
/// MetadataRegistry
///
/// Name-indexed descriptor lookup shared read-only by every walk.
/// Collection roles reachable from registered entities are indexed too.
///

#[derive(Clone, Debug, Default)]
pub struct MetadataRegistry {
    entities: BTreeMap<String, Arc<EntityDescriptor>>,
    collections: BTreeMap<String, Arc<CollectionDescriptor>>,
}

impl MetadataRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one entity and every collection role it declares.
    pub fn register(
        &mut self,
        entity: EntityDescriptor,
    ) -> Result<Arc<EntityDescriptor>, InternalError> {
        if self.entities.contains_key(&entity.name) {
            return Err(InternalError::metadata_lookup(format!(
                "entity '{}' registered twice",
                entity.name
            )));
        }

        let entity = Arc::new(entity);
        for attribute in &entity.attributes {
            self.index_collections(attribute);
        }
        self.entities.insert(entity.name.clone(), Arc::clone(&entity));

        Ok(entity)
    }

    fn index_collections(&mut self, attribute: &AttributeDescriptor) {
        match &attribute.ty {
            AttributeType::Collection(collection) => {
                self.collections
                    .entry(collection.role.clone())
                    .or_insert_with(|| Arc::clone(collection));
            }
            AttributeType::Composite(composite) => {
                for property in &composite.properties {
                    self.index_collections(property);
                }
            }
            AttributeType::Basic(_) | AttributeType::Entity { .. } => {}
        }
    }

    pub fn entity(&self, name: &str) -> Result<&Arc<EntityDescriptor>, InternalError> {
        self.entities
            .get(name)
            .ok_or_else(|| InternalError::metadata_lookup(format!("unknown entity '{name}'")))
    }

    pub fn collection(&self, role: &str) -> Result<&Arc<CollectionDescriptor>, InternalError> {
        self.collections.get(role).ok_or_else(|| {
            InternalError::metadata_lookup(format!("unknown collection role '{role}'"))
        })
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.values()
    }

    /// True when `sub` is `sup` or declares it somewhere up its super chain.
    #[must_use]
    pub fn is_subtype_of(&self, sub: &str, sup: &str) -> bool {
        let mut current = Some(sub);
        let mut hops = 0;

        while let Some(name) = current {
            if name == sup {
                return true;
            }
            // Chains longer than the registry imply a cycle in super declarations.
            hops += 1;
            if hops > self.entities.len() {
                return false;
            }
            current = self
                .entities
                .get(name)
                .and_then(|entity| entity.super_entity.as_deref());
        }

        false
    }

    /// Equal, or related through the declared hierarchy in either direction.
    #[must_use]
    pub fn is_hierarchy_related(&self, a: &str, b: &str) -> bool {
        self.is_subtype_of(a, b) || self.is_subtype_of(b, a)
    }

    /// Check cross-descriptor references once all entities are registered.
    pub fn validate(&self) -> Result<(), InternalError> {
        for entity in self.entities.values() {
            if let Some(super_entity) = &entity.super_entity {
                self.entity(super_entity)?;
            }

            let identifier = &entity.identifier;
            if identifier.attribute.is_collection() {
                return Err(InternalError::metadata_lookup(format!(
                    "identifier of '{}' cannot be a collection",
                    entity.name
                )));
            }
            if identifier.mode == IdentifierMode::NonEncapsulated && identifier.composite().is_none()
            {
                return Err(InternalError::metadata_lookup(format!(
                    "non-encapsulated identifier of '{}' must be composite",
                    entity.name
                )));
            }

            self.validate_attribute(&entity.name, &identifier.attribute)?;
            for attribute in &entity.attributes {
                self.validate_attribute(&entity.name, attribute)?;
            }
        }

        Ok(())
    }

    fn validate_attribute(
        &self,
        owner: &str,
        attribute: &AttributeDescriptor,
    ) -> Result<(), InternalError> {
        self.validate_type(owner, &attribute.name, &attribute.ty)
    }

    fn validate_type(&self, owner: &str, name: &str, ty: &AttributeType) -> Result<(), InternalError> {
        match ty {
            AttributeType::Basic(_) => Ok(()),
            AttributeType::Entity { target } => self.entity(target).map(|_| ()).map_err(|err| {
                InternalError::metadata_lookup(format!("{owner}.{name}: {}", err.message))
            }),
            AttributeType::Composite(composite) => composite
                .properties
                .iter()
                .try_for_each(|property| self.validate_attribute(owner, property)),
            AttributeType::Collection(collection) => {
                if matches!(collection.element, AttributeType::Collection(_)) {
                    return Err(InternalError::metadata_lookup(format!(
                        "collection '{}' cannot hold collections",
                        collection.role
                    )));
                }
                self.validate_type(owner, name, &collection.element)?;
                if let Some(index) = &collection.index {
                    self.validate_type(owner, name, index)?;
                }
                Ok(())
            }
        }
    }
}
