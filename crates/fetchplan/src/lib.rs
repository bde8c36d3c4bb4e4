//! ## Crate layout
//! - `core`: metadata model, load-plan builder and walker, row-time
//!   identifier resolution, explain output, and tracing hooks.
//!
//! The `prelude` module mirrors the surface most callers need to build a
//! plan and resolve rows against it.

pub use fetchplan_core as core;

use crate::core::{
    build::{LoadPlanBuilder, LoadPlanBuildingStrategy},
    model::MetadataRegistry,
    plan::LoadPlan,
    walk::MetadataWalker,
};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::core::error::InternalError as Error;

/// Build a load plan rooted at `entity`.
pub fn plan_entity<S: LoadPlanBuildingStrategy>(
    registry: &MetadataRegistry,
    strategy: S,
    entity: &str,
) -> Result<LoadPlan, Error> {
    let mut builder = LoadPlanBuilder::new(registry, strategy);
    MetadataWalker::new(registry).walk_entity(&mut builder, entity)?;

    builder.into_load_plan()
}

/// Build a load plan rooted at the collection `role`.
pub fn plan_collection<S: LoadPlanBuildingStrategy>(
    registry: &MetadataRegistry,
    strategy: S,
    role: &str,
) -> Result<LoadPlan, Error> {
    let mut builder = LoadPlanBuilder::new(registry, strategy);
    MetadataWalker::new(registry).walk_collection(&mut builder, role)?;

    builder.into_load_plan()
}

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::{plan_collection, plan_entity};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::config::BuilderConfig,
        prelude::*,
    };
    use std::sync::Arc;

    fn registry() -> MetadataRegistry {
        let mut registry = MetadataRegistry::new();
        registry
            .register(
                EntityDescriptor::new("Author", IdentifierDescriptor::simple("id", BasicType::Int))
                    .with_attribute(AttributeDescriptor::collection(
                        "books",
                        Arc::new(CollectionDescriptor::new(
                            "Author.books",
                            AttributeType::Entity {
                                target: "Book".to_string(),
                            },
                        )),
                    )),
            )
            .expect("author");
        registry
            .register(
                EntityDescriptor::new("Book", IdentifierDescriptor::simple("id", BasicType::Int))
                    .with_attribute(AttributeDescriptor::to_one("author", "Author", ["author_id"])),
            )
            .expect("book");
        registry.validate().expect("valid");

        registry
    }

    #[test]
    fn plan_entity_walks_a_root() {
        let registry = registry();
        let plan = plan_entity(&registry, ConfiguredStrategy::default(), "Book").expect("plan");

        assert_eq!(plan.returns().len(), 1);
        assert!(
            plan.find(&PropertyPath::root("Book").append("author"))
                .is_some()
        );
    }

    #[test]
    fn plan_collection_honors_root_gating() {
        let registry = registry();

        let err = plan_collection(&registry, ConfiguredStrategy::default(), "Author.books")
            .expect_err("collection roots are off by default");
        assert!(err.is_unsupported());

        let strategy = ConfiguredStrategy::new(BuilderConfig {
            supports_root_collection_returns: true,
            ..BuilderConfig::default()
        });
        let plan = plan_collection(&registry, strategy, "Author.books").expect("plan");
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn version_is_exported() {
        assert!(!VERSION.is_empty());
    }
}
