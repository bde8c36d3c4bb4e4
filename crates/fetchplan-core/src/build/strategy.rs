use crate::{
    config::BuilderConfig,
    model::{AttributeDescriptor, FetchStrategy, LockMode},
    path::PropertyPath,
};

///
/// FetchDecisionContext
///
/// Walk position handed to the strategy for each association.
/// `depth` counts association levels from the root return, the association
/// under decision included.
///

#[derive(Clone, Copy, Debug)]
pub struct FetchDecisionContext<'a> {
    pub depth: usize,
    pub joined_collections: usize,
    pub path: &'a PropertyPath,
}

///
/// LoadPlanBuildingStrategy
///
/// Policy consulted by `LoadPlanBuilder`: which root returns are allowed and
/// how each association is fetched.
///

pub trait LoadPlanBuildingStrategy {
    fn supports_root_entity_returns(&self) -> bool;

    fn supports_root_collection_returns(&self) -> bool;

    fn decide_fetch_strategy(
        &self,
        attribute: &AttributeDescriptor,
        context: &FetchDecisionContext<'_>,
    ) -> FetchStrategy;

    fn lock_mode(&self) -> LockMode {
        LockMode::None
    }
}

///
/// ConfiguredStrategy
///
/// Honors each attribute's mapped fetch, downgraded to a deferred select
/// once the configured depth or joined-collection limits are reached.
///

#[derive(Clone, Debug, Default)]
pub struct ConfiguredStrategy {
    config: BuilderConfig,
}

impl ConfiguredStrategy {
    #[must_use]
    pub const fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &BuilderConfig {
        &self.config
    }
}

impl LoadPlanBuildingStrategy for ConfiguredStrategy {
    fn supports_root_entity_returns(&self) -> bool {
        self.config.supports_root_entity_returns
    }

    fn supports_root_collection_returns(&self) -> bool {
        self.config.supports_root_collection_returns
    }

    fn decide_fetch_strategy(
        &self,
        attribute: &AttributeDescriptor,
        context: &FetchDecisionContext<'_>,
    ) -> FetchStrategy {
        let declared = attribute.fetch;
        if !declared.is_immediate() {
            return declared;
        }

        let too_deep = self
            .config
            .max_fetch_depth
            .is_some_and(|max| context.depth > max);
        let too_many_collections = attribute.is_collection()
            && self
                .config
                .max_joined_collections
                .is_some_and(|max| context.joined_collections >= max);

        if too_deep || too_many_collections {
            FetchStrategy::DEFERRED_SELECT
        } else {
            declared
        }
    }

    fn lock_mode(&self) -> LockMode {
        self.config.lock_mode
    }
}
