//! Core engine for FetchPlan: metadata descriptors, the load-plan node model,
//! the walk controller that builds plans, and row-time identifier
//! resolution.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod build;
pub mod config;
pub mod error;
pub mod explain;
pub mod model;
pub mod obs;
pub mod path;
pub mod plan;
pub mod resolve;
pub mod value;
pub mod walk;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, sinks, or configuration types are re-exported here.
///

pub mod prelude {
    pub use crate::{
        build::{ConfiguredStrategy, LoadPlanBuilder, LoadPlanBuildingStrategy},
        model::{
            AttributeDescriptor, AttributeType, BasicType, CollectionDescriptor, CompositeType,
            EntityDescriptor, FetchStrategy, IdentifierDescriptor, MetadataRegistry,
        },
        path::PropertyPath,
        plan::{LoadPlan, NodeId},
        resolve::{EntityKey, RowProcessingContext, RowSource},
        value::Value,
        walk::MetadataWalker,
    };
}
