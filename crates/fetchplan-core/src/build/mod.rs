//! Load-plan construction.
//!
//! `LoadPlanBuilder` is the walk controller: an external depth-first walker
//! reports `entering_*` / `exiting_*` / `visiting_attribute` events and the
//! builder turns them into plan nodes. Stack discipline is enforced here;
//! fetch policy is delegated to a `LoadPlanBuildingStrategy`.

mod association;
mod collector;
mod controller;
mod stacks;
mod strategy;


pub use association::AssociationKey;
pub use controller::LoadPlanBuilder;
pub use strategy::{ConfiguredStrategy, FetchDecisionContext, LoadPlanBuildingStrategy};
