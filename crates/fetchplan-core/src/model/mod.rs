//! Read-only persistent-type metadata consumed by the plan builder.
//!
//! Types in `model` describe *what exists*: entities, their identifiers,
//! attributes, composite value types, and collection roles. They are loaded
//! once and shared by every walk; nothing in the engine mutates them.
//!
//! In general:
//! - `model` defines the descriptor surface the walker and builder read
//! - `plan` defines the nodes a walk produces from it

pub mod attribute;
pub mod collection;
pub mod entity;
pub mod fetch;
pub mod registry;


pub use attribute::{AttributeDescriptor, AttributeType, BasicType, CompositeType};
pub use collection::CollectionDescriptor;
pub use entity::{EntityDescriptor, IdentifierDescriptor, IdentifierMode};
pub use fetch::{FetchStrategy, FetchStyle, FetchTiming, LockMode};
pub use registry::MetadataRegistry;
