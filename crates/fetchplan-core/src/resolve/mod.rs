//! Row-time identifier resolution.
//!
//! Two phases per entity reference and row: `hydrate` produces the raw
//! identifier form (from the cursor, or extracted from an owner's already
//! hydrated identifier), `resolve` turns it into a canonical `EntityKey`.

mod context;
mod row;
mod state;


pub use context::RowProcessingContext;
pub use row::{BufferedRow, RowSource};
pub use state::{EntityKey, HydrationSource, ReferenceProcessingState, ResolutionPhase};
