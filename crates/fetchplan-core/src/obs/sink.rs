use crate::{
    error::{ErrorClass, ErrorOrigin},
    model::FetchStrategy,
    plan::NodeId,
    resolve::HydrationSource,
};

///
/// PlanTraceSink
///

pub trait PlanTraceSink: Send + Sync {
    fn on_event(&self, event: PlanTraceEvent);
}

///
/// TraceFrame
/// Which walk stack a push or pop touched.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraceFrame {
    Owner,
    Identifier,
    Collection,
}

///
/// PlanTraceEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlanTraceEvent {
    WalkStarted,
    WalkFinished {
        returns: usize,
        nodes: usize,
    },
    WalkFailed {
        class: ErrorClass,
        origin: ErrorOrigin,
        path: Option<String>,
    },
    FramePushed {
        frame: TraceFrame,
        path: String,
        depth: usize,
    },
    FramePopped {
        frame: TraceFrame,
        path: String,
        depth: usize,
    },
    FetchBuilt {
        node: NodeId,
        kind: &'static str,
        path: String,
        strategy: FetchStrategy,
    },
    AttributeDeferred {
        path: String,
        strategy: FetchStrategy,
    },
    CircularAssociationSkipped {
        path: String,
    },
    IdentifierInjected {
        reference: NodeId,
        entity: String,
        fetches: usize,
        extractors: usize,
    },
    IdentifierHydrated {
        reference: NodeId,
        source: HydrationSource,
    },
    IdentifierResolved {
        reference: NodeId,
        missing: bool,
    },
}

/// Forward `event` to `sink` when one is installed.
pub(crate) fn emit(sink: Option<&dyn PlanTraceSink>, event: impl FnOnce() -> PlanTraceEvent) {
    if let Some(sink) = sink {
        sink.on_event(event());
    }
}
