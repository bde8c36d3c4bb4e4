//! Deterministic load-plan fingerprinting derived from the explain projection.

use crate::{
    explain::{ExplainExtractor, ExplainIdentifier, ExplainLoadPlan, ExplainNode},
    model::{FetchStrategy, FetchStyle, FetchTiming, LockMode},
    plan::LoadPlanDisposition,
};
use sha2::{Digest, Sha256};

///
/// LoadPlanFingerprint
///
/// Stable, deterministic fingerprint for load plans. Two plans built from
/// the same metadata with the same strategy hash equal.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LoadPlanFingerprint([u8; 32]);

impl LoadPlanFingerprint {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn as_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            use std::fmt::Write as _;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl std::fmt::Display for LoadPlanFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_hex())
    }
}

impl ExplainLoadPlan {
    #[must_use]
    pub fn fingerprint(&self) -> LoadPlanFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(b"loadplanfp:v1");

        write_tag(&mut hasher, disposition_tag(self.disposition));
        write_u32(&mut hasher, len_u32(self.returns.len()));
        for node in &self.returns {
            hash_node(&mut hasher, node);
        }

        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        LoadPlanFingerprint(out)
    }
}

fn hash_node(hasher: &mut Sha256, node: &ExplainNode) {
    write_tag(hasher, 0x01);
    write_str(hasher, node.kind);
    write_str(hasher, &node.path.full_path());
    write_u32(hasher, node.table_group.get());
    write_str(hasher, &node.target);

    write_tag(hasher, 0x02);
    match node.strategy {
        Some(strategy) => hash_strategy(hasher, strategy),
        None => write_tag(hasher, 0x00),
    }

    write_tag(hasher, 0x03);
    match node.lock_mode {
        Some(lock_mode) => write_tag(hasher, lock_mode_tag(lock_mode)),
        None => write_tag(hasher, 0x00),
    }

    write_tag(hasher, 0x04);
    match &node.identifier {
        Some(identifier) => hash_identifier(hasher, identifier),
        None => write_tag(hasher, 0x00),
    }

    write_tag(hasher, 0x05);
    for graph in [&node.index_graph, &node.element_graph] {
        match graph {
            Some(graph) => hash_node(hasher, graph),
            None => write_tag(hasher, 0x00),
        }
    }

    write_tag(hasher, 0x06);
    write_u32(hasher, len_u32(node.fetches.len()));
    for fetch in &node.fetches {
        hash_node(hasher, fetch);
    }

    write_tag(hasher, 0x07);
    match node.links_to {
        Some(target) => write_u32(hasher, target.get()),
        None => write_tag(hasher, 0x00),
    }
}

fn hash_identifier(hasher: &mut Sha256, identifier: &ExplainIdentifier) {
    write_tag(hasher, 0x10);
    write_u32(hasher, len_u32(identifier.fetches.len()));
    for fetch in &identifier.fetches {
        hash_node(hasher, fetch);
    }

    write_u32(hasher, len_u32(identifier.extractors.len()));
    for extractor in &identifier.extractors {
        match extractor {
            ExplainExtractor::Whole { .. } => write_tag(hasher, 0x11),
            ExplainExtractor::Component {
                index, property, ..
            } => {
                write_tag(hasher, 0x12);
                write_u32(hasher, len_u32(*index));
                write_str(hasher, property);
            }
        }
    }
}

fn hash_strategy(hasher: &mut Sha256, strategy: FetchStrategy) {
    write_tag(
        hasher,
        match strategy.timing {
            FetchTiming::Immediate => 0x01,
            FetchTiming::Deferred => 0x02,
        },
    );
    write_tag(
        hasher,
        match strategy.style {
            FetchStyle::Join => 0x01,
            FetchStyle::Select => 0x02,
        },
    );
}

const fn disposition_tag(disposition: LoadPlanDisposition) -> u8 {
    match disposition {
        LoadPlanDisposition::EntityLoader => 0x01,
        LoadPlanDisposition::CollectionInitializer => 0x02,
        LoadPlanDisposition::Mixed => 0x03,
    }
}

const fn lock_mode_tag(lock_mode: LockMode) -> u8 {
    match lock_mode {
        LockMode::None => 0x01,
        LockMode::Read => 0x02,
        LockMode::PessimisticRead => 0x03,
        LockMode::PessimisticWrite => 0x04,
    }
}

fn write_str(hasher: &mut Sha256, value: &str) {
    write_u32(hasher, len_u32(value.len()));
    hasher.update(value.as_bytes());
}

/// Lengths and positions saturate instead of wrapping.
fn len_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn write_u32(hasher: &mut Sha256, value: u32) {
    hasher.update(value.to_be_bytes());
}

fn write_tag(hasher: &mut Sha256, tag: u8) {
    hasher.update([tag]);
}
