//! Atom ingestion
//!
//! Collectors yield raw records; [`AtomIngestor`] validates each one into a
//! [`SemanticAtom`](crate::atom::SemanticAtom) with complete provenance.
//! Accepted atoms are merged into the per-source store for their type.

mod collector;
mod raw;

pub use collector::{Collector, CollectorError, InMemoryCollector, JsonFileCollector};
pub use raw::{parse_timestamp, AtomIngestor, IngestError, IngestWarning, Ingested, RawAtom};

use crate::atom::SemanticAtom;
use std::collections::HashMap;

/// A record the ingestor refused, with its position in the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub index: usize,
    pub error: IngestError,
}

/// Outcome of validating one collector's batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestBatch {
    pub accepted: Vec<SemanticAtom>,
    pub rejected: Vec<Rejection>,
    pub warnings: Vec<(usize, IngestWarning)>,
}

impl IngestBatch {
    pub fn push(&mut self, index: usize, result: Result<Ingested, IngestError>) {
        match result {
            Ok(ingested) => {
                for warning in ingested.warnings {
                    tracing::warn!(
                        index,
                        %warning,
                        concept = %ingested.atom.concept,
                        "ingest warning"
                    );
                    self.warnings.push((index, warning));
                }
                self.accepted.push(ingested.atom);
            }
            Err(error) => {
                tracing::warn!(index, %error, "rejected raw atom");
                self.rejected.push(Rejection { index, error });
            }
        }
    }
}

/// Merge incoming atoms into an existing store's atoms.
///
/// Order is preserved; an incoming atom with an id already present
/// replaces the earlier record in place (last write wins).
pub fn merge_atoms(existing: Vec<SemanticAtom>, incoming: Vec<SemanticAtom>) -> Vec<SemanticAtom> {
    let mut merged: Vec<SemanticAtom> = Vec::with_capacity(existing.len() + incoming.len());
    let mut position: HashMap<String, usize> = HashMap::new();
    for atom in existing.into_iter().chain(incoming) {
        match position.get(&atom.id) {
            Some(&i) => merged[i] = atom,
            None => {
                position.insert(atom.id.clone(), merged.len());
                merged.push(atom);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::tests::sample_atom;

    #[test]
    fn merge_keeps_order_and_replaces_duplicates() {
        let a = sample_atom("alpha", 0.5);
        let b = sample_atom("beta", 0.5);
        let mut a2 = a.clone();
        a2.definition = "revised".into();
        let c = sample_atom("gamma", 0.5);

        let merged = merge_atoms(vec![a, b], vec![a2, c]);
        let concepts: Vec<_> = merged.iter().map(|x| x.concept.as_str()).collect();
        assert_eq!(concepts, vec!["alpha", "beta", "gamma"]);
        assert_eq!(merged[0].definition, "revised");
    }

    #[test]
    fn batch_separates_accepted_and_rejected() {
        let mut batch = IngestBatch::default();
        batch.push(0, Ok(Ingested { atom: sample_atom("alpha", 0.5), warnings: vec![] }));
        batch.push(1, Err(IngestError::MalformedAtom("concept is empty".into())));
        assert_eq!(batch.accepted.len(), 1);
        assert_eq!(batch.rejected[0].index, 1);
    }
}
