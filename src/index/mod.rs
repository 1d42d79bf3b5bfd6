//! Concept index over every source store
//!
//! Atoms are held once, in processing order `(source_type, timestamp, id)`,
//! and the four indices refer to them by position. Each atom is tagged
//! with the static authority prior of its source type.

use crate::atom::{SemanticAtom, SourceType};
use crate::config::PriorConfig;
use crate::pipeline::CancellationToken;
use crate::store::{self, ArtifactStore, SourceStore, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// An atom tagged with its source prior.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedAtom {
    pub atom: SemanticAtom,
    pub authority_weight: f64,
}

impl IndexedAtom {
    pub fn source_type(&self) -> SourceType {
        self.atom.source_type
    }

    pub fn confidence(&self) -> f64 {
        self.atom.confidence()
    }
}

/// An atom id seen more than once in one source store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateAtom {
    pub id: String,
    pub source_type: SourceType,
    pub occurrences: usize,
}

/// A source store that could not be loaded.
#[derive(Debug)]
pub struct LoadFailure {
    pub name: String,
    pub error: StoreError,
}

/// Counts printed by `sce index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub atoms: usize,
    pub concepts: usize,
    pub agents: usize,
    pub sources: usize,
    pub duplicates: usize,
}

/// In-memory indices: by concept key, by agent, by source type and by time.
#[derive(Debug, Clone, Default)]
pub struct ConceptIndex {
    atoms: Vec<IndexedAtom>,
    by_concept: BTreeMap<String, Vec<usize>>,
    by_agent: BTreeMap<String, Vec<usize>>,
    by_source: BTreeMap<SourceType, Vec<usize>>,
    by_time: Vec<(DateTime<Utc>, String)>,
    duplicates: Vec<DuplicateAtom>,
}

impl ConceptIndex {
    /// Build the index from per-source atom lists.
    ///
    /// Within one source a repeated id keeps its last occurrence and is
    /// reported in [`ConceptIndex::duplicates`].
    pub fn build<I>(sources: I, priors: &PriorConfig) -> Self
    where
        I: IntoIterator<Item = (SourceType, Vec<SemanticAtom>)>,
    {
        let mut index = Self::default();
        let mut collected: Vec<SemanticAtom> = Vec::new();

        for (source_type, atoms) in sources {
            let mut last_seen: HashMap<String, usize> = HashMap::new();
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            let mut kept: Vec<Option<SemanticAtom>> = Vec::with_capacity(atoms.len());

            for mut atom in atoms {
                // hand-edited stores may hold out-of-range confidences
                let confidence = &mut atom.provenance.extraction_confidence;
                *confidence = confidence.clamp(0.0, 1.0);
                atom.source_type = source_type;
                *counts.entry(atom.id.clone()).or_default() += 1;
                if let Some(prev) = last_seen.insert(atom.id.clone(), kept.len()) {
                    kept[prev] = None;
                }
                kept.push(Some(atom));
            }

            for (id, occurrences) in counts.into_iter().filter(|(_, n)| *n > 1) {
                tracing::warn!(%id, %source_type, occurrences, "duplicate atom id, keeping last");
                index.duplicates.push(DuplicateAtom {
                    id,
                    source_type,
                    occurrences,
                });
            }
            collected.extend(kept.into_iter().flatten());
        }

        collected.sort_by(|a, b| {
            a.source_type
                .cmp(&b.source_type)
                .then_with(|| a.provenance.timestamp.cmp(&b.provenance.timestamp))
                .then_with(|| a.id.cmp(&b.id))
        });

        for atom in collected {
            let pos = index.atoms.len();
            index.by_concept.entry(atom.concept_key()).or_default().push(pos);
            index.by_agent.entry(atom.agent_id().to_string()).or_default().push(pos);
            index.by_source.entry(atom.source_type).or_default().push(pos);
            index.by_time.push((atom.provenance.timestamp, atom.id.clone()));
            let authority_weight = priors.prior(atom.source_type);
            index.atoms.push(IndexedAtom { atom, authority_weight });
        }
        index.by_time.sort();
        index
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// All atoms in processing order.
    pub fn atoms(&self) -> &[IndexedAtom] {
        &self.atoms
    }

    pub fn concept(&self, key: &str) -> Vec<&IndexedAtom> {
        self.resolve(self.by_concept.get(key))
    }

    pub fn agent(&self, agent_id: &str) -> Vec<&IndexedAtom> {
        self.resolve(self.by_agent.get(agent_id))
    }

    pub fn source(&self, source_type: SourceType) -> Vec<&IndexedAtom> {
        self.resolve(self.by_source.get(&source_type))
    }

    /// Concept keys in sorted order.
    pub fn concept_keys(&self) -> impl Iterator<Item = &str> {
        self.by_concept.keys().map(String::as_str)
    }

    /// Every concept with its atoms, keys sorted, atoms in processing order.
    pub fn concepts(&self) -> impl Iterator<Item = (&str, Vec<&IndexedAtom>)> {
        self.by_concept
            .iter()
            .map(move |(key, positions)| (key.as_str(), self.resolve(Some(positions))))
    }

    pub fn agents(&self) -> impl Iterator<Item = (&str, Vec<&IndexedAtom>)> {
        self.by_agent
            .iter()
            .map(move |(id, positions)| (id.as_str(), self.resolve(Some(positions))))
    }

    /// Source types present, with atom counts.
    pub fn source_counts(&self) -> BTreeMap<SourceType, usize> {
        self.by_source.iter().map(|(s, v)| (*s, v.len())).collect()
    }

    /// `(timestamp, atom_id)` sorted ascending.
    pub fn by_time(&self) -> &[(DateTime<Utc>, String)] {
        &self.by_time
    }

    pub fn duplicates(&self) -> &[DuplicateAtom] {
        &self.duplicates
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            atoms: self.atoms.len(),
            concepts: self.by_concept.len(),
            agents: self.by_agent.len(),
            sources: self.by_source.len(),
            duplicates: self.duplicates.len(),
        }
    }

    fn resolve(&self, positions: Option<&Vec<usize>>) -> Vec<&IndexedAtom> {
        positions
            .map(|p| p.iter().map(|&i| &self.atoms[i]).collect())
            .unwrap_or_default()
    }
}

/// Source stores read from a directory, plus the ones that failed.
#[derive(Debug, Default)]
pub struct LoadedSources {
    pub stores: Vec<(SourceType, SourceStore)>,
    pub failures: Vec<LoadFailure>,
}

impl LoadedSources {
    pub fn into_atoms(self) -> impl Iterator<Item = (SourceType, Vec<SemanticAtom>)> {
        self.stores.into_iter().map(|(t, s)| (t, s.semantic_atoms))
    }
}

/// Read every `<source_type>_semantic_store.json` present.
///
/// An unreadable or malformed store is logged and recorded as a failure;
/// loading continues with the rest.
pub async fn load_sources(
    store: &dyn ArtifactStore,
    cancel: &CancellationToken,
) -> Result<LoadedSources, StoreError> {
    let mut loaded = LoadedSources::default();
    let mut names: Vec<(SourceType, String)> = store
        .list()
        .await?
        .into_iter()
        .filter_map(|e| store::source_type_of_file(&e.name).map(|t| (t, e.name)))
        .collect();
    names.sort();

    for (source_type, name) in names {
        if cancel.is_cancelled() {
            break;
        }
        match store::load_json::<SourceStore>(store, &name).await {
            Ok(Some(source)) => {
                tracing::debug!(%name, atoms = source.semantic_atoms.len(), "loaded source store");
                loaded.stores.push((source_type, source));
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(%name, %error, "skipping unreadable source store");
                loaded.failures.push(LoadFailure { name, error });
            }
        }
    }
    Ok(loaded)
}
