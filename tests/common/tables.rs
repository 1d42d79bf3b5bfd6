//! Synthetic collector tables
//!
//! Hard-coded concept lists, one per source type, in the shape the
//! original in-process collectors produced.

use super::{day, RawRecord};
use semantic_consensus::atom::SourceType;

/// One row of a fixture table.
#[derive(Debug, Clone, Copy)]
pub struct FixtureConcept {
    pub concept: &'static str,
    pub definition: &'static str,
    pub confidence: f64,
    /// Day of January 2024 the atom was extracted
    pub day: u32,
    pub category: Option<&'static str>,
    pub mathematical_form: Option<&'static str>,
    pub publication_year: Option<i32>,
}

impl FixtureConcept {
    const fn new(
        concept: &'static str,
        definition: &'static str,
        confidence: f64,
        day: u32,
    ) -> Self {
        Self {
            concept,
            definition,
            confidence,
            day,
            category: None,
            mathematical_form: None,
            publication_year: None,
        }
    }

    const fn category(mut self, category: &'static str) -> Self {
        self.category = Some(category);
        self
    }

    const fn form(mut self, form: &'static str) -> Self {
        self.mathematical_form = Some(form);
        self
    }

    const fn year(mut self, year: i32) -> Self {
        self.publication_year = Some(year);
        self
    }

    pub fn record(&self, source_type: SourceType) -> RawRecord {
        let mut record = RawRecord::new(self.concept, self.definition, source_type)
            .confidence(self.confidence)
            .at(day(2024, 1, self.day));
        if let Some(category) = self.category {
            record = record.category(category);
        }
        if let Some(form) = self.mathematical_form {
            record = record.meta("mathematical_form", form);
        }
        if let Some(year) = self.publication_year {
            record = record.meta("publication_year", year);
        }
        record
    }
}

pub const TABLE_SOURCES: [SourceType; 5] = [
    SourceType::Encyclopedia,
    SourceType::AcademicPaper,
    SourceType::HistoricalBook,
    SourceType::InformationTheory,
    SourceType::PhysicsMath,
];

const ENCYCLOPEDIA: &[FixtureConcept] = &[
    FixtureConcept::new(
        "Entropy",
        "Measure of disorder or randomness in a physical or information system",
        0.8,
        1,
    )
    .category("thermodynamics"),
    FixtureConcept::new("Algorithm", "Finite sequence of instructions", 0.7, 2),
    FixtureConcept::new(
        "Natural selection",
        "Differential survival and reproduction of individuals due to differences in phenotype",
        0.75,
        3,
    )
    .year(2024),
    FixtureConcept::new(
        "Fractal",
        "Geometric shape containing detailed structure at arbitrarily small scales",
        0.8,
        4,
    )
    .category("fractal_geometry"),
    FixtureConcept::new(
        "Neural network",
        "Computing system inspired by the biological neural networks of animal brains",
        0.8,
        5,
    ),
];

const ACADEMIC: &[FixtureConcept] = &[
    FixtureConcept::new(
        "Entropy",
        "Expected information content of a random variable, quantifying the uncertainty of its \
         outcomes",
        0.95,
        2,
    )
    .category("shannon_theory")
    .year(2024),
    FixtureConcept::new(
        "Natural selection",
        "Mechanism of evolution whereby heritable traits that increase fitness become more common \
         across generations",
        0.95,
        4,
    )
    .year(2024),
    FixtureConcept::new(
        "Algorithm",
        "A finite, well-defined sequence of computational steps that transforms an input into an \
         output, terminating after a bounded number of operations and characterised by its time \
         and space complexity over all admissible inputs",
        0.9,
        6,
    ),
    FixtureConcept::new(
        "Neural network",
        "Parameterised composition of affine maps and nonlinearities trained by gradient descent",
        0.9,
        7,
    )
    .year(2024),
    FixtureConcept::new(
        "Transformer",
        "Sequence model built on self-attention without recurrence",
        0.85,
        8,
    )
    .year(2024),
];

const HISTORICAL: &[FixtureConcept] = &[
    FixtureConcept::new(
        "Natural selection",
        "Preservation of favourable individual variations and the destruction of those which are \
         injurious",
        0.7,
        1,
    )
    .year(1859),
    FixtureConcept::new(
        "Division of labour",
        "Separation of a process into distinct tasks performed by different workers",
        0.8,
        2,
    )
    .year(1776),
    FixtureConcept::new(
        "Entropy",
        "Transformation content of a body, the measure of heat unavailable for conversion into \
         work",
        0.7,
        3,
    )
    .category("thermodynamics")
    .year(1865),
    FixtureConcept::new(
        "Invisible hand",
        "Unintended social benefits arising from individual self-interested actions",
        0.75,
        4,
    )
    .year(1776),
    FixtureConcept::new(
        "Categorical imperative",
        "Act only according to that maxim whereby you can will that it should become a universal \
         law",
        0.8,
        5,
    )
    .year(1785),
];

const INFORMATION_THEORY: &[FixtureConcept] = &[
    FixtureConcept::new(
        "Shannon entropy",
        "Quantitative measure of the uncertainty contained in a message, foundation of information \
         theory",
        0.98,
        1,
    )
    .category("shannon_theory")
    .form("H(X) = -Σ p(x) log₂ p(x)")
    .year(1948),
    FixtureConcept::new(
        "Channel capacity",
        "Maximum information rate transmissible over a noisy channel",
        0.95,
        2,
    )
    .category("shannon_theory")
    .form("C = B log₂(1 + S/N)")
    .year(1948),
    FixtureConcept::new(
        "Kolmogorov complexity",
        "Length of the shortest program producing a given string, an absolute measure of \
         information content",
        0.96,
        3,
    )
    .category("algorithmic_information")
    .form("K(x) = min{|p| : U(p) = x}")
    .year(1965),
    FixtureConcept::new(
        "LZ77 compression",
        "Dictionary compression replacing repeated substrings with references to earlier \
         occurrences",
        0.92,
        4,
    )
    .category("compression_algorithms")
    .year(1977),
    FixtureConcept::new(
        "Huffman coding",
        "Optimal prefix code assigning shorter codewords to more frequent symbols",
        0.93,
        5,
    )
    .category("compression_algorithms")
    .year(1952),
];

const PHYSICS_MATH: &[FixtureConcept] = &[
    FixtureConcept::new(
        "Thermodynamic entropy",
        "Statistical measure of the number of microscopic configurations consistent with a \
         macroscopic state",
        0.94,
        1,
    )
    .category("statistical_mechanics")
    .form("S = k_B ln W"),
    FixtureConcept::new(
        "Fractal dimension",
        "Ratio describing how detail in a fractal pattern changes with the measurement scale",
        0.9,
        2,
    )
    .category("fractal_geometry")
    .form("D = log N / log(1/r)"),
    FixtureConcept::new(
        "Phase transition",
        "Abrupt change of macroscopic state at a critical point of a control parameter",
        0.92,
        3,
    )
    .category("phase_transitions"),
    FixtureConcept::new(
        "Percolation",
        "Emergence of a spanning cluster above a critical occupation probability",
        0.9,
        4,
    )
    .category("percolation_theory")
    .form("P ~ (p - p_c)^β"),
    FixtureConcept::new(
        "Mandelbrot set",
        "Set of complex parameters for which the quadratic iteration remains bounded, a fractal \
         boundary",
        0.91,
        5,
    )
    .category("fractal_geometry")
    .form("z → z² + c"),
];

/// The fixture table for a source type; empty for types without one.
pub fn table(source_type: SourceType) -> &'static [FixtureConcept] {
    match source_type {
        SourceType::Encyclopedia => ENCYCLOPEDIA,
        SourceType::AcademicPaper => ACADEMIC,
        SourceType::HistoricalBook => HISTORICAL,
        SourceType::InformationTheory => INFORMATION_THEORY,
        SourceType::PhysicsMath => PHYSICS_MATH,
        SourceType::News | SourceType::TemporalAnalysis => &[],
    }
}
