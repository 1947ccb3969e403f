//! Domain services for StudyAid.
//!
//! Ties the storage, generation and blob crates together: background
//! enrichment of new materials, on-demand regeneration, accounts and
//! upload handling. The HTTP layer in `apps/server` is a thin shell over
//! these functions.

pub mod accounts;
pub mod enrichment;
pub mod extract;
pub mod generation;
pub mod materials;
pub mod regenerate;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use enrichment::{EnrichmentOutcome, Enricher, Produced, SkipReason};
pub use materials::{MaterialWithArtifacts, Materials, Upload};
pub use regenerate::{AnalysisParams, Regenerator};
