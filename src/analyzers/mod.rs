//! Green-interval analysis of GLOSA telemetry.
//!
//! Raw pass-records are normalized per signal group, folded into timelines
//! with change detection, annotated with a predicted signal group, and
//! aggregated per intersection. The advice simulation replays the resulting
//! timelines to estimate how reliable the speed advice was.

pub mod aggregate;
pub mod analyzer;
pub mod normalize;
pub mod predict;
pub mod simulation;
pub mod stability;
pub mod summary;
pub mod timeline;
pub mod types;
pub mod utility;
