//! Planning: turning change reports and impact sets into work lists
//!
//! Each planner follows the same pattern: partition the artifact space
//! into work-to-do and work-to-skip, attach a human-readable `reason`,
//! and estimate the time saved. Estimates are advisory only; the plans
//! are executed by external build/test/doc runners.

pub mod build;
pub mod docs;
pub mod testing;

pub use build::{apply_preserve, BuildPlan, BuildPlanner, PreserveOutcome};
pub use docs::{DocEntry, DocsImpactPlanner, DocsManifest, DocsPlan, SectionEntry};
pub use testing::{TestCoverage, TestCoverageMap, TestFramework, TestImpactAnalyzer, TestPlan};
