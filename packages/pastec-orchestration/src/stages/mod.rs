// Post-processing stages, in chain order
pub mod redundancy_stage;
pub mod strand_stage;
pub mod wicker_stage;
pub mod nocat_stage;

// Re-exports
pub use nocat_stage::NoCatBestHitStage;
pub use redundancy_stage::RedundancyStage;
pub use strand_stage::StrandStage;
pub use wicker_stage::WickerStage;
