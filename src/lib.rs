pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod recognize;
pub mod segments;
pub mod trim;

pub use analysis::{AnalysisOutcome, AnalysisReport, CancelToken, SegmentAnalysisDriver};
pub use config::Config;
pub use error::{ExtractorError, Result};
pub use ledger::{Ledger, LedgerStatus};
pub use pipeline::{
    extract_music, print_segments, print_summary, ExtractOptions, ExtractionResult, Toolset,
};
pub use segments::MusicSegment;
pub use trim::{BoundaryTrimmer, TrimOutcome};
