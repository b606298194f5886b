//! Report text processing: condensation, decision extraction and the
//! narrow rendering/export collaborators.

pub mod decision;
pub mod export;
pub mod markdown;
pub mod summarizer;

pub use decision::{extract_decision, RecommendationVariant, DEFAULT_DECISION};
pub use export::{export_body, ExportDocument, ExportLayout, ExportLine, ExportMeta};
pub use markdown::{render_html, render_markdown, Block};
pub use summarizer::{summarize_report, summarize_section, SummaryMode};
