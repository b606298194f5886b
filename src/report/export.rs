//! Paginated plain-text export of a finished report.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::domain::ReportLength;
use crate::report::summarizer::summarize_report;

static CAPS_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z\s:]+$").expect("caps header pattern"));

const RECOMMENDATION_PREFIX: &str = "RECOMMENDATION:";

/// Page geometry for the export document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExportLayout {
    /// Body lines per page, excluding the footer
    #[serde(default = "default_lines_per_page")]
    pub lines_per_page: usize,
    /// Wrap width in characters
    #[serde(default = "default_line_width")]
    pub line_width: usize,
}

fn default_lines_per_page() -> usize {
    50
}

fn default_line_width() -> usize {
    90
}

impl Default for ExportLayout {
    fn default() -> Self {
        Self {
            lines_per_page: default_lines_per_page(),
            line_width: default_line_width(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMeta {
    pub ticker: String,
    pub analysis_date: String,
    pub report_length: ReportLength,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportLine {
    Title(String),
    Rule,
    Header(String),
    Recommendation(String),
    Body(String),
    Blank,
}

impl ExportLine {
    fn classify(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            ExportLine::Blank
        } else if trimmed.starts_with(RECOMMENDATION_PREFIX) {
            ExportLine::Recommendation(trimmed.to_string())
        } else if CAPS_HEADER.is_match(trimmed) && trimmed.chars().count() < 80 {
            ExportLine::Header(trimmed.to_string())
        } else {
            ExportLine::Body(line.to_string())
        }
    }

    fn render(&self, width: usize) -> String {
        match self {
            ExportLine::Title(text) | ExportLine::Header(text) | ExportLine::Body(text) => {
                text.clone()
            }
            ExportLine::Recommendation(text) => format!(">> {}", text),
            ExportLine::Rule => "-".repeat(width),
            ExportLine::Blank => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPage {
    pub number: usize,
    pub lines: Vec<ExportLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    meta: ExportMeta,
    layout: ExportLayout,
    pages: Vec<ExportPage>,
}

/// Body text for export: the summary for short reports, the full text otherwise
pub fn export_body(plain_text: &str, length: ReportLength, recommendation: Option<&str>) -> String {
    match length {
        ReportLength::Short => summarize_report(plain_text, recommendation),
        ReportLength::Long => plain_text.to_string(),
    }
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.chars().count() <= width || width == 0 {
        return vec![line.to_string()];
    }

    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

impl ExportDocument {
    pub fn build(body: &str, meta: ExportMeta, layout: ExportLayout) -> Self {
        let mut lines = vec![
            ExportLine::Title(format!("TradingAgents Report: {}", meta.ticker)),
            ExportLine::Title(format!("Analysis Date: {}", meta.analysis_date)),
            ExportLine::Rule,
            ExportLine::Title(format!(
                "Current Report ({} Format)",
                meta.report_length.title()
            )),
            ExportLine::Blank,
        ];

        for raw in body.lines() {
            for wrapped in wrap(raw, layout.line_width) {
                lines.push(ExportLine::classify(&wrapped));
            }
        }

        let per_page = layout.lines_per_page.max(1);
        let pages = lines
            .chunks(per_page)
            .enumerate()
            .map(|(i, chunk)| ExportPage {
                number: i + 1,
                lines: chunk.to_vec(),
            })
            .collect();

        Self { meta, layout, pages }
    }

    pub fn pages(&self) -> &[ExportPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn file_name(&self) -> String {
        format!(
            "TradingAgents-{}-{}.txt",
            self.meta.ticker, self.meta.analysis_date
        )
    }

    /// Pages separated by form feeds, each closed by a centered footer
    pub fn render_text(&self) -> String {
        let total = self.page_count();
        let width = self.layout.line_width;

        self.pages
            .iter()
            .map(|page| {
                let mut out: Vec<String> = page.lines.iter().map(|l| l.render(width)).collect();
                out.push(String::new());
                out.push(format!("{:^width$}", format!("Page {} of {}", page.number, total)));
                out.join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\x0c\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(length: ReportLength) -> ExportMeta {
        ExportMeta {
            ticker: "AAPL".into(),
            analysis_date: "2025-11-25".into(),
            report_length: length,
        }
    }

    #[test]
    fn test_line_classification() {
        assert_eq!(
            ExportLine::classify("MARKET ANALYSIS"),
            ExportLine::Header("MARKET ANALYSIS".into())
        );
        assert_eq!(
            ExportLine::classify("RECOMMENDATION: HOLD"),
            ExportLine::Recommendation("RECOMMENDATION: HOLD".into())
        );
        assert_eq!(
            ExportLine::classify("Market Analysis"),
            ExportLine::Body("Market Analysis".into())
        );
        assert_eq!(ExportLine::classify("   "), ExportLine::Blank);
    }

    #[test]
    fn test_pagination_and_footers() {
        let body: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let layout = ExportLayout {
            lines_per_page: 10,
            line_width: 40,
        };
        let doc = ExportDocument::build(&body, meta(ReportLength::Long), layout);

        // 5 preamble lines + 30 body lines
        assert_eq!(doc.page_count(), 4);
        let text = doc.render_text();
        assert!(text.contains("Page 1 of 4"));
        assert!(text.contains("Page 4 of 4"));
        assert_eq!(text.matches('\x0c').count(), 3);
        assert!(text.starts_with("TradingAgents Report: AAPL"));
    }

    #[test]
    fn test_wraps_long_lines() {
        let wrapped = wrap("alpha beta gamma delta epsilon", 12);
        assert_eq!(wrapped, vec!["alpha beta", "gamma delta", "epsilon"]);
        assert!(wrapped.iter().all(|l| l.chars().count() <= 12));
    }

    #[test]
    fn test_export_body_by_length() {
        let text = "Market Analysis\n- Breakout above resistance confirmed";
        assert_eq!(export_body(text, ReportLength::Long, Some("BUY")), text);
        let short = export_body(text, ReportLength::Short, Some("BUY"));
        assert!(short.contains("• Breakout above resistance confirmed"));
        assert!(short.ends_with("RECOMMENDATION: BUY"));
    }

    #[test]
    fn test_file_name() {
        let doc = ExportDocument::build("", meta(ReportLength::Short), ExportLayout::default());
        assert_eq!(doc.file_name(), "TradingAgents-AAPL-2025-11-25.txt");
        assert_eq!(doc.page_count(), 1);
    }
}
