//! Heuristic condensation of report text into key points.
//!
//! Lines are grouped into buckets delimited by header-like lines. Each bucket
//! contributes its leading bullet points, or failing that its two
//! highest-scoring sentences.

use regex::Regex;
use std::sync::LazyLock;

static TITLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z\s]+$").expect("title pattern"));

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s").expect("heading pattern"));

static HEADING_MARKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s*").expect("heading marks pattern"));

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence pattern"));

const BULLET_MARKERS: [char; 4] = ['-', '*', '•', '·'];

const HEADER_EXCLUDED_PREFIXES: [char; 3] = ['•', '-', '*'];

const IMPORTANT_TERMS: [&str; 10] = [
    "buy",
    "sell",
    "hold",
    "recommend",
    "price",
    "target",
    "risk",
    "opportunity",
    "trend",
    "analysis",
];

const MAX_BULLETS: usize = 3;
const MAX_SENTENCES: usize = 2;
const LIVE_POINT_CAP: usize = 3;

/// How many key points a bucket may contribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// At-a-glance view: at most three points per bucket
    Live,
    /// Take-away document: every extracted point
    Export,
}

#[derive(Debug, Default)]
struct Bucket {
    header: Option<String>,
    lines: Vec<String>,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Does this trimmed line read as a section header?
pub fn is_header(line: &str) -> bool {
    if line.starts_with(HEADER_EXCLUDED_PREFIXES) {
        return false;
    }

    let len = char_len(line);
    let title_like =
        TITLE_LINE.is_match(line) && len < 80 && !line.contains('.') && !line.contains(',');
    let heading = MARKDOWN_HEADING.is_match(line);
    let label = line.ends_with(':') && len < 60;

    title_like || heading || label
}

fn header_text(line: &str) -> String {
    HEADING_MARKS.replace(line, "").replacen(':', "", 1)
}

fn split_buckets(text: &str) -> Vec<Bucket> {
    let mut buckets = vec![Bucket::default()];

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_header(line) {
            buckets.push(Bucket {
                header: Some(header_text(line)),
                lines: Vec::new(),
            });
        } else if let Some(current) = buckets.last_mut() {
            current.lines.push(line.to_string());
        }
    }

    buckets
}

fn bullet_points(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter(|line| line.starts_with(BULLET_MARKERS))
        .take(MAX_BULLETS)
        .filter_map(|line| {
            let body = line.strip_prefix(BULLET_MARKERS).unwrap_or(line).trim();
            let point = format!("• {}", body);
            let len = char_len(&point);
            (len > 10 && len < 200).then_some(point)
        })
        .collect()
}

fn term_score(sentence: &str) -> usize {
    let lower = sentence.to_lowercase();
    IMPORTANT_TERMS
        .iter()
        .filter(|term| lower.contains(*term))
        .count()
}

fn key_sentences(lines: &[String]) -> Vec<String> {
    let joined = lines.join(" ");
    let mut scored: Vec<(usize, &str)> = SENTENCE_END
        .split(&joined)
        .map(str::trim)
        .filter(|s| {
            let len = char_len(s);
            len > 30 && len < 250
        })
        .map(|s| (term_score(s), s))
        .collect();

    // stable: equal scores keep document order
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(MAX_SENTENCES)
        .map(|(_, s)| format!("{}.", s))
        .collect()
}

/// Key points of one bucket: bullets first, sentences as fallback
pub fn extract_key_points(lines: &[String]) -> Vec<String> {
    let bullets = bullet_points(lines);
    if !bullets.is_empty() {
        return bullets;
    }
    key_sentences(lines)
}

/// Condense one section's text
pub fn summarize_section(text: &str, mode: SummaryMode) -> String {
    let mut out: Vec<String> = Vec::new();

    for bucket in split_buckets(text) {
        let mut points = extract_key_points(&bucket.lines);
        if mode == SummaryMode::Live {
            points.truncate(LIVE_POINT_CAP);
        }

        match bucket.header {
            Some(header) => out.push(header),
            None if points.is_empty() => continue,
            None => {}
        }
        out.extend(points);
        out.push(String::new());
    }

    while out.last().is_some_and(|line| line.is_empty()) {
        out.pop();
    }

    out.join("\n")
}

/// Export summary of the assembled report, closed by the recommendation
pub fn summarize_report(text: &str, recommendation: Option<&str>) -> String {
    let mut summary = summarize_section(text, SummaryMode::Export);

    if let Some(decision) = recommendation.map(str::trim).filter(|d| !d.is_empty()) {
        if !summary.is_empty() {
            summary.push_str("\n\n");
        }
        summary.push_str("RECOMMENDATION: ");
        summary.push_str(decision);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_detection() {
        assert!(is_header("Market Analysis"));
        assert!(is_header("## Technical Indicators"));
        assert!(is_header("Key risks:"));
        assert!(!is_header("Trend: bullish"));
        assert!(!is_header("- Bullet point"));
        assert!(!is_header("* Another bullet:"));
        assert!(!is_header("The market rallied today."));
        assert!(!is_header("Apple, Inc"));
        assert!(!is_header("#hashtag without space"));
    }

    #[test]
    fn test_header_text_strips_marks_and_first_colon() {
        assert_eq!(header_text("### Outlook:"), "Outlook");
        assert_eq!(header_text("Risks: near: term:"), "Risks near: term:");
    }

    #[test]
    fn test_bullets_take_priority() {
        let text = "Trend: bullish\n- RSI overbought\n- Volume up";
        let summary = summarize_section(text, SummaryMode::Live);
        assert_eq!(summary, "• RSI overbought\n• Volume up");
    }

    #[test]
    fn test_short_bullets_are_dropped() {
        let lines = vec!["- tiny".to_string(), "* Margin expansion continues".to_string()];
        assert_eq!(
            extract_key_points(&lines),
            vec!["• Margin expansion continues".to_string()]
        );
    }

    #[test]
    fn test_only_first_three_bullets_considered() {
        let lines: Vec<String> = (1..=5)
            .map(|i| format!("- Observation number {} on the tape", i))
            .collect();
        let points = extract_key_points(&lines);
        assert_eq!(points.len(), 3);
        assert!(points[2].contains("number 3"));
    }

    #[test]
    fn test_sentences_ranked_by_terms() {
        let lines = vec![
            "The company held its annual meeting in the spring season. \
             We recommend a buy with a price target well above the current trend. \
             Management changed the layout of the office building again."
                .to_string(),
        ];
        let points = extract_key_points(&lines);
        assert_eq!(points.len(), 2);
        assert!(points[0].starts_with("We recommend a buy"));
        assert!(points[0].ends_with('.'));
        // Tie at zero score keeps document order
        assert!(points[1].starts_with("The company held"));
    }

    #[test]
    fn test_buckets_emitted_in_order_with_separators() {
        let text = "Summary\n- Revenue grew faster than expected\nRisks:\n- Supply chain exposure remains high";
        let summary = summarize_section(text, SummaryMode::Export);
        assert_eq!(
            summary,
            "Summary\n• Revenue grew faster than expected\n\nRisks\n• Supply chain exposure remains high"
        );
    }

    #[test]
    fn test_preamble_forms_unnamed_bucket() {
        let text = "- Preamble point before any header\nOutlook\n- Guidance raised for next year";
        let summary = summarize_section(text, SummaryMode::Live);
        assert_eq!(
            summary,
            "• Preamble point before any header\n\nOutlook\n• Guidance raised for next year"
        );
    }

    #[test]
    fn test_report_summary_appends_recommendation() {
        let text = "Decision\n- Accumulate on weakness below support";
        let summary = summarize_report(text, Some("BUY"));
        assert!(summary.ends_with("\n\nRECOMMENDATION: BUY"));
        assert_eq!(summarize_report(text, None), summarize_section(text, SummaryMode::Export));
    }

    #[test]
    fn test_only_one_bullet_marker_is_stripped() {
        let lines = vec![
            "**Bold** lead with supporting detail".to_string(),
            "- **Target** price sits at 250".to_string(),
        ];
        assert_eq!(
            extract_key_points(&lines),
            vec![
                "• *Bold** lead with supporting detail".to_string(),
                "• **Target** price sits at 250".to_string(),
            ]
        );
    }

    #[test]
    fn test_modes_agree_once_extraction_caps_points() {
        let text = "Drivers
- First driver of the move
- Second driver of the move
                    - Third driver of the move
- Fourth driver of the move
                    - Fifth driver of the move";
        let live = summarize_section(text, SummaryMode::Live);
        assert_eq!(live.lines().filter(|l| l.starts_with("• ")).count(), MAX_BULLETS);
        assert_eq!(live, summarize_section(text, SummaryMode::Export));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(summarize_section("", SummaryMode::Live), "");
        assert_eq!(summarize_section("\n  \n", SummaryMode::Export), "");
    }

    #[test]
    fn test_deterministic() {
        let text = "Overview\nPrices trended higher across the analysis window today. Risk remains elevated into the earnings print.";
        assert_eq!(
            summarize_section(text, SummaryMode::Live),
            summarize_section(text, SummaryMode::Live)
        );
    }
}
