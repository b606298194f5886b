//! Ordered, keyed report sections streamed in during a run.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ReportLength;
use crate::report::summarizer::{summarize_section, SummaryMode};

/// Key of the section carrying the portfolio manager's final decision
pub const FINAL_SECTION_KEY: &str = "final";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub key: String,
    pub label: String,
    pub text: String,
}

impl ReportSection {
    pub fn new(key: impl Into<String>, label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            text: text.into(),
        }
    }
}

/// Final-state fields the backend attaches to `complete`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalState {
    #[serde(default)]
    pub market_report: Option<String>,
    #[serde(default)]
    pub sentiment_report: Option<String>,
    #[serde(default)]
    pub news_report: Option<String>,
    #[serde(default)]
    pub fundamentals_report: Option<String>,
    #[serde(default)]
    pub investment_plan: Option<String>,
    #[serde(default)]
    pub trader_investment_plan: Option<String>,
    #[serde(default)]
    pub final_trade_decision: Option<String>,
}

impl FinalState {
    /// Translate present, non-empty fields into sections, in table order
    pub fn to_sections(&self) -> Vec<ReportSection> {
        let fields: [(&Option<String>, &str, &str); 7] = [
            (&self.market_report, "market", "Market Analysis"),
            (&self.sentiment_report, "sentiment", "Social Sentiment"),
            (&self.news_report, "news", "News Analysis"),
            (&self.fundamentals_report, "fundamentals", "Fundamentals Review"),
            (&self.investment_plan, "investment_plan", "Research Team Decision"),
            (&self.trader_investment_plan, "trader", "Trader Investment Plan"),
            (&self.final_trade_decision, FINAL_SECTION_KEY, "Portfolio Management Decision"),
        ];

        fields
            .into_iter()
            .filter_map(|(content, key, label)| {
                content
                    .as_deref()
                    .filter(|text| !text.trim().is_empty())
                    .map(|text| ReportSection::new(key, label, text))
            })
            .collect()
    }
}

/// Section as shown to the user under the current display mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSection {
    pub key: String,
    pub label: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportAccumulator {
    sections: Vec<ReportSection>,
}

impl ReportAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by key. Replacement keeps the original position.
    pub fn upsert(&mut self, section: ReportSection) {
        match self.sections.iter_mut().find(|s| s.key == section.key) {
            Some(existing) => {
                debug!("Replacing report section '{}'", section.key);
                *existing = section;
            }
            None => {
                debug!("Appending report section '{}'", section.key);
                self.sections.push(section);
            }
        }
    }

    /// Replace the entire contents with the final snapshot.
    ///
    /// Returns false (and keeps the streamed sections) when the snapshot
    /// carries no usable section.
    pub fn replace_from_snapshot(&mut self, snapshot: &FinalState) -> bool {
        let sections = snapshot.to_sections();
        if sections.is_empty() {
            return false;
        }
        self.sections = sections;
        true
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn get(&self, key: &str) -> Option<&ReportSection> {
        self.sections.iter().find(|s| s.key == key)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Apply the display transform without touching the retained text
    pub fn render(&self, length: ReportLength) -> Vec<RenderedSection> {
        self.sections
            .iter()
            .map(|section| RenderedSection {
                key: section.key.clone(),
                label: section.label.clone(),
                body: match length {
                    ReportLength::Short => summarize_section(&section.text, SummaryMode::Live),
                    ReportLength::Long => section.text.clone(),
                },
            })
            .collect()
    }

    /// Full text of every section, used for copy and export
    pub fn plain_text(&self) -> String {
        self.sections
            .iter()
            .map(|section| format!("{}\n{}", section.label, section.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(acc: &ReportAccumulator) -> Vec<&str> {
        acc.sections().iter().map(|s| s.key.as_str()).collect()
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut acc = ReportAccumulator::new();
        acc.upsert(ReportSection::new("market", "Market Analysis", "v1"));
        acc.upsert(ReportSection::new("news", "News Analysis", "n1"));
        acc.upsert(ReportSection::new("market", "Market Analysis", "v2"));

        assert_eq!(keys(&acc), vec!["market", "news"]);
        assert_eq!(acc.get("market").unwrap().text, "v2");
    }

    #[test]
    fn test_keys_stay_unique_over_many_updates() {
        let mut acc = ReportAccumulator::new();
        let order = ["a", "b", "a", "c", "b", "a", "d", "c"];
        for (i, key) in order.iter().enumerate() {
            acc.upsert(ReportSection::new(*key, key.to_uppercase(), i.to_string()));
        }

        assert_eq!(keys(&acc), vec!["a", "b", "c", "d"]);
        assert_eq!(acc.get("a").unwrap().text, "5");
        assert_eq!(acc.get("c").unwrap().text, "7");
    }

    #[test]
    fn test_snapshot_is_authoritative() {
        let mut acc = ReportAccumulator::new();
        acc.upsert(ReportSection::new("market", "Market Analysis", "stream"));
        acc.upsert(ReportSection::new("sentiment", "Social Sentiment", "stream"));
        acc.upsert(ReportSection::new("news", "News Analysis", "stream"));

        let snapshot = FinalState {
            market_report: Some("final market".into()),
            news_report: Some("final news".into()),
            sentiment_report: Some(String::new()),
            ..Default::default()
        };

        assert!(acc.replace_from_snapshot(&snapshot));
        assert_eq!(keys(&acc), vec!["market", "news"]);
        assert_eq!(acc.get("market").unwrap().text, "final market");
    }

    #[test]
    fn test_empty_snapshot_keeps_streamed_sections() {
        let mut acc = ReportAccumulator::new();
        acc.upsert(ReportSection::new("market", "Market Analysis", "stream"));

        assert!(!acc.replace_from_snapshot(&FinalState::default()));
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn test_snapshot_field_table() {
        let snapshot = FinalState {
            final_trade_decision: Some("HOLD".into()),
            investment_plan: Some("plan".into()),
            trader_investment_plan: Some("trade".into()),
            ..Default::default()
        };
        let sections = snapshot.to_sections();
        let labels: Vec<_> = sections.iter().map(|s| (s.key.as_str(), s.label.as_str())).collect();
        assert_eq!(
            labels,
            vec![
                ("investment_plan", "Research Team Decision"),
                ("trader", "Trader Investment Plan"),
                ("final", "Portfolio Management Decision"),
            ]
        );
    }

    #[test]
    fn test_render_keeps_full_text() {
        let mut acc = ReportAccumulator::new();
        let text = "Overview\n- RSI is overbought on the daily chart\n- Volume is up strongly this week\n- Support holds near the 200 day line\n- MACD crossed bullish last session";
        acc.upsert(ReportSection::new("market", "Market Analysis", text));

        let short = acc.render(ReportLength::Short);
        let long = acc.render(ReportLength::Long);

        assert_eq!(long[0].body, text);
        assert_ne!(short[0].body, text);
        assert!(short[0].body.starts_with("Overview"));
        assert_eq!(acc.get("market").unwrap().text, text);
    }

    #[test]
    fn test_plain_text_assembly() {
        let mut acc = ReportAccumulator::new();
        acc.upsert(ReportSection::new("market", "Market Analysis", "up"));
        acc.upsert(ReportSection::new("final", "Portfolio Management Decision", "BUY"));

        assert_eq!(
            acc.plain_text(),
            "Market Analysis\nup\n\nPortfolio Management Decision\nBUY"
        );
    }
}
