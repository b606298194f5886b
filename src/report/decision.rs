use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static DECISION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(BUY|SELL|HOLD|REDUCE|MONITOR|RE-EVALUATE)").expect("decision pattern")
});

/// Label used when no decision token can be found
pub const DEFAULT_DECISION: &str = "REVIEW";

/// First recognizable decision token in the text, uppercased
pub fn extract_decision(text: &str) -> String {
    DECISION_TOKEN
        .find(text)
        .map(|m| m.as_str().to_uppercase())
        .unwrap_or_else(|| DEFAULT_DECISION.to_string())
}

/// Visual treatment of the recommendation card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationVariant {
    Buy,
    Sell,
    Reduce,
    Neutral,
}

impl RecommendationVariant {
    /// Later matches win: "buy then reduce" is `Reduce`
    pub fn from_label(label: &str) -> Self {
        let normalized = label.to_lowercase();
        let mut variant = RecommendationVariant::Neutral;
        if normalized.contains("buy") {
            variant = RecommendationVariant::Buy;
        }
        if normalized.contains("sell") {
            variant = RecommendationVariant::Sell;
        }
        if normalized.contains("reduce") {
            variant = RecommendationVariant::Reduce;
        }
        variant
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationVariant::Buy => "buy",
            RecommendationVariant::Sell => "sell",
            RecommendationVariant::Reduce => "reduce",
            RecommendationVariant::Neutral => "neutral",
        }
    }
}

impl fmt::Display for RecommendationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
