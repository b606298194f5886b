//! Analysis run request and its validated building blocks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{BoardError, Result};

/// Analyst selectable for the first pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalystKind {
    Market,
    Social,
    News,
    Fundamentals,
}

impl AnalystKind {
    pub const ALL: [AnalystKind; 4] = [
        AnalystKind::Market,
        AnalystKind::Social,
        AnalystKind::News,
        AnalystKind::Fundamentals,
    ];

    /// Wire value sent to the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalystKind::Market => "market",
            AnalystKind::Social => "social",
            AnalystKind::News => "news",
            AnalystKind::Fundamentals => "fundamentals",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalystKind::Market => "Market Analyst",
            AnalystKind::Social => "Social Media Analyst",
            AnalystKind::News => "News Analyst",
            AnalystKind::Fundamentals => "Fundamentals Analyst",
        }
    }
}

impl fmt::Display for AnalystKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AnalystKind {
    type Error = BoardError;

    fn try_from(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "market" => Ok(AnalystKind::Market),
            "social" => Ok(AnalystKind::Social),
            "news" => Ok(AnalystKind::News),
            "fundamentals" => Ok(AnalystKind::Fundamentals),
            other => Err(BoardError::Validation(format!("Unknown analyst: {}", other))),
        }
    }
}

/// Report display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLength {
    Short,
    #[default]
    Long,
}

impl ReportLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportLength::Short => "short",
            ReportLength::Long => "long",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportLength::Short => "Short",
            ReportLength::Long => "Long",
        }
    }
}

impl fmt::Display for ReportLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ReportLength {
    type Error = BoardError;

    fn try_from(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(ReportLength::Short),
            "long" => Ok(ReportLength::Long),
            other => Err(BoardError::Validation(format!(
                "Unknown report length: {}",
                other
            ))),
        }
    }
}

/// Debate rounds for the research and risk teams (positive, odd)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ResearchDepth(u32);

impl ResearchDepth {
    /// Quick research, single debate loop
    pub const SHALLOW: ResearchDepth = ResearchDepth(1);
    /// Balanced debate and risk review
    pub const MEDIUM: ResearchDepth = ResearchDepth(3);
    /// Comprehensive discussions and full risk audits
    pub const DEEP: ResearchDepth = ResearchDepth(5);

    pub fn new(rounds: u32) -> Result<Self> {
        if rounds == 0 || rounds % 2 == 0 {
            return Err(BoardError::Validation(format!(
                "research_depth must be a positive odd integer, got {}",
                rounds
            )));
        }
        Ok(Self(rounds))
    }

    pub fn rounds(&self) -> u32 {
        self.0
    }
}

impl Default for ResearchDepth {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl TryFrom<u32> for ResearchDepth {
    type Error = BoardError;

    fn try_from(rounds: u32) -> Result<Self> {
        Self::new(rounds)
    }
}

impl From<ResearchDepth> for u32 {
    fn from(depth: ResearchDepth) -> Self {
        depth.0
    }
}

/// LLM provider the backend should call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub name: String,
    pub backend_url: String,
}

impl Default for ProviderIdentity {
    fn default() -> Self {
        Self {
            name: "google".to_string(),
            backend_url: "https://generativelanguage.googleapis.com/v1".to_string(),
        }
    }
}

/// Quick-thinking and deep-thinking model identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPair {
    pub shallow: String,
    pub deep: String,
}

impl Default for ModelPair {
    fn default() -> Self {
        Self {
            shallow: "gemini-2.0-flash-lite".to_string(),
            deep: "gemini-2.0-flash-lite".to_string(),
        }
    }
}

/// A validated request to start one analysis run.
///
/// Fields are private so the invariants (uppercased ticker, ISO date,
/// non-empty analyst set, odd depth) cannot be broken after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    ticker: String,
    analysis_date: NaiveDate,
    report_length: ReportLength,
    analysts: BTreeSet<AnalystKind>,
    research_depth: ResearchDepth,
    provider: ProviderIdentity,
    models: ModelPair,
}

impl RunRequest {
    pub fn builder(ticker: impl Into<String>, analysis_date: impl Into<String>) -> RunRequestBuilder {
        RunRequestBuilder::new(ticker, analysis_date)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn analysis_date(&self) -> NaiveDate {
        self.analysis_date
    }

    /// Date in `YYYY-MM-DD` form
    pub fn analysis_date_iso(&self) -> String {
        self.analysis_date.format("%Y-%m-%d").to_string()
    }

    pub fn report_length(&self) -> ReportLength {
        self.report_length
    }

    pub fn set_report_length(&mut self, length: ReportLength) {
        self.report_length = length;
    }

    pub fn analysts(&self) -> &BTreeSet<AnalystKind> {
        &self.analysts
    }

    pub fn research_depth(&self) -> ResearchDepth {
        self.research_depth
    }

    pub fn provider(&self) -> &ProviderIdentity {
        &self.provider
    }

    pub fn models(&self) -> &ModelPair {
        &self.models
    }

    pub fn add_analyst(&mut self, analyst: AnalystKind) {
        self.analysts.insert(analyst);
    }

    /// Remove an analyst. Removing the last remaining one is rejected.
    pub fn remove_analyst(&mut self, analyst: AnalystKind) -> Result<()> {
        if self.analysts.len() == 1 && self.analysts.contains(&analyst) {
            return Err(BoardError::Validation(
                "At least one analyst must remain selected".to_string(),
            ));
        }
        self.analysts.remove(&analyst);
        Ok(())
    }
}

/// Builder for [`RunRequest`]; `build` performs all validation.
#[derive(Debug, Clone)]
pub struct RunRequestBuilder {
    ticker: String,
    analysis_date: String,
    report_length: ReportLength,
    analysts: Vec<AnalystKind>,
    research_depth: u32,
    provider: ProviderIdentity,
    models: ModelPair,
}

impl RunRequestBuilder {
    pub fn new(ticker: impl Into<String>, analysis_date: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            analysis_date: analysis_date.into(),
            report_length: ReportLength::default(),
            analysts: AnalystKind::ALL.to_vec(),
            research_depth: ResearchDepth::default().rounds(),
            provider: ProviderIdentity::default(),
            models: ModelPair::default(),
        }
    }

    pub fn report_length(mut self, length: ReportLength) -> Self {
        self.report_length = length;
        self
    }

    pub fn analysts(mut self, analysts: impl IntoIterator<Item = AnalystKind>) -> Self {
        self.analysts = analysts.into_iter().collect();
        self
    }

    pub fn research_depth(mut self, rounds: u32) -> Self {
        self.research_depth = rounds;
        self
    }

    pub fn provider(mut self, provider: ProviderIdentity) -> Self {
        self.provider = provider;
        self
    }

    pub fn models(mut self, models: ModelPair) -> Self {
        self.models = models;
        self
    }

    pub fn build(self) -> Result<RunRequest> {
        let ticker = self.ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(BoardError::Validation("ticker must not be empty".to_string()));
        }

        let analysis_date = NaiveDate::parse_from_str(self.analysis_date.trim(), "%Y-%m-%d")
            .map_err(|e| {
                BoardError::Validation(format!(
                    "analysis_date '{}' is not an ISO-8601 date: {}",
                    self.analysis_date, e
                ))
            })?;

        let analysts: BTreeSet<AnalystKind> = self.analysts.into_iter().collect();
        if analysts.is_empty() {
            return Err(BoardError::Validation(
                "at least one analyst must be selected".to_string(),
            ));
        }

        let research_depth = ResearchDepth::new(self.research_depth)?;

        if self.provider.name.trim().is_empty() {
            return Err(BoardError::Validation("llm_provider must not be empty".to_string()));
        }
        if self.models.shallow.trim().is_empty() || self.models.deep.trim().is_empty() {
            return Err(BoardError::Validation(
                "shallow and deep model identifiers must not be empty".to_string(),
            ));
        }

        Ok(RunRequest {
            ticker,
            analysis_date,
            report_length: self.report_length,
            analysts,
            research_depth,
            provider: self.provider,
            models: self.models,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_is_uppercased() {
        let req = RunRequest::builder(" aapl ", "2025-11-25").build().unwrap();
        assert_eq!(req.ticker(), "AAPL");
        assert_eq!(req.analysis_date_iso(), "2025-11-25");
    }

    #[test]
    fn test_rejects_empty_ticker() {
        let err = RunRequest::builder("   ", "2025-11-25").build().unwrap_err();
        assert!(matches!(err, BoardError::Validation(_)));
    }

    #[test]
    fn test_rejects_bad_date() {
        assert!(RunRequest::builder("SPY", "2025-13-40").build().is_err());
        assert!(RunRequest::builder("SPY", "25/11/2025").build().is_err());
    }

    #[test]
    fn test_rejects_empty_analysts() {
        let err = RunRequest::builder("SPY", "2025-11-25")
            .analysts(Vec::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("analyst"));
    }

    #[test]
    fn test_research_depth_must_be_positive_odd() {
        assert!(ResearchDepth::new(0).is_err());
        assert!(ResearchDepth::new(2).is_err());
        assert_eq!(ResearchDepth::new(5).unwrap(), ResearchDepth::DEEP);
        assert!(RunRequest::builder("SPY", "2025-11-25")
            .research_depth(4)
            .build()
            .is_err());
    }

    #[test]
    fn test_cannot_remove_last_analyst() {
        let mut req = RunRequest::builder("SPY", "2025-11-25")
            .analysts([AnalystKind::Market, AnalystKind::News])
            .build()
            .unwrap();

        req.remove_analyst(AnalystKind::News).unwrap();
        let err = req.remove_analyst(AnalystKind::Market).unwrap_err();
        assert!(matches!(err, BoardError::Validation(_)));
        assert_eq!(req.analysts().len(), 1);
        assert!(req.analysts().contains(&AnalystKind::Market));
    }

    #[test]
    fn test_duplicate_analysts_collapse() {
        let req = RunRequest::builder("SPY", "2025-11-25")
            .analysts([AnalystKind::News, AnalystKind::News, AnalystKind::Market])
            .build()
            .unwrap();
        let order: Vec<_> = req.analysts().iter().map(|a| a.as_str()).collect();
        assert_eq!(order, vec!["market", "news"]);
    }

    #[test]
    fn test_analyst_parse() {
        assert_eq!(AnalystKind::try_from("Social").unwrap(), AnalystKind::Social);
        assert!(AnalystKind::try_from("macro").is_err());
    }
}
