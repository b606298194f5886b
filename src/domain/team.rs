//! Per-agent pipeline status across the four fixed teams.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Stage status of one agent. Ordered: pending < in_progress < completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Pending => "pending",
            AgentStatus::InProgress => "in_progress",
            AgentStatus::Completed => "completed",
        }
    }

    /// Parse a wire status; unknown strings yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AgentStatus::Pending),
            "in_progress" => Some(AgentStatus::InProgress),
            "completed" => Some(AgentStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().replace('_', " "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamKind {
    Analyst,
    Research,
    Trader,
    Risk,
}

impl TeamKind {
    pub const ALL: [TeamKind; 4] = [
        TeamKind::Analyst,
        TeamKind::Research,
        TeamKind::Trader,
        TeamKind::Risk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamKind::Analyst => "analyst",
            TeamKind::Research => "research",
            TeamKind::Trader => "trader",
            TeamKind::Risk => "risk",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TeamKind::Analyst => "Analyst Team",
            TeamKind::Research => "Research Team",
            TeamKind::Trader => "Trading Team",
            TeamKind::Risk => "Risk Management",
        }
    }

    fn index(&self) -> usize {
        match self {
            TeamKind::Analyst => 0,
            TeamKind::Research => 1,
            TeamKind::Trader => 2,
            TeamKind::Risk => 3,
        }
    }
}

impl fmt::Display for TeamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the backend-name ↔ display-name table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSlot {
    pub backend: &'static str,
    pub team: TeamKind,
    pub display: &'static str,
}

/// The twelve pipeline agents, in template order
pub const AGENT_ROSTER: [AgentSlot; 12] = [
    AgentSlot { backend: "Market Analyst", team: TeamKind::Analyst, display: "Market Analyst" },
    AgentSlot { backend: "Social Analyst", team: TeamKind::Analyst, display: "Social Media Analyst" },
    AgentSlot { backend: "News Analyst", team: TeamKind::Analyst, display: "News Analyst" },
    AgentSlot { backend: "Fundamentals Analyst", team: TeamKind::Analyst, display: "Fundamentals Analyst" },
    AgentSlot { backend: "Bull Researcher", team: TeamKind::Research, display: "Bull Research" },
    AgentSlot { backend: "Bear Researcher", team: TeamKind::Research, display: "Bear Research" },
    AgentSlot { backend: "Research Manager", team: TeamKind::Research, display: "Research Manager" },
    AgentSlot { backend: "Trader", team: TeamKind::Trader, display: "Trader" },
    AgentSlot { backend: "Risky Analyst", team: TeamKind::Risk, display: "Risk Analyst" },
    AgentSlot { backend: "Neutral Analyst", team: TeamKind::Risk, display: "Neutral Analyst" },
    AgentSlot { backend: "Safe Analyst", team: TeamKind::Risk, display: "Safe Analyst" },
    AgentSlot { backend: "Portfolio Manager", team: TeamKind::Risk, display: "Portfolio Manager" },
];

/// Look up a backend agent name
pub fn slot_for_backend(name: &str) -> Option<&'static AgentSlot> {
    AGENT_ROSTER.iter().find(|slot| slot.backend == name)
}

/// Reverse lookup from team and display name
pub fn slot_for_display(team: TeamKind, display: &str) -> Option<&'static AgentSlot> {
    AGENT_ROSTER
        .iter()
        .find(|slot| slot.team == team && slot.display == display)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agent {
    pub name: &'static str,
    pub status: AgentStatus,
}

/// Outcome of applying a single status update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Advanced,
    Unchanged,
    /// Regression within a run; ignored
    Regressed,
    /// Agent not on the team
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    kind: TeamKind,
    agents: Vec<Agent>,
    completed: usize,
}

impl Team {
    fn template(kind: TeamKind) -> Self {
        let agents = AGENT_ROSTER
            .iter()
            .filter(|slot| slot.team == kind)
            .map(|slot| Agent {
                name: slot.display,
                status: AgentStatus::Pending,
            })
            .collect();
        Self {
            kind,
            agents,
            completed: 0,
        }
    }

    pub fn kind(&self) -> TeamKind {
        self.kind
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn status_of(&self, display: &str) -> Option<AgentStatus> {
        self.agents
            .iter()
            .find(|agent| agent.name == display)
            .map(|agent| agent.status)
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// completed / members
    pub fn ratio(&self) -> f64 {
        if self.agents.is_empty() {
            return 0.0;
        }
        self.completed as f64 / self.agents.len() as f64
    }

    /// Rounded percentage for progress display
    pub fn percent(&self) -> u8 {
        (self.ratio() * 100.0).round() as u8
    }

    fn apply(&mut self, name: &str, next: AgentStatus) -> StatusChange {
        let Some(agent) = self.agents.iter_mut().find(|agent| agent.name == name) else {
            return StatusChange::Unknown;
        };

        let change = match next.cmp(&agent.status) {
            std::cmp::Ordering::Greater => {
                agent.status = next;
                StatusChange::Advanced
            }
            std::cmp::Ordering::Equal => StatusChange::Unchanged,
            std::cmp::Ordering::Less => {
                debug!(
                    "Ignoring status regression for {}: {} -> {}",
                    agent.name, agent.status, next
                );
                StatusChange::Regressed
            }
        };

        if change == StatusChange::Advanced {
            self.recount();
        }
        change
    }

    fn recount(&mut self) {
        self.completed = self
            .agents
            .iter()
            .filter(|agent| agent.status == AgentStatus::Completed)
            .count();
    }
}

/// Progress of one team, ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamProgress {
    pub team: TeamKind,
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    pub agents: Vec<Agent>,
}

/// All four teams of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamBoard {
    teams: [Team; 4],
}

impl Default for TeamBoard {
    fn default() -> Self {
        Self::template()
    }
}

impl TeamBoard {
    /// Fresh board with every agent pending
    pub fn template() -> Self {
        Self {
            teams: TeamKind::ALL.map(Team::template),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::template();
    }

    pub fn team(&self, kind: TeamKind) -> &Team {
        &self.teams[kind.index()]
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.iter()
    }

    pub fn ratio(&self, kind: TeamKind) -> f64 {
        self.team(kind).ratio()
    }

    pub fn status_of(&self, kind: TeamKind, display: &str) -> Option<AgentStatus> {
        self.team(kind).status_of(display)
    }

    /// Apply a status to one agent. Only the owning team is recounted.
    pub fn apply(&mut self, kind: TeamKind, display: &str, status: AgentStatus) -> StatusChange {
        self.teams[kind.index()].apply(display, status)
    }

    /// Apply a status reported under a backend agent name
    pub fn apply_backend(&mut self, backend_name: &str, status: AgentStatus) -> StatusChange {
        match slot_for_backend(backend_name) {
            Some(slot) => self.apply(slot.team, slot.display, status),
            None => StatusChange::Unknown,
        }
    }

    /// Mark every agent completed (terminal success)
    pub fn complete_all(&mut self) {
        for team in self.teams.iter_mut() {
            for agent in team.agents.iter_mut() {
                agent.status = AgentStatus::Completed;
            }
            team.recount();
        }
    }

    pub fn all_completed(&self) -> bool {
        self.teams.iter().all(|team| team.completed == team.len())
    }

    pub fn all_pending(&self) -> bool {
        self.teams
            .iter()
            .flat_map(|team| team.agents.iter())
            .all(|agent| agent.status == AgentStatus::Pending)
    }

    pub fn progress(&self) -> Vec<TeamProgress> {
        self.teams
            .iter()
            .map(|team| TeamProgress {
                team: team.kind,
                completed: team.completed,
                total: team.len(),
                percent: team.percent(),
                agents: team.agents.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_membership() {
        let board = TeamBoard::template();
        assert_eq!(board.team(TeamKind::Analyst).len(), 4);
        assert_eq!(board.team(TeamKind::Research).len(), 3);
        assert_eq!(board.team(TeamKind::Trader).len(), 1);
        assert_eq!(board.team(TeamKind::Risk).len(), 4);
        assert!(board.all_pending());
    }

    #[test]
    fn test_roster_is_bidirectional() {
        for slot in AGENT_ROSTER.iter() {
            let back = slot_for_display(slot.team, slot.display).unwrap();
            assert_eq!(back.backend, slot.backend);
            assert_eq!(slot_for_backend(slot.backend).unwrap().display, slot.display);
        }
        assert_eq!(
            slot_for_backend("Social Analyst").unwrap().display,
            "Social Media Analyst"
        );
        assert!(slot_for_backend("Macro Analyst").is_none());
    }

    #[test]
    fn test_ratio_tracks_only_updated_team() {
        let mut board = TeamBoard::template();
        let change = board.apply_backend("Market Analyst", AgentStatus::Completed);

        assert_eq!(change, StatusChange::Advanced);
        assert_eq!(board.ratio(TeamKind::Analyst), 0.25);
        assert_eq!(board.team(TeamKind::Analyst).percent(), 25);
        assert_eq!(board.ratio(TeamKind::Research), 0.0);
    }

    #[test]
    fn test_completed_is_not_regressed() {
        let mut board = TeamBoard::template();
        board.apply_backend("Trader", AgentStatus::Completed);
        let change = board.apply_backend("Trader", AgentStatus::InProgress);

        assert_eq!(change, StatusChange::Regressed);
        assert_eq!(
            board.status_of(TeamKind::Trader, "Trader"),
            Some(AgentStatus::Completed)
        );
        assert_eq!(board.ratio(TeamKind::Trader), 1.0);
    }

    #[test]
    fn test_unknown_agent_is_ignored() {
        let mut board = TeamBoard::template();
        assert_eq!(
            board.apply_backend("Macro Analyst", AgentStatus::Completed),
            StatusChange::Unknown
        );
        assert_eq!(
            board.apply(TeamKind::Trader, "Market Analyst", AgentStatus::Completed),
            StatusChange::Unknown
        );
        assert!(board.all_pending());
    }

    #[test]
    fn test_complete_all_and_reset() {
        let mut board = TeamBoard::template();
        board.apply_backend("Bull Researcher", AgentStatus::InProgress);
        board.complete_all();
        assert!(board.all_completed());
        assert!(board.progress().iter().all(|p| p.percent == 100));

        board.reset();
        assert!(board.all_pending());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(AgentStatus::parse("in_progress"), Some(AgentStatus::InProgress));
        assert_eq!(AgentStatus::parse("done"), None);
        assert_eq!(AgentStatus::InProgress.to_string(), "in progress");
    }
}
