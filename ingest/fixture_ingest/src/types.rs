use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomeAway {
    Home,
    Away,
}

impl HomeAway {
    pub fn as_str(&self) -> &'static str {
        match self {
            HomeAway::Home => "Home",
            HomeAway::Away => "Away",
        }
    }

    /// Lenient parse for spreadsheet cells ("home", "H", "away", "A").
    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "home" | "h" => Some(HomeAway::Home),
            "away" | "a" => Some(HomeAway::Away),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    HomeEmail,
    AwayEmail,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::HomeEmail => "home_email",
            TaskType::AwayEmail => "away_email",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Waiting,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Waiting => "waiting",
        }
    }
}

/// A team the club itself fields, from the managed-team registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedTeam {
    pub id: i64,
    pub name: String,
}

/// A registered home venue with its known aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    pub id: i64,
    pub organization_id: i64,
    pub name: String,
    pub aliases: Vec<String>,
}

/// Transient output of the line parser. Created and consumed within a
/// single ingestion call, never persisted.
///
/// Pasted FA lines carry a home/away pair of team names; key:value and
/// spreadsheet sources name our side and the opposition directly, so
/// both shapes are represented and the resolver picks the right path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedFixtureLine {
    pub competition_type: Option<String>,
    pub raw_datetime_text: Option<String>,
    pub home_team_text: Option<String>,
    pub away_team_text: Option<String>,
    pub venue_text: Option<String>,
    pub competition_text: Option<String>,
    pub team_text: Option<String>,
    pub opposition_text: Option<String>,
    pub home_away_text: Option<String>,
    pub instructions_text: Option<String>,
}

impl ParsedFixtureLine {
    /// A line without at least one identifiable team is useless to the
    /// rest of the pipeline and the strategy chain keeps trying.
    pub fn has_team(&self) -> bool {
        (self.home_team_text.is_some() && self.away_team_text.is_some())
            || self.team_text.is_some()
            || self.opposition_text.is_some()
    }
}

/// Normalized record ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedFixture {
    pub organization_id: i64,
    pub managed_team_id: i64,
    pub managed_team_name: String,
    pub opposition_name: String,
    pub home_away: HomeAway,
    pub kickoff_datetime: Option<DateTime<Utc>>,
    pub kickoff_time_text: String,
    pub pitch_id: Option<i64>,
    pub instructions_text: Option<String>,
}

/// Persisted fixture row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fixture {
    pub id: i64,
    pub organization_id: i64,
    pub team_id: i64,
    pub opposition_name: String,
    pub home_away: HomeAway,
    pub kickoff_datetime: DateTime<Utc>,
    pub kickoff_time_text: String,
    pub pitch_id: Option<i64>,
    pub instructions: Option<String>,
    pub is_cancelled: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Follow-up action generated per fixture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: i64,
    pub organization_id: i64,
    pub fixture_id: i64,
    pub task_type: TaskType,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Added,
    Updated,
    Error,
}

/// Per-row ingestion result, surfaced to the caller for user feedback.
#[derive(Debug, Clone, Serialize)]
pub struct RowResult {
    pub row_reference: String,
    pub status: RowStatus,
    pub message: String,
}

/// Structured outcome of one ingestion batch. Always returned in full,
/// even when some rows failed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<RowResult>,
    pub warnings: Vec<String>,
    pub results: Vec<RowResult>,
}

impl ImportSummary {
    pub fn record_added(&mut self, row_reference: impl Into<String>, message: impl Into<String>) {
        self.added += 1;
        self.results.push(RowResult {
            row_reference: row_reference.into(),
            status: RowStatus::Added,
            message: message.into(),
        });
    }

    pub fn record_updated(&mut self, row_reference: impl Into<String>, message: impl Into<String>) {
        self.updated += 1;
        self.results.push(RowResult {
            row_reference: row_reference.into(),
            status: RowStatus::Updated,
            message: message.into(),
        });
    }

    pub fn record_error(&mut self, row_reference: impl Into<String>, message: impl Into<String>) {
        let result = RowResult {
            row_reference: row_reference.into(),
            status: RowStatus::Error,
            message: message.into(),
        };
        self.errors.push(result.clone());
        self.results.push(result);
    }

    /// Unmatched venue strings are aggregated for operator review, they
    /// never fail a row.
    pub fn record_unmatched_venue(&mut self, venue: &str) {
        if !self.warnings.iter().any(|w| w == venue) {
            self.warnings.push(venue.to_string());
        }
    }
}
