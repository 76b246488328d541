use crate::config::IngestConfig;
use crate::dates::{self, DateError};
use crate::dedupe::remove_duplicate_team_names;
use crate::line_parser::FixtureLineParser;
use crate::normalize::normalize_text;
use crate::parse_csv;
use crate::pitch_matcher::PitchMatcher;
use crate::reconcile::{upsert_fixture, UpsertOutcome};
use crate::store::{FixtureStore, StoreError};
use crate::team_resolver::{ResolveError, TeamResolver};
use crate::types::{
    HomeAway, ImportSummary, ManagedTeam, ParsedFixtureLine, Pitch, ResolvedFixture,
};
use std::collections::HashMap;
use tracing::{info, warn};

/// Row-level failure taxonomy. None of these abort the batch; each is
/// reported against its row and processing continues.
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("could not parse fixture from: {raw}")]
    Unparseable { raw: String },
    #[error("opposition team not identified")]
    MissingOpposition,
    #[error("no date/time found")]
    MissingDate,
    #[error(transparent)]
    Date(#[from] DateError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives one ingestion batch: normalize, de-duplicate, parse, resolve
/// team and pitch, then reconcile each row against the store. Reference
/// data (registry, pitches) is loaded once per batch and may be
/// slightly stale; that is fine, it is never written here.
pub struct Ingestor {
    organization_id: i64,
    line_parser: FixtureLineParser,
    resolver: TeamResolver,
    pitch_matcher: PitchMatcher,
}

impl Ingestor {
    pub fn new(
        organization_id: i64,
        registry: Vec<ManagedTeam>,
        pitches: Vec<Pitch>,
        config: &IngestConfig,
    ) -> Self {
        if registry.is_empty() {
            // configuration problem, surfaced per-row as unresolved
            warn!(organization_id, "managed-team registry is empty, every row will fail to resolve");
        }
        if pitches.is_empty() {
            warn!(organization_id, "no registered pitches, venues will go unmatched");
        }

        let managed_names: Vec<String> = registry.iter().map(|t| t.name.clone()).collect();
        Self {
            organization_id,
            line_parser: FixtureLineParser::new(&managed_names, config),
            resolver: TeamResolver::new(registry, config),
            pitch_matcher: PitchMatcher::new(pitches, config.default_home_pitch_keywords.clone()),
        }
    }

    /// Ingest pasted or scraped fixture text. Line-oriented input (FA
    /// pastes, one fixture per line) is processed per line; a block with
    /// no "vs" lines is treated as a single key:value fixture.
    pub fn ingest_text<S: FixtureStore>(&self, store: &mut S, text: &str) -> ImportSummary {
        let mut summary = ImportSummary::default();
        let rows = self.resolve_text(text, &mut summary);
        persist_rows(store, rows, &mut summary);

        info!(
            added = summary.added,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "text ingestion finished"
        );
        summary
    }

    /// Ingest tabular rows (CSV / spreadsheet / sheet export) already
    /// split into header → value maps.
    pub fn ingest_rows<S: FixtureStore>(
        &self,
        store: &mut S,
        rows: &[HashMap<String, String>],
    ) -> ImportSummary {
        let mut summary = ImportSummary::default();
        let rows = self.resolve_row_maps(rows, &mut summary);
        persist_rows(store, rows, &mut summary);

        info!(
            added = summary.added,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "row ingestion finished"
        );
        summary
    }

    /// Resolution-only half of `ingest_text`: everything up to (but not
    /// including) the store write, so async persistence layers can run
    /// the same pipeline and apply the writes themselves.
    pub fn resolve_text(&self, text: &str, summary: &mut ImportSummary) -> Vec<ResolvedRow> {
        row_blocks(text)
            .into_iter()
            .map(|(row_reference, row_text)| ResolvedRow {
                outcome: self.resolve_text_row(&row_text, summary),
                row_reference,
            })
            .collect()
    }

    /// Resolution-only half of `ingest_rows`. Rows with no team or no
    /// date are counted as skipped and dropped here.
    pub fn resolve_row_maps(
        &self,
        rows: &[HashMap<String, String>],
        summary: &mut ImportSummary,
    ) -> Vec<ResolvedRow> {
        let mut resolved = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let parsed = parse_csv::row_to_parsed_line(row);
            if parsed.team_text.is_none() || parsed.raw_datetime_text.is_none() {
                summary.skipped += 1;
                continue;
            }
            resolved.push(ResolvedRow {
                row_reference: format!("row {}", index + 1),
                outcome: self.resolve_parsed(parsed, true, summary),
            });
        }
        resolved
    }

    fn resolve_text_row(
        &self,
        raw: &str,
        summary: &mut ImportSummary,
    ) -> Result<ResolvedFixture, RowError> {
        // normalize line by line so key:value blocks keep their line breaks
        let normalized = raw
            .lines()
            .map(normalize_text)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let deduplicated = remove_duplicate_team_names(&normalized);
        let parsed = self
            .line_parser
            .parse(&deduplicated)
            .ok_or_else(|| RowError::Unparseable {
                raw: raw.trim().to_string(),
            })?;
        self.resolve_parsed(parsed, false, summary)
    }

    fn resolve_parsed(
        &self,
        parsed: ParsedFixtureLine,
        default_opposition_tbc: bool,
        summary: &mut ImportSummary,
    ) -> Result<ResolvedFixture, RowError> {
        let venue_text = parsed.venue_text.as_deref();

        let resolution = if let (Some(home), Some(away)) =
            (parsed.home_team_text.as_deref(), parsed.away_team_text.as_deref())
        {
            self.resolver.resolve_pair(home, away, venue_text)?
        } else if let Some(team) = parsed.team_text.as_deref() {
            let opposition = match parsed.opposition_text.as_deref() {
                Some(opposition) => opposition,
                // spreadsheet rows legitimately leave the opponent TBC
                None if default_opposition_tbc => "TBC",
                None => return Err(RowError::MissingOpposition),
            };
            self.resolver.resolve_named(
                team,
                opposition,
                parsed.home_away_text.as_deref(),
                venue_text,
            )?
        } else {
            return Err(RowError::MissingOpposition);
        };

        let raw_datetime = parsed
            .raw_datetime_text
            .as_deref()
            .ok_or(RowError::MissingDate)?;
        let (kickoff, kickoff_time_text) = dates::parse_datetime_text(raw_datetime)?;

        let pitch_id = self.match_venue(venue_text, resolution.home_away, summary);

        let instructions_text = parsed
            .instructions_text
            .clone()
            .or_else(|| match pitch_id {
                // keep the raw venue for the secretary when nothing matched
                None => venue_text.map(str::to_string),
                Some(_) => None,
            });

        let resolved = ResolvedFixture {
            organization_id: self.organization_id,
            managed_team_id: resolution.team.id,
            managed_team_name: resolution.team.name.clone(),
            opposition_name: resolution.opposition_name,
            home_away: resolution.home_away,
            kickoff_datetime: Some(kickoff),
            kickoff_time_text,
            pitch_id,
            instructions_text,
        };

        Ok(resolved)
    }

    fn match_venue(
        &self,
        venue_text: Option<&str>,
        home_away: HomeAway,
        summary: &mut ImportSummary,
    ) -> Option<i64> {
        match venue_text.map(str::trim).filter(|v| !v.is_empty()) {
            Some(venue) => match self.pitch_matcher.match_pitch(venue) {
                Some(matched) => Some(matched.pitch_id),
                None => {
                    summary.record_unmatched_venue(venue);
                    None
                }
            },
            // no venue at all: home games fall back to the default pitch
            None if home_away == HomeAway::Home => self
                .pitch_matcher
                .default_home_pitch()
                .map(|m| m.pitch_id),
            None => None,
        }
    }
}

/// One pipeline unit: where it came from plus either the fixture ready
/// to persist or why it could not be produced.
#[derive(Debug)]
pub struct ResolvedRow {
    pub row_reference: String,
    pub outcome: Result<ResolvedFixture, RowError>,
}

fn persist_rows<S: FixtureStore>(
    store: &mut S,
    rows: Vec<ResolvedRow>,
    summary: &mut ImportSummary,
) {
    for row in rows {
        match row.outcome.and_then(|resolved| {
            let outcome = upsert_fixture(store, &resolved)?;
            Ok((outcome, resolved))
        }) {
            Ok((outcome, resolved)) => {
                record_outcome(summary, &row.row_reference, outcome, &resolved)
            }
            Err(error) => {
                warn!(row_reference = %row.row_reference, %error, "row failed");
                summary.record_error(&row.row_reference, error.to_string());
            }
        }
    }
}

/// Human-readable per-row summary line shared by every persistence path.
pub fn record_outcome(
    summary: &mut ImportSummary,
    row_reference: &str,
    outcome: UpsertOutcome,
    resolved: &ResolvedFixture,
) {
    let message = format!(
        "{} ({}) vs {}",
        resolved.managed_team_name,
        resolved.home_away.as_str(),
        resolved.opposition_name
    );
    match outcome {
        UpsertOutcome::Added(_) => summary.record_added(row_reference, message),
        UpsertOutcome::Updated(_) => summary.record_updated(row_reference, message),
    }
}

/// Split raw text into per-row units. FA pastes are one fixture per
/// line, each carrying a "vs"; a multi-line block with no "vs" line is
/// a single key:value fixture.
fn row_blocks(text: &str) -> Vec<(String, String)> {
    let lines: Vec<(usize, String)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, normalize_text(l)))
        .filter(|(_, l)| !l.is_empty())
        .collect();

    if lines.is_empty() {
        return Vec::new();
    }

    let any_vs = lines.iter().any(|(_, l)| l.contains(" vs "));
    if lines.len() > 1 && !any_vs {
        return vec![("block".to_string(), text.to_string())];
    }

    lines
        .into_iter()
        .map(|(line_number, line)| (format!("line {}", line_number), line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ingestor(teams: &[&str], pitches: Vec<Pitch>) -> Ingestor {
        let registry = teams
            .iter()
            .enumerate()
            .map(|(i, name)| ManagedTeam {
                id: i as i64 + 1,
                name: name.to_string(),
            })
            .collect();
        Ingestor::new(1, registry, pitches, &IngestConfig::default())
    }

    #[test]
    fn test_single_fa_line_end_to_end() {
        let ingestor = ingestor(&["U9 Red"], Vec::new());
        let mut store = MemoryStore::default();

        let summary = ingestor.ingest_text(
            &mut store,
            "28/09/25 10:00 Hassocks Juniors U9 Robins VS Withdean Youth U9 Red \
             Hassocks Juniors U8 Robins Under 9 Autumn Group B",
        );

        assert_eq!(summary.added, 1);
        assert_eq!(summary.errors.len(), 0);
        let fixtures = store.fixtures();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].home_away, HomeAway::Away);
        assert_eq!(fixtures[0].opposition_name, "Hassocks Juniors U9 Robins");
    }

    #[test]
    fn test_key_value_block_is_one_fixture() {
        let ingestor = ingestor(&["U9 Red"], Vec::new());
        let mut store = MemoryStore::default();

        let summary = ingestor.ingest_text(
            &mut store,
            "Team: U9 Red\nOpposition: Hove Rivervale\nDate: 26/11/2023\n\
             KO time: 11:00\nHome/Away: Away",
        );

        assert_eq!(summary.added, 1);
        assert_eq!(store.fixtures().len(), 1);
        assert_eq!(store.fixtures()[0].kickoff_time_text, "11:00");
    }

    #[test]
    fn test_unparsed_line_is_reported_with_line_number() {
        let ingestor = ingestor(&["U9 Red"], Vec::new());
        let mut store = MemoryStore::default();

        let summary = ingestor.ingest_text(
            &mut store,
            "28/09/25 10:00 Hassocks Juniors U9 Robins vs Withdean Youth U9 Red\n\
             total nonsense line",
        );

        assert_eq!(summary.added, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].row_reference, "line 2");
        assert!(summary.errors[0].message.contains("total nonsense line"));
    }

    #[test]
    fn test_unmatched_venue_warns_but_persists() {
        let ingestor = ingestor(&["U9 Red"], Vec::new());
        let mut store = MemoryStore::default();

        let summary = ingestor.ingest_text(
            &mut store,
            "28/09/25 10:00 Hassocks Juniors U9 Robins vs Withdean Youth U9 Red \
             Hassocks Juniors U8 Robins Under 9 Autumn Group B",
        );

        assert_eq!(summary.added, 1);
        assert_eq!(summary.warnings, vec!["Hassocks Juniors U8 Robins".to_string()]);
        assert_eq!(store.fixtures()[0].pitch_id, None);
    }
}
