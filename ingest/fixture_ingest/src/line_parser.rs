use crate::config::IngestConfig;
use crate::types::ParsedFixtureLine;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn vs_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+vs\s+").unwrap())
}

fn datetime_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2}/\d{1,2}/\d{2,4})\s+(\d{1,2}:\d{2})").unwrap())
}

fn age_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^U\d+$").unwrap())
}

/// Words that open the competition/division text in a single-line FA
/// fixture ("Under 9 Autumn Group B", "U14 League Trophy").
const COMPETITION_KEYWORDS: [&str; 5] = ["under", "group", "division", "cup", "league"];

/// Converts normalized, de-duplicated fixture text into a
/// `ParsedFixtureLine` via an ordered chain of strategies; the first
/// strategy producing a result with at least one identifiable team wins.
pub struct FixtureLineParser {
    managed_lower: Vec<String>,
    club_prefixes_lower: Vec<String>,
    color_words: Vec<String>,
    team_candidate_re: Regex,
}

impl FixtureLineParser {
    pub fn new(managed_teams: &[String], config: &IngestConfig) -> Self {
        let colors = config
            .color_words
            .iter()
            .map(|c| regex::escape(c))
            .collect::<Vec<_>>()
            .join("|");
        // club words + age-group marker + optional squad color
        let team_candidate_re = Regex::new(&format!(
            r"(?i)([A-Za-z][A-Za-z'\-\. ]*?U\d+(?:\s+(?:{}))?)",
            colors
        ))
        .unwrap();

        Self {
            managed_lower: managed_teams
                .iter()
                .map(|t| t.trim().to_lowercase())
                .collect(),
            club_prefixes_lower: config
                .club_prefixes
                .iter()
                .map(|p| p.trim().to_lowercase())
                .collect(),
            color_words: config.color_words.clone(),
            team_candidate_re,
        }
    }

    pub fn parse(&self, text: &str) -> Option<ParsedFixtureLine> {
        let strategies: [(&str, fn(&Self, &str) -> Option<ParsedFixtureLine>); 4] = [
            ("single_line", Self::parse_single_line),
            ("tabular", Self::parse_tabular),
            ("key_value", Self::parse_key_value),
            ("free_form", Self::parse_free_form),
        ];

        for (name, strategy) in strategies {
            if let Some(parsed) = strategy(self, text) {
                if parsed.has_team() {
                    debug!(strategy = name, "parsed fixture line");
                    return Some(parsed);
                }
            }
        }
        None
    }

    /// Strategy 1: `[type] DD/MM/YY HH:MM home vs away venue competition`.
    fn parse_single_line(&self, text: &str) -> Option<ParsedFixtureLine> {
        let sides: Vec<&str> = vs_split_re().split(text).collect();
        if sides.len() != 2 {
            return None;
        }

        let datetime_match = datetime_re().find(sides[0])?;
        let competition_type = sides[0][..datetime_match.start()].trim();
        let home_team = sides[0][datetime_match.end()..].trim();
        if home_team.is_empty() {
            return None;
        }

        let words: Vec<&str> = sides[1].split_whitespace().collect();
        let (away_team, rest) = match words.iter().position(|w| age_marker_re().is_match(w)) {
            Some(marker_idx) => {
                let mut end = marker_idx + 1;
                if end < words.len()
                    && self
                        .color_words
                        .iter()
                        .any(|c| words[end].eq_ignore_ascii_case(c))
                {
                    end += 1;
                }
                (words[..end].join(" "), &words[end..])
            }
            None => {
                if words.len() < 3 {
                    return None;
                }
                (words[..3].join(" "), &words[3..])
            }
        };

        let (venue, competition) = split_venue_competition(rest);

        Some(ParsedFixtureLine {
            competition_type: non_empty(competition_type),
            raw_datetime_text: Some(datetime_match.as_str().to_string()),
            home_team_text: Some(home_team.to_string()),
            away_team_text: Some(away_team),
            venue_text: venue,
            competition_text: competition,
            ..Default::default()
        })
    }

    /// Strategy 2: messy tabular dumps where the "vs" split is unusable.
    /// Scans for club + age-group + optional color substrings; the
    /// longest candidate carrying a managed-team keyword is our team,
    /// the longest remaining distinct candidate the opposition.
    fn parse_tabular(&self, text: &str) -> Option<ParsedFixtureLine> {
        let mut managed_candidates: Vec<String> = Vec::new();
        let mut other_candidates: Vec<String> = Vec::new();

        // scanning per vs-segment stops a candidate absorbing the separator
        for segment in vs_split_re().split(text) {
            for m in self.team_candidate_re.find_iter(segment) {
                let candidate = m.as_str().trim().to_string();
                if candidate.split_whitespace().count() < 2 {
                    continue;
                }
                if self.looks_managed(&candidate) {
                    managed_candidates.push(candidate);
                } else {
                    other_candidates.push(candidate);
                }
            }
        }

        let team = longest(&managed_candidates)?;
        let opposition = other_candidates
            .iter()
            .filter(|c| !c.eq_ignore_ascii_case(&team))
            .fold(None::<String>, |best, c| match best {
                Some(b) if b.len() >= c.len() => Some(b),
                _ => Some(c.clone()),
            })?;

        let raw_datetime_text = datetime_re()
            .find(text)
            .map(|m| m.as_str().to_string());
        let competition_type = if text.to_lowercase().contains("cup") {
            Some("Cup".to_string())
        } else if text.to_lowercase().contains("league") {
            Some("League".to_string())
        } else {
            None
        };

        Some(ParsedFixtureLine {
            competition_type,
            raw_datetime_text,
            team_text: Some(team),
            opposition_text: Some(opposition),
            ..Default::default()
        })
    }

    /// Strategy 3: `Key: Value` lines or `Key | Value` table rows.
    fn parse_key_value(&self, text: &str) -> Option<ParsedFixtureLine> {
        let mut parsed = ParsedFixtureLine::default();
        let mut date_text: Option<String> = None;
        let mut time_text: Option<String> = None;
        let mut extras: Vec<String> = Vec::new();
        let mut any_key = false;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let pair = if let Some((key, value)) = line.split_once(':') {
                Some((key.trim().to_lowercase(), value.trim().to_string()))
            } else if line.contains('|') {
                let parts: Vec<&str> = line
                    .split('|')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .collect();
                if parts.len() >= 2 {
                    Some((parts[0].to_lowercase(), parts[1].to_string()))
                } else {
                    None
                }
            } else {
                None
            };

            let Some((key, value)) = pair else {
                // a bare "X vs Y" line inside a key:value block still names the teams
                if vs_split_re().is_match(line) {
                    if let Some(free) = self.parse_free_form(line) {
                        parsed.team_text = parsed.team_text.or(free.team_text);
                        parsed.opposition_text = parsed.opposition_text.or(free.opposition_text);
                    }
                }
                continue;
            };
            if value.is_empty() {
                continue;
            }
            any_key = true;

            if key.contains("opposition") {
                parsed.opposition_text = Some(value);
            } else if key.contains("home/away") {
                parsed.home_away_text = Some(value);
            } else if key.contains("pitch") || key.contains("venue") {
                parsed.venue_text = Some(value);
            } else if key.contains("date") {
                date_text = Some(value);
            } else if key.contains("ko") || key.contains("kick") || key.contains("time") {
                time_text = Some(value);
            } else if key.contains("team") && !key.contains("contact") {
                parsed.team_text = Some(value);
            } else if key.contains("format") {
                parsed.competition_type = Some(value);
            } else if key.contains("league") || key.contains("division") || key.contains("competition") {
                parsed.competition_text = Some(value);
            } else if key.contains("instruction") {
                parsed.instructions_text = Some(value);
            } else if key.contains("referee")
                || key.contains("contact")
                || key.contains("manager")
                || key.contains("fixtures sec")
                || key.contains("each way")
                || key.contains("fixture length")
                || key.contains("mobile")
            {
                extras.push(format!("{}: {}", key, value));
            }
        }

        if !any_key {
            return None;
        }

        parsed.raw_datetime_text = match (date_text, time_text) {
            (Some(d), Some(t)) => Some(format!("{} {}", d, t)),
            (Some(d), None) => Some(d),
            (None, Some(t)) => Some(t),
            (None, None) => None,
        };
        if parsed.instructions_text.is_none() && !extras.is_empty() {
            parsed.instructions_text = Some(extras.join("; "));
        }

        Some(parsed)
    }

    /// Strategy 4: last resort. Any date/time pair plus any "vs" split;
    /// the side matching a managed-team keyword is ours. Home/away is
    /// left undecided here and defaults to Away downstream.
    fn parse_free_form(&self, text: &str) -> Option<ParsedFixtureLine> {
        let sides: Vec<&str> = vs_split_re().split(text).collect();
        if sides.len() < 2 {
            return None;
        }

        let datetime_match = datetime_re().find(text);
        let raw_datetime_text = datetime_match.map(|m| m.as_str().to_string());

        let side_one = self.trim_to_team(sides[0]);
        let side_two = self.trim_to_team(sides[1]);

        let one_managed = self.looks_managed(&side_one);
        let two_managed = self.looks_managed(&side_two);

        let (team, opposition) = if one_managed && !two_managed {
            (side_one, side_two)
        } else if two_managed && !one_managed {
            (side_two, side_one)
        } else {
            return None;
        };

        Some(ParsedFixtureLine {
            raw_datetime_text,
            team_text: Some(team),
            opposition_text: Some(opposition),
            ..Default::default()
        })
    }

    /// Cut a free-form side down to its team name: prefer the club +
    /// age-group candidate when one is present, otherwise strip any
    /// date/time token and keep the rest.
    fn trim_to_team(&self, side: &str) -> String {
        if let Some(m) = self.team_candidate_re.find(side) {
            return m.as_str().trim().to_string();
        }
        let mut side = side.trim().to_string();
        if let Some(m) = datetime_re().find(&side.clone()) {
            side = format!("{} {}", side[..m.start()].trim(), side[m.end()..].trim())
                .trim()
                .to_string();
        }
        side
    }

    /// Keyword check against the managed registry plus club prefixes,
    /// containment in either direction like the matching rules the
    /// resolver applies properly later.
    fn looks_managed(&self, candidate: &str) -> bool {
        let candidate_lower = candidate.trim().to_lowercase();
        if candidate_lower.is_empty() {
            return false;
        }
        self.managed_lower
            .iter()
            .any(|m| candidate_lower.contains(m.as_str()) || m.contains(&candidate_lower))
            || self
                .club_prefixes_lower
                .iter()
                .any(|p| candidate_lower.contains(p.as_str()))
    }
}

/// Split the text trailing the away team into venue and competition by
/// the first competition keyword, midpoint split as a last resort.
fn split_venue_competition(rest: &[&str]) -> (Option<String>, Option<String>) {
    if rest.is_empty() {
        return (None, None);
    }
    match rest
        .iter()
        .position(|w| COMPETITION_KEYWORDS.contains(&w.to_lowercase().as_str()))
    {
        Some(0) => (None, non_empty(&rest.join(" "))),
        Some(idx) => (
            non_empty(&rest[..idx].join(" ")),
            non_empty(&rest[idx..].join(" ")),
        ),
        None => {
            if rest.len() >= 2 {
                let mid = rest.len() / 2;
                (
                    non_empty(&rest[..mid].join(" ")),
                    non_empty(&rest[mid..].join(" ")),
                )
            } else {
                (non_empty(&rest.join(" ")), None)
            }
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn longest(candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .fold(None::<String>, |best, c| match best {
            Some(b) if b.len() >= c.len() => Some(b),
            _ => Some(c.clone()),
        })
}
