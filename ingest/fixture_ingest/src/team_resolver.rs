use crate::config::IngestConfig;
use crate::types::{HomeAway, ManagedTeam};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(U\d+\s*(?:Black|White|Red|Blue|Green)?\b)").unwrap()
    })
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Containment matches shorter than this over-match on tokens like "U9".
const MIN_CONTAINMENT_LEN: usize = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no managed team found in '{home}' vs '{away}'")]
    NoManagedTeam { home: String, away: String },
    #[error("opposition '{opposition}' matches the managed team '{team}'")]
    OppositionEqualsTeam { opposition: String, team: String },
    #[error("opposition '{opposition}' matches the venue text, likely a parser mis-split")]
    OppositionEqualsVenue { opposition: String },
    #[error("team '{0}' is not in the managed-team registry")]
    UnknownTeam(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamResolution {
    pub team: ManagedTeam,
    pub opposition_name: String,
    pub home_away: HomeAway,
}

#[derive(Debug, Clone, Copy)]
struct SideMatch {
    entry_index: usize,
    exact_identifier: bool,
}

/// Decides which side of a parsed fixture is the club's own team,
/// derives home/away, and cleans the opposition name.
pub struct TeamResolver {
    registry: Vec<ManagedTeam>,
    club_prefixes: Vec<String>,
    assume_away_when_ambiguous: bool,
}

impl TeamResolver {
    pub fn new(registry: Vec<ManagedTeam>, config: &IngestConfig) -> Self {
        Self {
            registry,
            club_prefixes: config.club_prefixes.clone(),
            assume_away_when_ambiguous: config.assume_away_when_ambiguous,
        }
    }

    /// Strip the club-name prefix and collapse whitespace.
    pub fn clean_team_name(&self, name: &str) -> String {
        let mut name = name.trim().to_string();
        for prefix in &self.club_prefixes {
            let lower = name.to_lowercase();
            let prefix_lower = prefix.to_lowercase();
            if lower.starts_with(&prefix_lower) {
                name = name[prefix.len()..].trim().to_string();
            }
        }
        whitespace_re().replace_all(name.trim(), " ").to_string()
    }

    /// Canonical identifier like "U14 White"; falls back to the cleaned
    /// full string when no age-group marker is present.
    pub fn team_identifier(&self, name: &str) -> String {
        match identifier_re().find(name) {
            Some(m) => whitespace_re()
                .replace_all(m.as_str().trim(), " ")
                .to_string(),
            None => self.clean_team_name(name),
        }
    }

    /// Resolve a home/away team-name pair from a parsed line.
    pub fn resolve_pair(
        &self,
        home_text: &str,
        away_text: &str,
        venue_text: Option<&str>,
    ) -> Result<TeamResolution, ResolveError> {
        let home_match = self.match_side(home_text);
        let away_match = self.match_side(away_text);

        let (entry_index, home_away, opposition_raw) = match (home_match, away_match) {
            (Some(home), None) => (home.entry_index, HomeAway::Home, away_text),
            (None, Some(away)) => (away.entry_index, HomeAway::Away, home_text),
            (Some(home), Some(away)) => {
                // Both sides look like ours (e.g. U14 White vs U11 White).
                // Prefer the side whose identifier matches exactly; the
                // final home default is arbitrary but deterministic.
                warn!(home_text, away_text, "both sides match the managed registry");
                if home.exact_identifier && !away.exact_identifier {
                    (home.entry_index, HomeAway::Home, away_text)
                } else if away.exact_identifier && !home.exact_identifier {
                    (away.entry_index, HomeAway::Away, home_text)
                } else {
                    (home.entry_index, HomeAway::Home, away_text)
                }
            }
            (None, None) => {
                return Err(ResolveError::NoManagedTeam {
                    home: home_text.to_string(),
                    away: away_text.to_string(),
                })
            }
        };

        let team = self.registry[entry_index].clone();
        let opposition_name = self.clean_team_name(opposition_raw);
        self.check_resolution(&team, &opposition_name, venue_text)?;

        debug!(
            team = %team.name,
            opposition = %opposition_name,
            home_away = home_away.as_str(),
            "resolved team pair"
        );
        Ok(TeamResolution {
            team,
            opposition_name,
            home_away,
        })
    }

    /// Resolve a row that already names our team and the opposition
    /// directly (spreadsheet rows, key:value blocks). Missing or
    /// unrecognized home/away text falls back to the configured FA away
    /// bias.
    pub fn resolve_named(
        &self,
        team_text: &str,
        opposition_text: &str,
        home_away_text: Option<&str>,
        venue_text: Option<&str>,
    ) -> Result<TeamResolution, ResolveError> {
        let side = self
            .match_side(team_text)
            .ok_or_else(|| ResolveError::UnknownTeam(team_text.to_string()))?;
        let team = self.registry[side.entry_index].clone();

        let home_away = home_away_text
            .and_then(HomeAway::from_text)
            .unwrap_or(if self.assume_away_when_ambiguous {
                HomeAway::Away
            } else {
                HomeAway::Home
            });

        let opposition_name = self.clean_team_name(opposition_text);
        self.check_resolution(&team, &opposition_name, venue_text)?;

        Ok(TeamResolution {
            team,
            opposition_name,
            home_away,
        })
    }

    /// Match one side against the registry: identifier-exact first, then
    /// cleaned-name exact, then guarded containment.
    fn match_side(&self, side_text: &str) -> Option<SideMatch> {
        let side_clean = self.clean_team_name(side_text).to_lowercase();
        if side_clean.is_empty() {
            return None;
        }
        let side_id = self.team_identifier(side_text).to_lowercase();

        for (entry_index, entry) in self.registry.iter().enumerate() {
            let entry_id = self.team_identifier(&entry.name).to_lowercase();
            if !entry_id.is_empty() && entry_id == side_id {
                return Some(SideMatch {
                    entry_index,
                    exact_identifier: true,
                });
            }
        }
        for (entry_index, entry) in self.registry.iter().enumerate() {
            if self.clean_team_name(&entry.name).to_lowercase() == side_clean {
                return Some(SideMatch {
                    entry_index,
                    exact_identifier: false,
                });
            }
        }
        for (entry_index, entry) in self.registry.iter().enumerate() {
            let entry_clean = self.clean_team_name(&entry.name).to_lowercase();
            if entry_clean.len() >= MIN_CONTAINMENT_LEN && side_clean.contains(&entry_clean) {
                return Some(SideMatch {
                    entry_index,
                    exact_identifier: false,
                });
            }
        }
        None
    }

    /// Post-resolution safety checks. The opposition must not collapse
    /// onto the managed team (parser mis-split) nor onto the venue text
    /// (the venue column is often another age group's team name).
    fn check_resolution(
        &self,
        team: &ManagedTeam,
        opposition_name: &str,
        venue_text: Option<&str>,
    ) -> Result<(), ResolveError> {
        let opposition_lower = opposition_name.to_lowercase();
        if opposition_lower.is_empty() {
            return Err(ResolveError::OppositionEqualsTeam {
                opposition: opposition_name.to_string(),
                team: team.name.clone(),
            });
        }

        let team_clean = self.clean_team_name(&team.name).to_lowercase();
        let team_id = self.team_identifier(&team.name).to_lowercase();
        let opposition_id = self.team_identifier(opposition_name).to_lowercase();
        if opposition_lower == team_clean || (!team_id.is_empty() && opposition_id == team_id) {
            return Err(ResolveError::OppositionEqualsTeam {
                opposition: opposition_name.to_string(),
                team: team.name.clone(),
            });
        }

        if let Some(venue) = venue_text {
            let venue_clean = self.clean_team_name(venue).to_lowercase();
            if !venue_clean.is_empty() && venue_clean == opposition_lower {
                return Err(ResolveError::OppositionEqualsVenue {
                    opposition: opposition_name.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolver_for(teams: &[&str]) -> TeamResolver {
        let registry = teams
            .iter()
            .enumerate()
            .map(|(i, name)| ManagedTeam {
                id: i as i64 + 1,
                name: name.to_string(),
            })
            .collect();
        TeamResolver::new(registry, &IngestConfig::default())
    }

    #[test]
    fn test_clean_strips_club_prefix() {
        let resolver = resolver_for(&["U14 White"]);
        assert_eq!(
            resolver.clean_team_name("Withdean Youth U14 White"),
            "U14 White"
        );
        assert_eq!(resolver.clean_team_name("Withdean  U9 Red"), "U9 Red");
        assert_eq!(
            resolver.clean_team_name("Hassocks Juniors U9 Robins"),
            "Hassocks Juniors U9 Robins"
        );
    }

    #[test]
    fn test_identifier_extraction() {
        let resolver = resolver_for(&["U14 White"]);
        assert_eq!(
            resolver.team_identifier("Withdean Youth U14 White"),
            "U14 White"
        );
        assert_eq!(resolver.team_identifier("Whitehawk U14"), "U14");
        assert_eq!(
            resolver.team_identifier("Hove Rivervale"),
            "Hove Rivervale"
        );
    }

    #[test]
    fn test_away_side_matches() {
        let resolver = resolver_for(&["U9 Red"]);
        let resolution = resolver
            .resolve_pair(
                "Hassocks Juniors U9 Robins",
                "Withdean Youth U9 Red",
                Some("Hassocks Juniors U8 Robins"),
            )
            .unwrap();

        assert_eq!(resolution.home_away, HomeAway::Away);
        assert_eq!(resolution.team.name, "U9 Red");
        assert_eq!(resolution.opposition_name, "Hassocks Juniors U9 Robins");
    }

    #[test]
    fn test_home_side_matches() {
        let resolver = resolver_for(&["U14 Black"]);
        let resolution = resolver
            .resolve_pair("Withdean Youth U14 Black", "Whitehawk U14 Red", None)
            .unwrap();

        assert_eq!(resolution.home_away, HomeAway::Home);
        assert_eq!(resolution.opposition_name, "Whitehawk U14 Red");
    }

    #[test]
    fn test_ambiguous_prefers_exact_identifier_and_is_deterministic() {
        let resolver = resolver_for(&["U14 White"]);
        for _ in 0..10 {
            let resolution = resolver
                .resolve_pair(
                    "Withdean Youth U14 White",
                    "Hove Park U14 Whitehawks",
                    None,
                )
                .unwrap();
            // away side matches by containment only; the home side's
            // identifier equals the registry identifier, so home wins
            assert_eq!(resolution.home_away, HomeAway::Home);
            assert_eq!(resolution.opposition_name, "Hove Park U14 Whitehawks");
        }
    }

    #[test]
    fn test_no_managed_team_is_rejected() {
        let resolver = resolver_for(&["U9 Red"]);
        let result = resolver.resolve_pair("Saltdean United U10", "Mile Oak U10", None);
        assert_eq!(
            result,
            Err(ResolveError::NoManagedTeam {
                home: "Saltdean United U10".to_string(),
                away: "Mile Oak U10".to_string(),
            })
        );
    }

    #[test]
    fn test_opposition_equal_to_team_is_rejected() {
        let resolver = resolver_for(&["U14 White"]);
        // a mis-split line that put our own name on both sides
        let result = resolver.resolve_pair(
            "Withdean Youth U14 White",
            "Withdean U14 White",
            None,
        );
        assert!(matches!(
            result,
            Err(ResolveError::OppositionEqualsTeam { .. })
        ));
    }

    #[test]
    fn test_opposition_equal_to_venue_is_rejected() {
        let resolver = resolver_for(&["U9 Red"]);
        let result = resolver.resolve_pair(
            "Hassocks Juniors U9 Robins",
            "Withdean Youth U9 Red",
            Some("Withdean Youth U9 Red"),
        );
        // resolver picked away; opposition is the home side, fine; now
        // invert: venue equal to the opposition text must reject
        assert!(result.is_ok());

        let result = resolver.resolve_pair(
            "Hassocks Juniors U9 Robins",
            "Withdean Youth U9 Red",
            Some("Hassocks Juniors U9 Robins"),
        );
        assert_eq!(
            result,
            Err(ResolveError::OppositionEqualsVenue {
                opposition: "Hassocks Juniors U9 Robins".to_string()
            })
        );
    }

    #[test]
    fn test_resolve_named_with_explicit_home_away() {
        let resolver = resolver_for(&["U9 Red"]);
        let resolution = resolver
            .resolve_named("U9 Red", "Hove Rivervale", Some("Away"), None)
            .unwrap();
        assert_eq!(resolution.home_away, HomeAway::Away);
        assert_eq!(resolution.opposition_name, "Hove Rivervale");
    }

    #[test]
    fn test_resolve_named_defaults_to_away_when_ambiguous() {
        let resolver = resolver_for(&["U12 Black"]);
        let resolution = resolver
            .resolve_named("Withdean Youth U12 Black", "Saltdean United", None, None)
            .unwrap();
        assert_eq!(resolution.home_away, HomeAway::Away);
    }

    #[test]
    fn test_unknown_named_team_is_rejected() {
        let resolver = resolver_for(&["U9 Red"]);
        let result = resolver.resolve_named("U13 Blue", "Hove Rivervale", None, None);
        assert_eq!(
            result,
            Err(ResolveError::UnknownTeam("U13 Blue".to_string()))
        );
    }
}
