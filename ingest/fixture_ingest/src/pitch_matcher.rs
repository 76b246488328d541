use crate::types::Pitch;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// How a venue string was linked to a pitch, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Alias,
    Exact,
    Partial,
    Fuzzy,
    Abbreviation,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitchMatch {
    pub pitch_id: i64,
    pub pitch_name: String,
    pub method: MatchMethod,
}

impl PitchMatch {
    fn new(pitch: &Pitch, method: MatchMethod) -> Self {
        Self {
            pitch_id: pitch.id,
            pitch_name: pitch.name.clone(),
            method,
        }
    }
}

/// Literal abbreviation rules: both strings mentioning one of these
/// token groups is accepted as a match.
const ABBREVIATION_GROUPS: [&[&str]; 2] = [&["3g"], &["college", "coll", "col"]];

/// Maps free-text venue strings onto registered pitches through an
/// ordered chain of pure matcher strategies; the first hit wins and is
/// tagged with its method so each tier stays independently testable.
pub struct PitchMatcher {
    pitches: Vec<Pitch>,
    default_keywords: Vec<String>,
}

type Strategy = fn(&str, &[Pitch]) -> Option<PitchMatch>;

const STRATEGIES: [Strategy; 5] = [
    alias_match,
    exact_match,
    partial_match,
    fuzzy_match,
    abbreviation_match,
];

impl PitchMatcher {
    pub fn new(pitches: Vec<Pitch>, default_keywords: Vec<String>) -> Self {
        Self {
            pitches,
            default_keywords,
        }
    }

    pub fn match_pitch(&self, venue_text: &str) -> Option<PitchMatch> {
        let venue = venue_text.trim().to_lowercase();
        if venue.is_empty() {
            return None;
        }

        for strategy in STRATEGIES {
            if let Some(matched) = strategy(&venue, &self.pitches) {
                debug!(venue = venue_text, pitch = %matched.pitch_name, method = ?matched.method, "matched pitch");
                return Some(matched);
            }
        }
        None
    }

    /// Fallback for home fixtures that arrive with no venue text at all:
    /// the first registered pitch containing one of the configured
    /// keywords, searched in list order.
    pub fn default_home_pitch(&self) -> Option<PitchMatch> {
        for keyword in &self.default_keywords {
            if let Some(pitch) = self
                .pitches
                .iter()
                .find(|p| p.name.to_lowercase().contains(keyword.as_str()))
            {
                return Some(PitchMatch::new(pitch, MatchMethod::Default));
            }
        }
        None
    }
}

/// 1. Case-insensitive exact match against a registered alias.
fn alias_match(venue: &str, pitches: &[Pitch]) -> Option<PitchMatch> {
    pitches
        .iter()
        .find(|p| p.aliases.iter().any(|a| a.trim().to_lowercase() == venue))
        .map(|p| PitchMatch::new(p, MatchMethod::Alias))
}

/// 2. Case-insensitive exact match on the canonical name.
fn exact_match(venue: &str, pitches: &[Pitch]) -> Option<PitchMatch> {
    pitches
        .iter()
        .find(|p| p.name.trim().to_lowercase() == venue)
        .map(|p| PitchMatch::new(p, MatchMethod::Exact))
}

/// 3. Substring containment in either direction.
fn partial_match(venue: &str, pitches: &[Pitch]) -> Option<PitchMatch> {
    pitches
        .iter()
        .find(|p| {
            let name = p.name.trim().to_lowercase();
            !name.is_empty() && (name.contains(venue) || venue.contains(&name))
        })
        .map(|p| PitchMatch::new(p, MatchMethod::Partial))
}

/// 4. Token-overlap match: word-set intersection of at least half the
/// smaller set (minimum one word). Largest intersection wins, ties go
/// to the first-encountered pitch.
fn fuzzy_match(venue: &str, pitches: &[Pitch]) -> Option<PitchMatch> {
    let venue_words: HashSet<&str> = venue.split_whitespace().collect();
    if venue_words.is_empty() {
        return None;
    }

    let mut best: Option<(&Pitch, usize)> = None;
    for pitch in pitches {
        let name = pitch.name.trim().to_lowercase();
        let pitch_words: HashSet<&str> = name.split_whitespace().collect();
        let overlap = pitch_words.intersection(&venue_words).count();
        if overlap == 0 {
            continue;
        }
        let smaller = pitch_words.len().min(venue_words.len());
        if (overlap as f64) < (smaller as f64) * 0.5 {
            continue;
        }
        match best {
            Some((_, best_overlap)) if best_overlap >= overlap => {}
            _ => best = Some((pitch, overlap)),
        }
    }
    best.map(|(p, _)| PitchMatch::new(p, MatchMethod::Fuzzy))
}

/// 5. Known-abbreviation rules, e.g. both strings mention "3g".
fn abbreviation_match(venue: &str, pitches: &[Pitch]) -> Option<PitchMatch> {
    for group in ABBREVIATION_GROUPS {
        if !group.iter().any(|token| venue.contains(token)) {
            continue;
        }
        if let Some(pitch) = pitches.iter().find(|p| {
            let name = p.name.to_lowercase();
            group.iter().any(|token| name.contains(token))
        }) {
            return Some(PitchMatch::new(pitch, MatchMethod::Abbreviation));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pitch(id: i64, name: &str, aliases: &[&str]) -> Pitch {
        Pitch {
            id,
            organization_id: 1,
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn matcher(pitches: Vec<Pitch>) -> PitchMatcher {
        PitchMatcher::new(
            pitches,
            vec![
                "3g".to_string(),
                "withdean".to_string(),
                "stanley deason".to_string(),
                "balfour".to_string(),
                "dorothy stringer".to_string(),
                "varndean".to_string(),
            ],
        )
    }

    #[test]
    fn test_alias_beats_fuzzy() {
        let m = matcher(vec![pitch(1, "Stanley Deason 3G", &["3G Deason"])]);
        let matched = m.match_pitch("3G Deason").unwrap();
        assert_eq!(matched.method, MatchMethod::Alias);
        assert_eq!(matched.pitch_id, 1);
    }

    #[test]
    fn test_exact_name_match() {
        let m = matcher(vec![
            pitch(1, "Balfour Playing Fields", &[]),
            pitch(2, "Dorothy Stringer", &[]),
        ]);
        let matched = m.match_pitch("dorothy stringer").unwrap();
        assert_eq!(matched.method, MatchMethod::Exact);
        assert_eq!(matched.pitch_id, 2);
    }

    #[test]
    fn test_partial_containment_both_directions() {
        let m = matcher(vec![pitch(1, "Balfour Playing Fields", &[])]);
        let matched = m.match_pitch("Balfour").unwrap();
        assert_eq!(matched.method, MatchMethod::Partial);

        let m = matcher(vec![pitch(1, "Varndean", &[])]);
        let matched = m.match_pitch("Varndean College Pitch 2").unwrap();
        assert_eq!(matched.method, MatchMethod::Partial);
    }

    #[test]
    fn test_fuzzy_token_overlap_picks_largest_intersection() {
        let m = matcher(vec![
            pitch(1, "Deason Astro North", &[]),
            pitch(2, "Deason Astro South Pitch", &[]),
        ]);
        // two words shared with pitch 2, one with pitch 1; neither name
        // contains the other so containment never fires
        let matched = m.match_pitch("Astro South Deason Lane").unwrap();
        assert_eq!(matched.method, MatchMethod::Fuzzy);
        assert_eq!(matched.pitch_id, 2);
    }

    #[test]
    fn test_fuzzy_rejects_below_half_overlap() {
        let m = matcher(vec![pitch(1, "Stanley Deason Astro Park", &[])]);
        assert_eq!(m.match_pitch("Stanley Road Recreation Ground Annex"), None);
    }

    #[test]
    fn test_abbreviation_3g_rule() {
        let m = matcher(vec![pitch(1, "Withdean Sports Complex 3G", &[])]);
        let matched = m.match_pitch("3g surface (away end)").unwrap();
        assert_eq!(matched.method, MatchMethod::Abbreviation);
    }

    #[test]
    fn test_abbreviation_college_rule() {
        let m = matcher(vec![pitch(7, "BHASVIC College", &[])]);
        let matched = m.match_pitch("coll ground tbc").unwrap();
        assert_eq!(matched.method, MatchMethod::Abbreviation);
        assert_eq!(matched.pitch_id, 7);
    }

    #[test]
    fn test_default_home_pitch_search_order() {
        let m = matcher(vec![
            pitch(1, "Balfour Playing Fields", &[]),
            pitch(2, "Withdean Sports Complex", &[]),
        ]);
        // "3g" matches nothing, "withdean" is next in the search list
        let matched = m.default_home_pitch().unwrap();
        assert_eq!(matched.pitch_id, 2);
        assert_eq!(matched.method, MatchMethod::Default);
    }

    #[test]
    fn test_no_match_returns_none() {
        let m = matcher(vec![pitch(1, "Balfour Playing Fields", &[])]);
        assert_eq!(m.match_pitch("Preston Park"), None);
        assert_eq!(m.match_pitch(""), None);
        assert_eq!(m.match_pitch("   "), None);
    }
}
