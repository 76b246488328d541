use regex::Regex;
use std::sync::OnceLock;

fn leading_datetime_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2}/\d{1,2}/\d{2,4}\s+\d{1,2}:\d{2})\s+(.*)$").unwrap()
    })
}

/// Collapse copy-paste duplicated team names on each side of a
/// `"{date time} {home} vs {away}"` line.
///
/// The source website repeats a team's name immediately after itself
/// ("Clinical Training FC U14 Clinical Training FC U14"), so each side
/// of the single "vs" split is de-duplicated independently. Lines that
/// don't carry a leading date/time pair or exactly one "vs" are
/// returned unchanged and left to the other parser strategies.
pub fn remove_duplicate_team_names(text: &str) -> String {
    let captures = match leading_datetime_re().captures(text) {
        Some(c) => c,
        None => return text.to_string(),
    };
    let date_time = &captures[1];
    let remainder = &captures[2];

    let sides: Vec<&str> = remainder.split(" vs ").collect();
    if sides.len() != 2 {
        return text.to_string();
    }

    let left = deduplicate_team_side(sides[0]);
    let right = deduplicate_team_side(sides[1]);

    format!("{} {} vs {}", date_time, left, right)
}

/// Drop a repeated word block from one side of the "vs" split.
///
/// Scans candidate split points from shortest to longest and takes the
/// first exact block duplicate, which favors under-trimming over
/// mangling a genuinely long team name. Falls back to excising a
/// reappearance of the side's 2-3 word prefix further along.
fn deduplicate_team_side(side: &str) -> String {
    let words: Vec<&str> = side.split_whitespace().collect();
    if words.len() < 4 {
        return side.trim().to_string();
    }

    // Exact block duplicate: words[0..k] repeated verbatim at words[k..2k]
    for k in 2..words.len() {
        if 2 * k > words.len() {
            break;
        }
        if block_eq(&words[0..k], &words[k..2 * k]) {
            let mut kept: Vec<&str> = words[0..k].to_vec();
            kept.extend_from_slice(&words[2 * k..]);
            return kept.join(" ");
        }
    }

    // Looser check: does a short prefix reappear later in the same side?
    for prefix_len in [3usize, 2] {
        if words.len() <= prefix_len {
            continue;
        }
        let prefix = &words[0..prefix_len];
        for start in prefix_len..=(words.len() - prefix_len) {
            if block_eq(prefix, &words[start..start + prefix_len]) {
                let mut kept: Vec<&str> = words[0..start].to_vec();
                kept.extend_from_slice(&words[start + prefix_len..]);
                return kept.join(" ");
            }
        }
    }

    side.trim().to_string()
}

fn block_eq(a: &[&str], b: &[&str]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.eq_ignore_ascii_case(y))
}
