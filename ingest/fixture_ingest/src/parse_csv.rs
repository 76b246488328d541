use crate::types::ParsedFixtureLine;
use std::collections::HashMap;

/// Read a CSV export into header → value maps, one per record. Empty
/// cells are dropped so downstream lookups see `None` rather than "".
pub fn parse_csv_rows(data: &str) -> Result<Vec<HashMap<String, String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data.as_bytes());
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = HashMap::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            if !header.trim().is_empty() && !value.trim().is_empty() {
                row.insert(header.trim().to_string(), value.trim().to_string());
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Look a field up by header keyword: exact (case-insensitive) header
/// match first, then substring containment. Contact columns never win
/// the containment pass, "Home Team Contact 1" must not shadow "Team".
fn header_value<'a>(row: &'a HashMap<String, String>, keywords: &[&str]) -> Option<&'a str> {
    for keyword in keywords {
        if let Some(value) = row
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(keyword))
            .map(|(_, value)| value.as_str())
        {
            return Some(value);
        }
    }
    for keyword in keywords {
        if let Some(value) = row
            .iter()
            .find(|(key, _)| {
                let key = key.to_lowercase();
                key.contains(keyword) && !key.contains("contact")
            })
            .map(|(_, value)| value.as_str())
        {
            return Some(value);
        }
    }
    None
}

/// Map one spreadsheet row onto the shape the resolver consumes.
/// Referee and contact columns are folded into the instructions text so
/// the information survives without needing columns of their own.
pub fn row_to_parsed_line(row: &HashMap<String, String>) -> ParsedFixtureLine {
    let mut parsed = ParsedFixtureLine {
        team_text: header_value(row, &["team"]).map(str::to_string),
        opposition_text: header_value(row, &["opposition", "opponent"]).map(str::to_string),
        home_away_text: header_value(row, &["home/away", "home or away", "h/a"])
            .map(str::to_string),
        venue_text: header_value(row, &["pitch", "venue", "location"]).map(str::to_string),
        competition_text: header_value(row, &["league", "division", "competition"])
            .map(str::to_string),
        competition_type: header_value(row, &["format"]).map(str::to_string),
        instructions_text: header_value(row, &["instruction"]).map(str::to_string),
        ..Default::default()
    };

    let date = header_value(row, &["date"]);
    let time = header_value(row, &["time", "ko", "kick off", "kick-off"]);
    parsed.raw_datetime_text = match (date, time) {
        (Some(date), Some(time)) => Some(format!("{} {}", date, time)),
        (Some(date), None) => Some(date.to_string()),
        (None, Some(time)) => Some(time.to_string()),
        (None, None) => None,
    };

    if parsed.instructions_text.is_none() {
        let mut extras: Vec<String> = row
            .iter()
            .filter(|(key, _)| {
                let key = key.to_lowercase();
                ["referee", "contact", "manager", "mobile"]
                    .iter()
                    .any(|w| key.contains(w))
            })
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect();
        if !extras.is_empty() {
            extras.sort();
            parsed.instructions_text = Some(extras.join("; "));
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_csv_drops_empty_cells() {
        let rows = parse_csv_rows(
            "Team,Opposition,Date,Time,Home/Away,Pitch\n\
             U9 Red,Hove Rivervale,26/11/2023,11:00,Away,\n",
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Team").map(String::as_str), Some("U9 Red"));
        assert_eq!(rows[0].get("Pitch"), None);
    }

    #[test]
    fn test_row_to_parsed_line_maps_headers() {
        let rows = parse_csv_rows(
            "Team,Opposition,Date,KO Time,Home/Away,Venue,League\n\
             U14 White,Clinical Training FC,28/09/2025,14:00,Home,Withdean 3G,Autumn Group B\n",
        )
        .unwrap();
        let parsed = row_to_parsed_line(&rows[0]);

        assert_eq!(parsed.team_text.as_deref(), Some("U14 White"));
        assert_eq!(
            parsed.opposition_text.as_deref(),
            Some("Clinical Training FC")
        );
        assert_eq!(parsed.home_away_text.as_deref(), Some("Home"));
        assert_eq!(parsed.venue_text.as_deref(), Some("Withdean 3G"));
        assert_eq!(parsed.competition_text.as_deref(), Some("Autumn Group B"));
        assert_eq!(
            parsed.raw_datetime_text.as_deref(),
            Some("28/09/2025 14:00")
        );
    }

    #[test]
    fn test_contact_columns_do_not_shadow_team() {
        let rows = parse_csv_rows(
            "Team,Opposition,Date,Home Team Contact 1\n\
             U9 Red,Hove Rivervale,26/11/2023,Jane 07700 900000\n",
        )
        .unwrap();
        let parsed = row_to_parsed_line(&rows[0]);

        assert_eq!(parsed.team_text.as_deref(), Some("U9 Red"));
        assert_eq!(
            parsed.instructions_text.as_deref(),
            Some("Home Team Contact 1: Jane 07700 900000")
        );
    }

    #[test]
    fn test_missing_columns_yield_none() {
        let rows = parse_csv_rows("Opposition,Date\nHove Rivervale,26/11/2023\n").unwrap();
        let parsed = row_to_parsed_line(&rows[0]);

        assert_eq!(parsed.team_text, None);
        assert_eq!(parsed.home_away_text, None);
        assert_eq!(parsed.raw_datetime_text.as_deref(), Some("26/11/2023"));
    }
}
