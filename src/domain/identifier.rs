use chrono::{DateTime, Datelike, Local, TimeZone, Utc};
use regex::Regex;
use std::fmt;

/// Placeholder initials for names that don't split into a first and last token.
pub const UNKNOWN_INITIALS: &str = "XX";

/// Derive the two-letter initials used in submission ids and protocol codes.
///
/// Takes the first character of the first and last whitespace-separated
/// tokens, upper-cased. Names with fewer than two tokens yield `XX`.
pub fn initials(full_name: &str) -> String {
    let tokens: Vec<&str> = full_name.split_whitespace().collect();
    if tokens.len() < 2 {
        return UNKNOWN_INITIALS.to_string();
    }

    let first = tokens[0].chars().next();
    let last = tokens[tokens.len() - 1].chars().next();
    match (first, last) {
        (Some(f), Some(l)) => format!("{}{}", f, l).to_uppercase(),
        _ => UNKNOWN_INITIALS.to_string(),
    }
}

/// A submission identifier of the form `PREFIX_YYYY_NNNNN_SR_XX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionId {
    pub prefix: String,
    pub year: i32,
    pub sequence: u32,
    pub initials: String,
}

impl SubmissionId {
    pub fn new(prefix: &str, year: i32, sequence: u32, initials: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            year,
            sequence,
            initials: initials.to_string(),
        }
    }

    pub fn parse(id: &str, prefix: &str) -> Option<Self> {
        let pattern = format!(
            r"^{}_(\d{{4}})_(\d{{5}})_SR_([A-Z]{{2}})$",
            regex::escape(prefix)
        );
        let caps = Regex::new(&pattern).ok()?.captures(id)?;
        Some(Self {
            prefix: prefix.to_string(),
            year: caps[1].parse().ok()?,
            sequence: caps[2].parse().ok()?,
            initials: caps[3].to_string(),
        })
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{:05}_SR_{}",
            self.prefix, self.year, self.sequence, self.initials
        )
    }
}

/// Calendar year of `instant` as observed in `tz`.
pub fn year_at<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> i32 {
    instant.with_timezone(tz).year()
}

/// Intake year on the server's local calendar.
pub fn current_year() -> i32 {
    year_at(Utc::now(), &Local)
}

/// Extract the numeric sequence segment from an identifier, if it has one.
pub fn sequence_of(id: &str, prefix: &str) -> Option<u32> {
    SubmissionId::parse(id, prefix).map(|s| s.sequence)
}

/// Next free sequence number given every identifier already issued for a year.
///
/// Callers must hold whatever lock or transaction makes the read and the
/// subsequent insert atomic.
pub fn next_sequence<'a, I>(existing_ids: I, prefix: &str) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    existing_ids
        .into_iter()
        .filter_map(|id| sequence_of(id, prefix))
        .max()
        .unwrap_or(0)
        + 1
}

/// Anchored pattern a protocol code must satisfy for a given investigator.
pub fn protocol_code_pattern(prefix: &str, principal_investigator: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"^{}_\d{{4}}_\d{{5}}_SR_{}$",
        regex::escape(prefix),
        regex::escape(&initials(principal_investigator))
    ))
}

/// Candidate the admin view starts from before an operator edits it.
pub fn suggested_protocol_code(prefix: &str, year: i32, principal_investigator: &str) -> String {
    SubmissionId::new(prefix, year, 1, &initials(principal_investigator)).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    #[test]
    fn test_initials_first_and_last_token() {
        assert_eq!(initials("Jane Doe"), "JD");
        assert_eq!(initials("  maria clara de la cruz "), "MC");
        assert_eq!(initials("Juan   Dela"), "JD");
    }

    #[test]
    fn test_initials_single_token_falls_back() {
        assert_eq!(initials("Madonna"), "XX");
        assert_eq!(initials(""), "XX");
        assert_eq!(initials("   "), "XX");
    }

    #[test]
    fn test_submission_id_format() {
        let id = SubmissionId::new("SPUP", 2025, 1, "JD");
        assert_eq!(id.to_string(), "SPUP_2025_00001_SR_JD");

        let id = SubmissionId::new("SPUP", 2025, 12345, "AB");
        assert_eq!(id.to_string(), "SPUP_2025_12345_SR_AB");
    }

    #[test]
    fn test_submission_id_parse() {
        let id = SubmissionId::parse("SPUP_2024_00042_SR_KC", "SPUP").unwrap();
        assert_eq!(id.year, 2024);
        assert_eq!(id.sequence, 42);
        assert_eq!(id.initials, "KC");

        assert!(SubmissionId::parse("SPUP_2024_42_SR_KC", "SPUP").is_none());
        assert!(SubmissionId::parse("OTHER_2024_00042_SR_KC", "SPUP").is_none());
    }

    #[test]
    fn test_sequence_of_requires_whole_identifier() {
        assert_eq!(sequence_of("SPUP_2025_00003_SR_JD", "SPUP"), Some(3));
        assert_eq!(sequence_of("xSPUP_2025_00003_SR_JD", "SPUP"), None);
        assert_eq!(sequence_of("SPUP_2025_00003_SR_JD.bak", "SPUP"), None);
    }

    #[test]
    fn test_next_sequence_starts_at_one() {
        let none: Vec<&str> = Vec::new();
        assert_eq!(next_sequence(none, "SPUP"), 1);
    }

    #[test]
    fn test_next_sequence_exceeds_max() {
        let ids = [
            "SPUP_2025_00003_SR_JD",
            "SPUP_2025_00011_SR_AB",
            "SPUP_2025_00007_SR_XX",
            "garbage",
        ];
        assert_eq!(next_sequence(ids, "SPUP"), 12);
    }

    #[test]
    fn test_protocol_code_pattern_uses_investigator_initials() {
        let re = protocol_code_pattern("SPUP", "Jane Doe").unwrap();
        assert!(re.is_match("SPUP_2025_00001_SR_JD"));
        assert!(!re.is_match("SPUP_2025_00001_SR_AB"));
        assert!(!re.is_match("xSPUP_2025_00001_SR_JD"));
        assert!(!re.is_match("SPUP_2025_00001_SR_JDx"));
    }

    #[test]
    fn test_suggested_protocol_code() {
        assert_eq!(
            suggested_protocol_code("SPUP", 2026, "Ana Reyes"),
            "SPUP_2026_00001_SR_AR"
        );
    }

    #[test]
    fn test_year_follows_local_calendar() {
        let new_years_eve = Utc.with_ymd_and_hms(2024, 12, 31, 16, 30, 0).unwrap();
        let manila = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(year_at(new_years_eve, &manila), 2025);
        assert_eq!(year_at(new_years_eve, &Utc), 2024);
    }
}
