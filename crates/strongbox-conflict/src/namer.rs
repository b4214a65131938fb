//! Conflict naming for kept copies
//!
//! Generates file names for conflicted copies, following the pattern:
//! `filename (conflicted copy YYYY-MM-DD).ext`

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

/// Generates unique conflict file names
pub struct ConflictNamer;

impl ConflictNamer {
    /// Generates a conflict copy filename dated today (UTC)
    ///
    /// Given "report.md", produces something like:
    /// "report (conflicted copy 2026-02-07).md"
    pub fn generate(original_name: &str) -> String {
        Self::generate_on(original_name, Utc::now().date_naive())
    }

    /// Generates a conflict copy filename for a given date
    pub fn generate_on(original_name: &str, date: NaiveDate) -> String {
        Self::with_suffix(original_name, &format!("conflicted copy {}", date.format("%Y-%m-%d")))
    }

    fn with_suffix(original_name: &str, suffix: &str) -> String {
        match original_name.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => {
                let stem = &original_name[..dot_pos];
                let ext = &original_name[dot_pos..];
                format!("{stem} ({suffix}){ext}")
            }
            _ => format!("{original_name} ({suffix})"),
        }
    }

    /// Picks a conflict copy name for which `exists` returns false
    ///
    /// If the dated name is taken, appends an incrementing counter.
    pub fn generate_unique<F>(original_name: &str, exists: F) -> String
    where
        F: FnMut(&str) -> bool,
    {
        Self::generate_unique_on(original_name, Utc::now().date_naive(), exists)
    }

    pub fn generate_unique_on<F>(original_name: &str, date: NaiveDate, mut exists: F) -> String
    where
        F: FnMut(&str) -> bool,
    {
        let candidate = Self::generate_on(original_name, date);
        if !exists(&candidate) {
            return candidate;
        }

        let dated = format!("conflicted copy {}", date.format("%Y-%m-%d"));
        for i in 2..=99 {
            let numbered = Self::with_suffix(original_name, &format!("{dated} {i}"));
            if !exists(&numbered) {
                return numbered;
            }
        }

        // Last resort: short UUID
        let short_uuid = &Uuid::new_v4().simple().to_string()[..8];
        Self::with_suffix(original_name, &format!("{dated} {short_uuid}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 7).unwrap()
    }

    #[test]
    fn test_generate_with_extension() {
        let name = ConflictNamer::generate_on("report.md", date());
        assert_eq!(name, "report (conflicted copy 2026-02-07).md");
    }

    #[test]
    fn test_generate_without_extension() {
        let name = ConflictNamer::generate_on("Makefile", date());
        assert_eq!(name, "Makefile (conflicted copy 2026-02-07)");
    }

    #[test]
    fn test_generate_hidden_file() {
        let name = ConflictNamer::generate_on(".env", date());
        assert_eq!(name, ".env (conflicted copy 2026-02-07)");
    }

    #[test]
    fn test_generate_with_multiple_dots() {
        let name = ConflictNamer::generate_on("archive.tar.gz", date());
        assert_eq!(name, "archive.tar (conflicted copy 2026-02-07).gz");
    }

    #[test]
    fn test_generate_uses_today() {
        let name = ConflictNamer::generate("notes.txt");
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        assert!(name.contains(&today));
    }

    #[test]
    fn test_generate_unique_no_collision() {
        let name = ConflictNamer::generate_unique_on("test.txt", date(), |_| false);
        assert_eq!(name, "test (conflicted copy 2026-02-07).txt");
    }

    #[test]
    fn test_generate_unique_with_collision() {
        let taken = [
            "test (conflicted copy 2026-02-07).txt",
            "test (conflicted copy 2026-02-07 2).txt",
        ];
        let name = ConflictNamer::generate_unique_on("test.txt", date(), |n| taken.contains(&n));
        assert_eq!(name, "test (conflicted copy 2026-02-07 3).txt");
    }

    #[test]
    fn test_generate_unique_exhausted_falls_back() {
        let name = ConflictNamer::generate_unique_on("test.txt", date(), |_| true);
        assert!(name.starts_with("test (conflicted copy 2026-02-07 "));
        assert!(name.ends_with(").txt"));
    }
}
