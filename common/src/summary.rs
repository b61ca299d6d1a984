//! Parsing of the robocopy summary block
//!
//! With `/bytes` robocopy ends its report with a table like:
//!
//! ```text
//!                Total    Copied   Skipped  Mismatch    FAILED    Extras
//!     Dirs :         5         1         4         0         0         0
//!    Files :        12         3         9         0         0         1
//!    Bytes :     40960      8192     32768         0         0       512
//!    Times :   0:00:02   0:00:01                       0:00:00   0:00:00
//! ```
//!
//! Each row is parsed into a [`SummaryRecord`]. The Times row has no Skipped or Mismatch
//! columns, so its record keeps those slots at zero.

use std::sync::LazyLock;

use enum_map::{Enum, EnumMap};

pub const COUNT_UNITS: [&str; 4] = ["", "K", "M", "B"];
pub const COUNT_DIVISOR: u64 = 1000;
pub const BYTE_UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
pub const BYTE_DIVISOR: u64 = 1024;

const COUNT_FIELD: &str = r"(\d+)\b";
const DURATION_FIELD: &str = r"(\d+(?::\d+)*)\b";
const BLANK_FIELD: &str = r"(\s*)";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid duration '{0}', expected hours:minutes:seconds")]
    InvalidDuration(String),
    #[error("invalid count '{0}'")]
    InvalidCount(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum Category {
    Dirs,
    Files,
    Bytes,
    Times,
}

impl Category {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Category::Dirs => "Dirs",
            Category::Files => "Files",
            Category::Bytes => "Bytes",
            Category::Times => "Times",
        }
    }

    fn line_pattern(self) -> String {
        let fields = match self {
            Category::Times => [
                DURATION_FIELD,
                DURATION_FIELD,
                BLANK_FIELD,
                BLANK_FIELD,
                DURATION_FIELD,
                DURATION_FIELD,
            ],
            _ => [COUNT_FIELD; 6],
        };
        format!(r"^\s*{}\s*:\s*{}.*$", self.label(), fields.join(r"\s*"))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

static LINE_PATTERNS: LazyLock<EnumMap<Category, regex::Regex>> = LazyLock::new(|| {
    EnumMap::from_fn(|category: Category| {
        regex::Regex::new(&category.line_pattern()).expect("summary line pattern must compile")
    })
});

/// One row of the summary table
///
/// For [`Category::Times`] the slots hold seconds and `skipped`/`mismatch` are unused.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SummaryRecord {
    pub total: u64,
    pub copied: u64,
    pub skipped: u64,
    pub mismatch: u64,
    pub failed: u64,
    pub extras: u64,
}

impl SummaryRecord {
    fn from_counts(fields: [&str; 6]) -> Result<Self, ParseError> {
        let count = |text: &str| {
            text.parse::<u64>()
                .map_err(|_| ParseError::InvalidCount(text.to_string()))
        };
        Ok(Self {
            total: count(fields[0])?,
            copied: count(fields[1])?,
            skipped: count(fields[2])?,
            mismatch: count(fields[3])?,
            failed: count(fields[4])?,
            extras: count(fields[5])?,
        })
    }

    fn from_times(fields: [&str; 6]) -> Result<Self, ParseError> {
        Ok(Self {
            total: parse_duration(fields[0])?,
            copied: parse_duration(fields[1])?,
            skipped: 0,
            mismatch: 0,
            failed: parse_duration(fields[4])?,
            extras: parse_duration(fields[5])?,
        })
    }

    /// Render all six slots with the given unit ladder
    #[must_use]
    pub fn format_counts(&self, units: &[&str], divisor: u64) -> String {
        let scale = |value| scale_integer(value, units, divisor);
        format!(
            "Total: {}, Copied: {}, Skipped: {}, Mismatch: {}, Failed: {}, Extras: {}",
            scale(self.total),
            scale(self.copied),
            scale(self.skipped),
            scale(self.mismatch),
            scale(self.failed),
            scale(self.extras)
        )
    }

    /// Render the four timed slots as durations
    #[must_use]
    pub fn format_times(&self) -> String {
        format!(
            "Total: {}, Copied: {}, Failed: {}, Extras: {}",
            format_duration(self.total),
            format_duration(self.copied),
            format_duration(self.failed),
            format_duration(self.extras)
        )
    }
}

/// All four rows of the summary table
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub records: EnumMap<Category, SummaryRecord>,
}

impl Summary {
    #[must_use]
    pub fn dirs(&self) -> &SummaryRecord {
        &self.records[Category::Dirs]
    }

    #[must_use]
    pub fn files(&self) -> &SummaryRecord {
        &self.records[Category::Files]
    }

    #[must_use]
    pub fn bytes(&self) -> &SummaryRecord {
        &self.records[Category::Bytes]
    }

    #[must_use]
    pub fn times(&self) -> &SummaryRecord {
        &self.records[Category::Times]
    }

    /// Human readable rendering of one row
    #[must_use]
    pub fn format(&self, category: Category) -> String {
        let record = &self.records[category];
        match category {
            Category::Dirs | Category::Files => record.format_counts(&COUNT_UNITS, COUNT_DIVISOR),
            Category::Bytes => record.format_counts(&BYTE_UNITS, BYTE_DIVISOR),
            Category::Times => record.format_times(),
        }
    }

    /// One log line per category, in table order
    #[must_use]
    pub fn report_lines(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|(category, _)| format!("{}: {}", category, self.format(category)))
            .collect()
    }
}

/// Parse the summary table out of robocopy's stdout
///
/// A category whose row is absent is left zeroed; only a malformed field is an error.
///
/// # Errors
///
/// Returns [`ParseError`] if a matched row contains a duration without exactly three
/// components or a count that does not fit into `u64`.
pub fn parse_summary(stdout: &str) -> Result<Summary, ParseError> {
    let mut summary = Summary::default();
    for (category, pattern) in LINE_PATTERNS.iter() {
        let Some(captures) = stdout.lines().find_map(|line| pattern.captures(line)) else {
            tracing::debug!("no {} line in tool output", category);
            continue;
        };
        let field = |idx: usize| captures.get(idx).map_or("", |m| m.as_str());
        let fields = [field(1), field(2), field(3), field(4), field(5), field(6)];
        summary.records[category] = match category {
            Category::Times => SummaryRecord::from_times(fields)?,
            _ => SummaryRecord::from_counts(fields)?,
        };
    }
    Ok(summary)
}

/// Convert `hours:minutes:seconds` into seconds
///
/// # Errors
///
/// Returns [`ParseError::InvalidDuration`] unless the text has exactly three numeric
/// components.
pub fn parse_duration(text: &str) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidDuration(text.to_string());
    let components = text
        .split(':')
        .map(|part| part.trim().parse::<u64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    let &[hours, minutes, seconds] = components.as_slice() else {
        return Err(invalid());
    };
    hours
        .checked_mul(3600)
        .and_then(|total| total.checked_add(minutes.checked_mul(60)?))
        .and_then(|total| total.checked_add(seconds))
        .ok_or_else(invalid)
}

/// Render seconds as `HH:MM:SS`, with a `<days>.` prefix once a day is reached
#[must_use]
pub fn format_duration(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3600;
    let minutes = seconds % 3600 / 60;
    let seconds = seconds % 60;
    if days > 0 {
        format!("{}.{:02}:{:02}:{:02}", days, hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Scale `value` down the unit ladder
///
/// The value moves to the next unit only while it is at least five times `divisor`, so 4999
/// stays as "4999 " with the count ladder while 5000 becomes "5 K". The last unit absorbs
/// everything larger.
#[must_use]
pub fn scale_integer(value: u64, units: &[&str], divisor: u64) -> String {
    let Some((last, smaller)) = units.split_last() else {
        return value.to_string();
    };
    let threshold = divisor.saturating_mul(5);
    let mut value = value;
    for unit in smaller {
        if value < threshold || divisor == 0 {
            return format!("{} {}", value, unit);
        }
        value /= divisor;
    }
    format!("{} {}", value, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ROBOCOPY_OUTPUT: &str = "
-------------------------------------------------------------------------------

               Total    Copied   Skipped  Mismatch    FAILED    Extras
    Dirs :         5         1         4         0         0         0
   Files :     12000      6000      6000         0         0         1
   Bytes :  10485760   5242880   5242880         0         0       512
   Times :   1:02:03   0:00:10                       0:00:00   0:00:01

   Ended : Sunday, October 18, 2026 10:00:00 AM
";

    #[test]
    fn parses_full_summary() {
        let summary = parse_summary(ROBOCOPY_OUTPUT).unwrap();
        assert_eq!(
            *summary.dirs(),
            SummaryRecord {
                total: 5,
                copied: 1,
                skipped: 4,
                mismatch: 0,
                failed: 0,
                extras: 0,
            }
        );
        assert_eq!(summary.files().total, 12000);
        assert_eq!(summary.bytes().extras, 512);
        assert_eq!(
            *summary.times(),
            SummaryRecord {
                total: 3723,
                copied: 10,
                skipped: 0,
                mismatch: 0,
                failed: 0,
                extras: 1,
            }
        );
    }

    #[test]
    fn report_lines_are_scaled() {
        let summary = parse_summary(ROBOCOPY_OUTPUT).unwrap();
        assert_eq!(
            summary.report_lines(),
            vec![
                "Dirs: Total: 5 , Copied: 1 , Skipped: 4 , Mismatch: 0 , Failed: 0 , Extras: 0 ",
                "Files: Total: 12 K, Copied: 6 K, Skipped: 6 K, Mismatch: 0 , Failed: 0 , Extras: 1 ",
                "Bytes: Total: 10 MiB, Copied: 5 MiB, Skipped: 5 MiB, Mismatch: 0 B, Failed: 0 B, Extras: 512 B",
                "Times: Total: 01:02:03, Copied: 00:00:10, Failed: 00:00:00, Extras: 00:00:01",
            ]
        );
    }

    #[test]
    fn missing_categories_are_zeroed() {
        let summary = parse_summary("Files : 10 8 2 0 0 0").unwrap();
        assert_eq!(
            *summary.files(),
            SummaryRecord {
                total: 10,
                copied: 8,
                skipped: 2,
                ..Default::default()
            }
        );
        assert_eq!(*summary.dirs(), SummaryRecord::default());
        assert_eq!(*summary.bytes(), SummaryRecord::default());
        assert_eq!(*summary.times(), SummaryRecord::default());
    }

    #[test]
    fn empty_output_is_all_zero() {
        assert_eq!(parse_summary("").unwrap(), Summary::default());
    }

    #[test]
    fn first_matching_line_wins() {
        let text = "Dirs : 1 2 3 4 5 6\nDirs : 9 9 9 9 9 9\n";
        assert_eq!(parse_summary(text).unwrap().dirs().total, 1);
    }

    #[test]
    fn windows_line_endings() {
        let text = "   Dirs :  2  1  1  0  0  0\r\n   Files :  3  3  0  0  0  0\r\n";
        let summary = parse_summary(text).unwrap();
        assert_eq!(summary.dirs().total, 2);
        assert_eq!(summary.files().copied, 3);
    }

    #[test]
    fn lines_with_too_few_fields_are_ignored() {
        let summary = parse_summary("Dirs : 1 2\nFiles : x y z").unwrap();
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn short_times_row_is_not_split() {
        let summary = parse_summary("   Times :   0:00:02   0:00:01   0:00:00").unwrap();
        assert_eq!(*summary.times(), SummaryRecord::default());
    }

    #[test]
    fn short_count_row_is_not_split() {
        let summary = parse_summary("   Files :   10   8   2   0   11").unwrap();
        assert_eq!(*summary.files(), SummaryRecord::default());
    }

    #[test]
    fn malformed_times_field_is_an_error() {
        let text = "   Times :   0:00:01:02   0:00:10                       0:00:00   0:00:01";
        assert_eq!(
            parse_summary(text),
            Err(ParseError::InvalidDuration("0:00:01:02".to_string()))
        );
    }

    #[test]
    fn oversized_count_is_an_error() {
        let text = "Bytes : 99999999999999999999999 0 0 0 0 0";
        assert!(matches!(
            parse_summary(text),
            Err(ParseError::InvalidCount(_))
        ));
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration("01:02:03"), Ok(3723));
        assert_eq!(parse_duration("0:00:00"), Ok(0));
        assert_eq!(parse_duration("100:0:5"), Ok(360_005));
        assert_eq!(
            parse_duration("1:2:3:4"),
            Err(ParseError::InvalidDuration("1:2:3:4".to_string()))
        );
        assert!(parse_duration("1:2").is_err());
        assert!(parse_duration("a:b:c").is_err());
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(3723), "01:02:03");
        assert_eq!(format_duration(86_400 + 3723), "1.01:02:03");
    }

    #[test]
    fn scaling_boundaries() {
        assert_eq!(scale_integer(4999, &["", "K"], 1000), "4999 ");
        assert_eq!(scale_integer(5000, &["", "K"], 1000), "5 K");
        assert_eq!(scale_integer(1023, &["B", "KiB"], 1024), "1023 B");
        assert_eq!(scale_integer(5120, &["B", "KiB"], 1024), "5 KiB");
        assert_eq!(scale_integer(5119, &["B", "KiB"], 1024), "5119 B");
    }

    #[test]
    fn last_unit_absorbs_large_values() {
        assert_eq!(scale_integer(50_000_000, &["", "K"], 1000), "50000 K");
        assert_eq!(
            scale_integer(u64::MAX, &BYTE_UNITS, BYTE_DIVISOR),
            format!("{} GiB", u64::MAX / 1024 / 1024 / 1024)
        );
        assert_eq!(scale_integer(7_000_000, &COUNT_UNITS, COUNT_DIVISOR), "7 M");
        assert_eq!(scale_integer(70_000_000_000, &COUNT_UNITS, COUNT_DIVISOR), "70 B");
    }

    #[test]
    fn single_unit_never_scales() {
        assert_eq!(scale_integer(123_456, &["items"], 10), "123456 items");
        assert_eq!(scale_integer(42, &[], 10), "42");
    }

    proptest! {
        #[test]
        fn scaled_value_stays_below_threshold_unless_last_unit(value in any::<u64>()) {
            let rendered = scale_integer(value, &COUNT_UNITS, COUNT_DIVISOR);
            let (number, unit) = rendered.split_once(' ').unwrap();
            let number: u64 = number.parse().unwrap();
            if unit != "B" {
                prop_assert!(number < COUNT_DIVISOR * 5);
            }
            prop_assert!(number <= value);
        }

        #[test]
        fn duration_round_trip(hours in 0u64..1000, minutes in 0u64..60, seconds in 0u64..60) {
            let text = format!("{}:{:02}:{:02}", hours, minutes, seconds);
            prop_assert_eq!(parse_duration(&text), Ok(hours * 3600 + minutes * 60 + seconds));
        }
    }
}
