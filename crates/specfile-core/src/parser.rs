//! Scan parser
//!
//! A scan is read as a small state machine over its lines:
//!
//! - `#S` starts the scan (number, type, command)
//! - header lines (`#P`, `#C`, `#D`, anything else) until `#L`
//! - `#L` gives the column labels
//! - untagged lines are data rows until the next control line or end of file
//!
//! Motor positions are bound against the registry's motor list, and the data
//! columns against the labels. A width mismatch is an error, never padded.

use crate::lines::{Line, LineCursor, MappedFile};
use crate::registry::MotorRegistry;
use crate::scan::{Binding, DataMatrix, ScanHeader, ScanRecord};
use crate::types::*;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{instrument, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    HeaderFields,
    Labels,
    Data,
    Done,
}

/// Accumulates one scan while its lines are consumed
struct ScanBuilder<'r> {
    registry: &'r MotorRegistry,
    header: ScanHeader,
    motors: Vec<(String, f64)>,
    /// Number of `#P` values seen so far in this scan
    positions_seen: usize,
    rows: Vec<Vec<f64>>,
    warnings: Vec<ParseWarning>,
}

impl<'r> ScanBuilder<'r> {
    /// Parse the `#S` line
    fn start(line: &Line<'_>, registry: &'r MotorRegistry) -> Result<Self> {
        let malformed = |reason: &str| SpecError::MalformedScanHeader {
            offset: line.offset,
            reason: reason.to_string(),
        };

        if !line.starts_with(SCAN_START_TAG) {
            return Err(malformed("not a scan-start line"));
        }

        let text = line.text();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let scan_no = tokens
            .get(1)
            .and_then(|t| t.parse::<u32>().ok())
            .ok_or_else(|| malformed("missing or invalid scan number"))?;

        let header = ScanHeader {
            scan_no,
            scan_type: tokens.get(2).map(|s| s.to_string()).unwrap_or_default(),
            scan_cmd: tokens.get(2..).map(|t| t.join(" ")).unwrap_or_default(),
            text: line.raw_text().into_owned(),
            ..Default::default()
        };

        Ok(Self {
            registry,
            header,
            motors: Vec::new(),
            positions_seen: 0,
            rows: Vec::new(),
            warnings: Vec::new(),
        })
    }

    /// Handle one line in the given state, returning the next state
    fn feed(&mut self, state: State, line: &Line<'_>) -> Result<State> {
        match state {
            State::HeaderFields => self.header_line(line),
            State::Labels => {
                self.header.text.push_str(&line.raw_text());
                self.header.labels = line
                    .after(LABEL_TAG.len() + 1)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                Ok(State::Data)
            }
            State::Data => self.data_line(line),
            State::Done => Ok(State::Done),
        }
    }

    fn header_line(&mut self, line: &Line<'_>) -> Result<State> {
        if line.starts_with(LABEL_TAG) {
            return Ok(State::Labels);
        }
        if line.starts_with(SCAN_TAG) {
            return Ok(State::Done);
        }

        self.header.text.push_str(&line.raw_text());

        if line.starts_with(POSITION_TAG) {
            self.positions(line)?;
        } else if line.starts_with(COMMENT_TAG) {
            self.comment(line);
        } else if line.starts_with(DATE_TAG) {
            self.date(line);
        }
        Ok(State::HeaderFields)
    }

    fn data_line(&mut self, line: &Line<'_>) -> Result<State> {
        if line.starts_with(COMMENT_TAG) {
            self.header.text.push_str(&line.raw_text());
            self.comment(line);
            return Ok(State::Data);
        }
        if line.is_control() {
            return Ok(State::Done);
        }

        let text = line.text();
        let row = text
            .split_whitespace()
            .map(|token| self.number(line, token))
            .collect::<Result<Vec<f64>>>()?;

        if !row.is_empty() {
            trace!(line = line.number, values = row.len(), "Data row");
            self.rows.push(row);
        }
        Ok(State::Data)
    }

    /// Bind `#P` values to the next unused motor names
    ///
    /// Tokens past the last registered motor are kept as warnings and never
    /// parsed.
    fn positions(&mut self, line: &Line<'_>) -> Result<()> {
        let registry = self.registry;
        let text = line.text();
        for token in text.split_whitespace().skip(1) {
            let index = self.positions_seen;
            self.positions_seen += 1;

            match registry.motors().get(index) {
                Some(name) => {
                    let value = self.number(line, token)?;
                    self.motors.push((name.clone(), value));
                }
                None => {
                    warn!(
                        scan = self.header.scan_no,
                        index,
                        value = token,
                        "More motor positions than motors declared in the file header, value dropped"
                    );
                    self.warnings.push(ParseWarning::MotorOverflow {
                        index,
                        value: token.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn comment(&mut self, line: &Line<'_>) {
        let text = line.after(COMMENT_TAG.len());
        self.header.comments.push_str(text.trim());
        self.header.comments.push('\n');
    }

    fn date(&mut self, line: &Line<'_>) {
        let date = line.after(DATE_TAG.len()).trim().to_string();
        match NaiveDateTime::parse_from_str(&date, DATE_FORMAT) {
            Ok(ts) => self.header.timestamp = Some(ts),
            Err(e) => {
                warn!(scan = self.header.scan_no, date = %date, error = %e, "Unparseable scan date");
                self.warnings.push(ParseWarning::InvalidDate(date.clone()));
            }
        }
        self.header.date = date;
    }

    fn number(&self, line: &Line<'_>, token: &str) -> Result<f64> {
        token.parse::<f64>().map_err(|_| SpecError::MalformedDataLine {
            scan: self.header.scan_no,
            line: line.number,
            token: token.to_string(),
        })
    }

    /// Check widths and bind labels
    fn finish(self, registry: Arc<MotorRegistry>) -> Result<ScanRecord> {
        let scan = self.header.scan_no;
        let labels = self.header.labels.len();

        if let Some(bad) = self.rows.iter().find(|r| r.len() != labels) {
            return Err(SpecError::ColumnMismatch {
                scan,
                labels,
                columns: bad.len(),
            });
        }

        let mut bindings: HashMap<String, Binding> = self
            .motors
            .iter()
            .map(|(name, v)| (name.clone(), Binding::Scalar(*v)))
            .collect();

        // Without data rows labels fall back to the header positions above
        if !self.rows.is_empty() {
            for (i, label) in self.header.labels.iter().enumerate() {
                bindings.insert(label.clone(), Binding::Column(i));
            }
        }

        Ok(ScanRecord {
            header: self.header,
            data: DataMatrix::from_rows(self.rows),
            motors: self.motors,
            bindings,
            warnings: self.warnings,
            registry,
        })
    }
}

/// Parse the scan whose `#S` line starts at `offset` in `data`
pub fn parse_scan_bytes(
    data: &[u8],
    offset: u64,
    registry: Arc<MotorRegistry>,
) -> Result<ScanRecord> {
    let start = usize::try_from(offset)
        .ok()
        .filter(|&o| o < data.len())
        .ok_or_else(|| SpecError::MalformedScanHeader {
            offset,
            reason: "offset beyond end of file".to_string(),
        })?;

    let mut cursor = LineCursor::at(data, start);
    let first = cursor.next_line().ok_or_else(|| SpecError::MalformedScanHeader {
        offset,
        reason: "offset beyond end of file".to_string(),
    })?;

    let mut builder = ScanBuilder::start(&first, &registry)?;
    let mut state = State::HeaderFields;

    while state != State::Done {
        let Some(line) = cursor.next_line() else {
            break;
        };
        state = builder.feed(state, &line)?;
        if state == State::Labels {
            state = builder.feed(state, &line)?;
        }
    }

    builder.finish(Arc::clone(&registry))
}

/// Open `path`, parse the scan at `offset`, close the file
#[instrument(skip_all, fields(path = %path.as_ref().display(), offset = offset))]
pub fn parse_scan<P: AsRef<Path>>(
    path: P,
    offset: u64,
    registry: Arc<MotorRegistry>,
) -> Result<ScanRecord> {
    let mapped = MappedFile::open(path.as_ref())?;
    parse_scan_bytes(mapped.bytes(), offset, registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(preamble: &[u8]) -> Arc<MotorRegistry> {
        Arc::new(MotorRegistry::from_bytes(preamble))
    }

    fn parse(data: &str, registry: Arc<MotorRegistry>) -> Result<ScanRecord> {
        parse_scan_bytes(data.as_bytes(), 0, registry)
    }

    const SCAN: &str = "#S 298  ascan  tth 58 62 4 1\n\
#D Sat Jan 14 12:34:56 2017\n\
#T 1  (Seconds)\n\
#G0 0 0 1\n\
#P0 60.5 30.25\n\
#C first note\n\
#L TwoTheta  ChT_REIXS  I0_BD3\n\
58 100 10\n\
59 110 10\n\
\n\
60 120 11\n\
#C aborted\n\
61 130 11\n\
62 140 12\n\
#S 299 ascan tth 0 1 1 1\n";

    #[test]
    fn test_full_scan() {
        let record = parse(SCAN, registry(b"#O0 TwoTheta Theta\n#o0 tth th\n")).unwrap();

        assert_eq!(record.header.scan_no, 298);
        assert_eq!(record.header.scan_type, "ascan");
        assert_eq!(record.header.scan_cmd, "ascan tth 58 62 4 1");
        assert_eq!(record.labels(), &["TwoTheta", "ChT_REIXS", "I0_BD3"]);
        assert_eq!(record.header.comments, "first note\naborted\n");
        assert_eq!(record.header.date, "Sat Jan 14 12:34:56 2017");
        assert!(record.header.timestamp.is_some());
        assert!(record.header.text.contains("#G0 0 0 1\n"));
        assert!(record.header.text.starts_with("#S 298"));

        assert_eq!((record.data.rows(), record.data.columns()), (5, 3));
        assert_eq!(
            record.column("ChT_REIXS"),
            Some(&[100.0, 110.0, 120.0, 130.0, 140.0][..])
        );
        assert_eq!(record.scalar("Theta"), Some(30.25));
        assert!(record.warnings.is_empty());
    }

    #[test]
    fn test_data_column_shadows_motor_scalar() {
        let record = parse(SCAN, registry(b"#O0 TwoTheta Theta\n#o0 tth th\n")).unwrap();

        assert_eq!(record.get("TwoTheta").unwrap().len(), 5);
        assert_eq!(record.get("Theta").unwrap().as_scalar(), Some(30.25));
        assert_eq!(record.scalar_names(), vec!["Theta"]);
        assert_eq!(record.vector_names(), vec!["TwoTheta", "ChT_REIXS", "I0_BD3"]);
    }

    #[test]
    fn test_motor_overflow_is_not_fatal() {
        let data = "#S 1 ascan m 0 1 1 1\n#P0 1.5 2.5 3.5\n#L M det\n0 1\n";
        let record = parse(data, registry(b"#O0 Motor\n#o0 m\n")).unwrap();

        assert_eq!(record.scalar("Motor"), Some(1.5));
        let overflows: Vec<_> = record
            .warnings
            .iter()
            .filter(|w| matches!(w, ParseWarning::MotorOverflow { .. }))
            .collect();
        assert_eq!(overflows.len(), 2);
        assert_eq!(
            record.warnings[0],
            ParseWarning::MotorOverflow {
                index: 1,
                value: "2.5".to_string()
            }
        );
    }

    #[test]
    fn test_surplus_position_is_not_parsed() {
        let data = "#S 1 ascan m 0 1 1 1\n#P0 1.5 n/a\n#L M det\n0 1\n";
        let record = parse(data, registry(b"#O0 Motor\n#o0 m\n")).unwrap();

        assert_eq!(record.scalar("Motor"), Some(1.5));
        assert_eq!(
            record.warnings,
            vec![ParseWarning::MotorOverflow {
                index: 1,
                value: "n/a".to_string()
            }]
        );
        assert_eq!(record.data.rows(), 1);
    }

    #[test]
    fn test_bound_position_must_be_numeric() {
        let data = "#S 1 ascan m 0 1 1 1\n#P0 n/a\n#L M det\n0 1\n";
        let result = parse(data, registry(b"#O0 Motor\n#o0 m\n"));

        assert!(matches!(
            result,
            Err(SpecError::MalformedDataLine { scan: 1, line: 2, ref token }) if token == "n/a"
        ));
    }

    #[test]
    fn test_positions_continue_across_lines() {
        let data = "#S 1 ascan a 0 1 1 1\n#P0 1 2\n#P1 3\n#L A\n";
        let record = parse(data, registry(b"#O0 A B\n#O1 C\n")).unwrap();

        assert_eq!(record.scalar("A"), Some(1.0));
        assert_eq!(record.scalar("B"), Some(2.0));
        assert_eq!(record.scalar("C"), Some(3.0));
    }

    #[test]
    fn test_column_mismatch() {
        let data = "#S 5 ascan a 0 1 1 1\n#L A B C\n1 2\n3 4\n";
        let err = parse(data, registry(b"")).unwrap_err();

        assert!(matches!(
            err,
            SpecError::ColumnMismatch { scan: 5, labels: 3, columns: 2 }
        ));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let data = "#S 5 ascan a 0 1 1 1\n#L A B\n1 2\n3\n";
        assert!(matches!(
            parse(data, registry(b"")),
            Err(SpecError::ColumnMismatch { columns: 1, .. })
        ));
    }

    #[test]
    fn test_malformed_data_line() {
        let data = "#S 5 ascan a 0 1 1 1\n#L A B\n1 2\n3 oops\n";
        let err = parse(data, registry(b"")).unwrap_err();

        assert!(matches!(
            err,
            SpecError::MalformedDataLine { scan: 5, line: 4, ref token } if token == "oops"
        ));
    }

    #[test]
    fn test_scalar_only_scan() {
        let data = "#S 7 ascan a 0 1 1 1\n#P0 4.0 5.0\n#L A B Unbound\n#S 8 ascan\n";
        let record = parse(data, registry(b"#O0 A B\n")).unwrap();

        assert!(record.data.is_empty());
        assert_eq!(record.get("A").and_then(|c| c.as_scalar()), Some(4.0));
        assert_eq!(record.get("B").and_then(|c| c.as_scalar()), Some(5.0));
        assert!(record.get("Unbound").is_none());
    }

    #[test]
    fn test_other_control_line_ends_data() {
        let data = "#S 1 ascan a 0 1 1 1\n#L A\n1\n2\n#X trailing\n3\n";
        let record = parse(data, registry(b"")).unwrap();
        assert_eq!(record.data.rows(), 2);
    }

    #[test]
    fn test_header_without_labels_stops_at_next_scan() {
        let data = "#S 1 ascan a 0 1 1 1\n#C nothing here\n#S 2 ascan a 0 1 1 1\n#L A\n1\n";
        let record = parse(data, registry(b"")).unwrap();

        assert!(record.labels().is_empty());
        assert!(record.data.is_empty());
        assert!(!record.header.text.contains("#S 2"));
    }

    #[test]
    fn test_invalid_date_is_warning() {
        let data = "#S 1 ascan a 0 1 1 1\n#D yesterday\n#L A\n1\n";
        let record = parse(data, registry(b"")).unwrap();

        assert_eq!(record.header.timestamp, None);
        assert_eq!(
            record.warnings,
            vec![ParseWarning::InvalidDate("yesterday".into())]
        );
    }

    #[test]
    fn test_single_digit_day() {
        let data = "#S 1 ascan a 0 1 1 1\n#D Sat Jan  7 08:00:00 2017\n#L A\n1\n";
        let record = parse(data, registry(b"")).unwrap();
        assert!(record.header.timestamp.is_some());
    }

    #[test]
    fn test_bad_offset() {
        let data = "#S 1 ascan\n#L A\n1\n";
        assert!(matches!(
            parse_scan_bytes(data.as_bytes(), 3, registry(b"")),
            Err(SpecError::MalformedScanHeader { offset: 3, .. })
        ));
        assert!(matches!(
            parse_scan_bytes(data.as_bytes(), 500, registry(b"")),
            Err(SpecError::MalformedScanHeader { .. })
        ));
    }
}
