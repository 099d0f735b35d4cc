//! Result Reporting.
//!
//! [`ReportAggregator`] keeps exactly one outcome per (leaf, phase,
//! character); re-recording replaces the earlier outcome. [`ReportWriter`]
//! writes delimited rows with a single header line.

use std::borrow::Cow;
use std::io::{self, Write};

use rowprobe_common::defaults::REPORT_NONE;

use crate::probe::ProbeOutcome;

/// Which pass produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Value supplied in the create request.
    Creation,
    /// Value written to an existing row.
    PostCreation,
}

/// Every outcome recorded for one leaf instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafFindings {
    pub leaf: String,
    creation: Vec<(char, ProbeOutcome)>,
    post_creation: Vec<(char, ProbeOutcome)>,
}

impl LeafFindings {
    fn new(leaf: &str) -> Self {
        Self {
            leaf: leaf.to_string(),
            ..Self::default()
        }
    }

    fn phase_mut(&mut self, phase: Phase) -> &mut Vec<(char, ProbeOutcome)> {
        match phase {
            Phase::Creation => &mut self.creation,
            Phase::PostCreation => &mut self.post_creation,
        }
    }

    fn record(&mut self, phase: Phase, c: char, outcome: ProbeOutcome) {
        let outcomes = self.phase_mut(phase);
        match outcomes.iter_mut().find(|(existing, _)| *existing == c) {
            Some(slot) => slot.1 = outcome,
            None => outcomes.push((c, outcome)),
        }
    }

    /// Outcomes for `phase`, in probe order.
    pub fn outcomes(&self, phase: Phase) -> &[(char, ProbeOutcome)] {
        match phase {
            Phase::Creation => &self.creation,
            Phase::PostCreation => &self.post_creation,
        }
    }

    /// Outcome for one character, if probed.
    pub fn outcome(&self, phase: Phase, c: char) -> Option<ProbeOutcome> {
        self.outcomes(phase)
            .iter()
            .find(|(existing, _)| *existing == c)
            .map(|(_, outcome)| *outcome)
    }

    /// Characters refused in every placement.
    pub fn disallowed(&self, phase: Phase) -> Vec<char> {
        self.outcomes(phase)
            .iter()
            .filter(|(_, outcome)| outcome.is_disallowed())
            .map(|(c, _)| *c)
            .collect()
    }

    /// Characters accepted only after a placement change, with the last
    /// refused stage.
    pub fn placement_sensitive(&self, phase: Phase) -> Vec<(char, u8)> {
        self.outcomes(phase)
            .iter()
            .filter(|(_, outcome)| !outcome.is_disallowed())
            .filter_map(|(c, outcome)| outcome.stage().map(|stage| (*c, stage)))
            .collect()
    }
}

/// Collects outcomes for every probed leaf, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct ReportAggregator {
    leaves: Vec<LeafFindings>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome for `c` on `leaf`, replacing any earlier one.
    pub fn record(&mut self, leaf: &str, phase: Phase, c: char, outcome: ProbeOutcome) {
        let index = match self.leaves.iter().position(|f| f.leaf == leaf) {
            Some(index) => index,
            None => {
                self.leaves.push(LeafFindings::new(leaf));
                self.leaves.len() - 1
            }
        };
        self.leaves[index].record(phase, c, outcome);
    }

    pub fn leaves(&self) -> &[LeafFindings] {
        &self.leaves
    }

    pub fn get(&self, leaf: &str) -> Option<&LeafFindings> {
        self.leaves.iter().find(|f| f.leaf == leaf)
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Hands out the collected findings and starts over.
    pub fn drain(&mut self) -> Vec<LeafFindings> {
        std::mem::take(&mut self.leaves)
    }
}

/// Space-separated characters, or `None` when empty.
pub fn render_chars(chars: &[char]) -> String {
    if chars.is_empty() {
        return REPORT_NONE.to_string();
    }
    chars
        .iter()
        .map(char::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Characters tagged with the refused stage (`#c1 'c2`), or `None`.
pub fn render_tagged(chars: &[(char, u8)]) -> String {
    if chars.is_empty() {
        return REPORT_NONE.to_string();
    }
    chars
        .iter()
        .map(|(c, stage)| format!("{}c{}", c, stage))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Row layout of a report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLayout {
    /// Creation-time and post-creation columns.
    CreationProbe,
    /// One column of post-creation findings per existing leaf.
    LeafProbe,
}

impl ReportLayout {
    /// Header names.
    pub fn columns(&self, detail: bool) -> Vec<String> {
        let mut columns: Vec<&str> = match self {
            ReportLayout::CreationProbe => vec![
                "MODULE::leafName",
                "disallowed-chars(CREATE)",
                "disallowed-chars(POST-CREATE)",
            ],
            ReportLayout::LeafProbe => vec!["MODULE::leafName", "disallowed-chars"],
        };
        if detail {
            match self {
                ReportLayout::CreationProbe => columns.extend([
                    "placement-sensitive(CREATE)",
                    "placement-sensitive(POST-CREATE)",
                ]),
                ReportLayout::LeafProbe => columns.push("placement-sensitive"),
            }
        }
        columns.into_iter().map(str::to_string).collect()
    }

    /// One row for `findings`.
    pub fn row(&self, findings: &LeafFindings, detail: bool) -> Vec<String> {
        let phases: &[Phase] = match self {
            ReportLayout::CreationProbe => &[Phase::Creation, Phase::PostCreation],
            ReportLayout::LeafProbe => &[Phase::PostCreation],
        };
        let mut row = vec![findings.leaf.clone()];
        row.extend(phases.iter().map(|p| render_chars(&findings.disallowed(*p))));
        if detail {
            row.extend(
                phases
                    .iter()
                    .map(|p| render_tagged(&findings.placement_sensitive(*p))),
            );
        }
        row
    }
}

/// Splits one line written by [`ReportWriter`] back into fields.
///
/// Quoted fields keep their content verbatim with doubled quotes collapsed;
/// unquoted fields are trimmed. Returns `None` for an unterminated quote or
/// text after a closing quote.
pub fn split_delimited(line: &str, delimiter: char, quote: char) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        let mut field = String::new();
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        if chars.peek() == Some(&quote) {
            chars.next();
            loop {
                match chars.next() {
                    Some(c) if c == quote => {
                        if chars.peek() == Some(&quote) {
                            chars.next();
                            field.push(quote);
                        } else {
                            break;
                        }
                    }
                    Some(c) => field.push(c),
                    None => return None,
                }
            }
            while chars.peek() == Some(&' ') {
                chars.next();
            }
            match chars.next() {
                None => {
                    fields.push(field);
                    return Some(fields);
                }
                Some(c) if c == delimiter => fields.push(field),
                Some(_) => return None,
            }
        } else {
            loop {
                match chars.next() {
                    None => {
                        fields.push(field.trim().to_string());
                        return Some(fields);
                    }
                    Some(c) if c == delimiter => {
                        fields.push(field.trim().to_string());
                        break;
                    }
                    Some(c) => field.push(c),
                }
            }
        }
    }
}

/// Splits one comma-delimited, `"`-quoted line.
pub fn split_csv_line(line: &str) -> Option<Vec<String>> {
    split_delimited(line, ',', '"')
}

/// Delimited-text writer with a single header row.
pub struct ReportWriter<W: Write> {
    out: W,
    columns: Vec<String>,
    delimiter: char,
    quote: char,
    header_written: bool,
}

impl<W: Write> ReportWriter<W> {
    /// Tab-delimited, `'`-quoted report.
    pub fn tsv(out: W, columns: Vec<String>) -> Self {
        Self {
            out,
            columns,
            delimiter: '\t',
            quote: '\'',
            header_written: false,
        }
    }

    /// Comma-delimited, `"`-quoted file.
    pub fn csv(out: W, columns: Vec<String>) -> Self {
        Self {
            out,
            columns,
            delimiter: ',',
            quote: '"',
            header_written: false,
        }
    }

    fn quote_field<'f>(&self, field: &'f str) -> Cow<'f, str> {
        let needs_quoting = field
            .chars()
            .any(|c| c == self.delimiter || c == self.quote || c == '\n' || c == '\r');
        if !needs_quoting {
            return Cow::Borrowed(field);
        }
        let doubled = format!("{}{}", self.quote, self.quote);
        let escaped = field.replace(self.quote, &doubled);
        Cow::Owned(format!("{}{}{}", self.quote, escaped, self.quote))
    }

    fn write_line(&mut self, fields: &[String]) -> io::Result<()> {
        let delimiter = self.delimiter.to_string();
        let line = fields
            .iter()
            .map(|f| self.quote_field(f))
            .collect::<Vec<_>>()
            .join(delimiter.as_str());
        writeln!(self.out, "{}", line)
    }

    /// Writes and flushes the header unless already written.
    pub fn write_header(&mut self) -> io::Result<()> {
        if self.header_written {
            return Ok(());
        }
        let columns = self.columns.clone();
        self.write_line(&columns)?;
        self.header_written = true;
        self.out.flush()
    }

    /// Writes one row, preceded by the header the first time.
    pub fn write_row(&mut self, fields: &[String]) -> io::Result<()> {
        self.write_header()?;
        self.write_line(fields)?;
        self.out.flush()
    }

    /// Flushes the output and hands it back. Call this at the end of a run
    /// so a failed final write is reported instead of lost on drop.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_one_outcome_per_character() {
        let mut report = ReportAggregator::new();
        report.record("M::fooName.1", Phase::Creation, '#', ProbeOutcome::RejectedStage3);
        report.record("M::fooName.1", Phase::Creation, '#', ProbeOutcome::RejectedStage1);
        report.record("M::fooName.1", Phase::PostCreation, '#', ProbeOutcome::Accepted);

        let findings = report.get("M::fooName.1").unwrap();
        assert_eq!(findings.outcomes(Phase::Creation).len(), 1);
        assert_eq!(findings.outcome(Phase::Creation, '#'), Some(ProbeOutcome::RejectedStage1));
        assert!(findings.disallowed(Phase::Creation).is_empty());
        assert_eq!(findings.placement_sensitive(Phase::Creation), vec![('#', 1)]);
    }

    #[test]
    fn test_render() {
        assert_eq!(render_chars(&[]), "None");
        assert_eq!(render_chars(&['#', '\'']), "# '");
        assert_eq!(render_tagged(&[('$', 1), ('%', 2)]), "$c1 %c2");
    }

    #[test]
    fn test_creation_layout() {
        let mut report = ReportAggregator::new();
        report.record("M::fooName.1", Phase::Creation, '!', ProbeOutcome::RejectedStage3);
        report.record("M::fooName.1", Phase::Creation, '"', ProbeOutcome::RejectedStage2);
        report.record("M::fooName.1", Phase::PostCreation, '!', ProbeOutcome::Accepted);

        let layout = ReportLayout::CreationProbe;
        let findings = &report.leaves()[0];
        assert_eq!(layout.row(findings, false), vec!["M::fooName.1", "!", "None"]);
        assert_eq!(
            layout.row(findings, true),
            vec!["M::fooName.1", "!", "None", "\"c2", "None"]
        );
        assert_eq!(layout.columns(true).len(), 5);
        assert_eq!(ReportLayout::LeafProbe.columns(false), vec!["MODULE::leafName", "disallowed-chars"]);
    }

    #[test]
    fn test_writer_header_once_and_quoting() {
        let mut writer = ReportWriter::tsv(Vec::new(), ReportLayout::LeafProbe.columns(false));
        writer
            .write_row(&["M::a.0".to_string(), "' \"".to_string()])
            .unwrap();
        writer
            .write_row(&["M::b.0".to_string(), "None".to_string()])
            .unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            text,
            "MODULE::leafName\tdisallowed-chars\nM::a.0\t''' \"'\nM::b.0\tNone\n"
        );
    }

    #[test]
    fn test_writer_header_without_rows() {
        let mut writer = ReportWriter::csv(Vec::new(), vec!["access".into(), "oid".into()]);
        writer.write_header().unwrap();
        writer.write_header().unwrap();
        assert_eq!(String::from_utf8(writer.into_inner()).unwrap(), "access,oid\n");
    }

    /// Buffers writes and fails every flush, like a full disk behind a
    /// `BufWriter`.
    struct FlushFails(Vec<u8>);

    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }
    }

    #[test]
    fn test_header_only_run_surfaces_flush_error() {
        let mut writer = ReportWriter::tsv(FlushFails(Vec::new()), ReportLayout::LeafProbe.columns(false));
        let err = writer.write_header().unwrap_err();
        assert_eq!(err.to_string(), "no space left on device");
        assert!(writer.finish().is_err());
    }

    #[test]
    fn test_finish_returns_output() {
        let mut writer = ReportWriter::csv(Vec::new(), vec!["a".into()]);
        writer.write_header().unwrap();
        assert_eq!(writer.finish().unwrap(), b"a\n".to_vec());
    }

    #[test]
    fn test_split_csv_line() {
        assert_eq!(
            split_csv_line("RW, IF-MIB ,ifAlias,"),
            Some(vec!["RW".to_string(), "IF-MIB".to_string(), "ifAlias".to_string(), String::new()])
        );
        assert_eq!(
            split_csv_line("\"x,\"\"y\"\"\",z"),
            Some(vec!["x,\"y\"".to_string(), "z".to_string()])
        );
        assert_eq!(split_csv_line("\"open,z"), None);
        assert_eq!(split_csv_line("\"a\"b,z"), None);
    }

    #[test]
    fn test_written_csv_line_reads_back() {
        let mut writer = ReportWriter::csv(Vec::new(), vec!["module".into(), "leafName".into()]);
        writer
            .write_row(&["MY-MIB".to_string(), "odd,\"name\"".to_string()])
            .unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert_eq!(
            split_csv_line(row),
            Some(vec!["MY-MIB".to_string(), "odd,\"name\"".to_string()])
        );
    }

    #[test]
    fn test_csv_quoting() {
        let mut writer = ReportWriter::csv(Vec::new(), vec!["a".into()]);
        writer.write_row(&["x,\"y\"".to_string()]).unwrap();
        assert_eq!(
            String::from_utf8(writer.into_inner()).unwrap(),
            "a\n\"x,\"\"y\"\"\"\n"
        );
    }
}
