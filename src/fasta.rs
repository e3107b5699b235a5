use std::io::{self, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub title: String,
    pub sequence: String,
}

/// Parses FASTA text. Anything before the first header line is ignored;
/// sequence lines are concatenated with spaces and carriage returns removed.
pub fn parse_records(text: &str) -> Vec<FastaRecord> {
    let mut records = Vec::new();
    let mut current: Option<FastaRecord> = None;

    for line in text.lines() {
        if let Some(title) = line.strip_prefix('>') {
            if let Some(record) = current.take() {
                records.push(record);
            }
            current = Some(FastaRecord {
                title: title.trim_end().to_string(),
                sequence: String::new(),
            });
            continue;
        }
        if let Some(record) = current.as_mut() {
            record
                .sequence
                .extend(line.chars().filter(|ch| *ch != ' ' && *ch != '\r'));
        }
    }
    if let Some(record) = current {
        records.push(record);
    }
    records
}

/// Splits a sequence into lines of at most `width` characters.
pub fn wrap_sequence(sequence: &str, width: usize) -> Vec<&str> {
    let width = width.max(1);
    let mut lines = Vec::with_capacity(sequence.len() / width + 1);
    let mut rest = sequence;
    while !rest.is_empty() {
        let split = rest
            .char_indices()
            .nth(width)
            .map(|(index, _)| index)
            .unwrap_or(rest.len());
        let (line, tail) = rest.split_at(split);
        lines.push(line);
        rest = tail;
    }
    lines
}

pub fn write_record<W: Write + ?Sized>(
    writer: &mut W,
    record: &FastaRecord,
    width: usize,
) -> io::Result<()> {
    writeln!(writer, ">{}", record.title)?;
    for line in wrap_sequence(&record.sequence, width) {
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

/// Re-serializes every record of `payload` with sequence lines capped at
/// `width`. Returns the number of records written.
pub fn rewrap<W: Write + ?Sized>(
    writer: &mut W,
    payload: &str,
    width: usize,
) -> io::Result<usize> {
    let records = parse_records(payload);
    for record in &records {
        write_record(writer, record, width)?;
    }
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_records() {
        let text = "junk\n>NC_1 first\nACGT\nAC GT\r\n\n>NC_2 second \nTTTT\n";
        let records = parse_records(text);
        assert_eq!(
            records,
            vec![
                FastaRecord {
                    title: "NC_1 first".to_string(),
                    sequence: "ACGTACGT".to_string(),
                },
                FastaRecord {
                    title: "NC_2 second".to_string(),
                    sequence: "TTTT".to_string(),
                },
            ]
        );
    }

    #[test]
    fn wrap_then_join_restores_sequence() {
        let sequence = "ACGTTGCAACGTNNNNACGTTGCA";
        for width in 1..=sequence.len() + 2 {
            let lines = wrap_sequence(sequence, width);
            assert!(lines.iter().all(|line| line.len() <= width));
            assert_eq!(lines.concat(), sequence);
        }
    }

    #[test]
    fn rewrap_caps_line_width() {
        let payload = ">seq1\nACGTACGTAC\n>seq2\nAC\n";
        let mut out = Vec::new();
        let count = rewrap(&mut out, payload, 4).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            ">seq1\nACGT\nACGT\nAC\n>seq2\nAC\n"
        );
    }

    #[test]
    fn empty_sequence_writes_header_only() {
        let mut out = Vec::new();
        rewrap(&mut out, ">empty\n", 60).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), ">empty\n");
    }
}
