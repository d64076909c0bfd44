//! Line protocol for exec output: one banner line, then one candidate per line.

use crate::core::types::CandidateSet;

/// Incremental decoder for exec output lines.
///
/// The first line ever pushed is the target program's banner and is dropped.
/// Every later non-empty line becomes a candidate, in arrival order.
#[derive(Debug, Default)]
pub struct CandidateParser {
    header_seen: bool,
    candidates: CandidateSet,
}

impl CandidateParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        if !self.header_seen {
            self.header_seen = true;
            return;
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return;
        }
        self.candidates.push(line.to_string());
    }

    /// Lines accepted so far.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn finish(self) -> CandidateSet {
        self.candidates
    }
}

/// Decode a complete output blob.
pub fn parse_candidates(output: &str) -> CandidateSet {
    let mut parser = CandidateParser::new();
    for line in output.lines() {
        parser.push_line(line);
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_banner_and_keeps_channel() {
        let out = "2024-01-01 INFO Channels peers has joined:\nmychannel\n";
        assert_eq!(parse_candidates(out), vec!["mychannel"]);
    }

    #[test]
    fn n_data_lines_yield_n_candidates_in_order() {
        for n in 0..5 {
            let mut out = String::from("banner\n");
            for i in 0..n {
                out.push_str(&format!("ch{i}\n"));
            }
            let parsed = parse_candidates(&out);
            let expected: Vec<String> = (0..n).map(|i| format!("ch{i}")).collect();
            assert_eq!(parsed, expected);
        }
    }

    #[test]
    fn header_only_is_empty_not_error() {
        assert!(parse_candidates("banner\n").is_empty());
        assert!(parse_candidates("").is_empty());
    }

    #[test]
    fn duplicates_are_kept_and_blank_lines_skipped() {
        let out = "banner\r\nalpha\r\n\r\nalpha\r\nbeta";
        assert_eq!(parse_candidates(out), vec!["alpha", "alpha", "beta"]);
    }

    #[test]
    fn blank_first_line_still_counts_as_banner() {
        assert_eq!(parse_candidates("\nmychannel\n"), vec!["mychannel"]);
    }
}
