//! Parser for compiler event files (EVFEVENT).
//!
//! Records are fixed-column text lines identified by their first ten
//! characters. Only `FILEID`, `FILEIDCONT`, `FILEEND`, `EXPANSION` and `ERROR`
//! matter here; everything else is ignored. Malformed records are skipped.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

/// Lines are padded to this width before columns are read.
const RECORD_WIDTH: usize = 150;

/// File names longer than this continue on `FILEIDCONT` records.
const MAX_FILE_NAME_CHUNK: usize = 255;

/// Column where a `FILEID`/`FILEIDCONT` file name starts.
const FILE_NAME_COLUMN: usize = 28;

/// One `ERROR` record. Line and column numbers are 1-based as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileError {
    pub code: String,
    pub severity: u8,
    pub text: String,
    pub line_num: u32,
    pub to_line_num: u32,
    pub column: u32,
    pub to_column: u32,
}

#[derive(Debug, Clone, Copy)]
struct Expansion {
    /// Source statement the precompiler replaced.
    defined_start: u32,
    /// Generated lines inserted for it.
    range_start: u32,
    range_end: u32,
}

#[derive(Debug)]
struct PendingError {
    file_id: u32,
    after_expansion: bool,
    error: CompileError,
}

/// Group the errors of an event listing by source file key.
///
/// Library members come out as `LIB/FILE/MEMBER`, stream files as their IFS
/// path. Files without errors are omitted. Errors of each file are sorted by
/// line.
pub fn parse(lines: &[String]) -> IndexMap<String, Vec<CompileError>> {
    let padded: Vec<String> = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| format!("{:<width$}", l.trim_end_matches(['\r', '\n']), width = RECORD_WIDTH))
        .collect();

    let mut file_names: IndexMap<u32, String> = IndexMap::new();
    let mut expansions: IndexMap<u32, Vec<Expansion>> = IndexMap::new();
    let mut pending: Vec<PendingError> = Vec::new();
    let mut seen_expansion = false;

    for (index, line) in padded.iter().enumerate() {
        let record = column(line, 0, 10).trim();
        let file_id = number(column(line, 13, 3));
        let pieces: Vec<&str> = line.split_whitespace().collect();

        match record {
            "FILEID" => {
                let (Some(file_id), Some(name)) = (file_id, pieces.get(5)) else {
                    warn!(line = index, "skipping malformed FILEID record");
                    continue;
                };
                if file_names.contains_key(&file_id) {
                    continue;
                }
                let name = if name.ends_with(')') {
                    format_member_name(name)
                } else {
                    format_ifs_path(&source_path(&padded, index, file_id))
                };
                file_names.insert(file_id, name);
            }
            "EXPANSION" => {
                let values: Vec<Option<u32>> = pieces.iter().skip(3).take(5).map(|p| number(p)).collect();
                match (file_id, values.as_slice()) {
                    (Some(file_id), [Some(defined_start), Some(_), Some(_), Some(start), Some(end)]) => {
                        seen_expansion = true;
                        expansions.entry(file_id).or_default().push(Expansion {
                            defined_start: *defined_start,
                            range_start: *start,
                            range_end: *end,
                        });
                    }
                    _ => warn!(line = index, "skipping malformed EXPANSION record"),
                }
            }
            "ERROR" => match (file_id, parse_error(line)) {
                (Some(file_id), Some(error)) => pending.push(PendingError {
                    file_id,
                    after_expansion: seen_expansion,
                    error,
                }),
                _ => warn!(line = index, "skipping malformed ERROR record"),
            },
            _ => {}
        }
    }

    let mut by_file: IndexMap<String, Vec<CompileError>> = IndexMap::new();
    for PendingError {
        file_id,
        after_expansion,
        mut error,
    } in pending
    {
        if is_spurious(&error) {
            continue;
        }
        if after_expansion {
            let ranges = expansions.get(&file_id).map(Vec::as_slice).unwrap_or_default();
            let line = match map_generated_line(ranges, error.line_num) {
                SourceLine::Original(line) => line,
                // SQL messages about generated code point at nothing the user wrote.
                SourceLine::Generated(_) if error.code.starts_with("SQL") => continue,
                SourceLine::Generated(None) => continue,
                SourceLine::Generated(Some(statement)) => statement,
            };
            let span = error.to_line_num.saturating_sub(error.line_num);
            error.line_num = line;
            error.to_line_num = line + span;
        }
        let Some(name) = file_names.get(&file_id) else {
            continue;
        };
        by_file.entry(name.clone()).or_default().push(error);
    }

    for errors in by_file.values_mut() {
        errors.sort_by_key(|e| e.line_num);
    }
    by_file
}

fn parse_error(line: &str) -> Option<CompileError> {
    Some(CompileError {
        line_num: number(column(line, 26, 6))?,
        column: number(column(line, 33, 3))?,
        to_line_num: number(column(line, 37, 6))?,
        to_column: number(column(line, 44, 3))?,
        code: column(line, 48, 7).trim().to_string(),
        severity: column(line, 58, 2).trim().parse().ok()?,
        text: line.get(65..).unwrap_or_default().trim().to_string(),
    })
}

/// RPG messages about `SQ`-prefixed names the SQL precompiler generated.
fn is_spurious(error: &CompileError) -> bool {
    error.text.contains("name or indicator SQ") && error.code.starts_with("RNF") && error.severity == 0
}

enum SourceLine {
    Original(u32),
    /// Inside precompiler output; carries the statement it replaced.
    Generated(Option<u32>),
}

/// Map a line of precompiler output back to the original source.
fn map_generated_line(expansions: &[Expansion], line: u32) -> SourceLine {
    let mut shift = 0u32;
    for expansion in expansions {
        if expansion.range_end < expansion.range_start || expansion.range_start == 0 {
            continue;
        }
        if line > expansion.range_end {
            shift += expansion.range_end - expansion.range_start + 1;
        } else if line >= expansion.range_start {
            return SourceLine::Generated(Some(expansion.defined_start).filter(|l| *l > 0));
        }
    }
    SourceLine::Original(line.saturating_sub(shift).max(1))
}

/// IFS path of `file_id` starting at the `FILEID` record on `index`,
/// continued on its `FILEIDCONT` records.
fn source_path(lines: &[String], index: usize, file_id: u32) -> String {
    let header = &lines[index];
    let length = header
        .split_whitespace()
        .nth(4)
        .and_then(number)
        .map(|n| n as usize)
        .unwrap_or(MAX_FILE_NAME_CHUNK);

    let mut path = column(header, FILE_NAME_COLUMN, length.min(MAX_FILE_NAME_CHUNK)).to_string();
    let mut remaining = length.saturating_sub(MAX_FILE_NAME_CHUNK);

    let continuations = lines.iter().filter(|l| {
        column(l, 0, 10).trim() == "FILEIDCONT" && number(column(l, 13, 3)) == Some(file_id)
    });
    for cont in continuations {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(MAX_FILE_NAME_CHUNK);
        path.push_str(column(cont, FILE_NAME_COLUMN, take));
        remaining -= take;
    }

    // Short paths are followed by the timestamp on the same record.
    path.split_whitespace().next().unwrap_or_default().to_string()
}

/// `LIB/FILE(MBR)` to `LIB/FILE/MBR`.
pub fn format_member_name(name: &str) -> String {
    let Some((library, rest)) = name.split_once('/') else {
        return name.to_string();
    };
    let rest = rest.strip_suffix(')').unwrap_or(rest);
    match rest.split_once('(') {
        Some((file, member)) => format!("{library}/{file}/{member}"),
        None => format!("{library}/{rest}"),
    }
}

/// Drop `.` segments from an IFS path.
pub fn format_ifs_path(path: &str) -> String {
    path.split('/').filter(|s| *s != ".").collect::<Vec<_>>().join("/")
}

fn column(line: &str, start: usize, len: usize) -> &str {
    let end = (start + len).min(line.len());
    line.get(start.min(end)..end).unwrap_or_default()
}

fn number(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    const MEMBER_LISTING: &[&str] = &[
        "TIMESTAMP  0 20230524115628",
        "PROCESSOR  0 999 1",
        "FILEID     0 999 000000 026 QTEMP/QSQLTEMP1(EMPLOYEES) 20230524115628 0",
        "FILEID     0 001 000000 026 LIAMA/QRPGLESRC(EMPLOYEES) 20230516152429 0",
        "ERROR      0 001 1 000044 000044 000 000044 000 SQL1001 S 30 048 External file definition for EMPLOYEE not found.",
        "ERROR      0 001 1 000093 000093 020 000093 020 SQL1103 W 10 069 Position 20 Column definitions for table EMPLOYEE in *LIBL not found.",
        "ERROR      0 001 1 000103 000103 019 000103 019 SQL0312 S 30 212 Position 19 Variable EMPLOYEE not defined or not usable.",
        "ERROR      0 001 1 000103 000103 028 000103 028 SQL0312 S 30 209 Position 28 Variable EMPNO not defined or not usable.",
        "ERROR      0 001 1 000104 000104 016 000104 016 SQL0312 S 30 212 Position 16 Variable EMPLOYEE not defined or not usable.",
        "ERROR      0 001 1 000104 000104 025 000104 025 SQL0312 S 30 212 Position 25 Variable FIRSTNME not defined or not usable.",
        "ERROR      0 001 1 000105 000105 016 000105 016 SQL0312 S 30 212 Position 16 Variable EMPLOYEE not defined or not usable.",
        "ERROR      0 001 1 000105 000105 025 000105 025 SQL0312 S 30 212 Position 25 Variable LASTNAME not defined or not usable.",
        "ERROR      0 001 1 000106 000106 016 000106 016 SQL0312 S 30 212 Position 16 Variable EMPLOYEE not defined or not usable.",
        "ERROR      0 001 1 000106 000106 025 000106 025 SQL0312 S 30 207 Position 25 Variable JOB not defined or not usable.",
        "EXPANSION  0 001 000000 000000 999 000049 000113",
        "EXPANSION  0 001 000096 000096 999 000154 000171",
        "FILEEND    0 001 000151",
        "FILEEND    0 999 000264",
    ];

    #[test]
    fn parses_member_listing() {
        let errors = parse(&lines(MEMBER_LISTING));
        assert_eq!(errors.len(), 1);
        let file = &errors["LIAMA/QRPGLESRC/EMPLOYEES"];
        assert_eq!(file.len(), 10);

        let first = &file[0];
        assert_eq!(first.code, "SQL1001");
        assert_eq!(first.line_num, 44);
        assert_eq!((first.column, first.to_column), (0, 0));
        assert_eq!(first.severity, 30);
        assert_eq!(first.text, "External file definition for EMPLOYEE not found.");

        let on_104: Vec<_> = file.iter().filter(|e| e.line_num == 104).collect();
        assert_eq!(on_104.len(), 2);
        assert_eq!(on_104[0].column, 16);
        assert_eq!(on_104[1].column, 25);
    }

    #[test]
    fn parses_ifs_path_and_drops_dot_segments() {
        let listing = lines(&[
            "FILEID     0 001 000000 073 /home/LINUX/builds/./qrpglesrc/employees.pgm.sqlrpgle 20230429182220 0",
            "ERROR      0 001 1 000041 000041 000 000041 000 RNF7030 S 30 048 The name or indicator FOO is not defined.",
        ]);
        let errors = parse(&listing);
        let file = &errors["/home/LINUX/builds/qrpglesrc/employees.pgm.sqlrpgle"];
        assert_eq!(file[0].code, "RNF7030");
    }

    #[test]
    fn long_paths_continue_on_fileidcont() {
        // The first record carries exactly the first 255 characters.
        let head = "a".repeat(252);
        let first = format!("/d/{head}");
        let tail = "/b.rpgle";
        let total = first.len() + tail.len();
        let listing = vec![
            format!("FILEID     0 001 000000 {total:03} {first}"),
            format!("FILEIDCONT 0 001 000000 000 {tail} 20230429182220 0"),
            "ERROR      0 001 1 000001 000001 001 000001 005 RNF0001 S 20 010 Something.".to_string(),
        ];
        let errors = parse(&listing);
        let key = format!("{first}{tail}");
        assert!(errors.contains_key(&key), "keys: {:?}", errors.keys().collect::<Vec<_>>());
    }

    #[test]
    fn errors_after_expansion_are_mapped_back() {
        let listing = lines(&[
            "FILEID     0 001 000000 026 LIB1/QRPGLESRC(PGM1) 20230516152429 0",
            "EXPANSION  0 001 000010 000010 999 000011 000020",
            "ERROR      0 001 1 000030 000030 005 000030 009 RNF7031 I 00 020 Field never used.",
            "ERROR      0 001 1 000015 000015 001 000015 001 SQL0312 S 30 020 Inside generated code.",
            "ERROR      0 001 1 000015 000015 001 000015 001 RNF5377 S 30 020 Generated statement.",
        ]);
        let errors = parse(&listing);
        let file = &errors["LIB1/QRPGLESRC/PGM1"];
        assert_eq!(file.len(), 2);
        // Ten generated lines precede line 30.
        assert_eq!(file[0].line_num, 10);
        assert_eq!(file[0].code, "RNF5377");
        assert_eq!(file[1].line_num, 20);
    }

    #[test]
    fn spurious_and_malformed_records_are_skipped() {
        let listing = lines(&[
            "FILEID     0 001 000000 026 LIB1/QRPGLESRC(PGM1) 20230516152429 0",
            "ERROR      0 001 1 000010 000010 001 000010 001 RNF7030 I 00 020 The name or indicator SQ_X is not referenced.",
            "ERROR      0 001 1 garbage",
            "ERROR      0 001 1 000012 000012 001 000012 001 RNF7030 S 30 020 Real one.",
            "",
            "   ",
        ]);
        let errors = parse(&listing);
        assert_eq!(errors["LIB1/QRPGLESRC/PGM1"].len(), 1);
    }

    #[test]
    fn empty_listing_yields_nothing() {
        assert!(parse(&[]).is_empty());
    }

    #[test]
    fn member_name_formatting() {
        assert_eq!(format_member_name("LIB/QRPGLESRC(PGM)"), "LIB/QRPGLESRC/PGM");
        assert_eq!(format_ifs_path("/a/./b/./c.rpgle"), "/a/b/c.rpgle");
    }
}
