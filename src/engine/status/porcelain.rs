// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Parser for `git status --porcelain=v2 --branch -z`.
//!
//! ```text
//! # branch.oid <hash> | (initial)
//! # branch.head <name> | (detached)
//! # branch.upstream <remote>/<branch>
//! # branch.ab +<ahead> -<behind>
//! 1 XY sub mH mI mW hH hI <path>
//! 2 XY sub mH mI mW hH hI <X><score> <path> NUL <origPath>
//! u XY sub m1 m2 m3 mW h1 h2 h3 <path>
//! ? <path>
//! ! <path>                               (ignored)
//! ```

use tracing::trace;

use crate::engine::types::{FileStatus, FileStatusEntry, RepoStatus};
use crate::error::EngineError;

fn malformed(record: &str) -> EngineError {
    EngineError::CommandFailed {
        command: "git status --porcelain=v2".to_string(),
        exit_code: 0,
        stderr: format!("unexpected status record: {record}"),
    }
}

/// Maps one side of an `XY` code. `.` means unchanged.
const fn change_kind(code: char) -> Option<FileStatus> {
    match code {
        'A' | 'C' => Some(FileStatus::Added),
        'M' | 'T' => Some(FileStatus::Modified),
        'D' => Some(FileStatus::Deleted),
        'R' => Some(FileStatus::Renamed),
        _ => None,
    }
}

fn push_changes(
    files: &mut Vec<FileStatusEntry>,
    xy: &str,
    path: &str,
    old_path: Option<&str>,
    record: &str,
) -> Result<(), EngineError> {
    let mut codes = xy.chars();
    let (Some(x), Some(y)) = (codes.next(), codes.next()) else {
        return Err(malformed(record));
    };
    for (code, staged) in [(x, true), (y, false)] {
        if let Some(status) = change_kind(code) {
            files.push(FileStatusEntry {
                path: path.to_string(),
                status,
                staged,
                old_path: (status == FileStatus::Renamed)
                    .then(|| old_path.map(str::to_string))
                    .flatten(),
            });
        }
    }
    Ok(())
}

fn parse_header(status: &mut RepoStatus, header: &str) {
    let (key, value) = header.split_once(' ').unwrap_or((header, ""));
    match key {
        "branch.oid" => status.head = (value != "(initial)").then(|| value.to_string()),
        "branch.head" => status.branch = (value != "(detached)").then(|| value.to_string()),
        "branch.upstream" => status.upstream = Some(value.to_string()),
        "branch.ab" => {
            let mut counts = value
                .split(' ')
                .map(|n| n.trim_start_matches(['+', '-']).parse::<u32>().unwrap_or(0));
            status.ahead = counts.next().unwrap_or(0);
            status.behind = counts.next().unwrap_or(0);
        }
        _ => trace!(header, "status header skipped"),
    }
}

/// Parses NUL-separated porcelain v2 output.
///
/// # Errors
///
/// Returns `CommandFailed` for a record whose shape does not match its type.
pub fn parse(raw: &str) -> Result<RepoStatus, EngineError> {
    let mut status = RepoStatus::default();
    let mut records = raw.split('\0').filter(|r| !r.is_empty());

    while let Some(record) = records.next() {
        let kind = record.get(..1).unwrap_or_default();
        let rest = record.get(1..).unwrap_or_default();
        match kind {
            "#" => parse_header(&mut status, rest.trim_start()),
            "1" => {
                let fields: Vec<&str> = record.splitn(9, ' ').collect();
                if fields.len() != 9 {
                    return Err(malformed(record));
                }
                push_changes(&mut status.files, fields[1], fields[8], None, record)?;
            }
            "2" => {
                let fields: Vec<&str> = record.splitn(10, ' ').collect();
                if fields.len() != 10 {
                    return Err(malformed(record));
                }
                let old_path = records.next().ok_or_else(|| malformed(record))?;
                push_changes(&mut status.files, fields[1], fields[9], Some(old_path), record)?;
            }
            "u" => {
                let fields: Vec<&str> = record.splitn(11, ' ').collect();
                if fields.len() != 11 {
                    return Err(malformed(record));
                }
                status.files.push(FileStatusEntry {
                    path: fields[10].to_string(),
                    status: FileStatus::Conflict,
                    staged: false,
                    old_path: None,
                });
            }
            "?" => status.files.push(FileStatusEntry {
                path: rest.strip_prefix(' ').unwrap_or(rest).to_string(),
                status: FileStatus::Untracked,
                staged: false,
                old_path: None,
            }),
            "!" => {}
            _ => return Err(malformed(record)),
        }
    }

    status.dirty = !status.files.is_empty();
    Ok(status)
}
