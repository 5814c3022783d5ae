//! Parsing of `/proc/self/mountinfo`.

use std::path::{Path, PathBuf};

use isoshelf_common::error::{IsoshelfError, Result};

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Where the filesystem is mounted.
    pub mount_point: PathBuf,
    /// Filesystem type, e.g. `nfs` or `nfs4`.
    pub fs_type: String,
    /// Mount source, e.g. `10.1.1.1:/OSimg`.
    pub source: String,
}

/// Parses mountinfo content. Malformed lines are skipped.
#[must_use]
pub fn parse(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            // <id> <parent> <maj:min> <root> <mount point> <opts> [optional...] - <fstype> <source> <superopts>
            let (pre, post) = line.split_once(" - ")?;
            let mount_point = pre.split_whitespace().nth(4)?;
            let mut post_fields = post.split_whitespace();
            let fs_type = post_fields.next()?;
            let source = post_fields.next().unwrap_or_default();
            Some(MountEntry {
                mount_point: PathBuf::from(unescape(mount_point)),
                fs_type: fs_type.to_string(),
                source: unescape(source),
            })
        })
        .collect()
}

/// Returns the entry mounted at `target`, the most recent if stacked.
#[must_use]
pub fn find<'a>(entries: &'a [MountEntry], target: &Path) -> Option<&'a MountEntry> {
    entries.iter().rev().find(|e| e.mount_point == target)
}

/// Reads and parses a mountinfo file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read(path: &Path) -> Result<Vec<MountEntry>> {
    let content = std::fs::read_to_string(path).map_err(|e| IsoshelfError::io(path, e))?;
    Ok(parse(&content))
}

/// Decodes the octal escapes (`\040` for space) the kernel uses in paths.
fn unescape(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
