//! Host memory detection and the per-rank allocator report.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, const_mutex};

use crate::mesh_error::ParMeshError;

static PHYSICAL_MEMORY: Lazy<Option<usize>> = Lazy::new(|| {
    let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
    parse_kb_field(&meminfo, "MemTotal").map(|kb| kb * 1024)
});

/// Serializes appends when several ranks of one process share a directory.
static REPORT_LOCK: Mutex<()> = const_mutex(());

/// Process status fields copied into the report.
const STATUS_FIELDS: [&str; 6] = ["VmPeak", "VmSize", "VmHWM", "VmRSS", "VmData", "VmSwap"];

/// Physical memory of the host in bytes, when it can be detected.
pub fn physical_memory() -> Option<usize> {
    *PHYSICAL_MEMORY
}

fn parse_kb_field(text: &str, field: &str) -> Option<usize> {
    text.lines().find_map(|line| {
        let rest = line.strip_prefix(field)?.strip_prefix(':')?;
        rest.split_whitespace().next()?.parse().ok()
    })
}

/// Report file name of `rank`.
pub fn report_file_name(rank: usize) -> String {
    format!("mem_info-{rank:02}.txt")
}

/// Append a block of allocator statistics tagged with `msg` to
/// `mem_info-<rank>.txt` in the working directory.
pub fn dump_allocator_info(msg: &str, rank: usize) -> Result<PathBuf, ParMeshError> {
    dump_allocator_info_in(Path::new("."), msg, rank)
}

/// [`dump_allocator_info`] into `dir`.
pub fn dump_allocator_info_in(dir: &Path, msg: &str, rank: usize) -> Result<PathBuf, ParMeshError> {
    let path = dir.join(report_file_name(rank));
    let _guard = REPORT_LOCK.lock();
    let mut out = OpenOptions::new().create(true).append(true).open(&path)?;

    writeln!(out, "==== {msg} ====")?;
    match fs::read_to_string("/proc/self/status") {
        Ok(status) => {
            for field in STATUS_FIELDS {
                if let Some(kb) = parse_kb_field(&status, field) {
                    writeln!(out, "{field:<8} {kb:>12} kB")?;
                }
            }
        }
        Err(_) => writeln!(out, "allocator statistics unavailable on this platform")?,
    }
    writeln!(out)?;
    Ok(path)
}
