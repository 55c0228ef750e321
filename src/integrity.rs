//! Checksum and file integrity utilities
//!
//! Content hashing, best-effort disk space probing, and filename
//! sanitization shared by the splitter and the merger.

use crate::error::SplitResult;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, warn};

/// Buffer size for streaming checksum calculation
const HASH_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Prefix attached to every rendered digest
pub const CHECKSUM_PREFIX: &str = "sha256:";

/// Placeholder used when sanitization leaves an empty name
const EMPTY_NAME_PLACEHOLDER: &str = "file";

/// Calculate the SHA-256 checksum of a file, streaming its contents
///
/// The digest is deterministic, content-only, and rendered as
/// `sha256:<64 lowercase hex>`.
pub async fn hash_file(path: &Path) -> SplitResult<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    use tokio::io::AsyncReadExt;

    loop {
        let bytes_read = file.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{}{:x}", CHECKSUM_PREFIX, hasher.finalize()))
}

/// Calculate the SHA-256 checksum of an in-memory byte slice
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{}{:x}", CHECKSUM_PREFIX, hasher.finalize())
}

/// Best-effort check that `dir` has at least `required_bytes` free
///
/// Returns `true` when the probe cannot answer (unknown mount, empty disk
/// list) rather than blocking the operation.
pub fn has_enough_space(dir: &Path, required_bytes: u64) -> bool {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());

    // Pick the disk whose mount point is the longest prefix of the target dir
    let mut best: Option<(usize, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if dir.starts_with(mount) {
            let depth = mount.components().count();
            if best.map_or(true, |(d, _)| depth > d) {
                best = Some((depth, disk.available_space()));
            }
        }
    }

    match best {
        Some((_, available)) => {
            debug!(
                "Disk space check: {} bytes available, {} required",
                available, required_bytes
            );
            available >= required_bytes
        }
        None => {
            warn!(
                "Could not determine free space for {}, assuming enough",
                dir.display()
            );
            true
        }
    }
}

/// Sanitize a name for use in part and manifest filenames
///
/// Whitespace and path-unsafe characters become `_`, runs collapse to a
/// single `_`, and leading/trailing separators are stripped. An empty
/// result falls back to a fixed placeholder.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;

    for ch in name.chars() {
        let mapped = if ch.is_whitespace() || matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
            '_'
        } else {
            ch
        };

        if mapped == '_' {
            if !last_was_sep {
                out.push('_');
            }
            last_was_sep = true;
        } else {
            out.push(mapped);
            last_was_sep = false;
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        EMPTY_NAME_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format a byte count as a human-readable size string
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", size, UNITS[unit])
}
