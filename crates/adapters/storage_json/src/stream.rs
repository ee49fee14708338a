//! Bounded-memory streaming parse of the automations array.
//!
//! Reads the store file in small chunks and extracts one object at a time
//! with a brace-depth / quote-escape state machine, so the whole document
//! is never materialized. Oversized objects are truncated and skipped by
//! the caller's deserializer rather than growing the buffer.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rulehub_domain::error::StorageError;

/// Read chunk size in bytes.
const CHUNK_SIZE: usize = 512;

/// Upper bound for a single serialized automation object.
const MAX_OBJECT_BYTES: usize = 4096;

/// Scan the automations array in the file at `path`, invoking `visit` with
/// each object's raw JSON text. `visit` returning `false` stops the scan
/// early. A missing file visits nothing.
///
/// # Errors
///
/// Returns [`StorageError::Read`] only for genuine IO failures.
pub fn stream_parse(
    path: &Path,
    visit: &mut (dyn FnMut(&str) -> bool + Send),
) -> Result<(), StorageError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(StorageError::Read(err)),
    };

    let mut chunk = [0_u8; CHUNK_SIZE];
    let mut object = Vec::with_capacity(MAX_OBJECT_BYTES);
    let mut in_string = false;
    let mut found_array = false;
    let mut in_array = false;
    let mut depth = 0_usize;
    let mut prev = 0_u8;

    loop {
        let n = file.read(&mut chunk).map_err(StorageError::Read)?;
        if n == 0 {
            break;
        }
        for &byte in &chunk[..n] {
            if byte == b'"' && prev != b'\\' {
                in_string = !in_string;
            }
            if !in_string {
                if !found_array && byte == b'[' {
                    found_array = true;
                    in_array = true;
                    prev = byte;
                    continue;
                }
                if in_array {
                    if byte == b'{' {
                        depth += 1;
                        if depth == 1 {
                            object.clear();
                        }
                    } else if byte == b'}' {
                        if object.len() < MAX_OBJECT_BYTES {
                            object.push(byte);
                        }
                        depth = depth.saturating_sub(1);
                        if depth == 0 && !object.is_empty() {
                            if let Ok(text) = std::str::from_utf8(&object) {
                                if !visit(text) {
                                    return Ok(());
                                }
                            }
                            object.clear();
                        }
                        prev = byte;
                        continue;
                    } else if byte == b']' && depth == 0 {
                        in_array = false;
                        break;
                    }
                }
            }
            if in_array && depth > 0 && object.len() < MAX_OBJECT_BYTES {
                object.push(byte);
            }
            prev = byte;
        }
        if found_array && !in_array {
            break;
        }
    }
    Ok(())
}

/// Find the index of the `}` closing the object that starts at `start`,
/// tracking brace depth and skipping string contents.
#[must_use]
pub(crate) fn find_object_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut prev = 0_u8;
    for (offset, &byte) in bytes.iter().enumerate().skip(start) {
        if byte == b'"' && prev != b'\\' {
            in_string = !in_string;
        }
        if !in_string {
            if byte == b'{' {
                depth += 1;
            } else if byte == b'}' {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(offset);
                }
            }
        }
        prev = byte;
    }
    None
}
