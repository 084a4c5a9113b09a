//! Boot handoff marker.
//!
//! LaunchNext stores the name of the program to run on the next boot. The
//! boot side reads the marker with [`take_next_program`], which deletes it
//! before returning so a crashing program is not relaunched forever.

use std::io::{ErrorKind, Read, Write};

use tracing::{debug, info, warn};

use crate::fs::{FileSystem, FsError, FsResult};
use crate::handler::{nul_trimmed, Request, Responder};

/// Marker location on the device filesystem.
pub const DEFAULT_MARKER: &str = "/startup.txt";

/// Persist `program` as the next program to launch.
pub fn store_next_program<F: FileSystem>(fs: &F, marker: &str, program: &str) -> FsResult<()> {
    if program.is_empty() {
        return Err(FsError::InvalidPath(String::new()));
    }
    let mut writer = fs.create(marker)?;
    writer
        .write_all(program.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(|e| FsError::io("write", marker, e))?;
    info!(marker, program, "next program stored");
    Ok(())
}

/// Read and delete the marker. `Ok(None)` when there is nothing to launch.
pub fn take_next_program<F: FileSystem>(fs: &F, marker: &str) -> FsResult<Option<String>> {
    let mut reader = match fs.open(marker) {
        Ok(reader) => reader,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err),
    };
    let mut contents = String::new();
    let read = reader.read_to_string(&mut contents);
    drop(reader);

    // Remove before acting on the contents: at most once, even on failure.
    fs.remove(marker)?;
    match read {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::InvalidData => {
            warn!(marker, "marker is not UTF-8, discarded");
            return Ok(None);
        }
        Err(err) => return Err(FsError::io("read", marker, err)),
    }

    let program = contents.trim();
    if program.is_empty() {
        debug!(marker, "marker was empty");
        return Ok(None);
    }
    info!(marker, program, "next program taken");
    Ok(Some(program.to_string()))
}

pub(crate) fn handle_launch_next<F: FileSystem>(
    fs: &F,
    marker: &str,
    request: &Request<'_>,
    out: &mut Responder<'_, F::Reader>,
) -> bool {
    if !request.is_complete() {
        return false;
    }
    let result =
        nul_trimmed(request.buffer).and_then(|program| store_next_program(fs, marker, &program));
    out.outcome("launch next", result);
    true
}
