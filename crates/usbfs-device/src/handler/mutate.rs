//! Commands that change the filesystem in one shot.

use tracing::debug;

use super::{nul_trimmed, path_pair, Request, Responder};
use crate::fs::{copy_file, FileSystem};

pub(super) fn delete<F: FileSystem>(
    fs: &F,
    request: &Request<'_>,
    out: &mut Responder<'_, F::Reader>,
) -> bool {
    if !request.is_complete() {
        return false;
    }
    let result = nul_trimmed(request.buffer).and_then(|path| {
        fs.remove(&path)?;
        debug!(path = %path, "removed");
        Ok(())
    });
    out.outcome("delete", result);
    true
}

pub(super) fn duplicate<F: FileSystem>(
    fs: &F,
    chunk_size: usize,
    request: &Request<'_>,
    out: &mut Responder<'_, F::Reader>,
) -> bool {
    if !request.is_complete() {
        return false;
    }
    let result = path_pair(request.buffer).and_then(|(source, dest)| {
        let copied = copy_file(fs, &source, &dest, chunk_size)?;
        debug!(source = %source, dest = %dest, bytes = copied, "duplicated");
        Ok(())
    });
    out.outcome("duplicate", result);
    true
}

pub(super) fn rename<F: FileSystem>(
    fs: &F,
    request: &Request<'_>,
    out: &mut Responder<'_, F::Reader>,
) -> bool {
    if !request.is_complete() {
        return false;
    }
    let result = path_pair(request.buffer).and_then(|(source, dest)| {
        fs.rename(&source, &dest)?;
        debug!(source = %source, dest = %dest, "moved");
        Ok(())
    });
    out.outcome("move", result);
    true
}

pub(super) fn make_dir<F: FileSystem>(
    fs: &F,
    request: &Request<'_>,
    out: &mut Responder<'_, F::Reader>,
) -> bool {
    if !request.is_complete() {
        return false;
    }
    let result = nul_trimmed(request.buffer).and_then(|path| {
        fs.make_dir(&path)?;
        debug!(path = %path, "directory created");
        Ok(())
    });
    out.outcome("mkdir", result);
    true
}
