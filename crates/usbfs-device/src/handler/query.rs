//! Read-only commands: Heartbeat, ListDir, ReadFile.

use std::io::{ErrorKind, Read};

use tracing::{debug, warn};

use super::{nul_trimmed, Request, Responder, LIST_FAILED, OPEN_FAILED};
use crate::fs::{FileSystem, FsError, FsResult};

/// Payloads this short are placeholders and mean the root directory.
const ROOT_PLACEHOLDER_MAX: u32 = 2;

pub(super) fn heartbeat<R: Read>(request: &Request<'_>, out: &mut Responder<'_, R>) -> bool {
    if !request.is_complete() {
        return false;
    }
    out.ok();
    true
}

pub(super) fn list_dir<F: FileSystem>(
    fs: &F,
    request: &Request<'_>,
    out: &mut Responder<'_, F::Reader>,
) -> bool {
    if !request.is_complete() {
        return false;
    }

    let path = if request.declared_size <= ROOT_PLACEHOLDER_MAX {
        Ok("/".to_string())
    } else {
        nul_trimmed(request.buffer)
    };

    match path.and_then(|path| render_listing(fs, &path)) {
        Ok(listing) => out.text(&listing),
        Err(err) => {
            warn!(error = %err, "directory listing failed");
            out.text(LIST_FAILED);
        }
    }
    true
}

/// `path` followed by `\n<d|f><name>` per entry.
pub(crate) fn render_listing<F: FileSystem>(fs: &F, path: &str) -> FsResult<String> {
    let entries = fs.list(path)?;
    let mut listing = String::with_capacity(path.len() + entries.len() * 16);
    listing.push_str(path);
    for entry in &entries {
        listing.push('\n');
        listing.push(entry.kind.marker());
        listing.push_str(&entry.name);
    }
    debug!(path, entries = entries.len(), "directory listed");
    Ok(listing)
}

/// Queue the file header; the body streams from the outbox in chunks.
pub(super) fn read_file<F: FileSystem>(
    fs: &F,
    request: &Request<'_>,
    out: &mut Responder<'_, F::Reader>,
) -> bool {
    if !request.is_complete() {
        return false;
    }

    let opened = nul_trimmed(request.buffer).and_then(|path| {
        let size = fs.file_size(&path)?;
        let size = u32::try_from(size).map_err(|_| {
            FsError::io(
                "stat",
                &path,
                std::io::Error::new(ErrorKind::FileTooLarge, "file exceeds frame size"),
            )
        })?;
        let reader = fs.open(&path)?;
        Ok((path, size, reader))
    });

    match opened {
        Ok((path, size, reader)) => {
            debug!(path = %path, size, "streaming file");
            out.file(path, reader, size);
        }
        Err(err) => {
            warn!(error = %err, "file cannot be read");
            out.text(OPEN_FAILED);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use crate::fs::tests::scratch_root;
    use crate::fs::LocalFs;

    use super::*;

    #[test]
    fn root_listing_matches_wire_format() {
        let root = scratch_root("listing-root");
        std::fs::write(root.join("a.txt"), b"a").unwrap();
        std::fs::create_dir(root.join("sub")).unwrap();

        let fs = LocalFs::new(&root);
        assert_eq!(render_listing(&fs, "/").unwrap(), "/\nfa.txt\ndsub");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn nested_listing_uses_same_separators() {
        let root = scratch_root("listing-nested");
        std::fs::create_dir_all(root.join("lib/deep")).unwrap();
        std::fs::write(root.join("lib/util.py"), b"").unwrap();

        let fs = LocalFs::new(&root);
        assert_eq!(render_listing(&fs, "/lib").unwrap(), "/lib\nddeep\nfutil.py");
        assert_eq!(render_listing(&fs, "/lib/deep").unwrap(), "/lib/deep");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let root = scratch_root("listing-missing");
        let fs = LocalFs::new(&root);
        assert!(render_listing(&fs, "/nope").unwrap_err().is_not_found());
        let _ = std::fs::remove_dir_all(&root);
    }
}
