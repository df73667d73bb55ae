//! Recursive attribute reader for sysfs and debugfs
//!
//! Reading an attribute must not leave the device awake, so the subtests
//! visit every regular file under a directory and drain it. Symlinks are
//! not followed; sysfs is full of loops.

use crate::error::{PmError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Deepest directory level visited
pub const MAX_DEPTH: usize = 128;

/// Bytes requested per `read(2)`
pub const READ_CHUNK: usize = 128;

/// Call `visit` for every regular file under `root`
///
/// Returns the number of files visited.
///
/// # Errors
///
/// Returns error if a directory cannot be listed, the tree is deeper than
/// [`MAX_DEPTH`], or `visit` fails.
pub fn walk_files(root: &Path, visit: &mut dyn FnMut(&Path) -> Result<()>) -> Result<usize> {
    walk(root, 0, visit)
}

fn walk(dir: &Path, depth: usize, visit: &mut dyn FnMut(&Path) -> Result<()>) -> Result<usize> {
    if depth >= MAX_DEPTH {
        return Err(PmError::Io {
            source: std::io::Error::other(format!(
                "{} is nested deeper than {MAX_DEPTH} levels",
                dir.display()
            )),
        });
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?.flatten().map(|e| e.path()).collect();
    entries.sort();

    let mut visited = 0;
    for path in entries {
        let Ok(meta) = std::fs::symlink_metadata(&path) else {
            continue;
        };
        let ft = meta.file_type();

        if ft.is_dir() {
            visited += walk(&path, depth + 1, visit)?;
        } else if ft.is_file() {
            visit(&path)?;
            visited += 1;
        }
    }

    Ok(visited)
}

/// Read `path` to the end in [`READ_CHUNK`] pieces
///
/// Returns `Ok(None)` when the file cannot be opened (write-only or
/// permission-restricted attributes). A read error ends the file early;
/// plenty of attributes refuse reads on some hardware.
///
/// # Errors
///
/// Never fails at present; read errors are logged and end the file.
pub fn drain_file(path: &Path) -> Result<Option<usize>> {
    let Ok(mut file) = File::open(path) else {
        debug!("Skipping unopenable {}", path.display());
        return Ok(None);
    };

    let mut buf = [0u8; READ_CHUNK];
    let mut total = 0;
    loop {
        match file.read(&mut buf) {
            Ok(n) => {
                total += n;
                if n < READ_CHUNK {
                    break;
                }
            }
            Err(e) => {
                debug!("Read of {} stopped: {e}", path.display());
                break;
            }
        }
    }

    Ok(Some(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visits_regular_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("top"), "x").unwrap();
        std::fs::write(dir.path().join("a/b/deep"), "y").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("a/loop")).unwrap();

        let mut seen = Vec::new();
        let n = walk_files(dir.path(), &mut |p| {
            seen.push(p.strip_prefix(dir.path()).unwrap().to_path_buf());
            Ok(())
        })
        .unwrap();

        assert_eq!(n, 2);
        assert_eq!(seen, [Path::new("a/b/deep"), Path::new("top")]);
    }

    #[test]
    fn drains_across_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attr");
        std::fs::write(&path, vec![b'z'; READ_CHUNK * 2 + 7]).unwrap();

        assert_eq!(drain_file(&path).unwrap(), Some(READ_CHUNK * 2 + 7));
        assert_eq!(drain_file(&dir.path().join("missing")).unwrap(), None);
    }

    #[test]
    fn visitor_error_stops_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one"), "1").unwrap();
        std::fs::write(dir.path().join("two"), "2").unwrap();

        let mut calls = 0;
        let r = walk_files(dir.path(), &mut |_| {
            calls += 1;
            Err(PmError::contract_violation("x"))
        });
        assert!(r.is_err());
        assert_eq!(calls, 1);
    }
}
