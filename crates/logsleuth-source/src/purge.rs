use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::SourceError;

/// Remove every line of `path` for which `predicate` returns true.
///
/// The predicate sees each line as lossy UTF-8 without its terminator. Kept
/// lines are copied byte for byte into a sibling temp file that inherits the
/// original's permissions and then replaces it via rename. Lines appended
/// while the copy runs are picked up before the rename; a file that shrinks
/// meanwhile fails with [`SourceError::Truncated`]. A writer that keeps its
/// descriptor open across the rename still appends to the replaced file.
///
/// Returns the number of removed lines. The file is left untouched when
/// nothing matches.
pub fn purge_lines<F>(path: &Path, predicate: F) -> Result<usize, SourceError>
where
    F: Fn(&str) -> bool,
{
    let tmp_path = temp_path_for(path);

    let removed = match rewrite(path, &tmp_path, &predicate) {
        Ok(removed) => removed,
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
    };

    if removed == 0 {
        let _ = fs::remove_file(&tmp_path);
        debug!(path = %path.display(), "No lines matched purge predicate");
        return Ok(0);
    }

    fs::rename(&tmp_path, path).map_err(|e| SourceError::from_io(path, e))?;
    info!(path = %path.display(), removed, "Purged log lines");
    Ok(removed)
}

/// Copy the kept lines of `path` into `tmp_path`, following appends until the
/// file length matches what was read.
fn rewrite<F>(path: &Path, tmp_path: &Path, predicate: &F) -> Result<usize, SourceError>
where
    F: Fn(&str) -> bool,
{
    let source = File::open(path).map_err(|e| SourceError::from_io(path, e))?;
    let permissions = source
        .metadata()
        .map_err(|e| SourceError::from_io(path, e))?
        .permissions();
    let mut reader = BufReader::new(source);

    let tmp = File::create(tmp_path).map_err(|e| SourceError::from_io(tmp_path, e))?;
    let mut writer = BufWriter::new(tmp);

    let mut partial = Vec::new();
    let mut consumed = 0u64;
    let mut removed = 0;

    loop {
        let pass = copy_complete_lines(&mut reader, &mut writer, &mut partial, predicate)
            .map_err(|e| match e {
                CopyError::Read(e) => SourceError::from_io(path, e),
                CopyError::Write(e) => SourceError::from_io(tmp_path, e),
            })?;
        removed += pass.removed;
        consumed += pass.bytes_read;

        let len = fs::metadata(path)
            .map_err(|e| SourceError::from_io(path, e))?
            .len();
        if len == consumed {
            break;
        }
        if len < consumed {
            return Err(SourceError::Truncated {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %path.display(), appended = len - consumed, "Log grew during purge");
    }

    // An unterminated last line is only final once the file stopped growing.
    if !partial.is_empty() {
        if predicate(&line_text(&partial)) {
            removed += 1;
        } else {
            writer
                .write_all(&partial)
                .map_err(|e| SourceError::from_io(tmp_path, e))?;
        }
    }

    let tmp = writer
        .into_inner()
        .map_err(|e| SourceError::from_io(tmp_path, e.into_error()))?;
    tmp.sync_all()
        .map_err(|e| SourceError::from_io(tmp_path, e))?;
    drop(tmp);
    fs::set_permissions(tmp_path, permissions).map_err(|e| SourceError::from_io(tmp_path, e))?;

    Ok(removed)
}

struct Pass {
    removed: usize,
    bytes_read: u64,
}

enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

/// Copy every newline-terminated line up to EOF. A trailing unterminated
/// fragment is left in `partial` so a later pass can complete it.
fn copy_complete_lines<R, W, F>(
    reader: &mut R,
    writer: &mut W,
    partial: &mut Vec<u8>,
    predicate: &F,
) -> Result<Pass, CopyError>
where
    R: BufRead,
    W: Write,
    F: Fn(&str) -> bool,
{
    let mut pass = Pass {
        removed: 0,
        bytes_read: 0,
    };

    loop {
        let n = reader.read_until(b'\n', partial).map_err(CopyError::Read)?;
        pass.bytes_read += n as u64;
        if n == 0 || partial.last() != Some(&b'\n') {
            return Ok(pass);
        }

        if predicate(&line_text(partial)) {
            pass.removed += 1;
        } else {
            writer.write_all(partial).map_err(CopyError::Write)?;
        }
        partial.clear();
    }
}

/// Line content without `\n` or `\r\n`, decoded lossily.
fn line_text(raw: &[u8]) -> Cow<'_, str> {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    path.with_file_name(format!(".{}.purge-{}", name, std::process::id()))
}
