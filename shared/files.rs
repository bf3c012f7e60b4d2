use log::debug;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;

/// Creates `path` and any missing parents, like `mkdir -p`.
///
/// An existing directory is not an error. An existing non-directory entry at
/// `path`, and every other OS failure, is returned unchanged.
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> io::Result<()> {
    let path = path.as_ref();
    match fs::create_dir_all(path) {
        Ok(()) => {
            debug!("Ensured directory {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(err) => Err(err),
    }
}

/// Opens `path` for writing, truncating an existing file and creating the
/// parent directory when needed.
pub fn create_output_file<P: AsRef<Path>>(path: P) -> io::Result<BufWriter<File>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}
