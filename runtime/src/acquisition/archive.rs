//! KMZ unpacking: pull the `doc.kml` entry out of a zip archive.

use crate::error::{KmlError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// Entry every KMZ package is expected to carry at its root.
pub const KMZ_ROOT_ENTRY: &str = "doc.kml";

/// Local file header signature that starts every zip archive.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Whether the payload looks like a zip archive.
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

/// Extract only `doc.kml` from the archive at `archive` into `dest_dir`.
///
/// Returns the path of the extracted file. An archive without a `doc.kml`
/// entry is a [`KmlError::Parse`].
pub fn extract_doc_kml(archive: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;

    let mut entry = match zip.by_name(KMZ_ROOT_ENTRY) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            warn!("could not find {KMZ_ROOT_ENTRY} in {}", archive.display());
            return Err(KmlError::Parse(format!(
                "malformed archive: no {KMZ_ROOT_ENTRY} entry in {}",
                archive.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    std::fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(KMZ_ROOT_ENTRY);
    let mut out = File::create(&dest)?;
    std::io::copy(&mut entry, &mut out)?;

    info!("extracted {KMZ_ROOT_ENTRY} from {}", archive.display());
    Ok(dest)
}

/// Build an in-memory zip archive from `(name, contents)` entries.
#[cfg(test)]
pub(crate) fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
