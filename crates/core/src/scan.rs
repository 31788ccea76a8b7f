use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::model::MediaUnit;

/// Recognized media file extensions, matched case-insensitively.
pub const MEDIA_EXTENSIONS: &[&str] = &["mid", "mp3", "ogg", "wav", "wma"];

pub fn is_media_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            MEDIA_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Walks a library root and classifies its contents into atomic media units.
///
/// The library convention is `root/artist/album/track…`: the top two tiers
/// are navigated entry by entry, while directories two levels down are
/// collapsed into single album units. `forced_albums` collapses a path in
/// the navigated tiers; `not_albums` keeps descending where a collapse would
/// normally happen; `ignore` skips a path outright. All three sets hold
/// paths relative to the scanned root.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    ignore: HashSet<PathBuf>,
    forced_albums: HashSet<PathBuf>,
    not_albums: HashSet<PathBuf>,
}

impl Scanner {
    pub fn new(ignore: &[PathBuf], forced_albums: &[PathBuf], not_albums: &[PathBuf]) -> Self {
        Self {
            ignore: ignore.iter().cloned().collect(),
            forced_albums: forced_albums.iter().cloned().collect(),
            not_albums: not_albums.iter().cloned().collect(),
        }
    }

    /// Scans `media_dir` into a catalog. Any traversal failure — including
    /// an entry that vanishes between listing and stat — aborts the scan;
    /// selection must never run against a partial catalog.
    pub fn scan(&self, media_dir: &Path) -> Result<Catalog> {
        let mut catalog = Catalog::new();
        self.scan_dir(media_dir, Path::new(""), 0, &mut catalog)?;
        debug!(
            "scanned {}: {} unit(s), {} byte(s)",
            media_dir.display(),
            catalog.len(),
            catalog.total_size()
        );
        Ok(catalog)
    }

    // The scanned root itself sits at depth 0, artists at 1, albums at 2.
    fn scan_dir(
        &self,
        media_dir: &Path,
        dir_rel: &Path,
        depth: usize,
        out: &mut Catalog,
    ) -> Result<()> {
        if self.ignore.contains(dir_rel) {
            return Ok(());
        }

        if depth < 2 {
            // Root or artist tier: navigated, unless forced into an album.
            if self.forced_albums.contains(dir_rel) {
                self.scan_album(media_dir, dir_rel, out)
            } else {
                self.scan_tier(media_dir, dir_rel, depth, out)
            }
        } else if self.not_albums.contains(dir_rel) {
            self.scan_tier(media_dir, dir_rel, depth, out)
        } else {
            self.scan_album(media_dir, dir_rel, out)
        }
    }

    fn scan_tier(
        &self,
        media_dir: &Path,
        dir_rel: &Path,
        depth: usize,
        out: &mut Catalog,
    ) -> Result<()> {
        let full = media_dir.join(dir_rel);
        let reader = fs::read_dir(&full).map_err(|source| Error::Scan {
            path: full.clone(),
            source,
        })?;

        for entry in reader {
            let entry = entry.map_err(|source| Error::Scan {
                path: full.clone(),
                source,
            })?;
            let entry_path = entry.path();
            // fs::metadata resolves symlinks, like the rest of the pipeline.
            let metadata = fs::metadata(&entry_path).map_err(|source| Error::Scan {
                path: entry_path.clone(),
                source,
            })?;
            let rel = dir_rel.join(entry.file_name());

            if metadata.is_file() {
                self.scan_file(&rel, metadata.len(), out);
            } else if metadata.is_dir() {
                self.scan_dir(media_dir, &rel, depth + 1, out)?;
            }
        }
        Ok(())
    }

    fn scan_file(&self, file_rel: &Path, size_bytes: u64, out: &mut Catalog) {
        if self.ignore.contains(file_rel) {
            return;
        }
        if is_media_path(file_rel) {
            out.insert(MediaUnit::file(file_rel, size_bytes));
        }
    }

    /// Collapses a whole subtree into one album unit sized as the sum of the
    /// media files beneath it. An album with no media content is not a unit
    /// at all.
    fn scan_album(&self, media_dir: &Path, album_rel: &Path, out: &mut Catalog) -> Result<()> {
        let full = media_dir.join(album_rel);
        let mut total_size = 0_u64;

        for entry in WalkDir::new(&full) {
            let entry = entry.map_err(|err| {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| full.clone());
                Error::Scan {
                    path,
                    source: err.into(),
                }
            })?;
            if !entry.file_type().is_file() || !is_media_path(entry.path()) {
                continue;
            }
            let metadata = entry.metadata().map_err(|err| Error::Scan {
                path: entry.path().to_path_buf(),
                source: err.into(),
            })?;
            total_size = total_size.saturating_add(metadata.len());
        }

        if total_size > 0 {
            out.insert(MediaUnit::album(album_rel, total_size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::{is_media_path, Scanner};
    use crate::model::MediaKind;

    fn write_file(root: &Path, rel: &str, size: usize) {
        let full = root.join(rel);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, vec![0_u8; size]).unwrap();
    }

    fn library() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_file(root, "loose.mp3", 10);
        write_file(root, "readme.txt", 999);
        write_file(root, "artist1/single.OGG", 5);
        write_file(root, "artist1/album1/t1.mp3", 100);
        write_file(root, "artist1/album1/t2.ogg", 50);
        write_file(root, "artist1/album1/cover.jpg", 4096);
        write_file(root, "artist1/scans/front.jpg", 123);
        write_file(root, "artist2/album2/disc1/d.wav", 70);
        write_file(root, "artist2/album2/t.mp3", 30);
        dir
    }

    #[test]
    fn recognizes_media_extensions_case_insensitively() {
        assert!(is_media_path(Path::new("a/b.MP3")));
        assert!(is_media_path(Path::new("b.wma")));
        assert!(!is_media_path(Path::new("cover.jpg")));
        assert!(!is_media_path(Path::new("no-extension")));
    }

    #[test]
    fn classifies_tiers_and_collapses_albums() {
        let dir = library();
        let catalog = Scanner::default().scan(dir.path()).unwrap();

        let loose = catalog.get(Path::new("loose.mp3")).unwrap();
        assert_eq!(loose.kind, MediaKind::File);
        assert_eq!(loose.size_bytes, 10);

        let single = catalog.get(Path::new("artist1/single.OGG")).unwrap();
        assert_eq!(single.kind, MediaKind::File);

        // Album size counts only media files; the jpeg is ignored.
        let album1 = catalog.get(Path::new("artist1/album1")).unwrap();
        assert_eq!(album1.kind, MediaKind::Album);
        assert_eq!(album1.size_bytes, 150);

        // Nested directories fold into their album.
        let album2 = catalog.get(Path::new("artist2/album2")).unwrap();
        assert_eq!(album2.size_bytes, 100);

        // Non-media root files and the media-free scans/ album vanish.
        assert!(!catalog.contains(Path::new("readme.txt")));
        assert!(!catalog.contains(Path::new("artist1/scans")));

        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.total_size(), 10 + 5 + 150 + 100);
    }

    #[test]
    fn forced_album_collapses_an_artist_directory() {
        let dir = library();
        let scanner = Scanner::new(&[], &[PathBuf::from("artist1")], &[]);
        let catalog = scanner.scan(dir.path()).unwrap();

        let artist = catalog.get(Path::new("artist1")).unwrap();
        assert_eq!(artist.kind, MediaKind::Album);
        assert_eq!(artist.size_bytes, 5 + 150);
        assert!(!catalog.contains(Path::new("artist1/album1")));
    }

    #[test]
    fn forced_not_album_descends_into_an_album_directory() {
        let dir = library();
        let scanner = Scanner::new(&[], &[], &[PathBuf::from("artist1/album1")]);
        let catalog = scanner.scan(dir.path()).unwrap();

        assert!(!catalog.contains(Path::new("artist1/album1")));
        let track = catalog.get(Path::new("artist1/album1/t1.mp3")).unwrap();
        assert_eq!(track.kind, MediaKind::File);
        assert_eq!(track.size_bytes, 100);
        assert!(catalog.contains(Path::new("artist1/album1/t2.ogg")));
        assert!(!catalog.contains(Path::new("artist1/album1/cover.jpg")));
    }

    #[test]
    fn ignored_paths_are_skipped_entirely() {
        let dir = library();
        let scanner = Scanner::new(
            &[PathBuf::from("artist2"), PathBuf::from("loose.mp3")],
            &[],
            &[],
        );
        let catalog = scanner.scan(dir.path()).unwrap();

        assert!(!catalog.contains(Path::new("loose.mp3")));
        assert!(!catalog.contains(Path::new("artist2/album2")));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn missing_root_is_a_scan_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(Scanner::default().scan(&missing).is_err());
    }
}
