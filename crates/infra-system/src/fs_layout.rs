// Filesystem layout adapter
// reason: globset for file-name patterns, tokio::fs to stay off the runtime threads,
// zip writing on the blocking pool
use async_trait::async_trait;
use globset::Glob;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use exporter_core::port::{FileLayout, LayoutError};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> LayoutError + '_ {
    move |source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn archive_error(path: &Path) -> impl FnOnce(zip::result::ZipError) -> LayoutError + '_ {
    move |e| LayoutError::Archive {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Regular files under `dir`, recursively; symlinked directories are not entered
fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), LayoutError> {
    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        let link_meta = std::fs::symlink_metadata(&path).map_err(io_error(&path))?;
        if link_meta.is_dir() {
            collect_files(&path, files)?;
        } else if std::fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
            files.push(path);
        }
    }
    Ok(())
}

/// Zip entry name: path relative to `root`, always `/`-separated
fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_archive(from: &Path, to: &Path) -> Result<usize, LayoutError> {
    let file = std::fs::File::create(to).map_err(io_error(to))?;
    // The archive may live inside the tree it packs
    let archive_path = to.canonicalize().map_err(io_error(to))?;

    let mut files = Vec::new();
    collect_files(from, &mut files)?;
    files.sort();

    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(file);
    let mut archived = 0;
    for path in &files {
        if path.canonicalize().map(|p| p == archive_path).unwrap_or(false) {
            continue;
        }
        zip.start_file(entry_name(from, path), options)
            .map_err(archive_error(to))?;
        let mut source = std::fs::File::open(path).map_err(io_error(path))?;
        std::io::copy(&mut source, &mut zip).map_err(io_error(path))?;
        archived += 1;
    }
    zip.finish().map_err(archive_error(to))?;

    Ok(archived)
}

/// Local filesystem implementation of [`FileLayout`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLayout;

impl FsLayout {
    pub fn new() -> Self {
        Self
    }

    /// Regular files directly under `from` whose name matches `pattern`, sorted
    async fn matching_files(&self, from: &Path, pattern: &str) -> Result<Vec<PathBuf>, LayoutError> {
        let matcher = Glob::new(pattern)
            .map_err(|e| LayoutError::Pattern(e.to_string()))?
            .compile_matcher();

        let metadata = tokio::fs::metadata(from).await.map_err(io_error(from))?;
        if !metadata.is_dir() {
            return Err(LayoutError::NotADirectory(from.to_path_buf()));
        }

        let mut entries = tokio::fs::read_dir(from).await.map_err(io_error(from))?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error(from))? {
            let path = entry.path();
            // Follows symlinks, so a link to a file is copied as that file
            let is_file = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if is_file && matcher.is_match(entry.file_name()) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl FileLayout for FsLayout {
    async fn ensure_dir(&self, dir: &Path) -> Result<(), LayoutError> {
        tokio::fs::create_dir_all(dir).await.map_err(io_error(dir))
    }

    async fn copy_matching(
        &self,
        from: &Path,
        pattern: &str,
        to: &Path,
    ) -> Result<usize, LayoutError> {
        let files = self.matching_files(from, pattern).await?;
        self.ensure_dir(to).await?;

        for source in &files {
            let Some(file_name) = source.file_name() else {
                continue;
            };
            let dest = to.join(file_name);
            tokio::fs::copy(source, &dest)
                .await
                .map_err(io_error(source))?;
            debug!(from = %source.display(), to = %dest.display(), "Copied file");
        }

        Ok(files.len())
    }

    async fn archive_dir(&self, from: &Path, to: &Path) -> Result<usize, LayoutError> {
        let metadata = tokio::fs::metadata(from).await.map_err(io_error(from))?;
        if !metadata.is_dir() {
            return Err(LayoutError::NotADirectory(from.to_path_buf()));
        }
        if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.ensure_dir(parent).await?;
        }

        let (source, dest) = (from.to_path_buf(), to.to_path_buf());
        let archived = tokio::task::spawn_blocking(move || write_archive(&source, &dest))
            .await
            .map_err(|e| LayoutError::Archive {
                path: to.to_path_buf(),
                message: e.to_string(),
            })??;

        debug!(from = %from.display(), to = %to.display(), files = archived, "Wrote archive");
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn test_copy_matching_filters_by_pattern() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        touch(src.path(), "engine_pc.pak", "engine");
        touch(src.path(), "game_pc.pak", "game");
        touch(src.path(), "notes.txt", "skip");
        std::fs::create_dir(src.path().join("nested.pak")).unwrap();

        let dest = out.path().join("Cache").join("pc");
        let copied = FsLayout::new()
            .copy_matching(src.path(), "*.pak", &dest)
            .await
            .unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            std::fs::read_to_string(dest.join("game_pc.pak")).unwrap(),
            "game"
        );
        assert!(dest.join("engine_pc.pak").exists());
        assert!(!dest.join("notes.txt").exists());
        assert!(!dest.join("nested.pak").exists());
    }

    #[tokio::test]
    async fn test_copy_overwrites_existing_files() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        touch(src.path(), "launch_client.cfg", "new");
        touch(out.path(), "launch_client.cfg", "old");

        FsLayout::new()
            .copy_matching(src.path(), "launch_*.*", out.path())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(out.path().join("launch_client.cfg")).unwrap(),
            "new"
        );
    }

    #[tokio::test]
    async fn test_missing_source_is_an_error() {
        let out = tempfile::tempdir().unwrap();
        let missing = out.path().join("does-not-exist");

        let err = FsLayout::new()
            .copy_matching(&missing, "*", out.path())
            .await
            .unwrap_err();

        assert!(matches!(err, LayoutError::Io { .. }));
    }

    #[tokio::test]
    async fn test_file_as_source_is_rejected() {
        let src = tempfile::tempdir().unwrap();
        touch(src.path(), "file.txt", "x");

        let err = FsLayout::new()
            .copy_matching(&src.path().join("file.txt"), "*", src.path())
            .await
            .unwrap_err();

        assert!(matches!(err, LayoutError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_rejected() {
        let src = tempfile::tempdir().unwrap();

        let err = FsLayout::new()
            .copy_matching(src.path(), "[", src.path())
            .await
            .unwrap_err();

        assert!(matches!(err, LayoutError::Pattern(_)));
    }

    fn read_entry(archive: &Path, name: &str) -> String {
        use std::io::Read;

        let file = std::fs::File::open(archive).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        let mut entry = zip.by_name(name).unwrap();
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        contents
    }

    #[tokio::test]
    async fn test_archive_dir_packs_tree_with_relative_names() {
        let out = tempfile::tempdir().unwrap();
        let release = out.path().join("release");
        let cache = release.join("Cache").join("pc");
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::create_dir_all(release.join("empty")).unwrap();
        touch(&release, "launch_client.cfg", "client");
        touch(&cache, "game_pc.pak", "game");

        let archive = out.path().join("dist").join("release.zip");
        let archived = FsLayout::new().archive_dir(&release, &archive).await.unwrap();

        assert_eq!(archived, 2);
        assert_eq!(read_entry(&archive, "Cache/pc/game_pc.pak"), "game");
        assert_eq!(read_entry(&archive, "launch_client.cfg"), "client");
        let zip = zip::ZipArchive::new(std::fs::File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 2);
    }

    #[tokio::test]
    async fn test_archive_inside_source_skips_itself() {
        let out = tempfile::tempdir().unwrap();
        touch(out.path(), "a.txt", "a");
        let archive = out.path().join("self.zip");
        std::fs::write(&archive, "stale").unwrap();

        let archived = FsLayout::new()
            .archive_dir(out.path(), &archive)
            .await
            .unwrap();

        assert_eq!(archived, 1);
        let mut zip = zip::ZipArchive::new(std::fs::File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
        assert!(zip.by_name("self.zip").is_err());
    }

    #[tokio::test]
    async fn test_archive_of_file_is_rejected() {
        let src = tempfile::tempdir().unwrap();
        touch(src.path(), "file.txt", "x");

        let err = FsLayout::new()
            .archive_dir(&src.path().join("file.txt"), &src.path().join("out.zip"))
            .await
            .unwrap_err();

        assert!(matches!(err, LayoutError::NotADirectory(_)));
        assert!(!src.path().join("out.zip").exists());
    }

    #[tokio::test]
    async fn test_ensure_dir_creates_parents() {
        let root = tempfile::tempdir().unwrap();
        let deep = root.path().join("Gems").join("AWSCore");

        FsLayout::new().ensure_dir(&deep).await.unwrap();

        assert!(deep.is_dir());
    }
}
