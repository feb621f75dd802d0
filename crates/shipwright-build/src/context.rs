use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use shipwright_core::SCRATCH_PREFIX;
use std::fs;
use std::io::Write;
use std::path::Path;
use tar::Builder;

/// コンテキストに含めないディレクトリ名
const EXCLUDED_DIRS: &[&str] = &[".git"];

pub struct ContextBuilder;

impl ContextBuilder {
    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// `.git` とスクラッチディレクトリは除外し、レンダリング済みの
    /// Dockerfile をアーカイブ直下の `Dockerfile` として追加する。
    pub fn create_context(context_path: &Path, dockerfile_path: &Path) -> BuildResult<Vec<u8>> {
        if !context_path.is_dir() {
            return Err(BuildError::ContextNotFound(context_path.to_path_buf()));
        }
        tracing::debug!("Creating build context from: {}", context_path.display());

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);
            tar.follow_symlinks(false);

            Self::append_dir(&mut tar, context_path, Path::new(""))?;

            let dockerfile_content = fs::read(dockerfile_path)?;
            let mut header = tar::Header::new_gnu();
            header.set_path("Dockerfile")?;
            header.set_size(dockerfile_content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, &dockerfile_content[..])?;

            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());
        Self::check_context_size(archive_data.len());

        Ok(archive_data)
    }

    fn append_dir<W: Write>(tar: &mut Builder<W>, root: &Path, relative: &Path) -> BuildResult<()> {
        let mut entries: Vec<_> = fs::read_dir(root.join(relative))?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            let path = relative.join(&name);
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                if Self::is_excluded_dir(&name_str) {
                    tracing::trace!("Skipping {}", path.display());
                    continue;
                }
                tar.append_dir(&path, entry.path())?;
                Self::append_dir(tar, root, &path)?;
            } else {
                // 直下の Dockerfile はレンダリング結果で置き換える
                if relative.as_os_str().is_empty() && name_str == "Dockerfile" {
                    continue;
                }
                tar.append_path_with_name(entry.path(), &path)?;
            }
        }

        Ok(())
    }

    fn is_excluded_dir(name: &str) -> bool {
        EXCLUDED_DIRS.contains(&name) || name.starts_with(SCRATCH_PREFIX)
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "警告: ビルドコンテキストが大きすぎます（{}MB）\n\
                 ビルドディレクトリに不要なファイルが含まれていないか確認してください。",
                size / 1024 / 1024
            );
        }
    }
}
