//! Zip archiving of the working tree
//!
//! The archive is a plain recursive zip of the working directory. Entries are
//! written in sorted order, so the same tree always produces the same entry
//! list. Symlinks are stored as links and unix permission bits are preserved.

use crate::error::{TreestashError, TreestashResult};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Version-control metadata directory removed when `remove_vcs_dir` is set
pub const VCS_DIR: &str = ".git";

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Compresses and expands working-tree archives
#[derive(Debug, Clone)]
pub struct Archiver {
    file_name: String,
    quiet: bool,
}

impl Archiver {
    /// Create an archiver writing `file_name` into the working directory
    pub fn new(file_name: impl Into<String>, quiet: bool) -> Self {
        Self {
            file_name: file_name.into(),
            quiet,
        }
    }

    /// Path of the archive produced by [`Archiver::archive`]
    pub fn archive_path(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.file_name)
    }

    /// Zip `workdir` into its archive file, optionally deleting `.git` first
    pub async fn archive(&self, workdir: &Path, remove_vcs_dir: bool) -> TreestashResult<PathBuf> {
        if remove_vcs_dir {
            let vcs_dir = workdir.join(VCS_DIR);
            info!("Removing {} folder", VCS_DIR);
            match tokio::fs::remove_dir_all(&vcs_dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{} not present, nothing to remove", vcs_dir.display());
                }
                Err(e) => {
                    return Err(TreestashError::io(
                        format!("removing {}", vcs_dir.display()),
                        e,
                    ))
                }
            }
        }

        let dest = self.archive_path(workdir);
        let root = workdir.to_path_buf();
        let out = dest.clone();
        let quiet = self.quiet;

        let entries = tokio::task::spawn_blocking(move || write_archive(&root, &out, quiet)).await??;
        info!("Created {} with {} entries", dest.display(), entries);

        Ok(dest)
    }

    /// Expand `archive` into `workdir`, overwriting colliding paths
    pub async fn unarchive(&self, archive: &Path, workdir: &Path) -> TreestashResult<usize> {
        let src = archive.to_path_buf();
        let root = workdir.to_path_buf();
        let quiet = self.quiet;

        let entries = tokio::task::spawn_blocking(move || extract_archive(&src, &root, quiet)).await??;
        info!("Expanded {} entries from {}", entries, archive.display());

        Ok(entries)
    }
}

/// Archive entry name for a path relative to the root, always `/`-separated.
/// `None` when a component is not valid UTF-8.
fn entry_name(relative: &Path) -> Option<String> {
    relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .map(|parts| parts.join("/"))
}

fn write_archive(root: &Path, dest: &Path, quiet: bool) -> TreestashResult<usize> {
    let file = fs::File::create(dest)
        .map_err(|e| TreestashError::io(format!("creating {}", dest.display()), e))?;
    let mut zip = ZipWriter::new(file);
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut count = 0;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| TreestashError::archive(root, e))?;
        let path = entry.path();
        if path == dest {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .map_err(|e| TreestashError::archive(path, e))?;
        let name = entry_name(relative).ok_or_else(|| {
            TreestashError::archive(path, "file name is not valid UTF-8")
        })?;
        let metadata = entry
            .metadata()
            .map_err(|e| TreestashError::archive(path, e))?;
        let options = base.unix_permissions(unix_mode(&metadata));
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            let target = fs::read_link(path)
                .map_err(|e| TreestashError::io(format!("reading link {}", path.display()), e))?;
            zip.add_symlink(name.clone(), target.to_string_lossy(), options)
                .map_err(|e| TreestashError::archive(dest, e))?;
        } else if file_type.is_dir() {
            zip.add_directory(format!("{}/", name), options)
                .map_err(|e| TreestashError::archive(dest, e))?;
        } else {
            let mut source = fs::File::open(path)
                .map_err(|e| TreestashError::io(format!("reading {}", path.display()), e))?;
            zip.start_file(name.clone(), options)
                .map_err(|e| TreestashError::archive(dest, e))?;
            io::copy(&mut source, &mut zip)
                .map_err(|e| TreestashError::io(format!("writing {}", dest.display()), e))?;
        }

        if !quiet {
            info!("  adding: {}", name);
        }
        count += 1;
    }

    zip.finish().map_err(|e| TreestashError::archive(dest, e))?;
    Ok(count)
}

fn extract_archive(src: &Path, root: &Path, quiet: bool) -> TreestashResult<usize> {
    let file = fs::File::open(src)
        .map_err(|e| TreestashError::io(format!("opening {}", src.display()), e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| TreestashError::archive(src, e))?;
    let mut count = 0;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| TreestashError::archive(src, e))?;
        let Some(enclosed) = entry.enclosed_name() else {
            return Err(TreestashError::UnsafeEntry(entry.name().to_string()));
        };
        if enclosed
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(TreestashError::UnsafeEntry(entry.name().to_string()));
        }
        let out_path = root.join(&enclosed);
        let mode = entry.unix_mode();

        if let Some(link) = linked_ancestor(root, &enclosed, entry.is_dir()) {
            return Err(TreestashError::UnsafeEntry(format!(
                "{} (through symlink {})",
                entry.name(),
                link.display()
            )));
        }

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| TreestashError::io(format!("creating {}", out_path.display()), e))?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| TreestashError::io(format!("creating {}", parent.display()), e))?;
            }
            remove_existing(&out_path)?;

            if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
                let mut target = String::new();
                io::Read::read_to_string(&mut entry, &mut target)
                    .map_err(|e| TreestashError::archive(src, e))?;
                create_symlink(&target, &out_path)?;
            } else {
                let mut outfile = fs::File::create(&out_path)
                    .map_err(|e| TreestashError::io(format!("creating {}", out_path.display()), e))?;
                io::copy(&mut entry, &mut outfile)
                    .map_err(|e| TreestashError::io(format!("writing {}", out_path.display()), e))?;
                set_mode(&out_path, mode)?;
            }
        }

        if !quiet {
            info!("  inflating: {}", enclosed.display());
        }
        count += 1;
    }

    Ok(count)
}

/// First existing symlink among the directories an entry is written through.
/// For directory entries the entry path itself counts.
fn linked_ancestor(root: &Path, relative: &Path, include_self: bool) -> Option<PathBuf> {
    let components: Vec<_> = relative.components().collect();
    let depth = if include_self {
        components.len()
    } else {
        components.len().saturating_sub(1)
    };

    let mut current = root.to_path_buf();
    for component in &components[..depth] {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return Some(current),
            Ok(_) => {}
            // Nothing below a missing directory can be a link yet
            Err(_) => return None,
        }
    }
    None
}

/// Clear a colliding path so links are never written through
fn remove_existing(path: &Path) -> TreestashResult<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return Ok(()),
    }
    .map_err(|e| TreestashError::io(format!("replacing {}", path.display()), e))
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else {
        0o644
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: Option<u32>) -> TreestashResult<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| TreestashError::io(format!("setting mode on {}", path.display()), e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: Option<u32>) -> TreestashResult<()> {
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &str, link: &Path) -> TreestashResult<()> {
    std::os::unix::fs::symlink(target, link)
        .map_err(|e| TreestashError::io(format!("creating link {}", link.display()), e))
}

#[cfg(not(unix))]
fn create_symlink(target: &str, link: &Path) -> TreestashResult<()> {
    // No portable symlinks; keep the target path as file content
    fs::write(link, target)
        .map_err(|e| TreestashError::io(format!("creating {}", link.display()), e))
}
