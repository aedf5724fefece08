//! Git references and their reflogs
//!
//! References are human-readable names pointing to objects. They can be:
//! - Direct: containing an object id
//! - Symbolic: pointing to another reference (e.g., HEAD -> refs/heads/master)
//!
//! Every reference may carry a reflog under `.git/logs/<refname>`, an
//! append-only record of the values the reference has taken.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::reflog::entry::ReflogEntry;
use anyhow::Context;
use derive_new::new;
use file_guard::Lock;
use std::io::Write;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

/// Symbolic references are followed at most this deep
const MAX_SYMREF_DEPTH: usize = 5;

const SYMREF_PREFIX: &str = "ref: ";

/// Value stored in a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    Symbolic(String),
    Direct(ObjectId),
}

/// Reference store seam used by the expiry engine
pub trait RefStore {
    /// Visit every reference under `refs/`, symbolic ones included
    fn for_each_ref(
        &self,
        visit: &mut dyn FnMut(&str, &RefValue) -> anyhow::Result<()>,
    ) -> anyhow::Result<()>;

    /// Follow a reference down to an object id; `Ok(None)` if it does not exist
    fn resolve_ref(&self, refname: &str) -> anyhow::Result<Option<ObjectId>>;

    fn read_ref_value(&self, refname: &str) -> anyhow::Result<Option<RefValue>>;

    /// Point a reference (or the ref a symbolic reference names) at `oid`
    fn update_ref(&self, refname: &str, oid: &ObjectId) -> anyhow::Result<()>;

    /// Reflog entries of one reference, oldest first
    fn read_reflog(&self, refname: &str) -> anyhow::Result<Vec<ReflogEntry>>;

    /// Replace the reflog of a reference
    fn write_reflog(&self, refname: &str, entries: &[ReflogEntry]) -> anyhow::Result<()>;

    fn reflog_exists(&self, refname: &str) -> bool;

    /// Names of every reference that has a reflog
    fn list_reflogs(&self) -> anyhow::Result<Vec<String>>;

    fn for_each_reflog_entry(
        &self,
        refname: &str,
        visit: &mut dyn FnMut(&ReflogEntry) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        for entry in self.read_reflog(refname)? {
            visit(&entry)?;
        }
        Ok(())
    }
}

/// Whether `refname` names a HEAD, of the current or of any worktree
pub fn is_head(refname: &str) -> bool {
    let stripped = refname
        .strip_prefix("main-worktree/")
        .or_else(|| {
            refname
                .strip_prefix("worktrees/")
                .and_then(|rest| rest.split_once('/'))
                .map(|(_, rest)| rest)
        })
        .unwrap_or(refname);

    stripped == HEAD_REF_NAME
}

/// File-backed references under a `.git` directory
#[derive(Debug, new)]
pub struct Refs {
    path: Box<Path>,
}

impl Refs {
    fn parse_ref_content(content: &str) -> anyhow::Result<Option<RefValue>> {
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        match content.strip_prefix(SYMREF_PREFIX) {
            Some(target) => Ok(Some(RefValue::Symbolic(target.trim().to_string()))),
            None => Ok(Some(RefValue::Direct(ObjectId::try_parse(
                content.to_string(),
            )?))),
        }
    }

    fn ref_path(&self, refname: &str) -> PathBuf {
        self.path.join(refname)
    }

    fn log_path(&self, refname: &str) -> PathBuf {
        self.logs_path().join(refname)
    }

    /// Whether `path` is a regular file; a path that exists but cannot be inspected is an error
    fn is_file(path: &Path) -> anyhow::Result<bool> {
        match std::fs::metadata(path) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("unable to stat {path:?}")),
        }
    }

    /// Every file below `root` named relative to `base`, sorted, lock files left out
    ///
    /// An entry that cannot be read fails the whole listing: a ref missing from
    /// it would have its objects treated as garbage.
    fn list_files(root: &Path, base: &Path) -> anyhow::Result<Vec<String>> {
        match std::fs::metadata(root) {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err).with_context(|| format!("unable to stat {root:?}")),
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry.with_context(|| format!("unable to list {root:?}"))?;
            // followed through symlinks; a listed entry that cannot be stat'ed is an error
            let metadata = std::fs::metadata(entry.path())
                .with_context(|| format!("unable to stat {:?}", entry.path()))?;
            if !metadata.is_file() {
                continue;
            }

            let relative_path = entry
                .path()
                .strip_prefix(base)
                .with_context(|| format!("{:?} is outside of {base:?}", entry.path()))?;
            let name = relative_path.to_string_lossy().replace('\\', "/");
            if !name.ends_with(".lock") {
                names.push(name);
            }
        }
        names.sort();

        Ok(names)
    }

    /// Expand a short name (`master`, `v1.0`) to the full name of a ref with a reflog
    ///
    /// Candidates are tried in the order `<name>`, `refs/<name>`,
    /// `refs/tags/<name>`, `refs/heads/<name>`, `refs/remotes/<name>`; the
    /// ref itself need not exist any more.
    pub fn dwim_log(&self, name: &str) -> Option<String> {
        Self::dwim_candidates(name)
            .into_iter()
            .find(|candidate| self.reflog_exists(candidate))
    }

    fn dwim_candidates(name: &str) -> Vec<String> {
        vec![
            name.to_string(),
            format!("refs/{name}"),
            format!("refs/tags/{name}"),
            format!("refs/heads/{name}"),
            format!("refs/remotes/{name}"),
        ]
    }

    /// Write a reference file under an exclusive lock
    pub fn write_ref(&self, refname: &str, value: &RefValue) -> anyhow::Result<()> {
        let path = self.ref_path(refname);
        std::fs::create_dir_all(path.parent().with_context(|| {
            format!("failed to create parent directories for ref file at {path:?}")
        })?)?;

        let content = match value {
            RefValue::Symbolic(target) => format!("{SYMREF_PREFIX}{target}\n"),
            RefValue::Direct(oid) => format!("{oid}\n"),
        };

        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("failed to open ref file at {path:?}"))?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        lock.deref_mut().write_all(content.as_bytes())?;

        Ok(())
    }

    /// Append one entry to the reflog of `refname`, creating the log if needed
    pub fn append_reflog(&self, refname: &str, entry: &ReflogEntry) -> anyhow::Result<()> {
        let path = self.log_path(refname);
        std::fs::create_dir_all(
            path.parent()
                .with_context(|| format!("invalid reflog path {path:?}"))?,
        )?;

        let mut log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open reflog at {path:?}"))?;
        let mut lock = file_guard::lock(&mut log_file, Lock::Exclusive, 0, 1)?;
        lock.deref_mut().write_all(entry.to_line().as_bytes())?;

        Ok(())
    }

    pub fn logs_path(&self) -> PathBuf {
        self.path.join("logs")
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }
}

impl RefStore for Refs {
    fn for_each_ref(
        &self,
        visit: &mut dyn FnMut(&str, &RefValue) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        for refname in Self::list_files(&self.refs_path(), &self.path)? {
            if let Some(value) = self.read_ref_value(&refname)? {
                visit(&refname, &value)?;
            }
        }

        Ok(())
    }

    fn resolve_ref(&self, refname: &str) -> anyhow::Result<Option<ObjectId>> {
        let mut current = refname.to_string();

        for _ in 0..MAX_SYMREF_DEPTH {
            match self.read_ref_value(&current)? {
                Some(RefValue::Direct(oid)) => return Ok(Some(oid)),
                Some(RefValue::Symbolic(target)) => current = target,
                None => return Ok(None),
            }
        }

        anyhow::bail!("symbolic reference {refname} nests too deeply")
    }

    fn read_ref_value(&self, refname: &str) -> anyhow::Result<Option<RefValue>> {
        let path = self.ref_path(refname);
        if !Self::is_file(&path)? {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read ref file at {path:?}"))?;
        Self::parse_ref_content(&content)
            .with_context(|| format!("invalid content in ref file at {path:?}"))
    }

    fn update_ref(&self, refname: &str, oid: &ObjectId) -> anyhow::Result<()> {
        let mut current = refname.to_string();

        for _ in 0..MAX_SYMREF_DEPTH {
            match self.read_ref_value(&current)? {
                Some(RefValue::Symbolic(target)) => current = target,
                Some(RefValue::Direct(_)) | None => {
                    return self.write_ref(&current, &RefValue::Direct(oid.clone()));
                }
            }
        }

        anyhow::bail!("symbolic reference {refname} nests too deeply")
    }

    fn read_reflog(&self, refname: &str) -> anyhow::Result<Vec<ReflogEntry>> {
        let path = self.log_path(refname);
        if !Self::is_file(&path)? {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read reflog at {path:?}"))?;

        content
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                ReflogEntry::parse_line(line)
                    .with_context(|| format!("malformed entry in reflog for {refname}"))
            })
            .collect()
    }

    fn write_reflog(&self, refname: &str, entries: &[ReflogEntry]) -> anyhow::Result<()> {
        let path = self.log_path(refname);
        let lock_path = path.with_file_name(format!(
            "{}.lock",
            path.file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default()
        ));

        // the lock file doubles as the new content; an existing one means a concurrent writer
        let mut lock_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .with_context(|| format!("unable to lock reflog for {refname}"))?;

        let written = entries
            .iter()
            .try_for_each(|entry| lock_file.write_all(entry.to_line().as_bytes()))
            .and_then(|_| lock_file.sync_all());

        if let Err(err) = written {
            let _ = std::fs::remove_file(&lock_path);
            return Err(err).with_context(|| format!("failed to write reflog for {refname}"));
        }

        std::fs::rename(&lock_path, &path)
            .with_context(|| format!("failed to commit reflog for {refname}"))
    }

    fn reflog_exists(&self, refname: &str) -> bool {
        self.log_path(refname).is_file()
    }

    fn list_reflogs(&self) -> anyhow::Result<Vec<String>> {
        let logs_path = self.logs_path();
        Self::list_files(&logs_path, &logs_path)
    }
}
