#![allow(dead_code)]

use assert_cmd::Command;
use assert_fs::TempDir;
use bit_reflog::Timestamp;
use bit_reflog::areas::config::CONFIG_FILE_NAME;
use bit_reflog::areas::object_store::ObjectStore;
use bit_reflog::areas::refs::RefStore;
use bit_reflog::areas::repository::Repository;
use bit_reflog::artifacts::database::database_entry::DatabaseEntry;
use bit_reflog::artifacts::database::entry_mode::{EntryMode, FileMode};
use bit_reflog::artifacts::objects::blob::Blob;
use bit_reflog::artifacts::objects::commit::{Author, Commit};
use bit_reflog::artifacts::objects::object_id::ObjectId;
use bit_reflog::artifacts::objects::tree::Tree;
use bit_reflog::artifacts::reflog::entry::ReflogEntry;
use fake::Fake;
use fake::faker::internet::en::FreeEmail;
use fake::faker::lorem::en::{Word, Words};
use fake::faker::name::en::Name;
use filetime::FileTime;
use rstest::fixture;
use std::path::Path;
use walkdir::WalkDir;

pub const DAY: Timestamp = 86_400;

pub fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

pub fn run_bit_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("bit-reflog").expect("Failed to find bit-reflog binary");
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

/// A repository on disk, filled through the library instead of the binary
pub struct TestRepository {
    dir: TempDir,
    repository: Repository,
}

#[fixture]
pub fn repository() -> TestRepository {
    TestRepository::new()
}

impl TestRepository {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut repository =
            Repository::new(&dir.path().to_string_lossy(), Box::new(std::io::sink()))
                .expect("Failed to open repository");
        repository.init().expect("Failed to initialize repository");

        TestRepository { dir, repository }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn run(&self, args: &[&str]) -> Command {
        run_bit_command(self.path(), args)
    }

    /// A commit holding one random file, authored at `date`
    pub fn commit(&self, parents: &[ObjectId], date: Timestamp) -> ObjectId {
        let database = self.repository.database();

        let content = Words(3..8).fake::<Vec<String>>().join(" ");
        let blob = database
            .store(&Blob::from(content.as_str()))
            .expect("Failed to store blob");

        let file_name = format!("{}.txt", Word().fake::<String>());
        let tree = Tree::new(vec![DatabaseEntry::new(
            file_name,
            blob,
            EntryMode::File(FileMode::Regular),
        )]);
        let tree = database.store(&tree).expect("Failed to store tree");

        let author = Author::at_epoch(
            Name().fake::<String>().replace(' ', "_"),
            FreeEmail().fake::<String>(),
            date,
        )
        .expect("Failed to create author");
        let message = Words(2..6).fake::<Vec<String>>().join(" ");

        database
            .store(&Commit::new(parents.to_vec(), tree, author, message))
            .expect("Failed to store commit")
    }

    /// Move `refname` to `oid` and log the move
    pub fn update_ref(&self, refname: &str, oid: &ObjectId, timestamp: Timestamp, message: &str) {
        let refs = self.repository.refs();
        let old = refs
            .resolve_ref(refname)
            .expect("Failed to resolve ref")
            .unwrap_or_else(ObjectId::null);

        refs.update_ref(refname, oid).expect("Failed to update ref");
        self.log(refname, &old, oid, timestamp, message);
    }

    pub fn log(
        &self,
        refname: &str,
        old: &ObjectId,
        new: &ObjectId,
        timestamp: Timestamp,
        message: &str,
    ) {
        let entry = ReflogEntry::new(
            old.clone(),
            new.clone(),
            "A U Thor <author@example.com>".to_string(),
            timestamp,
            "+0000".to_string(),
            message.to_string(),
        );
        self.repository
            .refs()
            .append_reflog(refname, &entry)
            .expect("Failed to append reflog entry");
    }

    pub fn reflog(&self, refname: &str) -> Vec<ReflogEntry> {
        self.repository
            .refs()
            .read_reflog(refname)
            .expect("Failed to read reflog")
    }

    pub fn reflog_messages(&self, refname: &str) -> Vec<String> {
        self.reflog(refname)
            .into_iter()
            .map(|entry| entry.message)
            .collect()
    }

    pub fn resolve(&self, refname: &str) -> Option<ObjectId> {
        self.repository
            .refs()
            .resolve_ref(refname)
            .expect("Failed to resolve ref")
    }

    pub fn has_object(&self, oid: &ObjectId) -> bool {
        self.repository.database().object_exists(oid)
    }

    pub fn remove_object(&self, oid: &ObjectId) {
        self.repository
            .database()
            .remove(oid)
            .expect("Failed to remove object");
    }

    pub fn set_mtime(&self, oid: &ObjectId, mtime: Timestamp) {
        let path = self.repository.database().object_path(oid);
        filetime::set_file_mtime(path, FileTime::from_unix_time(mtime, 0))
            .expect("Failed to set object mtime");
    }

    /// Backdate every loose object
    pub fn age_all_objects(&self, mtime: Timestamp) {
        let objects = self.repository.database().objects_path().to_path_buf();
        for entry in WalkDir::new(objects).into_iter().filter_map(|entry| entry.ok()) {
            if entry.file_type().is_file() {
                filetime::set_file_mtime(entry.path(), FileTime::from_unix_time(mtime, 0))
                    .expect("Failed to set object mtime");
            }
        }
    }

    pub fn write_config(&self, contents: &str) {
        std::fs::write(self.path().join(".git").join(CONFIG_FILE_NAME), contents)
            .expect("Failed to write config");
    }
}
