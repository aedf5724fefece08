use crate::areas::config::Config;
use crate::areas::database::Database;
use crate::areas::refs::Refs;
use std::cell::{RefCell, RefMut};
use std::path::Path;

pub const GIT_DIR_NAME: &str = ".git";

pub struct Repository {
    path: Box<Path>,
    writer: RefCell<Box<dyn std::io::Write>>,
    database: Database,
    refs: Refs,
    config: Config,
}

impl Repository {
    pub fn new(path: &str, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        let path = Path::new(path);
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }
        let path = path.canonicalize()?;
        let git_path = path.join(GIT_DIR_NAME);

        let database = Database::new(git_path.join("objects").into_boxed_path());
        let refs = Refs::new(git_path.clone().into_boxed_path());
        let config = Config::load(&git_path)?;

        Ok(Repository {
            path: path.into_boxed_path(),
            writer: RefCell::new(writer),
            database,
            refs,
            config,
        })
    }

    /// Like [`Repository::new`], but the `.git` directory must already exist
    pub fn open(path: &str, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        let repository = Self::new(path, writer)?;
        if !repository.git_path().is_dir() {
            anyhow::bail!("not a git repository: {}", repository.path().display());
        }

        Ok(repository)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_path(&self) -> Box<Path> {
        self.path.join(GIT_DIR_NAME).into_boxed_path()
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
