use crate::areas::refs::{HEAD_REF_NAME, RefStore, RefValue};
use crate::areas::repository::Repository;
use anyhow::Context;
use std::fs;
use std::io::Write;

const DEFAULT_BRANCH: &str = "main";

impl Repository {
    pub fn init(&mut self) -> anyhow::Result<()> {
        fs::create_dir_all(self.database().objects_path())
            .context("Failed to create .git/objects directory")?;

        fs::create_dir_all(self.refs().refs_path().join("heads"))
            .context("Failed to create .git/refs/heads directory")?;

        fs::create_dir_all(self.refs().logs_path())
            .context("Failed to create .git/logs directory")?;

        if self.refs().read_ref_value(HEAD_REF_NAME)?.is_none() {
            self.refs()
                .write_ref(
                    HEAD_REF_NAME,
                    &RefValue::Symbolic(format!("refs/heads/{}", DEFAULT_BRANCH)),
                )
                .context("Failed to create initial HEAD reference")?;
        }

        writeln!(
            self.writer(),
            "Initialized empty Git repository in {}",
            self.git_path().display()
        )?;

        Ok(())
    }
}
