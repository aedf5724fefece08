use crate::Timestamp;
use crate::areas::object_store::{ObjectStore, RawObject, StoreError};
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::io::{BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Loose object database under `.git/objects`
#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let object_id = object.object_id()?;
        let object_path = self.path.join(object_id.to_path());

        // write the object to disk unless it already exists
        if !object_path.exists() {
            std::fs::create_dir_all(
                object_path
                    .parent()
                    .context(format!("Invalid object path {}", object_path.display()))?,
            )
            .context(format!(
                "Unable to create object directory {}",
                object_path.display()
            ))?;

            self.write_object(object_path, object.serialize()?)?;
        }

        Ok(object_id)
    }

    /// Delete a loose object; missing objects are not an error
    pub fn remove(&self, object_id: &ObjectId) -> anyhow::Result<()> {
        let object_path = self.path.join(object_id.to_path());

        match std::fs::remove_file(&object_path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err).context(format!(
                    "Unable to remove object file {}",
                    object_path.display()
                ));
            }
        }

        // drop the fan-out directory once it is empty
        if let Some(parent) = object_path.parent()
            && parent.read_dir()?.next().is_none()
        {
            std::fs::remove_dir(parent)?;
        }

        Ok(())
    }

    pub fn object_path(&self, object_id: &ObjectId) -> PathBuf {
        self.path.join(object_id.to_path())
    }

    fn write_object(&self, object_path: PathBuf, object_content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .context(format!("Invalid object path {}", object_path.display()))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_object_path)
            .context(format!(
                "Unable to open object file {}",
                temp_object_path.display()
            ))?;

        file.write_all(&object_content).context(format!(
            "Unable to write object file {}",
            temp_object_path.display()
        ))?;

        // rename the temp file to the object file to make it atomic
        std::fs::rename(&temp_object_path, &object_path).context(format!(
            "Unable to rename object file to {}",
            object_path.display()
        ))?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("Unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("Unable to finish compressing object content")
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }

    fn open_object(&self, object_id: &ObjectId) -> Result<Option<std::fs::File>, StoreError> {
        match std::fs::File::open(self.object_path(object_id)) {
            Ok(file) => Ok(Some(file)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn corrupt(object_id: &ObjectId, reason: impl std::fmt::Display) -> StoreError {
        StoreError::Corrupt {
            oid: object_id.clone(),
            reason: reason.to_string(),
        }
    }
}

impl ObjectStore for Database {
    fn read_object(&self, object_id: &ObjectId) -> Result<Option<RawObject>, StoreError> {
        let Some(mut file) = self.open_object(object_id)? else {
            return Ok(None);
        };

        let mut compressed = Vec::new();
        file.read_to_end(&mut compressed)?;

        let mut decompressed = Vec::new();
        flate2::read::ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut decompressed)
            .map_err(|err| Self::corrupt(object_id, err))?;

        let mut reader = Cursor::new(decompressed);
        let object_type = ObjectType::parse_object_type(&mut reader)
            .map_err(|err| Self::corrupt(object_id, err))?;

        let offset = reader.position() as usize;
        let payload = Bytes::from(reader.into_inner()).slice(offset..);

        Ok(Some(RawObject::new(object_type, payload)))
    }

    fn object_exists(&self, object_id: &ObjectId) -> bool {
        self.object_path(object_id).is_file()
    }

    fn object_type(&self, object_id: &ObjectId) -> Result<Option<ObjectType>, StoreError> {
        let Some(file) = self.open_object(object_id)? else {
            return Ok(None);
        };

        // only inflate as far as the header
        let mut reader = BufReader::new(flate2::read::ZlibDecoder::new(file));
        ObjectType::parse_object_type(&mut reader)
            .map(Some)
            .map_err(|err| Self::corrupt(object_id, err))
    }

    fn for_each_loose_object(
        &self,
        visit: &mut dyn FnMut(&ObjectId, Timestamp) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        for i in 0..=255u8 {
            let dir_name = format!("{i:02x}");
            let dir_path = self.path.join(&dir_name);

            if !dir_path.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(&dir_path)? {
                let entry = entry?;
                let file_name = entry.file_name();

                // temp files and other strays are not objects
                let Ok(oid) = ObjectId::try_parse(format!("{dir_name}{}", file_name.to_string_lossy()))
                else {
                    continue;
                };

                let mtime = entry
                    .metadata()?
                    .modified()?
                    .duration_since(UNIX_EPOCH)
                    .map(|duration| duration.as_secs() as Timestamp)
                    .unwrap_or_default();

                visit(&oid, mtime)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::blob::Blob;
    use assert_fs::TempDir;

    fn database(dir: &TempDir) -> Database {
        Database::new(dir.path().join("objects").into_boxed_path())
    }

    #[test]
    fn test_store_then_read() {
        let dir = TempDir::new().unwrap();
        let database = database(&dir);

        let oid = database.store(&Blob::from("hello\n")).unwrap();

        // same id git computes for "hello\n"
        assert_eq!(oid.as_ref(), "ce013625030ba8dba906f756967f9e9ca394464a");
        let raw = database.read_object(&oid).unwrap().unwrap();
        assert_eq!(raw.object_type, ObjectType::Blob);
        assert_eq!(&raw.payload[..], b"hello\n");
        assert_eq!(database.object_type(&oid).unwrap(), Some(ObjectType::Blob));
    }

    #[test]
    fn test_missing_object_is_none() {
        let dir = TempDir::new().unwrap();
        let database = database(&dir);
        let oid = ObjectId::try_parse("1".repeat(40)).unwrap();

        assert!(database.read_object(&oid).unwrap().is_none());
        assert!(!database.object_exists(&oid));
    }

    #[test]
    fn test_garbage_is_corrupt_not_missing() {
        let dir = TempDir::new().unwrap();
        let database = database(&dir);
        let oid = ObjectId::try_parse("2".repeat(40)).unwrap();

        let path = database.object_path(&oid);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not zlib").unwrap();

        assert!(database.object_exists(&oid));
        assert!(matches!(
            database.read_object(&oid),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_enumerate_and_remove_loose_objects() {
        let dir = TempDir::new().unwrap();
        let database = database(&dir);

        let first = database.store(&Blob::from("one")).unwrap();
        let second = database.store(&Blob::from("two")).unwrap();

        let mut seen = Vec::new();
        database
            .for_each_loose_object(&mut |oid, _| {
                seen.push(oid.clone());
                Ok(())
            })
            .unwrap();
        seen.sort();

        let mut expected = vec![first.clone(), second];
        expected.sort();
        assert_eq!(seen, expected);

        database.remove(&first).unwrap();
        assert!(!database.object_exists(&first));
        database.remove(&first).unwrap();
    }
}
