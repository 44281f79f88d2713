//! Object storage seam.
//!
//! Parsers only ever read whole objects, so the store exposes a single
//! `open_for_read` call. The store is handed to each parser by the caller.

use crate::core::error::{Error, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Read-only access to log objects by identifier.
pub trait ObjectStore {
    /// Opens the object for reading.
    ///
    /// Fails with `NotFound` when the identifier does not resolve and
    /// `PermissionDenied` when access is refused.
    fn open_for_read(&self, object_id: &str) -> Result<Box<dyn Read + '_>>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for &T {
    fn open_for_read(&self, object_id: &str) -> Result<Box<dyn Read + '_>> {
        (**self).open_for_read(object_id)
    }
}

impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn open_for_read(&self, object_id: &str) -> Result<Box<dyn Read + '_>> {
        (**self).open_for_read(object_id)
    }
}

/// Store backed by a local directory laid out as `<root>/<bucket>/<key>`.
///
/// Accepts `bucket/key` as well as `s3://bucket/key` identifiers, which makes a
/// local `aws s3 sync` mirror directly usable.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps an identifier onto a path below the root.
    pub fn resolve(&self, object_id: &str) -> Result<PathBuf> {
        let key = object_id.strip_prefix("s3://").unwrap_or(object_id);
        let relative = Path::new(key.trim_start_matches('/'));

        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(Error::PermissionDenied {
                        object_id: object_id.to_string(),
                    })
                }
            }
        }
        Ok(path)
    }
}

impl ObjectStore for LocalObjectStore {
    fn open_for_read(&self, object_id: &str) -> Result<Box<dyn Read + '_>> {
        let path = self.resolve(object_id)?;
        trace!(object_id, path = %path.display(), "opening local object");
        let file = File::open(&path).map_err(|err| map_io_error(object_id, err))?;
        Ok(Box::new(file))
    }
}

/// In-memory store keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: HashMap<String, Vec<u8>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object_id: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects.insert(object_id.into(), bytes.into());
    }
}

impl ObjectStore for MemoryObjectStore {
    fn open_for_read(&self, object_id: &str) -> Result<Box<dyn Read + '_>> {
        let bytes = self.objects.get(object_id).ok_or_else(|| Error::NotFound {
            object_id: object_id.to_string(),
        })?;
        Ok(Box::new(Cursor::new(bytes.as_slice())))
    }
}

pub(crate) fn map_io_error(object_id: &str, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            object_id: object_id.to_string(),
        },
        io::ErrorKind::PermissionDenied => Error::PermissionDenied {
            object_id: object_id.to_string(),
        },
        _ => Error::Storage {
            object_id: object_id.to_string(),
            source: err,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolves_plain_and_s3_identifiers() {
        let store = LocalObjectStore::new("/data/logs");
        let plain = store.resolve("bucket/AWSLogs/alb.log.gz").expect("plain");
        let uri = store.resolve("s3://bucket/AWSLogs/alb.log.gz").expect("uri");
        assert_eq!(plain, PathBuf::from("/data/logs/bucket/AWSLogs/alb.log.gz"));
        assert_eq!(plain, uri);
    }

    #[test]
    fn refuses_parent_components() {
        let store = LocalObjectStore::new("/data/logs");
        let err = store.resolve("bucket/../../etc/passwd").unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }));
    }

    #[test]
    fn local_store_reads_and_reports_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("bucket")).expect("mkdir");
        fs::write(dir.path().join("bucket/object"), b"payload").expect("write");

        let store = LocalObjectStore::new(dir.path());
        let mut contents = Vec::new();
        store
            .open_for_read("s3://bucket/object")
            .expect("open")
            .read_to_end(&mut contents)
            .expect("read");
        assert_eq!(contents, b"payload");

        let err = store.open_for_read("bucket/missing").err().expect("missing");
        assert!(matches!(err, Error::NotFound { ref object_id } if object_id == "bucket/missing"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bucket/locked");
        fs::create_dir_all(dir.path().join("bucket")).expect("mkdir");
        fs::write(&path, b"secret").expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).expect("chmod");

        // Privileged users bypass file modes.
        if File::open(&path).is_ok() {
            return;
        }

        let store = LocalObjectStore::new(dir.path());
        let err = store.open_for_read("s3://bucket/locked").err().expect("denied");
        assert!(matches!(
            err,
            Error::PermissionDenied { ref object_id } if object_id == "s3://bucket/locked"
        ));

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).expect("chmod");
    }

    #[test]
    fn memory_store_through_shared_handle() {
        let mut store = MemoryObjectStore::new();
        store.insert("a", b"abc".to_vec());
        let shared = Arc::new(store);

        let mut contents = String::new();
        shared
            .open_for_read("a")
            .expect("open")
            .read_to_string(&mut contents)
            .expect("read");
        assert_eq!(contents, "abc");
        assert!(matches!(
            shared.open_for_read("b").err(),
            Some(Error::NotFound { .. })
        ));
    }
}
