//! Built-in metadata extractors for common handle types.
//!
//! Extractors are best-effort: the inspector logs and drops their errors so a
//! handle that cannot be queried still shows up as a bare entity.

use std::fs::{File, Metadata};
use std::net::TcpStream;
use std::path::PathBuf;
use std::process::Child;
use std::time::UNIX_EPOCH;

use crate::{Entity, InspectError, Registry, Resource};

/// A file handle paired with the path it was opened from.
#[derive(Debug)]
pub struct FileStream {
    pub path: PathBuf,
    pub file: File,
}

impl FileStream {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        Ok(Self { path, file })
    }
}

pub(crate) fn register_defaults(registry: &mut Registry) {
    registry
        .register_resource_inspector("stream", inspect_stream)
        .register_resource_inspector("socket", inspect_socket)
        .register_resource_inspector("process", inspect_process);
}

fn inspect_stream(resource: &Resource, entity: &mut Entity) -> Result<(), InspectError> {
    if let Some(stream) = resource.handle::<FileStream>() {
        entity.set_meta("uri", stream.path.display().to_string());
        return describe_file(&stream.file.metadata()?, entity);
    }

    let file = resource
        .handle::<File>()
        .ok_or(InspectError::HandleMismatch {
            kind: "stream",
            expected: "std::fs::File",
        })?;
    describe_file(&file.metadata()?, entity)
}

fn describe_file(metadata: &Metadata, entity: &mut Entity) -> Result<(), InspectError> {
    let file_type = metadata.file_type();
    let kind = if file_type.is_dir() {
        "dir"
    } else if file_type.is_symlink() {
        "symlink"
    } else if file_type.is_file() {
        "file"
    } else {
        "other"
    };

    entity
        .set_meta("file_type", kind)
        .set_meta("size", metadata.len())
        .set_meta("readonly", metadata.permissions().readonly());

    if let Some(secs) = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
    {
        entity.set_meta("modified", secs.as_secs());
    }
    Ok(())
}

fn inspect_socket(resource: &Resource, entity: &mut Entity) -> Result<(), InspectError> {
    let stream = resource
        .handle::<TcpStream>()
        .ok_or(InspectError::HandleMismatch {
            kind: "socket",
            expected: "std::net::TcpStream",
        })?;

    entity.set_meta("local_addr", stream.local_addr()?.to_string());
    // Not connected yet or already shut down.
    if let Ok(peer) = stream.peer_addr() {
        entity.set_meta("peer_addr", peer.to_string());
    }
    entity.set_meta("nodelay", stream.nodelay()?);
    Ok(())
}

fn inspect_process(resource: &Resource, entity: &mut Entity) -> Result<(), InspectError> {
    let child = resource
        .handle::<Child>()
        .ok_or(InspectError::HandleMismatch {
            kind: "process",
            expected: "std::process::Child",
        })?;
    entity.set_meta("pid", child.id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::{EntityId, EntityKind, Scalar};

    fn entity() -> Entity {
        Entity::new(EntityKind::Resource, EntityId::new(EntityKind::Resource, 1))
    }

    #[test]
    fn test_stream_metadata() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello").unwrap();
        let stream = FileStream::open(tmp.path()).unwrap();
        let resource = Resource::new("stream", stream);

        let mut e = entity();
        inspect_stream(&resource, &mut e).unwrap();

        assert!(matches!(
            e.get_meta("size").and_then(|v| v.as_scalar()),
            Some(Scalar::Int(5))
        ));
        assert!(matches!(
            e.get_meta("file_type").and_then(|v| v.as_scalar()),
            Some(Scalar::Str(s)) if s == "file"
        ));
        assert!(e.get_meta("uri").is_some());
    }

    #[test]
    fn test_wrong_handle_is_an_error() {
        let resource = Resource::new("stream", 42_u8);
        let mut e = entity();
        let err = inspect_stream(&resource, &mut e).unwrap_err();
        assert!(matches!(err, InspectError::HandleMismatch { kind: "stream", .. }));
        assert!(e.meta().is_empty());
    }
}
