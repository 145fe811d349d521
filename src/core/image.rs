// Registry image file: header validation, packed entry body, apply locking.
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::core::addr::{ADDR_LEN, SELECTOR_LEN};
use crate::core::error::{Error, ErrorKind};
use crate::core::instruction::Instruction;
use crate::core::registry::Registry;

const MAGIC: [u8; 4] = *b"FMAP";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 12;
const ENTRY_PREFIX_LEN: usize = ADDR_LEN + 4;

/// File-backed snapshot of a registry. The body is the registry's own packed
/// entry convention, one record per facet in enumeration order, so an image
/// can be rebuilt through the ordinary apply path.
#[derive(Debug)]
pub struct Image {
    path: PathBuf,
    file: File,
}

impl Image {
    /// Create a fresh image file holding `registry`. Refuses to overwrite.
    pub fn create(path: impl AsRef<Path>, registry: &Registry) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|err| {
                Error::new(io_error_kind(&err))
                    .with_path(&path)
                    .with_source(err)
            })?;
        let image = Self { path, file };
        image.store(registry)?;
        Ok(image)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|err| {
                Error::new(io_error_kind(&err))
                    .with_path(&path)
                    .with_source(err)
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Registry, Error> {
        let mut bytes = Vec::new();
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_end(&mut bytes))
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_path(&self.path)
                    .with_source(err)
            })?;
        decode_image(&bytes, &self.path)
    }

    pub fn store(&self, registry: &Registry) -> Result<(), Error> {
        let bytes = encode_image(registry);
        let mut file = &self.file;
        file.set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| file.write_all(&bytes))
            .and_then(|_| file.flush())
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_path(&self.path)
                    .with_source(err)
            })?;
        tracing::debug!(
            path = %self.path.display(),
            facets = registry.facet_count(),
            selectors = registry.selector_count(),
            "stored registry image"
        );
        Ok(())
    }

    /// Take the exclusive advisory lock for a load-apply-store window.
    pub fn lock(&self) -> Result<ImageLock<'_>, Error> {
        self.file.lock_exclusive().map_err(|err| {
            Error::new(lock_error_kind(&err))
                .with_path(&self.path)
                .with_source(err)
        })?;
        Ok(ImageLock { file: &self.file })
    }
}

pub struct ImageLock<'a> {
    file: &'a File,
}

impl<'a> Drop for ImageLock<'a> {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(self.file);
    }
}

fn encode_image(registry: &Registry) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(registry.facet_count() as u32).to_le_bytes());
    for (facet, selectors) in registry.entries() {
        out.extend_from_slice(facet.as_bytes());
        out.extend_from_slice(&(selectors.len() as u32).to_le_bytes());
        for selector in selectors {
            out.extend_from_slice(selector.as_bytes());
        }
    }
    out
}

fn decode_image(bytes: &[u8], path: &Path) -> Result<Registry, Error> {
    if bytes.len() < HEADER_LEN {
        return Err(corrupt(path, "image shorter than header"));
    }
    if bytes[0..4] != MAGIC {
        return Err(corrupt(path, "bad image magic"));
    }
    let version = u32::from_le_bytes(read_4(bytes, 4));
    if version != VERSION {
        return Err(corrupt(path, "unsupported image version"));
    }
    let facet_count = u32::from_le_bytes(read_4(bytes, 8)) as usize;

    let mut batch = Vec::with_capacity(facet_count);
    let mut offset = HEADER_LEN;
    for _ in 0..facet_count {
        if bytes.len() < offset + ENTRY_PREFIX_LEN {
            return Err(corrupt(path, "truncated facet entry"));
        }
        let mut addr = [0u8; ADDR_LEN];
        addr.copy_from_slice(&bytes[offset..offset + ADDR_LEN]);
        let selector_count = u32::from_le_bytes(read_4(bytes, offset + ADDR_LEN)) as usize;
        offset += ENTRY_PREFIX_LEN;

        let run_len = selector_count * SELECTOR_LEN;
        if selector_count == 0 || bytes.len() < offset + run_len {
            return Err(corrupt(path, "truncated selector run"));
        }
        let record = [&addr[..], &bytes[offset..offset + run_len]].concat();
        offset += run_len;

        let instruction = Instruction::decode(&record)
            .map_err(|err| corrupt(path, "invalid facet entry").with_source(err))?;
        if instruction.is_remove() {
            return Err(corrupt(path, "null facet address in image"));
        }
        batch.push(instruction);
    }
    if offset != bytes.len() {
        return Err(corrupt(path, "trailing bytes after last entry"));
    }

    // Rebuilding through the apply path keeps the ownership invariants
    // enforced; a hand-edited image cannot produce a diverged table.
    let mut registry = Registry::new();
    registry
        .apply(&batch)
        .map_err(|err| corrupt(path, "image entries violate ownership invariants").with_source(err))?;
    Ok(registry)
}

fn corrupt(path: &Path, message: &str) -> Error {
    Error::new(ErrorKind::Corrupt)
        .with_path(path)
        .with_message(message)
}

fn read_4(buf: &[u8], offset: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    out
}

fn io_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::{HEADER_LEN, Image, MAGIC, encode_image};
    use crate::core::addr::{FacetAddr, Selector};
    use crate::core::error::ErrorKind;
    use crate::core::instruction::Instruction;
    use crate::core::registry::{BootstrapSet, Registry};
    use std::io::Write;

    fn booted() -> Registry {
        let mut bytes = [0u8; 20];
        bytes[19] = 1;
        let admin = FacetAddr::from_bytes(bytes);
        bytes[19] = 2;
        let introspect = FacetAddr::from_bytes(bytes);
        bytes[19] = 3;
        let probe = FacetAddr::from_bytes(bytes);
        Registry::bootstrap(BootstrapSet {
            admin,
            introspect,
            probe,
        })
        .expect("bootstrap")
    }

    #[test]
    fn image_round_trips_facet_and_selector_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("registry.facetmap");

        let mut registry = booted();
        let mut extra = [0u8; 20];
        extra[19] = 9;
        registry
            .apply(&[Instruction::assign(
                FacetAddr::from_bytes(extra),
                vec![
                    Selector::from_bytes([1, 2, 3, 4]),
                    Selector::from_bytes([5, 6, 7, 8]),
                ],
            )])
            .expect("assign");

        Image::create(&path, &registry).expect("create");
        let mut reopened = Image::open(&path).expect("open");
        let loaded = reopened.load().expect("load");

        assert_eq!(loaded.facets(), registry.facets());
        for facet in registry.facets() {
            assert_eq!(loaded.selectors_of(*facet), registry.selectors_of(*facet));
        }
        assert!(loaded.is_consistent());
    }

    #[test]
    fn create_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("registry.facetmap");
        Image::create(&path, &booted()).expect("create");

        let err = Image::create(&path, &booted()).expect_err("second create");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn missing_image_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Image::open(dir.path().join("absent.facetmap")).expect_err("open");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("registry.facetmap");
        std::fs::File::create(&path)
            .and_then(|mut file| file.write_all(b"NOPE00000000"))
            .expect("write");

        let err = Image::open(&path).and_then(|mut image| image.load());
        assert_eq!(err.expect_err("load").kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn truncated_body_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("registry.facetmap");

        let mut bytes = encode_image(&booted());
        bytes.truncate(bytes.len() - 2);
        std::fs::write(&path, &bytes).expect("write");

        let err = Image::open(&path)
            .and_then(|mut image| image.load())
            .expect_err("load");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn trailing_bytes_are_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("registry.facetmap");

        let mut bytes = encode_image(&booted());
        bytes.extend_from_slice(&[0u8; 3]);
        std::fs::write(&path, &bytes).expect("write");

        let err = Image::open(&path)
            .and_then(|mut image| image.load())
            .expect_err("load");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn header_constants_stay_in_sync() {
        let bytes = encode_image(&Registry::new());
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[0..4], &MAGIC);
    }
}
