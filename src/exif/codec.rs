use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::webp::WebP;
use img_parts::{Bytes, ImageEXIF};
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use std::fmt;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use super::error::ContainerError;

// APP1 length (2B) + "Exif\0\0" (6B) must fit the 16-bit segment length
const MAX_JPEG_EXIF_PAYLOAD: usize = u16::MAX as usize - 8;
const EXIF_PREFIX: &[u8] = b"Exif\0\0";

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10;

/// Host file formats the codec can rewrite. Each carries the TIFF block as an
/// embedded EXIF payload.
///
/// ```rust
/// use sanimal_exif::exif::ImageKind;
/// use std::path::Path;
///
/// assert_eq!(ImageKind::from_path(Path::new("IMG_0001.JPG")), Some(ImageKind::Jpeg));
/// assert_eq!(ImageKind::from_path(Path::new("frame.webp")), Some(ImageKind::WebP));
/// assert_eq!(ImageKind::from_path(Path::new("clip.mp4")), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
}

impl ImageKind {
    /// Determine the image kind from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }
}

/// An image file loaded for a metadata update: the raw file plus its decoded
/// EXIF block.
pub struct MetadataContainer {
    kind: ImageKind,
    image: Bytes,
    metadata: Metadata,
}

impl fmt::Debug for MetadataContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataContainer")
            .field("kind", &self.kind)
            .field("image_len", &self.image.len())
            .field("tags", &(&self.metadata).into_iter().count())
            .finish()
    }
}

impl MetadataContainer {
    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Serialize the EXIF block to a bare TIFF payload (no `Exif\0\0`).
    ///
    /// The block is rebuilt from the decoded tags on every call, so its size
    /// only depends on the tags it holds.
    pub fn encode_payload(&self) -> Result<Vec<u8>, ContainerError> {
        let app1 = quietly(|| self.metadata.as_u8_vec(FileExtension::JPEG))
            .ok_or_else(|| ContainerError::Encode("EXIF encoder panicked".into()))?
            .map_err(|e| ContainerError::Encode(format!("{e:?}")))?;

        match app1.get(JPEG_EXIF_OVERHEAD..) {
            Some(tiff) if !tiff.is_empty() => Ok(tiff.to_vec()),
            _ => Err(ContainerError::Encode("EXIF encoder produced no data".into())),
        }
    }

    /// The complete file contents with the current EXIF block spliced in.
    pub fn encode_file(&self) -> Result<Vec<u8>, ContainerError> {
        let block = self.encode_payload()?;
        match self.kind {
            ImageKind::Jpeg => {
                if block.len() > MAX_JPEG_EXIF_PAYLOAD {
                    return Err(ContainerError::Encode(format!(
                        "EXIF payload of {} bytes does not fit a JPEG APP1 segment",
                        block.len()
                    )));
                }
                let mut jpeg = Jpeg::from_bytes(self.image.clone()).map_err(encode_error)?;
                let orig_exif_pos = find_exif_segment_pos(&jpeg);
                jpeg.set_exif(Some(Bytes::from(block)));

                // set_exif() re-inserts the segment at a fixed position, which
                // can land after XMP. Move it back where it was.
                if let Some(new_pos) = find_exif_segment_pos(&jpeg) {
                    let target_pos = orig_exif_pos.unwrap_or(1);
                    if target_pos < new_pos {
                        let segments = jpeg.segments_mut();
                        let seg = segments.remove(new_pos);
                        segments.insert(target_pos, seg);
                    }
                }
                Ok(jpeg.encoder().bytes().to_vec())
            }
            ImageKind::Png => {
                let mut png = Png::from_bytes(self.image.clone()).map_err(encode_error)?;
                png.set_exif(Some(Bytes::from(block)));
                Ok(png.encoder().bytes().to_vec())
            }
            ImageKind::WebP => {
                let mut webp = WebP::from_bytes(self.image.clone()).map_err(encode_error)?;
                webp.set_exif(Some(Bytes::from(block)));
                Ok(webp.encoder().bytes().to_vec())
            }
        }
    }
}

/// Loads and stores metadata containers.
///
/// `load` failures are terminal for a commit; `save` failures are retried.
/// [`FileCodec`] is the on-disk implementation.
pub trait ContainerCodec {
    fn load(&self, path: &Path) -> Result<MetadataContainer, ContainerError>;
    fn save(&self, container: &MetadataContainer, path: &Path) -> Result<(), ContainerError>;
}

/// Reads and writes metadata directly in image files.
///
/// img-parts locates the EXIF payload inside the host file; little_exif
/// decodes and rebuilds the payload itself. Writes overwrite the file in
/// place unless [`FileCodec::atomic`] is set, in which case the new contents
/// go to a temporary file in the same directory that is then renamed over
/// the original.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCodec {
    atomic: bool,
}

impl FileCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }
}

impl ContainerCodec for FileCodec {
    fn load(&self, path: &Path) -> Result<MetadataContainer, ContainerError> {
        let kind = ImageKind::from_path(path)
            .ok_or_else(|| ContainerError::UnsupportedFormat(path.display().to_string()))?;
        let image = Bytes::from(std::fs::read(path)?);

        let metadata = match embedded_exif(kind, image.clone())? {
            Some(payload) => decode_payload(strip_exif_prefix(&payload))?,
            None => {
                log::debug!("No EXIF in {}, starting a new block", path.display());
                Metadata::new()
            }
        };

        Ok(MetadataContainer { kind, image, metadata })
    }

    fn save(&self, container: &MetadataContainer, path: &Path) -> Result<(), ContainerError> {
        let output = container.encode_file()?;
        if self.atomic {
            write_atomic(path, &output)?;
        } else {
            std::fs::write(path, &output)?;
        }
        log::debug!("Wrote {} bytes to {}", output.len(), path.display());
        Ok(())
    }
}

fn embedded_exif(kind: ImageKind, image: Bytes) -> Result<Option<Bytes>, ContainerError> {
    let exif = match kind {
        ImageKind::Jpeg => Jpeg::from_bytes(image).map_err(parse_error)?.exif(),
        ImageKind::Png => Png::from_bytes(image).map_err(parse_error)?.exif(),
        ImageKind::WebP => WebP::from_bytes(image).map_err(parse_error)?.exif(),
    };
    Ok(exif.filter(|e| !e.is_empty()))
}

/// Decode a bare TIFF payload with little_exif.
///
/// little_exif reads EXIF out of whole files, so the payload is framed as a
/// minimal JPEG (SOI, one APP1 segment, EOI) regardless of the host format.
fn decode_payload(tiff: &[u8]) -> Result<Metadata, ContainerError> {
    if tiff.len() > MAX_JPEG_EXIF_PAYLOAD {
        return Err(ContainerError::Malformed(format!(
            "EXIF payload of {} bytes is too large",
            tiff.len()
        )));
    }

    let segment_len = (tiff.len() + 2 + EXIF_PREFIX.len()) as u16;
    let mut framed = Vec::with_capacity(tiff.len() + 14);
    framed.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE1]);
    framed.extend_from_slice(&segment_len.to_be_bytes());
    framed.extend_from_slice(EXIF_PREFIX);
    framed.extend_from_slice(tiff);
    framed.extend_from_slice(&[0xFF, 0xD9]);

    quietly(move || Metadata::new_from_vec(&framed, FileExtension::JPEG))
        .ok_or_else(|| ContainerError::Malformed("EXIF decoder panicked".into()))?
        .map_err(|e| ContainerError::Malformed(format!("{e:?}")))
}

/// Run `f`, turning a panic into `None` without printing it.
///
/// little_exif panics on some malformed input instead of returning an error.
fn quietly<T>(f: impl FnOnce() -> T) -> Option<T> {
    let prev_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    panic::set_hook(prev_hook);
    result.ok()
}

/// Some PNG/WebP writers keep the JPEG-style "Exif\0\0" prefix.
fn strip_exif_prefix(payload: &[u8]) -> &[u8] {
    payload.strip_prefix(EXIF_PREFIX).unwrap_or(payload)
}

/// Find the position of the EXIF APP1 segment in a JPEG.
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == 0xE1 && s.contents().starts_with(EXIF_PREFIX))
}

fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn parse_error(e: img_parts::Error) -> ContainerError {
    ContainerError::Malformed(e.to_string())
}

fn encode_error(e: img_parts::Error) -> ContainerError {
    ContainerError::Encode(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::fields::{set_text, text_values};
    use crate::test_support::{sample_jpeg, sample_png, sample_webp};
    use little_exif::exif_tag::ExifTag;
    use little_exif::ifd::ExifTagGroup;
    use std::fs;
    use tempfile::TempDir;

    // ── ImageKind::from_path ─────────────────────────────────────────

    #[test]
    fn image_kind_from_extension() {
        assert_eq!(ImageKind::from_path(Path::new("a.jpeg")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("a.PNG")), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_path(Path::new("a.webp")), Some(ImageKind::WebP));
        assert_eq!(ImageKind::from_path(Path::new("a.tif")), None);
        assert_eq!(ImageKind::from_path(Path::new("a.heic")), None);
        assert_eq!(ImageKind::from_path(Path::new("noext")), None);
    }

    // ── load ─────────────────────────────────────────────────────────

    #[test]
    fn load_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();
        assert!(matches!(
            FileCodec::new().load(&path),
            Err(ContainerError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            FileCodec::new().load(&dir.path().join("gone.jpg")),
            Err(ContainerError::Io(_))
        ));
    }

    #[test]
    fn load_garbage_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();
        assert!(matches!(
            FileCodec::new().load(&path),
            Err(ContainerError::Malformed(_))
        ));
    }

    #[test]
    fn load_jpeg_without_exif_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(dir.path(), "plain.jpg");
        let c = FileCodec::new().load(&path).unwrap();
        assert_eq!(c.kind(), ImageKind::Jpeg);
        assert_eq!(c.metadata().into_iter().count(), 0);
    }

    // ── save ─────────────────────────────────────────────────────────

    fn set_make_and_reload(codec: FileCodec, path: &Path) -> MetadataContainer {
        let mut c = codec.load(path).unwrap();
        c.metadata_mut().set_tag(ExifTag::Make("TrailCam Co".into()));
        codec.save(&c, path).unwrap();
        codec.load(path).unwrap()
    }

    fn make_of(c: &MetadataContainer) -> Option<String> {
        match c.metadata().get_tag(&ExifTag::Make(String::new())).next()? {
            ExifTag::Make(s) => Some(s.trim_end_matches('\0').to_string()),
            _ => None,
        }
    }

    #[test]
    fn save_jpeg_keeps_image_decodable() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(dir.path(), "photo.jpg");
        let reloaded = set_make_and_reload(FileCodec::new(), &path);
        assert_eq!(make_of(&reloaded).as_deref(), Some("TrailCam Co"));

        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (16, 12));
    }

    #[test]
    fn save_png() {
        let dir = TempDir::new().unwrap();
        let path = sample_png(dir.path(), "photo.png");
        let reloaded = set_make_and_reload(FileCodec::new(), &path);
        assert_eq!(reloaded.kind(), ImageKind::Png);
        assert_eq!(make_of(&reloaded).as_deref(), Some("TrailCam Co"));
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn save_webp() {
        let dir = TempDir::new().unwrap();
        let path = sample_webp(dir.path(), "frame.webp");
        let reloaded = set_make_and_reload(FileCodec::new(), &path);
        assert_eq!(reloaded.kind(), ImageKind::WebP);
        assert_eq!(make_of(&reloaded).as_deref(), Some("TrailCam Co"));
    }

    #[test]
    fn atomic_save_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(dir.path(), "photo.jpg");
        let reloaded = set_make_and_reload(FileCodec::new().atomic(true), &path);
        assert_eq!(make_of(&reloaded).as_deref(), Some("TrailCam Co"));

        // no temp files left behind
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn reencoding_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(dir.path(), "photo.jpg");
        let seeded = set_make_and_reload(FileCodec::new(), &path);
        let block = seeded.encode_payload().unwrap();

        FileCodec::new().save(&seeded, &path).unwrap();
        let again = FileCodec::new().load(&path).unwrap();
        assert_eq!(again.encode_payload().unwrap(), block);
    }

    #[test]
    fn custom_text_survives_save() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(dir.path(), "photo.jpg");
        let codec = FileCodec::new();
        let mut c = codec.load(&path).unwrap();
        set_text(c.metadata_mut(), ExifTagGroup::EXIF, 0x0229, &["SiteA", "150.5", "7"]);
        codec.save(&c, &path).unwrap();

        let reloaded = codec.load(&path).unwrap();
        assert_eq!(
            text_values(reloaded.metadata(), 0x0229).unwrap(),
            vec!["SiteA", "150.5", "7"]
        );
    }

    #[test]
    fn oversized_jpeg_payload_is_encode_error() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(dir.path(), "photo.jpg");
        let before = fs::read(&path).unwrap();
        let mut c = FileCodec::new().load(&path).unwrap();
        set_text(c.metadata_mut(), ExifTagGroup::EXIF, 0x0228, &["x".repeat(70_000)]);
        assert!(matches!(
            FileCodec::new().save(&c, &path),
            Err(ContainerError::Encode(_))
        ));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn corrupt_exif_payload_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = sample_jpeg(dir.path(), "photo.jpg");
        let mut jpeg = Jpeg::from_bytes(Bytes::from(fs::read(&path).unwrap())).unwrap();
        jpeg.set_exif(Some(Bytes::from_static(b"XX garbage, not a TIFF header")));
        fs::write(&path, jpeg.encoder().bytes()).unwrap();

        assert!(matches!(
            FileCodec::new().load(&path),
            Err(ContainerError::Malformed(_))
        ));
    }

    #[test]
    fn strip_prefix_only_when_present() {
        assert_eq!(strip_exif_prefix(b"Exif\0\0MM\0*"), b"MM\0*");
        assert_eq!(strip_exif_prefix(b"II*\0"), b"II*\0");
    }
}
