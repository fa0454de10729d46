use std::{fmt, fs, path::PathBuf, sync::Arc};

use eframe::egui::ColorImage;
use tracing::{debug, warn};

use crate::daemon::{EmbeddedArtFetch, SessionError, TrackRef};

pub const DEFAULT_COVER_NAMES: &[&str] = &["cover.jpg", "cover.png"];

/// Longest side of the pixel buffer handed to the renderer. Larger covers
/// are downscaled at decode time; GPUs reject textures above their limit.
pub const MAX_TEXTURE_SIDE: u32 = 4096;

/// A decoded cover image. Cloning shares the pixels.
///
/// `width`/`height` are the cover's intrinsic size; the pixel buffer may be
/// smaller when the cover exceeded [`MAX_TEXTURE_SIDE`].
#[derive(Clone)]
pub struct Artwork {
    image: Arc<ColorImage>,
    width: usize,
    height: usize,
}

impl Artwork {
    pub fn from_image(image: ColorImage) -> Option<Self> {
        let [width, height] = image.size;
        Self::with_intrinsic_size(image, width, height)
    }

    fn with_intrinsic_size(image: ColorImage, width: usize, height: usize) -> Option<Self> {
        if width == 0 || height == 0 || image.size[0] == 0 || image.size[1] == 0 {
            return None;
        }
        Some(Self {
            image: Arc::new(image),
            width,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Width over height, from the intrinsic size.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn image(&self) -> &ColorImage {
        &self.image
    }

    /// Size of the pixel buffer that gets uploaded.
    pub fn texture_size(&self) -> [usize; 2] {
        self.image.size
    }

    /// True when both handles refer to the same decoded pixels.
    pub fn same_image(&self, other: &Artwork) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl fmt::Debug for Artwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artwork")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("texture_size", &self.image.size)
            .finish()
    }
}

/// Size that fits `width` x `height` inside `max_side` on both axes,
/// never collapsing an axis to zero.
fn bounded_size(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_side {
        return (width, height);
    }
    let scale = max_side as f64 / longest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_side);
    (scaled(width), scaled(height))
}

pub fn decode_artwork(bytes: &[u8]) -> Result<Artwork, String> {
    let image =
        image::load_from_memory(bytes).map_err(|e| format!("Failed to decode artwork: {e}"))?;
    let mut image = image.to_rgba8();
    let (width, height) = image.dimensions();
    let (bounded_width, bounded_height) = bounded_size(width, height, MAX_TEXTURE_SIDE);
    if (bounded_width, bounded_height) != (width, height) {
        debug!(width, height, bounded_width, bounded_height, "downscaling oversized artwork");
        image = image::imageops::thumbnail(&image, bounded_width, bounded_height);
    }
    let size = [image.width() as usize, image.height() as usize];
    let pixels = image.into_raw();
    Artwork::with_intrinsic_size(
        ColorImage::from_rgba_unmultiplied(size, &pixels),
        width as usize,
        height as usize,
    )
    .ok_or_else(|| "Artwork has no pixels".to_string())
}

/// Decodes, or logs why not and yields nothing.
fn decode_or_warn(bytes: &[u8], track: &TrackRef) -> Option<Artwork> {
    match decode_artwork(bytes) {
        Ok(artwork) => Some(artwork),
        Err(err) => {
            warn!(%track, error = %err, "ignoring unreadable artwork");
            None
        }
    }
}

/// Finds the artwork for a track. Missing art is `Ok(None)`; only a failed
/// daemon request is an error.
pub trait ArtSource: Send {
    fn name(&self) -> &'static str;

    fn resolve(
        &self,
        track: &TrackRef,
        daemon: &mut dyn EmbeddedArtFetch,
    ) -> Result<Option<Artwork>, SessionError>;
}

/// Looks for a conventionally named cover file next to the track inside the
/// daemon's music directory.
#[derive(Debug, Clone)]
pub struct LibraryArt {
    root: PathBuf,
    cover_names: Vec<String>,
}

impl LibraryArt {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_cover_names(root, DEFAULT_COVER_NAMES.iter().map(|name| name.to_string()))
    }

    pub fn with_cover_names(
        root: impl Into<PathBuf>,
        cover_names: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            root: root.into(),
            cover_names: cover_names.into_iter().collect(),
        }
    }

    /// First directory entry beside the track whose name is a cover name.
    pub fn find_cover(&self, track: &TrackRef) -> Option<PathBuf> {
        let song_path = self.root.join(track.as_str());
        let dir = song_path.parent()?;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "cannot list track directory");
                return None;
            }
        };

        entries.flatten().map(|entry| entry.path()).find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| self.cover_names.iter().any(|cover| cover == name))
        })
    }
}

impl ArtSource for LibraryArt {
    fn name(&self) -> &'static str {
        "library"
    }

    fn resolve(
        &self,
        track: &TrackRef,
        _daemon: &mut dyn EmbeddedArtFetch,
    ) -> Result<Option<Artwork>, SessionError> {
        let Some(path) = self.find_cover(track) else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(decode_or_warn(&bytes, track)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read cover file");
                Ok(None)
            }
        }
    }
}

/// Asks the daemon for the picture embedded in the track file.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedArt;

impl ArtSource for EmbeddedArt {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn resolve(
        &self,
        track: &TrackRef,
        daemon: &mut dyn EmbeddedArtFetch,
    ) -> Result<Option<Artwork>, SessionError> {
        match daemon.fetch_embedded_art(track)? {
            Some(bytes) if !bytes.is_empty() => Ok(decode_or_warn(&bytes, track)),
            _ => Ok(None),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::png_bytes;
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeFetch {
        art: HashMap<String, Vec<u8>>,
        fail: bool,
        calls: usize,
    }

    impl EmbeddedArtFetch for FakeFetch {
        fn fetch_embedded_art(
            &mut self,
            track: &TrackRef,
        ) -> Result<Option<Vec<u8>>, SessionError> {
            self.calls += 1;
            if self.fail {
                return Err(SessionError::request("albumart", "connection reset"));
            }
            Ok(self.art.get(track.as_str()).cloned())
        }
    }

    fn library_with(files: &[(&str, Vec<u8>)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, contents) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        dir
    }

    #[test]
    fn decode_artwork_fails_on_garbage_input() {
        assert!(decode_artwork(&[0u8, 1u8, 2u8, 3u8]).is_err());
    }

    #[test]
    fn decoded_artwork_keeps_intrinsic_size() {
        let artwork = decode_artwork(&png_bytes(8, 4)).unwrap();
        assert_eq!((artwork.width(), artwork.height()), (8, 4));
        assert_eq!(artwork.aspect(), 2.0);
    }

    #[test]
    fn oversized_artwork_is_downscaled_for_upload() {
        let artwork = decode_artwork(&png_bytes(17000, 2)).unwrap();

        let [w, h] = artwork.texture_size();
        assert!(w <= MAX_TEXTURE_SIDE as usize && h <= MAX_TEXTURE_SIDE as usize);
        assert_eq!([w, h], [4096, 1]);
        assert_eq!((artwork.width(), artwork.height()), (17000, 2));
        assert_eq!(artwork.aspect(), 8500.0);
    }

    #[test]
    fn downscaling_keeps_proportions() {
        let artwork = decode_artwork(&png_bytes(5000, 3000)).unwrap();

        assert_eq!(artwork.texture_size(), [4096, 2458]);
        assert_eq!((artwork.width(), artwork.height()), (5000, 3000));
        assert!((artwork.aspect() - 5.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn small_artwork_is_uploaded_as_is() {
        let artwork = decode_artwork(&png_bytes(640, 480)).unwrap();
        assert_eq!(artwork.texture_size(), [640, 480]);
    }

    #[test]
    fn library_finds_sibling_cover() {
        let library = library_with(&[
            ("Artist/Album/01 Intro.flac", vec![]),
            ("Artist/Album/cover.png", png_bytes(6, 3)),
        ]);
        let source = LibraryArt::new(library.path());
        let track = TrackRef::new("Artist/Album/01 Intro.flac");

        let artwork = source
            .resolve(&track, &mut FakeFetch::default())
            .unwrap()
            .expect("cover.png is next to the track");
        assert_eq!(artwork.aspect(), 2.0);
    }

    #[test]
    fn library_ignores_other_image_names() {
        let library = library_with(&[
            ("Album/01.flac", vec![]),
            ("Album/folder.jpg", png_bytes(2, 2)),
            ("Album/Cover.PNG", png_bytes(2, 2)),
            ("Album/cover.jpg.bak", png_bytes(2, 2)),
        ]);
        let source = LibraryArt::new(library.path());

        assert!(source.find_cover(&TrackRef::new("Album/01.flac")).is_none());
    }

    #[test]
    fn library_honours_custom_cover_names() {
        let library = library_with(&[
            ("Album/01.flac", vec![]),
            ("Album/folder.jpg", png_bytes(2, 2)),
        ]);
        let source = LibraryArt::with_cover_names(library.path(), vec!["folder.jpg".to_string()]);

        let cover = source.find_cover(&TrackRef::new("Album/01.flac")).unwrap();
        assert_eq!(cover.file_name().unwrap(), "folder.jpg");
    }

    #[test]
    fn library_missing_directory_is_absence() {
        let library = library_with(&[]);
        let source = LibraryArt::new(library.path());
        let track = TrackRef::new("Gone/Album/01.flac");

        assert!(source.resolve(&track, &mut FakeFetch::default()).unwrap().is_none());
    }

    #[test]
    fn library_corrupt_cover_is_absence() {
        let library = library_with(&[
            ("Album/01.flac", vec![]),
            ("Album/cover.jpg", b"not a jpeg".to_vec()),
        ]);
        let source = LibraryArt::new(library.path());

        let resolved = source
            .resolve(&TrackRef::new("Album/01.flac"), &mut FakeFetch::default())
            .unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn library_never_asks_the_daemon() {
        let library = library_with(&[("Album/01.flac", vec![])]);
        let source = LibraryArt::new(library.path());
        let mut fetch = FakeFetch {
            fail: true,
            ..Default::default()
        };

        assert!(source
            .resolve(&TrackRef::new("Album/01.flac"), &mut fetch)
            .unwrap()
            .is_none());
        assert_eq!(fetch.calls, 0);
    }

    #[test]
    fn embedded_decodes_daemon_bytes() {
        let mut fetch = FakeFetch::default();
        fetch.art.insert("a.flac".into(), png_bytes(3, 6));

        let artwork = EmbeddedArt
            .resolve(&TrackRef::new("a.flac"), &mut fetch)
            .unwrap()
            .unwrap();
        assert_eq!(artwork.aspect(), 0.5);
    }

    #[test]
    fn embedded_absent_or_empty_is_none() {
        let mut fetch = FakeFetch::default();
        fetch.art.insert("empty.flac".into(), Vec::new());

        assert!(EmbeddedArt
            .resolve(&TrackRef::new("empty.flac"), &mut fetch)
            .unwrap()
            .is_none());
        assert!(EmbeddedArt
            .resolve(&TrackRef::new("missing.flac"), &mut fetch)
            .unwrap()
            .is_none());
    }

    #[test]
    fn embedded_corrupt_bytes_are_none() {
        let mut fetch = FakeFetch::default();
        fetch.art.insert("bad.flac".into(), vec![0xff, 0xd8, 0x00]);

        assert!(EmbeddedArt
            .resolve(&TrackRef::new("bad.flac"), &mut fetch)
            .unwrap()
            .is_none());
    }

    #[test]
    fn embedded_request_failure_propagates() {
        let mut fetch = FakeFetch {
            fail: true,
            ..Default::default()
        };

        let err = EmbeddedArt
            .resolve(&TrackRef::new("a.flac"), &mut fetch)
            .unwrap_err();
        assert!(matches!(err, SessionError::Request { op: "albumart", .. }));
    }
}
