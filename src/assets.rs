use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use thiserror::Error;

pub const TEXTURES_SUBDIR: &str = "textures";
pub const FONTS_SUBDIR: &str = "fonts";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("{kind} '{name}' not found at '{}'", path.display())]
    NotFound { kind: &'static str, name: String, path: PathBuf },

    #[error("reading {kind} '{name}' from '{}'", path.display())]
    Io {
        kind: &'static str,
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing font '{name}' from '{}'", path.display())]
    Parse {
        name: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("decoding texture '{name}' from '{}'", path.display())]
    Decode {
        name: String,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Resolved texture. The host does not decode pixel data; it probes the
/// image header so scripts and the embedding renderer can size draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureHandle {
    name: String,
    width: u32,
    height: u32,
}

impl TextureHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Fixed-cell bitmap font metrics; the draw call cannot soft-wrap, callers
/// hard-wrap text themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontHandle {
    name: String,
    glyph_width: u32,
    glyph_height: u32,
}

impl FontHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn glyph_width(&self) -> u32 {
        self.glyph_width
    }
    pub fn glyph_height(&self) -> u32 {
        self.glyph_height
    }
}

#[derive(Debug, Deserialize)]
struct FontFile {
    glyph_width: u32,
    glyph_height: u32,
}

/// Name-keyed texture/font cache rooted at a project's `assets` directory.
pub struct AssetCache {
    root: PathBuf,
    textures: HashMap<String, TextureHandle>,
    fonts: HashMap<String, FontHandle>,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), textures: HashMap::new(), fonts: HashMap::new() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_texture(&mut self, name: &str) -> Result<TextureHandle, AssetError> {
        if let Some(handle) = self.textures.get(name) {
            return Ok(handle.clone());
        }
        let path = self.root.join(TEXTURES_SUBDIR).join(format!("{name}.png"));
        if !path.is_file() {
            return Err(AssetError::NotFound { kind: "texture", name: name.to_string(), path });
        }
        let (width, height) = image::image_dimensions(&path).map_err(|source| AssetError::Decode {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;
        let handle = TextureHandle { name: name.to_string(), width, height };
        self.textures.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn load_font(&mut self, name: &str) -> Result<FontHandle, AssetError> {
        if let Some(handle) = self.fonts.get(name) {
            return Ok(handle.clone());
        }
        let path = self.root.join(FONTS_SUBDIR).join(format!("{name}.json"));
        let text = fs::read_to_string(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                AssetError::NotFound { kind: "font", name: name.to_string(), path: path.clone() }
            } else {
                AssetError::Io { kind: "font", name: name.to_string(), path: path.clone(), source }
            }
        })?;
        let file: FontFile = serde_json::from_str(&text).map_err(|source| AssetError::Parse {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;
        let handle = FontHandle {
            name: name.to_string(),
            glyph_width: file.glyph_width,
            glyph_height: file.glyph_height,
        };
        self.fonts.insert(name.to_string(), handle.clone());
        Ok(handle)
    }
}

/// Shared facade injected into the script namespace; clones see one cache.
#[derive(Clone)]
pub struct ContentHandle {
    cache: Arc<Mutex<AssetCache>>,
}

impl ContentHandle {
    pub fn new(cache: AssetCache) -> Self {
        Self { cache: Arc::new(Mutex::new(cache)) }
    }

    pub fn load_texture(&self, name: &str) -> Result<TextureHandle, AssetError> {
        self.lock().load_texture(name)
    }

    pub fn load_font(&self, name: &str) -> Result<FontHandle, AssetError> {
        self.lock().load_font(name)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AssetCache> {
        self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_texture_reports_not_found() {
        let dir = tempfile::tempdir().expect("temp assets");
        let mut cache = AssetCache::new(dir.path());
        let err = cache.load_texture("ghost").expect_err("texture should be missing");
        assert!(matches!(err, AssetError::NotFound { kind: "texture", .. }), "got {err:?}");
    }

    #[test]
    fn font_loads_from_json_descriptor_and_caches() {
        let dir = tempfile::tempdir().expect("temp assets");
        fs::create_dir_all(dir.path().join(FONTS_SUBDIR)).expect("fonts dir");
        fs::write(
            dir.path().join(FONTS_SUBDIR).join("errorfont.json"),
            r#"{"glyph_width":8,"glyph_height":16}"#,
        )
        .expect("write font");

        let mut cache = AssetCache::new(dir.path());
        let font = cache.load_font("errorfont").expect("font should load");
        assert_eq!((font.glyph_width(), font.glyph_height()), (8, 16));

        fs::remove_file(dir.path().join(FONTS_SUBDIR).join("errorfont.json")).expect("remove font");
        let cached = cache.load_font("errorfont").expect("cached font should survive deletion");
        assert_eq!(cached, font);
    }

    #[test]
    fn malformed_font_descriptor_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("temp assets");
        fs::create_dir_all(dir.path().join(FONTS_SUBDIR)).expect("fonts dir");
        fs::write(dir.path().join(FONTS_SUBDIR).join("bad.json"), "not json").expect("write font");

        let mut cache = AssetCache::new(dir.path());
        let err = cache.load_font("bad").expect_err("descriptor should fail to parse");
        assert!(matches!(err, AssetError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn shipped_demo_texture_probes_dimensions() {
        let mut cache = AssetCache::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"));
        let texture = cache.load_texture("logo").expect("demo texture should load");
        assert_eq!(texture.name(), "logo");
        assert!(texture.width() >= 1 && texture.height() >= 1);
    }
}
