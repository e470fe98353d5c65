use std::{collections::HashMap, path::Path, sync::Arc};

use fxhash::{FxBuildHasher, FxHashSet};

use crate::error::{FormatError, LoadError};
use crate::font::{FontBlob, FontInfo};

/// Handle of one face inside a [`FontStorage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FontId(u32);

impl std::fmt::Display for FontId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "font#{}", self.0)
    }
}

/// Owns font blobs and the faces loaded from them.
///
/// Every face of a collection gets its own [`FontId`]. Ids are handed out
/// in load order and never reused, so a lower id means an earlier font when
/// looking for a face that covers a codepoint.
pub struct FontStorage {
    fonts: HashMap<FontId, Arc<FontInfo>, FxBuildHasher>,
    next_id: u32,
}

impl Default for FontStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FontStorage {
    /// Creates a new empty font storage.
    pub fn new() -> Self {
        Self {
            fonts: HashMap::with_hasher(FxBuildHasher::default()),
            next_id: 0,
        }
    }
}

/// Loading
impl FontStorage {
    /// Loads every face of a font or collection from binary data.
    ///
    /// Faces that fail to parse are logged and skipped. Fails only if no
    /// face could be loaded.
    pub fn load_font_binary(&mut self, data: impl Into<Vec<u8>>) -> Result<Vec<FontId>, FormatError> {
        let data: Vec<u8> = data.into();
        let blob = FontBlob::new(data);
        let num_fonts = blob.num_fonts();
        if num_fonts == 0 {
            return Err(FormatError::UnknownMagic);
        }

        let mut ids = Vec::with_capacity(num_fonts);
        let mut first_error = None;
        for index in 0..num_fonts {
            match FontInfo::load(&blob, index) {
                Ok(font) => ids.push(self.insert(font)),
                Err(e) => {
                    log::error!("Failed to load face {index}: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) if ids.is_empty() => Err(e),
            _ => Ok(ids),
        }
    }

    /// Loads every face of a font file.
    pub fn load_font_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<FontId>, LoadError> {
        let data = std::fs::read(path)?;
        Ok(self.load_font_binary(data)?)
    }

    /// Loads all `.ttf`, `.otf`, `.ttc` and `.otc` files of a directory.
    ///
    /// Unreadable or malformed files are logged and skipped.
    pub fn load_fonts_dir(&mut self, dir: impl AsRef<Path>) -> Vec<FontId> {
        let dir = dir.as_ref();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to read font directory {}: {e}", dir.display());
                return Vec::new();
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc" | "otc"))
            })
            .collect();
        paths.sort();

        let mut ids = Vec::new();
        for path in paths {
            match self.load_font_file(&path) {
                Ok(loaded) => ids.extend(loaded),
                Err(e) => log::warn!("Skipping {}: {e}", path.display()),
            }
        }
        ids
    }

    fn insert(&mut self, font: FontInfo) -> FontId {
        let id = FontId(self.next_id);
        self.next_id += 1;
        self.fonts.insert(id, Arc::new(font));
        id
    }

    /// Removes a face by ID.
    pub fn remove_face(&mut self, id: FontId) -> Option<Arc<FontInfo>> {
        self.fonts.remove(&id)
    }

    /// Checks if the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Returns the number of loaded faces.
    pub fn len(&self) -> usize {
        self.fonts.len()
    }
}

/// Get `FontInfo`
impl FontStorage {
    pub fn font(&self, id: FontId) -> Option<Arc<FontInfo>> {
        self.fonts.get(&id).map(Arc::clone)
    }

    /// All face ids, in load order.
    pub fn ids(&self) -> Vec<FontId> {
        let mut ids: Vec<FontId> = self.fonts.keys().copied().collect();
        ids.sort();
        ids
    }

    /// The earliest loaded face with a glyph for `codepoint`.
    pub fn font_for_codepoint(&self, codepoint: u32) -> Option<FontId> {
        self.fonts
            .iter()
            .filter(|(_, font)| font.has_glyph(codepoint))
            .map(|(&id, _)| id)
            .min()
    }

    /// The codepoints of `codepoints` that face `id` has glyphs for.
    ///
    /// Empty when there is no such face.
    pub fn coverage(&self, id: FontId, codepoints: impl IntoIterator<Item = u32>) -> FxHashSet<u32> {
        let Some(font) = self.fonts.get(&id) else {
            return FxHashSet::default();
        };
        codepoints.into_iter().filter(|&c| font.has_glyph(c)).collect()
    }

    /// The codepoints of `codepoints` that no loaded face covers.
    pub fn uncovered(&self, codepoints: impl IntoIterator<Item = u32>) -> FxHashSet<u32> {
        codepoints
            .into_iter()
            .filter(|&c| !self.fonts.values().any(|font| font.has_glyph(c)))
            .collect()
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cff_square_font, collection, square_font};

    #[test]
    fn collections_load_every_face() {
        let mut storage = FontStorage::new();
        let ids = storage
            .load_font_binary(collection(&[square_font(), cff_square_font()]))
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(storage.len(), 2);
        assert!(!storage.font(ids[0]).unwrap().is_cff());
        assert!(storage.font(ids[1]).unwrap().is_cff());
        assert_eq!(storage.ids(), ids);
    }

    #[test]
    fn garbage_is_rejected() {
        let mut storage = FontStorage::default();
        assert_eq!(storage.load_font_binary(vec![0u8; 32]).unwrap_err(), FormatError::UnknownMagic);
        assert!(storage.is_empty());
    }

    #[test]
    fn coverage_queries() {
        let mut storage = FontStorage::new();
        let first = storage.load_font_binary(square_font()).unwrap()[0];
        let second = storage.load_font_binary(cff_square_font()).unwrap()[0];
        assert_eq!(storage.font_for_codepoint('A' as u32), Some(first));
        assert_eq!(storage.font_for_codepoint('Z' as u32), None);

        let text = "A Z?".chars().map(u32::from);
        let covered = storage.coverage(second, text.clone());
        assert_eq!(covered, ['A' as u32, ' ' as u32].into_iter().collect());
        let uncovered = storage.uncovered(text);
        assert_eq!(uncovered, ['Z' as u32, '?' as u32].into_iter().collect());

        storage.remove_face(first).unwrap();
        assert_eq!(storage.font_for_codepoint('A' as u32), Some(second));
        assert!(storage.coverage(first, ['A' as u32]).is_empty());
    }

    #[test]
    fn loads_files_from_a_directory() {
        let dir = std::env::temp_dir().join(format!("suzuri-raster-fonts-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("square.ttf"), square_font()).unwrap();
        std::fs::write(dir.join("square.otf"), cff_square_font()).unwrap();
        std::fs::write(dir.join("broken.ttf"), b"not a font").unwrap();
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let mut storage = FontStorage::new();
        let ids = storage.load_fonts_dir(&dir);
        assert_eq!(ids.len(), 2);
        assert!(matches!(
            storage.load_font_file(dir.join("missing.ttf")),
            Err(LoadError::Io(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
