//! Texture loading and data structures.
//! Images are decoded to RGBA8 before GPU upload.

use std::fmt;
use std::path::Path;

use image::{RgbaImage, imageops::FilterType};

use crate::error::TextureLoadError;

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureFormat {
    Rgba8,
}

/// Material slot a texture is sampled through. Decides the uniform name at draw time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureKind {
    /// All kinds in the order the importer resolves material slots.
    pub const ALL: [TextureKind; 4] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Normal,
        TextureKind::Height,
    ];

    pub const fn uniform_prefix(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "texture_diffuse",
            TextureKind::Specular => "texture_specular",
            TextureKind::Normal => "texture_normal",
            TextureKind::Height => "texture_height",
        }
    }

    /// `ordinal` is 1-based: `Diffuse.uniform_name(2) == "texture_diffuse2"`.
    pub fn uniform_name(self, ordinal: u32) -> String {
        format!("{}{}", self.uniform_prefix(), ordinal)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TextureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uniform_prefix())
    }
}

impl TextureData {
    /// Create a new texture with given dimensions and RGBA8 format.
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width * height * 4) as usize,
            "Data size doesn't match RGBA8 format"
        );
        Self {
            data,
            width,
            height,
            format: TextureFormat::Rgba8,
        }
    }

    /// Decode any supported image file (PNG/JPEG) into RGBA8.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TextureLoadError> {
        let path = path.as_ref();
        log::debug!("Decoding texture {:?}", path);

        let img = image::open(path).map_err(|source| TextureLoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let data = rgba.into_raw();

        log::info!(
            "Loaded texture {:?}: {}x{} with {} bytes",
            path,
            width,
            height,
            data.len()
        );

        Ok(Self::new_rgba8(width, height, data))
    }

    /// Create a simple test texture (checkerboard pattern).
    pub fn create_test_texture(size: u32) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let checker = ((x / 8) + (y / 8)) % 2;
                if checker == 0 {
                    data.extend_from_slice(&[255, 255, 255, 255]);
                } else {
                    data.extend_from_slice(&[128, 128, 128, 255]);
                }
            }
        }

        Self::new_rgba8(size, size, data)
    }

    /// 1x1 opaque white, bound wherever a texture is missing.
    pub fn white() -> Self {
        Self::new_rgba8(1, 1, vec![255; 4])
    }

    /// Get the number of bytes per pixel for the format.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self.format {
            TextureFormat::Rgba8 => 4,
        }
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size = (self.width * self.height * self.bytes_per_pixel()) as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }

    /// Number of levels in a full mip chain down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        32 - self.width.max(self.height).max(1).leading_zeros()
    }

    /// Full mip chain, level 0 first. Each level halves both sides (min 1).
    pub fn mip_chain(&self) -> Vec<TextureData> {
        let levels = self.mip_level_count();
        let mut chain = Vec::with_capacity(levels as usize);
        chain.push(self.clone());

        let Some(base) = RgbaImage::from_raw(self.width, self.height, self.data.clone()) else {
            return chain;
        };
        let (mut w, mut h) = (self.width, self.height);
        for _ in 1..levels {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            let level = image::imageops::resize(&base, w, h, FilterType::Triangle);
            chain.push(Self::new_rgba8(w, h, level.into_raw()));
        }
        chain
    }
}

/// External image-decoding collaborator.
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<TextureData, TextureLoadError>;
}

/// Decoder backed by the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, path: &Path) -> Result<TextureData, TextureLoadError> {
        TextureData::load(path)
    }
}

impl<F> ImageDecoder for F
where
    F: Fn(&Path) -> Result<TextureData, TextureLoadError>,
{
    fn decode(&self, path: &Path) -> Result<TextureData, TextureLoadError> {
        self(path)
    }
}
