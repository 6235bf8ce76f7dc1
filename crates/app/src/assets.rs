//! Demo inputs: the file texture and the per-frame parameter block.

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use glam::{IVec2, UVec2};
use tracing::info;

use inflight_renderer::{RenderError, RenderResult};

/// Decoded RGBA8 pixels.
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Texture {
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// Decode the image at `path` to RGBA8.
///
/// # Errors
///
/// Returns [`RenderError::AssetMissing`] if the file cannot be opened or
/// decoded, or if it has no pixels.
pub fn load_texture(path: &Path) -> RenderResult<Texture> {
    let missing = |reason: String| RenderError::AssetMissing {
        path: path.to_path_buf(),
        reason,
    };

    let decoded = image::open(path).map_err(|e| missing(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(missing("image has no pixels".into()));
    }

    info!("Loaded texture {}: {}x{}", path.display(), width, height);
    Ok(Texture {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// Parameters every frame uploads.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Params {
    pub resolution: UVec2,
    pub mouse: IVec2,
}

impl Params {
    pub fn new(resolution: (u32, u32), mouse: (i32, i32)) -> Self {
        Self {
            resolution: UVec2::new(resolution.0, resolution.1),
            mouse: IVec2::new(mouse.0, mouse.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_texture() {
        let path = Path::new("definitely/not/here.bmp");
        match load_texture(path) {
            Err(RenderError::AssetMissing { path: reported, .. }) => assert_eq!(reported, path),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("missing texture loaded"),
        }
    }

    #[test]
    fn test_load_png() {
        let path = std::env::temp_dir().join(format!("inflight-test-{}.png", std::process::id()));
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        img.save(&path).unwrap();

        let texture = load_texture(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!((texture.width, texture.height), (3, 2));
        assert_eq!(texture.byte_len(), 3 * 2 * 4);
        assert_eq!(&texture.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<Params>(), 16);
        let params = Params::new((1280, 720), (-4, 9));
        let bytes = bytemuck::bytes_of(&params);
        assert_eq!(&bytes[0..4], &1280u32.to_ne_bytes());
        assert_eq!(&bytes[12..16], &9i32.to_ne_bytes());
    }
}
