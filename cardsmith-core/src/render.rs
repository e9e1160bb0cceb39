use crate::error::CardResult;

/// Raster output format of a rendered face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    #[default]
    Png,
    Jpeg,
}

/// Rasterization parameters. Unset dimensions fall back to the intrinsic
/// size of the vector document.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub format: RenderFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub dpi: Option<f32>,
}

/// Turns a vector document into raster bytes. The loader and binder stay
/// renderer-agnostic; hosts plug in whatever backend they ship with.
pub trait VectorRenderer: Send + Sync {
    fn render(&self, source: &[u8], options: &RenderOptions) -> CardResult<Vec<u8>>;
}
