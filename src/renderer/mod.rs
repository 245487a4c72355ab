//! Screenshot backends and the pool that distributes work across them

use std::io::Cursor;
use std::path::PathBuf;

use futures::future::BoxFuture;

use crate::{Error, Result, ScreenSize, ViewType};

pub mod pool;
pub use pool::RendererPool;

#[cfg(feature = "cdp")]
pub mod cdp;

#[cfg(feature = "remote")]
pub mod remote;

/// One screenshot job
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Complete HTML document to render
    pub html: String,
    /// Viewport and output image size
    pub size: ScreenSize,
    /// Output format (`Png` or `Bmp`)
    pub view: ViewType,
    /// Where the finished artifact is written
    pub output: PathBuf,
}

/// A finished screenshot
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub path: PathBuf,
    pub buffer: Vec<u8>,
}

/// A screenshot-capable provider
///
/// Implementations are interchangeable; the pool only sees this trait.
pub trait RendererBackend: Send + Sync {
    fn render_page<'a>(&'a self, request: &'a PageRequest) -> BoxFuture<'a, Result<RenderedPage>>;
}

/// Convert a PNG capture to the requested view format and write it out.
pub async fn finish_page(png: Vec<u8>, request: &PageRequest) -> Result<RenderedPage> {
    let buffer = encode_for_view(png, request.view)?;
    tokio::fs::write(&request.output, &buffer).await?;
    Ok(RenderedPage {
        path: request.output.clone(),
        buffer,
    })
}

/// PNG passes through, BMP is reduced to 8-bit grayscale for e-paper panels.
pub fn encode_for_view(png: Vec<u8>, view: ViewType) -> Result<Vec<u8>> {
    match view {
        ViewType::Png => Ok(png),
        ViewType::Bmp => {
            let img = image::load_from_memory(&png)?;
            let gray = image::DynamicImage::ImageLuma8(img.to_luma8());
            let mut buf = Vec::new();
            gray.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Bmp)?;
            Ok(buf)
        }
        other => Err(Error::Image(format!("'{}' is not an image view", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 2, image::Rgb([200, 10, 10]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn png_passes_through() {
        let png = tiny_png();
        assert_eq!(encode_for_view(png.clone(), ViewType::Png).unwrap(), png);
    }

    #[test]
    fn bmp_is_grayscale_bitmap() {
        let bmp = encode_for_view(tiny_png(), ViewType::Bmp).unwrap();
        assert_eq!(&bmp[0..2], b"BM");
        let decoded = image::load_from_memory(&bmp).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 2));
    }

    #[test]
    fn non_image_view_rejected() {
        assert!(matches!(encode_for_view(tiny_png(), ViewType::Json), Err(Error::Image(_))));
    }
}
