// images.rs — 贴图解码、裁剪与 2 的幂补边

use crate::error::ViewerError;
use crate::maps::Crop;
use image::io::Reader as ImageReader;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 补边后的像素，`sx`/`sy` 为原内容占纹理的比例
#[derive(Debug)]
pub struct PreparedImage {
    pub pixels: RgbaImage,
    pub sx: f32,
    pub sy: f32,
}

pub fn decode(path: &Path) -> Result<RgbaImage, ViewerError> {
    let decode_error = |source| ViewerError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|e| decode_error(image::ImageError::IoError(e)))?;
    let img = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)
        .and_then(|mut r| {
            r.no_limits();
            r.decode()
        })
        .map_err(decode_error)?;
    log::info!("decoded {} ({}x{})", path.display(), img.width(), img.height());
    Ok(img.to_rgba8())
}

/// 可选裁剪，然后把宽高补到 2 的幂（右侧和底部补透明黑）。
/// 裁剪矩形的名义宽高就是有效区域；超出原图的部分留黑。
pub fn prepare(img: RgbaImage, crop: Option<Crop>) -> Result<PreparedImage, ViewerError> {
    let (img, w, h) = match crop {
        Some(c) => {
            let (width, height) = img.dimensions();
            if c.w == 0 || c.h == 0 || c.x >= width || c.y >= height {
                return Err(ViewerError::Crop {
                    x: c.x,
                    y: c.y,
                    w: c.w,
                    h: c.h,
                    width,
                    height,
                });
            }
            let (ow, oh) = (c.w.min(width - c.x), c.h.min(height - c.y));
            if (ow, oh) != (c.w, c.h) {
                log::debug!("crop {}x{}+{}+{} clipped to {ow}x{oh}", c.w, c.h, c.x, c.y);
            }
            (imageops::crop_imm(&img, c.x, c.y, ow, oh).to_image(), c.w, c.h)
        }
        None => {
            let (w, h) = img.dimensions();
            (img, w, h)
        }
    };

    let (pw, ph) = (w.next_power_of_two(), h.next_power_of_two());
    let sx = w as f32 / pw as f32;
    let sy = h as f32 / ph as f32;
    if img.dimensions() == (pw, ph) {
        return Ok(PreparedImage { pixels: img, sx, sy });
    }

    let mut canvas = RgbaImage::new(pw, ph);
    imageops::replace(&mut canvas, &img, 0, 0);
    log::debug!("padded {w}x{h} to {pw}x{ph}");
    Ok(PreparedImage {
        pixels: canvas,
        sx,
        sy,
    })
}

/// 超过 GPU 的最大纹理尺寸时整体减半，直到放得下。
/// 补边区域一起缩放，所以 `sx`/`sy` 不变。
pub fn fit_texture_limit(prepared: PreparedImage, max_dimension: u32) -> PreparedImage {
    let (w, h) = prepared.pixels.dimensions();
    let (mut nw, mut nh) = (w, h);
    while (nw > max_dimension || nh > max_dimension) && nw > 1 && nh > 1 {
        nw /= 2;
        nh /= 2;
    }
    if (nw, nh) == (w, h) {
        return prepared;
    }
    log::warn!("texture {w}x{h} exceeds GPU limit {max_dimension}, scaled to {nw}x{nh}");
    PreparedImage {
        pixels: imageops::resize(&prepared.pixels, nw, nh, FilterType::Lanczos3),
        ..prepared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn crop_then_pad_tracks_valid_region() {
        let src = RgbaImage::from_pixel(1600, 800, Rgba([10, 20, 30, 255]));
        let crop = Crop {
            x: 16,
            y: 18,
            w: 1579,
            h: 787,
        };
        let out = prepare(src, Some(crop)).unwrap();
        assert_eq!(out.pixels.dimensions(), (2048, 1024));
        assert_eq!(out.sx, 1579.0 / 2048.0);
        assert_eq!(out.sy, 787.0 / 1024.0);
        // 原图只剩 800 - 18 = 782 行，其余有效区域留黑
        assert_eq!(out.pixels.get_pixel(1578, 781), &Rgba([10, 20, 30, 255]));
        assert_eq!(out.pixels.get_pixel(0, 782), &Rgba([0, 0, 0, 0]));
        assert_eq!(out.pixels.get_pixel(1579, 0), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn crop_fully_inside_copies_exact_region() {
        let mut src = RgbaImage::new(64, 64);
        src.put_pixel(10, 20, Rgba([255, 0, 0, 255]));
        let crop = Crop {
            x: 10,
            y: 20,
            w: 30,
            h: 12,
        };
        let out = prepare(src, Some(crop)).unwrap();
        assert_eq!(out.pixels.dimensions(), (32, 16));
        assert_eq!(out.pixels.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!((out.sx, out.sy), (30.0 / 32.0, 12.0 / 16.0));
    }

    #[test]
    fn power_of_two_images_pass_through() {
        let out = prepare(RgbaImage::new(512, 256), None).unwrap();
        assert_eq!(out.pixels.dimensions(), (512, 256));
        assert_eq!((out.sx, out.sy), (1.0, 1.0));
    }

    #[test]
    fn crop_outside_image_is_rejected() {
        let outside = Crop {
            x: 1600,
            y: 0,
            w: 16,
            h: 16,
        };
        let err = prepare(RgbaImage::new(1600, 800), Some(outside)).unwrap_err();
        assert!(matches!(err, ViewerError::Crop { width: 1600, .. }));

        let empty = Crop {
            x: 0,
            y: 0,
            w: 0,
            h: 16,
        };
        let err = prepare(RgbaImage::new(1600, 800), Some(empty)).unwrap_err();
        assert!(matches!(err, ViewerError::Crop { w: 0, .. }));
    }

    #[test]
    fn oversized_textures_are_halved_keeping_scale() {
        let prepared = prepare(RgbaImage::new(200, 100), None).unwrap();
        let fitted = fit_texture_limit(prepared, 64);
        assert_eq!(fitted.pixels.dimensions(), (64, 32));
        assert_eq!(fitted.sx, 200.0 / 256.0);
    }

    #[test]
    fn decode_reads_png_and_reports_missing_files() {
        let dir = std::env::temp_dir().join(format!("sphere_mapper_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tiny.png");
        RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255])).save(&path).unwrap();

        let img = decode(&path).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1), &Rgba([1, 2, 3, 255]));

        let missing = decode(&dir.join("nope.jpg")).unwrap_err();
        assert!(matches!(missing, ViewerError::Decode { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }
}
