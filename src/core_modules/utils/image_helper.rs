use crate::core_modules::frame::Frame;
use image::ImageEncoder;
use std::path::Path;

/// Writes `frame` to `path` as an RGB PNG.
pub fn save<P: AsRef<Path>>(path: P, frame: &Frame) -> Result<(), image::error::ImageError> {
    let output = std::fs::File::create(path)?;
    let encoder = image::codecs::png::PngEncoder::new(output);
    let rgb = frame.to_rgb_image();

    encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::{FLAME_COLOR, Pixel};

    #[test]
    fn saved_png_is_in_rgb_order() {
        let mut frame = Frame::black(6, 4).unwrap();
        frame.put_pixel(5, 3, FLAME_COLOR);
        frame.put_pixel(0, 0, Pixel::new(10, 20, 30));

        let path = std::env::temp_dir().join("pyro_vision_saved_png_is_in_rgb_order.png");
        save(&path, &frame).expect("Error Saving File.");

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (6, 4));
        assert_eq!(loaded.get_pixel(5, 3).0, [255, 0, 0]);
        assert_eq!(loaded.get_pixel(0, 0).0, [30, 20, 10]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let frame = Frame::black(2, 2).unwrap();
        let path = std::env::temp_dir()
            .join("pyro_vision_missing_dir")
            .join("nested")
            .join("out.png");
        assert!(save(path, &frame).is_err());
    }
}
