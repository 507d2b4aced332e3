use num::complex::Complex64;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_center() -> nalgebra::Vector2<f64> {
    nalgebra::Vector2::new(0.0, 0.0)
}

fn default_width() -> f64 {
    2.0
}

/**
 * Specifies the square sampling grid: `resolution` points per side, centered
 * at `center` in the complex plane and spanning `width` along both axes. The
 * defaults describe the square [-1,1]x[-1,1].
 */
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageSpecification {
    pub resolution: u32,
    #[serde(default = "default_center")]
    pub center: nalgebra::Vector2<f64>,
    #[serde(default = "default_width")]
    pub width: f64,
}

impl ImageSpecification {
    /// Grid of `resolution x resolution` points over [-1,1]x[-1,1].
    pub fn unit_square(resolution: u32) -> ImageSpecification {
        ImageSpecification {
            resolution,
            center: default_center(),
            width: default_width(),
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.resolution as usize) * (self.resolution as usize)
    }
}

pub fn create_buffer<T: Clone>(value: T, resolution: u32) -> Vec<Vec<T>> {
    vec![vec![value; resolution as usize]; resolution as usize]
}

/**
 * Used to map from grid index space into the complex plane. The map samples
 * `n` evenly spaced points on [x0, x1], with both endpoints hit exactly.
 */
#[derive(Clone, Debug)]
pub struct LinearPixelMap {
    offset: f64,
    slope: f64,
    last_index: u32,
    last_value: f64,
}

impl LinearPixelMap {
    /**
     * @param n: number of pixels spanned by [x0,x1]
     * @param x0: output of the map at 0
     * @param x1: output of the map at n-1 (ignored when n == 1)
     */
    pub fn new(n: u32, x0: f64, x1: f64) -> LinearPixelMap {
        assert!(n > 0);
        let slope = if n > 1 {
            (x1 - x0) / ((n - 1) as f64)
        } else {
            0.0
        };
        LinearPixelMap {
            offset: x0,
            slope,
            last_index: n - 1,
            last_value: if n > 1 { x1 } else { x0 },
        }
    }

    pub fn new_from_center_and_width(n: u32, center: f64, width: f64) -> LinearPixelMap {
        LinearPixelMap::new(n, center - 0.5 * width, center + 0.5 * width)
    }

    // Map from pixel (integer) to point (float)
    pub fn map(&self, index: u32) -> f64 {
        if index == self.last_index {
            self.last_value
        } else {
            self.offset + self.slope * (index as f64)
        }
    }
}

/**
 * Maps grid cells onto complex sample points: the column index selects the
 * real part and the row index selects the imaginary part. Both increase with
 * their index, so row zero holds the most negative imaginary part.
 */
#[derive(Clone, Debug)]
pub struct PixelMapper {
    real: LinearPixelMap,
    imag: LinearPixelMap,
}

impl PixelMapper {
    pub fn new(image_specification: &ImageSpecification) -> PixelMapper {
        PixelMapper {
            real: LinearPixelMap::new_from_center_and_width(
                image_specification.resolution,
                image_specification.center[0],
                image_specification.width,
            ),
            imag: LinearPixelMap::new_from_center_and_width(
                image_specification.resolution,
                image_specification.center[1],
                image_specification.width,
            ),
        }
    }

    pub fn real(&self, col: u32) -> f64 {
        self.real.map(col)
    }

    pub fn imag(&self, row: u32) -> f64 {
        self.imag.map(row)
    }

    pub fn map(&self, row: u32, col: u32) -> Complex64 {
        Complex64::new(self.real(col), self.imag(row))
    }
}

/**
 * Writes `image` to `path`, deducing the format from the file extension.
 * PNG files also carry `title` as a `Title` text chunk.
 */
pub fn write_image_to_file(
    path: &Path,
    image: &image::RgbImage,
    title: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let is_png = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.eq_ignore_ascii_case("png"))
        .unwrap_or(false);

    if is_png {
        let file = std::fs::File::create(path)?;
        let mut encoder =
            png::Encoder::new(std::io::BufWriter::new(file), image.width(), image.height());
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.add_text_chunk("Title".to_owned(), title.to_owned())?;
        let mut writer = encoder.write_header()?;
        writer.write_image_data(image.as_raw())?;
        writer.finish()?;
    } else {
        image.save(path)?;
    }

    println!("INFO:  Wrote image file to: {}", path.display());
    Ok(())
}
