use iter_num_tools::lin_space;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of entries in the quantized color map, matching the usual 8-bit colormap size.
pub const DEFAULT_LOOKUP_TABLE_COUNT: usize = 256;

#[derive(Debug, Error, PartialEq)]
pub enum ColorMapError {
    #[error("color map requires at least two keyframes, got {0}")]
    TooFewKeyframes(usize),

    #[error("first keyframe query must be 0.0 and last must be 1.0")]
    InvalidDomain,

    #[error("keyframe queries must be strictly increasing")]
    NonIncreasingQueries,

    #[error("lookup table requires at least two entries, got {0}")]
    LookupTableTooSmall(usize),
}

/**
 * Represents a single "keyframe" of the color map, pairing a
 * "query" with the color that should be produced at that query point.
 */
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ColorMapKeyFrame {
    pub query: f32,       // specify location of this color within the map; on [0,1]
    pub rgb_raw: [u8; 3], // [R, G, B]
}

/// Reversed blue-red-green map: green at 0, red in the middle, blue at 1.
pub fn brg_reversed_keyframes() -> Vec<ColorMapKeyFrame> {
    vec![
        ColorMapKeyFrame {
            query: 0.0,
            rgb_raw: [0, 255, 0],
        },
        ColorMapKeyFrame {
            query: 0.5,
            rgb_raw: [255, 0, 0],
        },
        ColorMapKeyFrame {
            query: 1.0,
            rgb_raw: [0, 0, 255],
        },
    ]
}

fn default_lookup_table_count() -> usize {
    DEFAULT_LOOKUP_TABLE_COUNT
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ColorMapParams {
    #[serde(default = "brg_reversed_keyframes")]
    pub keyframes: Vec<ColorMapKeyFrame>,
    #[serde(default = "default_lookup_table_count")]
    pub lookup_table_count: usize,
}

impl Default for ColorMapParams {
    fn default() -> Self {
        ColorMapParams {
            keyframes: brg_reversed_keyframes(),
            lookup_table_count: DEFAULT_LOOKUP_TABLE_COUNT,
        }
    }
}

pub trait ColorMapper {
    fn compute_pixel(&self, query: f32) -> image::Rgb<u8>;
}

/**
 * Simple implementation of a "piecewise linear" color map, where the colors
 * are represented by simple linear interpolation in RGB color space.
 */
#[derive(Debug, Clone)]
pub struct ColorMap {
    queries: Vec<f32>,
    colors: Vec<Vector3<f32>>,
}

impl ColorMap {
    pub fn new(keyframes: &[ColorMapKeyFrame]) -> Result<ColorMap, ColorMapError> {
        if keyframes.len() < 2 {
            return Err(ColorMapError::TooFewKeyframes(keyframes.len()));
        }
        if keyframes[0].query != 0.0 || keyframes[keyframes.len() - 1].query != 1.0 {
            return Err(ColorMapError::InvalidDomain);
        }
        if keyframes.windows(2).any(|pair| pair[0].query >= pair[1].query) {
            return Err(ColorMapError::NonIncreasingQueries);
        }

        Ok(ColorMap {
            queries: keyframes.iter().map(|kf| kf.query).collect(),
            colors: keyframes
                .iter()
                .map(|kf| {
                    Vector3::new(
                        kf.rgb_raw[0] as f32,
                        kf.rgb_raw[1] as f32,
                        kf.rgb_raw[2] as f32,
                    )
                })
                .collect(),
        })
    }
}

impl ColorMapper for ColorMap {
    fn compute_pixel(&self, query: f32) -> image::Rgb<u8> {
        // NaN maps to the first keyframe, as in the lookup table.
        let color = if query <= 0.0 || query.is_nan() {
            self.colors[0]
        } else if query >= 1.0 {
            self.colors[self.colors.len() - 1]
        } else {
            let idx_upp = self.queries.partition_point(|q| query >= *q);
            let idx_low = idx_upp - 1;
            let alpha = (query - self.queries[idx_low]) / (self.queries[idx_upp] - self.queries[idx_low]);
            self.colors[idx_low] + (self.colors[idx_upp] - self.colors[idx_low]) * alpha
        };
        image::Rgb([
            color[0].round().clamp(0.0, 255.0) as u8,
            color[1].round().clamp(0.0, 255.0) as u8,
            color[2].round().clamp(0.0, 255.0) as u8,
        ])
    }
}

/**
 * Wrapper around a color map that quantizes it into a fixed number of
 * entries. Entry `i` holds the color at `i / (count - 1)`, and a query `q`
 * on [0,1] selects entry `floor(q * count)`, clipped to the table.
 */
pub struct ColorMapLookUpTable {
    table_entries: Vec<image::Rgb<u8>>,
}

impl ColorMapLookUpTable {
    pub fn from_color_map<F: ColorMapper>(
        color_map: &F,
        entry_count: usize,
    ) -> Result<ColorMapLookUpTable, ColorMapError> {
        if entry_count < 2 {
            return Err(ColorMapError::LookupTableTooSmall(entry_count));
        }
        let table_entries = lin_space(0.0f32..=1.0, entry_count)
            .map(|query| color_map.compute_pixel(query))
            .collect();
        Ok(ColorMapLookUpTable { table_entries })
    }

    pub fn from_params(params: &ColorMapParams) -> Result<ColorMapLookUpTable, ColorMapError> {
        ColorMapLookUpTable::from_color_map(&ColorMap::new(&params.keyframes)?, params.lookup_table_count)
    }

    pub fn entry_count(&self) -> usize {
        self.table_entries.len()
    }
}

impl ColorMapper for ColorMapLookUpTable {
    fn compute_pixel(&self, query: f32) -> image::Rgb<u8> {
        let count = self.table_entries.len();
        // NaN maps to the first entry.
        let scaled = (query * count as f32).clamp(0.0, (count - 1) as f32);
        let index = if scaled.is_nan() { 0 } else { scaled as usize };
        self.table_entries[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_brg_reversed_endpoints() {
        let color_map = ColorMap::new(&brg_reversed_keyframes()).unwrap();
        assert_eq!(color_map.compute_pixel(0.0), Rgb([0, 255, 0]));
        assert_eq!(color_map.compute_pixel(0.5), Rgb([255, 0, 0]));
        assert_eq!(color_map.compute_pixel(1.0), Rgb([0, 0, 255]));
        assert_eq!(color_map.compute_pixel(0.25), Rgb([128, 128, 0]));

        // Out-of-range queries are clamped.
        assert_eq!(color_map.compute_pixel(-1.0), Rgb([0, 255, 0]));
        assert_eq!(color_map.compute_pixel(2.0), Rgb([0, 0, 255]));
        assert_eq!(color_map.compute_pixel(f32::NAN), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_invalid_keyframes() {
        let keys = brg_reversed_keyframes();
        assert_eq!(
            ColorMap::new(&keys[..1]).unwrap_err(),
            ColorMapError::TooFewKeyframes(1)
        );

        let mut shifted = keys.clone();
        shifted[0].query = 0.1;
        assert_eq!(
            ColorMap::new(&shifted).unwrap_err(),
            ColorMapError::InvalidDomain
        );

        let mut repeated = keys;
        repeated[1].query = 0.0;
        assert_eq!(
            ColorMap::new(&repeated).unwrap_err(),
            ColorMapError::NonIncreasingQueries
        );
    }

    #[test]
    fn test_color_map_lookup_table() {
        let color_map = ColorMap::new(&brg_reversed_keyframes()).unwrap();
        let table = ColorMapLookUpTable::from_color_map(&color_map, 5).unwrap();
        assert_eq!(table.entry_count(), 5);

        // Entries are at queries [0, 0.25, 0.5, 0.75, 1.0].
        assert_eq!(table.compute_pixel(0.0), Rgb([0, 255, 0]));
        assert_eq!(table.compute_pixel(0.19), Rgb([0, 255, 0]));
        assert_eq!(table.compute_pixel(0.21), Rgb([128, 128, 0]));
        assert_eq!(table.compute_pixel(0.5), Rgb([255, 0, 0]));
        assert_eq!(table.compute_pixel(1.0), Rgb([0, 0, 255]));

        assert_eq!(table.compute_pixel(-1.0), Rgb([0, 255, 0]));
        assert_eq!(table.compute_pixel(2.0), Rgb([0, 0, 255]));
        assert_eq!(table.compute_pixel(f32::NAN), Rgb([0, 255, 0]));

        assert!(ColorMapLookUpTable::from_color_map(&color_map, 1).is_err());
    }
}
