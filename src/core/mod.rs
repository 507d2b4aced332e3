pub mod color_map;
pub mod expression;
pub mod file_io;
pub mod image_utils;
pub mod polynomial;
pub mod stopwatch;
