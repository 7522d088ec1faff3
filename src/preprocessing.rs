use crate::error::PredictionError;
use image::{imageops::FilterType, ImageReader, RgbImage};
use ndarray::Array4;
use std::io::Cursor;

/// Square input resolution of the EfficientNet-B3 feature extractor.
pub const INPUT_SIZE: u32 = 300;
pub const INPUT_CHANNELS: usize = 3;

pub fn decode_image(image_data: &[u8]) -> Result<RgbImage, PredictionError> {
    let image_reader = ImageReader::new(Cursor::new(image_data))
        .with_guessed_format()
        .map_err(image::ImageError::from)?;

    let original_img = image_reader.decode()?;

    Ok(original_img.to_rgb8())
}

pub fn resize(img: &RgbImage) -> RgbImage {
    image::imageops::resize(img, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom)
}

/// Builds the `(1, 300, 300, 3)` NHWC tensor fed to the feature extractor.
///
/// Channel values stay in `[0, 255]`: the EfficientNet graph carries its own
/// rescaling and normalization layers, so no scaling happens here.
pub fn to_input_tensor(img: &RgbImage) -> Result<Array4<f32>, PredictionError> {
    let (width, height) = img.dimensions();
    let data: Vec<f32> = img.as_raw().iter().map(|&v| f32::from(v)).collect();
    let input = Array4::from_shape_vec(
        (1, height as usize, width as usize, INPUT_CHANNELS),
        data,
    )?;
    Ok(input)
}

pub fn preprocess(image_data: &[u8]) -> Result<Array4<f32>, PredictionError> {
    let img = decode_image(image_data)?;
    tracing::debug!("Decoded image of {}x{}", img.width(), img.height());
    to_input_tensor(&resize(&img))
}
