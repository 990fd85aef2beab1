//! Panel wire format: two 4-bit grayscale pixels per byte.

use image::GrayImage;

/// Packs an 8-bit grayscale image into the panels' 4-bit body format.
///
/// Pixels are taken in row-major order straight across row boundaries;
/// each byte carries the earlier pixel in its high nibble. A trailing odd
/// pixel is paired with white.
pub fn pack_4bit(image: &GrayImage) -> Vec<u8> {
    let raw = image.as_raw();
    let mut packed = Vec::with_capacity(raw.len().div_ceil(2));
    for pair in raw.chunks(2) {
        let hi = pair[0] / 17;
        let lo = pair.get(1).map_or(15, |p| p / 17);
        packed.push((hi << 4) | lo);
    }
    packed
}
