//! External bitmap collaborator for `$name(*)=file` declarations.
//!
//! The pipeline only needs "file in, (word count, word literals) out"; pixel
//! decoding lives behind the trait so tests can stub it.

/// Supplies the size and initializer word-literals for a bitmap-backed
/// variable declaration.
pub trait BitmapImport {
    /// Returns the word count as expression text and one `0b`-prefixed
    /// 16-bit literal per word, row-major.
    fn import(&self, path: &str) -> Result<(String, Vec<String>), String>;
}

/// Decodes any image format the `image` crate recognizes. Pixels darker
/// than mid-gray are set; each row is packed 16 pixels per word, msb first,
/// zero-padded to a whole word.
pub struct ImageBitmap;

impl BitmapImport for ImageBitmap {
    fn import(&self, path: &str) -> Result<(String, Vec<String>), String> {
        let gray = image::open(path).map_err(|e| e.to_string())?.to_luma8();
        let (width, height) = gray.dimensions();
        let word_width = (width + 15) / 16;

        let mut words = Vec::with_capacity((word_width * height) as usize);
        for y in 0..height {
            for w in 0..word_width {
                let mut literal = String::with_capacity(18);
                literal.push_str("0b");
                for x in 0..16 {
                    let px = x + 16 * w;
                    let on = px < width && gray.get_pixel(px, y).0[0] < 128;
                    literal.push(if on { '1' } else { '0' });
                }
                words.push(literal);
            }
        }

        Ok(((word_width * height).to_string(), words))
    }
}
