use std::sync::Arc;

use anyhow::Context;

use crate::{
    assets::{NarrationClip, PreparedImage},
    error::{QuizError, QuizResult},
};

/// Narration arrives as raw PCM at this fixed rate (mono, 16-bit LE).
pub const NARRATION_SAMPLE_RATE: u32 = 24_000;

/// Decode encoded image bytes and convert to premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> QuizResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Decode raw 16-bit little-endian mono PCM into a normalized clip.
///
/// Samples are mapped into [-1, 1] by dividing by 32768.
pub fn decode_narration_pcm16(bytes: &[u8]) -> QuizResult<NarrationClip> {
    if bytes.is_empty() {
        return Err(QuizError::decode("narration byte buffer is empty"));
    }
    if !bytes.len().is_multiple_of(2) {
        return Err(QuizError::decode(
            "narration byte length is not aligned to 16-bit samples",
        ));
    }

    let mut samples = Vec::<f32>::with_capacity(bytes.len() / 2);
    for chunk in bytes.chunks_exact(2) {
        let v = i16::from_le_bytes([chunk[0], chunk[1]]);
        samples.push(f32::from(v) / 32768.0);
    }

    Ok(NarrationClip {
        sample_rate: NARRATION_SAMPLE_RATE,
        samples: Arc::new(samples),
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decode_image_premultiplies_alpha() {
        let img = image::RgbaImage::from_raw(1, 1, vec![255u8, 0u8, 0u8, 128u8]).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let prepared = decode_image(&buf).unwrap();
        assert_eq!((prepared.width, prepared.height), (1, 1));
        assert_eq!(prepared.rgba8_premul.as_slice(), &[128, 0, 0, 128]);
    }

    #[test]
    fn decode_image_rejects_garbage() {
        assert!(decode_image(&[0u8, 1, 2, 3]).is_err());
    }

    #[test]
    fn narration_pcm_normalizes_to_unit_range() {
        let bytes: Vec<u8> = [0i16, 16384, -16384, i16::MAX, i16::MIN]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let clip = decode_narration_pcm16(&bytes).unwrap();
        assert_eq!(clip.sample_rate, NARRATION_SAMPLE_RATE);
        let s = clip.samples.as_slice();
        assert_eq!(s[0], 0.0);
        assert!((s[1] - 0.5).abs() < 1e-6);
        assert!((s[2] + 0.5).abs() < 1e-6);
        assert!(s[3] < 1.0 && s[3] > 0.999);
        assert_eq!(s[4], -1.0);
    }

    #[test]
    fn narration_pcm_rejects_odd_lengths() {
        assert!(decode_narration_pcm16(&[1u8, 2, 3]).is_err());
        assert!(decode_narration_pcm16(&[]).is_err());
    }

    #[test]
    fn narration_duration_follows_sample_count() {
        // 24000 samples at 24 kHz is exactly one second.
        let bytes = vec![0u8; 24_000 * 2];
        let clip = decode_narration_pcm16(&bytes).unwrap();
        assert_eq!(clip.duration_ms(), 1000);
    }
}
