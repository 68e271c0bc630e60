//! Premultiplied-alpha pixel helpers used by the frame compositor. All
//! buffers are RGBA8 premultiplied, row-major, tightly packed.

#[inline]
fn mul_div255(a: u16, b: u16) -> u8 {
    (((a * b) + 127) / 255) as u8
}

/// `dst = src OVER dst`, both premultiplied. Buffers must be the same length.
pub fn over_in_place(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = s[3] as u16;
        if sa == 0 {
            continue;
        }
        if sa == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - sa;
        for i in 0..4 {
            d[i] = s[i].saturating_add(mul_div255(d[i] as u16, inv));
        }
    }
}

/// `dst = lerp(dst, src, alpha)` per channel, both premultiplied. With
/// premultiplied inputs a plain channel lerp is exactly a cross-dissolve.
pub fn crossfade_in_place(dst: &mut [u8], src: &[u8], alpha: f32) {
    debug_assert_eq!(dst.len(), src.len());
    let a = (alpha.clamp(0.0, 1.0) * 255.0 + 0.5) as u16;
    if a == 0 {
        return;
    }
    if a >= 255 {
        dst.copy_from_slice(src);
        return;
    }
    let inv = 255 - a;
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        for i in 0..4 {
            d[i] = mul_div255(d[i] as u16, inv).saturating_add(mul_div255(s[i] as u16, a));
        }
    }
}

/// Composite a premultiplied buffer onto an opaque background color,
/// producing fully opaque RGBA8 for rawvideo/PNG output.
pub fn flatten_to_opaque_rgba8(dst: &mut [u8], src: &[u8], bg_rgb: [u8; 3]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - a;
        for i in 0..3 {
            d[i] = (s[i] as u16 + mul_div255(bg_rgb[i] as u16, inv) as u16).min(255) as u8;
        }
        d[3] = 255;
    }
}

/// Scale every channel (alpha included) of a premultiplied buffer.
pub fn scale_alpha_in_place(buf: &mut [u8], opacity: f32) {
    let k = (opacity.clamp(0.0, 1.0) * 255.0 + 0.5) as u16;
    if k >= 255 {
        return;
    }
    for px in buf.iter_mut() {
        *px = mul_div255(*px as u16, k);
    }
}
