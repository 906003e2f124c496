//! Pixel-format conversion between what sensors emit and what the JPEG
//! encoder accepts.
//!
//! All conversions return `None` when the input holds fewer than
//! `width * height * bytes_per_pixel` bytes.

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Expands big-endian RGB565 to RGB888.
pub fn rgb565_to_rgb888(data: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    let pixels = pixel_count(width, height);
    let expected_len = pixels * 2;
    if data.len() < expected_len {
        return None;
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for px in data[..expected_len].chunks_exact(2) {
        let v = u16::from_be_bytes([px[0], px[1]]);
        let r = ((v >> 11) & 0x1f) as u8;
        let g = ((v >> 5) & 0x3f) as u8;
        let b = (v & 0x1f) as u8;
        // replicate high bits into the low ones so 0x1f maps to 0xff
        rgb.extend_from_slice(&[(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]);
    }
    Some(rgb)
}

/// Unpacks YUYV (Y0 U Y1 V) into per-pixel Y Cb Cr triples.
///
/// Each pixel pair shares its chroma samples, so they are duplicated. No
/// colour-space math happens here; the JPEG encoder consumes YCbCr directly.
pub fn yuyv_to_ycbcr(data: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    let pixels = pixel_count(width, height);
    let expected_len = pixels * 2;
    if data.len() < expected_len || width % 2 != 0 {
        return None;
    }

    let mut out = Vec::with_capacity(pixels * 3);
    for chunk in data[..expected_len].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        out.extend_from_slice(&[y0, u, v, y1, u, v]);
    }
    Some(out)
}

fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (
        y.round().clamp(0.0, 255.0) as u8,
        cb.round().clamp(0.0, 255.0) as u8,
        cr.round().clamp(0.0, 255.0) as u8,
    )
}

/// Packs RGB888 into YUYV, averaging chroma over each pixel pair.
pub fn rgb888_to_yuyv(data: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    let pixels = pixel_count(width, height);
    if data.len() < pixels * 3 || width % 2 != 0 {
        return None;
    }

    let mut out = Vec::with_capacity(pixels * 2);
    for pair in data[..pixels * 3].chunks_exact(6) {
        let (y0, u0, v0) = rgb_to_ycbcr(pair[0], pair[1], pair[2]);
        let (y1, u1, v1) = rgb_to_ycbcr(pair[3], pair[4], pair[5]);
        let u = ((u0 as u16 + u1 as u16) / 2) as u8;
        let v = ((v0 as u16 + v1 as u16) / 2) as u8;
        out.extend_from_slice(&[y0, u, y1, v]);
    }
    Some(out)
}

/// Packs RGB888 into big-endian RGB565.
pub fn rgb888_to_rgb565(data: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    let pixels = pixel_count(width, height);
    if data.len() < pixels * 3 {
        return None;
    }

    let mut out = Vec::with_capacity(pixels * 2);
    for px in data[..pixels * 3].chunks_exact(3) {
        let v = ((px[0] as u16 >> 3) << 11) | ((px[1] as u16 >> 2) << 5) | (px[2] as u16 >> 3);
        out.extend_from_slice(&v.to_be_bytes());
    }
    Some(out)
}

/// BT.601 luma of each RGB888 pixel.
pub fn rgb888_to_luma(data: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    let pixels = pixel_count(width, height);
    if data.len() < pixels * 3 {
        return None;
    }

    Some(
        data[..pixels * 3]
            .chunks_exact(3)
            .map(|px| rgb_to_ycbcr(px[0], px[1], px[2]).0)
            .collect(),
    )
}
