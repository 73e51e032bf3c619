//! Encoders for a single 4x4 block.
//!
//! Texels are passed row-major with a mask marking which of the 16 exist (a
//! block hanging off the image edge has fewer than 16).

use super::BlockFormat;

type Texels = [[u8; 4]; 16];

pub(super) fn compress(texels: &Texels, mask: u16, format: BlockFormat, out: &mut Vec<u8>) {
    match format {
        BlockFormat::Dxt1 => colour_block(texels, mask, true, out),
        BlockFormat::Dxt3 => {
            explicit_alpha_block(texels, mask, out);
            colour_block(texels, mask, false, out);
        }
        BlockFormat::Dxt5 => {
            interpolated_alpha_block(texels, mask, out);
            colour_block(texels, mask, false, out);
        }
    }
}

fn present(mask: u16, i: usize) -> bool {
    mask & (1 << i) != 0
}

fn colour_block(texels: &Texels, mask: u16, is_dxt1: bool, out: &mut Vec<u8>) {
    // DXT1 can only store 1-bit alpha: texels under half opacity map to the
    // transparent palette entry and stay out of the colour fit.
    let transparent = |i: usize| is_dxt1 && texels[i][3] < 128;

    let points: Vec<[f32; 3]> = (0..16)
        .filter(|&i| present(mask, i) && !transparent(i))
        .map(|i| [texels[i][0] as f32, texels[i][1] as f32, texels[i][2] as f32])
        .collect();
    let three_colour = (0..16).any(|i| present(mask, i) && transparent(i));

    let (start, end) = range_fit(&points);
    let mut a = pack_565(start);
    let mut b = pack_565(end);

    // The endpoint order is what tells a decoder which palette mode is used.
    if (three_colour && a > b) || (!three_colour && a < b) {
        std::mem::swap(&mut a, &mut b);
    }

    let c0 = unpack_565(a);
    let c1 = unpack_565(b);
    let palette = if three_colour {
        [c0, c1, mix(c0, c1, 1, 1), [0, 0, 0]]
    } else {
        [c0, c1, mix(c0, c1, 2, 1), mix(c0, c1, 1, 2)]
    };
    let candidates = if three_colour { 3 } else { 4 };

    let mut indices = 0u32;
    for i in 0..16 {
        let index = if !present(mask, i) || (a == b && !three_colour) {
            // Equal endpoints read back as three-colour mode, where index 3 is
            // black. Index 0 is the only safe choice.
            0
        } else if transparent(i) {
            3
        } else {
            let rgb = [texels[i][0] as i32, texels[i][1] as i32, texels[i][2] as i32];
            nearest(&palette[..candidates], rgb)
        };
        indices |= index << (2 * i);
    }

    out.extend_from_slice(&a.to_le_bytes());
    out.extend_from_slice(&b.to_le_bytes());
    out.extend_from_slice(&indices.to_le_bytes());
}

/// Pick endpoints at the extremes of the colours' principal axis.
fn range_fit(points: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let Some(&first) = points.first() else {
        return ([0.0; 3], [0.0; 3]);
    };

    let n = points.len() as f32;
    let mut mean = [0.0f32; 3];
    for p in points {
        for k in 0..3 {
            mean[k] += p[k] / n;
        }
    }

    let mut cov = [[0.0f32; 3]; 3];
    for p in points {
        let d = [p[0] - mean[0], p[1] - mean[1], p[2] - mean[2]];
        for (r, row) in cov.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value += d[r] * d[c];
            }
        }
    }

    // Power iteration.
    let mut axis = [1.0f32; 3];
    for _ in 0..8 {
        let next = [
            cov[0][0] * axis[0] + cov[0][1] * axis[1] + cov[0][2] * axis[2],
            cov[1][0] * axis[0] + cov[1][1] * axis[1] + cov[1][2] * axis[2],
            cov[2][0] * axis[0] + cov[2][1] * axis[1] + cov[2][2] * axis[2],
        ];
        let largest = next.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
        if largest <= f32::EPSILON {
            // Every point is the same colour.
            return (first, first);
        }
        axis = next.map(|v| v / largest);
    }

    let project = |p: &[f32; 3]| p[0] * axis[0] + p[1] * axis[1] + p[2] * axis[2];
    let (mut start, mut end) = (first, first);
    let (mut min, mut max) = (project(&first), project(&first));
    for p in &points[1..] {
        let t = project(p);
        if t < min {
            min = t;
            start = *p;
        }
        if t > max {
            max = t;
            end = *p;
        }
    }
    (start, end)
}

fn pack_565(rgb: [f32; 3]) -> u16 {
    let quantize = |v: f32, levels: f32| (v * levels / 255.0).round().clamp(0.0, levels) as u16;
    (quantize(rgb[0], 31.0) << 11) | (quantize(rgb[1], 63.0) << 5) | quantize(rgb[2], 31.0)
}

fn unpack_565(packed: u16) -> [i32; 3] {
    let r = ((packed >> 11) & 0x1F) as i32;
    let g = ((packed >> 5) & 0x3F) as i32;
    let b = (packed & 0x1F) as i32;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

fn mix(c0: [i32; 3], c1: [i32; 3], w0: i32, w1: i32) -> [i32; 3] {
    [0, 1, 2].map(|k| (c0[k] * w0 + c1[k] * w1) / (w0 + w1))
}

fn nearest(palette: &[[i32; 3]], rgb: [i32; 3]) -> u32 {
    let distance = |c: &[i32; 3]| (0..3).map(|k| (c[k] - rgb[k]).pow(2)).sum::<i32>();
    palette
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| distance(c))
        .map(|(i, _)| i as u32)
        .unwrap_or(0)
}

fn explicit_alpha_block(texels: &Texels, mask: u16, out: &mut Vec<u8>) {
    let mut bytes = [0u8; 8];
    for i in 0..16 {
        let quant = if present(mask, i) {
            ((texels[i][3] as u32 * 15 + 127) / 255) as u8
        } else {
            0
        };
        bytes[i / 2] |= if i % 2 == 0 { quant } else { quant << 4 };
    }
    out.extend_from_slice(&bytes);
}

fn interpolated_alpha_block(texels: &Texels, mask: u16, out: &mut Vec<u8>) {
    let alphas = (0..16).filter(|&i| present(mask, i)).map(|i| texels[i][3]);
    let max = alphas.clone().max().unwrap_or(0);
    let min = alphas.min().unwrap_or(0);

    out.push(max);
    out.push(min);

    if max == min {
        out.extend_from_slice(&[0; 6]);
        return;
    }

    // 8-value mode (first endpoint greater than the second).
    let (a0, a1) = (max as u32, min as u32);
    let mut palette = [0u32; 8];
    palette[0] = a0;
    palette[1] = a1;
    for (i, value) in palette.iter_mut().enumerate().skip(2) {
        *value = ((8 - i as u32) * a0 + (i as u32 - 1) * a1) / 7;
    }

    let mut bits = 0u64;
    for i in 0..16 {
        if !present(mask, i) {
            continue;
        }
        let alpha = texels[i][3] as u32;
        let index = palette
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| v.abs_diff(alpha))
            .map(|(index, _)| index as u64)
            .unwrap_or(0);
        bits |= index << (3 * i);
    }
    out.extend_from_slice(&bits.to_le_bytes()[..6]);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decode a DXT1 colour block back to RGB.
    fn decode_colour(block: &[u8]) -> [[i32; 3]; 16] {
        let a = u16::from_le_bytes([block[0], block[1]]);
        let b = u16::from_le_bytes([block[2], block[3]]);
        let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
        let (c0, c1) = (unpack_565(a), unpack_565(b));
        let palette = if a > b {
            [c0, c1, mix(c0, c1, 2, 1), mix(c0, c1, 1, 2)]
        } else {
            [c0, c1, mix(c0, c1, 1, 1), [0, 0, 0]]
        };
        std::array::from_fn(|i| palette[((indices >> (2 * i)) & 3) as usize])
    }

    #[test]
    fn solid_block_uses_a_single_endpoint() {
        let texels = [[255, 0, 0, 255]; 16];
        let mut out = Vec::new();
        compress(&texels, u16::MAX, BlockFormat::Dxt1, &mut out);

        assert_eq!(out.len(), 8);
        assert_eq!(u16::from_le_bytes([out[0], out[1]]), 0xF800);
        assert_eq!(&out[4..], &[0, 0, 0, 0]);
        assert!(decode_colour(&out).iter().all(|c| *c == [255, 0, 0]));
    }

    #[test]
    fn two_colour_block_decodes_exactly() {
        let mut texels = [[0, 0, 0, 255]; 16];
        for texel in texels.iter_mut().skip(8) {
            *texel = [255, 255, 255, 255];
        }
        let mut out = Vec::new();
        compress(&texels, u16::MAX, BlockFormat::Dxt1, &mut out);

        let decoded = decode_colour(&out);
        assert!(decoded[..8].iter().all(|c| *c == [0, 0, 0]));
        assert!(decoded[8..].iter().all(|c| *c == [255, 255, 255]));
    }

    #[test]
    fn dxt1_transparency_selects_three_colour_mode() {
        let mut texels = [[10, 200, 30, 255]; 16];
        texels[5] = [0, 0, 0, 0];
        let mut out = Vec::new();
        compress(&texels, u16::MAX, BlockFormat::Dxt1, &mut out);

        let a = u16::from_le_bytes([out[0], out[1]]);
        let b = u16::from_le_bytes([out[2], out[3]]);
        let indices = u32::from_le_bytes([out[4], out[5], out[6], out[7]]);
        assert!(a <= b);
        assert_eq!((indices >> 10) & 3, 3);
    }

    #[test]
    fn interpolated_alpha_keeps_extremes() {
        let mut texels = [[0, 0, 0, 0]; 16];
        texels[15][3] = 255;
        let mut out = Vec::new();
        interpolated_alpha_block(&texels, u16::MAX, &mut out);

        assert_eq!(out[..2], [255, 0]);
        let mut bits = [0u8; 8];
        bits[..6].copy_from_slice(&out[2..]);
        let bits = u64::from_le_bytes(bits);
        assert_eq!(bits & 7, 1);
        assert_eq!((bits >> 45) & 7, 0);
    }

    #[test]
    fn missing_texels_do_not_affect_endpoints() {
        let mut texels = [[255, 255, 255, 255]; 16];
        texels[0] = [0, 0, 255, 255];
        let mut out = Vec::new();
        // Only the first texel exists.
        compress(&texels, 1, BlockFormat::Dxt1, &mut out);

        assert_eq!(u16::from_le_bytes([out[0], out[1]]), 0x001F);
        assert_eq!(u16::from_le_bytes([out[2], out[3]]), 0x001F);
    }
}
