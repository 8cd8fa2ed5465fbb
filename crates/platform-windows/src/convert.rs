//! Pixel conversions shared by the GDI and GPU readback paths.
//!
//! These are plain byte manipulations so they compile and are tested on
//! every target.

/// Copy `height` rows of `row_bytes` each out of a surface whose rows are
/// `pitch` bytes apart, dropping the padding at the end of every row.
///
/// Returns `None` when `source` is too short for the requested layout.
pub fn pack_rows(source: &[u8], row_bytes: usize, pitch: usize, height: usize) -> Option<Vec<u8>> {
    if pitch < row_bytes {
        return None;
    }
    if height > 0 && source.len() < pitch * (height - 1) + row_bytes {
        return None;
    }

    let mut packed = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * pitch;
        packed.extend_from_slice(&source[start..start + row_bytes]);
    }
    Some(packed)
}

/// Recover straight-alpha BGRA from the same image drawn once over black and
/// once over white.
///
/// A pixel with coverage `a` and colour `c` renders as `c * a` over black and
/// `c * a + (1 - a)` over white, so `a = 1 - (white - black)` and
/// `c = black / a`. This handles colour cursors with an alpha channel and
/// legacy monochrome cursors the same way. Inverting (XOR) pixels have no
/// straight-alpha equivalent and come out as opaque white over black.
pub fn alpha_from_backgrounds(over_black: &[u8], over_white: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; over_black.len().min(over_white.len())];

    for ((dst, black), white) in out
        .chunks_exact_mut(4)
        .zip(over_black.chunks_exact(4))
        .zip(over_white.chunks_exact(4))
    {
        let mut spread = 0u32;
        for channel in 0..3 {
            spread = spread.max(white[channel].saturating_sub(black[channel]) as u32);
        }
        let alpha = 255 - spread;
        if alpha == 0 {
            continue;
        }
        for channel in 0..3 {
            dst[channel] = ((black[channel] as u32 * 255 + alpha / 2) / alpha).min(255) as u8;
        }
        dst[3] = alpha as u8;
    }

    out
}
