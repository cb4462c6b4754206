//! Lossy float block codec and out-of-band NaN encoding.
//!
//! A raster band is shipped as two pieces: an LZ4-framed block of mantissa-
//! quantized little-endian floats, and a run-length map of its NaN pixels.
//! NaNs are zeroed before quantization; the decoder restores them from the
//! map, so the mask survives lossy compression exactly.

use crate::error::CodecError;

/// Lowest usable precision (mantissa bits kept).
pub const MIN_PRECISION: u32 = 4;

/// Precision at and above which the floats pass through unquantized.
pub const MAX_PRECISION: u32 = 24;

/// Default precision when a request does not carry one.
pub const DEFAULT_PRECISION: u32 = 16;

/// True when `precision` is inside the supported range.
pub fn is_valid_precision(precision: u32) -> bool {
    (MIN_PRECISION..=MAX_PRECISION).contains(&precision)
}

/// Clamp an arbitrary quality value into the supported precision range.
pub fn clamp_precision(quality: f32) -> u32 {
    (quality.round() as i64).clamp(MIN_PRECISION as i64, MAX_PRECISION as i64) as u32
}

// =============================================================================
// NaN run-length encoding
// =============================================================================

/// Run-length encode the NaN positions of a band.
///
/// Runs alternate `finite, nan, finite, ...` and always start with a finite
/// count (possibly zero). The run sum equals `row_length * num_rows`.
pub fn nan_encodings_block(
    band: &[f32],
    row_length: usize,
    num_rows: usize,
) -> Result<Vec<i32>, CodecError> {
    if band.len() != row_length * num_rows {
        return Err(CodecError::ShapeMismatch {
            rows: num_rows,
            row_length,
            len: band.len(),
        });
    }

    let mut runs = Vec::new();
    let mut counting_nan = false;
    let mut run = 0i32;
    for v in band {
        if v.is_nan() == counting_nan {
            run += 1;
        } else {
            runs.push(run);
            counting_nan = !counting_nan;
            run = 1;
        }
    }
    runs.push(run);
    Ok(runs)
}

/// Restore NaNs into decoded band data from its run-length map.
pub fn apply_nan_encodings(band: &mut [f32], runs: &[i32]) {
    let mut pos = 0usize;
    let mut is_nan = false;
    for &run in runs {
        let end = (pos + run.max(0) as usize).min(band.len());
        if is_nan {
            band[pos..end].fill(f32::NAN);
        }
        pos = end;
        is_nan = !is_nan;
    }
}

/// Serialize a run-length map as little-endian bytes for the wire.
pub fn runs_to_bytes(runs: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(runs.len() * 4);
    for run in runs {
        out.extend_from_slice(&run.to_le_bytes());
    }
    out
}

// =============================================================================
// Block codec
// =============================================================================

/// Compress a band at the given precision.
///
/// Quantization keeps the top `precision` mantissa bits of each float; at
/// [`MAX_PRECISION`] the values pass through bit-exact. NaN pixels become
/// zero, to be restored out-of-band.
pub fn compress_block(band: &[f32], precision: u32) -> Result<Vec<u8>, CodecError> {
    if !is_valid_precision(precision) {
        return Err(CodecError::InvalidPrecision { precision });
    }

    let mut bytes = Vec::with_capacity(band.len() * 4);
    for &v in band {
        let q = quantize(if v.is_nan() { 0.0 } else { v }, precision);
        bytes.extend_from_slice(&q.to_le_bytes());
    }
    Ok(lz4_flex::compress_prepend_size(&bytes))
}

/// Decode a compressed block back into floats (without NaN restoration).
pub fn decompress_block(block: &[u8]) -> Result<Vec<f32>, CodecError> {
    let bytes = lz4_flex::decompress_size_prepended(block)
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    if bytes.len() % 4 != 0 {
        return Err(CodecError::Decode(format!(
            "block length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Serialize a band uncompressed, for `CompressionType::None`.
pub fn raw_block(band: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(band.len() * 4);
    for v in band {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[inline]
fn quantize(v: f32, precision: u32) -> f32 {
    if precision >= MAX_PRECISION {
        return v;
    }
    // zero the low (23 - precision) mantissa bits, keeping sign and exponent
    let mask = u32::MAX << (23 - precision);
    f32::from_bits(v.to_bits() & mask)
}

// =============================================================================
// Tests
// =============================================================================
