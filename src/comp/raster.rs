//! Parallel raster compression.
//!
//! A raster is split into `N` contiguous row bands; each band submits its
//! NaN encoding and its block compression as separate pool jobs, and the
//! caller awaits all of them before assembling the response in band order.

use std::sync::Arc;

use crate::comp::codec;
use crate::comp::pool::WorkerPool;
use crate::error::{CodecError, SessionError};

/// Upper bound on the number of bands per raster.
pub const MAX_SUBSETS: usize = 8;

/// Compressed bands and their NaN maps, in band order `0..N-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBands {
    pub blocks: Vec<Vec<u8>>,
    pub nan_encodings: Vec<Vec<i32>>,
}

/// Row range `[start, end)` of band `i` out of `n`.
///
/// Bands cover `num_rows / n` rows each, with the final band extended to
/// the last row.
pub fn band_rows(num_rows: usize, n: usize, i: usize) -> (usize, usize) {
    let start = i * num_rows / n;
    let end = if i == n - 1 {
        num_rows
    } else {
        (i + 1) * num_rows / n
    };
    (start, end)
}

/// Fan a raster out across the pool and await the assembled bands.
///
/// Jobs are tagged with `task_id` so a disconnecting session can withdraw
/// them; a withdrawn job surfaces as `Cancelled`. Any codec failure fails
/// the whole raster and the partial blocks are dropped.
pub async fn compress_raster(
    pool: &WorkerPool,
    task_id: u64,
    priority: i32,
    data: Arc<Vec<f32>>,
    row_length: usize,
    num_rows: usize,
    precision: u32,
    num_subsets: usize,
) -> Result<RasterBands, SessionError> {
    let n = num_subsets.clamp(1, MAX_SUBSETS).min(num_rows.max(1));

    let mut nan_jobs = Vec::with_capacity(n);
    let mut block_jobs = Vec::with_capacity(n);
    for i in 0..n {
        let (row_start, row_end) = band_rows(num_rows, n, i);
        let elem_range = row_start * row_length..row_end * row_length;
        let band_rows_count = row_end - row_start;

        let band_data = Arc::clone(&data);
        let range = elem_range.clone();
        nan_jobs.push(pool.submit(task_id, priority, move || {
            codec::nan_encodings_block(&band_data[range], row_length, band_rows_count)
        }));

        let band_data = Arc::clone(&data);
        block_jobs.push(pool.submit(task_id, priority, move || {
            codec::compress_block(&band_data[elem_range], precision)
        }));
    }

    let mut bands = RasterBands {
        blocks: Vec::with_capacity(n),
        nan_encodings: Vec::with_capacity(n),
    };
    for (nan_rx, block_rx) in nan_jobs.into_iter().zip(block_jobs) {
        let runs: Result<Vec<i32>, CodecError> =
            nan_rx.await.map_err(|_| SessionError::Cancelled)?;
        let block: Result<Vec<u8>, CodecError> =
            block_rx.await.map_err(|_| SessionError::Cancelled)?;
        bands.nan_encodings.push(runs?);
        bands.blocks.push(block?);
    }
    Ok(bands)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_rows_cover_all_rows() {
        for (rows, n) in [(100, 4), (7, 3), (5, 8), (64, 1)] {
            let n = n.min(rows);
            let mut covered = 0;
            for i in 0..n {
                let (start, end) = band_rows(rows, n, i);
                assert_eq!(start, covered);
                covered = end;
            }
            assert_eq!(covered, rows);
        }
    }

    #[test]
    fn test_last_band_takes_remainder() {
        let (start, end) = band_rows(10, 4, 3);
        assert_eq!((start, end), (7, 10));
    }

    #[tokio::test]
    async fn test_compress_raster_round_trip() {
        let pool = WorkerPool::new(2);
        let row_length = 16;
        let num_rows = 12;
        let data: Vec<f32> = (0..row_length * num_rows)
            .map(|i| if i % 7 == 0 { f32::NAN } else { i as f32 })
            .collect();
        let nan_total = data.iter().filter(|v| v.is_nan()).count() as i32;
        let arc = Arc::new(data.clone());

        let bands = compress_raster(
            &pool,
            1,
            0,
            arc,
            row_length,
            num_rows,
            codec::MAX_PRECISION,
            3,
        )
        .await
        .unwrap();

        assert_eq!(bands.blocks.len(), 3);
        assert_eq!(bands.nan_encodings.len(), 3);

        let mut restored = Vec::new();
        let mut nan_runs_total = 0i32;
        for (block, runs) in bands.blocks.iter().zip(&bands.nan_encodings) {
            let mut band = codec::decompress_block(block).unwrap();
            codec::apply_nan_encodings(&mut band, runs);
            nan_runs_total += runs.iter().skip(1).step_by(2).sum::<i32>();
            restored.extend(band);
        }
        assert_eq!(restored.len(), data.len());
        assert_eq!(nan_runs_total, nan_total);
        for (orig, back) in data.iter().zip(restored.iter()) {
            assert!(orig == back || (orig.is_nan() && back.is_nan()));
        }
    }

    #[tokio::test]
    async fn test_subsets_clamped_to_max() {
        let pool = WorkerPool::new(2);
        let data = Arc::new(vec![0.0f32; 32 * 32]);
        let bands = compress_raster(&pool, 1, 0, data, 32, 32, 16, 100)
            .await
            .unwrap();
        assert_eq!(bands.blocks.len(), MAX_SUBSETS);
    }

    #[tokio::test]
    async fn test_invalid_precision_fails_whole_raster() {
        let pool = WorkerPool::new(2);
        let data = Arc::new(vec![0.0f32; 64]);
        let result = compress_raster(&pool, 1, 0, data, 8, 8, 1, 2).await;
        assert!(matches!(result, Err(SessionError::Codec(_))));
    }
}
