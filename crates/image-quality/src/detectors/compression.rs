//! JPEG-style 8x8 blocking artifact counter
//!
//! Lines are examined three at a time (top, middle, bottom) and cut into
//! groups of eight pixels. A group counts as an artifact when the middle
//! line's average sits on the midpoint of its neighbours (within half a gray
//! level), the middle is brighter than [`BRIGHTNESS_THRESHOLD`], and the
//! neighbours actually differ. The same test runs along rows and then along
//! columns; the result is the sum of both passes.
//!
//! Averages are compared through their integer sums, so the midpoint test is
//! exact arithmetic rather than a float equality. Flat triples are skipped:
//! without the step test a uniformly coloured frame would count every block.

use crate::context::{CancelToken, RunContext};
use crate::error::Result;
use image::GrayImage;

pub const BLOCK_SIZE: u32 = 8;
/// Middle average (gray level) a block must exceed to be counted
pub const BRIGHTNESS_THRESHOLD: u32 = 30;
/// Half a gray level, expressed on the doubled block-sum scale
const MIDPOINT_TOLERANCE: i64 = BLOCK_SIZE as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Rows,
    Columns,
}

pub struct CompressionDetector;

impl CompressionDetector {
    pub fn detect(&self, ctx: &RunContext) -> Result<u64> {
        let count = count_artifacts(&ctx.gray, ctx.cancel_token())?;
        tracing::debug!(compression = count, "Compression metrics");
        Ok(count)
    }
}

/// Total artifacts found scanning along rows and then along columns
pub fn count_artifacts(gray: &GrayImage, cancel: &CancelToken) -> Result<u64> {
    let horizontal = scan(gray, Pass::Rows, cancel)?;
    let vertical = scan(gray, Pass::Columns, cancel)?;
    tracing::trace!(horizontal, vertical, "Blocking artifact passes");
    Ok(horizontal + vertical)
}

fn scan(gray: &GrayImage, pass: Pass, cancel: &CancelToken) -> Result<u64> {
    let (lines, line_len) = match pass {
        Pass::Rows => (gray.height(), gray.width()),
        Pass::Columns => (gray.width(), gray.height()),
    };
    if lines < 3 {
        return Ok(0);
    }

    let groups = line_len / BLOCK_SIZE;
    let mut count = 0u64;

    for line in 0..lines - 2 {
        cancel.check()?;
        for group in 0..groups {
            let start = group * BLOCK_SIZE;
            let top = block_sum(gray, pass, line, start);
            let middle = block_sum(gray, pass, line + 1, start);
            let bottom = block_sum(gray, pass, line + 2, start);

            if is_artifact(top, middle, bottom) {
                count += 1;
            }
        }
    }

    Ok(count)
}

/// Sum of the eight pixels of one group on one line
fn block_sum(gray: &GrayImage, pass: Pass, line: u32, start: u32) -> i64 {
    (start..start + BLOCK_SIZE)
        .map(|pos| {
            let (x, y) = match pass {
                Pass::Rows => (pos, line),
                Pass::Columns => (line, pos),
            };
            gray.get_pixel(x, y)[0] as i64
        })
        .sum()
}

fn is_artifact(top: i64, middle: i64, bottom: i64) -> bool {
    let bright = middle > (BRIGHTNESS_THRESHOLD * BLOCK_SIZE) as i64;
    let on_midpoint = (2 * middle - (top + bottom)).abs() <= MIDPOINT_TOLERANCE;
    let stepped = (top - bottom).abs() > MIDPOINT_TOLERANCE;
    bright && on_midpoint && stepped
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_uniform_image_has_no_artifacts() {
        let gray = GrayImage::from_pixel(64, 64, Luma([128]));
        assert_eq!(count_artifacts(&gray, &CancelToken::new()).unwrap(), 0);
    }

    #[test]
    fn test_vertical_ramp_counts_row_pass_blocks() {
        // Each row is 10 levels brighter than the one above: every triple
        // sits exactly on its midpoint in the row pass
        let gray = GrayImage::from_fn(16, 5, |_, y| Luma([40 + 10 * y as u8]));
        let count = count_artifacts(&gray, &CancelToken::new()).unwrap();

        // 3 row triples x 2 groups; columns are flat within a column and too
        // short for a group, so they add nothing
        assert_eq!(count, 6);
    }

    #[test]
    fn test_horizontal_ramp_counts_column_pass_blocks() {
        // Same ramp turned on its side: only the column pass can see it
        let gray = GrayImage::from_fn(5, 16, |x, _| Luma([40 + 10 * x as u8]));
        assert_eq!(scan(&gray, Pass::Rows, &CancelToken::new()).unwrap(), 0);
        assert_eq!(scan(&gray, Pass::Columns, &CancelToken::new()).unwrap(), 6);
        assert_eq!(count_artifacts(&gray, &CancelToken::new()).unwrap(), 6);
    }

    #[test]
    fn test_diagonal_ramp_counts_both_passes() {
        // 14 triples x 2 groups in each direction
        let gray = GrayImage::from_fn(16, 16, |x, y| Luma([30 + 5 * x as u8 + 5 * y as u8]));
        assert_eq!(scan(&gray, Pass::Rows, &CancelToken::new()).unwrap(), 28);
        assert_eq!(scan(&gray, Pass::Columns, &CancelToken::new()).unwrap(), 28);
        assert_eq!(count_artifacts(&gray, &CancelToken::new()).unwrap(), 56);
    }

    #[test]
    fn test_dark_blocks_are_ignored() {
        let gray = GrayImage::from_fn(16, 5, |_, y| Luma([2 + 5 * y as u8]));
        assert_eq!(count_artifacts(&gray, &CancelToken::new()).unwrap(), 0);
    }

    #[test]
    fn test_off_midpoint_blocks_are_ignored() {
        let values = [50u8, 150, 60];
        let gray = GrayImage::from_fn(8, 3, |_, y| Luma([values[y as usize]]));
        assert_eq!(count_artifacts(&gray, &CancelToken::new()).unwrap(), 0);
    }

    #[test]
    fn test_group_average_uses_all_eight_pixels() {
        // Top row: left half 40, right half 60, average 50
        let gray = GrayImage::from_fn(8, 3, |x, y| match y {
            0 => Luma([if x < 4 { 40 } else { 60 }]),
            1 => Luma([70]),
            _ => Luma([90]),
        });
        assert_eq!(count_artifacts(&gray, &CancelToken::new()).unwrap(), 1);
    }

    #[test]
    fn test_partial_groups_and_short_images() {
        let gray = GrayImage::from_fn(7, 2, |_, y| Luma([40 + 10 * y as u8]));
        assert_eq!(count_artifacts(&gray, &CancelToken::new()).unwrap(), 0);

        let empty = GrayImage::new(0, 0);
        assert_eq!(count_artifacts(&empty, &CancelToken::new()).unwrap(), 0);
    }

    #[test]
    fn test_is_artifact_tolerance() {
        let top = 50 * 8;
        let bottom = 70 * 8;
        assert!(is_artifact(top, 60 * 8, bottom));
        assert!(is_artifact(top, 60 * 8 + 4, bottom));
        assert!(!is_artifact(top, 60 * 8 + 5, bottom));
    }
}
