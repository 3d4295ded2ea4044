//! Interleaved ↔ planar sample framing.
//!
//! Pure functions, no stage state. A buffer with `C` channels stores sample `s`
//! of channel `c` at index `s * C + c`.
//!
//! # Example
//!
//! ```rust
//! use dsp_pipeline::framing::{interleave, deinterleave};
//!
//! let planar = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
//! let buf = interleave(&planar).unwrap();
//! assert_eq!(buf, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
//! assert_eq!(deinterleave(&buf, 2).unwrap(), planar);
//! ```

use crate::errors::ProcessError;
use anyhow::{Result, bail};

/// Concatenates `C` equal-length planar channel vectors into one interleaved buffer.
///
/// `out[s * C + c] = planar[c][s]`.
pub fn interleave(planar: &[Vec<f32>]) -> Result<Vec<f32>> {
    if planar.is_empty() {
        return Ok(Vec::new());
    }

    let len = planar[0].len();
    if planar.iter().any(|c| c.len() != len) {
        bail!(ProcessError::MismatchedChannelLengths);
    }

    let channels = planar.len();
    let mut out = vec![0.0f32; len * channels];
    for (c, chan) in planar.iter().enumerate() {
        for (s, &sample) in chan.iter().enumerate() {
            out[s * channels + c] = sample;
        }
    }

    Ok(out)
}

/// Splits an interleaved buffer into `channels` equal-length planar vectors.
///
/// Inverse of [`interleave`]. Fails if `channels == 0` or `buffer.len()` is not
/// a multiple of `channels`.
pub fn deinterleave(buffer: &[f32], channels: usize) -> Result<Vec<Vec<f32>>> {
    if channels == 0 {
        bail!(ProcessError::ChannelCountZero);
    }
    if buffer.len() % channels != 0 {
        bail!(ProcessError::InvalidBufferGeometry {
            len: buffer.len(),
            channels,
        });
    }

    let frames = buffer.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for (s, frame) in buffer.chunks_exact(channels).enumerate() {
        for (c, &sample) in frame.iter().enumerate() {
            planar[c].push(sample);
        }
        let _ = s;
    }

    Ok(planar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_two_channels() -> Result<()> {
        let planar = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        assert_eq!(interleave(&planar)?, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        Ok(())
    }

    #[test]
    fn interleave_three_channels() -> Result<()> {
        let planar = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        assert_eq!(interleave(&planar)?, vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
        Ok(())
    }

    #[test]
    fn interleave_rejects_mismatched_lengths() {
        let planar = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(interleave(&planar).is_err());
    }

    #[test]
    fn deinterleave_rejects_zero_channels() {
        assert!(deinterleave(&[1.0, 2.0], 0).is_err());
    }

    #[test]
    fn deinterleave_rejects_non_multiple_length() {
        assert!(deinterleave(&[1.0, 2.0, 3.0], 2).is_err());
    }

    #[test]
    fn roundtrip_deinterleave_then_interleave_is_exact() -> Result<()> {
        let buf: Vec<f32> = (0..12).map(|i| i as f32 * 0.5).collect();
        let planar = deinterleave(&buf, 3)?;
        assert_eq!(interleave(&planar)?, buf);
        Ok(())
    }

    #[test]
    fn roundtrip_interleave_then_deinterleave_is_exact() -> Result<()> {
        let planar = vec![vec![1.0, 2.0, 3.0, 4.0], vec![-1.0, -2.0, -3.0, -4.0]];
        let buf = interleave(&planar)?;
        assert_eq!(deinterleave(&buf, 2)?, planar);
        Ok(())
    }

    #[test]
    fn empty_buffer_roundtrips() -> Result<()> {
        let planar = deinterleave(&[], 2)?;
        assert_eq!(planar, vec![Vec::<f32>::new(), Vec::<f32>::new()]);
        Ok(())
    }
}
