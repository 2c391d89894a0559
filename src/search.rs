//! Size-targeting width search.
//!
//! Given an image, an encode configuration and a byte budget, find the width
//! (aspect ratio preserved) whose encoding fits the budget as tightly as the
//! codec allows, using as few encodes as possible.
//!
//! # Algorithm
//!
//! ```text
//! encode at W0 ─── fits? ──yes──▶ write original, done
//!                    │no
//!                    ▼
//!   low = 0, high = W0
//!   while low < high:
//!       mid = (low + high) / 2
//!       encode(resample(mid))
//!       too big      → high = mid - 1
//!       within 5%    → accept, stop
//!       fits, slack  → keep as best, low = mid + 1
//!   write best
//! ```
//!
//! Encoded size is assumed non-decreasing in width for a fixed format and
//! quality. When an encoder breaks that assumption the search can settle on a
//! narrower width than necessary, but the written buffer still fits the
//! budget: a candidate is only kept after it was measured under the target.
//!
//! # Acceptance band
//!
//! Codecs are not size-invertible, so the target is a band rather than an
//! exact value. A resized candidate of size `S` is accepted as soon as
//! `1 - S / target <= ACCURACY` ([`ACCURACY`] = 0.05). If the search space is
//! exhausted first, the best candidate under the target is written and
//! [`SearchOutcome::converged`] is `false`.
//!
//! # Buffers
//!
//! Two buffers are taken from the [`BufferPool`]: the scratch buffer each
//! attempt encodes into, and the best candidate so far. Accepting a candidate
//! swaps them instead of copying. Both return to the pool after the chosen
//! bytes have been written to the sink.

use crate::imaging::{BackendError, EncodeConfig, ImageBackend};
use crate::pool::BufferPool;
use image::{DynamicImage, GenericImageView};
use std::io::Write;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Maximum tolerated relative shortfall `1 - size / target` for accepting
/// a resized candidate.
pub const ACCURACY: f64 = 0.05;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Upper bound on the encoded size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSize {
    /// Keep the full-size encoding whatever its size.
    Unlimited,
    Bytes(u64),
}

impl TargetSize {
    /// `0` or negative means no limit.
    pub fn new(bytes: i64) -> Self {
        if bytes <= 0 {
            Self::Unlimited
        } else {
            Self::Bytes(bytes as u64)
        }
    }

    /// The effective byte budget once the full-size encode is known.
    fn resolve(self, origin_size: u64) -> u64 {
        match self {
            Self::Unlimited => origin_size,
            Self::Bytes(n) => n,
        }
    }
}

/// Relative shortfall of `size` below `target`.
pub fn accuracy(size: u64, target: u64) -> f64 {
    1.0 - size as f64 / target as f64
}

/// What the search settled on.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Source dimensions.
    pub original: (u32, u32),
    /// Dimensions of the written encoding.
    pub dimensions: (u32, u32),
    /// Bytes written to the sink.
    pub size: u64,
    /// Size of the full-width encoding.
    pub original_size: u64,
    /// Effective budget (the original size when unlimited).
    pub target: u64,
    /// Encode calls made, the full-size one included.
    pub attempts: u32,
    /// Whether the written encoding is a resample.
    pub resized: bool,
    /// Whether the written encoding fits the budget.
    pub within_budget: bool,
    /// Whether the result passed the acceptance check: either the original
    /// fit, or a resized candidate landed within [`ACCURACY`] of the target.
    pub converged: bool,
}

impl SearchOutcome {
    /// Relative shortfall below the target.
    pub fn accuracy(&self) -> f64 {
        accuracy(self.size, self.target)
    }
}

/// Search for the widest encoding of `image` that fits `target` and write
/// it to `sink`.
///
/// Any resample, encode or write failure aborts the search and is returned
/// as-is; nothing is written to `sink` unless the search succeeds.
pub fn search<B, W>(
    backend: &B,
    pool: &BufferPool,
    image: &DynamicImage,
    target: TargetSize,
    config: &EncodeConfig,
    sink: &mut W,
) -> Result<SearchOutcome, SearchError>
where
    B: ImageBackend + ?Sized,
    W: Write + ?Sized,
{
    let original = image.dimensions();
    let mut scratch = pool.acquire();

    let original_size = backend.encode(image, config, &mut scratch)? as u64;
    let target = target.resolve(original_size);
    let mut outcome = SearchOutcome {
        original,
        dimensions: original,
        size: original_size,
        original_size,
        target,
        attempts: 1,
        resized: false,
        within_budget: true,
        converged: true,
    };

    if original_size <= target {
        info!(size = original_size, budget = target, "original encoding fits, not resizing");
        sink.write_all(&scratch)?;
        return Ok(outcome);
    }

    let mut best = pool.acquire();
    let mut best_dimensions = None;
    let mut last_dimensions = original;
    let mut low = 0u32;
    let mut high = original.0;
    outcome.converged = false;

    while low < high {
        let mid = low + (high - low) / 2;
        let candidate = backend.resample(image, mid)?;
        scratch.clear();
        let size = backend.encode(&candidate, config, &mut scratch)? as u64;
        outcome.attempts += 1;
        last_dimensions = candidate.dimensions();
        debug!(low, high, width = mid, size, budget = target, "encoded candidate");

        if size > target {
            high = mid.saturating_sub(1);
            continue;
        }

        std::mem::swap(&mut *scratch, &mut *best);
        best_dimensions = Some(last_dimensions);
        if accuracy(size, target) <= ACCURACY {
            outcome.converged = true;
            break;
        }
        low = mid + 1;
    }

    let chosen = match best_dimensions {
        Some(dimensions) => {
            outcome.dimensions = dimensions;
            &best
        }
        None => {
            warn!(
                budget = target,
                smallest = scratch.len(),
                "no width fits the target, writing the smallest attempt"
            );
            outcome.dimensions = last_dimensions;
            outcome.within_budget = false;
            &scratch
        }
    };
    outcome.size = chosen.len() as u64;
    outcome.resized = outcome.dimensions != original;
    info!(
        width = outcome.dimensions.0,
        height = outcome.dimensions.1,
        size = outcome.size,
        budget = target,
        attempts = outcome.attempts,
        "search finished"
    );
    sink.write_all(chosen)?;
    Ok(outcome)
}
