//! # downsize
//!
//! Shrink an image until its encoding fits a byte budget, keeping the aspect
//! ratio and giving up as little width as possible.
//!
//! # Architecture
//!
//! ```text
//! bytes ─▶ decode ─▶ search ─┬─▶ resample(width) ─▶ encode ─▶ size?
//!                            └───────────── binary search ◀──────┘
//!                                              │
//!                                              ▼
//!                                     best buffer ─▶ sink
//! ```
//!
//! The search only sees an [`imaging::ImageBackend`]: resample to a width,
//! encode into a buffer. Codec details stay behind that trait, and unit tests
//! drive the search with a mock whose size curve is known exactly.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`search`] | The size-targeting binary search over the output width |
//! | [`imaging`] | Decode, Lanczos3 resample, JPEG/PNG/GIF encode on the `image` crate |
//! | [`pool`] | Reusable encode buffers shared by concurrent searches |
//! | [`process`] | Single-file and batch pipelines around the search |
//! | [`cache`] | Content-addressed result cache for batch runs |
//! | [`config`] | `downsize.toml` loading, merging, validation |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## Size Is Monotone In Width
//!
//! The search assumes a wider image never encodes smaller. That holds closely
//! enough for real codecs that a binary search over `[0, W0]` finds a width
//! within 5% of the budget in `log2(W0)` encodes. When it does not hold, the
//! result is still under budget, just narrower than strictly needed.
//!
//! ## A Band, Not An Exact Size
//!
//! A JPEG encoder cannot be asked for N bytes. The search stops at the first
//! candidate within 5% under the target ([`search::ACCURACY`]) and otherwise
//! keeps the widest candidate that fit.
//!
//! ## Pure-Rust Imaging
//!
//! Everything runs on the `image` crate: no ImageMagick, no system codecs.
//! The binary is self-contained.

pub mod cache;
pub mod config;
pub mod imaging;
pub mod output;
pub mod pool;
pub mod process;
pub mod search;
