//! Text helpers shared by the edit algebra and the trackers.
//!
//! All offsets are byte offsets into UTF-8 text.

pub mod position;

pub use position::{LineStarts, common_prefix_len, common_suffix_len, compute_line_starts};
