//! Reelsmith Engine: timeline construction
//!
//! Turns media paths, durations and text into document content:
//! - **Registry:** identifier allocation, asset lookup by path, content UIDs
//! - **Transaction:** all-or-nothing staging of new resources
//! - **Strategy:** the structural shape of each appended clip
//! - **Builder:** offsets, the running ledger, and finalization
//! - **Probe:** media durations via ffprobe, batched on tokio
//!
//! All timeline arithmetic is done on integer frame counts.

pub mod builder;
pub mod probe;
pub mod registry;
pub mod strategy;
pub mod transaction;

pub use builder::{ClipContent, ClipDuration, TimelineBuilder};
pub use probe::{command_exists, probe_batch, DurationProbe, FfprobeProbe, MemoryProbe};
pub use registry::ResourceRegistry;
pub use strategy::{overlay_style_id, ClipStrategy, CompoundClipStrategy, StandardClipStrategy};
pub use transaction::ResourceTransaction;
