//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the download engine expects from the outside
//! world. They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP or filesystem types in any signature
//! - Emission never blocks the caller
//! - Every port has a trivial implementation usable in tests and CLIs

pub mod download_event_emitter;
pub mod player;
pub mod source;
pub mod space_probe;

pub use download_event_emitter::{ChannelEmitter, DownloadEventEmitterPort, NoopDownloadEmitter};
pub use player::{NoopPlayer, PlayerPort};
pub use source::{SourceAdapter, SourceReader, SourceStream};
pub use space_probe::SpaceProbe;
