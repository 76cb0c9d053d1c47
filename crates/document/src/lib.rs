//! Reelsmith Document Model
//!
//! Defines the in-memory shape of a project file:
//! - **Resources:** formats, media assets, effects and compound media, each
//!   addressed by a document-unique [`ResourceId`]
//! - **Timeline:** typed items placed on the spine or anchored to a parent
//!   on a non-zero lane
//! - **Document:** load, blank template, structural validation and save
//!
//! Time attributes are always written from [`reelsmith_common::RationalTime`],
//! so every value produced here is frame-aligned.

pub mod document;
pub mod resource;
pub mod timeline;
pub mod xml;

pub use document::*;
pub use resource::*;
pub use timeline::*;
