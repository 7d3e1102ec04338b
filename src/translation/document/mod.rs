/*!
 * Segment input model.
 *
 * Documents arrive already decomposed into segments by the external document
 * collaborator; this module holds the segment types and the JSON/plain-text
 * loaders used by the CLI.
 */

pub mod model;

// Re-export types used by other modules
pub use model::{Segment, SegmentDocument};
