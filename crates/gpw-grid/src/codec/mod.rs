//! Text codecs for the persisted artifacts.
//!
//! - [`range`]: strictly increasing integer lists as `lower,upper` ranges
//! - [`run_length`]: rows of values as `<count>x<value>` runs

pub mod range;
pub mod run_length;
