//! Feature data model
//!
//! - [`Feature`]: immutable id + geometry blob + attribute map value
//! - [`FeatureSourceColumn`]: a natively stored column
//! - [`BoundingBox`]: rectangle used by every prefilter

mod bbox;
mod column;
#[allow(clippy::module_inception)]
mod feature;

pub use bbox::BoundingBox;
pub use column::FeatureSourceColumn;
pub use feature::{Feature, FeatureTag};
