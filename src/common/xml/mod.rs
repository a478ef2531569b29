//! XML helpers shared by the container-format strategies.

mod escape;
#[cfg(any(feature = "ooxml", feature = "odf"))]
pub mod splice;

pub use escape::{escape_xml, unescape_xml};
