//! WordprocessingML output: model, builder, serialization and packaging.

mod admonition;
mod builder;
mod list;
pub mod media;
pub mod model;
pub mod package;
pub mod table;
pub mod xml;

pub use builder::DocumentBuilder;
pub use model::OutputDocument;
pub use package::Template;
