pub mod document;
pub mod node;

pub use document::*;
pub use node::*;
