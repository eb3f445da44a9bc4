pub mod geo;
pub mod interpolate;
pub mod path;
pub mod precision;
pub mod projection;
pub mod vec;

pub use geo::*;
pub use interpolate::*;
pub use path::*;
pub use precision::*;
pub use projection::*;
pub use vec::*;
