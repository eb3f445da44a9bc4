pub mod acquisition;
pub mod animation;
pub mod context;
pub mod effects;
pub mod engine;
pub mod fill;
pub mod graticule;
pub mod interaction;
pub mod labels;
pub mod layer;
pub mod legend;
pub mod map;
pub mod objects;
pub mod scale;
pub mod spec;
pub mod symbology;
pub mod tooltip;
pub mod vector;

pub use acquisition::{AcquireError, Acquirer, LoadRegistry, LoadTicket};
pub use engine::{LayerEngine, PointerEvent};
pub use layer::*;
pub use map::{MapContext, MapContexts, PRIMARY_MAP_ID, SUB_MAP_ID};
pub use spec::{ConfigError, LayerSpec, MapConfig};
