//! The G10 engine.

pub mod console;
pub mod engine;
pub mod run;

pub use g10_geometry as geometry;
pub use g10_id as id;
pub use g10_intersection as intersection;
pub use g10_io as io;
pub use g10_log as log;
pub use g10_scene as scene;

pub use engine::{Engine, SceneUpdate};
