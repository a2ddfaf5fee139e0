pub mod engine;
pub mod scene;
pub mod shader;
pub mod vertex;

pub use engine::{GraphicsEngine, OverlayTarget};
pub use scene::build_scene;
pub use shader::QuadPipeline;
pub use vertex::{Vertex, VertexBuffer};
