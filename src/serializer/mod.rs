//! Serializers for the buffers uploaded next to the flat hierarchies: triangles,
//! detectors, lights and sensors.
//!
//! Every record type is `#[repr(C)]` plain old data matching the kernel structure of
//! the same name, packed without padding and written in native byte order.
//!

mod detector;
mod light;
mod matrix;
mod primitive;
mod record_buffer;
mod scene;
mod sensor;

pub use self::detector::*;
pub use self::light::*;
pub use self::matrix::*;
pub use self::primitive::*;
pub use self::record_buffer::*;
pub use self::scene::*;
pub use self::sensor::*;
