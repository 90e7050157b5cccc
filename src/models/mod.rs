pub mod character;
pub mod director;
pub mod image;
pub mod request;

pub use character::*;
pub use director::*;
pub use image::*;
pub use request::*;
