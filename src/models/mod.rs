pub mod diagnosis;
pub mod environmental;
pub mod outcome;
pub mod plant_type;
pub mod templates;

pub use diagnosis::*;
pub use environmental::*;
pub use outcome::*;
pub use plant_type::*;
