mod deployments;
mod devices;
mod templates;

pub use deployments::*;
pub use devices::*;
pub use templates::*;
