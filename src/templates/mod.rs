mod registry;
mod source;

pub use registry::TemplateRegistry;
pub use source::{extract_parameters, load_template, template_name};
