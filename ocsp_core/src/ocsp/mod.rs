pub mod templates;

pub use templates::{ResponseTemplates, TemplateError};
