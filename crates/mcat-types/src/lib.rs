pub mod validation;

pub use validation::FieldErrors;
