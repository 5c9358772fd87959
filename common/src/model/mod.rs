pub mod field;
pub mod mapping;
pub mod place_holder;
pub mod task;
pub mod template;
pub mod validation;
