pub mod extract;
pub mod limit;
pub mod validate;
