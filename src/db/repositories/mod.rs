pub mod leave;
pub mod project;
pub mod user;
