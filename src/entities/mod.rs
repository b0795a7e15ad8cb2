pub mod prelude;

pub mod leave_requests;
pub mod projects;
pub mod users;
