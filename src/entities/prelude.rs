pub use super::leave_requests::Entity as LeaveRequests;
pub use super::projects::Entity as Projects;
pub use super::users::Entity as Users;
