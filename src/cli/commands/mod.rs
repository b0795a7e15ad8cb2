mod init;
mod reset_admin;

pub use init::cmd_init;
pub use reset_admin::cmd_reset_admin_password;
