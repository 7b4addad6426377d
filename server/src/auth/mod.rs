pub mod credentials;
pub mod registration;
