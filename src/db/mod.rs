pub mod careers;
pub mod certificates;
pub mod deliveries;
pub mod email_settings;
pub mod newsletters;
pub mod projects;
pub mod skills;
pub mod subscribers;
