pub mod history;
pub mod instructions;
pub mod progress;
pub mod request;
pub mod result;
pub mod usage;
