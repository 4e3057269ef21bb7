pub mod availability;
pub mod filters;
pub mod keywords;
pub mod time;
