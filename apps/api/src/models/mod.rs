pub mod cv;
pub mod interview;
pub mod quiz;
pub mod user;
