pub mod batch;
pub mod naming;
pub mod urls;
pub mod views;
