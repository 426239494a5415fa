//! Daily trigger for the meal notification run.

pub mod timing;
