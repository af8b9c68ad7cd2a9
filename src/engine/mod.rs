pub mod assignment;
pub mod lifecycle;
