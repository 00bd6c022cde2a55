pub mod container;
pub mod manager;
