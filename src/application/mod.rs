pub mod clock;
pub mod controller;
pub mod instruments;
pub mod shutdown;
pub mod strategy;
pub mod tracker;
