// Domain-specific error types
pub mod errors;

// Structured session events
pub mod events;

// Port interfaces
pub mod ports;

// Risk governance domain
pub mod risk;

// Core trading domain
pub mod trading;
