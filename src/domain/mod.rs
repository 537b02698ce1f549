// Domain layer - Core plan types and invariants

pub mod model;
pub mod rules;
