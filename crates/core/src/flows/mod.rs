pub mod graph;
pub mod states;

pub use graph::StepGraph;
pub use states::{StepTransition, TransitionOutcome, TransitionRejection};
