pub mod artifact;
pub mod draft;
pub mod session;
pub mod state;
pub mod step;
