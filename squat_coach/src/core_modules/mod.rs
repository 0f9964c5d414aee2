pub mod classifier_health;
pub mod countdown;
pub mod history;
pub mod phase;
pub mod probability;
pub mod session;
pub mod summary;
