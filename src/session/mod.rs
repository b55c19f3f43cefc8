pub mod store;

pub use store::{LoadOutcome, Session, SessionStore, Turn};
