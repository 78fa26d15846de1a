mod store;


pub use store::{ChatSessionStore, ChatState, Outcome, SessionPhase, Warning};
