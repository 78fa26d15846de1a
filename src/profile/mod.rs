mod editor;
mod nickname;


pub use editor::{ProfileEditor, ProfileState};
pub use nickname::{validate_nickname, NicknameChecker, NicknameStatus, DEFAULT_DEBOUNCE};
