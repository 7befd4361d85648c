mod pager;
mod state;

pub use pager::Pager;
pub use state::{classify, ErrorMessage, Intent, ListUiState, LoadPhase, MessageKey};
