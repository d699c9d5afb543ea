mod binary;
mod process;

pub use binary::{Arch, resolve_binary};
pub use process::{is_process_alive, kill_process};
