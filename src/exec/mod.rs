pub mod runner;
pub mod patch;

pub use runner::{CommandOutput, CommandRunner, ShellRunner};
pub use patch::{PatchExecutor, PatchReport};
