pub mod io;
pub mod notifier;
