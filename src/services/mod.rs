pub mod notifier;
pub mod resolution;
