// Bundled rules plugins.

pub mod checkers;

pub use checkers::CheckersPlugin;
