// Game engine: state container, command dispatch, and the rules-plugin contract.

pub mod command_bus;
pub mod plugin;
pub mod registry;
pub mod state;

pub use command_bus::{
    ChangeContext, CommandBus, CommandContext, CommandDescriptor, CommandError, CommandOutcome,
    CommandStrategy, UndoFn,
};
pub use plugin::{GamePlugin, GameSetup, PluginError, RoomContext};
pub use registry::{PluginRegistry, RegistryError};
pub use state::{GameState, StateContainer, StateEvent};
