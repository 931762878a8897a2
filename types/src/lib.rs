//now people using the types library can use these types
pub mod audio;
pub mod events;
pub mod inventory;
pub mod setup;
pub mod tools;

//re-export types for easier access
pub use audio::{Base64EncodedAudioBytes, Blob};
pub use events::{ClientMessage, InboundEvent, ServerEvent, ServerMessage};
pub use inventory::{Electronics, ElectronicsState, ElectronicsType, OfficeLayout, Room};
pub use setup::{Setup, SetupConfigurator};
pub use tools::{FunctionCall, FunctionDeclaration, FunctionResponse, Tool};
