pub mod decoder;
pub mod lifecycle;
pub mod render;
pub mod transport;

pub use decoder::{StreamDecoder, TransportError};
pub use lifecycle::{ChatController, MessageView, ResponseView, SendError, SendPhase};
pub use render::{ActionLink, Segment, TagRenderer};
pub use transport::{ChatTransport, HttpChatTransport};
