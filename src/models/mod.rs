pub mod message;
pub mod presence;
pub mod room;

pub use message::{Message, MessageStatus};
pub use presence::RoomPresence;
pub use room::ChatRoom;
