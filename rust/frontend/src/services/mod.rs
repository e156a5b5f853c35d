mod contact;
mod conversation;
mod message;

pub use contact::ContactService;
pub use conversation::ConversationService;
pub use message::MessageService;
