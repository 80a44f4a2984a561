//! Names of the hub methods this client invokes and the events it handles.

/// Join a named group: `(groupName)`
pub const ADD_TO_GROUP: &str = "AddToGroup";

/// Leave a named group: `(groupName)`
pub const REMOVE_FROM_GROUP: &str = "RemoveFromGroup";

/// Broadcast a chat message: `(groupName, user, message)`
pub const SEND_MESSAGE_TO_GROUP: &str = "SendMessageToGroup";

/// Broadcast a typing pulse: `(groupName, user)`
pub const SEND_TYPING_NOTIFICATION: &str = "SendTypingNotification";

/// Inbound chat message: `(sender, message)`
pub const RECEIVE_MESSAGE: &str = "ReceiveMessage";

/// Inbound typing pulse: `(typingUser)`
pub const USER_TYPING: &str = "UserTyping";
