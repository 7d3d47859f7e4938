use std::fmt;

/// Session state machine tag.
///
/// `onboarding → idle ⇄ queue → chatting → idle`. `AwaitingLocation` and
/// `AwaitingSecret` are short-lived sub-states of idle entered while the bot
/// waits for free-text input. The matchmaker only ever performs
/// `Queue → Chatting`; everything else belongs to the menu layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Onboarding,
    Idle,
    AwaitingLocation,
    AwaitingSecret,
    Queue,
    Chatting,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Onboarding => "onboarding",
            UserStatus::Idle => "idle",
            UserStatus::AwaitingLocation => "awaiting_location",
            UserStatus::AwaitingSecret => "awaiting_secret",
            UserStatus::Queue => "queue",
            UserStatus::Chatting => "chatting",
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "idle" => UserStatus::Idle,
            "awaiting_location" => UserStatus::AwaitingLocation,
            "awaiting_secret" => UserStatus::AwaitingSecret,
            "queue" => UserStatus::Queue,
            "chatting" => UserStatus::Chatting,
            _ => UserStatus::Onboarding,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
