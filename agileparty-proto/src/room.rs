//! Room, participant and vote types shared by the event stream and the
//! request/response API.
//!
//! The event stream speaks camelCase while the REST surface answers in
//! snake_case, so the deserializers accept both spellings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Estimation deck accepted by the server, in display order.
pub const VOTE_DECK: [&str; 12] = [
    "0", "0.5", "1", "2", "3", "5", "8", "13", "20", "40", "100", "?",
];

/// Returns `true` if `value` is one of the cards in [`VOTE_DECK`].
#[must_use]
pub fn is_valid_vote(value: &str) -> bool {
    VOTE_DECK.contains(&value)
}

/// Identifier of a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a room identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a user identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const fn default_online() -> bool {
    true
}

/// A participant of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "UserRepr")]
pub struct User {
    /// Stable participant identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Whether the participant has cast a vote in the current round.
    pub is_voted: bool,
    /// Whether the participant currently holds a live connection.
    pub is_online: bool,
}

/// Accepted input shape for [`User`]. The REST surface sends both `id` and
/// `userId`, the event stream only `id`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRepr {
    #[serde(default)]
    id: Option<UserId>,
    #[serde(default)]
    user_id: Option<UserId>,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "is_voted", alias = "hasVoted")]
    is_voted: bool,
    #[serde(default = "default_online", alias = "is_online")]
    is_online: bool,
}

impl TryFrom<UserRepr> for User {
    type Error = &'static str;

    fn try_from(repr: UserRepr) -> Result<Self, Self::Error> {
        let id = repr.id.or(repr.user_id).ok_or("user entry without id")?;
        Ok(Self {
            id,
            name: repr.name,
            is_voted: repr.is_voted,
            is_online: repr.is_online,
        })
    }
}

impl User {
    /// Creates an online participant who has not voted yet.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            name: name.into(),
            is_voted: false,
            is_online: true,
        }
    }
}

/// A single revealed vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// Who cast the vote.
    #[serde(alias = "user_id")]
    pub user_id: UserId,
    /// Display name of the voter at reveal time.
    #[serde(alias = "nickname", alias = "user_name", default)]
    pub user_name: String,
    /// The card that was played (e.g. `"5"` or `"?"`).
    pub value: String,
}

impl Vote {
    /// Creates a vote record.
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
            user_name: user_name.into(),
            value: value.into(),
        }
    }

    /// Parses the card as a number, if it is numeric.
    #[must_use]
    pub fn numeric_value(&self) -> Option<f64> {
        self.value.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// Complete live state of one room, as delivered by `room_state` or the
/// snapshot endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    /// Room identifier.
    #[serde(alias = "room_id")]
    pub room_id: RoomId,
    /// Human-readable room name.
    #[serde(alias = "room_name", default)]
    pub room_name: String,
    /// Participants in order of arrival.
    #[serde(default)]
    pub users: Vec<User>,
    /// Revealed votes; empty while the round is hidden.
    #[serde(default)]
    pub votes: Vec<Vote>,
    /// Whether the current round has been revealed.
    #[serde(alias = "is_revealed", default)]
    pub is_revealed: bool,
    /// Mean of the numeric votes, present only after a reveal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    /// Free-form description of what is being estimated.
    #[serde(alias = "task_description", default, skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,
}

impl RoomState {
    /// Creates an empty, unrevealed room state.
    pub fn new(room_id: impl Into<String>, room_name: impl Into<String>) -> Self {
        Self {
            room_id: RoomId::new(room_id),
            room_name: room_name.into(),
            users: Vec::new(),
            votes: Vec::new(),
            is_revealed: false,
            average: None,
            task_description: None,
        }
    }

    /// Builder-style helper to set the participant list.
    #[must_use]
    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.users = users;
        self
    }

    /// Looks up a participant by id.
    #[must_use]
    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }
}

/// Room metadata returned by the request/response API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room identifier.
    pub id: RoomId,
    /// Human-readable room name.
    pub name: String,
    /// Name of the estimation deck (e.g. `"fibonacci"`).
    #[serde(default)]
    pub voting_system: String,
    /// Whether the server reveals automatically once everyone voted.
    #[serde(default)]
    pub auto_reveal: bool,
    /// Creation timestamp (RFC 3339).
    #[serde(default)]
    pub created_at: String,
    /// Last modification timestamp (RFC 3339).
    #[serde(default)]
    pub updated_at: String,
}

/// Body of `POST /api/rooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    /// Human-readable room name.
    pub name: String,
    /// Estimation deck.
    pub voting_system: String,
    /// Whether to reveal automatically once everyone voted.
    pub auto_reveal: bool,
}

impl CreateRoomRequest {
    /// A Fibonacci-deck room with manual reveal.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            voting_system: "fibonacci".to_string(),
            auto_reveal: false,
        }
    }
}

/// Response of `POST /api/rooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    /// Identifier of the new room.
    pub id: RoomId,
    /// Room name as stored.
    pub name: String,
    /// Estimation deck.
    #[serde(default)]
    pub voting_system: String,
    /// Auto reveal flag.
    #[serde(default)]
    pub auto_reveal: bool,
    /// Creation timestamp (RFC 3339).
    #[serde(default)]
    pub created_at: String,
}

impl From<CreateRoomResponse> for Room {
    fn from(resp: CreateRoomResponse) -> Self {
        Self {
            id: resp.id,
            name: resp.name,
            voting_system: resp.voting_system,
            auto_reveal: resp.auto_reveal,
            updated_at: resp.created_at.clone(),
            created_at: resp.created_at,
        }
    }
}
