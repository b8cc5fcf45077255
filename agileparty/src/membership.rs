//! Room membership: at most one live session at a time.
//!
//! Switching rooms always shuts the previous session down (timers
//! cancelled, socket closed normally) before the next one opens.

use std::sync::Arc;

use tokio::sync::mpsc;

use agileparty_proto::room::{CreateRoomRequest, Room, RoomId, UserId};

use crate::api::{ApiError, RoomApi};
use crate::config::ClientConfig;
use crate::net::{self, NetError, NetEvent, NetHandle};

/// Errors returned by [`Membership`].
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    /// The request/response collaborator failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The session could not be started.
    #[error(transparent)]
    Net(#[from] NetError),

    /// A nickname is required to join.
    #[error("nickname must not be empty")]
    EmptyNickname,
}

/// A joined room and the events of its session.
#[derive(Debug)]
pub struct Joined {
    /// Room details.
    pub room: Room,
    /// Session events.
    pub events: mpsc::UnboundedReceiver<NetEvent>,
}

/// Owns the current room session.
#[derive(Debug)]
pub struct Membership<A> {
    config: ClientConfig,
    api: Arc<A>,
    user_id: UserId,
    session: Option<NetHandle>,
}

impl<A: RoomApi + 'static> Membership<A> {
    /// Creates a membership that is not in any room.
    ///
    /// The participant id comes from the configuration or is minted once
    /// here and reused for every room joined through this membership.
    pub fn new(config: ClientConfig, api: Arc<A>) -> Self {
        let user_id = config
            .user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map_or_else(|| UserId::new(uuid::Uuid::now_v7().to_string()), UserId::new);
        Self {
            config,
            api,
            user_id,
            session: None,
        }
    }

    /// This participant's id.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The running session, if in a room.
    #[must_use]
    pub const fn session(&self) -> Option<&NetHandle> {
        self.session.as_ref()
    }

    /// Creates a room named `name` and joins it as `nickname`.
    ///
    /// # Errors
    ///
    /// Returns [`MembershipError::Api`] if the room cannot be created, or
    /// [`MembershipError::Net`] if the session cannot start.
    pub async fn create_room(&mut self, name: &str, nickname: &str) -> Result<Joined, MembershipError> {
        let nickname = checked_nickname(nickname)?;
        let created = self.api.create_room(&CreateRoomRequest::new(name)).await?;
        tracing::info!(room = %created.id, name = %created.name, "room created");
        let room = Room::from(created);
        let events = self.open(room.id.clone(), nickname).await?;
        Ok(Joined { room, events })
    }

    /// Joins an existing room as `nickname`.
    ///
    /// # Errors
    ///
    /// Returns [`MembershipError::Api`] if the room does not exist or the
    /// lookup fails, or [`MembershipError::Net`] if the session cannot start.
    pub async fn join_room(&mut self, room_id: RoomId, nickname: &str) -> Result<Joined, MembershipError> {
        let nickname = checked_nickname(nickname)?;
        let room = self.api.room(&room_id).await?;
        let events = self.open(room.id.clone(), nickname).await?;
        Ok(Joined { room, events })
    }

    /// Leaves the current room.
    ///
    /// The session is torn down even when the server rejects the request.
    ///
    /// # Errors
    ///
    /// Returns [`MembershipError::Api`] if the leave request fails.
    pub async fn leave(&mut self) -> Result<(), MembershipError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let result = self.api.leave_room(session.room_id(), &self.user_id).await;
        tracing::info!(room = %session.room_id(), "leaving room");
        session.shutdown().await;
        result.map_err(MembershipError::from)
    }

    async fn open(
        &mut self,
        room_id: RoomId,
        nickname: &str,
    ) -> Result<mpsc::UnboundedReceiver<NetEvent>, MembershipError> {
        if let Some(previous) = self.session.take() {
            tracing::info!(from = %previous.room_id(), to = %room_id, "switching room");
            previous.shutdown().await;
        }
        let config = self
            .config
            .net_config_for(room_id, self.user_id.clone(), nickname);
        let (handle, events) = net::spawn_net(config, Arc::clone(&self.api))?;
        self.session = Some(handle);
        Ok(events)
    }
}

fn checked_nickname(nickname: &str) -> Result<&str, MembershipError> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(MembershipError::EmptyNickname);
    }
    Ok(nickname)
}
