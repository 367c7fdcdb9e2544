//! Channel Registry: named chat channels with per-channel membership and
//! read/write privilege gates. Static channels are loaded at startup;
//! instance channels (match/spectator) are created on first join and
//! destroyed when empty.

use crate::codec::types::Privileges;
use crate::session::{Session, SessionRef};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub struct Channel {
    /// External, possibly virtual name shown to clients (e.g. `#spectator`).
    pub name: String,
    /// Unique internal name (e.g. `#spect_1234`), distinct from `name` for
    /// instance channels sharing a generic external alias.
    pub real_name: String,
    pub topic: RwLock<String>,
    pub read_privileges: Privileges,
    pub write_privileges: Privileges,
    pub auto_join: bool,
    pub instance: bool,
    members: RwLock<HashMap<i32, SessionRef>>,
}

impl Channel {
    pub fn new_static(
        name: impl Into<String>,
        topic: impl Into<String>,
        read_privileges: Privileges,
        write_privileges: Privileges,
        auto_join: bool,
    ) -> Self {
        let name = name.into();
        Self {
            real_name: name.clone(),
            name,
            topic: RwLock::new(topic.into()),
            read_privileges,
            write_privileges,
            auto_join,
            instance: false,
            members: RwLock::new(HashMap::new()),
        }
    }

    pub fn new_instance(name: impl Into<String>, real_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            real_name: real_name.into(),
            topic: RwLock::new(String::new()),
            read_privileges: Privileges::empty(),
            write_privileges: Privileges::empty(),
            auto_join: false,
            instance: true,
            members: RwLock::new(HashMap::new()),
        }
    }

    pub fn member_count(&self) -> u16 {
        self.members.read().len() as u16
    }

    pub fn can_read(&self, session: &Session) -> bool {
        self.instance || self.read_privileges.is_empty()
            || session.privileges().intersects(self.read_privileges)
    }

    pub fn can_write(&self, session: &Session) -> bool {
        self.write_privileges.is_empty() || session.privileges().intersects(self.write_privileges)
    }

    pub fn is_member(&self, user_id: i32) -> bool {
        self.members.read().contains_key(&user_id)
    }

    pub fn members(&self) -> Vec<SessionRef> {
        self.members.read().values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    fn insert_member(&self, session: SessionRef) {
        self.members.write().insert(session.id, session);
    }

    fn remove_member(&self, user_id: i32) {
        self.members.write().remove(&user_id);
    }

    /// Sends `bytes` to every member except `sender_id`, gated on write
    /// privilege.
    pub fn send(&self, session: &Session, bytes: &[u8]) -> Result<(), ChannelError> {
        if !self.can_write(session) {
            return Err(ChannelError::NoWritePrivilege);
        }
        self.send_system(session.id, bytes);
        Ok(())
    }

    /// Sends `bytes` to every member except `sender_id`, bypassing the write
    /// gate — for server-originated notices (e.g. rank-1 announcements) that
    /// aren't subject to the same privilege check as a player's own chat.
    pub fn send_system(&self, sender_id: i32, bytes: &[u8]) {
        for member in self.members.read().values() {
            if member.id != sender_id {
                member.queue(bytes);
            }
        }
    }

    /// Sends `bytes` to every member with no exclusion, bypassing the write
    /// gate — for notices where the nominal sender should also see their own
    /// message (self-echo), e.g. the rank-1 announcement.
    pub fn send_system_all(&self, bytes: &[u8]) {
        for member in self.members.read().values() {
            member.queue(bytes);
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("unknown channel")]
    NotFound,
    #[error("insufficient read privilege")]
    NoReadPrivilege,
    #[error("insufficient write privilege")]
    NoWritePrivilege,
}

pub type ChannelRef = Arc<Channel>;

/// The set of known channels, keyed by external name.
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, ChannelRef>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        let registry = Self {
            channels: RwLock::new(HashMap::new()),
        };
        for channel in default_static_channels() {
            registry.insert(Arc::new(channel));
        }
        registry
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, channel: ChannelRef) {
        self.channels
            .write()
            .insert(channel.name.clone(), channel);
    }

    pub fn get(&self, name: &str) -> Option<ChannelRef> {
        self.channels.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) {
        self.channels.write().remove(name);
    }

    /// Channels visible to `session` for the channel-listing packet: every
    /// non-instance channel the session can read, plus any instance
    /// channels it's already a member of.
    pub fn visible_to(&self, session: &Session) -> Vec<ChannelRef> {
        self.channels
            .read()
            .values()
            .filter(|channel| {
                if channel.instance {
                    channel.is_member(session.id)
                } else {
                    channel.can_read(session)
                }
            })
            .cloned()
            .collect()
    }

    /// Creates (if absent) and joins an instance channel, returning it.
    pub fn join_or_create_instance(
        &self,
        name: impl Into<String>,
        real_name: impl Into<String>,
        session: &SessionRef,
    ) -> ChannelRef {
        let name = name.into();
        let channel = {
            let mut channels = self.channels.write();
            channels
                .entry(name.clone())
                .or_insert_with(|| Arc::new(Channel::new_instance(name.clone(), real_name)))
                .clone()
        };
        self.join(&channel, session).ok();
        channel
    }

    /// Adds `session` to `channel`, checking read privilege and announcing
    /// the updated member count to the channel's visible audience.
    pub fn join(&self, channel: &ChannelRef, session: &SessionRef) -> Result<(), ChannelError> {
        if !channel.can_read(session) {
            return Err(ChannelError::NoReadPrivilege);
        }
        channel.insert_member(session.clone());
        session.channels.write().insert(channel.name.clone());
        self.broadcast_channel_info(channel);
        Ok(())
    }

    /// Removes `session` from `channel`; destroys an instance channel left
    /// empty.
    pub fn leave(&self, channel: &ChannelRef, session: &Session) {
        channel.remove_member(session.id);
        session.channels.write().remove(&channel.name);
        if channel.instance && channel.is_empty() {
            self.remove(&channel.name);
        } else {
            self.broadcast_channel_info(channel);
        }
    }

    fn broadcast_channel_info(&self, channel: &ChannelRef) {
        let packet = crate::codec::Packet::encode_new(
            crate::codec::opcodes::ServerOpcode::ChannelInfo,
            &crate::codec::types::ChannelInfo {
                name: channel.name.clone(),
                topic: channel.topic.read().clone(),
                member_count: channel.member_count(),
            },
        );
        let mut buf = bytes::BytesMut::new();
        packet.write(&mut buf);
        let bytes = buf.freeze();

        // Non-instance channels are discoverable to any session with read
        // privilege, not just current members; the gateway separately
        // re-broadcasts channel-info for statics via
        // `SessionRegistry::broadcast` when membership-independent
        // visibility matters (e.g. initial channel listing).
        for session in channel.members() {
            session.queue(&bytes);
        }
    }
}

/// Channels present from startup, matching the external-interface's
/// "public"/"announce" channels plus the generic lobby channel.
fn default_static_channels() -> Vec<Channel> {
    vec![
        Channel::new_static(
            "#osu",
            "Main chat",
            Privileges::UNRESTRICTED,
            Privileges::UNRESTRICTED,
            true,
        ),
        Channel::new_static(
            "#announce",
            "Announcements",
            Privileges::UNRESTRICTED,
            Privileges::ADMIN,
            true,
        ),
        Channel::new_static(
            "#lobby",
            "Multiplayer lobby",
            Privileges::UNRESTRICTED,
            Privileges::UNRESTRICTED,
            false,
        ),
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::database::entities::users;

    fn make_session(id: i32, name: &str) -> SessionRef {
        let model = users::Model {
            id,
            name: name.to_string(),
            normalized_name: name.to_lowercase(),
            email: String::new(),
            password: String::new(),
            country: "US".to_string(),
            privileges: Privileges::UNRESTRICTED.bits() as i32,
            silence_end: 0,
            block_non_friend_dms: false,
            creation_time: chrono::Utc::now(),
            latest_activity: chrono::Utc::now(),
        };
        Arc::new(crate::session::Session::new(
            model,
            format!("token-{id}"),
            Default::default(),
            0,
        ))
    }

    #[test]
    fn default_channels_are_registered() {
        let registry = ChannelRegistry::new();
        assert!(registry.get("#osu").is_some());
        assert!(registry.get("#announce").is_some());
    }

    #[test]
    fn join_then_leave_destroys_empty_instance_channel() {
        let registry = ChannelRegistry::new();
        let session = make_session(1, "alice");
        let channel = registry.join_or_create_instance("#spectator", "#spect_1", &session);
        assert!(registry.get("#spectator").is_some());
        registry.leave(&channel, &session);
        assert!(registry.get("#spectator").is_none());
    }

    #[test]
    fn send_respects_write_privilege() {
        let registry = ChannelRegistry::new();
        let announce = registry.get("#announce").unwrap();
        let session = make_session(2, "bob");
        registry.join(&announce, &session).unwrap();
        assert!(matches!(
            announce.send(&session, b"hi"),
            Err(ChannelError::NoWritePrivilege)
        ));
    }
}
