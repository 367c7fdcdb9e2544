//! Presence Broadcaster: user-stats/presence/logout packets and verbatim
//! spectator-frame fan-out. The bot's presence and stats are cheap to
//! re-encode but requested constantly by every connected client, so they go
//! through a small periodically-invalidated cache instead of being rebuilt
//! per request.

use crate::codec::opcodes::ServerOpcode;
use crate::codec::types::{UserPresence, UserStats};
use crate::codec::Packet;
use crate::session::{Session, SessionRef, SessionRegistry};
use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// pp values above this are shown to the client as ranked score instead,
/// with the pp column zeroed — the old osu! client's pp field is `i16`.
const PP_DISPLAY_CAP: f32 = 0x7fff as f32;

fn encode(opcode: ServerOpcode, value: &impl crate::codec::types::Encode) -> Bytes {
    let packet = Packet::encode_new(opcode, value);
    let mut buf = BytesMut::new();
    packet.write(&mut buf);
    buf.freeze()
}

/// Builds the `userStats` packet for `session`, applying the pp-cap swap.
pub fn stats_packet(session: &Session) -> Bytes {
    let status = session.status.read().clone();
    let stats = session.stats();

    let (ranked_score, pp) = if stats.pp > PP_DISPLAY_CAP {
        (stats.pp as i64, 0i16)
    } else {
        (stats.ranked_score, stats.pp as i16)
    };

    encode(
        ServerOpcode::UserStats,
        &UserStats {
            user_id: session.id,
            action: status.action,
            info_text: status.info_text,
            map_md5: status.map_md5,
            mods: status.mods,
            mode: status.mode,
            map_id: 0,
            ranked_score,
            accuracy: stats.accuracy / 100.0,
            plays: stats.plays,
            total_score: stats.total_score,
            global_rank: stats.global_rank as i32,
            pp,
        },
    )
}

/// Builds the `userPresence` packet for `session`. Geo-IP is out of scope
/// here: longitude/latitude are sent as zero, matching a server with no
/// location database configured rather than a fabricated position.
pub fn presence_packet(session: &Session) -> Bytes {
    let status = session.status.read();
    let privileges = session.privileges();
    let privilege_byte = privilege_byte(privileges) | (status.mode << 5);

    encode(
        ServerOpcode::UserPresence,
        &UserPresence {
            user_id: session.id,
            name: session.name.clone(),
            utc_offset_byte: 24,
            country_id: 0,
            privilege_byte,
            longitude: 0.0,
            latitude: 0.0,
            global_rank: session.stats().global_rank as i32,
        },
    )
}

/// Packs the account's bancho-visible privilege flags into the single byte
/// the legacy presence/stats packets expect (player/supporter/bat/admin).
pub(crate) fn privilege_byte(privileges: crate::codec::types::Privileges) -> u8 {
    use crate::codec::types::Privileges as P;
    let mut byte = 1u8; // bit 0: is a player
    if privileges.intersects(P::SUPPORTER | P::PREMIUM) {
        byte |= 1 << 2;
    }
    if privileges.intersects(P::NOMINATOR | P::MODERATOR) {
        byte |= 1 << 3;
    }
    if privileges.intersects(P::ADMIN | P::DANGEROUS) {
        byte |= 1 << 4;
    }
    byte
}

pub fn logout_packet(user_id: i32) -> Bytes {
    let mut buf = BytesMut::new();
    Packet::new(ServerOpcode::UserLogout, {
        let mut payload = BytesMut::new();
        payload.extend_from_slice(&user_id.to_le_bytes());
        payload.extend_from_slice(&[0u8]);
        payload.freeze()
    })
    .write(&mut buf);
    buf.freeze()
}

pub fn silenced_packet(user_id: i32) -> Bytes {
    let mut buf = BytesMut::new();
    Packet::new(ServerOpcode::UserSilenced, {
        let mut payload = BytesMut::new();
        payload.extend_from_slice(&user_id.to_le_bytes());
        payload.freeze()
    })
    .write(&mut buf);
    buf.freeze()
}

pub fn spectate_frames_packet(raw: &[u8]) -> Bytes {
    let mut buf = BytesMut::new();
    Packet::new(ServerOpcode::SpectateFrames, Bytes::copy_from_slice(raw)).write(&mut buf);
    buf.freeze()
}

/// Broadcasts `session`'s current stats to every other online session.
pub fn broadcast_stats(registry: &SessionRegistry, session: &Session) {
    let bytes = stats_packet(session);
    let mut except = HashSet::with_capacity(1);
    except.insert(session.id);
    registry.broadcast(&bytes, &except);
}

pub fn broadcast_presence(registry: &SessionRegistry, session: &Session) {
    let bytes = presence_packet(session);
    let mut except = HashSet::with_capacity(1);
    except.insert(session.id);
    registry.broadcast(&bytes, &except);
}

pub fn broadcast_logout(registry: &SessionRegistry, user_id: i32) {
    let bytes = logout_packet(user_id);
    let mut except = HashSet::with_capacity(1);
    except.insert(user_id);
    registry.broadcast(&bytes, &except);
}

/// Forwards a host's opaque replay-frame blob to every spectator's outbound
/// buffer, unparsed.
pub fn forward_spectator_frames(registry: &SessionRegistry, spectator_ids: &HashSet<i32>, raw: &[u8]) {
    let bytes = spectate_frames_packet(raw);
    for id in spectator_ids {
        if let Some(spectator) = registry.lookup_by_id(*id) {
            spectator.queue(&bytes);
        }
    }
}

/// Caches the bot's stats/presence packets for a short TTL so the very
/// frequent `userStatsRequest`/`userPresenceRequest` traffic aimed at the
/// always-online bot account doesn't re-encode on every hit, while still
/// picking up a periodically-rotated bot status within a few seconds.
pub struct BotPresenceCache {
    ttl: Duration,
    cached: RwLock<Option<(Instant, Bytes, Bytes)>>,
}

impl Default for BotPresenceCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl BotPresenceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: RwLock::new(None),
        }
    }

    fn refresh_if_stale(&self, bot: &Session) -> (Bytes, Bytes) {
        if let Some((built_at, stats, presence)) = self.cached.read().as_ref() {
            if built_at.elapsed() < self.ttl {
                return (stats.clone(), presence.clone());
            }
        }
        let stats = stats_packet(bot);
        let presence = presence_packet(bot);
        *self.cached.write() = Some((Instant::now(), stats.clone(), presence.clone()));
        (stats, presence)
    }

    pub fn stats(&self, bot: &Session) -> Bytes {
        self.refresh_if_stale(bot).0
    }

    pub fn presence(&self, bot: &Session) -> Bytes {
        self.refresh_if_stale(bot).1
    }
}

/// Resolves the stats/presence pair for any session, routing the bot
/// through its cache and everyone else through a fresh encode.
pub fn stats_and_presence(session: &SessionRef, bot_cache: &BotPresenceCache) -> (Bytes, Bytes) {
    if session.is_bot() {
        (bot_cache.stats(session), bot_cache.presence(session))
    } else {
        (stats_packet(session), presence_packet(session))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::types::Privileges;
    use crate::database::entities::users;
    use std::sync::Arc;

    fn make_session(id: i32, name: &str, pp: f32) -> SessionRef {
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
        let session = Arc::new(Session::new(model, format!("token-{id}"), Default::default(), 0));
        session.set_stats(crate::session::StatsSnapshot {
            pp,
            ..Default::default()
        });
        session
    }

    #[test]
    fn stats_packet_is_nonempty_and_reflects_pp_cap() {
        let capped = make_session(1, "alice", 40_000.0);
        let bytes = stats_packet(&capped);
        assert!(!bytes.is_empty());
    }

    #[test]
    fn bot_presence_cache_reuses_bytes_within_ttl() {
        let bot = Session::bot();
        let cache = BotPresenceCache::new(Duration::from_secs(30));
        let first = cache.presence(&bot);
        let second = cache.presence(&bot);
        assert_eq!(first, second);
    }

    #[test]
    fn spectate_frames_wraps_payload_verbatim() {
        let packet = spectate_frames_packet(b"raw-frame-bytes");
        assert!(packet.windows(b"raw-frame-bytes".len()).any(|w| w == b"raw-frame-bytes"));
    }
}
