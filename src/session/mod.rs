//! Session Registry: the set of logged-in users, indexed by opaque token,
//! numeric id, and normalized name, plus their per-session outbound byte
//! queues. Sessions are exclusively owned by the registry; every other
//! subsystem holds at most a weak reference.

use crate::auth::BcryptCache;
use crate::codec::types::{Mods, Privileges};
use crate::database::interface::{client_hashes, scores::Submode, stats, users};
use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use sea_orm::DatabaseConnection;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub type SessionRef = Arc<Session>;
pub type WeakSessionRef = Weak<Session>;

/// The bot account's fixed user id; always present, always "online".
pub const BOT_ID: i32 = 1;
pub const BOT_NAME: &str = "BanchoBot";

/// The mode-stats cache a session carries for whichever (mode, submode) it
/// currently has selected, refreshed on mode switch and after every score
/// submission that session is the subject of.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub ranked_score: i64,
    pub total_score: i64,
    pub pp: f32,
    pub accuracy: f32,
    pub plays: i32,
    pub playtime: i32,
    pub max_combo: i32,
    pub global_rank: i64,
}

impl StatsSnapshot {
    fn from_model(model: &crate::database::entities::stats::Model, global_rank: i64) -> Self {
        Self {
            ranked_score: model.ranked_score,
            total_score: model.total_score,
            pp: model.pp,
            accuracy: model.accuracy,
            plays: model.plays,
            playtime: model.playtime,
            max_combo: model.max_combo,
            global_rank,
        }
    }
}

/// The client's self-reported action/map/mods/mode, as carried in the
/// status-update and presence packets.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub action: u8,
    pub info_text: String,
    pub map_md5: String,
    pub mods: Mods,
    pub mode: u8,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            action: 0,
            info_text: String::new(),
            map_md5: String::new(),
            mods: Mods::empty(),
            mode: 0,
        }
    }
}

/// A clickable chat-link target cached per option id, so a later command
/// referencing "option N" resolves without re-parsing the original link.
#[derive(Debug, Clone)]
pub enum MenuOption {
    Beatmap { set_id: i32, map_id: i32 },
    Channel(String),
}

/// Hardware-id bundle submitted at login (`hash-bundle` in the login body).
#[derive(Debug, Clone, Default)]
pub struct ClientHashBundle {
    pub osu_path_md5: String,
    pub adapters: String,
    pub adapters_md5: String,
    pub uninstall_md5: String,
    pub disk_serial_md5: String,
}

#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub md5_password: String,
    pub client_build_date: String,
    pub utc_offset: i32,
    pub display_city: bool,
    pub hashes: ClientHashBundle,
    pub private_dm: bool,
    pub client_ip: IpAddr,
}

/// Negative reply codes the client's login packet (opcode 5) understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRejection {
    UnknownUser,
    OutdatedClient,
    Restricted,
    GenericError,
    NeedsVerification,
    AlreadyLoggedIn,
}

impl LoginRejection {
    pub fn code(self) -> i32 {
        match self {
            Self::UnknownUser => -1,
            Self::OutdatedClient => -2,
            Self::Restricted => -3,
            // "Already logged in" has no dedicated wire code; the client
            // treats any non-specific negative the same as a generic error.
            Self::GenericError | Self::AlreadyLoggedIn => -5,
            Self::NeedsVerification => -8,
        }
    }
}

pub struct Session {
    pub id: i32,
    pub name: String,
    pub normalized_name: String,
    pub token: String,
    privileges: RwLock<Privileges>,
    pub status: RwLock<SessionStatus>,
    stats: RwLock<StatsSnapshot>,
    pub friends: RwLock<HashSet<i32>>,
    pub blocked: RwLock<HashSet<i32>>,
    pub channels: RwLock<HashSet<String>>,
    pub current_match: RwLock<Option<Weak<Mutex<crate::multiplayer::Match>>>>,
    pub spectating: RwLock<Option<WeakSessionRef>>,
    pub spectators: RwLock<HashSet<i32>>,
    last_received: AtomicI64,
    pub login_time: i64,
    outbound: Mutex<BytesMut>,
    last_map: RwLock<Option<(String, Instant)>>,
    menu_options: RwLock<HashMap<i32, MenuOption>>,
    silence_end: AtomicI64,
    block_non_friend_dms: AtomicBool,
}

impl Session {
    pub(crate) fn new(
        user: crate::database::entities::users::Model,
        token: String,
        stats: StatsSnapshot,
        mode: u8,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: user.id,
            name: user.name,
            normalized_name: user.normalized_name,
            token,
            privileges: RwLock::new(user.privileges()),
            status: RwLock::new(SessionStatus {
                mode,
                ..Default::default()
            }),
            stats: RwLock::new(stats),
            friends: RwLock::new(HashSet::new()),
            blocked: RwLock::new(HashSet::new()),
            channels: RwLock::new(HashSet::new()),
            current_match: RwLock::new(None),
            spectating: RwLock::new(None),
            spectators: RwLock::new(HashSet::new()),
            last_received: AtomicI64::new(now),
            login_time: now,
            outbound: Mutex::new(BytesMut::new()),
            last_map: RwLock::new(None),
            menu_options: RwLock::new(HashMap::new()),
            silence_end: AtomicI64::new(user.silence_end),
            block_non_friend_dms: AtomicBool::new(user.block_non_friend_dms),
        }
    }

    /// The always-online bot account. Not persisted; its stats are zero.
    pub fn bot() -> SessionRef {
        Arc::new(Self {
            id: BOT_ID,
            name: BOT_NAME.to_string(),
            normalized_name: BOT_NAME.to_lowercase(),
            token: Uuid::new_v4().to_string(),
            privileges: RwLock::new(Privileges::UNRESTRICTED | Privileges::VERIFIED),
            status: RwLock::new(SessionStatus::default()),
            stats: RwLock::new(StatsSnapshot::default()),
            friends: RwLock::new(HashSet::new()),
            blocked: RwLock::new(HashSet::new()),
            channels: RwLock::new(HashSet::new()),
            current_match: RwLock::new(None),
            spectating: RwLock::new(None),
            spectators: RwLock::new(HashSet::new()),
            last_received: AtomicI64::new(i64::MAX),
            login_time: 0,
            outbound: Mutex::new(BytesMut::new()),
            last_map: RwLock::new(None),
            menu_options: RwLock::new(HashMap::new()),
            silence_end: AtomicI64::new(0),
            block_non_friend_dms: AtomicBool::new(false),
        })
    }

    pub fn is_bot(&self) -> bool {
        self.id == BOT_ID
    }

    pub fn privileges(&self) -> Privileges {
        *self.privileges.read()
    }

    pub fn set_privileges(&self, value: Privileges) {
        *self.privileges.write() = value;
    }

    pub fn stats(&self) -> StatsSnapshot {
        *self.stats.read()
    }

    pub fn set_stats(&self, value: StatsSnapshot) {
        *self.stats.write() = value;
    }

    pub fn is_silenced(&self) -> bool {
        self.silence_end.load(Ordering::Relaxed) > chrono::Utc::now().timestamp()
    }

    pub fn silence_end(&self) -> i64 {
        self.silence_end.load(Ordering::Relaxed)
    }

    pub fn set_silence_end(&self, value: i64) {
        self.silence_end.store(value, Ordering::Relaxed);
    }

    pub fn block_non_friend_dms(&self) -> bool {
        self.block_non_friend_dms.load(Ordering::Relaxed)
    }

    pub fn set_block_non_friend_dms(&self, value: bool) {
        self.block_non_friend_dms.store(value, Ordering::Relaxed);
    }

    /// Appends bytes to the outbound queue; drained on the session's next
    /// gateway transaction.
    pub fn queue(&self, bytes: &[u8]) {
        self.outbound.lock().extend_from_slice(bytes);
    }

    /// Swaps in a fresh buffer and returns everything queued so far, per
    /// the "swap rather than copy-and-clear" drain rule.
    pub fn drain_outbound(&self) -> Bytes {
        std::mem::take(&mut *self.outbound.lock()).freeze()
    }

    pub fn touch_received(&self) {
        self.last_received
            .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let last = self.last_received.load(Ordering::Relaxed);
        let now = chrono::Utc::now().timestamp();
        Duration::from_secs(now.saturating_sub(last).max(0) as u64)
    }

    /// The last beatmap hash this session referenced (e.g. via a chat
    /// link), valid for `ttl` from when it was set.
    pub fn last_map(&self) -> Option<String> {
        let guard = self.last_map.read();
        let (md5, expires) = guard.as_ref()?;
        if Instant::now() < *expires {
            Some(md5.clone())
        } else {
            None
        }
    }

    pub fn set_last_map(&self, md5: String, ttl: Duration) {
        *self.last_map.write() = Some((md5, Instant::now() + ttl));
    }

    pub fn menu_option(&self, id: i32) -> Option<MenuOption> {
        self.menu_options.read().get(&id).cloned()
    }

    pub fn set_menu_option(&self, id: i32, option: MenuOption) {
        self.menu_options.write().insert(id, option);
    }

    pub fn current_submode(&self) -> Submode {
        Submode::from_mods(self.status.read().mods)
    }
}

/// The set of logged-in users, indexed by token, numeric id, and
/// normalized name.
pub struct SessionRegistry {
    /// Serializes `login` so "is this user already online?" and "insert the
    /// new session" can't race (the TOCTOU window named in the design).
    login_lock: tokio::sync::Mutex<()>,
    by_token: RwLock<HashMap<String, SessionRef>>,
    by_id: RwLock<HashMap<i32, SessionRef>>,
    by_name: RwLock<HashMap<String, SessionRef>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        let registry = Self {
            login_lock: tokio::sync::Mutex::new(()),
            by_token: RwLock::new(HashMap::new()),
            by_id: RwLock::new(HashMap::new()),
            by_name: RwLock::new(HashMap::new()),
        };
        registry.register(Session::bot());
        registry
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup_by_token(&self, token: &str) -> Option<SessionRef> {
        self.by_token.read().get(token).cloned()
    }

    pub fn lookup_by_id(&self, id: i32) -> Option<SessionRef> {
        self.by_id.read().get(&id).cloned()
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<SessionRef> {
        self.by_name.read().get(&users::normalize(name)).cloned()
    }

    pub fn register(&self, session: SessionRef) {
        self.by_token
            .write()
            .insert(session.token.clone(), session.clone());
        self.by_id.write().insert(session.id, session.clone());
        self.by_name
            .write()
            .insert(session.normalized_name.clone(), session);
    }

    pub fn remove(&self, session: &Session) {
        self.by_token.write().remove(&session.token);
        self.by_id.write().remove(&session.id);
        self.by_name.write().remove(&session.normalized_name);
    }

    /// All currently online sessions (snapshot; does not include sessions
    /// registered/removed concurrently with the call).
    pub fn all(&self) -> Vec<SessionRef> {
        self.by_id.read().values().cloned().collect()
    }

    /// Appends `bytes` to every online session's outbound buffer except
    /// those in `except`.
    pub fn broadcast(&self, bytes: &[u8], except: &HashSet<i32>) {
        for session in self.by_id.read().values() {
            if !except.contains(&session.id) {
                session.queue(bytes);
            }
        }
    }

    /// Authenticates `creds` and, on success, registers a new session and
    /// returns it. See spec §4.2 for the rejection-code contract.
    pub async fn login(
        &self,
        db: &DatabaseConnection,
        bcrypt_cache: &BcryptCache,
        min_client_build_date: &str,
        ghost_reclaim_silence_secs: u64,
        creds: LoginCredentials,
    ) -> Result<SessionRef, LoginRejection> {
        if creds.client_build_date.as_str() < min_client_build_date {
            return Err(LoginRejection::OutdatedClient);
        }

        // Serializes the online-check + insert below against concurrent
        // logins of the same account.
        let _guard = self.login_lock.lock().await;

        let user = fetch_user(db, &creds.username)
            .await?
            .ok_or(LoginRejection::UnknownUser)?;

        if !bcrypt_cache.verify(&creds.md5_password, &user.password) {
            // Deliberately indistinguishable from "unknown user".
            return Err(LoginRejection::UnknownUser);
        }

        if user.is_restricted() {
            return Err(LoginRejection::Restricted);
        }

        // The verification subsystem proper (e.g. email confirmation) is
        // out of scope; a first successful login auto-grants VERIFIED.
        let mut privileges = user.privileges();
        let user = if !privileges.contains(Privileges::VERIFIED) {
            privileges |= Privileges::VERIFIED;
            users::set_privileges(db, user, privileges.bits() as i32)
                .await
                .map_err(|_| LoginRejection::GenericError)?
        } else {
            user
        };

        if let Some(existing) = self.by_name.read().get(&user.normalized_name).cloned() {
            if existing.idle_for().as_secs() < ghost_reclaim_silence_secs {
                return Err(LoginRejection::AlreadyLoggedIn);
            }
            self.remove(&existing);
        }

        let stats_row = stats::find_or_create(db, user.id, 0, 0)
            .await
            .map_err(|_| LoginRejection::GenericError)?;
        let global_rank = users::count_unrestricted_with_greater_pp(db, 0, 0, stats_row.pp)
            .await
            .unwrap_or(0)
            + 1;
        let stats_snapshot = StatsSnapshot::from_model(&stats_row, global_rank);

        let _ = users::touch_activity(db, user.clone()).await;
        let _ = client_hashes::record(
            db,
            user.id,
            &creds.hashes.osu_path_md5,
            &creds.hashes.adapters,
            &creds.hashes.adapters_md5,
            &creds.hashes.uninstall_md5,
            &creds.hashes.disk_serial_md5,
        )
        .await;

        let token = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(user, token, stats_snapshot, 0));
        self.register(session.clone());
        Ok(session)
    }
}

async fn fetch_user(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<crate::database::entities::users::Model>, LoginRejection> {
    users::find_by_name(db, username)
        .await
        .map_err(|_| LoginRejection::GenericError)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bot_session_is_always_online_id() {
        let bot = Session::bot();
        assert_eq!(bot.id, BOT_ID);
        assert!(!bot.is_silenced());
    }

    #[test]
    fn registry_contains_bot_by_default() {
        let registry = SessionRegistry::new();
        assert!(registry.lookup_by_id(BOT_ID).is_some());
        assert!(registry.lookup_by_name(BOT_NAME).is_some());
    }

    #[test]
    fn queue_then_drain_empties_buffer() {
        let bot = Session::bot();
        bot.queue(b"hello");
        let drained = bot.drain_outbound();
        assert_eq!(&drained[..], b"hello");
        assert_eq!(&bot.drain_outbound()[..], b"");
    }

    #[test]
    fn register_then_remove_clears_all_indices() {
        let registry = SessionRegistry::new();
        let session = Arc::new(Session::new(
            crate::database::entities::users::Model {
                id: 42,
                name: "Alice".to_string(),
                normalized_name: "alice".to_string(),
                email: "a@example.com".to_string(),
                password: String::new(),
                country: "US".to_string(),
                privileges: Privileges::UNRESTRICTED.bits() as i32,
                silence_end: 0,
                block_non_friend_dms: false,
                creation_time: chrono::Utc::now(),
                latest_activity: chrono::Utc::now(),
            },
            "token-123".to_string(),
            StatsSnapshot::default(),
            0,
        ));
        registry.register(session.clone());
        assert!(registry.lookup_by_token("token-123").is_some());
        registry.remove(&session);
        assert!(registry.lookup_by_token("token-123").is_none());
        assert!(registry.lookup_by_id(42).is_none());
    }
}
