//! Gateway Handler: the single HTTP entrypoint the game client talks to.
//!
//! A request with no `osu-token` header is a login attempt (see §4.2's
//! [`crate::session::SessionRegistry::login`]); one bearing a token is a
//! batch of packets to decode and dispatch, with the session's queued
//! outbound bytes returned as the response body. A separate route handles
//! the (unrelated, multipart) score-submission upload.

use crate::codec::opcodes::{ClientOpcode, ServerOpcode};
use crate::codec::types::{ChannelInfo, Decode, Encode, I32List16, MatchData, MatchTeam, Message, Mods, SlotStatusBits};
use crate::codec::{read_string, Packet, PacketCodec};
use crate::database::interface::{friendships, mail, users};
use crate::multiplayer::{MatchRef, PlayOutcome, SLOT_COUNT};
use crate::presence;
use crate::score::{self, SubmissionContext, SubmissionRequest};
use crate::session::{ClientHashBundle, LoginCredentials, SessionRef, BOT_ID, BOT_NAME};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{ConnectInfo, Extension, Multipart};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bytes::{Buf, Bytes, BytesMut};
use log::{debug, warn};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::codec::Decoder;

/// Protocol version advertised at login. Old enough to be accepted by every
/// client this server's minimum build date already admits, new enough to
/// unlock the packets this gateway actually sends.
const PROTOCOL_VERSION: i32 = 19;

/// Longest chat message body forwarded as-is; longer bodies are truncated
/// per §8 and the sender is notified.
const MAX_MESSAGE_LEN: usize = 2000;
const MESSAGE_TRUNCATION_SUFFIX: &str = "... (message truncated)";

/// Truncates `body` to [`MAX_MESSAGE_LEN`] characters, appending a suffix,
/// if it's over the limit. Counts by char, not byte, so multi-byte UTF-8
/// isn't split mid-codepoint.
fn truncate_message(body: String) -> (String, bool) {
    if body.chars().count() <= MAX_MESSAGE_LEN {
        return (body, false);
    }
    let keep = MAX_MESSAGE_LEN.saturating_sub(MESSAGE_TRUNCATION_SUFFIX.chars().count());
    let mut truncated: String = body.chars().take(keep).collect();
    truncated.push_str(MESSAGE_TRUNCATION_SUFFIX);
    (truncated, true)
}

/// Queues a notice to `session` that their last message was truncated.
fn notify_truncated(session: &SessionRef) {
    session.queue(&encode_packet(
        ServerOpcode::Notification,
        &"Your message was too long and has been truncated.".to_string(),
    ));
}

/// Builds the axum router for the two HTTP surfaces this server exposes.
pub fn router() -> Router {
    Router::new()
        .route("/", post(handle).get(|| async { "bancho-relay" }))
        .route("/web/osu-submit-modular-selector.php", post(handle_score_submission))
}

fn encode_packet<T: Encode>(opcode: impl Into<u16>, value: &T) -> Bytes {
    let mut buf = BytesMut::new();
    Packet::encode_new(opcode, value).write(&mut buf);
    buf.freeze()
}

fn empty_packet(opcode: impl Into<u16>) -> Bytes {
    let mut buf = BytesMut::new();
    Packet::empty(opcode).write(&mut buf);
    buf.freeze()
}

fn verbatim_packet(opcode: impl Into<u16>, contents: &Bytes) -> Bytes {
    let mut buf = BytesMut::new();
    Packet::new(opcode, contents.clone()).write(&mut buf);
    buf.freeze()
}

fn packets_response(token: Option<&str>, body: Bytes) -> Response {
    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(token) = token {
        builder = builder.header("cho-token", token);
    }
    builder.body(Body::from(body)).unwrap_or_default()
}

fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers.get("osu-token").and_then(|v| v.to_str().ok())
}

/// Parses the login body's three newline-separated fields: username,
/// md5 password, and a pipe-delimited metadata line (build date, utc offset,
/// display-city flag, colon-separated hardware-hash bundle, private-dm flag).
fn parse_login_body(body: &[u8], client_ip: IpAddr) -> Option<LoginCredentials> {
    let text = std::str::from_utf8(body).ok()?;
    let mut lines = text.split('\n');
    let username = lines.next()?.trim().to_string();
    let md5_password = lines.next()?.trim().to_string();
    let info = lines.next()?.trim();

    let parts: Vec<&str> = info.split('|').collect();
    if parts.len() < 5 {
        return None;
    }
    let client_build_date = parts[0].to_string();
    let utc_offset: i32 = parts[1].parse().ok()?;
    let display_city = parts[2] == "1";

    let hash_parts: Vec<&str> = parts[3].split(':').collect();
    if hash_parts.len() < 5 {
        return None;
    }
    let hashes = ClientHashBundle {
        osu_path_md5: hash_parts[0].to_string(),
        adapters: hash_parts[1].to_string(),
        adapters_md5: hash_parts[2].to_string(),
        uninstall_md5: hash_parts[3].to_string(),
        disk_serial_md5: hash_parts[4].to_string(),
    };
    let private_dm = parts[4] == "1";

    if username.is_empty() || md5_password.is_empty() {
        return None;
    }

    Some(LoginCredentials {
        username,
        md5_password,
        client_build_date,
        utc_offset,
        display_city,
        hashes,
        private_dm,
        client_ip,
    })
}

async fn handle(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match header_token(&headers) {
        None => handle_login(&state, addr.ip(), &body).await,
        Some(token) => match state.sessions.lookup_by_token(token) {
            None => restart_response(),
            Some(session) => handle_authenticated(&state, &session, &body).await,
        },
    }
}

fn restart_response() -> Response {
    let mut buf = BytesMut::new();
    Packet::encode_new(
        ServerOpcode::Notification,
        &"Server has restarted, please log in again.".to_string(),
    )
    .write(&mut buf);
    Packet::encode_new(ServerOpcode::Restart, &0i32).write(&mut buf);
    packets_response(None, buf.freeze())
}

async fn handle_login(state: &AppState, client_ip: IpAddr, body: &[u8]) -> Response {
    let Some(creds) = parse_login_body(body, client_ip) else {
        return packets_response(
            None,
            encode_packet(ServerOpcode::UserId, &crate::session::LoginRejection::GenericError.code()),
        );
    };

    match state
        .sessions
        .login(
            &state.db,
            &state.bcrypt_cache,
            &state.config.gateway.min_client_build_date,
            state.config.gateway.ghost_reclaim_silence_secs,
            creds,
        )
        .await
    {
        Ok(session) => {
            if let Ok(friends) = friendships::list(&state.db, session.id).await {
                *session.friends.write() = friends.into_iter().collect();
            }
            let mut body = BytesMut::from(&build_login_success_body(state, &session)[..]);
            body.extend_from_slice(&deliver_mail(state, &session).await);
            packets_response(Some(&session.token), body.freeze())
        }
        Err(rejection) => packets_response(None, encode_packet(ServerOpcode::UserId, &rejection.code())),
    }
}

/// Delivers any mail queued for `session` while they were offline, as
/// ordinary chat messages from whoever sent them, then marks it read.
async fn deliver_mail(state: &AppState, session: &SessionRef) -> Bytes {
    let Ok(unread) = mail::unread_for(&state.db, session.id).await else {
        return Bytes::new();
    };
    if unread.is_empty() {
        return Bytes::new();
    }
    let mut buf = BytesMut::new();
    for entry in &unread {
        let sender_name = match users::find_by_id(&state.db, entry.from_id).await {
            Ok(Some(sender)) => sender.name,
            _ => "unknown".to_string(),
        };
        Packet::encode_new(
            ServerOpcode::SendMessage,
            &Message {
                sender: sender_name,
                body: entry.msg.clone(),
                recipient: session.name.clone(),
                sender_id: entry.from_id,
            },
        )
        .write(&mut buf);
    }
    let _ = mail::mark_all_read(&state.db, session.id).await;
    buf.freeze()
}

fn build_login_success_body(state: &AppState, session: &SessionRef) -> Bytes {
    let mut buf = BytesMut::new();
    Packet::encode_new(ServerOpcode::UserId, &session.id).write(&mut buf);
    Packet::encode_new(ServerOpcode::ProtocolVersion, &PROTOCOL_VERSION).write(&mut buf);
    Packet::encode_new(
        ServerOpcode::Privileges,
        &(presence::privilege_byte(session.privileges()) as i32),
    )
    .write(&mut buf);
    Packet::encode_new(
        ServerOpcode::Notification,
        &format!("Welcome, {}!", session.name),
    )
    .write(&mut buf);

    let visible = state.channels.visible_to(session);
    for channel in &visible {
        Packet::encode_new(
            ServerOpcode::ChannelInfo,
            &ChannelInfo {
                name: channel.name.clone(),
                topic: channel.topic.read().clone(),
                member_count: channel.member_count(),
            },
        )
        .write(&mut buf);
    }
    Packet::empty(ServerOpcode::ChannelInfoEnd).write(&mut buf);

    for channel in &visible {
        if channel.auto_join {
            let _ = state.channels.join(channel, session);
            Packet::encode_new(ServerOpcode::ChannelAutoJoin, &channel.name.clone()).write(&mut buf);
        }
    }

    let friends: Vec<i32> = session.friends.read().iter().copied().collect();
    Packet::encode_new(ServerOpcode::FriendsList, &I32List16(friends)).write(&mut buf);

    let remaining_silence = (session.silence_end() - chrono::Utc::now().timestamp()).max(0) as i32;
    Packet::encode_new(ServerOpcode::SilenceEnd, &remaining_silence).write(&mut buf);

    let (stats, presence_pkt) = presence::stats_and_presence(session, &state.bot_presence);
    buf.extend_from_slice(&stats);
    buf.extend_from_slice(&presence_pkt);

    for other in state.sessions.all() {
        if other.id == session.id {
            continue;
        }
        let (stats, presence_pkt) = presence::stats_and_presence(&other, &state.bot_presence);
        buf.extend_from_slice(&stats);
        buf.extend_from_slice(&presence_pkt);
    }

    buf.freeze()
}

async fn handle_authenticated(state: &Arc<AppState>, session: &SessionRef, body: &Bytes) -> Response {
    session.touch_received();
    let mut buf = BytesMut::from(&body[..]);
    let mut codec = PacketCodec;
    loop {
        match codec.decode(&mut buf) {
            Ok(Some(packet)) => dispatch(state, session, packet).await,
            Ok(None) => break,
            Err(err) => {
                warn!("malformed packet from {}: {}", session.name, err);
                break;
            }
        }
    }
    packets_response(None, session.drain_outbound())
}

async fn dispatch(state: &Arc<AppState>, session: &SessionRef, packet: Packet) {
    let Some(opcode) = ClientOpcode::from_u16(packet.opcode) else {
        debug!("ignoring unknown opcode {}", packet.opcode);
        return;
    };
    let mut payload = packet.contents.clone();
    match opcode {
        ClientOpcode::ChangeAction => {
            if handle_change_action(session, &mut payload).is_some() {
                presence::broadcast_stats(&state.sessions, session);
            }
        }
        ClientOpcode::Logout => handle_logout(state, session).await,
        ClientOpcode::RequestStatusUpdate => session.queue(&presence::stats_packet(session)),
        ClientOpcode::Ping => {}
        ClientOpcode::SendPublicMessage => handle_public_message(state, session, &mut payload),
        ClientOpcode::SendPrivateMessage => handle_private_message(state, session, &mut payload).await,
        ClientOpcode::ChannelJoin => handle_channel_join(state, session, &mut payload),
        ClientOpcode::ChannelPart => handle_channel_part(state, session, &mut payload),
        ClientOpcode::StartSpectating => handle_start_spectating(state, session, &mut payload),
        ClientOpcode::StopSpectating => handle_stop_spectating(state, session),
        ClientOpcode::SpectateFrames => {
            presence::forward_spectator_frames(&state.sessions, &session.spectators.read(), &packet.contents)
        }
        ClientOpcode::CantSpectate => handle_cant_spectate(session),
        ClientOpcode::UserStatsRequest => handle_user_stats_request(state, session, &mut payload),
        ClientOpcode::UserPresenceRequest => handle_user_presence_request(state, session, &mut payload),
        ClientOpcode::UserPresenceRequestAll => handle_presence_request_all(state, session),
        ClientOpcode::FriendAdd => handle_friend_add(state, session, &mut payload).await,
        ClientOpcode::FriendRemove => handle_friend_remove(state, session, &mut payload).await,
        ClientOpcode::ToggleBlockNonFriendDms => handle_toggle_block_dms(state, session, &mut payload).await,
        ClientOpcode::PartLobby => {
            if let Some(lobby) = state.channels.get("#lobby") {
                state.channels.leave(&lobby, session);
            }
        }
        ClientOpcode::JoinLobby => handle_join_lobby(state, session),
        ClientOpcode::CreateMatch => handle_create_match(state, session, &mut payload),
        ClientOpcode::JoinMatch => handle_join_match(state, session, &mut payload),
        ClientOpcode::PartMatch => {
            if let Some(m) = with_current_match(session) {
                leave_match(state, session, &m);
            }
        }
        ClientOpcode::MatchChangeSlot => handle_match_change_slot(session, &mut payload).map(|m| broadcast_match_update(state, &m)).unwrap_or(()),
        ClientOpcode::MatchReady => simple_match_mutation(state, session, |m| m.ready(session.id).is_ok()),
        ClientOpcode::MatchNotReady => simple_match_mutation(state, session, |m| m.unready(session.id).is_ok()),
        ClientOpcode::MatchLock => handle_match_lock(state, session, &mut payload),
        ClientOpcode::MatchChangeSettings => handle_match_change_settings(state, session, &mut payload),
        ClientOpcode::MatchStart => simple_match_mutation(state, session, |m| m.start(Some(session.id)).is_ok()),
        ClientOpcode::MatchAbort => simple_match_mutation(state, session, |m| m.abort().is_ok()),
        ClientOpcode::MatchScoreUpdate => handle_match_score_update(session, &packet.contents),
        ClientOpcode::MatchComplete => handle_match_finish(state, session, PlayOutcome::Complete),
        ClientOpcode::MatchChangeMods => handle_match_change_mods(state, session, &mut payload),
        ClientOpcode::MatchLoadComplete => handle_match_load_complete(session),
        ClientOpcode::MatchNoBeatmap => handle_match_beatmap_availability(state, session, false),
        ClientOpcode::MatchFailed => handle_match_finish(state, session, PlayOutcome::Failed),
        ClientOpcode::MatchHasBeatmap => handle_match_beatmap_availability(state, session, true),
        ClientOpcode::MatchSkipRequest => handle_match_skip(session),
        ClientOpcode::MatchTransferHost => handle_match_transfer_host(state, session, &mut payload),
        ClientOpcode::MatchChangeTeam => handle_match_change_team(state, session),
        ClientOpcode::MatchChangePassword => handle_match_change_password(state, session, &mut payload),
        ClientOpcode::MatchInvite => handle_match_invite(state, session, &mut payload),
        other => debug!("no-op opcode {:?} from {}", other, session.name),
    }
}

fn with_current_match(session: &SessionRef) -> Option<MatchRef> {
    session.current_match.read().clone()?.upgrade()
}

/// Runs `mutate` against the session's current match (if any) and, when it
/// reports a change, broadcasts the resulting match state to every member.
/// Covers the handful of opcodes whose only effect is a single state-machine
/// transition with no extra payload to decode.
fn simple_match_mutation(state: &AppState, session: &SessionRef, mutate: impl FnOnce(&mut crate::multiplayer::Match) -> bool) {
    let Some(m) = with_current_match(session) else { return };
    let changed = mutate(&mut m.lock());
    if changed {
        broadcast_match_update(state, &m);
    }
}

/// Sends each match member the room snapshot, masking the password for
/// everyone but the host and any referees.
fn broadcast_match_update(state: &AppState, m: &MatchRef) {
    let (members, full_bytes, masked_bytes) = {
        let guard = m.lock();
        let members = guard.member_sessions();
        let host = guard.host;
        let referees = guard.referees.clone();
        let full_bytes = encode_packet(ServerOpcode::UpdateMatch, &guard.to_wire(true));
        let masked_bytes = encode_packet(ServerOpcode::UpdateMatch, &guard.to_wire(false));
        (
            members
                .into_iter()
                .map(|s| (s.clone(), host == Some(s.id) || referees.contains(&s.id)))
                .collect::<Vec<_>>(),
            full_bytes,
            masked_bytes,
        )
    };
    for (member, full) in &members {
        member.queue(if *full { &full_bytes } else { &masked_bytes });
    }
    if let Some(lobby) = state.channels.get("#lobby") {
        for session in lobby.members() {
            if !members.iter().any(|(m, _)| m.id == session.id) {
                session.queue(&masked_bytes);
            }
        }
    }
}

fn broadcast_to_match(m: &MatchRef, bytes: &Bytes) {
    for member in m.lock().member_sessions() {
        member.queue(bytes);
    }
}

fn broadcast_to_lobby(state: &AppState, bytes: &Bytes) {
    if let Some(lobby) = state.channels.get("#lobby") {
        for session in lobby.members() {
            session.queue(bytes);
        }
    }
}

fn announce_new_match(state: &AppState, m: &MatchRef) {
    let data = m.lock().to_wire(false);
    broadcast_to_lobby(state, &encode_packet(ServerOpcode::NewMatch, &data));
}

/// Registers `session` as a member of the match's dedicated channel and
/// sends the join-success packet bearing the full (unmasked) room state.
fn join_match_channel_and_notify(state: &AppState, session: &SessionRef, m: &MatchRef) {
    let (channel_name, match_data) = {
        let guard = m.lock();
        (guard.channel_name.clone(), guard.to_wire(true))
    };
    let _ = state
        .channels
        .join_or_create_instance(channel_name.clone(), channel_name, session);
    *session.current_match.write() = Some(Arc::downgrade(m));
    session.queue(&encode_packet(ServerOpcode::MatchJoinSuccess, &match_data));
    broadcast_match_update(state, m);
}

/// Removes `session` from its match, finishing an in-progress play as a quit
/// first so score tallying and `MatchComplete` still fire for anyone left.
fn leave_match(state: &AppState, session: &SessionRef, m: &MatchRef) {
    let completed_data = {
        let mut guard = m.lock();
        if guard.in_progress {
            let _ = guard.finish_play(session.id, PlayOutcome::Quit);
            if guard.all_finished() {
                let _ = guard.complete(|m| m.tally_by_score());
                Some(guard.to_wire(true))
            } else {
                None
            }
        } else {
            None
        }
    };
    if let Some(data) = completed_data {
        broadcast_to_match(m, &encode_packet(ServerOpcode::MatchComplete, &data));
    }

    let (emptied, match_id, channel_name) = {
        let mut guard = m.lock();
        let emptied = guard.leave(session.id).unwrap_or(true);
        (emptied, guard.id, guard.channel_name.clone())
    };
    *session.current_match.write() = None;
    if let Some(channel) = state.channels.get(&channel_name) {
        state.channels.leave(&channel, session);
    }
    if emptied {
        state.matches.remove(match_id);
        let dispose = encode_packet(ServerOpcode::DisposeMatch, &(match_id as i32));
        broadcast_to_lobby(state, &dispose);
    } else {
        broadcast_match_update(state, m);
    }
}

fn handle_change_action(session: &SessionRef, payload: &mut Bytes) -> Option<()> {
    if payload.remaining() < 1 {
        return None;
    }
    let action = payload.get_u8();
    let info_text = read_string(payload).ok()?;
    let map_md5 = read_string(payload).ok()?;
    if payload.remaining() < 4 {
        return None;
    }
    let mods = Mods::from_bits_truncate(payload.get_u32_le());
    if payload.remaining() < 1 {
        return None;
    }
    let mode = payload.get_u8();
    if payload.remaining() < 4 {
        return None;
    }
    let _map_id = payload.get_i32_le();
    *session.status.write() = crate::session::SessionStatus {
        action,
        info_text,
        map_md5,
        mods,
        mode,
    };
    Some(())
}

fn handle_public_message(state: &Arc<AppState>, session: &SessionRef, payload: &mut Bytes) {
    if session.is_silenced() {
        return;
    }
    let Ok(msg) = Message::decode(payload) else { return };
    if handle_mp_command(state, session, &msg.body) {
        return;
    }
    let Some(channel) = state.channels.get(&msg.recipient) else { return };
    let (body, truncated) = truncate_message(msg.body);
    if truncated {
        notify_truncated(session);
    }
    let bytes = encode_packet(
        ServerOpcode::SendMessage,
        &Message {
            sender: session.name.clone(),
            body,
            recipient: msg.recipient,
            sender_id: session.id,
        },
    );
    let _ = channel.send(session, &bytes);
}

/// Parses and runs `!mp` room-management commands, the only way clients
/// reach the scrim/mappool overlays (there is no dedicated wire opcode for
/// them). Returns whether `body` was consumed as a command.
fn handle_mp_command(state: &Arc<AppState>, session: &SessionRef, body: &str) -> bool {
    let Some(rest) = body.strip_prefix("!mp ") else { return false };
    let Some(m) = with_current_match(session) else { return true };
    let mut parts = rest.split_whitespace();
    match parts.next() {
        Some("scrim") => {
            if let Some(n) = parts.next().and_then(|s| s.parse::<u8>().ok()) {
                let _ = m.lock().enable_scrim(n);
                broadcast_match_update(state, &m);
            }
        }
        Some("noscrim") => {
            m.lock().disable_scrim();
            broadcast_match_update(state, &m);
        }
        Some("rematch") => {
            m.lock().rematch();
            broadcast_match_update(state, &m);
        }
        Some("pick") => {
            let mods = parts.next().and_then(|s| s.parse::<u32>().ok()).unwrap_or(0);
            let slot = parts.next().and_then(|s| s.parse::<u8>().ok()).unwrap_or(0);
            let _ = m.lock().pick(Mods::from_bits_truncate(mods), slot);
            broadcast_match_update(state, &m);
        }
        Some("start") => {
            if let Some(secs) = parts.next().and_then(|s| s.parse::<u32>().ok()) {
                start_match_timer(state, session, &m, secs);
            }
        }
        _ => {}
    }
    true
}

/// Seconds-remaining marks that get a countdown alert in chat.
const START_TIMER_ALERTS: &[u32] = &[60, 30, 10, 5, 4, 3, 2, 1];

/// Starts a revocable, alerted countdown to match start, per §5/§8. Rejects
/// a duration outside (0, 300] and anyone but the host, without touching
/// match state. Superseded by an immediate `MatchStart` or cancelled by
/// `MatchAbort`/room teardown, both of which go through
/// `Match::abort_start_timer`.
fn start_match_timer(state: &Arc<AppState>, session: &SessionRef, m: &MatchRef, secs: u32) {
    if !(1..=300).contains(&secs) {
        return;
    }
    let mut guard = m.lock();
    if !guard.is_host(session.id) || guard.in_progress {
        return;
    }
    let channel_name = guard.channel_name.clone();
    let state = Arc::clone(state);
    let task_m = Arc::clone(m);
    let handle = tokio::spawn(run_match_start_timer(state, task_m, secs));
    guard.set_start_timer(handle);
    drop(guard);
    broadcast_to_match(m, &match_bot_message(&channel_name, format!("Match starts in {secs} seconds.")));
}

fn match_bot_message(channel_name: &str, body: String) -> Bytes {
    encode_packet(
        ServerOpcode::SendMessage,
        &Message {
            sender: BOT_NAME.to_string(),
            body,
            recipient: channel_name.to_string(),
            sender_id: BOT_ID,
        },
    )
}

/// Counts down `secs`, posting alerts at [`START_TIMER_ALERTS`] marks, then
/// starts the match. Runs to completion unless the `JoinHandle` this was
/// spawned under is aborted (host cancel, match abort, or room teardown).
async fn run_match_start_timer(state: Arc<AppState>, m: MatchRef, secs: u32) {
    let channel_name = m.lock().channel_name.clone();
    let mut remaining = secs;
    while remaining > 0 {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        remaining -= 1;
        if START_TIMER_ALERTS.contains(&remaining) {
            broadcast_to_match(&m, &match_bot_message(&channel_name, format!("Match starts in {remaining} seconds.")));
        }
    }
    let started = m.lock().start(None).is_ok();
    if started {
        broadcast_match_update(&state, &m);
    }
}

async fn handle_private_message(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    if session.is_silenced() {
        return;
    }
    let Ok(msg) = Message::decode(payload) else { return };
    let (body, truncated) = truncate_message(msg.body);
    if truncated {
        notify_truncated(session);
    }
    let Some(target) = state.sessions.lookup_by_name(&msg.recipient) else {
        // Recipient isn't online: queue as mail, delivered at their next login.
        if let Ok(Some(recipient)) = users::find_by_name(&state.db, &msg.recipient).await {
            let _ = mail::queue(&state.db, session.id, recipient.id, body).await;
        }
        return;
    };
    if !target.is_bot() && target.block_non_friend_dms() && !target.friends.read().contains(&session.id) {
        let bytes = encode_packet(
            ServerOpcode::UserDmBlocked,
            &Message {
                sender: target.name.clone(),
                body: String::new(),
                recipient: session.name.clone(),
                sender_id: target.id,
            },
        );
        session.queue(&bytes);
        return;
    }
    let bytes = encode_packet(
        ServerOpcode::SendMessage,
        &Message {
            sender: session.name.clone(),
            body,
            recipient: msg.recipient,
            sender_id: session.id,
        },
    );
    target.queue(&bytes);
}

fn handle_channel_join(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(name) = read_string(payload) else { return };
    let Some(channel) = state.channels.get(&name) else { return };
    if state.channels.join(&channel, session).is_ok() {
        session.queue(&encode_packet(ServerOpcode::ChannelJoinSuccess, &name));
    }
}

fn handle_channel_part(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(name) = read_string(payload) else { return };
    if let Some(channel) = state.channels.get(&name) {
        state.channels.leave(&channel, session);
    }
}

fn handle_start_spectating(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(target_id) = i32::decode(payload) else { return };
    let Some(target) = state.sessions.lookup_by_id(target_id) else { return };
    *session.spectating.write() = Some(Arc::downgrade(&target));
    target.spectators.write().insert(session.id);

    let channel_name = format!("#spect_{}", target.id);
    let channel = state
        .channels
        .join_or_create_instance(channel_name.clone(), channel_name, session);
    target.queue(&encode_packet(ServerOpcode::SpectatorJoined, &session.id));
    let joined = encode_packet(ServerOpcode::FellowSpectatorJoined, &session.id);
    for fellow in channel.members() {
        if fellow.id != session.id {
            fellow.queue(&joined);
        }
    }
}

fn handle_stop_spectating(state: &AppState, session: &SessionRef) {
    let Some(target) = session.spectating.write().take().and_then(|w| w.upgrade()) else { return };
    target.spectators.write().remove(&session.id);
    target.queue(&encode_packet(ServerOpcode::SpectatorLeft, &session.id));

    let channel_name = format!("#spect_{}", target.id);
    if let Some(channel) = state.channels.get(&channel_name) {
        let left = encode_packet(ServerOpcode::FellowSpectatorLeft, &session.id);
        for fellow in channel.members() {
            if fellow.id != session.id {
                fellow.queue(&left);
            }
        }
        state.channels.leave(&channel, session);
    }
}

fn handle_cant_spectate(session: &SessionRef) {
    let Some(target) = session.spectating.read().clone().and_then(|w| w.upgrade()) else { return };
    let bytes = encode_packet(ServerOpcode::SpectatorCantSpectate, &session.id);
    target.queue(&bytes);
    let channel_name = format!("#spect_{}", target.id);
    let _ = channel_name;
}

fn handle_user_stats_request(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(ids) = I32List16::decode(payload) else { return };
    for id in ids.0 {
        if let Some(target) = state.sessions.lookup_by_id(id) {
            let bytes = if target.is_bot() {
                state.bot_presence.stats(&target)
            } else {
                presence::stats_packet(&target)
            };
            session.queue(&bytes);
        }
    }
}

fn handle_user_presence_request(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(ids) = I32List16::decode(payload) else { return };
    for id in ids.0 {
        if let Some(target) = state.sessions.lookup_by_id(id) {
            let bytes = if target.is_bot() {
                state.bot_presence.presence(&target)
            } else {
                presence::presence_packet(&target)
            };
            session.queue(&bytes);
        }
    }
}

fn handle_presence_request_all(state: &AppState, session: &SessionRef) {
    for target in state.sessions.all() {
        if target.id == session.id {
            continue;
        }
        let bytes = if target.is_bot() {
            state.bot_presence.presence(&target)
        } else {
            presence::presence_packet(&target)
        };
        session.queue(&bytes);
    }
}

async fn handle_friend_add(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(target_id) = i32::decode(payload) else { return };
    if friendships::add(&state.db, session.id, target_id).await.is_ok() {
        session.friends.write().insert(target_id);
    }
}

async fn handle_friend_remove(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(target_id) = i32::decode(payload) else { return };
    if friendships::remove(&state.db, session.id, target_id).await.is_ok() {
        session.friends.write().remove(&target_id);
    }
}

async fn handle_toggle_block_dms(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(flag) = i32::decode(payload) else { return };
    let value = flag != 0;
    session.set_block_non_friend_dms(value);
    if let Ok(Some(user)) = users::find_by_id(&state.db, session.id).await {
        let _ = users::set_block_non_friend_dms(&state.db, user, value).await;
    }
}

async fn handle_logout(state: &AppState, session: &SessionRef) {
    if let Some(m) = with_current_match(session) {
        leave_match(state, session, &m);
    }
    for name in session.channels.read().clone() {
        if let Some(channel) = state.channels.get(&name) {
            state.channels.leave(&channel, session);
        }
    }
    handle_stop_spectating(state, session);
    state.sessions.remove(session);
    presence::broadcast_logout(&state.sessions, session.id);
}

fn handle_join_lobby(state: &AppState, session: &SessionRef) {
    if let Some(lobby) = state.channels.get("#lobby") {
        let _ = state.channels.join(&lobby, session);
    }
    for m in state.matches.all() {
        let data = m.lock().to_wire(false);
        session.queue(&encode_packet(ServerOpcode::NewMatch, &data));
    }
}

fn handle_create_match(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(data) = MatchData::decode(payload) else { return };
    match state.matches.create(data.name.clone(), None, session) {
        Ok(m) => {
            {
                let mut guard = m.lock();
                guard.password = data.password;
                guard.mode = data.mode;
                guard.team_type = data.team_type;
                guard.win_condition = data.win_condition;
            }
            join_match_channel_and_notify(state, session, &m);
            announce_new_match(state, &m);
        }
        Err(_) => session.queue(&empty_packet(ServerOpcode::MatchJoinFail)),
    }
}

fn handle_join_match(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(match_id) = i32::decode(payload) else { return };
    let password = read_string(payload).ok();
    let Some(m) = state.matches.get(match_id as usize) else {
        session.queue(&empty_packet(ServerOpcode::MatchJoinFail));
        return;
    };
    let result = m.lock().join(session, password.as_deref().filter(|p| !p.is_empty()));
    match result {
        Ok(_) => join_match_channel_and_notify(state, session, &m),
        Err(_) => session.queue(&empty_packet(ServerOpcode::MatchJoinFail)),
    }
}

fn handle_match_change_slot(session: &SessionRef, payload: &mut Bytes) -> Option<MatchRef> {
    let target_slot = i32::decode(payload).ok()? as usize;
    let m = with_current_match(session)?;
    {
        let mut guard = m.lock();
        let current = guard.slots.iter().position(|s| s.session_id() == Some(session.id))?;
        if target_slot >= SLOT_COUNT || guard.slots[target_slot].status.has_player() {
            return None;
        }
        guard.slots.swap(current, target_slot);
    }
    Some(m)
}

fn handle_match_lock(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(slot_idx) = i32::decode(payload) else { return };
    let Some(m) = with_current_match(session) else { return };
    {
        let mut guard = m.lock();
        if !guard.is_host(session.id) {
            return;
        }
        let idx = slot_idx as usize;
        if idx >= SLOT_COUNT {
            return;
        }
        if guard.slots[idx].status.has_player() {
            guard.slots[idx] = Default::default();
            guard.slots[idx].status = SlotStatusBits::LOCKED;
        } else if guard.slots[idx].status == SlotStatusBits::LOCKED {
            guard.slots[idx].status = SlotStatusBits::OPEN;
        } else {
            guard.slots[idx].status = SlotStatusBits::LOCKED;
        }
    }
    broadcast_match_update(state, &m);
}

fn handle_match_change_settings(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(data) = MatchData::decode(payload) else { return };
    let Some(m) = with_current_match(session) else { return };
    {
        let mut guard = m.lock();
        if !guard.is_host(session.id) {
            return;
        }
        guard.name = data.name;
        guard.password = data.password;
        guard.team_type = data.team_type;
        guard.win_condition = data.win_condition;
        let new_map = crate::multiplayer::MatchMap {
            id: data.map_id,
            md5: data.map_md5,
            name: data.map_name,
        };
        let _ = guard.change_map(session.id, new_map, data.mode);
    }
    broadcast_match_update(state, &m);
}

fn handle_match_change_mods(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(bits) = u32::decode(payload) else { return };
    let Some(m) = with_current_match(session) else { return };
    let _ = m.lock().change_mods(session.id, Mods::from_bits_truncate(bits));
    broadcast_match_update(state, &m);
}

fn handle_match_score_update(session: &SessionRef, raw: &Bytes) {
    let Some(m) = with_current_match(session) else { return };
    if let Ok(frame) = crate::codec::types::ScoreFrame::decode(&mut raw.clone()) {
        let mut guard = m.lock();
        if let Some(slot) = guard.slots.iter_mut().find(|s| s.session_id() == Some(session.id)) {
            slot.last_score = frame.total_score as i64;
        }
    }
    let bytes = verbatim_packet(ServerOpcode::MatchScoreUpdate, raw);
    for member in m.lock().member_sessions() {
        if member.id != session.id {
            member.queue(&bytes);
        }
    }
}

fn handle_match_finish(state: &AppState, session: &SessionRef, outcome: PlayOutcome) {
    let Some(m) = with_current_match(session) else { return };
    let (failed_notice, complete_data) = {
        let mut guard = m.lock();
        if guard.finish_play(session.id, outcome).is_err() {
            return;
        }
        let failed_notice = matches!(outcome, PlayOutcome::Failed);
        let complete_data = if guard.all_finished() {
            let _ = guard.complete(|m| m.tally_by_score());
            Some(guard.to_wire(true))
        } else {
            None
        };
        (failed_notice, complete_data)
    };
    if failed_notice {
        broadcast_to_match(&m, &encode_packet(ServerOpcode::MatchPlayerFailed, &session.id));
    }
    if let Some(data) = complete_data {
        broadcast_to_match(&m, &encode_packet(ServerOpcode::MatchComplete, &data));
        broadcast_match_update(state, &m);
    }
}

fn handle_match_load_complete(session: &SessionRef) {
    let Some(m) = with_current_match(session) else { return };
    let all_loaded = {
        let mut guard = m.lock();
        if let Some(slot) = guard.slots.iter_mut().find(|s| s.session_id() == Some(session.id)) {
            slot.loaded = true;
        }
        guard.slots.iter().all(|s| !s.status.has_player() || s.loaded)
    };
    if all_loaded {
        broadcast_to_match(&m, &empty_packet(ServerOpcode::MatchAllPlayersLoaded));
    }
}

fn handle_match_beatmap_availability(state: &AppState, session: &SessionRef, has_map: bool) {
    let Some(m) = with_current_match(session) else { return };
    {
        let mut guard = m.lock();
        if let Some(slot) = guard.slots.iter_mut().find(|s| s.session_id() == Some(session.id)) {
            slot.status = if has_map {
                SlotStatusBits::NOT_READY
            } else {
                SlotStatusBits::NO_MAP
            };
        }
    }
    broadcast_match_update(state, &m);
}

fn handle_match_skip(session: &SessionRef) {
    let Some(m) = with_current_match(session) else { return };
    let all_skipped = {
        let mut guard = m.lock();
        if let Some(slot) = guard.slots.iter_mut().find(|s| s.session_id() == Some(session.id)) {
            slot.skipped = true;
        }
        guard.slots.iter().all(|s| !s.status.has_player() || s.skipped)
    };
    broadcast_to_match(&m, &encode_packet(ServerOpcode::MatchPlayerSkipped, &session.id));
    if all_skipped {
        broadcast_to_match(&m, &empty_packet(ServerOpcode::MatchSkip));
    }
}

fn handle_match_transfer_host(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(slot_idx) = i32::decode(payload) else { return };
    let Some(m) = with_current_match(session) else { return };
    {
        let mut guard = m.lock();
        let idx = slot_idx as usize;
        if idx >= SLOT_COUNT {
            return;
        }
        let Some(target_id) = guard.slots[idx].session_id() else { return };
        let _ = guard.transfer_host(session.id, target_id);
    }
    broadcast_match_update(state, &m);
}

fn handle_match_change_team(state: &AppState, session: &SessionRef) {
    let Some(m) = with_current_match(session) else { return };
    {
        let mut guard = m.lock();
        if let Some(slot) = guard.slots.iter_mut().find(|s| s.session_id() == Some(session.id)) {
            slot.team = match slot.team {
                MatchTeam::Red => MatchTeam::Blue,
                _ => MatchTeam::Red,
            };
        }
    }
    broadcast_match_update(state, &m);
}

fn handle_match_change_password(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(data) = MatchData::decode(payload) else { return };
    let Some(m) = with_current_match(session) else { return };
    {
        let mut guard = m.lock();
        if !guard.is_host(session.id) {
            return;
        }
        guard.password = data.password;
    }
    broadcast_match_update(state, &m);
}

fn handle_match_invite(state: &AppState, session: &SessionRef, payload: &mut Bytes) {
    let Ok(target_id) = i32::decode(payload) else { return };
    let Some(target) = state.sessions.lookup_by_id(target_id) else { return };
    let Some(m) = with_current_match(session) else { return };
    let (match_id, name, password) = {
        let guard = m.lock();
        (guard.id, guard.name.clone(), guard.password.clone())
    };
    let link = match password {
        Some(pw) => format!("[osump://{match_id}/{pw} {name}]"),
        None => format!("[osump://{match_id}/ {name}]"),
    };
    let bytes = encode_packet(
        ServerOpcode::MatchInvite,
        &Message {
            sender: session.name.clone(),
            body: format!("Come join my multiplayer match: {link}"),
            recipient: target.name.clone(),
            sender_id: session.id,
        },
    );
    target.queue(&bytes);
}

/// Periodically evicts sessions that haven't sent a request within the
/// configured idle timeout, in case the client disappeared without a clean
/// logout (crash, network drop).
pub fn spawn_idle_sweeper(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.gateway.idle_sweep_interval_secs);
    let timeout = Duration::from_secs(state.config.gateway.idle_timeout_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for session in state.sessions.all() {
                if session.is_bot() || session.idle_for() <= timeout {
                    continue;
                }
                if let Some(m) = with_current_match(&session) {
                    leave_match(&state, &session, &m);
                }
                for name in session.channels.read().clone() {
                    if let Some(channel) = state.channels.get(&name) {
                        state.channels.leave(&channel, &session);
                    }
                }
                handle_stop_spectating(&state, &session);
                state.sessions.remove(&session);
                presence::broadcast_logout(&state.sessions, session.id);
                log::info!("evicted idle session {}", session.name);
            }
        }
    });
}

/// Handles the legacy `osu-submit-modular-selector.php` multipart upload.
/// Field names follow the client's historical form encoding.
async fn handle_score_submission(Extension(state): Extension<Arc<AppState>>, mut multipart: Multipart) -> impl IntoResponse {
    let mut username = None;
    let mut md5_password = None;
    let mut client_build_date = None;
    let mut score_data_b64 = None;
    let mut iv_b64 = None;
    let mut exited_out = false;
    let mut storyboard = false;
    let mut time_elapsed_secs = 0i32;
    let mut client_flags = 0i32;
    let mut replay = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "u" => username = field.text().await.ok(),
            "p" => md5_password = field.text().await.ok(),
            "osuver" => client_build_date = field.text().await.ok(),
            "score" => score_data_b64 = field.text().await.ok(),
            "iv" => iv_b64 = field.text().await.ok(),
            "x" => exited_out = field.text().await.ok().as_deref() == Some("1"),
            "fs" => storyboard = field.text().await.ok().as_deref() == Some("1"),
            "ft" => time_elapsed_secs = field.text().await.ok().and_then(|v| v.parse().ok()).unwrap_or(0),
            "cf" => client_flags = field.text().await.ok().and_then(|v| v.parse().ok()).unwrap_or(0),
            "replay" => replay = field.bytes().await.ok().map(|b| b.to_vec()),
            _ => {}
        }
    }

    let (Some(username), Some(md5_password), Some(client_build_date), Some(score_data_b64), Some(iv_b64)) =
        (username, md5_password, client_build_date, score_data_b64, iv_b64)
    else {
        return (StatusCode::OK, "error: no".to_string());
    };

    let ctx = SubmissionContext {
        db: &state.db,
        bcrypt_cache: &state.bcrypt_cache,
        sessions: &state.sessions,
        channels: &state.channels,
        config: &state.config.score_submission,
    };
    let req = SubmissionRequest {
        username,
        md5_password,
        client_build_date,
        score_data_b64,
        iv_b64,
        exited_out,
        storyboard,
        time_elapsed_secs,
        client_flags,
        replay,
    };
    match score::submit(&ctx, req).await {
        Ok(chart) => (StatusCode::OK, chart),
        Err(err) => {
            warn!("score submission failed: {}", err);
            (StatusCode::OK, "error: no".to_string())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_login_body_accepts_well_formed_request() {
        let body = b"someone\npassword_md5\n20230101|0|1|abc:def:ghi:jkl:mno|0\n";
        let creds = parse_login_body(body, "127.0.0.1".parse().unwrap()).expect("should parse");
        assert_eq!(creds.username, "someone");
        assert_eq!(creds.client_build_date, "20230101");
        assert!(!creds.private_dm);
        assert_eq!(creds.hashes.osu_path_md5, "abc");
    }

    #[test]
    fn parse_login_body_rejects_missing_fields() {
        let body = b"someone\npassword_md5\n20230101|0|1\n";
        assert!(parse_login_body(body, "127.0.0.1".parse().unwrap()).is_none());
    }

    #[test]
    fn parse_login_body_rejects_empty_username() {
        let body = b"\npassword_md5\n20230101|0|1|abc:def:ghi:jkl:mno|0\n";
        assert!(parse_login_body(body, "127.0.0.1".parse().unwrap()).is_none());
    }
}
