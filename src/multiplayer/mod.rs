//! Match Registry: fixed-capacity table of 16-slot multiplayer rooms, the
//! match state machine, and the scrim/mappool overlays layered on top of it.

use crate::codec::types::{MatchData, MatchTeam, Mode, Mods, SlotStatusBits, TeamType, WinCondition};
use crate::session::{SessionRef, WeakSessionRef};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

pub const SLOT_COUNT: usize = 16;

/// The room's currently selected beatmap, tracked independently of the
/// `maps` table so an unranked/unknown map can still be played.
#[derive(Debug, Clone, Default)]
pub struct MatchMap {
    pub id: i32,
    pub md5: String,
    pub name: String,
}

/// One of a match's 16 fixed positions.
///
/// The wire's `SlotStatusBits` has no distinct "failed" bit (a failed play
/// still reports `COMPLETE` on the match snapshot; the client learns about
/// the failure from the separate `matchPlayerFailed` packet), so `failed` is
/// tracked here as an extra in-memory flag rather than a ninth status bit.
#[derive(Debug, Clone)]
pub struct Slot {
    pub status: SlotStatusBits,
    pub team: MatchTeam,
    pub session: Option<WeakSessionRef>,
    pub mods: Mods,
    pub loaded: bool,
    pub skipped: bool,
    pub failed: bool,
    /// Total score from the occupant's most recent `MatchScoreUpdate` frame;
    /// the only per-slot gameplay figure tracked, since frames are otherwise
    /// forwarded unparsed. Used as the scrim tally's comparison metric
    /// regardless of win condition (accuracy/combo aren't tracked per-slot).
    pub last_score: i64,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            status: SlotStatusBits::OPEN,
            team: MatchTeam::Neutral,
            session: None,
            mods: Mods::empty(),
            loaded: false,
            skipped: false,
            failed: false,
            last_score: 0,
        }
    }
}

impl Slot {
    fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn session_id(&self) -> Option<i32> {
        self.session.as_ref().and_then(|weak| weak.upgrade()).map(|s| s.id)
    }

    fn occupied_by(&self, user_id: i32) -> bool {
        self.status.has_player() && self.session_id() == Some(user_id)
    }
}

/// Best-of-N scoring overlay for a scrim match.
#[derive(Debug, Clone)]
pub struct ScrimState {
    pub best_of: u8,
    pub red_points: u32,
    pub blue_points: u32,
    /// One entry per round that actually awarded a point; a tied round
    /// contributes nothing here, so "rematch" rolling back the most recent
    /// point just pops this and decrements the matching counter.
    history: Vec<MatchTeam>,
}

impl ScrimState {
    pub fn new(best_of: u8) -> Result<Self, MatchError> {
        if best_of == 0 || best_of > 15 || best_of % 2 == 0 {
            return Err(MatchError::InvalidBestOf);
        }
        Ok(Self {
            best_of,
            red_points: 0,
            blue_points: 0,
            history: Vec::new(),
        })
    }

    /// Records the outcome of a completed round; `None` means a tie, which
    /// awards no point but is not itself rolled back by `rematch`.
    pub fn record_round(&mut self, winner: Option<MatchTeam>) {
        if let Some(team) = winner {
            match team {
                MatchTeam::Red => self.red_points += 1,
                MatchTeam::Blue => self.blue_points += 1,
                MatchTeam::Neutral => {}
            }
            self.history.push(team);
        }
    }

    /// Rolls back the most recent point-awarding round.
    pub fn rematch(&mut self) {
        if let Some(team) = self.history.pop() {
            match team {
                MatchTeam::Red => self.red_points = self.red_points.saturating_sub(1),
                MatchTeam::Blue => self.blue_points = self.blue_points.saturating_sub(1),
                MatchTeam::Neutral => {}
            }
        }
    }
}

/// A loaded mappool: `(mods, slot-number) -> map`, plus a ban set that
/// blocks re-picking a key until explicitly unbanned.
#[derive(Debug, Clone, Default)]
pub struct Mappool {
    entries: HashMap<(u32, u8), MatchMap>,
    banned: HashSet<(u32, u8)>,
}

impl Mappool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, mods: Mods, slot_number: u8, map: MatchMap) {
        self.entries.insert((mods.bits(), slot_number), map);
    }

    pub fn ban(&mut self, mods: Mods, slot_number: u8) {
        self.banned.insert((mods.bits(), slot_number));
    }

    pub fn unban(&mut self, mods: Mods, slot_number: u8) {
        self.banned.remove(&(mods.bits(), slot_number));
    }

    pub fn is_banned(&self, mods: Mods, slot_number: u8) -> bool {
        self.banned.contains(&(mods.bits(), slot_number))
    }

    pub fn lookup(&self, mods: Mods, slot_number: u8) -> Option<&MatchMap> {
        self.entries.get(&(mods.bits(), slot_number))
    }
}

/// Outcome a client reports when its play ends, driving [`Match::finish_play`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Complete,
    Failed,
    Quit,
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("match is full")]
    Full,
    #[error("wrong password")]
    WrongPassword,
    #[error("sender does not occupy a slot")]
    NotInMatch,
    #[error("only the host may do this")]
    NotHost,
    #[error("slot index out of range")]
    BadSlot,
    #[error("target slot is not occupied")]
    SlotNotOccupied,
    #[error("match is already in progress")]
    AlreadyInProgress,
    #[error("match is not in progress")]
    NotInProgress,
    #[error("best-of must be odd and between 1 and 15")]
    InvalidBestOf,
    #[error("entry is banned")]
    EntryBanned,
    #[error("no such mappool entry")]
    NoSuchMapEntry,
}

/// Wrapped behind a single `Mutex` (never per-field locks) so "acquire
/// session lock before match lock" has one lock to obey on this side.
pub type MatchRef = Arc<Mutex<Match>>;

pub struct Match {
    pub id: usize,
    pub name: String,
    pub password: Option<String>,
    pub map: MatchMap,
    pub mode: Mode,
    pub mods: Mods,
    pub freemods: bool,
    pub slots: [Slot; SLOT_COUNT],
    pub host: Option<i32>,
    pub referees: HashSet<i32>,
    pub in_progress: bool,
    pub win_condition: WinCondition,
    pub team_type: TeamType,
    pub seed: i32,
    pub scrim: Option<ScrimState>,
    pub mappool: Option<Mappool>,
    pub channel_name: String,
    start_timer: Option<tokio::task::JoinHandle<()>>,
}

impl Match {
    fn new(id: usize, name: String, password: Option<String>, host: &SessionRef) -> Self {
        let mut slots: [Slot; SLOT_COUNT] = Default::default();
        slots[0] = Slot {
            status: SlotStatusBits::NOT_READY,
            team: MatchTeam::Neutral,
            session: Some(Arc::downgrade(host)),
            ..Default::default()
        };
        Self {
            id,
            name,
            password,
            map: MatchMap::default(),
            mode: Mode::Standard,
            mods: Mods::empty(),
            freemods: false,
            slots,
            host: Some(host.id),
            referees: HashSet::new(),
            in_progress: false,
            win_condition: WinCondition::Score,
            team_type: TeamType::HeadToHead,
            seed: 0,
            scrim: None,
            mappool: None,
            channel_name: format!("#mp_{id}"),
            start_timer: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| !s.status.has_player())
    }

    fn first_occupied_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.status.has_player())
    }

    fn slot_of(&self, user_id: i32) -> Option<usize> {
        self.slots.iter().position(|s| s.occupied_by(user_id))
    }

    pub fn is_host(&self, user_id: i32) -> bool {
        self.host == Some(user_id)
    }

    pub fn is_referee(&self, user_id: i32) -> bool {
        self.referees.contains(&user_id)
    }

    /// Transition: join. Finds the first open/unlocked slot for `session`.
    pub fn join(&mut self, session: &SessionRef, password: Option<&str>) -> Result<usize, MatchError> {
        if self.host != Some(session.id) {
            if let Some(expected) = &self.password {
                if password != Some(expected.as_str()) {
                    return Err(MatchError::WrongPassword);
                }
            }
        }
        let index = self
            .slots
            .iter()
            .position(|s| s.status == SlotStatusBits::OPEN)
            .ok_or(MatchError::Full)?;

        let team = match self.team_type {
            TeamType::TeamVs | TeamType::TagTeamVs => MatchTeam::Red,
            _ => MatchTeam::Neutral,
        };
        self.slots[index] = Slot {
            status: SlotStatusBits::NOT_READY,
            team,
            session: Some(Arc::downgrade(session)),
            ..Default::default()
        };
        if self.host.is_none() {
            self.host = Some(session.id);
        }
        Ok(index)
    }

    /// Transition: leave. Resets the slot; if the leaver was host, hands off
    /// to the next occupied slot; returns `true` if the room is now empty.
    pub fn leave(&mut self, user_id: i32) -> Result<bool, MatchError> {
        let index = self.slot_of(user_id).ok_or(MatchError::NotInMatch)?;
        self.slots[index].reset();

        if self.host == Some(user_id) {
            self.host = self.first_occupied_slot().and_then(|i| self.slots[i].session_id());
        }
        Ok(self.is_empty())
    }

    pub fn ready(&mut self, user_id: i32) -> Result<(), MatchError> {
        let index = self.slot_of(user_id).ok_or(MatchError::NotInMatch)?;
        let slot = &mut self.slots[index];
        if matches!(slot.status, SlotStatusBits::NOT_READY | SlotStatusBits::NO_MAP) {
            slot.status = SlotStatusBits::READY;
        }
        Ok(())
    }

    pub fn unready(&mut self, user_id: i32) -> Result<(), MatchError> {
        let index = self.slot_of(user_id).ok_or(MatchError::NotInMatch)?;
        let slot = &mut self.slots[index];
        if slot.status == SlotStatusBits::READY {
            slot.status = SlotStatusBits::NOT_READY;
        }
        Ok(())
    }

    /// Transition: map-changed. Only the host may change the map; every
    /// ready slot drops back to not-ready.
    pub fn change_map(&mut self, sender_id: i32, map: MatchMap, mode: Mode) -> Result<(), MatchError> {
        if !self.is_host(sender_id) {
            return Err(MatchError::NotHost);
        }
        self.map = map;
        self.mode = mode;
        for slot in self.slots.iter_mut() {
            if slot.status == SlotStatusBits::READY {
                slot.status = SlotStatusBits::NOT_READY;
            }
        }
        Ok(())
    }

    /// Transition: freemods-toggle. Speed mods always stay room-wide;
    /// non-speed mods move between the room and per-slot storage.
    pub fn toggle_freemods(&mut self, sender_id: i32, enabled: bool) -> Result<(), MatchError> {
        if !self.is_host(sender_id) {
            return Err(MatchError::NotHost);
        }
        if enabled == self.freemods {
            return Ok(());
        }
        if enabled {
            let room_non_speed = self.mods.non_speed();
            self.mods = self.mods.speed_changing();
            for slot in self.slots.iter_mut() {
                if slot.status.has_player() {
                    slot.mods = room_non_speed;
                }
            }
        } else {
            let mut combined = self.mods.speed_changing();
            for slot in self.slots.iter_mut() {
                combined |= slot.mods.non_speed();
                slot.mods = Mods::empty();
            }
            self.mods = combined;
        }
        self.freemods = enabled;
        Ok(())
    }

    /// Transition: mods-changed. With freemods off, only the host may set
    /// room mods. With freemods on, anyone may set their own slot's
    /// non-speed mods, but only the host may change the room-wide speed mods.
    pub fn change_mods(&mut self, sender_id: i32, mods: Mods) -> Result<(), MatchError> {
        if !self.freemods {
            if !self.is_host(sender_id) {
                return Err(MatchError::NotHost);
            }
            self.mods = mods;
            return Ok(());
        }

        if self.is_host(sender_id) {
            self.mods = mods.speed_changing() | self.mods.non_speed();
        }
        let index = self.slot_of(sender_id).ok_or(MatchError::NotInMatch)?;
        self.slots[index].mods = mods.non_speed();
        Ok(())
    }

    /// Transition: start. All ready/not-ready slots begin playing.
    pub fn start(&mut self, sender_id: Option<i32>) -> Result<(), MatchError> {
        if self.in_progress {
            return Err(MatchError::AlreadyInProgress);
        }
        if let Some(sender_id) = sender_id {
            if !self.is_host(sender_id) {
                return Err(MatchError::NotHost);
            }
        }
        for slot in self.slots.iter_mut() {
            if matches!(slot.status, SlotStatusBits::READY | SlotStatusBits::NOT_READY) {
                slot.status = SlotStatusBits::PLAYING;
            }
        }
        self.in_progress = true;
        self.abort_start_timer();
        Ok(())
    }

    /// Transition: abort. Any still-playing slot returns to not-ready. A
    /// pending (not yet in-progress) start timer is cancelled rather than
    /// rejected, so `MatchAbort` also serves as the cancel for a countdown
    /// started by `!mp start`.
    pub fn abort(&mut self) -> Result<(), MatchError> {
        if !self.in_progress {
            if self.start_timer.is_none() {
                return Err(MatchError::NotInProgress);
            }
            self.abort_start_timer();
            return Ok(());
        }
        for slot in self.slots.iter_mut() {
            if slot.status == SlotStatusBits::PLAYING {
                slot.status = SlotStatusBits::NOT_READY;
            }
        }
        self.in_progress = false;
        self.abort_start_timer();
        Ok(())
    }

    /// Marks a playing slot as finished, with `failed` distinguishing a
    /// failed-out play from a clean completion (both report `COMPLETE` on
    /// the wire snapshot).
    pub fn finish_play(&mut self, user_id: i32, outcome: PlayOutcome) -> Result<(), MatchError> {
        let index = self.slot_of(user_id).ok_or(MatchError::NotInMatch)?;
        let slot = &mut self.slots[index];
        if slot.status != SlotStatusBits::PLAYING {
            return Err(MatchError::NotInProgress);
        }
        match outcome {
            PlayOutcome::Complete => slot.status = SlotStatusBits::COMPLETE,
            PlayOutcome::Failed => {
                slot.status = SlotStatusBits::COMPLETE;
                slot.failed = true;
            }
            PlayOutcome::Quit => slot.status = SlotStatusBits::QUIT,
        }
        Ok(())
    }

    /// `true` once every slot that was playing has reported
    /// complete/failed/quit.
    pub fn all_finished(&self) -> bool {
        self.in_progress
            && self.slots.iter().all(|s| {
                !s.status.has_player()
                    || matches!(s.status, SlotStatusBits::COMPLETE | SlotStatusBits::QUIT)
            })
    }

    /// Transition: complete. Room returns to lobby; if scrim, `tally`
    /// computes and records the round's winner from per-team aggregates.
    pub fn complete(&mut self, tally: impl FnOnce(&Match) -> Option<MatchTeam>) -> Result<(), MatchError> {
        if !self.in_progress {
            return Err(MatchError::NotInProgress);
        }
        let winner = self.scrim.as_ref().map(|_| tally(self));
        for slot in self.slots.iter_mut() {
            if matches!(slot.status, SlotStatusBits::COMPLETE | SlotStatusBits::QUIT) {
                slot.status = SlotStatusBits::NOT_READY;
                slot.failed = false;
                slot.last_score = 0;
            }
        }
        self.in_progress = false;
        if let (Some(scrim), Some(winner)) = (self.scrim.as_mut(), winner) {
            scrim.record_round(winner);
        }
        Ok(())
    }

    /// Tallies the round's winner by summed `last_score` per team — the
    /// default comparison for every win condition, since accuracy/combo
    /// aren't tracked per-slot. Ties and non-team matches award no point.
    pub fn tally_by_score(&self) -> Option<MatchTeam> {
        let mut red = 0i64;
        let mut blue = 0i64;
        for slot in &self.slots {
            match slot.team {
                MatchTeam::Red => red += slot.last_score,
                MatchTeam::Blue => blue += slot.last_score,
                MatchTeam::Neutral => {}
            }
        }
        match red.cmp(&blue) {
            std::cmp::Ordering::Greater => Some(MatchTeam::Red),
            std::cmp::Ordering::Less => Some(MatchTeam::Blue),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn transfer_host(&mut self, sender_id: i32, target_id: i32) -> Result<(), MatchError> {
        if !self.is_host(sender_id) {
            return Err(MatchError::NotHost);
        }
        if self.slot_of(target_id).is_none() {
            return Err(MatchError::SlotNotOccupied);
        }
        self.host = Some(target_id);
        Ok(())
    }

    pub fn enable_scrim(&mut self, best_of: u8) -> Result<(), MatchError> {
        self.scrim = Some(ScrimState::new(best_of)?);
        Ok(())
    }

    pub fn disable_scrim(&mut self) {
        self.scrim = None;
    }

    pub fn rematch(&mut self) {
        if let Some(scrim) = self.scrim.as_mut() {
            scrim.rematch();
        }
    }

    /// Mappool overlay transition: `pick` sets the current map and overrides
    /// room mods, clearing freemods state back to room-wide.
    pub fn pick(&mut self, mods: Mods, slot_number: u8) -> Result<(), MatchError> {
        let pool = self.mappool.as_ref().ok_or(MatchError::NoSuchMapEntry)?;
        if pool.is_banned(mods, slot_number) {
            return Err(MatchError::EntryBanned);
        }
        let map = pool.lookup(mods, slot_number).ok_or(MatchError::NoSuchMapEntry)?.clone();
        self.map = map;
        self.mods = mods;
        if self.freemods {
            self.freemods = false;
            for slot in self.slots.iter_mut() {
                slot.mods = Mods::empty();
            }
        }
        Ok(())
    }

    fn abort_start_timer(&mut self) {
        if let Some(handle) = self.start_timer.take() {
            handle.abort();
        }
    }

    pub fn set_start_timer(&mut self, handle: tokio::task::JoinHandle<()>) {
        self.abort_start_timer();
        self.start_timer = Some(handle);
    }

    pub fn cancel_start_timer(&mut self) {
        self.abort_start_timer();
    }

    /// Builds the wire snapshot. `full` controls whether the real password
    /// (if any) is exposed, per the lobby-visibility rule: referees and the
    /// host see it, everyone else sees only whether one is set.
    pub fn to_wire(&self, full: bool) -> MatchData {
        let mut slot_status = [SlotStatusBits::OPEN; SLOT_COUNT];
        let mut slot_team = [MatchTeam::Neutral; SLOT_COUNT];
        let mut slot_player_ids = [None; SLOT_COUNT];
        let mut slot_mods = [Mods::empty(); SLOT_COUNT];

        for (i, slot) in self.slots.iter().enumerate() {
            slot_status[i] = slot.status;
            slot_team[i] = slot.team;
            if slot.status.has_player() {
                slot_player_ids[i] = slot.session_id();
            }
            slot_mods[i] = slot.mods;
        }

        MatchData {
            match_id: self.id as u16,
            in_progress: self.in_progress,
            mods: self.mods,
            name: self.name.clone(),
            password: self.password.clone(),
            send_password: full,
            map_name: self.map.name.clone(),
            map_id: self.map.id,
            map_md5: self.map.md5.clone(),
            slot_status,
            slot_team,
            slot_player_ids,
            host_id: self.host.unwrap_or(-1),
            mode: self.mode,
            win_condition: self.win_condition,
            team_type: self.team_type,
            freemods: self.freemods,
            slot_mods: if self.freemods { Some(slot_mods) } else { None },
            seed: self.seed,
        }
    }

    /// The current occupants, for fan-out of state-mutating broadcasts.
    pub fn member_sessions(&self) -> Vec<SessionRef> {
        self.slots
            .iter()
            .filter_map(|s| s.session.as_ref())
            .filter_map(|weak| weak.upgrade())
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum MatchRegistryError {
    #[error("match registry is full")]
    Full,
    #[error("no such match")]
    NotFound,
}

/// Fixed-capacity table of matches, keyed by lowest-free-index allocation.
pub struct MatchRegistry {
    matches: RwLock<Vec<Option<MatchRef>>>,
}

impl MatchRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            matches: RwLock::new((0..capacity).map(|_| None).collect()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.matches.read().len()
    }

    pub fn create(
        &self,
        name: String,
        password: Option<String>,
        host: &SessionRef,
    ) -> Result<MatchRef, MatchRegistryError> {
        let mut matches = self.matches.write();
        let index = matches
            .iter()
            .position(|m| m.is_none())
            .ok_or(MatchRegistryError::Full)?;
        let created = Arc::new(Mutex::new(Match::new(index, name, password, host)));
        matches[index] = Some(created.clone());
        Ok(created)
    }

    pub fn get(&self, id: usize) -> Option<MatchRef> {
        self.matches.read().get(id).and_then(|m| m.clone())
    }

    /// Resets the slot. Returns the vacated match id so the caller can
    /// notify the lobby view.
    pub fn remove(&self, id: usize) -> Option<usize> {
        let mut matches = self.matches.write();
        let slot = matches.get_mut(id)?;
        slot.take()?;
        Some(id)
    }

    pub fn all(&self) -> Vec<MatchRef> {
        self.matches.read().iter().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::types::Privileges;
    use crate::database::entities::users;
    use std::sync::Arc;

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
    fn create_allocates_lowest_free_index() {
        let registry = MatchRegistry::new(4);
        let host = make_session(1, "host");
        let a = registry.create("a".into(), None, &host).unwrap();
        let b = registry.create("b".into(), None, &make_session(2, "host2")).unwrap();
        assert_eq!(a.lock().id, 0);
        assert_eq!(b.lock().id, 1);
        registry.remove(0);
        let c = registry.create("c".into(), None, &make_session(3, "host3")).unwrap();
        assert_eq!(c.lock().id, 0);
    }

    #[test]
    fn join_leave_transfers_host_to_next_occupied_slot() {
        let host = make_session(1, "alice");
        let guest = make_session(2, "bob");
        let registry = MatchRegistry::new(4);
        let m = registry.create("room".into(), None, &host).unwrap();
        {
            let mut m = m.lock();
            m.join(&guest, None).unwrap();
            assert!(m.is_host(1));
            let emptied = m.leave(1).unwrap();
            assert!(!emptied);
            assert!(m.is_host(2));
        }
    }

    #[test]
    fn freemods_toggle_preserves_speed_mods_and_moves_non_speed() {
        let host = make_session(1, "alice");
        let registry = MatchRegistry::new(4);
        let m = registry.create("room".into(), None, &host).unwrap();
        let mut m = m.lock();
        m.mods = Mods::DOUBLE_TIME | Mods::HIDDEN;
        m.toggle_freemods(1, true).unwrap();
        assert_eq!(m.mods, Mods::DOUBLE_TIME);
        assert_eq!(m.slots[0].mods, Mods::HIDDEN);

        m.toggle_freemods(1, false).unwrap();
        assert!(m.mods.contains(Mods::DOUBLE_TIME));
        assert!(m.mods.contains(Mods::HIDDEN));
        assert!(m.slots[0].mods.is_empty());
    }

    #[test]
    fn scrim_rematch_rolls_back_only_the_last_point() {
        let mut scrim = ScrimState::new(5).unwrap();
        scrim.record_round(Some(MatchTeam::Red));
        scrim.record_round(None);
        scrim.record_round(Some(MatchTeam::Red));
        assert_eq!(scrim.red_points, 2);
        scrim.rematch();
        assert_eq!(scrim.red_points, 1);
    }

    #[test]
    fn mappool_pick_respects_bans() {
        let mut pool = Mappool::new();
        pool.add_entry(Mods::HIDDEN, 1, MatchMap { id: 10, md5: "abc".into(), name: "Song".into() });
        pool.ban(Mods::HIDDEN, 1);

        let host = make_session(1, "alice");
        let registry = MatchRegistry::new(4);
        let m = registry.create("room".into(), None, &host).unwrap();
        let mut m = m.lock();
        m.mappool = Some(pool);
        assert!(matches!(m.pick(Mods::HIDDEN, 1), Err(MatchError::EntryBanned)));
        m.mappool.as_mut().unwrap().unban(Mods::HIDDEN, 1);
        m.pick(Mods::HIDDEN, 1).unwrap();
        assert_eq!(m.map.id, 10);
    }
}
