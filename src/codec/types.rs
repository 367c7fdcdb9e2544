//! Composite payload types layered on top of the primitives in [`super`].

use super::{
    read_i32_list16, read_string, write_i32_list16, write_string, CodecError, CodecResult,
};
use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Anything that can serialize itself onto the wire.
pub trait Encode {
    fn encode(&self, dst: &mut BytesMut);
}

/// Anything that can be parsed off a packet's payload bytes.
pub trait Decode: Sized {
    fn decode(src: &mut Bytes) -> CodecResult<Self>;
}

bitflags! {
    /// Gameplay mod bits. Values match the client's fixed bit assignment;
    /// `SPEED_CHANGING` is the subset that freemods keeps room-wide.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Mods: u32 {
        const NO_FAIL    = 1 << 0;
        const EASY       = 1 << 1;
        const TOUCH_DEVICE = 1 << 2;
        const HIDDEN     = 1 << 3;
        const HARD_ROCK  = 1 << 4;
        const SUDDEN_DEATH = 1 << 5;
        const DOUBLE_TIME = 1 << 6;
        const RELAX      = 1 << 7;
        const HALF_TIME  = 1 << 8;
        const NIGHTCORE  = 1 << 9;
        const FLASHLIGHT = 1 << 10;
        const AUTOPLAY   = 1 << 11;
        const SPUN_OUT   = 1 << 12;
        const AUTOPILOT  = 1 << 13;
        const PERFECT    = 1 << 14;
        const KEY4       = 1 << 15;
        const KEY5       = 1 << 16;
        const KEY6       = 1 << 17;
        const KEY7       = 1 << 18;
        const KEY8       = 1 << 19;
        const FADE_IN    = 1 << 20;
        const RANDOM     = 1 << 21;
        const CINEMA     = 1 << 22;
        const TARGET     = 1 << 23;
        const KEY9       = 1 << 24;
        const KEY_COOP   = 1 << 25;
        const KEY1       = 1 << 26;
        const KEY3       = 1 << 27;
        const KEY2       = 1 << 28;
        const SCORE_V2   = 1 << 29;
        const MIRROR     = 1 << 30;
    }
}

impl Mods {
    /// Mods that change playback speed; these stay room-wide under freemods.
    pub const SPEED_CHANGING: Mods =
        Mods::from_bits_truncate(Mods::DOUBLE_TIME.bits() | Mods::NIGHTCORE.bits() | Mods::HALF_TIME.bits());

    pub fn speed_changing(self) -> Mods {
        self & Self::SPEED_CHANGING
    }

    pub fn non_speed(self) -> Mods {
        self & !Self::SPEED_CHANGING
    }
}

/// Base game mode; relax/autopilot are a submode derived from [`Mods`] and
/// select which `scores_*` table a play lands in, not a distinct `Mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Standard = 0,
    Taiko = 1,
    Catch = 2,
    Mania = 3,
}

impl Mode {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Standard,
            1 => Self::Taiko,
            2 => Self::Catch,
            3 => Self::Mania,
            _ => return None,
        })
    }
}

bitflags! {
    /// Account privilege bitset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Privileges: u32 {
        const UNRESTRICTED = 1 << 0;
        const VERIFIED     = 1 << 1;
        const WHITELISTED  = 1 << 2;
        const SUPPORTER    = 1 << 3;
        const PREMIUM      = 1 << 4;
        const ALUMNI       = 1 << 5;
        const TOURNAMENT   = 1 << 6;
        const NOMINATOR    = 1 << 7;
        const MODERATOR    = 1 << 8;
        const ADMIN        = 1 << 9;
        const DANGEROUS    = 1 << 10;
    }
}

bitflags! {
    /// Wire-level slot status bits, matching the client's own bitset so
    /// "occupied" queries are a mask test (`status.has_player()`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SlotStatusBits: u8 {
        const OPEN      = 1;
        const LOCKED    = 2;
        const NOT_READY = 4;
        const READY     = 8;
        const NO_MAP    = 16;
        const PLAYING   = 32;
        const COMPLETE  = 64;
        const QUIT      = 128;
    }
}

impl SlotStatusBits {
    pub const HAS_PLAYER: SlotStatusBits = SlotStatusBits::from_bits_truncate(
        SlotStatusBits::NOT_READY.bits()
            | SlotStatusBits::READY.bits()
            | SlotStatusBits::NO_MAP.bits()
            | SlotStatusBits::PLAYING.bits()
            | SlotStatusBits::COMPLETE.bits()
            | SlotStatusBits::QUIT.bits(),
    );

    pub fn has_player(self) -> bool {
        self.intersects(Self::HAS_PLAYER)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MatchTeam {
    Neutral = 0,
    Red = 1,
    Blue = 2,
}

impl MatchTeam {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Red,
            2 => Self::Blue,
            _ => Self::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WinCondition {
    Score = 0,
    Accuracy = 1,
    Combo = 2,
    ScoreV2 = 3,
}

impl WinCondition {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Accuracy,
            2 => Self::Combo,
            3 => Self::ScoreV2,
            _ => Self::Score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TeamType {
    HeadToHead = 0,
    TagCoop = 1,
    TeamVs = 2,
    TagTeamVs = 3,
}

impl TeamType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::TagCoop,
            2 => Self::TeamVs,
            3 => Self::TagTeamVs,
            _ => Self::HeadToHead,
        }
    }

    pub fn is_team_mode(self) -> bool {
        matches!(self, Self::TeamVs | Self::TagTeamVs)
    }
}

/// Four strings plus a signed sender-id: a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub body: String,
    pub recipient: String,
    pub sender_id: i32,
}

impl Encode for Message {
    fn encode(&self, dst: &mut BytesMut) {
        write_string(dst, &self.sender);
        write_string(dst, &self.body);
        write_string(dst, &self.recipient);
        dst.put_i32_le(self.sender_id);
    }
}

impl Decode for Message {
    fn decode(src: &mut Bytes) -> CodecResult<Self> {
        let sender = read_string(src)?;
        let body = read_string(src)?;
        let recipient = read_string(src)?;
        if src.len() < 4 {
            return Err(CodecError::ShortComposite);
        }
        let sender_id = src.get_i32_le();
        Ok(Self {
            sender,
            body,
            recipient,
            sender_id,
        })
    }
}

/// Two strings plus a 16-bit member count: a channel listing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    pub topic: String,
    pub member_count: u16,
}

impl Encode for ChannelInfo {
    fn encode(&self, dst: &mut BytesMut) {
        write_string(dst, &self.name);
        write_string(dst, &self.topic);
        dst.put_u16_le(self.member_count);
    }
}

impl Decode for ChannelInfo {
    fn decode(src: &mut Bytes) -> CodecResult<Self> {
        let name = read_string(src)?;
        let topic = read_string(src)?;
        if src.len() < 2 {
            return Err(CodecError::ShortComposite);
        }
        let member_count = src.get_u16_le();
        Ok(Self {
            name,
            topic,
            member_count,
        })
    }
}

/// `userStats` payload (encode-only; the client never sends this). The pp
/// cap swap (`pp > 0x7fff` shown as ranked score instead, `pp = 0`) and the
/// relax/autopilot-to-vanilla-mode collapse are resolved by the caller —
/// this type is a dumb field-for-field mirror of the wire layout.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    pub user_id: i32,
    pub action: u8,
    pub info_text: String,
    pub map_md5: String,
    pub mods: Mods,
    pub mode: u8,
    pub map_id: i32,
    pub ranked_score: i64,
    pub accuracy: f32,
    pub plays: i32,
    pub total_score: i64,
    pub global_rank: i32,
    pub pp: i16,
}

impl Encode for UserStats {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i32_le(self.user_id);
        dst.put_u8(self.action);
        write_string(dst, &self.info_text);
        write_string(dst, &self.map_md5);
        dst.put_i32_le(self.mods.bits() as i32);
        dst.put_u8(self.mode);
        dst.put_i32_le(self.map_id);
        dst.put_i64_le(self.ranked_score);
        dst.put_f32_le(self.accuracy);
        dst.put_i32_le(self.plays);
        dst.put_i64_le(self.total_score);
        dst.put_i32_le(self.global_rank);
        dst.put_i16_le(self.pp);
    }
}

/// `userPresence` payload (encode-only). Geo-IP lookup, privilege-byte
/// packing, and the bot's fixed presence are all caller-side concerns.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPresence {
    pub user_id: i32,
    pub name: String,
    pub utc_offset_byte: u8,
    pub country_id: u8,
    pub privilege_byte: u8,
    pub longitude: f32,
    pub latitude: f32,
    pub global_rank: i32,
}

impl Encode for UserPresence {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i32_le(self.user_id);
        write_string(dst, &self.name);
        dst.put_u8(self.utc_offset_byte);
        dst.put_u8(self.country_id);
        dst.put_u8(self.privilege_byte);
        dst.put_f32_le(self.longitude);
        dst.put_f32_le(self.latitude);
        dst.put_i32_le(self.global_rank);
    }
}

/// One occupied slot's id, keyed by slot index, used only for encoding; the
/// decode side resolves ids through the Session Registry at use.
pub type SlotOccupant = Option<i32>;

/// The 16-slot match snapshot exchanged in `matchJoinSuccess`/`updateMatch`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchData {
    pub match_id: u16,
    pub in_progress: bool,
    pub mods: Mods,
    pub name: String,
    /// `None` when unlocked; the client still receives a masked non-empty
    /// password for lobby listings that must hide it but show "has a password".
    pub password: Option<String>,
    pub send_password: bool,
    pub map_name: String,
    pub map_id: i32,
    pub map_md5: String,
    pub slot_status: [SlotStatusBits; 16],
    pub slot_team: [MatchTeam; 16],
    pub slot_player_ids: [SlotOccupant; 16],
    pub host_id: i32,
    pub mode: Mode,
    pub win_condition: WinCondition,
    pub team_type: TeamType,
    pub freemods: bool,
    pub slot_mods: Option<[Mods; 16]>,
    pub seed: i32,
}

impl Encode for MatchData {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u16_le(self.match_id);
        dst.put_u8(self.in_progress as u8);
        dst.put_u8(0); // match type, always 0 (unused by the client)
        dst.put_u32_le(self.mods.bits());

        write_string(dst, &self.name);
        match (&self.password, self.send_password) {
            (Some(_), false) => {
                // has a password, but the recipient isn't allowed to see it
                dst.put_u8(0x0b);
                dst.put_u8(0x00);
            }
            (Some(pw), true) => write_string(dst, pw),
            (None, _) => write_string(dst, ""),
        }

        write_string(dst, &self.map_name);
        dst.put_i32_le(self.map_id);
        write_string(dst, &self.map_md5);

        for status in &self.slot_status {
            dst.put_u8(status.bits());
        }
        for team in &self.slot_team {
            dst.put_u8(*team as u8);
        }
        for (status, occupant) in self.slot_status.iter().zip(self.slot_player_ids.iter()) {
            if status.has_player() {
                dst.put_i32_le(occupant.unwrap_or_default());
            }
        }

        dst.put_i32_le(self.host_id);
        dst.put_u8(self.mode as u8);
        dst.put_u8(self.win_condition as u8);
        dst.put_u8(self.team_type as u8);
        dst.put_u8(self.freemods as u8);

        if self.freemods {
            let mods = self.slot_mods.unwrap_or([Mods::empty(); 16]);
            for m in mods {
                dst.put_u32_le(m.bits());
            }
        }

        dst.put_i32_le(self.seed);
    }
}

impl Decode for MatchData {
    fn decode(src: &mut Bytes) -> CodecResult<Self> {
        if src.len() < 8 {
            return Err(CodecError::ShortComposite);
        }
        let match_id = src.get_u16_le();
        let in_progress = src.get_u8() != 0;
        let _match_type = src.get_u8();
        let mods = Mods::from_bits_truncate(src.get_u32_le());

        let name = read_string(src)?;
        let password = read_string(src)?;
        let password = if password.is_empty() { None } else { Some(password) };

        let map_name = read_string(src)?;
        if src.len() < 4 {
            return Err(CodecError::ShortComposite);
        }
        let map_id = src.get_i32_le();
        let map_md5 = read_string(src)?;

        if src.len() < 32 {
            return Err(CodecError::ShortComposite);
        }
        let mut slot_status = [SlotStatusBits::empty(); 16];
        for s in slot_status.iter_mut() {
            *s = SlotStatusBits::from_bits_truncate(src.get_u8());
        }
        let mut slot_team = [MatchTeam::Neutral; 16];
        for t in slot_team.iter_mut() {
            *t = MatchTeam::from_u8(src.get_u8());
        }

        let mut slot_player_ids: [SlotOccupant; 16] = [None; 16];
        for (status, occupant) in slot_status.iter().zip(slot_player_ids.iter_mut()) {
            if status.has_player() {
                if src.len() < 4 {
                    return Err(CodecError::ShortComposite);
                }
                *occupant = Some(src.get_i32_le());
            }
        }

        if src.len() < 8 {
            return Err(CodecError::ShortComposite);
        }
        let host_id = src.get_i32_le();
        let mode = Mode::from_u8(src.get_u8()).unwrap_or(Mode::Standard);
        let win_condition = WinCondition::from_u8(src.get_u8());
        if src.len() < 2 {
            return Err(CodecError::ShortComposite);
        }
        let team_type = TeamType::from_u8(src.get_u8());
        let freemods = src.get_u8() == 1;

        let slot_mods = if freemods {
            if src.len() < 16 * 4 {
                return Err(CodecError::ShortComposite);
            }
            let mut mods = [Mods::empty(); 16];
            for m in mods.iter_mut() {
                *m = Mods::from_bits_truncate(src.get_u32_le());
            }
            Some(mods)
        } else {
            None
        };

        if src.len() < 4 {
            return Err(CodecError::ShortComposite);
        }
        let seed = src.get_i32_le();

        Ok(Self {
            match_id,
            in_progress,
            mods,
            name,
            password,
            send_password: true,
            map_name,
            map_id,
            map_md5,
            slot_status,
            slot_team,
            slot_player_ids,
            host_id,
            mode,
            win_condition,
            team_type,
            freemods,
            slot_mods,
            seed,
        })
    }
}

/// The 29-byte packed gameplay update sent while spectating, plus the two
/// score-v2 floats when the flag in byte 28 is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreFrame {
    pub time: i32,
    pub id: u8,
    pub num300: u16,
    pub num100: u16,
    pub num50: u16,
    pub num_geki: u16,
    pub num_katu: u16,
    pub num_miss: u16,
    pub total_score: i32,
    pub current_combo: u16,
    pub max_combo: u16,
    pub perfect: bool,
    pub current_hp: u8,
    pub tag_byte: u8,
    pub score_v2: bool,
    pub combo_portion: Option<f32>,
    pub bonus_portion: Option<f32>,
}

impl Encode for ScoreFrame {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i32_le(self.time);
        dst.put_u8(self.id);
        dst.put_u16_le(self.num300);
        dst.put_u16_le(self.num100);
        dst.put_u16_le(self.num50);
        dst.put_u16_le(self.num_geki);
        dst.put_u16_le(self.num_katu);
        dst.put_u16_le(self.num_miss);
        dst.put_i32_le(self.total_score);
        dst.put_u16_le(self.current_combo);
        dst.put_u16_le(self.max_combo);
        dst.put_u8(self.perfect as u8);
        dst.put_u8(self.current_hp);
        dst.put_u8(self.tag_byte);
        dst.put_u8(self.score_v2 as u8);
        if self.score_v2 {
            dst.put_f32_le(self.combo_portion.unwrap_or(0.0));
            dst.put_f32_le(self.bonus_portion.unwrap_or(0.0));
        }
    }
}

impl Decode for ScoreFrame {
    fn decode(src: &mut Bytes) -> CodecResult<Self> {
        if src.len() < 29 {
            return Err(CodecError::ShortComposite);
        }
        let time = src.get_i32_le();
        let id = src.get_u8();
        let num300 = src.get_u16_le();
        let num100 = src.get_u16_le();
        let num50 = src.get_u16_le();
        let num_geki = src.get_u16_le();
        let num_katu = src.get_u16_le();
        let num_miss = src.get_u16_le();
        let total_score = src.get_i32_le();
        let current_combo = src.get_u16_le();
        let max_combo = src.get_u16_le();
        let perfect = src.get_u8() != 0;
        let current_hp = src.get_u8();
        let tag_byte = src.get_u8();
        let score_v2 = src.get_u8() != 0;

        let (combo_portion, bonus_portion) = if score_v2 {
            if src.len() < 8 {
                return Err(CodecError::ShortComposite);
            }
            (Some(src.get_f32_le()), Some(src.get_f32_le()))
        } else {
            (None, None)
        };

        Ok(Self {
            time,
            id,
            num300,
            num100,
            num50,
            num_geki,
            num_katu,
            num_miss,
            total_score,
            current_combo,
            max_combo,
            perfect,
            current_hp,
            tag_byte,
            score_v2,
            combo_portion,
            bonus_portion,
        })
    }
}

/// An `i32` list with a 16-bit length prefix, as used by e.g. friends lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct I32List16(pub Vec<i32>);

impl Encode for I32List16 {
    fn encode(&self, dst: &mut BytesMut) {
        write_i32_list16(dst, &self.0);
    }
}

impl Decode for I32List16 {
    fn decode(src: &mut Bytes) -> CodecResult<Self> {
        Ok(Self(read_i32_list16(src)?))
    }
}

macro_rules! impl_primitive_codec {
    ($ty:ty, $get:ident, $put:ident) => {
        impl Encode for $ty {
            fn encode(&self, dst: &mut BytesMut) {
                dst.$put(*self);
            }
        }
        impl Decode for $ty {
            fn decode(src: &mut Bytes) -> CodecResult<Self> {
                if src.len() < std::mem::size_of::<$ty>() {
                    return Err(CodecError::ShortComposite);
                }
                Ok(src.$get())
            }
        }
    };
}

impl_primitive_codec!(i32, get_i32_le, put_i32_le);
impl_primitive_codec!(u32, get_u32_le, put_u32_le);
impl_primitive_codec!(i16, get_i16_le, put_i16_le);
impl_primitive_codec!(u16, get_u16_le, put_u16_le);
impl_primitive_codec!(i64, get_i64_le, put_i64_le);
impl_primitive_codec!(f32, get_f32_le, put_f32_le);

impl Encode for u8 {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(*self);
    }
}
impl Decode for u8 {
    fn decode(src: &mut Bytes) -> CodecResult<Self> {
        if src.is_empty() {
            return Err(CodecError::ShortComposite);
        }
        Ok(src.get_u8())
    }
}

impl Encode for String {
    fn encode(&self, dst: &mut BytesMut) {
        write_string(dst, self);
    }
}
impl Decode for String {
    fn decode(src: &mut Bytes) -> CodecResult<Self> {
        read_string(src)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip<T: Encode + Decode + PartialEq + std::fmt::Debug>(value: T) {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        let mut bytes = buf.freeze();
        let decoded = T::decode(&mut bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn message_round_trip() {
        roundtrip(Message {
            sender: "alice".into(),
            body: "hello".into(),
            recipient: "#osu".into(),
            sender_id: 1000,
        });
    }

    #[test]
    fn channel_round_trip() {
        roundtrip(ChannelInfo {
            name: "#osu".into(),
            topic: "default channel".into(),
            member_count: 42,
        });
    }

    #[test]
    fn scoreframe_round_trip_v1() {
        roundtrip(ScoreFrame {
            time: 1234,
            id: 0,
            num300: 10,
            num100: 2,
            num50: 0,
            num_geki: 1,
            num_katu: 0,
            num_miss: 0,
            total_score: 100_000,
            current_combo: 50,
            max_combo: 100,
            perfect: false,
            current_hp: 200,
            tag_byte: 0,
            score_v2: false,
            combo_portion: None,
            bonus_portion: None,
        });
    }

    #[test]
    fn scoreframe_round_trip_v2() {
        roundtrip(ScoreFrame {
            time: 1234,
            id: 0,
            num300: 10,
            num100: 2,
            num50: 0,
            num_geki: 1,
            num_katu: 0,
            num_miss: 0,
            total_score: 100_000,
            current_combo: 50,
            max_combo: 100,
            perfect: true,
            current_hp: 200,
            tag_byte: 0,
            score_v2: true,
            combo_portion: Some(90_000.0),
            bonus_portion: Some(10_000.0),
        });
    }

    #[test]
    fn freemods_preserve_speed_on_room_and_move_non_speed_to_slots() {
        let room_mods = Mods::DOUBLE_TIME | Mods::HIDDEN;
        assert_eq!(room_mods.speed_changing(), Mods::DOUBLE_TIME);
        assert_eq!(room_mods.non_speed(), Mods::HIDDEN);
    }

    #[test]
    fn match_data_round_trip_no_freemods() {
        let mut slot_status = [SlotStatusBits::OPEN; 16];
        slot_status[0] = SlotStatusBits::READY;
        let mut slot_player_ids: [SlotOccupant; 16] = [None; 16];
        slot_player_ids[0] = Some(42);

        roundtrip(MatchData {
            match_id: 3,
            in_progress: false,
            mods: Mods::empty(),
            name: "room".into(),
            password: Some("secret".into()),
            send_password: true,
            map_name: "map".into(),
            map_id: 123,
            map_md5: "abc123".into(),
            slot_status,
            slot_team: [MatchTeam::Neutral; 16],
            slot_player_ids,
            host_id: 42,
            mode: Mode::Standard,
            win_condition: WinCondition::Score,
            team_type: TeamType::HeadToHead,
            freemods: false,
            slot_mods: None,
            seed: 7,
        });
    }

    #[test]
    fn match_data_round_trip_with_freemods() {
        let mut slot_status = [SlotStatusBits::OPEN; 16];
        slot_status[0] = SlotStatusBits::PLAYING;
        let mut slot_player_ids: [SlotOccupant; 16] = [None; 16];
        slot_player_ids[0] = Some(7);
        let mut slot_mods = [Mods::empty(); 16];
        slot_mods[0] = Mods::HIDDEN;

        roundtrip(MatchData {
            match_id: 1,
            in_progress: true,
            mods: Mods::DOUBLE_TIME,
            name: "ranked".into(),
            password: None,
            send_password: true,
            map_name: "map".into(),
            map_id: 1,
            map_md5: "x".into(),
            slot_status,
            slot_team: [MatchTeam::Red; 16],
            slot_player_ids,
            host_id: 7,
            mode: Mode::Mania,
            win_condition: WinCondition::ScoreV2,
            team_type: TeamType::TeamVs,
            freemods: true,
            slot_mods: Some(slot_mods),
            seed: 99,
        });
    }
}
