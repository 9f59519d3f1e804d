//! Keyspace and channel names shared by every process.
//!
//! All key construction goes through this module so that the writer of a key
//! and the expiration router that parses it can never disagree.

/// Hash of player id -> owning server id.
pub const PRESENCE: &str = "presence";

/// Set of every room id handed out by the HTTP collaborator.
pub const ROOMS: &str = "rooms";

/// Channel on which the in-memory store announces expired keys.
pub const MEMORY_EXPIRED_CHANNEL: &str = "__keyevent@0__:expired";

/// Pattern matching the expiration channel of every Redis database.
pub const EXPIRED_PATTERN: &str = "__keyevent@*__:expired";

/// Longest room or player id accepted from a client.
pub const MAX_ID_LEN: usize = 64;

/// Whether a client-supplied room or player id can be embedded in keys and
/// channel names. `:` separates key parts, so an id containing it could
/// collide with another key (a room named `solo:<server>:<player>` would
/// receive that player's solo channel) or make a timer key unparseable.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c != ':' && !c.is_whitespace() && !c.is_control())
}

pub fn match_state(match_id: &str) -> String {
    format!("game:{match_id}")
}

pub fn match_lock(match_id: &str) -> String {
    format!("lock:game-{match_id}")
}

pub fn match_members(match_id: &str) -> String {
    format!("Active:game-{match_id}")
}

/// Room broadcasts are published on a channel named after the room itself.
pub fn room_channel(room_id: &str) -> String {
    room_id.to_string()
}

/// Channel carrying messages for one player connected to `server_id`.
pub fn solo_channel(server_id: &str, player_id: &str) -> String {
    format!("solo:{server_id}:{player_id}")
}

pub fn solo_pattern(server_id: &str) -> String {
    format!("solo:{server_id}:*")
}

/// Player id encoded in a solo channel name, if the channel belongs to
/// `server_id`.
pub fn solo_player<'a>(server_id: &str, channel: &'a str) -> Option<&'a str> {
    let rest = channel.strip_prefix("solo:")?;
    let rest = rest.strip_prefix(server_id)?;
    let player = rest.strip_prefix(':')?;
    (!player.is_empty()).then_some(player)
}

/// TTL keys whose expiration drives a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKey {
    Turn { match_id: String },
    Placement { match_id: String },
    MatchLimit { match_id: String },
    Disconnect { match_id: String, player_id: String },
}

impl TimerKey {
    pub fn turn(match_id: &str) -> Self {
        Self::Turn {
            match_id: match_id.to_string(),
        }
    }

    pub fn placement(match_id: &str) -> Self {
        Self::Placement {
            match_id: match_id.to_string(),
        }
    }

    pub fn match_limit(match_id: &str) -> Self {
        Self::MatchLimit {
            match_id: match_id.to_string(),
        }
    }

    pub fn disconnect(match_id: &str, player_id: &str) -> Self {
        Self::Disconnect {
            match_id: match_id.to_string(),
            player_id: player_id.to_string(),
        }
    }

    pub fn match_id(&self) -> &str {
        match self {
            Self::Turn { match_id }
            | Self::Placement { match_id }
            | Self::MatchLimit { match_id }
            | Self::Disconnect { match_id, .. } => match_id,
        }
    }

    pub fn to_key(&self) -> String {
        match self {
            Self::Turn { match_id } => format!("turn:{match_id}"),
            Self::Placement { match_id } => format!("place:{match_id}"),
            Self::MatchLimit { match_id } => format!("limit:{match_id}"),
            Self::Disconnect {
                match_id,
                player_id,
            } => format!("disconnect:{match_id}:{player_id}"),
        }
    }

    /// Parse an expired key. State, lock and unknown keys yield `None`.
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.splitn(3, ':');
        let prefix = parts.next()?;
        let match_id = parts.next().filter(|s| !s.is_empty())?;
        let rest = parts.next();

        match (prefix, rest) {
            ("turn", None) => Some(Self::turn(match_id)),
            ("place", None) => Some(Self::placement(match_id)),
            ("limit", None) => Some(Self::match_limit(match_id)),
            ("disconnect", Some(player)) if !player.is_empty() => {
                Some(Self::disconnect(match_id, player))
            }
            _ => None,
        }
    }
}
