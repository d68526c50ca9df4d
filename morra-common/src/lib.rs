// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug_span, field};

pub const MIN_THROW: u32 = 1;
pub const MAX_THROW: u32 = 4;
/// Upper bound on `reqplayercount`; each extra player costs one draw.
pub const MAX_PLAYER_COUNT: i64 = 1024;

/// Body of `POST /turn`.
///
/// The game and round identifiers are opaque to the player and are echoed back
/// exactly as received, whatever their JSON type. A missing key reads as `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    #[serde(rename = "reqgameid", default)]
    pub game_id: Value,
    #[serde(rename = "reqroundno", default)]
    pub round_no: Value,
    #[serde(rename = "reqplayercount", default)]
    pub player_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    #[serde(rename = "resgameid")]
    pub game_id: Value,
    #[serde(rename = "resroundno")]
    pub round_no: Value,
    #[serde(rename = "resthrow")]
    pub throw_value: u32,
    #[serde(rename = "rescall")]
    pub call_value: u32,
}

/// Round summary the game posts to every player after judging a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub game_id: String,
    pub round_no: u64,
    #[serde(default)]
    pub turns: Vec<TurnRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub player_id: String,
    pub throw: u32,
    pub call: u32,
}

impl RoundRecord {
    pub fn throw_total(&self) -> u32 {
        self.turns.iter().map(|turn| turn.throw).sum()
    }

    /// Players whose call matched the total of all throws in the round.
    pub fn winners(&self) -> Vec<&str> {
        let total = self.throw_total();
        self.turns
            .iter()
            .filter(|turn| turn.call == total)
            .map(|turn| turn.player_id.as_str())
            .collect()
    }
}

pub fn make_throw<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.random_range(MIN_THROW..=MAX_THROW)
}

/// Build a call from our own throw plus one random guess per other player.
///
/// A `player_count` of one or less adds nothing, so the call equals the throw.
pub fn make_call<R: Rng + ?Sized>(rng: &mut R, throw_value: u32, player_count: u32) -> u32 {
    (1..player_count).fold(throw_value, |call, _| call + make_throw(rng))
}

/// Play a single turn for an already validated `player_count`.
///
/// The throw and call are drawn inside `make_throw` and `make_call` spans that
/// carry the drawn values as `throw.value` and `call.value`.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(game.id = %request.game_id, player.count = player_count)
)]
pub fn take_turn<R: Rng + ?Sized>(
    rng: &mut R,
    request: &TurnRequest,
    player_count: u32,
) -> TurnResponse {
    let throw_span = debug_span!("make_throw", throw.value = field::Empty);
    let throw_value = throw_span.in_scope(|| make_throw(rng));
    throw_span.record("throw.value", throw_value);

    let call_span = debug_span!("make_call", call.value = field::Empty);
    let call_value = call_span.in_scope(|| make_call(rng, throw_value, player_count));
    call_span.record("call.value", call_value);

    TurnResponse {
        game_id: request.game_id.clone(),
        round_no: request.round_no.clone(),
        throw_value,
        call_value,
    }
}
