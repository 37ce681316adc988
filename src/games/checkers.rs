//! Checkers rules plugin, the reference implementation of the plugin contract.
//!
//! Board orientation: an 8x8 grid with `x` as column and `y` as row. Red sits
//! on rows 0-2 and moves toward higher `y`; black sits on rows 5-7 and moves
//! toward lower `y`. Pieces live on dark squares (`(x + y) % 2 == 1`). Red,
//! the earliest-joined player, moves first.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::game::{
    CommandContext, CommandOutcome, CommandStrategy, GamePlugin, GameSetup, GameState,
    PluginError, RoomContext,
};
use crate::protocol::{GameId, PlayerId, PluginDescriptor};

pub const GAME_ID: &str = "checkers";
const BOARD_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Black,
            Self::Black => Self::Red,
        }
    }

    /// Forward direction along `y` for non-king pieces.
    fn forward(self) -> i8 {
        match self {
            Self::Red => 1,
            Self::Black => -1,
        }
    }

    pub fn role_name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Black => "black",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub king: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Square {
    pub x: usize,
    pub y: usize,
}

impl Square {
    fn offset(self, dx: i8, dy: i8) -> Option<Square> {
        let x = self.x as i8 + dx;
        let y = self.y as i8 + dy;
        if (0..BOARD_SIZE as i8).contains(&x) && (0..BOARD_SIZE as i8).contains(&y) {
            Some(Square {
                x: x as usize,
                y: y as usize,
            })
        } else {
            None
        }
    }

    fn is_dark(self) -> bool {
        (self.x + self.y) % 2 == 1
    }
}

/// 8x8 board, row-major (`squares[y][x]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    squares: Vec<Vec<Option<Piece>>>,
}

impl Board {
    fn initial() -> Self {
        let mut squares = vec![vec![None; BOARD_SIZE]; BOARD_SIZE];
        for (y, row) in squares.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                let square = Square { x, y };
                if !square.is_dark() {
                    continue;
                }
                if y < 3 {
                    *cell = Some(Piece {
                        color: Color::Red,
                        king: false,
                    });
                } else if y >= BOARD_SIZE - 3 {
                    *cell = Some(Piece {
                        color: Color::Black,
                        king: false,
                    });
                }
            }
        }
        Self { squares }
    }

    pub fn get(&self, square: Square) -> Option<Piece> {
        self.squares.get(square.y)?.get(square.x).copied().flatten()
    }

    fn set(&mut self, square: Square, piece: Option<Piece>) {
        if let Some(row) = self.squares.get_mut(square.y) {
            if let Some(cell) = row.get_mut(square.x) {
                *cell = piece;
            }
        }
    }

    pub fn count_pieces(&self, color: Color) -> usize {
        self.squares
            .iter()
            .flatten()
            .filter(|cell| cell.map(|p| p.color) == Some(color))
            .count()
    }

    fn piece_directions(piece: Piece) -> Vec<(i8, i8)> {
        if piece.king {
            vec![(-1, -1), (-1, 1), (1, -1), (1, 1)]
        } else {
            let dy = piece.color.forward();
            vec![(-1, dy), (1, dy)]
        }
    }

    /// Whether the piece on `from` has at least one capture available.
    fn has_capture_from(&self, from: Square) -> bool {
        let Some(piece) = self.get(from) else {
            return false;
        };
        Self::piece_directions(piece).into_iter().any(|(dx, dy)| {
            let Some(over) = from.offset(dx, dy) else {
                return false;
            };
            let Some(landing) = from.offset(dx * 2, dy * 2) else {
                return false;
            };
            self.get(over).map(|p| p.color) == Some(piece.color.opponent())
                && self.get(landing).is_none()
        })
    }

    /// Whether `color` has any legal move (simple or capture) left.
    fn has_any_move(&self, color: Color) -> bool {
        for y in 0..BOARD_SIZE {
            for x in 0..BOARD_SIZE {
                let from = Square { x, y };
                let Some(piece) = self.get(from) else {
                    continue;
                };
                if piece.color != color {
                    continue;
                }
                for (dx, dy) in Self::piece_directions(piece) {
                    if let Some(to) = from.offset(dx, dy) {
                        if self.get(to).is_none() {
                            return true;
                        }
                    }
                }
                if self.has_capture_from(from) {
                    return true;
                }
            }
        }
        false
    }
}

/// Full plugin-defined state blob serialized into `GameState::data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckersData {
    board: Board,
    turn: Color,
    red_id: PlayerId,
    black_id: PlayerId,
    red_name: String,
    black_name: String,
    red_captures: usize,
    black_captures: usize,
}

impl CheckersData {
    fn color_of(&self, player_id: &PlayerId) -> Option<Color> {
        if player_id == &self.red_id {
            Some(Color::Red)
        } else if player_id == &self.black_id {
            Some(Color::Black)
        } else {
            None
        }
    }

    fn player_id(&self, color: Color) -> &PlayerId {
        match color {
            Color::Red => &self.red_id,
            Color::Black => &self.black_id,
        }
    }

    fn player_name(&self, color: Color) -> &str {
        match color {
            Color::Red => &self.red_name,
            Color::Black => &self.black_name,
        }
    }
}

fn decode(state: &GameState) -> Result<CheckersData, String> {
    serde_json::from_value(state.data.clone()).map_err(|e| format!("corrupt game state: {e}"))
}

fn encode(data: &CheckersData, round: u32) -> GameState {
    let mut state = GameState::new(serde_json::to_value(data).unwrap_or(serde_json::Value::Null));
    state.current_player_id = Some(data.player_id(data.turn).clone());
    state.round = round;
    state.score = Some(json!({
        "red": data.red_captures,
        "black": data.black_captures,
    }));
    state
}

#[derive(Debug, Deserialize)]
struct MovePayload {
    from: Square,
    to: Square,
}

struct MoveStrategy;

impl CommandStrategy for MoveStrategy {
    fn execute(&self, ctx: CommandContext<'_>) -> CommandOutcome {
        let payload: MovePayload = match serde_json::from_value(ctx.payload.clone()) {
            Ok(p) => p,
            Err(_) => {
                return CommandOutcome::Rejected {
                    reason: "malformed move payload".to_string(),
                }
            }
        };

        let data = match decode(ctx.state) {
            Ok(d) => d,
            Err(reason) => return CommandOutcome::Rejected { reason },
        };

        let Some(color) = data.color_of(ctx.player_id) else {
            return CommandOutcome::Rejected {
                reason: "you are not seated at this board".to_string(),
            };
        };
        if color != data.turn {
            return CommandOutcome::Rejected {
                reason: "not your turn".to_string(),
            };
        }

        match apply_move(&data, color, payload.from, payload.to) {
            Ok((next_data, terminal)) => {
                let prior = ctx.state.clone();
                let mut next_state = encode(&next_data, ctx.state.round);
                let round_end = terminal.map(|outcome| {
                    next_state.is_terminal = true;
                    next_state.winner_id = Some(next_data.player_id(outcome.winner).clone());
                    next_state.winner_name =
                        Some(next_data.player_name(outcome.winner).to_string());
                    next_state.current_player_id = None;
                    json!({
                        "winnerId": next_data.player_id(outcome.winner),
                        "winnerName": next_data.player_name(outcome.winner),
                        "reason": outcome.reason,
                        "score": {
                            "red": next_data.red_captures,
                            "black": next_data.black_captures,
                        },
                    })
                });
                CommandOutcome::Applied {
                    next_state,
                    undo: Some(Box::new(move || prior)),
                    round_end,
                }
            }
            Err(reason) => CommandOutcome::Rejected { reason },
        }
    }
}

struct ResignStrategy;

impl CommandStrategy for ResignStrategy {
    fn execute(&self, ctx: CommandContext<'_>) -> CommandOutcome {
        let data = match decode(ctx.state) {
            Ok(d) => d,
            Err(reason) => return CommandOutcome::Rejected { reason },
        };
        let Some(color) = data.color_of(ctx.player_id) else {
            return CommandOutcome::Rejected {
                reason: "you are not seated at this board".to_string(),
            };
        };

        let winner = color.opponent();
        let mut next_state = encode(&data, ctx.state.round);
        next_state.is_terminal = true;
        next_state.winner_id = Some(data.player_id(winner).clone());
        next_state.winner_name = Some(data.player_name(winner).to_string());
        next_state.current_player_id = None;

        let round_end = json!({
            "winnerId": data.player_id(winner),
            "winnerName": data.player_name(winner),
            "reason": "resignation",
        });

        CommandOutcome::Applied {
            next_state,
            undo: None,
            round_end: Some(round_end),
        }
    }
}

struct TerminalOutcome {
    winner: Color,
    reason: &'static str,
}

/// Validate and apply one move, returning the next data blob and, when the
/// game ended, the terminal outcome.
fn apply_move(
    data: &CheckersData,
    color: Color,
    from: Square,
    to: Square,
) -> Result<(CheckersData, Option<TerminalOutcome>), String> {
    if from.x >= BOARD_SIZE || from.y >= BOARD_SIZE || to.x >= BOARD_SIZE || to.y >= BOARD_SIZE {
        return Err("move is off the board".to_string());
    }
    if !to.is_dark() {
        return Err("pieces move on dark squares only".to_string());
    }

    let piece = data.board.get(from).ok_or("no piece on that square")?;
    if piece.color != color {
        return Err("that is not your piece".to_string());
    }
    if data.board.get(to).is_some() {
        return Err("destination square is occupied".to_string());
    }

    let dx = to.x as i8 - from.x as i8;
    let dy = to.y as i8 - from.y as i8;
    if dx.abs() != dy.abs() {
        return Err("moves are diagonal".to_string());
    }
    if !piece.king && dy.signum() != piece.color.forward() {
        return Err("only kings move backwards".to_string());
    }

    let mut next = data.clone();
    let mut captured = false;

    match dx.abs() {
        1 => {
            next.board.set(from, None);
            next.board.set(to, Some(piece));
        }
        2 => {
            let over = from
                .offset(dx / 2, dy / 2)
                .ok_or("jump is off the board")?;
            let jumped = next.board.get(over).ok_or("nothing to capture")?;
            if jumped.color != color.opponent() {
                return Err("cannot capture your own piece".to_string());
            }
            next.board.set(over, None);
            next.board.set(from, None);
            next.board.set(to, Some(piece));
            captured = true;
            match color {
                Color::Red => next.red_captures += 1,
                Color::Black => next.black_captures += 1,
            }
        }
        _ => return Err("moves cover one square, jumps two".to_string()),
    }

    // King promotion on reaching the far row.
    let promoted = !piece.king
        && ((color == Color::Red && to.y == BOARD_SIZE - 1)
            || (color == Color::Black && to.y == 0));
    if promoted {
        next.board.set(
            to,
            Some(Piece {
                color,
                king: true,
            }),
        );
    }

    let opponent = color.opponent();
    if next.board.count_pieces(opponent) == 0 {
        return Ok((
            next,
            Some(TerminalOutcome {
                winner: color,
                reason: "all pieces captured",
            }),
        ));
    }
    if !next.board.has_any_move(opponent) {
        return Ok((
            next,
            Some(TerminalOutcome {
                winner: color,
                reason: "no legal moves remain",
            }),
        ));
    }

    // After a capture the same piece keeps the turn while it can keep
    // jumping (promotion ends the sequence).
    if captured && !promoted && next.board.has_capture_from(to) {
        next.turn = color;
    } else {
        next.turn = opponent;
    }

    Ok((next, None))
}

pub struct CheckersPlugin;

impl GamePlugin for CheckersPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            game_id: GameId::from(GAME_ID),
            name: "Checkers".to_string(),
            min_players: 2,
            max_players: 2,
            category: "board".to_string(),
        }
    }

    fn create(&self, ctx: &RoomContext) -> Result<GameSetup, PluginError> {
        if ctx.players.len() != 2 {
            return Err(PluginError::PlayerCount {
                min: 2,
                max: 2,
                actual: ctx.players.len(),
            });
        }

        // Join order decides colors: first red, second black.
        let red = &ctx.players[0];
        let black = &ctx.players[1];

        let data = CheckersData {
            board: Board::initial(),
            turn: Color::Red,
            red_id: red.id.clone(),
            black_id: black.id.clone(),
            red_name: red.display_name.clone(),
            black_name: black.display_name.clone(),
            red_captures: 0,
            black_captures: 0,
        };

        let mut strategies: HashMap<String, Arc<dyn CommandStrategy>> = HashMap::new();
        strategies.insert("move".to_string(), Arc::new(MoveStrategy));
        strategies.insert("resign".to_string(), Arc::new(ResignStrategy));

        let mut roles = HashMap::new();
        roles.insert(red.id.clone(), Color::Red.role_name().to_string());
        roles.insert(black.id.clone(), Color::Black.role_name().to_string());

        Ok(GameSetup {
            initial_state: encode(&data, 1),
            strategies,
            roles,
        })
    }
}
