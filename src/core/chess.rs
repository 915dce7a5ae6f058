//! Chess board model for the chess game view.
//!
//! Full move generation including en passant, castling and promotion, with
//! a legality filter against leaving one's own king in check. Row 0 is
//! black's back rank and row 7 is white's, matching the server's layout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const INITIAL_CLOCK_SECS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::White => "White",
            Color::Black => "Black",
        }
    }

    fn pawn_direction(self) -> i32 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    fn pawn_start_row(self) -> usize {
        match self {
            Color::White => 6,
            Color::Black => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Rook,
    Knight,
    Bishop,
    Queen,
    King,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    #[serde(rename = "type")]
    pub kind: PieceKind,
    pub color: Color,
    #[serde(default)]
    pub has_moved: bool,
}

impl Piece {
    pub fn new(kind: PieceKind, color: Color) -> Self {
        Self {
            kind,
            color,
            has_moved: false,
        }
    }

    pub fn symbol(&self) -> char {
        match (self.color, self.kind) {
            (Color::White, PieceKind::King) => '♔',
            (Color::White, PieceKind::Queen) => '♕',
            (Color::White, PieceKind::Rook) => '♖',
            (Color::White, PieceKind::Bishop) => '♗',
            (Color::White, PieceKind::Knight) => '♘',
            (Color::White, PieceKind::Pawn) => '♙',
            (Color::Black, PieceKind::King) => '♚',
            (Color::Black, PieceKind::Queen) => '♛',
            (Color::Black, PieceKind::Rook) => '♜',
            (Color::Black, PieceKind::Bishop) => '♝',
            (Color::Black, PieceKind::Knight) => '♞',
            (Color::Black, PieceKind::Pawn) => '♟',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square {
    pub row: usize,
    pub col: usize,
}

impl Square {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    fn offset(self, d_row: i32, d_col: i32) -> Option<Square> {
        let row = self.row as i32 + d_row;
        let col = self.col as i32 + d_col;
        if (0..8).contains(&row) && (0..8).contains(&col) {
            Some(Square::new(row as usize, col as usize))
        } else {
            None
        }
    }

    /// File letter and rank number, e.g. `e2`
    pub fn algebraic(&self) -> String {
        format!("{}{}", (b'a' + self.col as u8) as char, 8 - self.row)
    }
}

pub type Board = [[Option<Piece>; 8]; 8];

const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

pub fn initial_board() -> Board {
    let mut board: Board = [[None; 8]; 8];
    for col in 0..8 {
        board[0][col] = Some(Piece::new(BACK_RANK[col], Color::Black));
        board[1][col] = Some(Piece::new(PieceKind::Pawn, Color::Black));
        board[6][col] = Some(Piece::new(PieceKind::Pawn, Color::White));
        board[7][col] = Some(Piece::new(BACK_RANK[col], Color::White));
    }
    board
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChessMove {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_piece: Option<Piece>,
    #[serde(default)]
    pub is_en_passant: bool,
    #[serde(default)]
    pub is_castling: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_piece: Option<PieceKind>,
}

impl ChessMove {
    /// History line, e.g. `♙ e7 → e8 =♕`
    pub fn describe(&self) -> String {
        let mut text = format!(
            "{} {} → {}",
            self.piece.symbol(),
            self.from.algebraic(),
            self.to.algebraic()
        );
        if let Some(captured) = &self.captured_piece {
            text.push_str(&format!(" x{}", captured.symbol()));
        }
        if self.is_castling {
            text.push_str(" (Castling)");
        }
        if self.is_en_passant {
            text.push_str(" (En Passant)");
        }
        if let Some(kind) = self.promotion_piece {
            text.push_str(&format!(" ={}", Piece::new(kind, self.piece.color).symbol()));
        }
        text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChessStatus {
    Active,
    Check,
    Checkmate,
    Stalemate,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub white: u32,
    pub black: u32,
}

impl Clock {
    pub fn get(&self, color: Color) -> u32 {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    fn get_mut(&mut self, color: Color) -> &mut u32 {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

/// Format seconds as `m:ss`
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Move payloads sent to the game server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChessAction {
    ChessMove {
        #[serde(rename = "move")]
        chess_move: ChessMove,
        #[serde(rename = "gameState")]
        game_state: Box<ChessState>,
    },
    TimeForfeit {
        winner: Color,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChessState {
    pub board: Board,
    pub current_player: Color,
    pub move_history: Vec<ChessMove>,
    pub game_status: ChessStatus,
    pub time_remaining: Clock,
    pub selected_square: Option<Square>,
    pub possible_moves: Vec<Square>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_move: Option<ChessMove>,
}

impl Default for ChessState {
    fn default() -> Self {
        Self::from_board(initial_board(), Color::White)
    }
}

impl ChessState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_board(board: Board, to_move: Color) -> Self {
        Self {
            board,
            current_player: to_move,
            move_history: Vec::new(),
            game_status: ChessStatus::Active,
            time_remaining: Clock {
                white: INITIAL_CLOCK_SECS,
                black: INITIAL_CLOCK_SECS,
            },
            selected_square: None,
            possible_moves: Vec::new(),
            last_move: None,
        }
    }

    /// Overlay fields pushed by the server under `gameData.chess`
    pub fn sync_from(&mut self, remote: &Value) -> Result<(), serde_json::Error> {
        let mut merged = serde_json::to_value(&*self)?;
        if let (Some(current), Some(remote)) = (merged.as_object_mut(), remote.as_object()) {
            for (key, value) in remote {
                current.insert(key.clone(), value.clone());
            }
        }
        *self = serde_json::from_value(merged)?;
        Ok(())
    }

    /// Piece on `square`; squares off the board are empty
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        at(&self.board, square)
    }

    pub fn is_playable(&self) -> bool {
        matches!(self.game_status, ChessStatus::Active | ChessStatus::Check)
    }

    pub fn is_in_check(&self, color: Color) -> bool {
        is_king_in_check(&self.board, color)
    }

    /// Legal destinations for the piece on `from`
    pub fn legal_moves(&self, from: Square) -> Vec<Square> {
        legal_moves(&self.board, from, self.last_move.as_ref())
    }

    pub fn has_any_legal_moves(&self, color: Color) -> bool {
        has_any_legal_moves(&self.board, color, self.last_move.as_ref())
    }

    /// Every legal `(from, to)` pair for `color`
    pub fn all_legal_moves(&self, color: Color) -> Vec<(Square, Square)> {
        let mut moves = Vec::new();
        for square in squares_of(&self.board, color) {
            for to in self.legal_moves(square) {
                moves.push((square, to));
            }
        }
        moves
    }

    /// Click on a square: select, deselect, reselect, or move.
    pub fn select(&mut self, square: Square) -> Option<ChessAction> {
        if !self.is_playable() {
            return None;
        }

        let own_piece = self
            .piece_at(square)
            .map(|p| p.color == self.current_player)
            .unwrap_or(false);

        match self.selected_square {
            None => {
                if own_piece {
                    self.selected_square = Some(square);
                    self.possible_moves = self.legal_moves(square);
                }
                None
            }
            Some(selected) if selected == square => {
                self.clear_selection();
                None
            }
            Some(_) if own_piece => {
                self.selected_square = Some(square);
                self.possible_moves = self.legal_moves(square);
                None
            }
            Some(selected) => {
                let action = if self.possible_moves.contains(&square) {
                    self.make_move(selected, square)
                } else {
                    None
                };
                self.clear_selection();
                action
            }
        }
    }

    fn clear_selection(&mut self) {
        self.selected_square = None;
        self.possible_moves.clear();
    }

    /// Play a move for the side to move; illegal moves are ignored.
    pub fn make_move(&mut self, from: Square, to: Square) -> Option<ChessAction> {
        let piece = self.piece_at(from)?;
        if piece.color != self.current_player || !self.legal_moves(from).contains(&to) {
            return None;
        }

        let (board, chess_move) = apply_move(&self.board, piece, from, to);
        let next = self.current_player.opponent();
        let in_check = is_king_in_check(&board, next);
        let can_move = has_any_legal_moves(&board, next, Some(&chess_move));

        self.game_status = match (in_check, can_move) {
            (true, false) => ChessStatus::Checkmate,
            (false, false) => ChessStatus::Stalemate,
            (true, true) => ChessStatus::Check,
            (false, true) => ChessStatus::Active,
        };
        self.board = board;
        self.current_player = next;
        self.move_history.push(chess_move.clone());
        self.last_move = Some(chess_move.clone());
        self.clear_selection();

        Some(ChessAction::ChessMove {
            chess_move,
            game_state: Box::new(self.clone()),
        })
    }

    /// Advance the side-to-move's clock by one second.
    pub fn tick(&mut self) -> Option<ChessAction> {
        if !self.is_playable() {
            return None;
        }

        let remaining = self.time_remaining.get_mut(self.current_player);
        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            return None;
        }

        self.game_status = ChessStatus::Checkmate;
        Some(ChessAction::TimeForfeit {
            winner: self.current_player.opponent(),
            reason: "Time expired".to_string(),
        })
    }

    pub fn winner(&self) -> Option<Color> {
        match self.game_status {
            ChessStatus::Checkmate => Some(self.current_player.opponent()),
            _ => None,
        }
    }

    pub fn status_message(&self) -> Option<String> {
        match self.game_status {
            ChessStatus::Check => Some("Check!".to_string()),
            ChessStatus::Checkmate => Some(format!(
                "Checkmate! {} wins!",
                self.current_player.opponent().name()
            )),
            ChessStatus::Stalemate => Some("Stalemate! It's a draw!".to_string()),
            _ => None,
        }
    }

    pub fn is_last_move_square(&self, square: Square) -> bool {
        self.last_move
            .as_ref()
            .map(|m| m.from == square || m.to == square)
            .unwrap_or(false)
    }
}

fn at(board: &Board, square: Square) -> Option<Piece> {
    board.get(square.row).and_then(|rank| rank.get(square.col)).copied().flatten()
}

fn squares_of(board: &Board, color: Color) -> Vec<Square> {
    let mut squares = Vec::with_capacity(16);
    for row in 0..8 {
        for col in 0..8 {
            if matches!(board[row][col], Some(p) if p.color == color) {
                squares.push(Square::new(row, col));
            }
        }
    }
    squares
}

const ROOK_DIRECTIONS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
const BISHOP_DIRECTIONS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const KNIGHT_JUMPS: [(i32, i32); 8] = [
    (-2, -1), (-2, 1), (-1, -2), (-1, 2),
    (1, -2), (1, 2), (2, -1), (2, 1),
];
const KING_STEPS: [(i32, i32); 8] = [
    (-1, -1), (-1, 0), (-1, 1), (0, -1),
    (0, 1), (1, -1), (1, 0), (1, 1),
];

fn slide(board: &Board, from: Square, color: Color, directions: &[(i32, i32)], moves: &mut Vec<Square>) {
    for &(d_row, d_col) in directions {
        for i in 1..8 {
            let Some(square) = from.offset(d_row * i, d_col * i) else {
                break;
            };
            match at(board, square) {
                None => moves.push(square),
                Some(piece) => {
                    if piece.color != color {
                        moves.push(square);
                    }
                    break;
                }
            }
        }
    }
}

fn step(board: &Board, from: Square, color: Color, deltas: &[(i32, i32)], moves: &mut Vec<Square>) {
    for &(d_row, d_col) in deltas {
        if let Some(square) = from.offset(d_row, d_col) {
            if at(board, square).map(|p| p.color != color).unwrap_or(true) {
                moves.push(square);
            }
        }
    }
}

fn pawn_moves(board: &Board, from: Square, color: Color, last_move: Option<&ChessMove>, moves: &mut Vec<Square>) {
    let direction = color.pawn_direction();

    if let Some(one) = from.offset(direction, 0) {
        if at(board, one).is_none() {
            moves.push(one);
            if from.row == color.pawn_start_row() {
                if let Some(two) = from.offset(2 * direction, 0) {
                    if at(board, two).is_none() {
                        moves.push(two);
                    }
                }
            }
        }
    }

    for d_col in [-1, 1] {
        let Some(target) = from.offset(direction, d_col) else {
            continue;
        };
        match at(board, target) {
            Some(piece) if piece.color != color => moves.push(target),
            None => {
                let en_passant = last_move.map_or(false, |last| {
                    last.piece.kind == PieceKind::Pawn
                        && last.piece.color != color
                        && last.to.row.abs_diff(last.from.row) == 2
                        && last.to.row == from.row
                        && last.to.col == target.col
                });
                if en_passant {
                    moves.push(target);
                }
            }
            _ => {}
        }
    }
}

fn king_moves(board: &Board, from: Square, king: Piece, moves: &mut Vec<Square>) {
    step(board, from, king.color, &KING_STEPS, moves);

    if king.has_moved || from.col != 4 || is_square_attacked(board, from, king.color) {
        return;
    }

    let row = from.row;
    let unmoved_rook = |col: usize| {
        matches!(board[row][col], Some(p) if p.kind == PieceKind::Rook && p.color == king.color && !p.has_moved)
    };
    let empty = |cols: &[usize]| cols.iter().all(|&c| board[row][c].is_none());
    let safe = |cols: &[usize]| {
        cols.iter()
            .all(|&c| !is_square_attacked(board, Square::new(row, c), king.color))
    };

    if unmoved_rook(7) && empty(&[5, 6]) && safe(&[5, 6]) {
        moves.push(Square::new(row, 6));
    }
    if unmoved_rook(0) && empty(&[1, 2, 3]) && safe(&[2, 3]) {
        moves.push(Square::new(row, 2));
    }
}

fn pseudo_moves(board: &Board, from: Square, last_move: Option<&ChessMove>) -> Vec<Square> {
    let Some(piece) = at(board, from) else {
        return Vec::new();
    };

    let mut moves = Vec::new();
    match piece.kind {
        PieceKind::Pawn => pawn_moves(board, from, piece.color, last_move, &mut moves),
        PieceKind::Rook => slide(board, from, piece.color, &ROOK_DIRECTIONS, &mut moves),
        PieceKind::Bishop => slide(board, from, piece.color, &BISHOP_DIRECTIONS, &mut moves),
        PieceKind::Queen => {
            slide(board, from, piece.color, &ROOK_DIRECTIONS, &mut moves);
            slide(board, from, piece.color, &BISHOP_DIRECTIONS, &mut moves);
        }
        PieceKind::Knight => step(board, from, piece.color, &KNIGHT_JUMPS, &mut moves),
        PieceKind::King => king_moves(board, from, piece, &mut moves),
    }
    moves
}

fn legal_moves(board: &Board, from: Square, last_move: Option<&ChessMove>) -> Vec<Square> {
    let Some(piece) = at(board, from) else {
        return Vec::new();
    };

    pseudo_moves(board, from, last_move)
        .into_iter()
        .filter(|&to| {
            let (after, _) = apply_move(board, piece, from, to);
            !is_king_in_check(&after, piece.color)
        })
        .collect()
}

fn has_any_legal_moves(board: &Board, color: Color, last_move: Option<&ChessMove>) -> bool {
    squares_of(board, color)
        .into_iter()
        .any(|square| !legal_moves(board, square, last_move).is_empty())
}

/// Move a piece, resolving en passant, castling and auto-queen promotion.
fn apply_move(board: &Board, piece: Piece, from: Square, to: Square) -> (Board, ChessMove) {
    let mut next = *board;
    let mut captured = at(board, to);
    let mut is_en_passant = false;
    let mut is_castling = false;
    let mut promotion_piece = None;

    next[to.row][to.col] = Some(Piece { has_moved: true, ..piece });
    next[from.row][from.col] = None;

    if piece.kind == PieceKind::Pawn && captured.is_none() && from.col != to.col {
        is_en_passant = true;
        captured = next[from.row][to.col].take();
    }

    if piece.kind == PieceKind::King && from.col.abs_diff(to.col) == 2 {
        is_castling = true;
        let (rook_from, rook_to) = if to.col > from.col { (7, 5) } else { (0, 3) };
        if let Some(rook) = next[from.row][rook_from].take() {
            next[from.row][rook_to] = Some(Piece { has_moved: true, ..rook });
        }
    }

    if piece.kind == PieceKind::Pawn && (to.row == 0 || to.row == 7) {
        promotion_piece = Some(PieceKind::Queen);
        next[to.row][to.col] = Some(Piece {
            kind: PieceKind::Queen,
            color: piece.color,
            has_moved: true,
        });
    }

    let chess_move = ChessMove {
        from,
        to,
        piece,
        captured_piece: captured,
        is_en_passant,
        is_castling,
        promotion_piece,
    };
    (next, chess_move)
}

fn find_king(board: &Board, color: Color) -> Option<Square> {
    for row in 0..8 {
        for col in 0..8 {
            if matches!(board[row][col], Some(p) if p.kind == PieceKind::King && p.color == color) {
                return Some(Square::new(row, col));
            }
        }
    }
    None
}

fn is_king_in_check(board: &Board, color: Color) -> bool {
    find_king(board, color)
        .map(|king| is_square_attacked(board, king, color))
        .unwrap_or(false)
}

fn is_square_attacked(board: &Board, square: Square, defending: Color) -> bool {
    squares_of(board, defending.opponent())
        .into_iter()
        .any(|from| can_attack(board, from, square))
}

fn can_attack(board: &Board, from: Square, to: Square) -> bool {
    let Some(piece) = at(board, from) else {
        return false;
    };

    let d_row = to.row as i32 - from.row as i32;
    let d_col = to.col as i32 - from.col as i32;
    if d_row == 0 && d_col == 0 {
        return false;
    }

    match piece.kind {
        PieceKind::Pawn => d_row == piece.color.pawn_direction() && d_col.abs() == 1,
        PieceKind::Rook => (d_row == 0 || d_col == 0) && is_path_clear(board, from, to),
        PieceKind::Knight => {
            (d_row.abs() == 2 && d_col.abs() == 1) || (d_row.abs() == 1 && d_col.abs() == 2)
        }
        PieceKind::Bishop => d_row.abs() == d_col.abs() && is_path_clear(board, from, to),
        PieceKind::Queen => {
            (d_row == 0 || d_col == 0 || d_row.abs() == d_col.abs())
                && is_path_clear(board, from, to)
        }
        PieceKind::King => d_row.abs() <= 1 && d_col.abs() <= 1,
    }
}

fn is_path_clear(board: &Board, from: Square, to: Square) -> bool {
    let d_row = (to.row as i32 - from.row as i32).signum();
    let d_col = (to.col as i32 - from.col as i32).signum();

    let mut current = from;
    loop {
        let Some(next) = current.offset(d_row, d_col) else {
            return false;
        };
        if next == to {
            return true;
        }
        if at(board, next).is_some() {
            return false;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(row: usize, col: usize) -> Square {
        Square::new(row, col)
    }

    fn empty_board() -> Board {
        [[None; 8]; 8]
    }

    fn place(board: &mut Board, row: usize, col: usize, kind: PieceKind, color: Color) {
        board[row][col] = Some(Piece::new(kind, color));
    }

    #[test]
    fn test_initial_position() {
        let state = ChessState::new();
        assert_eq!(state.all_legal_moves(Color::White).len(), 20);
        assert_eq!(state.all_legal_moves(Color::Black).len(), 20);
        assert_eq!(state.piece_at(sq(0, 4)).unwrap().kind, PieceKind::King);
        assert_eq!(state.piece_at(sq(7, 3)).unwrap().kind, PieceKind::Queen);
        assert_eq!(state.legal_moves(sq(6, 4)), vec![sq(5, 4), sq(4, 4)]);
        assert_eq!(state.legal_moves(sq(7, 1)), vec![sq(5, 0), sq(5, 2)]);
    }

    #[test]
    fn test_off_board_squares_are_ignored() {
        let mut state = ChessState::new();
        assert_eq!(state.piece_at(sq(8, 0)), None);
        assert!(state.legal_moves(sq(0, 8)).is_empty());
        assert!(state.make_move(sq(8, 4), sq(4, 4)).is_none());
        assert!(state.make_move(sq(6, 4), sq(9, 4)).is_none());

        assert!(state.select(sq(8, 0)).is_none());
        assert_eq!(state.selected_square, None);
        state.select(sq(6, 4));
        assert!(state.select(sq(6, 12)).is_none());
        assert_eq!(state.selected_square, None);
        assert!(state.move_history.is_empty());
    }

    #[test]
    fn test_fools_mate() {
        let mut state = ChessState::new();
        state.make_move(sq(6, 5), sq(5, 5)).unwrap();
        state.make_move(sq(1, 4), sq(3, 4)).unwrap();
        state.make_move(sq(6, 6), sq(4, 6)).unwrap();
        state.make_move(sq(0, 3), sq(4, 7)).unwrap();

        assert_eq!(state.game_status, ChessStatus::Checkmate);
        assert_eq!(state.winner(), Some(Color::Black));
        assert_eq!(state.status_message().as_deref(), Some("Checkmate! Black wins!"));
        assert!(state.select(sq(6, 4)).is_none());
    }

    #[test]
    fn test_en_passant() {
        let mut state = ChessState::new();
        state.make_move(sq(6, 4), sq(4, 4)).unwrap();
        state.make_move(sq(1, 0), sq(2, 0)).unwrap();
        state.make_move(sq(4, 4), sq(3, 4)).unwrap();
        state.make_move(sq(1, 3), sq(3, 3)).unwrap();

        assert!(state.legal_moves(sq(3, 4)).contains(&sq(2, 3)));
        state.make_move(sq(3, 4), sq(2, 3)).unwrap();

        let last = state.last_move.clone().unwrap();
        assert!(last.is_en_passant);
        assert_eq!(last.captured_piece.unwrap().kind, PieceKind::Pawn);
        assert!(state.piece_at(sq(3, 3)).is_none());
        assert_eq!(last.describe(), "♙ e5 → d6 x♟ (En Passant)");
    }

    #[test]
    fn test_castling_moves_rook() {
        let mut board = empty_board();
        place(&mut board, 7, 4, PieceKind::King, Color::White);
        place(&mut board, 7, 7, PieceKind::Rook, Color::White);
        place(&mut board, 7, 0, PieceKind::Rook, Color::White);
        place(&mut board, 0, 4, PieceKind::King, Color::Black);
        let mut state = ChessState::from_board(board, Color::White);

        let moves = state.legal_moves(sq(7, 4));
        assert!(moves.contains(&sq(7, 6)));
        assert!(moves.contains(&sq(7, 2)));

        state.make_move(sq(7, 4), sq(7, 6)).unwrap();
        assert_eq!(state.piece_at(sq(7, 5)).unwrap().kind, PieceKind::Rook);
        assert!(state.piece_at(sq(7, 7)).is_none());
        assert!(state.last_move.as_ref().unwrap().is_castling);
    }

    #[test]
    fn test_no_castling_through_attacked_square() {
        let mut board = empty_board();
        place(&mut board, 7, 4, PieceKind::King, Color::White);
        place(&mut board, 7, 7, PieceKind::Rook, Color::White);
        place(&mut board, 0, 5, PieceKind::Rook, Color::Black);
        place(&mut board, 0, 0, PieceKind::King, Color::Black);
        let state = ChessState::from_board(board, Color::White);

        assert!(!state.legal_moves(sq(7, 4)).contains(&sq(7, 6)));
    }

    #[test]
    fn test_promotion_gives_check() {
        let mut board = empty_board();
        place(&mut board, 1, 0, PieceKind::Pawn, Color::White);
        place(&mut board, 7, 4, PieceKind::King, Color::White);
        place(&mut board, 0, 7, PieceKind::King, Color::Black);
        let mut state = ChessState::from_board(board, Color::White);

        state.make_move(sq(1, 0), sq(0, 0)).unwrap();
        assert_eq!(state.piece_at(sq(0, 0)).unwrap().kind, PieceKind::Queen);
        assert_eq!(state.game_status, ChessStatus::Check);
        assert_eq!(state.last_move.as_ref().unwrap().promotion_piece, Some(PieceKind::Queen));
        assert_eq!(state.status_message().as_deref(), Some("Check!"));
    }

    #[test]
    fn test_stalemate() {
        let mut board = empty_board();
        place(&mut board, 0, 0, PieceKind::King, Color::Black);
        place(&mut board, 3, 1, PieceKind::Queen, Color::White);
        place(&mut board, 7, 7, PieceKind::King, Color::White);
        let mut state = ChessState::from_board(board, Color::White);

        state.make_move(sq(3, 1), sq(2, 1)).unwrap();
        assert_eq!(state.game_status, ChessStatus::Stalemate);
        assert_eq!(state.winner(), None);
    }

    #[test]
    fn test_pinned_piece_cannot_move() {
        let mut board = empty_board();
        place(&mut board, 7, 4, PieceKind::King, Color::White);
        place(&mut board, 6, 4, PieceKind::Bishop, Color::White);
        place(&mut board, 0, 4, PieceKind::Rook, Color::Black);
        place(&mut board, 0, 0, PieceKind::King, Color::Black);
        let state = ChessState::from_board(board, Color::White);

        assert!(state.legal_moves(sq(6, 4)).is_empty());
    }

    #[test]
    fn test_selection_state_machine() {
        let mut state = ChessState::new();

        assert!(state.select(sq(1, 4)).is_none());
        assert_eq!(state.selected_square, None);

        state.select(sq(6, 4));
        assert_eq!(state.selected_square, Some(sq(6, 4)));
        assert_eq!(state.possible_moves.len(), 2);

        state.select(sq(6, 4));
        assert_eq!(state.selected_square, None);

        state.select(sq(6, 4));
        state.select(sq(6, 3));
        assert_eq!(state.selected_square, Some(sq(6, 3)));

        let action = state.select(sq(4, 3)).unwrap();
        assert!(matches!(action, ChessAction::ChessMove { .. }));
        assert_eq!(state.current_player, Color::Black);
        assert_eq!(state.selected_square, None);
        assert_eq!(state.move_history[0].describe(), "♙ d2 → d4");
    }

    #[test]
    fn test_clock_forfeit() {
        let mut state = ChessState::new();
        state.time_remaining.white = 2;

        assert!(state.tick().is_none());
        let action = state.tick().unwrap();
        assert_eq!(
            action,
            ChessAction::TimeForfeit { winner: Color::Black, reason: "Time expired".to_string() }
        );
        assert_eq!(state.game_status, ChessStatus::Checkmate);
        assert!(state.tick().is_none());
        assert_eq!(format_clock(600), "10:00");
        assert_eq!(format_clock(65), "1:05");
    }

    #[test]
    fn test_move_payload_shape() {
        let mut state = ChessState::new();
        let action = state.make_move(sq(6, 4), sq(4, 4)).unwrap();
        let json = serde_json::to_value(&action).unwrap();

        assert_eq!(json["type"], "CHESS_MOVE");
        assert_eq!(json["move"]["piece"]["type"], "pawn");
        assert_eq!(json["gameState"]["currentPlayer"], "black");
    }

    #[test]
    fn test_sync_from_remote() {
        let mut state = ChessState::new();
        state
            .sync_from(&serde_json::json!({ "currentPlayer": "black", "gameStatus": "check" }))
            .unwrap();
        assert_eq!(state.current_player, Color::Black);
        assert_eq!(state.game_status, ChessStatus::Check);
        assert_eq!(state.all_legal_moves(Color::White).len(), 20);
    }
}
