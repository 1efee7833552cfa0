//! Change-set interpretation and square notation.
//! A normal non-capture move vacates exactly one square and occupies exactly
//! one other, so a change set of exactly two cells is read as a move: first
//! cell in row-major order is the origin, second the destination. Castling,
//! en passant and rendering glitches produce other arities and are reported
//! as "no move" rather than guessed at.

use shakmaty::{File, Rank, Square};

use crate::Orientation;
use crate::grid::Cell;

/// Maps a board cell to its square under the given orientation.
///
/// White bottom: file runs a..h left to right, rank 8 is the top row.
/// Black bottom: both axes reverse, so the visual top-left is h1.
pub fn square_to_uci(cell: Cell, orientation: Orientation) -> Square {
    let (file_index, rank_index) = if orientation.is_flipped() {
        (7 - cell.col as u32, cell.row as u32)
    } else {
        (cell.col as u32, 7 - cell.row as u32)
    };
    Square::from_coords(File::new(file_index), Rank::new(rank_index))
}

/// Interprets a change set as a UCI move string, e.g. `"e2e4"`.
///
/// Returns `None` for any arity other than exactly two - ambiguity is a
/// normal outcome here, never an error.
pub fn infer_move(changes: &[Cell], orientation: Orientation) -> Option<String> {
    match changes {
        [from, to] => Some(format!(
            "{}{}",
            square_to_uci(*from, orientation),
            square_to_uci(*to, orientation)
        )),
        _ => None,
    }
}
