//! Terminal command parsing

use shared::Direction;

/// Maps one line of terminal input to a movement direction.
///
/// `w`/`a`/`s`/`d` move up/left/down/right (screen coordinates, y grows
/// downwards). Any other line, including an empty one, stops the player.
/// `q` returns `None` to quit.
pub fn parse_command(line: &str) -> Option<Direction> {
    let (vx, vy) = match line.trim().to_lowercase().as_str() {
        "q" => return None,
        "w" => (0, -1),
        "s" => (0, 1),
        "a" => (-1, 0),
        "d" => (1, 0),
        _ => (0, 0),
    };
    Direction::new(vx, vy)
}

pub const HELP: &str = "Use keys: w/a/s/d + ENTER to move, ENTER to stop, q to quit";
