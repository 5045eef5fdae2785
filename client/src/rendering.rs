use shared::StateSnapshot;
use std::fmt::Write;

/// Formats a snapshot as the text block printed after every update
pub fn render_state(snapshot: &StateSnapshot) -> String {
    let mut out = String::from("\n=== GAME STATE ===\n");

    for (id, player) in &snapshot.players {
        let _ = writeln!(
            out,
            "Player {}: x={:.1}, y={:.1}, score={}",
            id, player.x, player.y, player.score
        );
    }

    let coins: Vec<String> = snapshot
        .coins
        .iter()
        .map(|coin| format!("({:.0}, {:.0})", coin.x, coin.y))
        .collect();
    let _ = write!(out, "Coins: [{}]", coins.join(", "));

    out
}
