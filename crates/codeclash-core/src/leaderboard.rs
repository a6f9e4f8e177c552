use std::cmp::Ordering;

use crate::player::Player;

/// Leaderboard comparison between two players:
/// best `num_correct` descending, tie-broken by the `start_time` of the
/// submission that achieved it, ascending. Players without submissions
/// sort last and are mutually unordered.
pub fn compare(a: &Player, b: &Player) -> Ordering {
    match (a.best_submission(), b.best_submission()) {
        (Some(x), Some(y)) => y
            .num_correct
            .cmp(&x.num_correct)
            .then(x.start_time.cmp(&y.start_time)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Rank a snapshot of players. Stable, so zero-submission players keep
/// their input order at the bottom. Recomputed on every read; the
/// result is never cached because histories keep growing.
pub fn rank<'a>(players: &[&'a Player]) -> Vec<&'a Player> {
    let mut ranked = players.to_vec();
    ranked.sort_by(|a, b| compare(a, b));
    ranked
}
