use serde::Serialize;

use super::repo::UserTotal;

pub const ANONYMOUS_ID: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: String,
    pub username: String,
    pub total_score: i64,
    pub rank: usize,
}

/// Rank totals by score, highest first. Ties keep a stable order by id.
pub fn rank(totals: Vec<UserTotal>) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<_> = totals
        .into_iter()
        .map(|t| {
            let username = match (&t.user_id, t.username) {
                (_, Some(name)) if !name.trim().is_empty() => name,
                (None, _) => "Guest".to_string(),
                (Some(_), _) => "Unknown".to_string(),
            };
            LeaderboardEntry {
                id: t
                    .user_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| ANONYMOUS_ID.to_string()),
                username,
                total_score: t.total_score,
                rank: 0,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total_score
            .cmp(&a.total_score)
            .then_with(|| a.id.cmp(&b.id))
    });
    for (i, e) in entries.iter_mut().enumerate() {
        e.rank = i + 1;
    }
    entries
}
