//! Episode credit commands.

use screencast_core::UserId;
use screencast_web::db::UserRepository;

use super::{CommandError, connect};

/// Parse `--user-id` arguments, dropping duplicates.
fn parse_user_ids(raw: &[String]) -> Result<Vec<UserId>, CommandError> {
    let mut ids = Vec::with_capacity(raw.len());
    for value in raw {
        let id = value
            .trim()
            .parse::<UserId>()
            .map_err(|_| CommandError::InvalidUserId(value.clone()))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Give one credit to each listed user, plus every free-episode user when
/// `free_episode_users` is set.
///
/// Returns how many users were credited.
///
/// # Errors
///
/// Returns `CommandError` if an id is malformed or a query fails.
pub async fn grant(user_ids: &[String], free_episode_users: bool) -> Result<usize, CommandError> {
    let mut ids = parse_user_ids(user_ids)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    if free_episode_users {
        for user in users.fetch_free_episode_users().await? {
            if !ids.contains(&user.id) {
                ids.push(user.id);
            }
        }
    }

    if ids.is_empty() {
        tracing::warn!("No users selected; nothing to do");
        return Ok(0);
    }

    let credited = users.increment_episode_credits(&ids).await?;
    for user in &credited {
        tracing::info!(
            user_id = %user.id,
            credits = user.episode_credit_count,
            "Episode credit granted"
        );
    }
    Ok(credited.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_ids_dedupes() {
        let raw = vec![
            "00000000-0000-0000-0000-000000000001".to_string(),
            " 00000000-0000-0000-0000-000000000001 ".to_string(),
        ];
        assert_eq!(parse_user_ids(&raw).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_user_ids_rejects_garbage() {
        let raw = vec!["blob".to_string()];
        assert!(matches!(
            parse_user_ids(&raw),
            Err(CommandError::InvalidUserId(value)) if value == "blob"
        ));
    }
}
