use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use uuid::Uuid;

use bolo_db::Database;
use bolo_db::models::NewUser;
use bolo_gateway::bot::BotIdentity;

/// Reserved account name of the assistant.
pub const BOT_USERNAME: &str = "BoloAI";
const BOT_EMAIL: &str = "ai@bologpt.com";
const BOT_AVATAR: &str = "https://api.dicebear.com/6.x/bottts/svg?seed=BoloAI";
const BOT_ABOUT: &str = "I am your AI Assistant 🤖";

/// Find the bot account, creating it on first start. Safe to call on every
/// boot; the id never changes once created.
pub async fn ensure_bot(db: Arc<Database>) -> anyhow::Result<BotIdentity> {
    let (row, created) = tokio::task::spawn_blocking(move || {
        if let Some(row) = db.get_user_by_username(BOT_USERNAME)? {
            return Ok((row, false));
        }

        // Random password nobody knows: the bot never logs in.
        let password = crate::auth::hash_password(&Uuid::new_v4().to_string())?;
        db.ensure_user(&NewUser {
            id: Uuid::new_v4().to_string(),
            username: BOT_USERNAME.to_string(),
            email: BOT_EMAIL.to_string(),
            password,
            avatar_image: BOT_AVATAR.to_string(),
            about: BOT_ABOUT.to_string(),
        })
    })
    .await
    .context("spawn_blocking join error")?
    .context("resolving bot account")?;

    if created {
        info!("BoloAI bot created: {}", row.id);
    } else {
        info!("BoloAI bot loaded: {}", row.id);
    }

    Ok(BotIdentity {
        id: row.id,
        username: row.username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_bot_is_idempotent() {
        let db = Arc::new(Database::open_in_memory().unwrap());

        let first = ensure_bot(db.clone()).await.unwrap();
        let second = ensure_bot(db.clone()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.username, BOT_USERNAME);

        let row = db.get_user_by_username(BOT_USERNAME).unwrap().unwrap();
        assert_eq!(row.id, first.id);
        assert_eq!(row.email, BOT_EMAIL);
    }
}
