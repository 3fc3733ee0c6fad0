//! Daily sign-in.

use std::sync::Arc;

use async_trait::async_trait;
use bronze::prelude::*;
use bronze::runtime::config::StorageConfig;
use rand::Rng;
use time::{Duration, OffsetDateTime, macros::format_description};

/// What the bot remembers about a user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: i64,
    pub nickname: String,
    pub coins: i64,
    pub sign_expire: OffsetDateTime,
}

impl UserProfile {
    fn new(user_id: i64, nickname: impl Into<String>) -> Self {
        Self {
            user_id,
            nickname: nickname.into(),
            coins: 0,
            sign_expire: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

impl Profile for UserProfile {
    type Id = i64;

    fn id(&self) -> i64 {
        self.user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignOutcome {
    Signed { gained: i64 },
    AlreadySigned,
}

/// Applies a sign-in at `now`. A user can sign again once a day has passed.
fn apply_sign(profile: &mut UserProfile, now: OffsetDateTime, gained: i64) -> SignOutcome {
    if profile.sign_expire > now {
        return SignOutcome::AlreadySigned;
    }
    profile.coins += gained;
    profile.sign_expire = now + Duration::days(1);
    SignOutcome::Signed { gained }
}

fn format_date(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]/[month]/[day]"))
        .unwrap_or_else(|_| at.date().to_string())
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// The profile store named by `[storage]`. Only `memory://` has a backend
/// here; any other uri falls back to memory with a warning.
pub fn open_profiles(storage: &StorageConfig) -> BoxedProfileStore<UserProfile> {
    if !storage.is_memory() {
        warn!(
            uri = %storage.uri,
            database = %storage.database,
            "No driver for this storage uri, keeping profiles in memory"
        );
    }
    Arc::new(MemoryProfileStore::new())
}

/// `签到`: adds 10 to 98 coins, at most once a day.
pub struct SignCommand {
    profiles: BoxedProfileStore<UserProfile>,
}

impl SignCommand {
    pub fn new(profiles: BoxedProfileStore<UserProfile>) -> Self {
        Self { profiles }
    }

    async fn sign(
        &self,
        ctx: &MessageContext,
        now: OffsetDateTime,
        gained: i64,
    ) -> anyhow::Result<()> {
        let user_id = ctx.user_id();
        let mut profile = match self.profiles.get(&user_id).await? {
            Some(profile) => profile,
            None => {
                let nickname = ctx.sender().display_name().unwrap_or("未知用户");
                UserProfile::new(user_id, nickname)
            }
        };

        let reply = match apply_sign(&mut profile, now, gained) {
            SignOutcome::AlreadySigned => format!(
                "今天已经签到过了！\n下次签到时间：{}",
                format_date(profile.sign_expire)
            ),
            SignOutcome::Signed { gained } => {
                let expire = profile.sign_expire;
                self.profiles.upsert(profile).await?;
                debug!(user_id, gained, "Signed in");
                format!(
                    "签到成功！\n本次获得 {gained} 积分！\n下次签到时间：{}",
                    format_date(expire)
                )
            }
        };

        ctx.quick_reply(reply, QuickReplyOptions::default()).await?;
        Ok(())
    }
}

#[async_trait]
impl CommandExecutor for SignCommand {
    async fn execute(&self, ctx: &MessageContext) -> anyhow::Result<()> {
        let gained = rand::thread_rng().gen_range(10..99);
        self.sign(ctx, now(), gained).await
    }
}

#[cfg(test)]
mod tests {
    use bronze::core::ApiResult;
    use bronze::onebot::{CallResult, MessageReceipt};
    use parking_lot::Mutex;
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[derive(Default)]
    struct RecordingReplyer {
        sent: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl Replyer for RecordingReplyer {
        async fn send(
            &self,
            _target: ReplyTarget,
            message: Message,
        ) -> ApiResult<CallResult<MessageReceipt>> {
            self.sent.lock().push(message);
            Ok(CallResult::synthesized())
        }

        async fn quick_operation(&self, _event: &Event, _operation: QuickOperation) -> ApiResult<()> {
            Ok(())
        }

        async fn get_msg(&self, _message_id: i64) -> ApiResult<MessageDetail> {
            Ok(MessageDetail::default())
        }
    }

    fn private_context() -> (MessageContext, Arc<RecordingReplyer>) {
        let value = json!({
            "time": 1700000000, "self_id": 10000,
            "post_type": "message", "message_type": "private", "sub_type": "friend",
            "message_id": 1, "user_id": 20000,
            "message": "签到", "raw_message": "签到", "font": 0,
            "sender": {"user_id": 20000, "nickname": "alice"}
        });
        let event = Arc::new(Event::from_value(&value).unwrap());
        let replyer = Arc::new(RecordingReplyer::default());
        let ctx = MessageContext::new(event, replyer.clone()).unwrap();
        (ctx, replyer)
    }

    #[test]
    fn test_apply_sign_once_a_day() {
        let now = datetime!(2024-03-01 09:00 UTC);
        let mut profile = UserProfile::new(1, "alice");

        assert_eq!(
            apply_sign(&mut profile, now, 42),
            SignOutcome::Signed { gained: 42 }
        );
        assert_eq!(profile.coins, 42);
        assert_eq!(format_date(profile.sign_expire), "2024/03/02");

        let later = now + Duration::hours(23);
        assert_eq!(apply_sign(&mut profile, later, 10), SignOutcome::AlreadySigned);
        assert_eq!(profile.coins, 42);

        let next_day = now + Duration::days(1);
        assert_eq!(
            apply_sign(&mut profile, next_day, 10),
            SignOutcome::Signed { gained: 10 }
        );
        assert_eq!(profile.coins, 52);
    }

    #[tokio::test]
    async fn test_sign_command_stores_profile() {
        let store = Arc::new(MemoryProfileStore::<UserProfile>::new());
        let command = SignCommand::new(store.clone());
        let (ctx, replyer) = private_context();
        let now = datetime!(2024-03-01 09:00 UTC);

        command.sign(&ctx, now, 30).await.unwrap();
        command.sign(&ctx, now + Duration::hours(1), 30).await.unwrap();

        let profile = store.get(&20000).await.unwrap().unwrap();
        assert_eq!(profile.coins, 30);
        assert_eq!(profile.nickname, "alice");

        let sent = replyer.sent.lock();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].plain_text().contains("本次获得 30 积分！"));
        assert!(sent[1].plain_text().starts_with("今天已经签到过了"));
        assert!(sent[1].plain_text().contains("2024/03/02"));
    }

    #[tokio::test]
    async fn test_open_profiles_from_config() {
        let storage = StorageConfig {
            uri: "memory://".into(),
            database: "bronze".into(),
        };
        let store = open_profiles(&storage);
        store.upsert(UserProfile::new(7, "carol")).await.unwrap();
        assert_eq!(store.get(&7).await.unwrap().unwrap().nickname, "carol");

        // Unsupported backends still get a working store.
        let store = open_profiles(&StorageConfig::default());
        assert!(store.get(&7).await.unwrap().is_none());
    }
}
