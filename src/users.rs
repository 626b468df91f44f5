use tracing::info;

use crate::messaging::messages::UserMessage;
use crate::messaging::{MessageProducer, Result, RoutingKey};
use crate::models::User;

/// Publishes user changes for the services that mirror users
#[derive(Clone)]
pub struct UserService {
    producer: MessageProducer,
}

impl UserService {
    pub fn new(producer: MessageProducer) -> Self {
        Self { producer }
    }

    pub async fn publish_user(&self, user: &User) -> Result<()> {
        let message = UserMessage {
            id: user.id.clone(),
            username: user.username.clone(),
            deleted: user.deleted,
        };
        self.producer.send(RoutingKey::UserUser, &message).await?;
        info!(user_id = %user.id, deleted = user.deleted, "User published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{InProcessBus, MessageBus, MessagingError, SchemaRegistry};
    use crate::models::UserId;
    use crate::observability::Metrics;
    use std::sync::Arc;

    fn service(bus: Arc<InProcessBus>) -> UserService {
        UserService::new(MessageProducer::new(
            bus,
            Arc::new(SchemaRegistry::standard()),
            "General",
            Arc::new(Metrics::new()),
        ))
    }

    #[tokio::test]
    async fn test_publish_user() {
        let bus = Arc::new(InProcessBus::new(4));
        let mut sub = bus.subscribe(RoutingKey::UserUser).await.unwrap();

        let user = User {
            id: UserId::from("u1"),
            username: "ada".to_string(),
            deleted: true,
        };
        service(bus.clone()).publish_user(&user).await.unwrap();

        let delivery = sub.recv().await.unwrap();
        let message: UserMessage = serde_json::from_slice(&delivery.payload).unwrap();
        assert_eq!(message.username, "ada");
        assert!(message.deleted);
    }

    #[tokio::test]
    async fn test_blank_username_never_reaches_the_bus() {
        let bus = Arc::new(InProcessBus::new(4));
        let user = User {
            id: UserId::from("u1"),
            username: String::new(),
            deleted: false,
        };

        let result = service(bus).publish_user(&user).await;
        assert!(matches!(result, Err(MessagingError::Schema(_))));
    }
}
