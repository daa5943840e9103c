use tokio::sync::broadcast::{
    self,
    error::{
        RecvError,
        TryRecvError,
    },
};
use tracing::{
    debug,
    warn,
};

const DEFAULT_CAPACITY: usize = 32;

/// Signals exchanged between the faucet flow and whatever presents it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    ModalOpen,
    ModalClose,
    CaptchaOpen,
    CaptchaClose,
    RefreshBalance,
    AnimationDisable,
    AnimationEnable,
}

impl Topic {
    pub fn name(&self) -> &'static str {
        match self {
            Topic::ModalOpen => "algofaucet:modal:open",
            Topic::ModalClose => "algofaucet:modal:close",
            Topic::CaptchaOpen => "algofaucet:captcha:open",
            Topic::CaptchaClose => "algofaucet:captcha:close",
            Topic::RefreshBalance => "algofaucet:refresh-balance",
            Topic::AnimationDisable => "algofaucet:animation:disable",
            Topic::AnimationEnable => "algofaucet:animation:enable",
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Topic>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscriptions were listening.
    pub fn publish(&self, topic: Topic) -> usize {
        debug!(topic = topic.name(), "publish");
        self.sender.send(topic).unwrap_or(0)
    }

    /// Listens for `topics` until the returned guard is dropped.
    pub fn subscribe(&self, topics: &[Topic]) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            topics: topics.to_vec(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<Topic>,
    topics: Vec<Topic>,
}

impl Subscription {
    fn wants(&self, topic: Topic) -> bool {
        self.topics.is_empty() || self.topics.contains(&topic)
    }

    /// Next matching topic, or `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<Topic> {
        loop {
            match self.receiver.recv().await {
                Ok(topic) if self.wants(topic) => return Some(topic),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching topic that is already queued.
    pub fn try_next(&mut self) -> Option<Topic> {
        loop {
            match self.receiver.try_recv() {
                Ok(topic) if self.wants(topic) => return Some(topic),
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything matching that is already queued, oldest first.
    pub fn drain(&mut self) -> Vec<Topic> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
