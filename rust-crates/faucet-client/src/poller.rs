use crate::{
    node::ChainQuery,
    verification::{
        FaucetBalance,
        VerificationClient,
    },
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{
        mpsc,
        watch,
    },
    task::JoinHandle,
    time,
};
use tracing::debug;

enum PollerCommand {
    RefreshNow,
    Shutdown,
}

/// Background task refreshing one value on a fixed interval.
///
/// The first fetch happens immediately. Dropping the poller aborts the task,
/// so a closed surface never leaves a repeating timer behind.
pub struct Poller<T> {
    label: &'static str,
    latest: watch::Receiver<T>,
    commands: mpsc::UnboundedSender<PollerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl<T> Poller<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn spawn<F, Fut>(label: &'static str, every: Duration, initial: T, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (latest_tx, latest) = watch::channel(initial);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(poll_worker(label, every, fetch, command_rx, latest_tx));
        debug!(label, ?every, "poller started");
        Self {
            label,
            latest,
            commands,
            handle: Some(handle),
        }
    }

    pub fn latest(&self) -> T {
        self.latest.borrow().clone()
    }

    /// Receiver that is notified whenever the polled value changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.latest.clone()
    }

    pub fn refresh(&self) {
        let _ = self.commands.send(PollerCommand::RefreshNow);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the task and waits for it to exit.
    pub async fn stop(mut self) {
        let _ = self.commands.send(PollerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        debug!(label = self.label, "poller stopped");
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn poll_worker<T, F, Fut>(
    label: &'static str,
    every: Duration,
    fetch: F,
    mut command_rx: mpsc::UnboundedReceiver<PollerCommand>,
    latest_tx: watch::Sender<T>,
) where
    T: PartialEq,
    F: Fn() -> Fut,
    Fut: Future<Output = T>,
{
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            cmd = command_rx.recv() => match cmd {
                Some(PollerCommand::RefreshNow) => {}
                Some(PollerCommand::Shutdown) | None => break,
            },
        }
        let value = fetch().await;
        latest_tx.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
    debug!(label, "poll worker exiting");
}

pub type HeightPoller = Poller<u64>;
pub type BalancePoller = Poller<FaucetBalance>;

/// Chain height, refreshed while the captcha is open.
pub fn spawn_height_poller<N>(verifier: Arc<VerificationClient<N>>, every: Duration) -> HeightPoller
where
    N: ChainQuery + 'static,
{
    Poller::spawn("height", every, 0, move || {
        let verifier = Arc::clone(&verifier);
        async move { verifier.current_height().await }
    })
}

/// Faucet escrow balance for the balance display.
pub fn spawn_balance_poller<N>(
    verifier: Arc<VerificationClient<N>>,
    every: Duration,
) -> BalancePoller
where
    N: ChainQuery + 'static,
{
    Poller::spawn("faucet balance", every, FaucetBalance::default(), move || {
        let verifier = Arc::clone(&verifier);
        async move { verifier.faucet_balance().await }
    })
}
