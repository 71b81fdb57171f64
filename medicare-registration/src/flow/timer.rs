use std::time::Duration;

use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

use super::Message;

/// A timer task posting into the controller inbox. Dropping the handle stops
/// the timer.
#[derive(Debug)]
pub struct TimerHandle(JoinHandle<()>);

impl TimerHandle {
    /// Posts `message()` every `period`, starting one period from now.
    pub fn every(
        period: Duration,
        sender: UnboundedSender<Message>,
        message: impl Fn() -> Message + Send + 'static,
    ) -> Self {
        Self(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if sender.send(message()).is_err() {
                    // The controller is gone.
                    break;
                }
            }
        }))
    }

    /// Posts `message` once after `delay`.
    pub fn after(delay: Duration, sender: UnboundedSender<Message>, message: Message) -> Self {
        Self(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(message);
        }))
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}
