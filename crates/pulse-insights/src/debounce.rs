use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

/// Quiet period before a search box change triggers a fetch.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Quiet period before a username availability lookup.
pub const USERNAME_DEBOUNCE: Duration = Duration::from_millis(500);

/// Latest-wins delayed commit for one input field.
///
/// Every `push` restarts the window. When the field has been quiet for
/// `delay`, the most recent value is emitted on the receiver returned by
/// `new`. Dropping the handle flushes a pending value and stops the task.
/// One debouncer per field; they share no timers.
pub struct Debouncer<T> {
    input: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> (Self, mpsc::Receiver<T>) {
        let (input, input_rx) = mpsc::unbounded_channel();
        let (output, output_rx) = mpsc::channel(16);
        tokio::spawn(run(input_rx, output, delay));
        (Self { input }, output_rx)
    }

    /// Returns false once the consumer side has gone away.
    pub fn push(&self, value: T) -> bool {
        self.input.send(value).is_ok()
    }
}

async fn run<T>(mut input: mpsc::UnboundedReceiver<T>, output: mpsc::Sender<T>, delay: Duration) {
    let mut pending: Option<T> = None;

    loop {
        match pending.take() {
            None => match input.recv().await {
                Some(value) => pending = Some(value),
                None => break,
            },
            Some(value) => {
                tokio::select! {
                    next = input.recv() => match next {
                        Some(newer) => {
                            trace!("Debounce window restarted");
                            pending = Some(newer);
                        }
                        None => {
                            let _ = output.send(value).await;
                            break;
                        }
                    },
                    _ = tokio::time::sleep(delay) => {
                        if output.send(value).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}
