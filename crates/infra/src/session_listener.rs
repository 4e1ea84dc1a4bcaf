use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use panelhub_events::{NotificationBus, Subscription};

/// Handle to stop and join a listener.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Request shutdown and wait for the listener thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Long-lived subscriber for "session changed" notifications.
///
/// - Subscribes once, at spawn
/// - Hands each message to `handler` in arrival order
/// - A failing handler is logged; the listener keeps going
/// - Stops on `ListenerHandle::shutdown` or when the bus disconnects
#[derive(Debug)]
pub struct SessionListener;

impl SessionListener {
    pub fn spawn<M, B, H>(name: &'static str, bus: &B, mut handler: H) -> ListenerHandle
    where
        M: Send + 'static,
        B: NotificationBus<M> + ?Sized,
        H: FnMut(M) -> anyhow::Result<()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || listen(name, sub, shutdown_rx, &mut handler))
            .expect("failed to spawn session listener thread");

        ListenerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn listen<M, H>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    handler: &mut H,
) where
    H: FnMut(M) -> anyhow::Result<()>,
{
    let tick = Duration::from_millis(100);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Err(err) = handler(msg) {
                    warn!(listener = name, error = %err, "session notification handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(listener = name, "session listener stopped");
}
