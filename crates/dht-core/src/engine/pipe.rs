//! In-process actor pipe between the client façade and the engine (spec §5
//! "Actor handshake", §6.4). Single-writer/single-reader per direction,
//! built on `tokio::sync::mpsc` the way `lib-network`'s actor-style workers
//! are wired, plus two one-shot handshake signals for spawn/teardown.

use tokio::sync::{mpsc, oneshot};

/// One client command: its frames (§6.4: "one or more UTF-8 frames") and the
/// channel the engine replies on.
pub struct ClientRequest {
    pub frames: Vec<String>,
    reply: oneshot::Sender<Vec<String>>,
}

impl ClientRequest {
    pub fn reply(self, frames: Vec<String>) {
        let _ = self.reply.send(frames);
    }
}

/// The client-facing end, held by the calling application's thread.
pub struct ClientHandle {
    commands: mpsc::Sender<ClientRequest>,
    ready: Option<oneshot::Receiver<()>>,
    done: Option<oneshot::Receiver<()>>,
}

/// The engine-facing end, owned by the engine's event loop.
pub struct EngineHandle {
    commands: mpsc::Receiver<ClientRequest>,
    ready: Option<oneshot::Sender<()>>,
    done: Option<oneshot::Sender<()>>,
}

/// Creates a fresh, unestablished pipe. The client must await
/// [`ClientHandle::wait_ready`] before issuing any command other than the
/// implicit wait itself (spec §5: "the client façade blocks on that signal
/// before accepting caller operations").
pub fn pipe(capacity: usize) -> (ClientHandle, EngineHandle) {
    let (commands_tx, commands_rx) = mpsc::channel(capacity);
    let (ready_tx, ready_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();

    (
        ClientHandle {
            commands: commands_tx,
            ready: Some(ready_rx),
            done: Some(done_rx),
        },
        EngineHandle {
            commands: commands_rx,
            ready: Some(ready_tx),
            done: Some(done_tx),
        },
    )
}

impl ClientHandle {
    /// Blocks until the engine signals it has completed initialisation.
    pub async fn wait_ready(&mut self) {
        if let Some(ready) = self.ready.take() {
            let _ = ready.await;
        }
    }

    /// Sends one command and awaits its reply frames.
    pub async fn call(&self, frames: Vec<String>) -> Option<Vec<String>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ClientRequest {
                frames,
                reply: reply_tx,
            })
            .await
            .ok()?;
        reply_rx.await.ok()
    }

    /// Sends `STOP` and blocks on the engine's final teardown signal (spec
    /// §5: "the client sends a terminate sentinel and blocks on a final pipe
    /// signal").
    pub async fn stop(&mut self) {
        let _ = self.call(vec!["STOP".to_string()]).await;
        if let Some(done) = self.done.take() {
            let _ = done.await;
        }
    }
}

impl EngineHandle {
    /// Signals initialisation complete; a no-op if already signalled.
    pub fn signal_ready(&mut self) {
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(());
        }
    }

    pub async fn recv(&mut self) -> Option<ClientRequest> {
        self.commands.recv().await
    }

    /// Signals teardown complete; a no-op if already signalled.
    pub fn signal_done(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}
