//! Per-session message queues shared between a connection and the tick loop
//!
//! Each direction is a tokio channel. Inbound commands go through a bounded
//! channel owned on the receiving side by the tick loop; outbound messages go
//! through an unbounded channel drained by the connection's writer task.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::ws::protocol::{Command, ServerMsg};

/// Tick-loop side of a session
#[derive(Debug)]
pub struct Mailbox {
    incoming: mpsc::Receiver<Command>,
    outgoing: mpsc::UnboundedSender<ServerMsg>,
}

impl Mailbox {
    /// Queue a message for the client
    ///
    /// Never blocks. If the connection is already gone the message is dropped;
    /// the session itself is removed once its departure event is processed.
    pub fn enqueue_outgoing(&self, msg: ServerMsg) {
        let _ = self.outgoing.send(msg);
    }

    /// Oldest pending command, if any
    pub fn pop_incoming_command(&mut self) -> Option<Command> {
        match self.incoming.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Connection side of a session, split between the reader and writer tasks
#[derive(Debug)]
pub struct SessionLink {
    pub commands: CommandSender,
    pub outgoing: OutgoingReceiver,
}

/// Used by the reader task: pushes commands and can queue notices of its own
#[derive(Debug, Clone)]
pub struct CommandSender {
    commands: mpsc::Sender<Command>,
    notices: mpsc::UnboundedSender<ServerMsg>,
}

impl CommandSender {
    /// Queue a command for the tick loop, waiting while the queue is full
    ///
    /// Returns false once the tick loop has dropped this session.
    pub async fn push_incoming_command(&self, command: Command) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Queue a warning or fatal notice behind any pending outbound messages
    pub fn enqueue_outgoing(&self, msg: ServerMsg) {
        let _ = self.notices.send(msg);
    }
}

/// Used by the writer task
#[derive(Debug)]
pub struct OutgoingReceiver {
    outgoing: mpsc::UnboundedReceiver<ServerMsg>,
}

impl OutgoingReceiver {
    /// Next message to put on the wire; `None` once every sender is gone
    pub async fn pop_outgoing(&mut self) -> Option<ServerMsg> {
        self.outgoing.recv().await
    }

    #[cfg(test)]
    pub fn try_pop_outgoing(&mut self) -> Option<ServerMsg> {
        self.outgoing.try_recv().ok()
    }
}

/// Create the two ends of a session's queues
pub fn session_channel(command_capacity: usize) -> (Mailbox, SessionLink) {
    let (command_tx, command_rx) = mpsc::channel(command_capacity.max(1));
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

    let mailbox = Mailbox {
        incoming: command_rx,
        outgoing: outgoing_tx.clone(),
    };
    let link = SessionLink {
        commands: CommandSender {
            commands: command_tx,
            notices: outgoing_tx,
        },
        outgoing: OutgoingReceiver {
            outgoing: outgoing_rx,
        },
    };
    (mailbox, link)
}

#[cfg(test)]
impl CommandSender {
    /// Queue a command without waiting (test helper)
    pub fn try_push(&self, command: Command) {
        self.commands
            .try_send(command)
            .expect("command queue has room");
    }
}
