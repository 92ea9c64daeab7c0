//! Forwarding of input events from the token holder to the host application.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use framecast_events::{InputEvent, KeyboardInput, MouseInput};

/// Input queue capacity of [`SynchronousInputProcessor`].
pub const INPUT_QUEUE_CAPACITY: usize = 1024;

/// Receives input events from the client holding the input token.
///
/// Called on the client set's tick thread; implementations should return
/// quickly.
pub trait InputProcessor: Send + Sync {
    fn push_event(&self, event: InputEvent);
}

/// Host-side handling of input events.
pub trait InputHandler: Send + Sync {
    fn process_mouse_input(&self, event: &MouseInput) {
        debug!(%event, "Unhandled mouse input");
    }

    fn process_keyboard_input(&self, event: &KeyboardInput) {
        debug!(%event, "Unhandled keyboard input");
    }

    fn process_event(&self, event: &InputEvent) {
        match event {
            InputEvent::Mouse(mouse) => self.process_mouse_input(mouse),
            InputEvent::Keyboard(keyboard) => self.process_keyboard_input(keyboard),
        }
    }
}

/// Queues events until the host calls [`process_input`](Self::process_input)
/// from its own thread, e.g. once per rendered frame.
pub struct SynchronousInputProcessor<H> {
    handler: H,
    tx: Sender<InputEvent>,
    rx: Receiver<InputEvent>,
}

impl<H: InputHandler> SynchronousInputProcessor<H> {
    pub fn new(handler: H) -> Self {
        let (tx, rx) = bounded(INPUT_QUEUE_CAPACITY);
        Self { handler, tx, rx }
    }

    /// Handle every queued event. Returns how many were handled.
    pub fn process_input(&self) -> usize {
        let mut handled = 0;
        for event in self.rx.try_iter() {
            self.handler.process_event(&event);
            handled += 1;
        }
        handled
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: InputHandler> InputProcessor for SynchronousInputProcessor<H> {
    fn push_event(&self, event: InputEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Input queue full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                // Cannot happen while self holds the receiver.
            }
        }
    }
}

/// Handles every event immediately on the calling thread.
pub struct AsynchronousInputProcessor<H> {
    handler: H,
}

impl<H: InputHandler> AsynchronousInputProcessor<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: InputHandler> InputProcessor for AsynchronousInputProcessor<H> {
    fn push_event(&self, event: InputEvent) {
        self.handler.process_event(&event);
    }
}
