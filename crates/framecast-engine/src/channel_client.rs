//! In-process client that forwards everything over a channel.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, trace, warn};

use framecast_encoder::{EncodedFrame, EncodedPacket};
use framecast_events::{Codec, CodecOptions, Event};

use crate::client::{Client, ClientCore};

/// Output delivered to the receiving end of a [`ChannelClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientOutput {
    Frame(EncodedPacket),
    CodecSwitched { codec: Codec, options: CodecOptions },
    Event(Event),
}

/// A client whose transport is a bounded channel.
///
/// Frames are copied out of the encoder into [`EncodedPacket`]s. When the
/// channel is full the frame is dropped; when the receiver is gone the
/// client dies.
pub struct ChannelClient {
    core: ClientCore,
    tx: Sender<ClientOutput>,
}

impl ChannelClient {
    pub fn new(capacity: usize) -> (Arc<Self>, Receiver<ClientOutput>) {
        let (tx, rx) = bounded(capacity);
        let client = Arc::new(Self {
            core: ClientCore::new(),
            tx,
        });
        (client, rx)
    }

    /// Feed one wire message received from the peer.
    ///
    /// Malformed messages are logged and dropped. Returns true if an event
    /// was queued.
    pub fn receive_bytes(&self, data: &[u8]) -> bool {
        match Event::from_bytes(data) {
            Ok(Event::Unknown) => {
                debug!(
                    client = %self.core.id(),
                    tag = data.first().copied().unwrap_or_default(),
                    "Received unknown event"
                );
                self.core.add_event(Event::Unknown)
            }
            Ok(event) => self.core.add_event(event),
            Err(e) => {
                warn!(client = %self.core.id(), error = %e, "Dropping malformed event");
                false
            }
        }
    }

    /// Queue an already decoded event.
    pub fn receive(&self, event: Event) -> bool {
        self.core.add_event(event)
    }

    /// The peer went away.
    pub fn disconnect(&self) {
        self.core.die();
    }

    fn deliver(&self, output: ClientOutput) {
        match self.tx.try_send(output) {
            Ok(()) => {}
            Err(TrySendError::Full(ClientOutput::Frame(_))) => {
                trace!(client = %self.core.id(), "Client channel full, dropping frame");
            }
            Err(TrySendError::Full(_)) => {
                warn!(client = %self.core.id(), "Client channel full, dropping message");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(client = %self.core.id(), "Client receiver gone");
                self.core.die();
            }
        }
    }
}

impl Client for ChannelClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }

    fn on_frame_encoded(&self, frame: &EncodedFrame<'_>) {
        if frame.is_empty() {
            return;
        }
        self.deliver(ClientOutput::Frame(frame.to_packet()));
    }

    fn on_codec_switched(&self, codec: Codec, options: &CodecOptions) {
        self.deliver(ClientOutput::CodecSwitched {
            codec,
            options: options.clone(),
        });
    }

    fn send_event(&self, event: &Event) {
        self.deliver(ClientOutput::Event(event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_bytes() {
        let (client, _rx) = ChannelClient::new(4);
        assert!(client.receive_bytes(&[0x30]));
        assert!(client.receive_bytes(&[0x7f]));
        assert!(!client.receive_bytes(&[0x50, 1]));
        assert!(!client.receive_bytes(&[]));

        let mut events = Vec::new();
        client.core().drain_events(&mut events);
        let kinds: Vec<_> = events.into_iter().map(|e| e.event).collect();
        assert_eq!(kinds, vec![Event::Play, Event::Unknown]);
    }

    #[test]
    fn test_frames_only_reach_active_clients() {
        let (client, rx) = ChannelClient::new(4);
        let data = [1u8, 2, 3];
        let frame = EncodedFrame::new(1, 1, &data);

        client.push_frame(&frame);
        assert!(rx.try_recv().is_err());

        client.core().set_playing(true);
        client.push_frame(&frame);
        match rx.try_recv().unwrap() {
            ClientOutput::Frame(packet) => assert_eq!(&packet.data[..], &data),
            other => panic!("unexpected output: {other:?}"),
        }

        client.push_frame(&EncodedFrame::empty(1, 1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_channel_drops_frames() {
        let (client, rx) = ChannelClient::new(1);
        client.core().set_playing(true);
        let frame = EncodedFrame::new(1, 1, &[9]);
        client.push_frame(&frame);
        client.push_frame(&frame);
        assert_eq!(rx.len(), 1);
        assert!(client.core().is_alive());
    }

    #[test]
    fn test_dropped_receiver_kills_client() {
        let (client, rx) = ChannelClient::new(1);
        drop(rx);
        client.send_event(&Event::StreamConfigChanged);
        assert!(!client.core().is_alive());
    }
}
