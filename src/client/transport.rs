use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::{Arc, Mutex},
};

use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::debug;

use super::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

const MEDIA: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Video];

/// What the other participants of a channel do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Published { uid: String, kind: MediaKind },
    Unpublished { uid: String, kind: MediaKind },
    Message { from: String, text: String },
}

impl TransportEvent {
    fn origin(&self) -> &str {
        match self {
            TransportEvent::Published { uid, .. } | TransportEvent::Unpublished { uid, .. } => uid,
            TransportEvent::Message { from, .. } => from,
        }
    }
}

/// Audio/video session plus messaging channel, as provided by a real-time
/// communication SDK. Events of both arrive on one queue.
pub trait Transport: Send {
    /// Joins the media session of `channel` and publishes local audio and video.
    fn join(&mut self, channel: &str, uid: &str, rtc_token: &str) -> impl Future<Output = ClientResult<()>> + Send;
    fn leave(&mut self) -> impl Future<Output = ClientResult<()>> + Send;
    /// Logs in to messaging and joins the text channel of `channel`.
    fn join_messaging(&mut self, channel: &str, uid: &str, rtm_token: &str) -> impl Future<Output = ClientResult<()>> + Send;
    fn leave_messaging(&mut self) -> impl Future<Output = ClientResult<()>> + Send;
    fn send_message(&mut self, text: &str) -> impl Future<Output = ClientResult<()>> + Send;
    /// Next event from the other participants; `None` once the transport is gone.
    fn next_event(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;
}

struct Channel {
    tx: broadcast::Sender<TransportEvent>,
    members: HashSet<String>,
}

/// In-process stand-in for the transport service. Every [`LocalTransport`]
/// made from the same hub sees the same channels.
#[derive(Clone, Default)]
pub struct LocalHub {
    channels: Arc<Mutex<HashMap<String, Channel>>>,
}

impl LocalHub {
    pub fn new() -> LocalHub {
        LocalHub::default()
    }

    pub fn transport(&self) -> LocalTransport {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        LocalTransport {
            hub: self.clone(),
            events_tx,
            events_rx,
            media: None,
            messaging: None,
        }
    }

    /// Adds `uid` to `key`, returning a receiver for what others do next and
    /// the channel's sender. `greet` builds the events existing members are
    /// replayed to the newcomer with.
    fn enter(
        &self,
        key: &str,
        uid: &str,
        greet: impl Fn(&str) -> Vec<TransportEvent>,
    ) -> ClientResult<(broadcast::Receiver<TransportEvent>, broadcast::Sender<TransportEvent>, Vec<TransportEvent>)> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| ClientError::Transport("hub lock poisoned".to_owned()))?;
        let channel = channels.entry(key.to_owned()).or_insert_with(|| Channel {
            tx: broadcast::channel(64).0,
            members: HashSet::new(),
        });

        let rx = channel.tx.subscribe();
        let replay = channel
            .members
            .iter()
            .filter(|member| *member != uid)
            .flat_map(|member| greet(member.as_str()))
            .collect();
        channel.members.insert(uid.to_owned());
        Ok((rx, channel.tx.clone(), replay))
    }

    fn exit(&self, key: &str, uid: &str) -> ClientResult<()> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| ClientError::Transport("hub lock poisoned".to_owned()))?;
        if let Some(channel) = channels.get_mut(key) {
            channel.members.remove(uid);
            if channel.members.is_empty() {
                channels.remove(key);
            }
        }
        Ok(())
    }
}

struct Membership {
    key: String,
    uid: String,
    tx: broadcast::Sender<TransportEvent>,
    forwarder: JoinHandle<()>,
}

/// A [`Transport`] backed by a [`LocalHub`]. Tokens are accepted but not checked.
pub struct LocalTransport {
    hub: LocalHub,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    media: Option<Membership>,
    messaging: Option<Membership>,
}

impl LocalTransport {
    pub fn in_media(&self) -> bool {
        self.media.is_some()
    }

    pub fn in_messaging(&self) -> bool {
        self.messaging.is_some()
    }

    fn enter(
        &self,
        key: String,
        uid: &str,
        greet: impl Fn(&str) -> Vec<TransportEvent>,
    ) -> ClientResult<Membership> {
        let (mut rx, tx, replay) = self.hub.enter(&key, uid, greet)?;
        for event in replay {
            let _ = self.events_tx.send(event);
        }

        let events_tx = self.events_tx.clone();
        let own = uid.to_owned();
        let forwarder = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.origin() == own => {}
                    Ok(event) => {
                        if events_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "transport events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Membership {
            key,
            uid: uid.to_owned(),
            tx,
            forwarder,
        })
    }

    /// Leaves the hub channel and stops the forwarder. The returned handle
    /// finishes once the forwarder can no longer queue events.
    fn exit(&self, membership: Membership) -> ClientResult<JoinHandle<()>> {
        membership.forwarder.abort();
        self.hub.exit(&membership.key, &membership.uid)?;
        Ok(membership.forwarder)
    }
}

impl Transport for LocalTransport {
    async fn join(&mut self, channel: &str, uid: &str, _rtc_token: &str) -> ClientResult<()> {
        if self.media.is_some() {
            return Err(ClientError::Transport("already in a media session".to_owned()));
        }

        let membership = self.enter(format!("rtc:{channel}"), uid, |member| {
            MEDIA
                .iter()
                .map(|&kind| TransportEvent::Published { uid: member.to_owned(), kind })
                .collect()
        })?;
        for kind in MEDIA {
            let _ = membership.tx.send(TransportEvent::Published { uid: uid.to_owned(), kind });
        }
        self.media = Some(membership);
        Ok(())
    }

    async fn leave(&mut self) -> ClientResult<()> {
        let Some(membership) = self.media.take() else {
            return Ok(());
        };
        for kind in MEDIA {
            let _ = membership.tx.send(TransportEvent::Unpublished { uid: membership.uid.clone(), kind });
        }
        settle(self.exit(membership)?).await;
        Ok(())
    }

    async fn join_messaging(&mut self, channel: &str, uid: &str, _rtm_token: &str) -> ClientResult<()> {
        if self.messaging.is_some() {
            return Err(ClientError::Transport("already in a messaging channel".to_owned()));
        }
        self.messaging = Some(self.enter(format!("rtm:{channel}"), uid, |_| Vec::new())?);
        Ok(())
    }

    async fn leave_messaging(&mut self) -> ClientResult<()> {
        let Some(membership) = self.messaging.take() else {
            return Ok(());
        };
        settle(self.exit(membership)?).await;
        Ok(())
    }

    async fn send_message(&mut self, text: &str) -> ClientResult<()> {
        let membership = self.messaging.as_ref().ok_or(ClientError::NotConnected)?;
        let _ = membership.tx.send(TransportEvent::Message {
            from: membership.uid.clone(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events_rx.recv().await
    }
}

/// An aborted task may still be mid-poll on another worker; wait it out.
async fn settle(forwarder: JoinHandle<()>) {
    if let Err(err) = forwarder.await {
        if !err.is_cancelled() {
            debug!(error = %err, "transport forwarder failed");
        }
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        for membership in [self.media.take(), self.messaging.take()].into_iter().flatten() {
            let _ = self.exit(membership);
        }
    }
}
