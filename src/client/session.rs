use futures_util::FutureExt;
use tracing::{debug, info, warn};

use crate::rooms::RoomView;

use super::{ApiClient, ClientError, ClientResult, MediaKind, Transport, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    You,
    Them,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub speaker: Speaker,
    pub user: String,
    pub text: String,
}

/// Everything a chat screen shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderState {
    pub room: Option<RoomView>,
    pub local_media: bool,
    pub remote_user: Option<String>,
    pub remote_audio: bool,
    pub remote_video: bool,
    pub messages: Vec<ChatLine>,
}

impl RenderState {
    fn apply(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Published { uid, kind } => {
                self.remote_user = Some(uid);
                match kind {
                    MediaKind::Audio => self.remote_audio = true,
                    MediaKind::Video => self.remote_video = true,
                }
            }
            TransportEvent::Unpublished { uid, kind } => {
                if self.remote_user.as_deref() != Some(uid.as_str()) {
                    return;
                }
                match kind {
                    MediaKind::Audio => self.remote_audio = false,
                    MediaKind::Video => self.remote_video = false,
                }
                if !self.remote_audio && !self.remote_video {
                    self.remote_user = None;
                }
            }
            TransportEvent::Message { from, text } => self.messages.push(ChatLine {
                speaker: Speaker::Them,
                user: from,
                text,
            }),
        }
    }
}

/// Drives one user through rooms: find or create a room, join its media
/// session and text channel, and move on when asked.
///
/// Every call runs to completion before the next; a failure is logged and
/// returned, never retried.
pub struct SessionController<T> {
    api: ApiClient,
    transport: T,
    user_id: String,
    render: RenderState,
}

impl<T: Transport> SessionController<T> {
    pub fn new(api: ApiClient, transport: T, user_id: impl Into<String>) -> SessionController<T> {
        SessionController {
            api,
            transport,
            user_id: user_id.into(),
            render: RenderState::default(),
        }
    }

    pub fn render(&self) -> &RenderState {
        &self.render
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Leaves whatever session is active and connects to a new room.
    pub async fn start(&mut self) -> ClientResult<&RenderState> {
        let previous = self.render.room.take().map(|room| room.id);
        self.disconnect().await;

        if let Err(err) = self.connect(previous).await {
            warn!(user = %self.user_id, error = %err, "could not start a session");
            return Err(err);
        }
        Ok(&self.render)
    }

    /// Moves on to someone new. The room just left goes back to waiting.
    pub async fn next(&mut self) -> ClientResult<&RenderState> {
        self.start().await
    }

    pub async fn stop(&mut self) {
        self.disconnect().await;
        info!(user = %self.user_id, "session stopped");
    }

    pub async fn send(&mut self, text: &str) -> ClientResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if self.render.room.is_none() {
            return Err(ClientError::NotConnected);
        }

        if let Err(err) = self.transport.send_message(text).await {
            warn!(user = %self.user_id, error = %err, "message not sent");
            return Err(err);
        }
        self.render.messages.push(ChatLine {
            speaker: Speaker::You,
            user: self.user_id.clone(),
            text: text.to_owned(),
        });
        Ok(())
    }

    /// Waits for the next transport event and folds it into the render state.
    /// `None` once the transport is gone.
    pub async fn poll_event(&mut self) -> Option<&RenderState> {
        let event = self.transport.next_event().await?;
        self.render.apply(event);
        Some(&self.render)
    }

    /// Folds in every event that is already waiting, returning how many there were.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Some(Some(event)) = self.transport.next_event().now_or_never() {
            self.render.apply(event);
            applied += 1;
        }
        applied
    }

    async fn connect(&mut self, previous: Option<String>) -> ClientResult<()> {
        let found = self.api.find_room(&self.user_id).await?;

        // reopened only now so the search above cannot land in it again
        if let Some(previous) = previous {
            match self.api.reopen_room(&previous).await {
                Ok(room) => debug!(room = %room.id, "previous room waiting again"),
                Err(err) => warn!(room = %previous, error = %err, "could not reopen previous room"),
            }
        }

        let (room, rtc_token, rtm_token) = match found.rooms.into_iter().next() {
            Some(room) => (room, found.rtc_token, found.rtm_token),
            None => {
                let created = self.api.create_room(&self.user_id).await?;
                (created.room, created.rtc_token, created.rtm_token)
            }
        };
        info!(user = %self.user_id, room = %room.id, status = ?room.status, "entering room");

        let channel = room.id.clone();
        self.render.room = Some(room);
        self.transport.join_messaging(&channel, &self.user_id, &rtm_token).await?;
        self.transport.join(&channel, &self.user_id, &rtc_token).await?;
        self.render.local_media = true;
        Ok(())
    }

    /// Leaves media and messaging, dropping events from the old session.
    async fn disconnect(&mut self) {
        if let Err(err) = self.transport.leave().await {
            warn!(user = %self.user_id, error = %err, "could not leave media session");
        }
        if let Err(err) = self.transport.leave_messaging().await {
            warn!(user = %self.user_id, error = %err, "could not leave messaging channel");
        }
        while let Some(Some(_)) = self.transport.next_event().now_or_never() {}
        self.render = RenderState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published(uid: &str, kind: MediaKind) -> TransportEvent {
        TransportEvent::Published { uid: uid.to_owned(), kind }
    }

    fn unpublished(uid: &str, kind: MediaKind) -> TransportEvent {
        TransportEvent::Unpublished { uid: uid.to_owned(), kind }
    }

    #[test]
    fn remote_media_follows_publish_events() {
        let mut render = RenderState::default();
        render.apply(published("bob", MediaKind::Video));
        assert_eq!(render.remote_user.as_deref(), Some("bob"));
        assert!(render.remote_video);
        assert!(!render.remote_audio);

        render.apply(published("bob", MediaKind::Audio));
        render.apply(unpublished("bob", MediaKind::Video));
        assert!(!render.remote_video);
        assert_eq!(render.remote_user.as_deref(), Some("bob"));

        render.apply(unpublished("bob", MediaKind::Audio));
        assert_eq!(render.remote_user, None);
    }

    #[test]
    fn stale_unpublish_is_ignored() {
        let mut render = RenderState::default();
        render.apply(published("carol", MediaKind::Audio));
        render.apply(unpublished("bob", MediaKind::Audio));
        assert!(render.remote_audio);
    }

    #[test]
    fn messages_are_kept_in_order() {
        let mut render = RenderState::default();
        render.apply(TransportEvent::Message { from: "bob".to_owned(), text: "hi".to_owned() });
        render.apply(TransportEvent::Message { from: "bob".to_owned(), text: "there".to_owned() });

        let texts: Vec<&str> = render.messages.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(texts, ["hi", "there"]);
        assert!(render.messages.iter().all(|line| line.speaker == Speaker::Them));
    }
}
