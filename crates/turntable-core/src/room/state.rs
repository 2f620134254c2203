//! The DJ queue state machine (§4.H). Pure data plus transitions: every
//! transition returns the list of notifications it produced instead of
//! emitting them directly, the same shape `repo/events.rs::upsert_event`
//! uses — it returns an `IngestResult` and lets its caller decide what to
//! do about it (log, broadcast, ignore). Here the caller is
//! [`super::RoomManager`], which applies the transition under the room's
//! lock and then hands the returned notifications to the Hub.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::Utc;
use turntable_protocol::methods::queue::{PlayHistorySummary, VoteTallies};
use turntable_protocol::{ChatMessageInfo, MediaId, MediaInfo, Notification, RoomId, UserId, VoteKind};

/// Ring buffer capacity for chat history, mirroring [`HISTORY_CAPACITY`]'s
/// choice for play history.
const CHAT_HISTORY_CAPACITY: usize = 200;

/// Window after an advance during which the newly promoted DJ may call
/// `play_media` without a second `advance_queue` racing them out (§4.H
/// "PlayMedia ... re-asserting within a grace window of 2 s after
/// advance").
pub const PLAY_MEDIA_GRACE_WINDOW: Duration = Duration::from_secs(2);

/// Ring buffer capacity for play history. Not specified numerically by the
/// spec; chosen generously enough to back `queue.getHistory`'s default
/// page size many times over.
const HISTORY_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StandingVote {
    Woot,
    Meh,
}

#[derive(Debug, Clone)]
pub struct RoomRuntimeState {
    pub dj: Option<UserId>,
    pub playing: Option<MediaInfo>,
    pub started_at: Option<chrono::DateTime<Utc>>,
    pub queue: Vec<UserId>,
    pub audience: std::collections::HashSet<UserId>,
    pub votes: VoteTallies,
    pub history: VecDeque<PlayHistorySummary>,
    pub chat: VecDeque<ChatMessageInfo>,
    standing_votes: HashMap<UserId, StandingVote>,
    grabbed: std::collections::HashSet<UserId>,
    advanced_at: Option<Instant>,
    next_chat_seq: u64,
}

impl Default for RoomRuntimeState {
    fn default() -> Self {
        Self {
            dj: None,
            playing: None,
            started_at: None,
            queue: Vec::new(),
            audience: std::collections::HashSet::new(),
            votes: VoteTallies::default(),
            history: VecDeque::new(),
            chat: VecDeque::new(),
            standing_votes: HashMap::new(),
            grabbed: std::collections::HashSet::new(),
            advanced_at: None,
            next_chat_seq: 0,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("user is not in the room audience")]
    NotInAudience,
    #[error("user is already in the queue")]
    AlreadyQueued,
    #[error("caller is not the current dj")]
    NotCurrentDj,
    #[error("a track is already playing")]
    AlreadyPlaying,
    #[error("the current dj cannot vote on their own track")]
    DjCannotVoteOwnTrack,
    #[error("no track is currently playing")]
    NothingPlaying,
    #[error("caller lacks permission for this operation")]
    NotPermitted,
}

impl RoomRuntimeState {
    #[must_use]
    pub fn is_moderator(moderator_ids: &[UserId], user_id: &UserId) -> bool {
        moderator_ids.contains(user_id)
    }

    /// §4.H AddToQueue: appends if absent and present in audience. If the
    /// queue was empty and there is no DJ, immediately advances.
    pub fn add_to_queue(&mut self, user_id: &UserId, room_id: RoomId) -> Result<Vec<Notification>, QueueError> {
        if !self.audience.contains(user_id) {
            return Err(QueueError::NotInAudience);
        }
        if self.queue.contains(user_id) || self.dj.as_ref() == Some(user_id) {
            return Err(QueueError::AlreadyQueued);
        }
        let was_empty = self.queue.is_empty() && self.dj.is_none();
        self.queue.push(user_id.clone());

        let mut notifications = vec![self.queue_updated(room_id)];
        if was_empty {
            notifications.extend(self.advance_queue(room_id));
        }
        Ok(notifications)
    }

    /// §4.H RemoveFromQueue: drops from the queue; if the removed user was
    /// the current DJ, triggers an advance.
    pub fn remove_from_queue(&mut self, user_id: &UserId, room_id: RoomId) -> Vec<Notification> {
        self.queue.retain(|u| u != user_id);
        let mut notifications = vec![self.queue_updated(room_id)];
        if self.dj.as_ref() == Some(user_id) {
            notifications.extend(self.advance_queue(room_id));
        }
        notifications
    }

    /// §4.H MoveInQueue: `pos` clamps into range; caller permission
    /// (moderator or self) is enforced by [`super::RoomManager`], which
    /// knows the room's moderator set.
    pub fn move_in_queue(&mut self, user_id: &UserId, pos: u32, room_id: RoomId) -> Vec<Notification> {
        let Some(current) = self.queue.iter().position(|u| u == user_id) else {
            return Vec::new();
        };
        let user = self.queue.remove(current);
        let clamped = (pos as usize).min(self.queue.len());
        self.queue.insert(clamped, user);
        vec![self.queue_updated(room_id)]
    }

    /// §4.H PlayMedia: legal only for the current DJ with nothing playing,
    /// or within the grace window just after an advance.
    pub fn play_media(
        &mut self,
        caller: &UserId,
        media: MediaInfo,
        room_id: RoomId,
    ) -> Result<Vec<Notification>, QueueError> {
        if self.dj.as_ref() != Some(caller) {
            return Err(QueueError::NotCurrentDj);
        }
        let within_grace = self
            .advanced_at
            .is_some_and(|at| at.elapsed() <= PLAY_MEDIA_GRACE_WINDOW);
        if self.playing.is_some() && !within_grace {
            return Err(QueueError::AlreadyPlaying);
        }
        self.playing = Some(media.clone());
        self.started_at = Some(Utc::now());
        self.votes = VoteTallies::default();
        self.standing_votes.clear();
        self.grabbed.clear();

        Ok(vec![Notification::TrackStart {
            room_id,
            dj: caller.clone(),
            media,
            started_at: self.started_at.expect("just set"),
        }])
    }

    /// §4.H Vote: woot/meh are exclusive per user per track; grabs are
    /// independent and idempotent.
    pub fn vote(&mut self, user_id: &UserId, kind: VoteKind, room_id: RoomId) -> Result<Vec<Notification>, QueueError> {
        if self.playing.is_none() {
            return Err(QueueError::NothingPlaying);
        }
        if self.dj.as_ref() == Some(user_id) {
            return Err(QueueError::DjCannotVoteOwnTrack);
        }

        match kind {
            VoteKind::Grab => {
                self.grabbed.insert(user_id.clone());
            }
            VoteKind::Woot | VoteKind::Meh => {
                let new_vote = if kind == VoteKind::Woot {
                    StandingVote::Woot
                } else {
                    StandingVote::Meh
                };
                if let Some(previous) = self.standing_votes.insert(user_id.clone(), new_vote) {
                    self.decrement_tally(previous);
                }
                self.increment_tally(new_vote);
            }
        }

        Ok(vec![Notification::TrackVote {
            room_id,
            user_id: user_id.clone(),
            kind,
            tallies: self.votes,
        }])
    }

    fn increment_tally(&mut self, vote: StandingVote) {
        match vote {
            StandingVote::Woot => self.votes.woots += 1,
            StandingVote::Meh => self.votes.mehs += 1,
        }
    }

    fn decrement_tally(&mut self, vote: StandingVote) {
        match vote {
            StandingVote::Woot => self.votes.woots = self.votes.woots.saturating_sub(1),
            StandingVote::Meh => self.votes.mehs = self.votes.mehs.saturating_sub(1),
        }
    }

    /// §4.H SkipCurrentMedia: closes out the current track into history
    /// with `skipped = true` and advances.
    pub fn skip_current_media(&mut self, reason: Option<String>, room_id: RoomId) -> Result<Vec<Notification>, QueueError> {
        let media = self.playing.clone().ok_or(QueueError::NothingPlaying)?;
        self.close_current_track(media, true);

        let mut notifications = vec![Notification::TrackSkip {
            room_id,
            reason: reason.unwrap_or_default(),
        }];
        notifications.extend(self.advance_queue(room_id));
        Ok(notifications)
    }

    /// §4.H duration-elapsed completion: true once `playing`'s
    /// `duration_secs` has elapsed since `started_at`. The track reaper
    /// polls this instead of scheduling a timer per track.
    #[must_use]
    pub fn is_track_expired(&self) -> bool {
        match (&self.playing, self.started_at) {
            (Some(media), Some(started_at)) => {
                let elapsed = Utc::now().signed_duration_since(started_at);
                elapsed.num_seconds() >= i64::from(media.duration_secs)
            }
            _ => false,
        }
    }

    /// A DJ was promoted by [`Self::advance_queue`] but let the
    /// [`PLAY_MEDIA_GRACE_WINDOW`] lapse without calling `play_media`.
    #[must_use]
    pub fn is_dj_stalled(&self) -> bool {
        self.dj.is_some() && self.playing.is_none() && self.advanced_at.is_some_and(|at| at.elapsed() > PLAY_MEDIA_GRACE_WINDOW)
    }

    /// §4.H: the current track finished playing out on its own (as opposed
    /// to being skipped). Closes history with `skipped = false`, emits
    /// `track:end` rather than `track:skip`, and advances to the next DJ.
    pub fn complete_current_track(&mut self, room_id: RoomId) -> Result<Vec<Notification>, QueueError> {
        let media = self.playing.clone().ok_or(QueueError::NothingPlaying)?;
        let media_id = media.media_id.clone();
        self.close_current_track(media, false);

        let mut notifications = vec![Notification::TrackEnd { room_id, media_id }];
        notifications.extend(self.advance_queue(room_id));
        Ok(notifications)
    }

    /// Polled by the track reaper once per tick: completes an expired
    /// track, or advances past a DJ who never started playing within the
    /// grace window. A no-op (empty result) otherwise.
    pub fn reap_if_expired(&mut self, room_id: RoomId) -> Vec<Notification> {
        if self.is_track_expired() {
            return self
                .complete_current_track(room_id)
                .expect("is_track_expired() implies playing.is_some()");
        }
        if self.is_dj_stalled() {
            return self.advance_queue(room_id);
        }
        Vec::new()
    }

    fn close_current_track(&mut self, media: MediaInfo, skipped: bool) {
        let started_at = self.started_at.unwrap_or_else(Utc::now);
        self.push_history(PlayHistorySummary {
            media_id: media.media_id,
            title: media.title,
            artist: media.artist,
            duration_secs: media.duration_secs,
            started_at,
            final_tallies: self.votes,
            skipped,
        });
        self.playing = None;
        self.started_at = None;
    }

    fn push_history(&mut self, entry: PlayHistorySummary) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_back();
        }
        self.history.push_front(entry);
    }

    /// §4.H AdvanceQueue: pop the head of the queue into `dj`; empty queue
    /// clears the DJ slot. `playing` is always cleared by an advance.
    pub fn advance_queue(&mut self, room_id: RoomId) -> Vec<Notification> {
        if let Some(media) = self.playing.take() {
            self.close_current_track(media, false);
        }
        self.dj = if self.queue.is_empty() {
            None
        } else {
            Some(self.queue.remove(0))
        };
        self.advanced_at = Some(Instant::now());
        vec![Notification::QueueUpdated {
            room_id,
            dj: self.dj.clone(),
            queue: self.queue.clone(),
        }]
    }

    fn queue_updated(&self, room_id: RoomId) -> Notification {
        Notification::QueueUpdated {
            room_id,
            dj: self.dj.clone(),
            queue: self.queue.clone(),
        }
    }

    /// §4.H Clear: moderator-only at the call site; empties the queue
    /// without touching `playing`/`dj`.
    pub fn clear(&mut self, room_id: RoomId) -> Vec<Notification> {
        self.queue.clear();
        vec![self.queue_updated(room_id)]
    }

    /// §4.H Shuffle: Fisher-Yates over `queue`, seeded from `rand`'s
    /// cryptographically-seeded thread RNG.
    pub fn shuffle(&mut self, room_id: RoomId) -> Vec<Notification> {
        use rand::Rng;
        let mut rng = rand::rng();
        for i in (1..self.queue.len()).rev() {
            let j = rng.random_range(0..=i);
            self.queue.swap(i, j);
        }
        vec![self.queue_updated(room_id)]
    }

    /// §4's chat surface: room-scoped, in-process history — not part of
    /// the persisted data model, the same way play history lives on the
    /// runtime state rather than the room repository.
    pub fn send_chat_message(&mut self, user_id: &UserId, text: String, room_id: RoomId) -> Vec<Notification> {
        self.next_chat_seq += 1;
        let message = ChatMessageInfo {
            message_id: format!("{room_id}-{}", self.next_chat_seq),
            user_id: user_id.clone(),
            text,
            sent_at: Utc::now(),
        };
        if self.chat.len() >= CHAT_HISTORY_CAPACITY {
            self.chat.pop_back();
        }
        self.chat.push_front(message.clone());
        vec![Notification::ChatMessage { room_id, message }]
    }

    pub fn recent_chat(&self, limit: u32) -> Vec<ChatMessageInfo> {
        self.chat.iter().take(limit as usize).cloned().collect()
    }

    /// Removes a message by id regardless of whether it is present;
    /// permission to call this at all (sender or moderator) is enforced
    /// by the caller, which knows the room's moderator set.
    pub fn delete_chat_message(&mut self, message_id: &str, room_id: RoomId) -> Vec<Notification> {
        self.chat.retain(|m| m.message_id != message_id);
        vec![Notification::ChatMessageDelete {
            room_id,
            message_id: message_id.to_owned(),
        }]
    }

    #[must_use]
    pub fn position_of(&self, user_id: &UserId) -> Option<u32> {
        self.queue.iter().position(|u| u == user_id).map(|p| p as u32)
    }

    pub fn recent_history(&self, limit: u32) -> Vec<PlayHistorySummary> {
        self.history.iter().take(limit as usize).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::generate(1)
    }

    fn media(id: &str) -> MediaInfo {
        MediaInfo {
            media_id: MediaId::from(id),
            title: "Track".to_owned(),
            artist: "Artist".to_owned(),
            duration_secs: 200,
        }
    }

    #[test]
    fn adding_first_dj_to_an_empty_queue_immediately_advances() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        state.audience.insert(alice.clone());

        let notifications = state.add_to_queue(&alice, room()).unwrap();
        assert_eq!(state.dj, Some(alice));
        assert!(notifications
            .iter()
            .any(|n| matches!(n, Notification::QueueUpdated { .. })));
    }

    #[test]
    fn joining_queue_requires_audience_membership() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        assert!(matches!(
            state.add_to_queue(&alice, room()),
            Err(QueueError::NotInAudience)
        ));
    }

    #[test]
    fn removing_the_current_dj_advances_to_the_next_queue_entry() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        state.audience.insert(alice.clone());
        state.audience.insert(bob.clone());
        state.add_to_queue(&alice, room()).unwrap();
        state.add_to_queue(&bob, room()).unwrap();
        assert_eq!(state.dj, Some(alice.clone()));

        state.remove_from_queue(&alice, room());
        assert_eq!(state.dj, Some(bob));
    }

    #[test]
    fn play_media_rejects_a_non_dj_caller() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        state.dj = Some(alice);
        assert!(matches!(
            state.play_media(&bob, media("m1"), room()),
            Err(QueueError::NotCurrentDj)
        ));
    }

    #[test]
    fn play_media_rejects_overlapping_playback_outside_the_grace_window() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        state.dj = Some(alice.clone());
        state.play_media(&alice, media("m1"), room()).unwrap();
        state.advanced_at = None;

        assert!(matches!(
            state.play_media(&alice, media("m2"), room()),
            Err(QueueError::AlreadyPlaying)
        ));
    }

    #[test]
    fn dj_cannot_vote_on_their_own_track() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        state.dj = Some(alice.clone());
        state.play_media(&alice, media("m1"), room()).unwrap();

        assert!(matches!(
            state.vote(&alice, VoteKind::Woot, room()),
            Err(QueueError::DjCannotVoteOwnTrack)
        ));
    }

    #[test]
    fn revoting_woot_then_meh_moves_the_tally_instead_of_double_counting() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        state.dj = Some(alice.clone());
        state.play_media(&alice, media("m1"), room()).unwrap();

        state.vote(&bob, VoteKind::Woot, room()).unwrap();
        assert_eq!(state.votes.woots, 1);
        state.vote(&bob, VoteKind::Meh, room()).unwrap();
        assert_eq!(state.votes.woots, 0);
        assert_eq!(state.votes.mehs, 1);
    }

    #[test]
    fn grabs_are_independent_of_woot_meh_and_idempotent_per_user() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        state.dj = Some(alice.clone());
        state.play_media(&alice, media("m1"), room()).unwrap();

        state.vote(&bob, VoteKind::Grab, room()).unwrap();
        state.vote(&bob, VoteKind::Grab, room()).unwrap();
        assert_eq!(state.grabbed.len(), 1);
    }

    #[test]
    fn skip_closes_history_entry_as_skipped_and_advances() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        state.audience.insert(bob.clone());
        state.dj = Some(alice.clone());
        state.queue.push(bob.clone());
        state.play_media(&alice, media("m1"), room()).unwrap();

        state.skip_current_media(Some("boo".to_owned()), room()).unwrap();
        assert_eq!(state.dj, Some(bob));
        assert!(state.playing.is_none());
        let entry = state.history.front().unwrap();
        assert!(entry.skipped);
        assert_eq!(entry.media_id, MediaId::from("m1"));
    }

    #[test]
    fn advance_with_an_empty_queue_clears_the_dj_slot() {
        let mut state = RoomRuntimeState::default();
        state.dj = Some(UserId::from("alice"));
        let notifications = state.advance_queue(room());
        assert_eq!(state.dj, None);
        assert!(matches!(
            notifications[0],
            Notification::QueueUpdated { dj: None, .. }
        ));
    }

    #[test]
    fn sending_chat_assigns_increasing_message_ids_and_keeps_newest_first() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        state.send_chat_message(&alice, "hi".to_owned(), room());
        state.send_chat_message(&alice, "again".to_owned(), room());

        let recent = state.recent_chat(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "again");
        assert_eq!(recent[1].text, "hi");
        assert_ne!(recent[0].message_id, recent[1].message_id);
    }

    #[test]
    fn recent_chat_honors_the_requested_limit() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        for i in 0..5 {
            state.send_chat_message(&alice, format!("msg {i}"), room());
        }
        assert_eq!(state.recent_chat(2).len(), 2);
    }

    #[test]
    fn chat_history_evicts_the_oldest_message_past_capacity() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        for i in 0..(CHAT_HISTORY_CAPACITY + 1) {
            state.send_chat_message(&alice, format!("msg {i}"), room());
        }
        assert_eq!(state.chat.len(), CHAT_HISTORY_CAPACITY);
        assert_eq!(state.recent_chat(1)[0].text, format!("msg {CHAT_HISTORY_CAPACITY}"));
    }

    #[test]
    fn deleting_a_chat_message_removes_it_by_id() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        state.send_chat_message(&alice, "hi".to_owned(), room());
        let message_id = state.recent_chat(1)[0].message_id.clone();

        state.delete_chat_message(&message_id, room());
        assert!(state.recent_chat(10).is_empty());
    }

    #[test]
    fn deleting_an_unknown_chat_message_id_is_a_no_op() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        state.send_chat_message(&alice, "hi".to_owned(), room());

        state.delete_chat_message("does-not-exist", room());
        assert_eq!(state.recent_chat(10).len(), 1);
    }

    #[test]
    fn a_track_whose_duration_has_elapsed_is_expired() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        state.dj = Some(alice.clone());
        let mut track = media("m1");
        track.duration_secs = 0;
        state.play_media(&alice, track, room()).unwrap();

        assert!(state.is_track_expired());
    }

    #[test]
    fn a_freshly_started_track_is_not_expired() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        state.dj = Some(alice.clone());
        state.play_media(&alice, media("m1"), room()).unwrap();

        assert!(!state.is_track_expired());
    }

    #[test]
    fn complete_current_track_emits_track_end_not_track_skip() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        state.audience.insert(bob.clone());
        state.dj = Some(alice.clone());
        state.queue.push(bob.clone());
        state.play_media(&alice, media("m1"), room()).unwrap();

        let notifications = state.complete_current_track(room()).unwrap();
        assert!(notifications.iter().any(|n| matches!(n, Notification::TrackEnd { .. })));
        assert!(!notifications.iter().any(|n| matches!(n, Notification::TrackSkip { .. })));
        assert_eq!(state.dj, Some(bob));
        let entry = state.history.front().unwrap();
        assert!(!entry.skipped);
    }

    #[test]
    fn a_dj_who_never_plays_within_the_grace_window_is_stalled() {
        let mut state = RoomRuntimeState::default();
        state.dj = Some(UserId::from("alice"));
        state.advanced_at = Some(Instant::now() - PLAY_MEDIA_GRACE_WINDOW - Duration::from_millis(1));

        assert!(state.is_dj_stalled());
    }

    #[test]
    fn reap_if_expired_advances_past_a_stalled_dj() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        state.dj = Some(alice);
        state.queue.push(bob.clone());
        state.advanced_at = Some(Instant::now() - PLAY_MEDIA_GRACE_WINDOW - Duration::from_millis(1));

        let notifications = state.reap_if_expired(room());
        assert_eq!(state.dj, Some(bob));
        assert!(notifications
            .iter()
            .any(|n| matches!(n, Notification::QueueUpdated { .. })));
    }

    #[test]
    fn reap_if_expired_is_a_no_op_for_a_freshly_playing_track() {
        let mut state = RoomRuntimeState::default();
        let alice = UserId::from("alice");
        state.dj = Some(alice.clone());
        state.play_media(&alice, media("m1"), room()).unwrap();

        assert!(state.reap_if_expired(room()).is_empty());
    }

    #[test]
    fn shuffle_preserves_every_element_while_reordering() {
        let mut state = RoomRuntimeState::default();
        state.queue = vec!["a", "b", "c", "d"].into_iter().map(UserId::from).collect();
        let before = state.queue.clone();
        state.shuffle(room());
        let mut after = state.queue.clone();
        after.sort();
        let mut sorted_before = before.clone();
        sorted_before.sort();
        assert_eq!(after, sorted_before);
    }
}
