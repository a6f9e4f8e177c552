use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::{RwLock, mpsc, oneshot};
use uuid::Uuid;

use codeclash_core::game::GameSession;
use codeclash_core::net::messages::{GameDto, RoomDto, ServerMessage, SubmissionDto};
use codeclash_core::player::PlayerCode;
use codeclash_core::problem::Problem;
use codeclash_core::room::{Room, RoomSettings, generate_room_code};
use codeclash_core::tester::TesterClient;
use codeclash_core::user::User;

use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::error::EngineError;
use crate::report::ReportSink;
use crate::session::{GameCommand, SessionDeps, SessionHandle, spawn_game_session};
use crate::timer::TimerSpec;

pub type SharedGameRegistry = Arc<RwLock<GameRegistry>>;

struct RoomEntry {
    room: Room,
    broadcaster: Arc<Broadcaster>,
    /// Live session actor, if a game has been started and not yet
    /// cleared by a rematch.
    session: Option<SessionHandle>,
    /// Mirrors the session's terminal state for synchronous checks.
    session_ended: Arc<AtomicBool>,
}

/// Owns every room and the session actor attached to each. All room
/// membership mutations happen here, under one lock; in-game state is
/// reached only through the owning actor's command channel.
pub struct GameRegistry {
    rooms: HashMap<String, RoomEntry>,
    config: Arc<ServerConfig>,
    tester: Arc<dyn TesterClient>,
    report_sink: ReportSink,
}

impl GameRegistry {
    pub fn new(
        config: Arc<ServerConfig>,
        tester: Arc<dyn TesterClient>,
        report_sink: ReportSink,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
            tester,
            report_sink,
        }
    }

    fn entry(&self, room_id: &str) -> Result<&RoomEntry, EngineError> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| {
                EngineError::not_found("room_not_found", format!("no such room: {room_id}"))
            })
    }

    fn entry_mut(&mut self, room_id: &str) -> Result<&mut RoomEntry, EngineError> {
        self.rooms
            .get_mut(room_id)
            .ok_or_else(|| {
                EngineError::not_found("room_not_found", format!("no such room: {room_id}"))
            })
    }

    fn active_session(&self, room_id: &str) -> Result<&SessionHandle, EngineError> {
        self.entry(room_id)?
            .session
            .as_ref()
            .ok_or_else(|| EngineError::conflict("no_active_game", "room has no active game"))
    }

    fn new_session_token() -> String {
        Uuid::new_v4().to_string()
    }

    /// Create a room hosted by a fresh user. Returns the room code plus
    /// the host's id and session token.
    pub fn create_room(&mut self, nickname: &str) -> Result<(String, Uuid, String), EngineError> {
        if nickname.trim().is_empty() {
            return Err(EngineError::invalid_input(
                "empty_nickname",
                "nickname must not be empty",
            ));
        }
        let mut host = User::new(nickname);
        let token = Self::new_session_token();
        host.session_id = Some(token.clone());
        let host_id = host.user_id;

        let code = loop {
            let candidate = generate_room_code();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let room = Room::new(code.clone(), host, self.config.rooms.defaults);
        self.rooms.insert(
            code.clone(),
            RoomEntry {
                room,
                broadcaster: Arc::new(Broadcaster::new()),
                session: None,
                session_ended: Arc::new(AtomicBool::new(false)),
            },
        );
        tracing::info!(room = %code, host = %host_id, "Room created");
        Ok((code, host_id, token))
    }

    /// Join a room. Joiners during an active game enter as spectators
    /// and only become players at the next game.
    pub fn join_room(
        &mut self,
        room_id: &str,
        nickname: &str,
    ) -> Result<(Uuid, String), EngineError> {
        if nickname.trim().is_empty() {
            return Err(EngineError::invalid_input(
                "empty_nickname",
                "nickname must not be empty",
            ));
        }
        let entry = self.entry_mut(room_id)?;
        if entry.room.contains_nickname(nickname) {
            return Err(EngineError::conflict(
                "nickname_taken",
                format!("nickname already in use: {nickname}"),
            ));
        }
        if entry.room.is_full() {
            return Err(EngineError::conflict("room_full", "room is full"));
        }

        let mut user = if entry.room.active {
            User::spectator(nickname)
        } else {
            User::new(nickname)
        };
        let token = Self::new_session_token();
        user.session_id = Some(token.clone());
        let user_id = user.user_id;
        entry.room.add_user(user);

        entry
            .broadcaster
            .broadcast(&ServerMessage::RoomSnapshot(RoomDto::from_room(&entry.room)));
        Ok((user_id, token))
    }

    /// Drop a user's connection without removing them from the room.
    /// Unknown room or user is a no-op; the slot stays reserved for a
    /// later `rejoin_room` under the same nickname.
    pub fn disconnect(&mut self, room_id: &str, user_id: &Uuid) {
        let Some(entry) = self.rooms.get_mut(room_id) else {
            return;
        };
        let mut probe = User::new("");
        probe.user_id = *user_id;
        let Some(user) = entry.room.equivalent_user_mut(&probe) else {
            return;
        };
        user.session_id = None;
        entry.broadcaster.unsubscribe(user_id);
        if let Some(ref handle) = entry.session {
            handle.send(GameCommand::PlayerLeft { user_id: *user_id });
        }
        entry
            .broadcaster
            .broadcast(&ServerMessage::RoomSnapshot(RoomDto::from_room(&entry.room)));
    }

    /// Reconnect a disconnected user by nickname. The user keeps their
    /// id (and any in-game state) and receives a fresh session token.
    pub fn rejoin_room(
        &mut self,
        room_id: &str,
        nickname: &str,
    ) -> Result<(Uuid, String), EngineError> {
        let entry = self.entry_mut(room_id)?;
        let probe = User::new(nickname);
        let Some(user) = entry.room.equivalent_user_mut(&probe) else {
            return Err(EngineError::not_found(
                "user_not_in_room",
                format!("no user to reconnect: {nickname}"),
            ));
        };
        let token = Self::new_session_token();
        user.session_id = Some(token.clone());
        let user_id = user.user_id;

        if let Some(ref handle) = entry.session {
            handle.send(GameCommand::PlayerRejoined {
                user_id,
                session_id: token.clone(),
            });
        }
        entry
            .broadcaster
            .broadcast(&ServerMessage::RoomSnapshot(RoomDto::from_room(&entry.room)));
        Ok((user_id, token))
    }

    /// Remove a user from a room. Unknown room or user is a no-op
    /// returning Ok(false). The last leaver destroys the room and stops
    /// any session still attached to it.
    pub fn leave_room(&mut self, room_id: &str, user_id: &Uuid) -> Result<bool, EngineError> {
        let Some(entry) = self.rooms.get_mut(room_id) else {
            return Ok(false);
        };
        let mut probe = User::new("");
        probe.user_id = *user_id;
        let old_host = entry.room.host_id;
        if !entry.room.remove_user(&probe) {
            return Ok(false);
        }
        entry.broadcaster.unsubscribe(user_id);
        if let Some(ref handle) = entry.session {
            handle.send(GameCommand::PlayerLeft { user_id: *user_id });
            // Keep the actor's host in step with the live room so
            // host-only commands accept the migrated host.
            if entry.room.host_id != old_host {
                handle.send(GameCommand::HostChanged {
                    user_id: entry.room.host_id,
                });
            }
        }

        if entry.room.is_empty() {
            if let Some(entry) = self.rooms.remove(room_id)
                && let Some(handle) = entry.session
            {
                handle.send(GameCommand::Stop { play_again: false });
            }
            tracing::info!(room = room_id, "Room destroyed (empty)");
            return Ok(true);
        }

        entry
            .broadcaster
            .broadcast(&ServerMessage::RoomSnapshot(RoomDto::from_room(&entry.room)));
        Ok(true)
    }

    /// Replace room settings. Host-only, lobby-only; invalid settings
    /// are rejected whole, never clamped.
    pub fn update_settings(
        &mut self,
        room_id: &str,
        requester_id: &Uuid,
        settings: RoomSettings,
    ) -> Result<(), EngineError> {
        let entry = self.entry_mut(room_id)?;
        if entry.room.host_id != *requester_id {
            return Err(EngineError::forbidden(
                "not_host",
                "only the host can change settings",
            ));
        }
        if entry.room.active {
            return Err(EngineError::conflict(
                "game_in_progress",
                "settings are locked while a game is active",
            ));
        }
        settings.validate()?;
        entry.room.settings = settings;
        entry
            .broadcaster
            .broadcast(&ServerMessage::RoomSnapshot(RoomDto::from_room(&entry.room)));
        Ok(())
    }

    /// Start a game session over the given problems. Host-only; the
    /// room flips to active before anything is broadcast.
    pub fn start_game(
        &mut self,
        room_id: &str,
        requester_id: &Uuid,
        problems: Vec<Problem>,
    ) -> Result<(), EngineError> {
        let warning_marks = self.config.rooms.time_warnings_secs.clone();
        let tester = Arc::clone(&self.tester);
        let report_sink = self.report_sink.clone();

        let entry = self.entry_mut(room_id)?;
        if entry.room.host_id != *requester_id {
            return Err(EngineError::forbidden(
                "not_host",
                "only the host can start the game",
            ));
        }
        if entry.room.active {
            return Err(EngineError::conflict(
                "game_in_progress",
                "a game is already active",
            ));
        }

        let timer = TimerSpec::new(entry.room.settings.duration_secs, &warning_marks)?;
        entry.room.active = true;
        let session = match GameSession::from_room(&entry.room, problems) {
            Ok(s) => s,
            Err(e) => {
                entry.room.active = false;
                return Err(e.into());
            },
        };

        let ended_flag = Arc::new(AtomicBool::new(false));
        entry.session_ended = Arc::clone(&ended_flag);
        entry
            .broadcaster
            .broadcast(&ServerMessage::RoomSnapshot(RoomDto::from_room(&entry.room)));

        let deps = SessionDeps {
            tester,
            broadcaster: Arc::clone(&entry.broadcaster),
            report_sink,
            ended_flag,
        };
        entry.session = Some(spawn_game_session(session, &timer, deps));
        Ok(())
    }

    /// Queue a scored submission. The returned receiver resolves when
    /// the tester round-trip completes.
    pub fn submit(
        &self,
        room_id: &str,
        user_id: &Uuid,
        problem_index: usize,
        code: PlayerCode,
    ) -> Result<oneshot::Receiver<Result<SubmissionDto, EngineError>>, EngineError> {
        let handle = self.active_session(room_id)?;
        let (tx, rx) = oneshot::channel();
        handle.send(GameCommand::Submit {
            user_id: *user_id,
            problem_index,
            code,
            respond: tx,
        });
        Ok(rx)
    }

    /// Queue an unrecorded practice run against a problem.
    pub fn test_run(
        &self,
        room_id: &str,
        user_id: &Uuid,
        problem_index: usize,
        code: PlayerCode,
    ) -> Result<oneshot::Receiver<Result<SubmissionDto, EngineError>>, EngineError> {
        let handle = self.active_session(room_id)?;
        let (tx, rx) = oneshot::channel();
        handle.send(GameCommand::TestRun {
            user_id: *user_id,
            problem_index,
            code,
            respond: tx,
        });
        Ok(rx)
    }

    /// Fire-and-forget editor state sync.
    pub fn update_code(
        &self,
        room_id: &str,
        user_id: &Uuid,
        code: PlayerCode,
    ) -> Result<(), EngineError> {
        self.active_session(room_id)?.send(GameCommand::UpdateCode {
            user_id: *user_id,
            code,
        });
        Ok(())
    }

    /// Ask the session actor to end the game early.
    pub fn manual_end(
        &self,
        room_id: &str,
        requester_id: &Uuid,
    ) -> Result<oneshot::Receiver<Result<(), EngineError>>, EngineError> {
        let handle = self.active_session(room_id)?;
        let (tx, rx) = oneshot::channel();
        handle.send(GameCommand::ManualEnd {
            requester_id: *requester_id,
            respond: tx,
        });
        Ok(rx)
    }

    /// Request a full game snapshot from the session actor.
    pub fn game_snapshot(
        &self,
        room_id: &str,
    ) -> Result<oneshot::Receiver<Box<GameDto>>, EngineError> {
        let handle = self.active_session(room_id)?;
        let (tx, rx) = oneshot::channel();
        handle.send(GameCommand::Snapshot { respond: tx });
        Ok(rx)
    }

    pub fn room_snapshot(&self, room_id: &str) -> Result<RoomDto, EngineError> {
        Ok(RoomDto::from_room(&self.entry(room_id)?.room))
    }

    /// Return the room to the lobby after a finished game. Host-only
    /// and only once the session has actually reached a terminal state.
    pub fn play_again(&mut self, room_id: &str, requester_id: &Uuid) -> Result<(), EngineError> {
        let entry = self.entry_mut(room_id)?;
        if entry.room.host_id != *requester_id {
            return Err(EngineError::forbidden(
                "not_host",
                "only the host can start a rematch",
            ));
        }
        if entry.session.is_none() {
            return Err(EngineError::conflict("no_active_game", "room has no game to replay"));
        }
        if !entry.session_ended.load(Ordering::SeqCst) {
            return Err(EngineError::conflict(
                "game_not_ended",
                "the game has not ended yet",
            ));
        }
        if let Some(handle) = entry.session.take() {
            handle.send(GameCommand::Stop { play_again: true });
        }
        entry.room.active = false;
        // Joiners who watched the last game become players next game.
        entry.room.promote_spectators();
        entry
            .broadcaster
            .broadcast(&ServerMessage::RoomSnapshot(RoomDto::from_room(&entry.room)));
        Ok(())
    }

    /// Attach an outbound channel for a room member. The channel is
    /// bounded by `limits.subscriber_message_buffer`; a slow consumer
    /// drops frames instead of stalling the session.
    pub fn subscribe(
        &self,
        room_id: &str,
        user_id: Uuid,
    ) -> Result<mpsc::Receiver<Bytes>, EngineError> {
        let entry = self.entry(room_id)?;
        if !entry.room.users().iter().any(|u| u.user_id == user_id) {
            return Err(EngineError::not_found(
                "user_not_in_room",
                "user is not a member of this room",
            ));
        }
        let (tx, rx) = mpsc::channel(self.config.limits.subscriber_message_buffer);
        entry.broadcaster.subscribe(user_id, tx);
        // Catch the new subscriber up immediately.
        entry.broadcaster.send_to(
            &user_id,
            &ServerMessage::RoomSnapshot(RoomDto::from_room(&entry.room)),
        );
        Ok(rx)
    }

    pub fn unsubscribe(&self, room_id: &str, user_id: &Uuid) {
        if let Ok(entry) = self.entry(room_id) {
            entry.broadcaster.unsubscribe(user_id);
        }
    }

    pub fn has_active_game(&self, room_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|e| e.session.is_some())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[cfg(test)]
    fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id).map(|e| &e.room)
    }
}
