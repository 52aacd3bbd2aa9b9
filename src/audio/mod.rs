//! # Audio Module
//!
//! Per-guild playback queues and the state machine that drives them.
//!
//! ## Architecture
//!
//! ### [`coordinator`] - Playback Coordinator
//! - One room lock per guild; intents and track completions are serialized
//! - Completion-driven auto-advance, loop re-insertion, cooperative expansion cancellation
//!
//! ### [`queue`] - Room Queue
//! - FIFO `pending` plus the single `current` track
//! - Session id used to discard stale completions
//!
//! ### [`player`] - Audio Sink
//! - [`player::Player`] trait consumed by the coordinator
//! - Songbird implementation that reports track end through a one-shot completion
//!
//! ### [`idle_monitor`] - Auto-disconnect
//! - Grace timer per guild when the bot is left alone in its voice channel
//!
//! ### [`events`] - Event Surface
//! - Structured [`events::RoomEvent`]s for the presentation layer

pub mod coordinator;
pub mod events;
pub mod idle_monitor;
pub mod player;
pub mod queue;
