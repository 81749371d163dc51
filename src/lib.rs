//! Drums of the Dead: a sample-accurate drum engine and the rhythm judge that
//! scores it.
//!
//! The audio callback (see [`core::engine::Renderer`]) mixes backing tracks
//! and one-shot drum voices and reports which drums started in every block.
//! The game loop (see [`game::gameplay::Gameplay`]) submits triggers, turns
//! those reports into timestamped plays and scores them against a
//! [`game::chart::Chart`].

pub mod assets;
pub mod config;
pub mod core;
pub mod game;
