//! Tank Arena Server - authoritative simulation for multiplayer tank combat
//!
//! - `game`: fixed-step world, terrain, spawn selection
//! - `ai`: input synthesis for computer-controlled tanks
//! - `room`: round lifecycle, tick driver and room registry
//! - `ws` / `http`: client transport
//! - `store`: session history

pub mod ai;
pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod room;
pub mod store;
pub mod util;
pub mod ws;
