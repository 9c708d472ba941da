//! ER:LC server log relay and Discord role based team enforcement.
//!
//! A single-flight [`poller::LogPoller`] fetches the join/leave and kill logs,
//! the [`dispatcher::EventDispatcher`] forwards entries newer than each
//! stream's watermark to notification channels, and every join is checked by
//! the [`enforcement::TeamEnforcementEngine`] against the role to team policy.

pub mod account_link;
pub mod api;
pub mod config;
pub mod discord;
pub mod dispatcher;
pub mod enforcement;
pub mod error;
pub mod game_server;
pub mod http;
pub mod identity;
pub mod linking;
pub mod log_entry;
pub mod metrics;
pub mod notify;
pub mod policy;
pub mod poller;
pub mod roblox;
pub mod shift_ledger;
pub mod storage;
pub mod testing;
pub mod types;
pub mod watermark;
