// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared wire protocol for the fortynine fabric.
//!
//! Every frame between agent, relay, and browser is a JSON envelope
//! `{"type": ..., "payload": ..., "id"?: ...}`. The closed message set lives
//! in [`messages`]; REST-shaped calls carried over the stream are in
//! [`rest`]; subscription tiers and their limits in [`tier`].

pub mod envelope;
pub mod messages;
pub mod rest;
pub mod tier;

pub use envelope::Envelope;
pub use messages::Message;
pub use rest::{RestRequest, RestResponse};
pub use tier::{Feature, Tier, TierLimits};
