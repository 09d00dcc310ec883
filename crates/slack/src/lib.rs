//! Slack Integration - Events API surface
//!
//! This crate provides the chat surface for tickety:
//! - **Signature verification** (`signature`) - keyed-hash authenticity check
//!   over timestamp + raw body
//! - **Events** (`events`) - webhook payload types: URL verification
//!   challenge, event callbacks, retry-delivery detection
//! - **Web API client** (`client`) - fetch a thread's messages, post a
//!   top-level or threaded reply
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Event Subscriptions pointing at `/slack/events`
//! 3. Subscribe to `app_mention` and `message.channels`
//! 4. Set env vars: `TICKETY_SLACK_SIGNING_SECRET`, `TICKETY_SLACK_BOT_TOKEN`,
//!    `TICKETY_SLACK_BOT_USER_ID`

pub mod client;
pub mod events;
pub mod signature;
