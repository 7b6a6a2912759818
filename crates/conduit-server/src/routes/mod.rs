// SPDX-License-Identifier: Apache-2.0
pub mod chat;
pub mod health;
pub mod messages;
pub mod models;
pub mod sessions;
pub mod webhooks;
