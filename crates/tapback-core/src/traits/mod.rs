// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits at every seam between the engine and the outside world.

pub mod contacts;
pub mod events;
pub mod media;
pub mod provider;
pub mod search;
pub mod sender;
pub mod settings;
pub mod source;

pub use contacts::ContactResolver;
pub use events::EventSink;
pub use media::MediaConverter;
pub use provider::{ModelProvider, ModelStream};
pub use search::WebSearch;
pub use sender::MessageSender;
pub use settings::SettingsProvider;
pub use source::ChatSource;
