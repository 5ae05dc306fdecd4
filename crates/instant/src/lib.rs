#![forbid(unsafe_code)]

//! Instant reactive bindings public facade crate.
//!
//! Application code normally needs only the [`prelude`]:
//!
//! ```ignore
//! use instant::prelude::*;
//!
//! let db = Database::init(InstantConfig::new("my-app"), &connector)?;
//! let scope = Runtime::new().root();
//! let tasks = db.use_query(&scope, Input::value(Some(query)), Input::value(None));
//! ```

#[cfg(feature = "tracing-fmt")]
pub mod logging;

pub mod prelude {
    pub use instant_bindings as bindings;
    pub use instant_core as client;
    pub use instant_reactive as reactive;

    pub use instant_bindings::{
        CursorRect, Cursors, CursorsOpts, Database, PeerCursor, PresenceHandle, PublishTopic,
        QueryHandle, Room, Timeout, TopicEffect, TypingIndicator, TypingIndicatorOpts,
        use_database,
    };
    pub use instant_core::{
        AuthState, ConnectionStatus, CoreClient, CoreConnector, CoreError, CoreHandle,
        ErrorValue, InitError, InstantConfig, PresenceOpts, PresenceRecord, PresenceState,
        QueryOpts, QueryState, RoomHandle, User,
    };
    pub use instant_reactive::{Computed, Duration, Effect, Input, Observable, Runtime, Scope};

    #[cfg(feature = "tracing-fmt")]
    pub use crate::logging::init_tracing;
}
