mod client;
mod config;
mod conversation;
mod error;
mod fold;
mod paths;
mod session;
mod settings;
pub mod sse;
pub mod supervisor;
mod trace;

pub use client::{SendOutcome, SessionClient};
pub use config::{
    ClientConfig, SupervisorConfig, DEFAULT_CHILD_COMMAND, DEFAULT_READY_KEYWORDS,
    DEFAULT_READY_MARKER,
};
pub use conversation::{ConversationEvent, ConversationMessage, Role, TraceEntry};
pub use error::{BootstrapError, ClientError, SupervisorError, TransportError};
pub use fold::{RunFold, NO_RESPONSE_NOTICE};
pub use paths::{docnav_config_path, docnav_home_dir, user_home_dir};
pub use session::{SessionBootstrap, SessionHandle};
pub use settings::{ClientSettings, DocnavSettings};
pub use sse::{decode_stream, EventDecoder, SseRecord};
pub use supervisor::{Supervisor, SupervisorExit, SupervisorMonitor, SupervisorState};
pub use trace::TraceRecorder;
