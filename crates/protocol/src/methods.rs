//! Canonical method names crossing the bridge.
//!
//! Names are retained from the downstream agent's protocol for
//! compatibility; the bridge never renames a method in flight.

/// client → bridge: open a session. Params `{cwd, model?, mcpServers?}`,
/// returns `{sessionId}`.
pub const SESSION_NEW: &str = "session/new";
/// client → bridge: submit a user prompt.
pub const SESSION_PROMPT: &str = "session/prompt";
/// client → bridge: cancel the current turn.
pub const SESSION_CANCEL: &str = "session/cancel";
/// bridge → client: streaming update.
pub const SESSION_UPDATE: &str = "session/update";
/// bridge → client: request tool approval (a request — the client replies).
pub const SESSION_REQUEST_PERMISSION: &str = "session/request_permission";
/// client → bridge: redundant notification mirror of the permission response.
pub const SESSION_PROVIDE_PERMISSION: &str = "session/provide_permission";
/// client → bridge: deliver the OAuth code typed by the user.
pub const SUBMIT_AUTH_CODE: &str = "gemini/submitAuthCode";
/// client → bridge: distinguished authenticate request, allowed through
/// the auth gate.
pub const AUTHENTICATE: &str = "gemini/authenticate";
/// bridge → client: announce the agent's OAuth URL.
pub const AUTH_URL: &str = "gemini/authUrl";
/// subprocess → bridge: intercepted and serviced locally.
pub const FS_READ_TEXT_FILE: &str = "fs/read_text_file";
/// subprocess → bridge: intercepted and serviced locally.
pub const FS_WRITE_TEXT_FILE: &str = "fs/write_text_file";
/// bridge → client: envelope for replayed historical frames.
pub const BRIDGE_REPLAY: &str = "bridge/replay";
/// bridge → client: structured event extracted from the text stream.
pub const BRIDGE_STRUCTURED_EVENT: &str = "bridge/structured_event";

/// Session update discriminator: end of the current turn.
pub const UPDATE_END_OF_TURN: &str = "end_of_turn";
