//! gembridge server: fronts the Gemini CLI agent subprocess with a
//! multi-client WebSocket wire protocol.
//!
//! Pipeline: subprocess stdout → [`framer`] → [`supervisor`] → [`hub`]
//! (with the [`tagparse`] transform applied to assistant text chunks)
//! → every connected WebSocket client. Client frames flow the other way
//! through [`hub`] onto the subprocess's stdin.

pub mod checkpoint;
pub mod cli;
pub mod framer;
pub mod fstools;
pub mod hub;
pub mod logfile;
pub mod ring;
pub mod state;
pub mod supervisor;
pub mod tagparse;
pub mod ws;
