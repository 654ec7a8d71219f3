//! Console RPC over a terminal session and its log file.
//!
//! A running world accepts commands only through its terminal's input and
//! answers only by appending to `server_log.txt`. There is no response
//! channel, so every query is built the same way:
//!
//! 1. **Inject** a `print(...)` wrapped expression ([`ConsoleTransport::inject`]).
//! 2. **Wait** a fixed delay for the server to flush ([`ProtocolTiming`]).
//! 3. **Tail** a bounded window of the log.
//! 4. **Scan** backward for a marker and parse the payload ([`parse`]).
//!
//! The transport is a trait so the scanning logic can be driven by a fake
//! that answers with canned log lines.
//!
//! # Framing
//!
//! ```text
//! coordinate   last echo of the command, then the third line after it
//! census       start bracket .. count lines .. finish bracket
//! position     start sentinel <uid> [nonce] .. x y z .. end sentinel <uid> [nonce]
//! player list  first "playerlist 99999999 [0]" line to the end of the window
//! ```

#![allow(async_fn_in_trait)]

mod error;
pub mod parse;
mod protocol;
mod transport;

pub use error::ConsoleError;
pub use parse::{Coordinate, OnlinePlayer, PrefabCount, coordinate_to_px};
pub use protocol::{
    CENSUS_PREFABS, ConsoleProtocol, LANDMARK_PREFABS, Landmark, PlayerPosition, ProtocolTiming,
};
pub use transport::{ConsoleTransport, ScreenTransport, tail_bytes, tail_lines};
