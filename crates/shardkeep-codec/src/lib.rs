//! Text formats spoken by the dedicated game server.
//!
//! Shardkeep never links against the game. Everything it knows about a
//! running cluster comes from files on disk and lines in a console log,
//! and everything it changes goes back out as files. This crate holds the
//! pure codecs for those files:
//!
//! - **Manifest** ([`ManifestDocument`]): the keyed-block workshop manifest
//!   (`appworkshop_322330.acf`) with parse, serialize and merge.
//! - **Lua literals** ([`LuaValue`], [`parse_literal`]): a literal-only
//!   reader for `return { ... }` tables used by mod overrides, world
//!   session metadata and mod descriptors.
//! - **Mod overrides** ([`ModOverrideCollection`]): the per-world enabled
//!   mod table, emitted deterministically.
//! - **Mod descriptors** ([`parse_configuration_options`]): the
//!   `configuration_options` table of a `modinfo.lua`.
//! - **Backup names** ([`BackupName`]): reversible archive file names.
//! - **INI** ([`IniDocument`]): ordered writer for `cluster.ini` and
//!   `server.ini`.
//!
//! # Architecture
//!
//! ```text
//! disk (text) → codec (typed values) → room controller
//! ```
//!
//! None of these modules perform I/O. Callers read the file, hand the
//! string in, and write the string they get back.

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod backup_name;
mod error;
mod ini;
mod lua;
mod manifest;
mod modinfo;
mod modoverrides;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use backup_name::BackupName;
pub use error::CodecError;
pub use ini::{IniDocument, IniSection};
pub use lua::{LuaValue, find_assignment, format_number, parse_literal, parse_literal_lenient};
pub use manifest::{InstalledItem, ItemDetail, ManifestDocument};
pub use modinfo::{ConfigurationOption, OptionChoice, parse_configuration_options};
pub use modoverrides::{
    DISABLED_LOCAL_MODS_KEY, ModConfig, ModOverrideCollection, format_lua_key,
    format_lua_value, workshop_key,
};

/// Steam application id of the game client, used for workshop content paths.
pub const GAME_APP_ID: &str = "322330";

/// Steam application id of the dedicated server.
pub const SERVER_APP_ID: &str = "343050";
