//! Session names and launch variants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Directory name of a room's cluster (`Cluster_<room>`).
pub fn cluster_dir_name(room_id: i64) -> String {
    format!("Cluster_{room_id}")
}

/// Prefix shared by every session of a room (`DMP_Cluster_<room>`).
pub fn session_prefix(room_id: i64) -> String {
    format!("DMP_{}", cluster_dir_name(room_id))
}

/// The terminal session name of one world: `DMP_Cluster_<room>_<world>`.
///
/// Derived, never stored. Two worlds of the same room differ by world
/// name, and the game requires world names to be unique within a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionName(String);

impl SessionName {
    pub fn new(room_id: i64, world_name: &str) -> Self {
        Self(format!("{}_{world_name}", session_prefix(room_id)))
    }

    /// Wraps a name observed in the process table.
    pub fn from_raw(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which server binary a room launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartVariant {
    #[serde(rename = "32-bit")]
    Bit32,
    #[serde(rename = "64-bit")]
    Bit64,
    #[serde(rename = "luajit")]
    LuaJit,
}

impl StartVariant {
    /// Directory under the game install holding the binary.
    pub fn bin_dir(self) -> &'static str {
        match self {
            Self::Bit32 => "bin",
            Self::Bit64 | Self::LuaJit => "bin64",
        }
    }

    pub fn executable(self) -> &'static str {
        match self {
            Self::Bit32 => "dontstarve_dedicated_server_nullrenderer",
            Self::Bit64 => "dontstarve_dedicated_server_nullrenderer_x64",
            Self::LuaJit => "dontstarve_dedicated_server_nullrenderer_x64_luajit",
        }
    }
}

impl FromStr for StartVariant {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "32-bit" => Ok(Self::Bit32),
            "64-bit" => Ok(Self::Bit64),
            "luajit" => Ok(Self::LuaJit),
            other => Err(SessionError::UnknownStartVariant(other.to_owned())),
        }
    }
}

impl fmt::Display for StartVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bit32 => "32-bit",
            Self::Bit64 => "64-bit",
            Self::LuaJit => "luajit",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_name_format() {
        assert_eq!(SessionName::new(3, "Master").as_str(), "DMP_Cluster_3_Master");
        assert_eq!(session_prefix(42), "DMP_Cluster_42");
    }

    #[test]
    fn test_start_variant_parse() {
        assert_eq!("64-bit".parse::<StartVariant>().unwrap(), StartVariant::Bit64);
        assert_eq!("luajit".parse::<StartVariant>().unwrap().bin_dir(), "bin64");
        assert!(matches!(
            "arm64".parse::<StartVariant>(),
            Err(SessionError::UnknownStartVariant(v)) if v == "arm64"
        ));
    }

    #[test]
    fn test_start_variant_display_round_trips() {
        for v in [StartVariant::Bit32, StartVariant::Bit64, StartVariant::LuaJit] {
            assert_eq!(v.to_string().parse::<StartVariant>().unwrap(), v);
        }
    }
}
