//! Admin, block and white lists of a cluster.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use shardkeep_session::{CommandRunner, ProcessTable};

use crate::fsutil::{self, blocking, dedup_keep_order};
use crate::locks::Concern;
use crate::{GameController, RoomError};

/// Which player list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerListKind {
    Admin,
    Block,
    White,
}

impl FromStr for PlayerListKind {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adminlist" => Ok(Self::Admin),
            "blocklist" => Ok(Self::Block),
            "whitelist" => Ok(Self::White),
            other => Err(RoomError::UnknownListType(other.to_owned())),
        }
    }
}

impl fmt::Display for PlayerListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admin => "adminlist",
            Self::Block => "blocklist",
            Self::White => "whitelist",
        })
    }
}

/// Reads a list file. Blank lines and lines starting with a space (the
/// game's reserved slots) are skipped; a missing file is an empty list.
pub(crate) fn read_list(path: &Path) -> Result<Vec<String>, RoomError> {
    Ok(fsutil::read_optional(path)?
        .map(|text| {
            text.lines()
                .map(|l| l.trim_end_matches('\r'))
                .filter(|l| !l.is_empty() && !l.starts_with(' '))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default())
}

fn write_list(path: &Path, uids: &[String]) -> Result<(), RoomError> {
    let mut text = uids.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    fsutil::write_file(path, &text)
}

impl<R: CommandRunner, P: ProcessTable> GameController<R, P> {
    fn list_path(&self, kind: PlayerListKind) -> PathBuf {
        match kind {
            PlayerListKind::Admin => self.paths.adminlist.clone(),
            PlayerListKind::Block => self.paths.blocklist.clone(),
            PlayerListKind::White => self.paths.whitelist.clone(),
        }
    }

    pub async fn player_list(&self, kind: PlayerListKind) -> Result<Vec<String>, RoomError> {
        let path = self.list_path(kind);
        blocking(move || read_list(&path).map(dedup_keep_order)).await
    }

    /// Appends uids, dropping duplicates. A whitelist change also rewrites
    /// `cluster.ini`, whose slot count follows the list.
    pub async fn add_players(&self, kind: PlayerListKind, uids: &[String]) -> Result<(), RoomError> {
        {
            let _guard = self.platform.locks.lock(self.room.id, Concern::PlayerLists).await;
            let path = self.list_path(kind);
            let uids = uids.to_vec();
            blocking(move || {
                let mut list = read_list(&path)?;
                list.extend(uids);
                write_list(&path, &dedup_keep_order(list))
            })
            .await?;
        }
        tracing::info!(room_id = self.room.id, list = %kind, count = uids.len(), "players added");
        if kind == PlayerListKind::White {
            self.write_room_files().await?;
        }
        Ok(())
    }

    /// Removes a uid. Removing a uid that is not listed changes nothing.
    pub async fn remove_player(&self, kind: PlayerListKind, uid: &str) -> Result<(), RoomError> {
        let changed = {
            let _guard = self.platform.locks.lock(self.room.id, Concern::PlayerLists).await;
            let path = self.list_path(kind);
            let uid = uid.to_owned();
            blocking(move || {
                let list = read_list(&path)?;
                if !list.contains(&uid) {
                    return Ok(false);
                }
                let kept: Vec<String> = list.into_iter().filter(|u| *u != uid).collect();
                write_list(&path, &dedup_keep_order(kept))?;
                Ok(true)
            })
            .await?
        };
        if !changed {
            return Ok(());
        }
        tracing::info!(room_id = self.room.id, list = %kind, uid, "player removed");
        if kind == PlayerListKind::White {
            self.write_room_files().await?;
        }
        Ok(())
    }
}
