//! Workshop mods: downloads, manifests and per-world override tables.
//!
//! Two kinds of mod exist:
//!
//! - **UGC** mods are fetched by steamcmd into a per-room download dir,
//!   copied into every world's content dir and recorded in every world's
//!   workshop manifest.
//! - **Non-UGC** mods come as a zip archive from a URL and are unpacked
//!   into the game's shared `mods/workshop-<id>` directory.
//!
//! Which mods a world runs, and with which options, lives in its override
//! table (`modoverrides.lua`), or in the room's shared table when the room
//! unifies mods across worlds.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use shardkeep_codec::{
    ConfigurationOption, GAME_APP_ID, ManifestDocument, ModConfig, ModOverrideCollection,
    parse_configuration_options, workshop_key,
};
use shardkeep_session::{CommandRunner, ProcessTable, dir_size};

use crate::fsutil::{self, blocking};
use crate::locks::Concern;
use crate::paths::WorldPaths;
use crate::{GameController, RoomError};

/// A mod present on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedMod {
    pub id: u64,
    pub ugc: bool,
    /// Size as recorded by the manifest; `"0"` for non-UGC mods.
    pub local_size: String,
}

impl<R: CommandRunner, P: ProcessTable> GameController<R, P> {
    // -- downloads ----------------------------------------------------------

    /// Downloads a mod and returns its size in bytes.
    ///
    /// Without a URL the mod is a UGC item fetched through steamcmd;
    /// with one, the URL points at a zip archive.
    pub async fn download_mod(&self, mod_id: u64, file_url: Option<&str>) -> Result<u64, RoomError> {
        let _download = self.platform.downloads.begin();
        let size = match file_url.filter(|u| !u.is_empty()) {
            None => self.download_ugc_mod(mod_id).await?,
            Some(url) => self.download_archive_mod(mod_id, url).await?,
        };
        tracing::info!(room_id = self.room.id, mod_id, size, "mod downloaded");
        Ok(size)
    }

    async fn download_ugc_mod(&self, mod_id: u64) -> Result<u64, RoomError> {
        let command = format!(
            "{}/steamcmd.sh +force_install_dir {} +login anonymous +workshop_download_item {GAME_APP_ID} {mod_id} +quit",
            self.platform.paths.steamcmd_dir().display(),
            self.paths.ugc_download_dir.display(),
        );
        self.platform.sessions.runner().run(&command).await?.check(&command)?;

        let source = self.paths.downloaded_content(mod_id);
        let worlds: Vec<WorldPaths> = self.worlds.iter().map(|w| self.world_paths(w)).collect();
        {
            let worlds = worlds.clone();
            let source = source.clone();
            blocking(move || {
                for world in &worlds {
                    let target = world.ugc_content.join(mod_id.to_string());
                    fsutil::remove_dir_if_exists(&target)?;
                    fsutil::copy_dir(&source, &target)?;
                }
                Ok(())
            })
            .await?;
        }

        self.install_manifest_entry(mod_id, &worlds).await?;

        let first = worlds
            .first()
            .map(|w| w.ugc_content.join(mod_id.to_string()))
            .ok_or(RoomError::NoWorlds(self.room.id))?;
        Ok(tokio::task::spawn_blocking(move || dir_size(&first))
            .await
            .unwrap_or_default())
    }

    /// Merges the downloaded manifest entry into every world's manifest.
    ///
    /// Every world gets the same document, derived from the first world's.
    /// If anything fails, the first world's previous manifest is written
    /// back to every world.
    async fn install_manifest_entry(&self, mod_id: u64, worlds: &[WorldPaths]) -> Result<(), RoomError> {
        let _guard = self.platform.locks.lock(self.room.id, Concern::Manifest).await;
        let downloaded = self.paths.downloaded_manifest();
        let worlds = worlds.to_vec();
        let room_id = self.room.id;

        blocking(move || {
            let first = worlds.first().ok_or(RoomError::NoWorlds(room_id))?;
            let previous = fsutil::read_optional(&first.manifest)?.unwrap_or_default();

            let merged = (|| -> Result<(), RoomError> {
                let text = fsutil::read_optional(&downloaded)?.unwrap_or_default();
                let source = ManifestDocument::parse(&text)?;
                let document = if previous.trim().is_empty() {
                    source
                } else {
                    let mut current = ManifestDocument::parse(&previous)?;
                    if current.installed.len() > current.details.len() {
                        return Err(RoomError::ManifestConflict(format!(
                            "{} installed items but {} details",
                            current.installed.len(),
                            current.details.len()
                        )));
                    }
                    current.merge_item(&source, &mod_id.to_string())?;
                    current
                };
                let acf = document.to_acf();
                for world in &worlds {
                    fsutil::write_file(&world.manifest, &acf)?;
                }
                Ok(())
            })();

            if let Err(e) = &merged {
                tracing::warn!(room_id, mod_id, error = %e, "manifest update failed, restoring previous manifest");
                for world in &worlds {
                    if let Err(e) = fsutil::write_file(&world.manifest, &previous) {
                        tracing::error!(room_id, error = %e, "manifest restore failed");
                    }
                }
            }
            merged
        })
        .await
    }

    async fn download_archive_mod(&self, mod_id: u64, url: &str) -> Result<u64, RoomError> {
        let mods_dir = self.platform.paths.local_mods_dir();
        let archive = mods_dir.join(format!("{mod_id}.zip"));
        let target = mods_dir.join(format!("workshop-{mod_id}"));

        let response = self.platform.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(RoomError::Download(format!("{url} answered {}", response.status())));
        }
        let bytes = response.bytes().await?;
        let size = bytes.len() as u64;

        {
            let archive = archive.clone();
            let target = target.clone();
            blocking(move || {
                fsutil::remove_dir_if_exists(&target)?;
                fsutil::ensure_dir(&mods_dir)?;
                std::fs::write(&archive, &bytes).map_err(RoomError::io(&archive))
            })
            .await?;
        }

        let unzip = format!(
            "unzip -q -o '{}' -d '{}'",
            archive.display(),
            target.display()
        );
        let unpacked = match self.platform.sessions.runner().run(&unzip).await {
            Ok(out) => out.check(&unzip).map(|_| ()).map_err(RoomError::from),
            Err(e) => Err(e.into()),
        };
        blocking(move || fsutil::remove_file_if_exists(&archive)).await?;
        unpacked?;
        Ok(size)
    }

    // -- listing ------------------------------------------------------------

    /// Non-UGC mods in the game's mod dir, then UGC mods installed in the
    /// first world.
    pub async fn downloaded_mods(&self) -> Result<Vec<DownloadedMod>, RoomError> {
        let mods_dir = self.platform.paths.local_mods_dir();
        let manifest = self.world_paths(self.first_world()?).manifest;
        blocking(move || {
            let mut mods: Vec<DownloadedMod> = fsutil::dir_names(&mods_dir)?
                .iter()
                .filter_map(|name| name.strip_prefix("workshop-")?.parse().ok())
                .map(|id| DownloadedMod {
                    id,
                    ugc: false,
                    local_size: "0".to_owned(),
                })
                .collect();

            let text = fsutil::read_optional(&manifest)?.unwrap_or_default();
            if !text.trim().is_empty() {
                let document = ManifestDocument::parse(&text)?;
                mods.extend(document.installed.iter().map(|item| DownloadedMod {
                    id: item.id.parse().unwrap_or_default(),
                    ugc: true,
                    local_size: item.size.clone(),
                }));
            }
            Ok(mods)
        })
        .await
    }

    /// Configuration options a mod declares in its `modinfo.lua`.
    pub async fn mod_options(
        &self,
        world_id: i64,
        mod_id: u64,
        ugc: bool,
    ) -> Result<Vec<ConfigurationOption>, RoomError> {
        let path = self.modinfo_path(world_id, mod_id, ugc)?;
        blocking(move || {
            let src = std::fs::read_to_string(&path).map_err(RoomError::io(&path))?;
            Ok(parse_configuration_options(&src)?)
        })
        .await
    }

    fn modinfo_path(&self, world_id: i64, mod_id: u64, ugc: bool) -> Result<PathBuf, RoomError> {
        if !ugc {
            return Ok(self
                .platform
                .paths
                .local_mods_dir()
                .join(format!("workshop-{mod_id}/modinfo.lua")));
        }
        let world = if self.room.mod_in_one {
            self.first_world()?
        } else {
            self.world(world_id)?
        };
        Ok(self
            .world_paths(world)
            .ugc_content
            .join(mod_id.to_string())
            .join("modinfo.lua"))
    }

    // -- override tables ----------------------------------------------------

    fn overrides_of(&self, world_id: i64) -> Result<ModOverrideCollection, RoomError> {
        let text = if self.room.mod_in_one {
            &self.room.mod_data
        } else {
            &self.world(world_id)?.mod_data
        };
        Ok(ModOverrideCollection::parse(text)?)
    }

    /// Ids of the mods a world runs. The disabled-local-mods entry is `0`.
    pub fn enabled_mods(&self, world_id: i64) -> Result<Vec<u64>, RoomError> {
        Ok(self.overrides_of(world_id)?.workshop_ids())
    }

    /// Current configuration of one mod in one world.
    pub fn mod_config(&self, world_id: i64, mod_id: u64) -> Result<ModConfig, RoomError> {
        self.overrides_of(world_id)?
            .get(&workshop_key(mod_id))
            .cloned()
            .ok_or(RoomError::ModNotEnabled(mod_id))
    }

    /// Enables a mod with the defaults declared by its `modinfo.lua`.
    ///
    /// Id `0` is the disabled-local-mods entry and has no options. The
    /// mod is added to the shared table, or to every world's table.
    pub async fn enable_mod(&mut self, world_id: i64, mod_id: u64, ugc: bool) -> Result<(), RoomError> {
        let options = if mod_id == 0 {
            Vec::new()
        } else {
            self.mod_options(world_id, mod_id, ugc).await?
        };
        let config = ModConfig {
            enabled: true,
            configuration_options: options
                .into_iter()
                .filter_map(|o| Some((o.name, o.default?)))
                .collect(),
        };
        let key = workshop_key(mod_id);
        self.edit_all_tables(|mods| mods.insert(key.clone(), config.clone()))?;
        tracing::info!(room_id = self.room.id, mod_id, "mod enabled");
        self.write_mod_override_files().await
    }

    /// Removes a mod from every table.
    pub async fn disable_mod(&mut self, mod_id: u64) -> Result<(), RoomError> {
        let key = workshop_key(mod_id);
        self.edit_all_tables(|mods| {
            mods.remove(&key);
        })?;
        tracing::info!(room_id = self.room.id, mod_id, "mod disabled");
        self.write_mod_override_files().await
    }

    /// Replaces the configuration of one mod, in the shared table or in
    /// one world's table.
    pub async fn change_mod_config(&mut self, world_id: i64, mod_id: u64, config: ModConfig) -> Result<(), RoomError> {
        let key = workshop_key(mod_id);
        if self.room.mod_in_one {
            let mut mods = ModOverrideCollection::parse(&self.room.mod_data)?;
            mods.insert(key, config);
            self.room.mod_data = mods.to_lua();
        } else {
            let world = self
                .worlds
                .iter_mut()
                .find(|w| w.id == world_id)
                .ok_or(RoomError::WorldNotFound(world_id))?;
            let mut mods = ModOverrideCollection::parse(&world.mod_data)?;
            mods.insert(key, config);
            world.mod_data = mods.to_lua();
        }
        self.write_mod_override_files().await
    }

    fn edit_all_tables(&mut self, mut edit: impl FnMut(&mut ModOverrideCollection)) -> Result<(), RoomError> {
        if self.room.mod_in_one {
            let mut mods = ModOverrideCollection::parse(&self.room.mod_data)?;
            edit(&mut mods);
            self.room.mod_data = mods.to_lua();
            return Ok(());
        }
        let mut updated = Vec::with_capacity(self.worlds.len());
        for world in &self.worlds {
            let mut mods = ModOverrideCollection::parse(&world.mod_data)?;
            edit(&mut mods);
            updated.push(mods.to_lua());
        }
        for (world, text) in self.worlds.iter_mut().zip(updated) {
            world.mod_data = text;
        }
        Ok(())
    }

    /// Writes the current override tables to every world's
    /// `modoverrides.lua`.
    pub async fn write_mod_override_files(&self) -> Result<(), RoomError> {
        let _guard = self.platform.locks.lock(self.room.id, Concern::ModOverrides).await;
        let files: Vec<(PathBuf, String)> = self
            .worlds
            .iter()
            .map(|w| (self.world_paths(w).mod_overrides, self.mod_overrides_text(w).to_owned()))
            .collect();
        blocking(move || {
            for (path, text) in &files {
                fsutil::write_file(path, text)?;
            }
            Ok(())
        })
        .await
    }

    /// Deletes a mod from disk: UGC mods lose their manifest entries and
    /// content in every world, non-UGC mods their shared directory.
    pub async fn delete_mod(&self, mod_id: u64, ugc: bool) -> Result<(), RoomError> {
        if !ugc {
            let dir = self
                .platform
                .paths
                .local_mods_dir()
                .join(format!("workshop-{mod_id}"));
            return blocking(move || fsutil::remove_dir_if_exists(&dir)).await;
        }

        let _guard = self.platform.locks.lock(self.room.id, Concern::Manifest).await;
        let worlds: Vec<WorldPaths> = self.worlds.iter().map(|w| self.world_paths(w)).collect();
        blocking(move || {
            let id = mod_id.to_string();
            for world in &worlds {
                let text = fsutil::read_optional(&world.manifest)?.unwrap_or_default();
                let mut document = ManifestDocument::parse(&text)?;
                if document.remove_item(&id) {
                    fsutil::write_file(&world.manifest, &document.to_acf())?;
                }
                fsutil::remove_dir_if_exists(&world.ugc_content.join(&id))?;
            }
            Ok(())
        })
        .await?;
        tracing::info!(room_id = self.room.id, mod_id, "mod deleted");
        Ok(())
    }
}
