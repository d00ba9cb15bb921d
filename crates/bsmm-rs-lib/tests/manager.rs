use std::sync::Arc;

use bsmm_rs::catalog::ModDescriptor;
use bsmm_rs::installed::InstallReason;
use bsmm_rs::{Catalog, Mod, ModInstaller, ModManager};
use bsmm_rs_test_utils::*;
use tokio_util::sync::CancellationToken;

fn init() {
	let _ = env_logger::builder().is_test(true).try_init();
}

struct Session {
	game: GameDir,
	manager: ModManager,
	acquirer: Arc<FakeAcquirer>,
	patcher: Arc<CountingPatcher>,
}

/// Every mod ships a single plugin named after it.
fn session(entries: Vec<ModDescriptor>, force_reinstall: bool) -> Session {
	init();
	let game = GameDir::new().unwrap();
	let mut config = game.config();
	config.set_force_reinstall(force_reinstall);

	let mut acquirer = FakeAcquirer::new();
	let mut mods = Vec::new();
	for entry in entries {
		let archive = ArchiveBuilder::new().file(format!("Plugins/{}.dll", entry.name), entry.name.clone().into_bytes());
		let url = format!("/{}.zip", entry.name);
		acquirer = acquirer.with_archive(url.clone(), archive.build().unwrap());
		mods.push(with_download(entry, "steam", &url, archive.hashes()));
	}

	let acquirer = Arc::new(acquirer);
	let patcher = Arc::new(CountingPatcher::default());
	let installer = ModInstaller::new(&config, acquirer.clone(), patcher.clone());
	let manager = ModManager::new(config, Catalog::new(mods), installer);
	Session { game, manager, acquirer, patcher }
}

fn get(session: &Session, name: &str) -> Mod {
	Mod::Catalog(session.manager.catalog().get(name).cloned().unwrap())
}

fn sorted_names(mods: &[Mod]) -> Vec<&str> {
	let mut names: Vec<&str> = mods.iter().map(Mod::name).collect();
	names.sort();
	names
}

#[tokio::test]
async fn refresh_installs_selection_with_dependencies() {
	let s = session(vec![descriptor("SongCore", &[]), descriptor("Counters", &["SongCore"])], false);

	let result = s.manager.refresh(&[get(&s, "Counters")], CancellationToken::new()).await.unwrap();

	assert_eq!(sorted_names(&result.installed), vec!["Counters", "SongCore"]);
	assert!(result.uninstalled.is_empty());
	let installed = s.manager.installer().installed().await;
	assert_eq!(installed.reason("Counters"), Some(InstallReason::Explicit));
	assert_eq!(installed.reason("SongCore"), Some(InstallReason::AsDependency));
	assert!(s.game.install_dir().join("IPA/Pending/Plugins/SongCore.dll").is_file());
}

#[tokio::test]
async fn refresh_skips_mods_that_are_up_to_date() {
	let s = session(vec![descriptor("SongCore", &[]), descriptor("Counters", &["SongCore"])], false);
	s.manager.refresh(&[get(&s, "Counters")], CancellationToken::new()).await.unwrap();
	assert_eq!(s.acquirer.requests(), 2);

	let result = s.manager.refresh(&[get(&s, "Counters")], CancellationToken::new()).await.unwrap();

	assert!(result.installed.is_empty());
	assert!(result.uninstalled.is_empty());
	assert_eq!(s.acquirer.requests(), 2);
}

#[tokio::test]
async fn force_reinstall_installs_everything_again() {
	let s = session(vec![descriptor("SongCore", &[])], true);
	s.manager.refresh(&[get(&s, "SongCore")], CancellationToken::new()).await.unwrap();

	let result = s.manager.refresh(&[get(&s, "SongCore")], CancellationToken::new()).await.unwrap();

	assert_eq!(result.installed.len(), 1);
	assert_eq!(s.acquirer.requests(), 2);
}

#[tokio::test]
async fn refresh_uninstalls_deselected_mods_and_their_orphans() {
	let s = session(vec![
		descriptor("SongCore", &[]),
		descriptor("Counters", &["SongCore"]),
		descriptor("Playlists", &[]),
	], false);
	s.manager.refresh(&[get(&s, "Counters"), get(&s, "Playlists")], CancellationToken::new()).await.unwrap();

	let result = s.manager.refresh(&[get(&s, "Playlists")], CancellationToken::new()).await.unwrap();

	assert!(result.installed.is_empty());
	assert_eq!(sorted_names(&result.uninstalled), vec!["Counters", "SongCore"]);
	let installed = s.manager.installer().installed().await;
	assert_eq!(installed.len(), 1);
	assert!(installed.contains("Playlists"));
	assert!(!s.game.install_dir().join("IPA/Pending/Plugins/Counters.dll").exists());
}

#[tokio::test]
async fn refresh_replaces_conflicting_mods() {
	let mut new_hud = descriptor("NewHUD", &[]);
	new_hud.conflicts = vec!["OldHUD".to_string()];
	let s = session(vec![new_hud, descriptor("OldHUD", &[])], false);
	s.manager.refresh(&[get(&s, "OldHUD")], CancellationToken::new()).await.unwrap();

	let result = s.manager.refresh(&[get(&s, "NewHUD")], CancellationToken::new()).await.unwrap();

	assert_eq!(sorted_names(&result.installed), vec!["NewHUD"]);
	assert_eq!(sorted_names(&result.uninstalled), vec!["OldHUD"]);
}

#[tokio::test]
async fn uninstall_mod_loader_without_a_loader_does_nothing() {
	let s = session(vec![descriptor("SongCore", &[])], false);

	assert!(s.manager.uninstall_mod_loader(CancellationToken::new()).await.unwrap().is_none());
	assert_eq!(s.patcher.unpatches(), 0);
}

#[tokio::test]
async fn uninstall_mod_loader_unpatches_the_game() {
	let s = session(vec![descriptor("BSIPA", &[]), descriptor("SongCore", &["BSIPA"])], false);
	s.manager.refresh(&[get(&s, "SongCore")], CancellationToken::new()).await.unwrap();
	assert_eq!(s.patcher.patches(), 1);

	let removed = s.manager.uninstall_mod_loader(CancellationToken::new()).await.unwrap();

	assert_eq!(removed.as_ref().map(Mod::name), Some("BSIPA"));
	assert_eq!(s.patcher.unpatches(), 1);
	let installed = s.manager.installer().installed().await;
	assert!(installed.loader().is_none());
	assert!(installed.contains("SongCore"));
}

#[tokio::test]
async fn uninstall_all_mods_clears_everything() {
	let s = session(vec![descriptor("BSIPA", &[]), descriptor("SongCore", &["BSIPA"])], false);
	s.manager.refresh(&[get(&s, "SongCore")], CancellationToken::new()).await.unwrap();

	let removed = s.manager.uninstall_all_mods(CancellationToken::new()).await.unwrap();

	assert_eq!(sorted_names(&removed), vec!["BSIPA", "SongCore"]);
	assert!(s.manager.installer().installed().await.is_empty());
	let dir = s.game.install_dir();
	assert!(!dir.join("Plugins").exists());
	assert!(!dir.join("IPA").exists());
}

#[tokio::test]
async fn refresh_needs_an_install_dir() {
	init();
	let installer = ModInstaller::new(&bsmm_rs::Config::default(), Arc::new(FakeAcquirer::new()), Arc::new(CountingPatcher::default()));
	let manager = ModManager::new(bsmm_rs::Config::default(), Catalog::default(), installer);

	let result = manager.refresh(&[], CancellationToken::new()).await;

	assert!(matches!(result, Err(bsmm_rs::Error::InstallDirMissing)));
}

#[tokio::test]
async fn uninstall_mod_loader_reports_unsupported_platforms() {
	init();
	let game = GameDir::new().unwrap();
	let config = game.config();
	let loader = Mod::Catalog(with_download(descriptor("BSIPA", &[]), "steam", "/bsipa.zip", vec![file_hash("IPA.exe", b"patcher")]));
	let mut installed = bsmm_rs::InstalledSet::new("BSIPA");
	installed.add(loader);
	let installer = ModInstaller::new(&config, Arc::new(FakeAcquirer::new()), Arc::new(CountingPatcher::new(PatchOutcome::Unsupported)))
		.with_installed(installed);
	let manager = ModManager::new(config, Catalog::default(), installer);

	let result = manager.uninstall_mod_loader(CancellationToken::new()).await;

	assert!(matches!(result, Err(bsmm_rs::Error::UnsupportedPlatform)));
	assert!(manager.installer().installed().await.loader().is_some());
}

#[tokio::test]
async fn uninstall_all_mods_keeps_everything_when_unpatching_is_unsupported() {
	init();
	let game = GameDir::new().unwrap();
	let config = game.config();
	game.write("IPA.exe", b"patcher").unwrap();
	game.write("IPA/Pending/Plugins/Counters.dll", b"Counters").unwrap();
	game.write("Plugins/Counters.dll", b"Counters").unwrap();

	let loader = Mod::Catalog(with_download(descriptor("BSIPA", &[]), "steam", "/bsipa.zip", vec![file_hash("IPA.exe", b"patcher")]));
	let counters = Mod::Catalog(with_download(descriptor("Counters", &[]), "steam", "/counters.zip", vec![file_hash("Plugins/Counters.dll", b"Counters")]));
	let mut installed = bsmm_rs::InstalledSet::new("BSIPA");
	installed.add(loader);
	installed.add(counters);
	let patcher = Arc::new(CountingPatcher::new(PatchOutcome::Unsupported));
	let installer = ModInstaller::new(&config, Arc::new(FakeAcquirer::new()), patcher.clone()).with_installed(installed);
	let manager = ModManager::new(config, Catalog::default(), installer);

	let result = manager.uninstall_all_mods(CancellationToken::new()).await;

	assert!(matches!(result, Err(bsmm_rs::Error::UnsupportedPlatform)));
	assert_eq!(patcher.unpatches(), 1);
	assert!(game.install_dir().join("IPA.exe").exists());
	assert!(game.install_dir().join("IPA/Pending/Plugins/Counters.dll").exists());
	assert!(game.install_dir().join("Plugins/Counters.dll").exists());
	assert_eq!(manager.installer().installed().await.len(), 2);
}
