use std::path::Path;

use bsmm_rs::GameLayout;
use bsmm_rs::patcher::*;
use bsmm_rs_test_utils::*;

fn init() {
	let _ = env_logger::builder().is_test(true).try_init();
}

fn count(haystack: &str, line: &str) -> usize {
	haystack.lines().filter(|l| *l == line).count()
}

#[tokio::test]
async fn process_patcher_refuses_an_already_patched_game() {
	init();
	let game = GameDir::new().unwrap();
	game.write("IPA.exe", b"patcher").unwrap();
	game.write("winhttp.dll", b"proxy").unwrap();
	let runner = RecordingRunner::default();
	let patcher = ProcessPatcher::new(GameLayout::default(), runner.clone());

	let result = patcher.patch(game.install_dir()).await;

	assert!(matches!(result, Err(PatchError::AlreadyPatched)));
	assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn process_patcher_refuses_without_the_patcher() {
	init();
	let game = GameDir::new().unwrap();
	let runner = RecordingRunner::default();
	let patcher = ProcessPatcher::new(GameLayout::default(), runner.clone());

	let result = patcher.patch(game.install_dir()).await;

	assert!(matches!(result, Err(PatchError::PatcherMissing(_))));
	assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn process_patcher_trusts_a_non_zero_exit() {
	init();
	let game = GameDir::new().unwrap();
	let exe = game.write("IPA.exe", b"patcher").unwrap();
	let runner = RecordingRunner::exiting_with(1);
	let patcher = ProcessPatcher::new(GameLayout::default(), runner.clone());

	let state = patcher.patch(game.install_dir()).await.unwrap();

	assert_eq!(state, PatchState::Patched);
	let invocations = runner.invocations();
	assert_eq!(invocations.len(), 1);
	assert_eq!(invocations[0].program, exe);
	assert_eq!(invocations[0].args, vec!["-n".to_string()]);
	assert_eq!(invocations[0].working_dir, game.install_dir());
}

#[tokio::test]
async fn process_patcher_fails_when_the_patcher_cannot_start() {
	init();
	let game = GameDir::new().unwrap();
	game.write("IPA.exe", b"patcher").unwrap();
	let patcher = ProcessPatcher::new(GameLayout::default(), RecordingRunner::failing_to_spawn());

	assert!(matches!(patcher.patch(game.install_dir()).await, Err(PatchError::Spawn(_))));
}

#[tokio::test]
async fn process_patcher_reverts_when_the_patcher_exists() {
	init();
	let game = GameDir::new().unwrap();
	let runner = RecordingRunner::default();
	let patcher = ProcessPatcher::new(GameLayout::default(), runner.clone());

	/* Nothing to run without the patcher */
	assert_eq!(patcher.unpatch(game.install_dir()).await.unwrap(), PatchState::Unpatched);
	assert!(runner.invocations().is_empty());

	game.write("IPA.exe", b"patcher").unwrap();
	assert_eq!(patcher.unpatch(game.install_dir()).await.unwrap(), PatchState::Unpatched);
	let invocations = runner.invocations();
	assert_eq!(invocations.len(), 1);
	assert_eq!(invocations[0].args, vec!["--revert".to_string(), "-n".to_string()]);
}

#[tokio::test]
async fn compat_patcher_adds_overrides_once() {
	init();
	let game = GameDir::new().unwrap().with_registry("WINE REGISTRY Version 2\n").unwrap();
	game.write("IPA.exe", b"patcher").unwrap();
	let runner = RecordingRunner::default();
	let patcher = CompatPatcher::new(GameLayout::default(), runner.clone());

	assert_eq!(patcher.patch(game.install_dir()).await.unwrap(), PatchState::Patched);
	assert_eq!(patcher.patch(game.install_dir()).await.unwrap(), PatchState::Patched);

	let registry = std::fs::read_to_string(game.registry_path()).unwrap();
	assert!(registry.starts_with("WINE REGISTRY Version 2\n"));
	for line in REGISTRY_OVERRIDE_LINES {
		assert_eq!(count(&registry, line), 1, "{line} should appear exactly once");
	}

	let invocations = runner.invocations();
	assert_eq!(invocations.len(), 2);
	assert_eq!(invocations[0].program, Path::new("mono"));
	assert_eq!(invocations[0].args[1..], ["-n", "-f", "--relativeToPwd", "Beat Saber.exe"]);
	assert_eq!(invocations[0].working_dir, game.install_dir());
}

#[tokio::test]
async fn compat_patcher_fails_without_a_registry() {
	init();
	let game = GameDir::new().unwrap();
	game.write("IPA.exe", b"patcher").unwrap();
	let patcher = CompatPatcher::new(GameLayout::default(), RecordingRunner::default());

	assert!(matches!(patcher.patch(game.install_dir()).await, Err(PatchError::RegistryMissing(_))));
}

#[tokio::test]
async fn compat_patcher_reverts_relative_to_the_game() {
	init();
	let game = GameDir::new().unwrap();
	game.write("IPA.exe", b"patcher").unwrap();
	let runner = RecordingRunner::default();
	let patcher = CompatPatcher::new(GameLayout::default(), runner.clone());

	assert_eq!(patcher.unpatch(game.install_dir()).await.unwrap(), PatchState::Unpatched);
	assert_eq!(runner.invocations()[0].args[1..], ["--revert", "-n", "--relativeToPwd", "Beat Saber.exe"]);
}

#[tokio::test]
async fn registry_fix_up_only_appends_missing_lines() {
	init();
	let game = GameDir::new().unwrap()
		.with_registry("[Software\\\\Wine\\\\DllOverrides]\r\n\"d3d11\"=\"native\"")
		.unwrap();

	assert!(ensure_registry_overrides(&game.registry_path()).await.unwrap());
	assert!(!ensure_registry_overrides(&game.registry_path()).await.unwrap());

	let registry = std::fs::read_to_string(game.registry_path()).unwrap();
	assert_eq!(registry, "[Software\\\\Wine\\\\DllOverrides]\r\n\"d3d11\"=\"native\"\n\"winhttp\"=\"native,builtin\"\n");
}
