use std::io::Write;
use std::sync::Arc;

use bsmm_rs::installed::InstallReason;
use bsmm_rs::progress::ProgressInfo;
use bsmm_rs::{Catalog, InstalledSet, Mod, ModInstaller, ModManager};
use tokio_util::sync::CancellationToken;

const USAGE: &str = "Usage: bsmm-rs-terminal [options] <list|install|uninstall|uninstall-loader|uninstall-all|remove-all> [mods...]";

#[tokio::main]
async fn main() {
	let mut opts;

	/* Parse console input */ 
	let parsed_options = {
		let args: Vec<String> = std::env::args().collect();

		opts = getopts::Options::new();
		opts.optflag( "h", "help",       "Show help");
		opts.optflag( "v", "verbose",    "Increased verbosity");
		opts.optflag( "y", "yes",        "Don't ask before changing the install");
		opts.optopt(  "c", "catalog",    "Catalog snapshot to read", "FILE");
		opts.optopt(  "d", "install-dir", "Game install directory, overrides the config", "DIR");
		opts.optopt(  "p", "platform",   "Download platform, overrides the config", "PLATFORM");
		opts.parsing_style(getopts::ParsingStyle::FloatingFrees);

		let parsed_options = match opts.parse(&args[1..]) {
			Ok(m)  => { m }
			Err(e) => { println!("Unable to parse options: {}", e); return }
		};

		if parsed_options.opt_present("h") {
			eprintln!("{}", opts.usage(USAGE));
			return;
		}

		parsed_options
	};

	env_logger::Builder::from_env(
		env_logger::Env::default().default_filter_or(if parsed_options.opt_present("v") { "debug" } else { "info" })
	).init();

	let mut config = bsmm_rs::Config::load_from_disk().unwrap_or_else(|e| {
		log::warn!("Failed to read config file: {}", e);
		log::warn!("Using default config.");
		bsmm_rs::Config::default()
	});

	if let Some(dir) = parsed_options.opt_str("d") {
		if !config.set_install_dir(dir.clone().into()) {
			log::error!("{} is not a directory.", dir);
			return;
		}
	}
	if let Some(platform) = parsed_options.opt_str("p") {
		config.set_platform(platform);
	}

	let Some(command) = parsed_options.free.first() else {
		eprintln!("{}", opts.usage(USAGE));
		return;
	};
	let names = &parsed_options.free[1..];
	let catalog_path = parsed_options.opt_str("c").unwrap_or_else(|| "catalog.json".to_string());

	if let Err(e) = run(config, &catalog_path, command, names, parsed_options.opt_present("y")).await {
		log::error!("{}", e);
		std::process::exit(1);
	}
}

async fn run(config: bsmm_rs::Config, catalog_path: &str, command: &str, names: &[String], assume_yes: bool) -> Result<(), Error> {
	let catalog = Catalog::from_json(std::io::BufReader::new(std::fs::File::open(catalog_path)?))?;
	log::debug!("Read {} mods from {}", catalog.len(), catalog_path);

	let install_dir = config.install_dir().ok_or(Error::MissingArgument("install directory"))?.to_path_buf();
	let installed = InstalledSet::detect(&catalog, &install_dir, config.platform(), config.layout(), config.loader_name())?;

	if command == "list" {
		for m in &catalog {
			let marker = match installed.get(&m.name) {
				Some(i) if i.version() == m.version => "[x]",
				Some(_) => "[~]",
				None => "[ ]",
			};
			println!("{} {} {}", marker, m.name, m.version);
		}
		return Ok(());
	}

	let (progress, mut progress_rx) = tokio::sync::mpsc::unbounded_channel::<ProgressInfo>();
	let printer = tokio::spawn(async move {
		while let Some(info) = progress_rx.recv().await {
			println!("{:?} {}", info.status, info.name);
		}
	});

	let cancel = CancellationToken::new();
	tokio::spawn({
		let cancel = cancel.clone();
		async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				log::warn!("Cancelling, waiting for running operations to finish.");
				cancel.cancel();
			}
		}
	});

	let acquirer = Arc::new(bsmm_rs::acquire::HttpAcquirer::new(&config)?);
	let patcher = bsmm_rs::patcher::for_current_platform(config.layout());
	let installer = ModInstaller::new(&config, acquirer, patcher)
		.with_installed(installed.clone())
		.with_progress(Arc::new(progress));
	let manager = ModManager::new(config, catalog, installer);

	let result = match command {
		"install" | "uninstall" => {
			let selection = selection(&manager, &installed, command == "install", names)?;
			if !assume_yes && !confirm(&manager, &installed, &selection)? {
				return Err(Error::UserCancelled);
			}
			let result = manager.refresh(&selection, cancel).await?;
			println!("Installed {} mods, uninstalled {} mods.", result.installed.len(), result.uninstalled.len());
			Ok(())
		},
		"uninstall-loader" => {
			match manager.uninstall_mod_loader(cancel).await? {
				Some(loader) => println!("Uninstalled {}", loader),
				None => println!("No loader installed."),
			}
			Ok(())
		},
		"uninstall-all" => {
			let removed = manager.uninstall_all_mods(cancel).await?;
			println!("Uninstalled {} mods.", removed.len());
			Ok(())
		},
		"remove-all" => {
			let install_dir = manager.config().install_dir().ok_or(Error::MissingArgument("install directory"))?;
			manager.installer().remove_all_mods(install_dir).await?;
			manager.installer().clear_installed().await;
			println!("Removed all mods.");
			Ok(())
		},
		other => Err(Error::UnknownCommand(other.to_string())),
	};

	drop(manager);
	let _ = printer.await;
	result
}

/// The explicitly installed mods with `names` added or removed.
fn selection(manager: &ModManager, installed: &InstalledSet, add: bool, names: &[String]) -> Result<Vec<Mod>, Error> {
	if names.is_empty() {
		return Err(Error::MissingArgument("mod names"));
	}

	let mut selection: Vec<Mod> = installed
		.iter()
		.filter(|m| installed.reason(m.name()) == Some(InstallReason::Explicit))
		.cloned()
		.collect();

	for name in names {
		let descriptor = manager.catalog().get(name).ok_or_else(|| bsmm_rs::Error::NotFound(name.clone()))?;
		if add {
			selection.push(Mod::Catalog(descriptor.clone()));
		} else {
			selection.retain(|m| m.name() != name);
		}
	}

	Ok(selection)
}

fn confirm(manager: &ModManager, installed: &InstalledSet, selection: &[Mod]) -> Result<bool, Error> {
	let resolution = bsmm_rs::relationship_resolver::resolve_install_set(selection, manager.catalog(), installed);
	println!("Selected mods:");
	for m in &resolution.install {
		let note = if resolution.dependencies.contains(m.name()) { " (dependency)" } else { "" };
		println!("\t{}{}", m, note);
	}
	for m in &resolution.uninstall {
		println!("\t{} conflicts with the selection and will be removed", m);
	}

	let stdin = std::io::stdin();
	print!("Commit changes? [(y)/n] ");
	let _ = std::io::stdout().flush();
	loop {
		let mut input = String::new();
		stdin.read_line(&mut input)?;
		let input = input.trim().to_lowercase();
		if input == "y" || input.is_empty() {
			return Ok(true);
		} else if input == "n" {
			return Ok(false);
		} else {
			println!("\nInput invalid.")
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("bsmm-rs error: {0}")]
	Bsmm(#[from] bsmm_rs::Error),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("Missing argument: {0}")]
	MissingArgument(&'static str),
	#[error("Unknown command {0}")]
	UnknownCommand(String),
	#[error("User cancelled an action")]
	UserCancelled,
}
