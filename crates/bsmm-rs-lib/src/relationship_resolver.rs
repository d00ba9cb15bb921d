//! Expands a selection of mods into the mods that must be installed or removed.
//!
//! Resolution never fails. Dependencies missing from the catalog are dropped
//! and dependency cycles simply converge.

use std::collections::HashSet;

use crate::catalog::{Catalog, Mod};
use crate::installed::{InstallReason, InstalledSet};

mod dependency_graph;
pub use dependency_graph::DependencyGraph;
pub use dependency_graph::EdgeData;

/// Outcome of [`resolve_install_set`].
#[derive(Debug, Default, Clone)]
pub struct Resolution {
	/// Requested mods first, in request order, followed by their dependencies in catalog order.
	pub install: Vec<Mod>,
	/// Installed mods conflicting with the install set.
	pub uninstall: Vec<Mod>,
	/// Names in `install` that were pulled in as dependencies rather than requested.
	pub dependencies: HashSet<String>,
}

/// Expands `requested` with the transitive closure of its dependencies found in `catalog`.
///
/// Conflicts declared by mods that stay in the result exclude the named mods from the install
/// set unless they were explicitly requested. A dependency that was excluded itself excludes nothing. Conflicting mods that are installed are returned
/// in [`Resolution::uninstall`].
pub fn resolve_install_set(requested: &[Mod], catalog: &Catalog, installed: &InstalledSet) -> Resolution {
	let graph = DependencyGraph::from_catalog(catalog);

	let mut install = Vec::<Mod>::with_capacity(requested.len());
	let mut requested_names = HashSet::<&str>::new();
	let mut start = Vec::new();

	for m in requested {
		if !requested_names.insert(m.name()) { continue; }
		install.push(m.clone());
		match graph.node(m.name()) {
			Some(i) => start.push(i),
			/* Not a catalog mod, start from whatever it depends on */
			None => start.extend(m.dependencies().iter().filter_map(|d| graph.node(d))),
		}
	}

	let mut closure: Vec<_> = graph.dependency_closure(start).into_iter().collect();
	closure.sort();

	let mut dependencies = HashSet::<String>::new();
	for i in &closure {
		let descriptor = graph.descriptor(*i);
		if requested_names.contains(descriptor.name.as_str()) { continue; }
		dependencies.insert(descriptor.name.clone());
		install.push(Mod::Catalog(descriptor.clone()));
	}

	/* Conflicts. Requested mods always stay, dependencies are admitted in order and only
	 * mods that stay get to exclude others. */
	let conflicts_of = |m: &Mod| -> Vec<String> {
		match graph.node(m.name()) {
			Some(i) => graph.conflicts_of(i).map(|c| graph.descriptor(c).name.clone()).collect(),
			None => m.conflicts().to_vec(),
		}
	};

	let mut excluded = HashSet::<String>::new();
	for m in install.iter().filter(|m| requested_names.contains(m.name())) {
		excluded.extend(conflicts_of(m));
	}

	install.retain(|m| {
		if requested_names.contains(m.name()) { return true; }
		if excluded.contains(m.name()) {
			log::warn!("Dependency {} conflicts with the install set, excluding it.", m.name());
			return false;
		}
		excluded.extend(conflicts_of(m));
		true
	});
	dependencies.retain(|d| install.iter().any(|m| m.name() == d));

	let uninstall = installed
		.iter()
		.filter(|m| excluded.contains(m.name()) && !install.iter().any(|i| i.name() == m.name()))
		.cloned()
		.collect();

	Resolution { install, uninstall, dependencies }
}

/// Expands `deselected` with the dependencies nothing else needs anymore.
///
/// A mod is orphaned when it was installed as a dependency, was required (transitively) by a
/// removed mod and is not required by any remaining mod. The loader is never removed implicitly.
/// Mods still needed by remaining installed mods are not protected, the deselection always wins.
pub fn resolve_uninstall_set(deselected: &[Mod], catalog: &Catalog, installed: &InstalledSet) -> Vec<Mod> {
	let graph = DependencyGraph::from_catalog(catalog);

	let mut result = Vec::<Mod>::with_capacity(deselected.len());
	let mut removed = HashSet::<&str>::new();
	for m in deselected {
		if removed.insert(m.name()) {
			result.push(m.clone());
		}
	}

	/* Potential orphans, installed only to satisfy a removed mod */
	let reachable = graph.dependency_closure(dependency_nodes(&graph, deselected.iter()));
	let candidates: HashSet<&str> = reachable
		.iter()
		.map(|&i| graph.descriptor(i).name.as_str())
		.filter(|name| !removed.contains(name))
		.filter(|name| !installed.is_loader_name(name))
		.filter(|name| installed.reason(name) == Some(InstallReason::AsDependency))
		.collect();

	/* Everything still required by what stays */
	let roots = installed.iter().filter(|m| !removed.contains(m.name()) && !candidates.contains(m.name()));
	let required: HashSet<&str> = graph
		.dependency_closure(dependency_nodes(&graph, roots))
		.into_iter()
		.map(|i| graph.descriptor(i).name.as_str())
		.collect();

	let mut orphans: Vec<_> = candidates.difference(&required).copied().collect();
	orphans.sort_by_key(|name| catalog.position(name));
	for name in orphans {
		if let Some(m) = installed.get(name) {
			log::debug!("{} is no longer required, removing it.", name);
			result.push(m.clone());
		}
	}

	result
}

fn dependency_nodes<'a>(graph: &DependencyGraph, mods: impl Iterator<Item = &'a Mod>) -> Vec<petgraph::graph::NodeIndex> {
	mods.flat_map(|m| m.dependencies().iter().filter_map(|d| graph.node(d))).collect()
}
