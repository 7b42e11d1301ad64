//! Import resolution: local file imports, versioned package imports,
//! Minimal Version Selection, and cycle detection over the import graph.

use agentspec_core::{Hash, ImportKind, ResolutionError, ResolvedImport};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::lexer::Lexer;
use crate::parser::ast::File as AstFile;
use crate::parser::Parser;

/// Resolves a package import name + version constraint to an on-disk path.
/// Production code backs this with a registry client; tests use an in-memory
/// map.
pub trait RegistryResolver {
    fn resolve(&self, package: &str, version: &str) -> Result<PathBuf, ResolutionError>;
}

/// An import is a package import if its path has no `.` or `/` prefix
/// segment recognizable as relative; otherwise it is local.
fn classify(path: &str) -> ImportKind {
    if path.starts_with('.') || path.starts_with('/') {
        ImportKind::Local
    } else {
        ImportKind::Package
    }
}

/// Resolve a local import path against `search_paths`, trying the literal
/// path, then `<path>/index.ias`, then `<path>/main.ias`. `.az` is a legacy
/// extension: if found alongside a `.ias` file for the same module, that's a
/// conflict; if found alone, it's accepted with a migration warning error.
pub fn resolve_local(path: &str, search_paths: &[PathBuf]) -> Result<PathBuf, ResolutionError> {
    let candidates = |base: &Path| -> Vec<PathBuf> {
        vec![
            base.join(path),
            base.join(format!("{path}.ias")),
            base.join(path).join("index.ias"),
            base.join(path).join("main.ias"),
        ]
    };

    for base in search_paths {
        for candidate in candidates(base) {
            let ias_exists = candidate.exists() && candidate.extension().map(|e| e == "ias").unwrap_or(false);
            let az_sibling = candidate.with_extension("az");
            if ias_exists {
                if az_sibling.exists() {
                    return Err(ResolutionError::ExtensionConflict(path.to_string()));
                }
                return Ok(candidate);
            }
        }
        let az_candidate = base.join(format!("{path}.az"));
        if az_candidate.exists() {
            return Err(ResolutionError::LegacyExtension(path.to_string()));
        }
    }

    Err(ResolutionError::ImportNotFound(
        path.to_string(),
        search_paths
            .first()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
    ))
}

// ============================================================================
// SEMANTIC VERSIONING (minimal: major.minor.patch, optional "v" prefix,
// pre-release suffix stripped for comparison purposes)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVer {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('v').unwrap_or(s);
        let core = s.split(['-', '+']).next().unwrap_or(s);
        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().unwrap_or("0").parse().ok()?;
        let patch = parts.next().unwrap_or("0").parse().ok()?;
        Some(Self { major, minor, patch })
    }
}

/// One node of the dependency graph: a package name with the version that
/// node requires of each of its own dependencies.
#[derive(Debug, Clone)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub min_version: String,
}

/// Minimal Version Selection: for each package, pick the maximum of all
/// minimum versions requested across the graph. A conflict across major
/// versions is fatal (no compatible version can satisfy both).
pub fn select_versions(edges: &[DependencyEdge]) -> Result<HashMap<String, String>, ResolutionError> {
    let mut chosen: HashMap<String, (SemVer, String)> = HashMap::new();
    let mut chains: HashMap<String, Vec<String>> = HashMap::new();

    for edge in edges {
        let Some(requested) = SemVer::parse(&edge.min_version) else {
            continue;
        };
        chains
            .entry(edge.to.clone())
            .or_default()
            .push(format!("{} requires {}@{}", edge.from, edge.to, edge.min_version));

        match chosen.get(&edge.to) {
            Some((current, _)) if current.major != requested.major => {
                return Err(ResolutionError::VersionConflict {
                    package: edge.to.clone(),
                    chain: chains[&edge.to].join(", "),
                });
            }
            Some((current, _)) if *current >= requested => {}
            _ => {
                chosen.insert(edge.to.clone(), (requested, edge.min_version.clone()));
            }
        }
    }

    Ok(chosen.into_iter().map(|(pkg, (_, v))| (pkg, v)).collect())
}

// ============================================================================
// CYCLE DETECTION (Tarjan's SCC) AND TOPOLOGICAL SORT
// ============================================================================

struct Tarjan<'a> {
    graph: &'a HashMap<String, Vec<String>>,
    index_counter: usize,
    stack: Vec<String>,
    on_stack: HashSet<String>,
    indices: HashMap<String, usize>,
    lowlink: HashMap<String, usize>,
    sccs: Vec<Vec<String>>,
}

impl<'a> Tarjan<'a> {
    fn new(graph: &'a HashMap<String, Vec<String>>) -> Self {
        Self {
            graph,
            index_counter: 0,
            stack: Vec::new(),
            on_stack: HashSet::new(),
            indices: HashMap::new(),
            lowlink: HashMap::new(),
            sccs: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Vec<String>> {
        let nodes: Vec<String> = self.graph.keys().cloned().collect();
        for node in nodes {
            if !self.indices.contains_key(&node) {
                self.strong_connect(&node);
            }
        }
        self.sccs
    }

    fn strong_connect(&mut self, v: &str) {
        self.indices.insert(v.to_string(), self.index_counter);
        self.lowlink.insert(v.to_string(), self.index_counter);
        self.index_counter += 1;
        self.stack.push(v.to_string());
        self.on_stack.insert(v.to_string());

        if let Some(neighbors) = self.graph.get(v) {
            for w in neighbors.clone() {
                if !self.indices.contains_key(&w) {
                    self.strong_connect(&w);
                    let w_low = self.lowlink[&w];
                    let v_low = self.lowlink[v];
                    self.lowlink.insert(v.to_string(), v_low.min(w_low));
                } else if self.on_stack.contains(&w) {
                    let w_idx = self.indices[&w];
                    let v_low = self.lowlink[v];
                    self.lowlink.insert(v.to_string(), v_low.min(w_idx));
                }
            }
        }

        if self.lowlink[v] == self.indices[v] {
            let mut component = Vec::new();
            loop {
                let w = self.stack.pop().unwrap();
                self.on_stack.remove(&w);
                let done = w == v;
                component.push(w);
                if done {
                    break;
                }
            }
            self.sccs.push(component);
        }
    }
}

/// Detect import cycles in a dependency graph (`node -> its dependencies`).
/// Returns an error naming the cycle members if any SCC has more than one
/// node, or a single self-referential node.
pub fn check_cycles(graph: &HashMap<String, Vec<String>>) -> Result<(), ResolutionError> {
    for scc in Tarjan::new(graph).run() {
        if scc.len() > 1 {
            return Err(ResolutionError::CircularDependency(scc));
        }
        if let [only] = scc.as_slice() {
            if graph.get(only).is_some_and(|deps| deps.contains(only)) {
                return Err(ResolutionError::CircularDependency(vec![only.clone()]));
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm: returns dependencies before dependents. Assumes
/// `check_cycles` has already confirmed the graph is acyclic.
pub fn topological_sort(graph: &HashMap<String, Vec<String>>) -> Vec<String> {
    // An edge node -> dep means dep must come before node, so node's
    // in-degree counts how many unresolved dependencies it has.
    let mut in_degree: HashMap<String, usize> = graph.keys().map(|k| (k.clone(), 0)).collect();
    for (node, deps) in graph {
        in_degree.insert(node.clone(), deps.len());
    }

    let mut queue: Vec<String> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(n, _)| n.clone())
        .collect();
    queue.sort();

    let mut order = Vec::new();
    let mut queue_idx = 0;
    while queue_idx < queue.len() {
        let node = queue[queue_idx].clone();
        queue_idx += 1;
        order.push(node.clone());
        let mut newly_ready = Vec::new();
        for (candidate, deps) in graph {
            if deps.contains(&node) {
                if let Some(deg) = in_degree.get_mut(candidate) {
                    *deg -= 1;
                    if *deg == 0 && !order.contains(candidate) && !queue[..queue_idx].contains(candidate) {
                        newly_ready.push(candidate.clone());
                    }
                }
            }
        }
        newly_ready.sort();
        queue.extend(newly_ready);
    }
    order
}

/// Build a `ResolvedImport` record for a successfully located local file.
pub fn resolved_local_import(path: &str, on_disk: &Path, contents: &[u8]) -> ResolvedImport {
    ResolvedImport {
        source: path.to_string(),
        kind: ImportKind::Local,
        alias: None,
        version: None,
        path: on_disk.display().to_string(),
        content_hash: Hash::of(contents),
    }
}

pub fn resolved_package_import(source: &str, version: &str, on_disk: &Path, contents: &[u8]) -> ResolvedImport {
    ResolvedImport {
        source: source.to_string(),
        kind: ImportKind::Package,
        alias: None,
        version: Some(version.to_string()),
        path: on_disk.display().to_string(),
        content_hash: Hash::of(contents),
    }
}

// ============================================================================
// RESOLVER: walks a file's import graph end to end
// ============================================================================

/// A package import's `path` carries its version pinned after an `@`
/// (`acme/toolkit@1.2.0`); a bare name has no listed constraint.
fn split_package_version(path: &str) -> (&str, &str) {
    match path.rsplit_once('@') {
        Some((name, version)) => (name, version),
        None => (path, ""),
    }
}

/// Resolve a package import, preferring a configured registry resolver over
/// the raw `<path>@<version>/{main,index}.ias` search-path convention.
pub fn resolve_package(
    path: &str,
    search_paths: &[PathBuf],
    registry: Option<&dyn RegistryResolver>,
) -> Result<PathBuf, ResolutionError> {
    let (name, version) = split_package_version(path);

    if let Some(registry) = registry {
        if let Ok(resolved) = registry.resolve(name, version) {
            return Ok(resolved);
        }
    }

    for base in search_paths {
        let dir = base.join(format!("{name}@{version}"));
        for candidate in [dir.join("main.ias"), dir.join("index.ias")] {
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    Err(ResolutionError::ImportNotFound(
        path.to_string(),
        search_paths.first().map(|p| p.display().to_string()).unwrap_or_default(),
    ))
}

/// Every transitively-imported file reachable from an entry point, in
/// dependency-first load order (every import before the file that imports
/// it), plus the resolved-import records the lockfile is built from.
#[derive(Debug)]
pub struct ImportGraph {
    pub files: Vec<AstFile>,
    pub resolved: Vec<ResolvedImport>,
}

/// Walk `entry`'s import graph end to end: classify each import, resolve it
/// to an on-disk path, parse it, and recurse into its own imports. A
/// `visited` set keyed by the canonical absolute path stops a mutually
/// importing pair of files from recursing forever — the cycle itself is
/// still reported, via `check_cycles` over the accumulated dependency graph
/// once the walk completes.
pub fn resolve_imports(
    entry_path: &Path,
    entry: AstFile,
    search_paths: &[PathBuf],
    registry: Option<&dyn RegistryResolver>,
) -> Result<ImportGraph, ResolutionError> {
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut graph: HashMap<String, Vec<String>> = HashMap::new();
    let mut files: HashMap<String, AstFile> = HashMap::new();
    let mut resolved = Vec::new();
    let mut edges: Vec<DependencyEdge> = Vec::new();

    walk_imports(
        entry_path,
        entry,
        search_paths,
        registry,
        &mut visited,
        &mut graph,
        &mut files,
        &mut resolved,
        &mut edges,
    )?;

    check_cycles(&graph)?;
    select_versions(&edges)?;

    let order = topological_sort(&graph);
    let files = order.into_iter().filter_map(|key| files.remove(&key)).collect();

    Ok(ImportGraph { files, resolved })
}

#[allow(clippy::too_many_arguments)]
fn walk_imports(
    path: &Path,
    file: AstFile,
    search_paths: &[PathBuf],
    registry: Option<&dyn RegistryResolver>,
    visited: &mut HashSet<PathBuf>,
    graph: &mut HashMap<String, Vec<String>>,
    files: &mut HashMap<String, AstFile>,
    resolved: &mut Vec<ResolvedImport>,
    edges: &mut Vec<DependencyEdge>,
) -> Result<(), ResolutionError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical.clone()) {
        return Ok(());
    }
    let key = canonical.display().to_string();
    graph.entry(key.clone()).or_default();

    let package_name = file.package.name.clone();
    let import_stmts = file.imports.clone();
    files.insert(key.clone(), file);

    for import in &import_stmts {
        let (on_disk, version) = match classify(&import.path) {
            ImportKind::Local => (resolve_local(&import.path, search_paths)?, None),
            ImportKind::Package => {
                let resolved_path = resolve_package(&import.path, search_paths, registry)?;
                let (_, version) = split_package_version(&import.path);
                (resolved_path, Some(version.to_string()))
            }
        };

        let contents = std::fs::read_to_string(&on_disk)
            .map_err(|e| ResolutionError::ImportNotFound(import.path.clone(), e.to_string()))?;

        let record = match &version {
            Some(v) => resolved_package_import(&import.path, v, &on_disk, contents.as_bytes()),
            None => resolved_local_import(&import.path, &on_disk, contents.as_bytes()),
        };
        resolved.push(record);

        if let Some(v) = &version {
            edges.push(DependencyEdge {
                from: package_name.clone(),
                to: import.path.clone(),
                min_version: v.clone(),
            });
        }

        let dep_canonical = on_disk.canonicalize().unwrap_or_else(|_| on_disk.clone());
        let dep_key = dep_canonical.display().to_string();
        graph.entry(key.clone()).or_default().push(dep_key);

        if !visited.contains(&dep_canonical) {
            let tokens = Lexer::new(&contents).tokenize();
            let (imported_file, errors) = Parser::new(tokens, on_disk.display().to_string()).parse();
            if let Some(first) = errors.into_iter().next() {
                return Err(ResolutionError::ImportNotFound(import.path.clone(), first.to_string()));
            }
            walk_imports(
                &on_disk,
                imported_file,
                search_paths,
                registry,
                visited,
                graph,
                files,
                resolved,
                edges,
            )?;
        }
    }

    Ok(())
}
