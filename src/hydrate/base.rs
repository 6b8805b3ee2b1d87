//! Base hydration: hierarchy inversion and the override graph
//!
//! Works over the full class list of one provider. First a single directed
//! graph of (supertype → class), (interface → class), and
//! (enclosing → class) edges is built and visited in topological order to
//! fill every subclass and inner-class set. Then, in parallel, every
//! non-constructor method is linked to the methods it overrides.

use crate::access_flags::Visibility;
use crate::errors::Result;
use crate::model::{ClassNode, MethodNode};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Populate subclass/inner-class sets and override links for `classes`
///
/// Aborts on the first resolution error; relations already populated stay in
/// place and remain valid.
pub fn hydrate_base(classes: &[Arc<ClassNode>]) -> Result<()> {
    invert_hierarchy(classes)?;

    let results: Vec<Result<()>> = classes
        .par_iter()
        .map(|class| link_overrides(class))
        .collect();
    for result in results {
        result?;
    }
    Ok(())
}

fn invert_hierarchy(classes: &[Arc<ClassNode>]) -> Result<()> {
    // Vertices: every provided class plus any directly resolved parent
    // (which may come from a context root).
    let mut nodes: Vec<Arc<ClassNode>> = classes.to_vec();
    let mut index: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, class)| (class.name().to_string(), i))
        .collect();
    let mut enclosing_of: Vec<Option<usize>> = vec![None; nodes.len()];

    let mut edges: HashSet<(usize, usize)> = HashSet::new();
    for target in 0..classes.len() {
        let class = nodes[target].clone();
        let mut parents: Vec<(Arc<ClassNode>, bool)> = vec![];
        if let Some(superclass) = class.superclass()? {
            parents.push((superclass, false));
        }
        for interface in class.interfaces()? {
            parents.push((interface, false));
        }
        if let Some(enclosing) = class.enclosing_class()? {
            parents.push((enclosing, true));
        }
        for (parent, is_enclosing) in parents {
            let source = if let Some(&existing) = index.get(parent.name()) {
                existing
            } else {
                nodes.push(parent.clone());
                enclosing_of.push(None);
                index.insert(parent.name().to_string(), nodes.len() - 1);
                nodes.len() - 1
            };
            if is_enclosing {
                enclosing_of[target] = Some(source);
            }
            edges.insert((source, target));
        }
    }

    // Kahn's algorithm; the inheritance DAG of a valid corpus is acyclic.
    let mut outgoing: Vec<Vec<usize>> = vec![vec![]; nodes.len()];
    let mut indegree = vec![0usize; nodes.len()];
    for &(source, target) in &edges {
        outgoing[source].push(target);
        indegree[target] += 1;
    }
    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
    let mut visited = vec![false; nodes.len()];
    while let Some(source) = queue.pop_front() {
        visited[source] = true;
        for &target in &outgoing[source] {
            record_edge(&nodes, &enclosing_of, source, target);
            indegree[target] -= 1;
            if indegree[target] == 0 {
                queue.push_back(target);
            }
        }
    }
    if visited.iter().any(|&v| !v) {
        log::warn!("class hierarchy contains a cycle; processing remaining edges unordered");
        for &(source, target) in &edges {
            if !visited[source] {
                record_edge(&nodes, &enclosing_of, source, target);
            }
        }
    }
    Ok(())
}

fn record_edge(
    nodes: &[Arc<ClassNode>],
    enclosing_of: &[Option<usize>],
    source: usize,
    target: usize,
) {
    if enclosing_of[target] == Some(source) {
        nodes[source].add_inner_class(nodes[target].clone());
    } else {
        nodes[source].add_subclass(nodes[target].clone());
    }
}

/// Link every non-constructor method of `class` to the methods it overrides
///
/// Ancestors are walked nearest-first (direct superclass, then direct
/// interfaces, then their parents). The first visible match becomes the
/// super-method; every visible match gains the child link.
fn link_overrides(class: &Arc<ClassNode>) -> Result<()> {
    let ancestors = ancestor_closure(class)?;
    if ancestors.is_empty() {
        return Ok(());
    }
    for method in class.methods() {
        if method.is_constructor() || method.is_static() {
            continue;
        }
        for ancestor in &ancestors {
            for candidate in ancestor.methods() {
                if candidate.is_constructor() || candidate.is_static() {
                    continue;
                }
                if candidate.name() != method.name()
                    || candidate.descriptor_text() != method.descriptor_text()
                {
                    continue;
                }
                if !is_visible_to(candidate, class) {
                    continue;
                }
                method.set_super_method(candidate.clone());
                candidate.add_child_method(method.clone());
            }
        }
    }
    Ok(())
}

/// Proper ancestors of `class` through extends/implements, nearest first
fn ancestor_closure(class: &Arc<ClassNode>) -> Result<Vec<Arc<ClassNode>>> {
    let mut closure = vec![];
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(class.name().to_string());
    let mut queue: VecDeque<Arc<ClassNode>> = VecDeque::new();
    if let Some(superclass) = class.superclass()? {
        queue.push_back(superclass);
    }
    for interface in class.interfaces()? {
        queue.push_back(interface);
    }
    while let Some(ancestor) = queue.pop_front() {
        if !seen.insert(ancestor.name().to_string()) {
            continue;
        }
        if let Some(superclass) = ancestor.superclass()? {
            queue.push_back(superclass);
        }
        for interface in ancestor.interfaces()? {
            queue.push_back(interface);
        }
        closure.push(ancestor);
    }
    Ok(closure)
}

fn is_visible_to(candidate: &MethodNode, class: &ClassNode) -> bool {
    match candidate.visibility() {
        Visibility::Public | Visibility::Protected => true,
        Visibility::Package => candidate
            .parent()
            .map_or(false, |parent| parent.package() == class.package()),
        Visibility::Private => false,
    }
}
