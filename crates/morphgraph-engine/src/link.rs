// Post-load linking.
//
// The builder leaves forward references unresolved. `link` resolves them and
// precomputes the per-node facts the search relies on, in dependency order:
// copies, jumps, constraint pointers, constraint types, allomorph rules,
// portmanteau chains, then model membership and path-to-end flags.

use std::sync::Arc;

use hashbrown::HashSet;
use morphgraph_core::{MorphemeLabel, MorphemeSequence};

use crate::GrammarError;
use crate::allomorph::Allomorph;
use crate::constraint::{ConstraintKind, ConstraintType};
use crate::grammar::Grammar;
use crate::index::{ConstraintIndex, NodeIndex};
use crate::node::{Node, NodeKind};
use crate::rules;

pub(crate) fn link(g: &mut Grammar) -> Result<(), GrammarError> {
    clone_copies(g)?;
    resolve_jumps(g)?;
    resolve_pointers(g)?;
    validate_constraint_types(g)?;
    apply_allomorph_rules(g);
    init_portmanteaux(g)?;
    finish_models(g)?;
    Ok(())
}

/// Every node owned by `root`, root included.
fn subtree(g: &Grammar, root: NodeIndex) -> Vec<NodeIndex> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        out.push(n);
        stack.extend(g.node(n).kind().children().into_iter().rev());
    }
    out
}

fn clone_copies(g: &mut Grammar) -> Result<(), GrammarError> {
    let copies: Vec<NodeIndex> = g
        .nodes()
        .filter(|(_, n)| matches!(n.kind(), NodeKind::Copy { .. }))
        .map(|(i, _)| i)
        .collect();
    let mut in_progress = Vec::new();
    for copy in copies {
        resolve_copy(g, copy, &mut in_progress)?;
    }
    Ok(())
}

fn resolve_copy(
    g: &mut Grammar,
    copy: NodeIndex,
    in_progress: &mut Vec<NodeIndex>,
) -> Result<(), GrammarError> {
    let (source_id, suffix) = match g.node(copy).kind() {
        NodeKind::Copy {
            source_id,
            suffix,
            clone: None,
        } => (source_id.clone(), suffix.clone()),
        _ => return Ok(()),
    };
    let copy_id = g.node(copy).id().clone();
    if in_progress.contains(&copy) {
        return Err(GrammarError::CopyCycle(copy_id));
    }
    let source = g
        .node_by_id(source_id.as_str())
        .ok_or_else(|| GrammarError::UnresolvedCopy {
            copy: copy_id.clone(),
            source_id,
        })?;

    in_progress.push(copy);
    for inner in subtree(g, source) {
        if matches!(g.node(inner).kind(), NodeKind::Copy { .. }) {
            resolve_copy(g, inner, in_progress)?;
        }
    }
    let clone = deep_clone(g, source, &suffix)?;
    if let NodeKind::Copy { clone: slot, .. } = g.node_mut(copy).kind_mut() {
        *slot = Some(clone);
    }
    let next = g.node(copy).next();
    g.set_next(clone, next);
    in_progress.pop();
    tracing::debug!(copy = %copy_id, clone = %g.node(clone).id(), "copy cloned");
    Ok(())
}

fn clone_all(g: &mut Grammar, nodes: &[NodeIndex], suffix: &str) -> Result<Vec<NodeIndex>, GrammarError> {
    nodes.iter().map(|&n| deep_clone(g, n, suffix)).collect()
}

/// Clone `src` and everything it owns. Allomorphs are copied so portmanteau
/// chains of the clone resolve independently of the original.
fn deep_clone(g: &mut Grammar, src: NodeIndex, suffix: &str) -> Result<NodeIndex, GrammarError> {
    let original = g.node(src).clone();
    let kind = match original.kind().clone() {
        NodeKind::Morpheme { allomorphs, rules } => NodeKind::Morpheme {
            allomorphs: allomorphs
                .iter()
                .map(|a| Arc::new(Allomorph::clone(a)))
                .collect(),
            rules,
        },
        NodeKind::Fork { paths } => NodeKind::Fork {
            paths: clone_all(g, &paths, suffix)?,
        },
        NodeKind::Path { children, sequence } => NodeKind::Path {
            children: clone_all(g, &children, suffix)?,
            sequence,
        },
        // An embedded model behaves as a plain path.
        NodeKind::Model { children, .. } => NodeKind::Path {
            children: clone_all(g, &children, suffix)?,
            sequence: false,
        },
        NodeKind::MutuallyExclusive { morphemes } => NodeKind::MutuallyExclusive {
            morphemes: clone_all(g, &morphemes, suffix)?,
        },
        NodeKind::Jump {
            target_id,
            target_required,
            ..
        } => NodeKind::Jump {
            target_id,
            target: None,
            target_required,
        },
        NodeKind::Copy {
            source_id,
            suffix: inner_suffix,
            clone,
        } => NodeKind::Copy {
            source_id,
            suffix: inner_suffix,
            clone: clone.map(|c| deep_clone(g, c, suffix)).transpose()?,
        },
        kind @ NodeKind::StemList { .. } => kind,
    };

    let chained = matches!(kind, NodeKind::Path { .. });
    let children = kind.children();
    let mut node = Node::new(original.id().with_suffix(suffix), original.label().clone(), kind);
    node.set_optional(original.is_optional());
    for gloss in original.glosses().values() {
        node.set_gloss(gloss.clone());
    }
    let index = g.push_node(node);
    g.register(index)?;
    if chained {
        g.chain(&children, None);
    } else {
        for child in children {
            g.set_next(child, None);
        }
    }
    Ok(index)
}

fn resolve_jumps(g: &mut Grammar) -> Result<(), GrammarError> {
    for i in 0..g.node_count() {
        let index = NodeIndex::from_usize(i);
        let target_id = match g.node(index).kind() {
            NodeKind::Jump {
                target_id,
                target: None,
                ..
            } => target_id.clone(),
            _ => continue,
        };
        let Some(target) = g.node_by_id(target_id.as_str()) else {
            return Err(GrammarError::UnresolvedJump {
                jump: g.node(index).id().clone(),
                target: target_id,
            });
        };
        if let NodeKind::Jump { target: slot, .. } = g.node_mut(index).kind_mut() {
            *slot = Some(target);
        }
    }
    Ok(())
}

fn resolve_pointers(g: &mut Grammar) -> Result<(), GrammarError> {
    for i in 0..g.constraints.len() {
        let name = match g.constraints[i].kind() {
            ConstraintKind::Pointer {
                target_name,
                target: None,
            } => target_name.clone(),
            _ => continue,
        };
        let resolved = g
            .constraint_by_name(&name)
            .ok_or(GrammarError::UnresolvedPointer(name))?;
        if let ConstraintKind::Pointer { target, .. } = g.constraints[i].kind_mut() {
            *target = Some(resolved);
        }
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Mark {
    Visiting,
    Done(Option<ConstraintType>),
}

fn validate_constraint_types(g: &mut Grammar) -> Result<(), GrammarError> {
    let mut marks = vec![None; g.constraints.len()];
    for i in 0..g.constraints.len() {
        let index = ConstraintIndex::from_usize(i);
        if let Some(ty) = nested_type(g, index, &mut marks)? {
            g.constraints[i].set_resolved_type(ty);
        }
    }
    Ok(())
}

fn constraint_name(g: &Grammar, index: ConstraintIndex) -> String {
    g.constraint(index)
        .name()
        .map_or_else(|| format!("#{}", index.index()), str::to_string)
}

/// The type shared by every child of a nested or pointer constraint.
fn nested_type(
    g: &Grammar,
    index: ConstraintIndex,
    marks: &mut [Option<Mark>],
) -> Result<Option<ConstraintType>, GrammarError> {
    match marks[index.index()] {
        Some(Mark::Done(ty)) => return Ok(ty),
        Some(Mark::Visiting) => return Err(GrammarError::PointerCycle(constraint_name(g, index))),
        None => {}
    }
    let constraint = g.constraint(index);
    if let Some(ty) = constraint.kind().leaf_type() {
        marks[index.index()] = Some(Mark::Done(Some(ty)));
        return Ok(Some(ty));
    }
    marks[index.index()] = Some(Mark::Visiting);
    let mut resolved: Option<ConstraintType> = None;
    for child in constraint.kind().children() {
        let Some(ty) = nested_type(g, child, marks)? else {
            continue;
        };
        match resolved {
            None => resolved = Some(ty),
            Some(first) if first != ty => {
                return Err(GrammarError::InconsistentNestedConstraint {
                    name: constraint_name(g, index),
                    first,
                    second: ty,
                });
            }
            Some(_) => {}
        }
    }
    marks[index.index()] = Some(Mark::Done(resolved));
    Ok(resolved)
}

fn apply_allomorph_rules(g: &mut Grammar) {
    let mut updates = Vec::new();
    for (index, node) in g.nodes() {
        let NodeKind::Morpheme { allomorphs, rules } = node.kind() else {
            continue;
        };
        if rules.is_empty() {
            continue;
        }
        let mut derived: Vec<Allomorph> = Vec::new();
        for a in allomorphs {
            for out in rules::apply_rule_sets(g, rules, a) {
                if derived.contains(&out) {
                    tracing::warn!(node = %node.id(), allomorph = %out.summary(), "duplicate derived allomorph dropped");
                } else {
                    derived.push(out);
                }
            }
        }
        updates.push((index, derived));
    }
    for (index, derived) in updates {
        if let NodeKind::Morpheme { allomorphs, .. } = g.node_mut(index).kind_mut() {
            *allomorphs = derived.into_iter().map(Arc::new).collect();
        }
    }

    let mut lists = std::mem::take(&mut g.stem_lists);
    for list in &mut lists {
        let rule_sets = list.rules().to_vec();
        if rule_sets.is_empty() {
            continue;
        }
        let grammar: &Grammar = g;
        list.update_stems(&mut |stem| stem.generate_allomorphs(grammar, &rule_sets));
        tracing::debug!(list = list.name(), stems = list.len(), "stem allomorph rules applied");
    }
    g.stem_lists = lists;
}

fn init_portmanteaux(g: &mut Grammar) -> Result<(), GrammarError> {
    for i in 0..g.node_count() {
        let owner = NodeIndex::from_usize(i);
        let mut resolved = Vec::new();
        for (ai, a) in g.node(owner).allomorphs().iter().enumerate() {
            if let Some(pm) = a.portmanteau() {
                resolved.push((ai, resolve_portmanteau(g, owner, pm.sequence())?));
            }
        }
        if resolved.is_empty() {
            continue;
        }
        if let NodeKind::Morpheme { allomorphs, .. } = g.node_mut(owner).kind_mut() {
            for (ai, nodes) in resolved {
                if let Some(pm) = Arc::make_mut(&mut allomorphs[ai]).portmanteau_mut() {
                    pm.set_nodes(nodes);
                }
            }
        }
    }
    Ok(())
}

fn resolve_portmanteau(
    g: &Grammar,
    owner: NodeIndex,
    sequence: &MorphemeSequence,
) -> Result<Vec<NodeIndex>, GrammarError> {
    let node = g.node(owner);
    let labels = sequence.labels();
    let error = |reason: String| GrammarError::Portmanteau {
        node: node.id().clone(),
        reason,
    };
    if labels.len() < 2 {
        return Err(error(format!("{sequence} spans fewer than two morphemes")));
    }
    if &labels[0] != node.label() {
        return Err(error(format!(
            "{sequence} does not start with the owning node's label {}",
            node.label()
        )));
    }
    let mut nodes = vec![owner];
    let mut current = owner;
    for label in &labels[1..] {
        let mut visited = HashSet::new();
        let found = following_node_having_label(g, g.node(current).next(), label, &mut visited)
            .ok_or_else(|| GrammarError::UnresolvedPortmanteau {
                node: node.id().clone(),
                label: label.clone(),
            })?;
        if !g.node(found).is_morpheme() {
            return Err(error(format!(
                "{label} resolves to {} node {}, not a morpheme node",
                g.node(found).kind().name(),
                g.node(found).id()
            )));
        }
        nodes.push(found);
        current = found;
    }
    Ok(nodes)
}

/// The first node labelled `label` reachable from `start` without crossing
/// a required node with another label.
pub(crate) fn following_node_having_label(
    g: &Grammar,
    start: Option<NodeIndex>,
    label: &MorphemeLabel,
    visited: &mut HashSet<NodeIndex>,
) -> Option<NodeIndex> {
    let mut current = start;
    while let Some(index) = current {
        if !visited.insert(index) {
            return None;
        }
        let node = g.node(index);
        match node.kind() {
            NodeKind::Morpheme { .. } | NodeKind::StemList { .. } => {
                if node.label() == label {
                    return Some(index);
                }
                if !node.is_optional() {
                    return None;
                }
                current = node.next();
            }
            NodeKind::Fork { paths } => {
                return paths
                    .iter()
                    .find_map(|&p| following_node_having_label(g, Some(p), label, visited));
            }
            NodeKind::Path { children, .. } | NodeKind::Model { children, .. } => {
                let Some(&first) = children.first() else {
                    current = node.next();
                    continue;
                };
                if !node.is_optional() {
                    current = Some(first);
                    continue;
                }
                let mut inner = visited.clone();
                if let Some(found) = following_node_having_label(g, Some(first), label, &mut inner) {
                    return Some(found);
                }
                current = node.next();
            }
            NodeKind::MutuallyExclusive { morphemes } => {
                if let Some(&m) = morphemes.iter().find(|&&m| g.node(m).label() == label) {
                    return Some(m);
                }
                let skippable =
                    node.is_optional() || morphemes.iter().any(|&m| g.node(m).is_optional());
                if !skippable {
                    return None;
                }
                current = node.next();
            }
            NodeKind::Jump { target, .. } => {
                let mut inner = visited.clone();
                if let Some(found) = following_node_having_label(g, *target, label, &mut inner) {
                    return Some(found);
                }
                current = node.next();
            }
            NodeKind::Copy { clone, .. } => current = clone.or(node.next()),
        }
    }
    None
}

fn finish_models(g: &mut Grammar) -> Result<(), GrammarError> {
    for model in g.models.clone() {
        if g.node(model).kind().children().is_empty() {
            return Err(GrammarError::EmptyModel(g.node(model).id().clone()));
        }
        let members = subtree(g, model);
        for &m in &members {
            g.node_mut(m).set_model(model);
        }
        tracing::debug!(model = %g.node(model).id(), nodes = members.len(), "model linked");
    }
    mark_zero_length_forms(g);

    let flags: Vec<bool> = (0..g.node_count())
        .map(|i| {
            let node = g.node(NodeIndex::from_usize(i));
            node.is_model() || completion_from(g, node.next())
        })
        .collect();
    for (i, flag) in flags.into_iter().enumerate() {
        g.node_mut(NodeIndex::from_usize(i)).set_has_path_to_end(flag);
    }
    Ok(())
}

/// Recompute, per model, whether any allomorph it can produce is empty.
pub(crate) fn mark_zero_length_forms(g: &mut Grammar) {
    for model in g.models.clone() {
        let zero = subtree(g, model).into_iter().any(|m| match g.node(m).kind() {
            NodeKind::Morpheme { allomorphs, .. } => {
                allomorphs.iter().any(|a| a.has_zero_length_form())
            }
            NodeKind::StemList { list } => g.stem_list(*list).stems().any(|s| {
                s.allomorphs().iter().any(|a| a.has_zero_length_form())
            }),
            _ => false,
        });
        if let NodeKind::Model {
            has_zero_length_forms,
            ..
        } = g.node_mut(model).kind_mut()
        {
            *has_zero_length_forms = zero;
        }
    }
}

/// Whether the search may run off the end starting at `start` without
/// consuming a required node.
fn completion_from(g: &Grammar, start: Option<NodeIndex>) -> bool {
    let mut current = start;
    while let Some(index) = current {
        if !skippable(g, index) {
            return false;
        }
        current = g.node(index).next();
    }
    true
}

fn skippable(g: &Grammar, index: NodeIndex) -> bool {
    let node = g.node(index);
    match node.kind() {
        NodeKind::Morpheme { .. } | NodeKind::StemList { .. } => node.is_optional(),
        NodeKind::Fork { paths } => node.is_optional() || paths.iter().any(|&p| skippable(g, p)),
        NodeKind::Path {
            children,
            sequence: false,
        } => node.is_optional() || children.iter().all(|&c| skippable(g, c)),
        NodeKind::Path {
            children,
            sequence: true,
        }
        | NodeKind::Model { children, .. } => children.iter().all(|&c| skippable(g, c)),
        NodeKind::Jump { .. } => true,
        NodeKind::MutuallyExclusive { morphemes } => {
            node.is_optional() || morphemes.iter().any(|&m| skippable(g, m))
        }
        NodeKind::Copy { clone, .. } => node.is_optional() || clone.is_some_and(|c| skippable(g, c)),
    }
}
