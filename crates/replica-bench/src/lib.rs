//! Graph profiles for benchmarking the Replica clone engine.
//!
//! Every profile is built from `BenchNode { id, weight, label, children }`
//! values behind pointers, generated deterministically from a seed:
//!
//! - [`tree_profile`]: each node has exactly one parent
//! - [`dag_profile`]: nodes share children, no cycles
//! - [`cyclic_profile`]: a DAG plus back edges, so only safe clones finish
//! - [`flat_profile`]: a sequence of all-scalar structs

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::OnceLock;

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use replica_core::{FieldDesc, Type};
use replica_engine::{Pointer, Sequence, StructValue, Value};

/// `BenchNode { id: int, weight: float, label: str, children: []*BenchNode }`.
pub fn node_type() -> Type {
    static NODE: OnceLock<Type> = OnceLock::new();
    *NODE.get_or_init(|| {
        let node = Type::declare_struct("BenchNode");
        node.define_struct(vec![
            FieldDesc::new("id", Type::INT),
            FieldDesc::new("weight", Type::FLOAT),
            FieldDesc::new("label", Type::STR),
            FieldDesc::new("children", Type::sequence_of(Type::pointer_to(node))),
        ])
        .expect("BenchNode definition is valid");
        node
    })
}

/// `BenchFlat { a: int, b: float, c: uint, d: str }`.
pub fn flat_type() -> Type {
    static FLAT: OnceLock<Type> = OnceLock::new();
    *FLAT.get_or_init(|| {
        Type::new_struct(
            "BenchFlat",
            vec![
                FieldDesc::new("a", Type::INT),
                FieldDesc::new("b", Type::FLOAT),
                FieldDesc::new("c", Type::UINT),
                FieldDesc::new("d", Type::STR),
            ],
        )
        .expect("BenchFlat definition is valid")
    })
}

/// Wire `n` nodes so node `i` points at `edges[i]`, and return the root.
fn build(edges: &[Vec<usize>], rng: &mut ChaCha8Rng) -> Value {
    let node = node_type();
    let child_seq = Type::sequence_of(Type::pointer_to(node));
    let nodes: Vec<Pointer> = (0..edges.len())
        .map(|_| Pointer::to(Value::zero(node)))
        .collect();

    for (i, targets) in edges.iter().enumerate() {
        let children = Sequence::from_values(
            child_seq,
            targets.iter().map(|&t| nodes[t].clone().into()).collect(),
        )
        .expect("children are *BenchNode");
        let weight = (rng.next_u32() % 1000) as f64 / 10.0;
        let value = StructValue::new(node)
            .and_then(|s| s.with("id", i as i64))
            .and_then(|s| s.with("weight", weight))
            .and_then(|s| s.with("label", format!("node-{i}")))
            .and_then(|s| s.with("children", children))
            .expect("BenchNode members are well-typed");
        nodes[i]
            .store(value.into())
            .expect("cell holds a BenchNode");
    }
    nodes[0].clone().into()
}

fn pick(rng: &mut ChaCha8Rng, below: usize) -> usize {
    (rng.next_u64() % below as u64) as usize
}

/// A random tree of `n` nodes (at least one) rooted at node 0.
pub fn tree_profile(seed: u64, n: usize) -> Value {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = n.max(1);
    let mut edges = vec![Vec::new(); n];
    for child in 1..n {
        let parent = pick(&mut rng, child);
        edges[parent].push(child);
    }
    build(&edges, &mut rng)
}

/// A random DAG of `n` nodes where every node after the first has
/// between one and `fan_in` parents among the nodes before it.
pub fn dag_profile(seed: u64, n: usize, fan_in: usize) -> Value {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = n.max(1);
    let mut edges = vec![Vec::new(); n];
    for child in 1..n {
        let parents = 1 + pick(&mut rng, fan_in.max(1));
        for _ in 0..parents {
            let parent = pick(&mut rng, child);
            if !edges[parent].contains(&child) {
                edges[parent].push(child);
            }
        }
    }
    build(&edges, &mut rng)
}

/// [`dag_profile`] plus roughly `n / back_every` edges pointing back
/// toward the root.
pub fn cyclic_profile(seed: u64, n: usize, fan_in: usize, back_every: usize) -> Value {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = n.max(1);
    let mut edges = vec![Vec::new(); n];
    for child in 1..n {
        let parents = 1 + pick(&mut rng, fan_in.max(1));
        for _ in 0..parents {
            let parent = pick(&mut rng, child);
            if !edges[parent].contains(&child) {
                edges[parent].push(child);
            }
        }
    }
    let back_every = back_every.max(1);
    for from in (0..n).step_by(back_every) {
        let to = pick(&mut rng, from + 1);
        edges[from].push(to);
    }
    build(&edges, &mut rng)
}

/// A sequence of `n` [`flat_type`] values.
pub fn flat_profile(seed: u64, n: usize) -> Value {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let ty = flat_type();
    let values = (0..n)
        .map(|i| {
            StructValue::new(ty)
                .and_then(|s| s.with("a", i as i64))
                .and_then(|s| s.with("b", rng.next_u32() as f64))
                .and_then(|s| s.with("c", rng.next_u64()))
                .and_then(|s| s.with("d", "flat"))
                .map(Value::from)
                .expect("BenchFlat members are well-typed")
        })
        .collect();
    Sequence::from_values(Type::sequence_of(ty), values)
        .expect("elements are BenchFlat")
        .into()
}

/// Count the distinct nodes reachable from `root`.
pub fn reachable(root: &Value) -> usize {
    let mut seen = std::collections::HashSet::new();
    let mut stack: Vec<Pointer> = root.as_pointer().into_iter().cloned().collect();
    while let Some(p) = stack.pop() {
        if p.is_null() || !seen.insert(p.addr()) {
            continue;
        }
        if let Ok(children) = p.field("children") {
            if let Some(seq) = children.as_sequence() {
                stack.extend(seq.to_vec().iter().filter_map(|c| c.as_pointer().cloned()));
            }
        }
    }
    seen.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_reaches_every_node() {
        assert_eq!(reachable(&tree_profile(1, 50)), 50);
    }

    #[test]
    fn profiles_are_deterministic() {
        let a = dag_profile(9, 40, 3);
        let b = dag_profile(9, 40, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn cyclic_profile_has_a_cycle_and_full_reach() {
        let root = cyclic_profile(3, 30, 2, 5);
        assert_eq!(reachable(&root), 30);
        // node 0 always gets a back edge to itself.
        let children = root.as_pointer().unwrap().field("children").unwrap();
        let last = children.as_sequence().unwrap().to_vec().pop().unwrap();
        assert!(last.as_pointer().unwrap().ptr_eq(root.as_pointer().unwrap()));
    }

    #[test]
    fn flat_profile_length() {
        let v = flat_profile(0, 16);
        assert_eq!(v.as_sequence().unwrap().len(), 16);
    }
}
