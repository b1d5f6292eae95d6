// src/normalizer.rs
//
// =============================================================================
// ROBOGRAPH: IR NORMALIZER (v 0.1 )
// =============================================================================
//
// Canonicalizes workflow IRs so the round-trip pipeline is testable:
// strip UI, topo-sort nodes, reassign sequential IDs, sort edges, coerce
// scalar literals. `compare` turns two IRs into a similarity score in
// [0, 1]; the thresholds the pipeline must hold live in the test suite.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::ir::{IREdge, IRNode, IRParam, ParamValue, WorkflowIR};

pub struct IRNormalizer;

impl IRNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Create a normalized copy of the IR.
    ///
    /// Steps:
    /// 1. Topologically sort nodes (Kahn, ties broken by sorted IDs).
    /// 2. Reassign sequential IDs ("0", "1", ...).
    /// 3. Strip UI metadata.
    /// 4. Normalize parameter values (numeric strings coerce, other strings
    ///    lowercase + trim).
    /// 5. Remap edges, drop edges to dropped nodes, sort lexicographically.
    pub fn normalize(&self, ir: &WorkflowIR) -> WorkflowIR {
        let mut normalized = WorkflowIR::for_robot(&ir.robot_type);
        normalized.brand = ir.brand.clone();

        let sorted_nodes = topo_sort(ir);

        let mut id_map: HashMap<String, String> = HashMap::new();
        for (idx, node) in sorted_nodes.iter().enumerate() {
            id_map.insert(node.id.clone(), idx.to_string());
        }

        for (idx, node) in sorted_nodes.iter().enumerate() {
            let mut norm_node = IRNode::new(idx.to_string(), &node.schema_id, node.kind);
            norm_node.params = normalize_params(&node.params);
            norm_node.opaque_code = node.opaque_code.clone();
            normalized.add_node(norm_node);
        }

        let mut norm_edges: Vec<IREdge> = Vec::new();
        for edge in &ir.edges {
            if let (Some(from_id), Some(to_id)) =
                (id_map.get(&edge.from_node), id_map.get(&edge.to_node))
            {
                norm_edges.push(IREdge {
                    from_node: from_id.clone(),
                    from_port: edge.from_port.clone(),
                    to_node: to_id.clone(),
                    to_port: edge.to_port.clone(),
                    edge_type: edge.edge_type,
                });
            }
        }
        norm_edges.sort_by(|a, b| {
            (&a.from_node, &a.from_port, &a.to_node, &a.to_port)
                .cmp(&(&b.from_node, &b.from_port, &b.to_node, &b.to_port))
        });
        normalized.edges = norm_edges;

        normalized
    }

    /// Compare two IRs; 1.0 is a perfect match, 0.0 shares nothing.
    /// Weighted 0.7 nodes / 0.3 edges.
    pub fn compare(&self, ir_a: &WorkflowIR, ir_b: &WorkflowIR) -> f64 {
        let norm_a = self.normalize(ir_a);
        let norm_b = self.normalize(ir_b);

        if norm_a.nodes.is_empty() && norm_b.nodes.is_empty() {
            return 1.0;
        }
        if norm_a.nodes.is_empty() || norm_b.nodes.is_empty() {
            return 0.0;
        }

        let node_score = compare_nodes(&norm_a.nodes, &norm_b.nodes);
        let edge_score = compare_edges(&norm_a.edges, &norm_b.edges);

        0.7 * node_score + 0.3 * edge_score
    }
}

impl Default for IRNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SCORING
// ============================================================================

/// Positional node pairs contribute their parameter similarity when kind
/// and schema agree; the denominator is the longer list.
fn compare_nodes(nodes_a: &[IRNode], nodes_b: &[IRNode]) -> f64 {
    let max_len = nodes_a.len().max(nodes_b.len());
    if max_len == 0 {
        return 1.0;
    }

    let min_len = nodes_a.len().min(nodes_b.len());
    let mut matches = 0.0;

    for i in 0..min_len {
        let (na, nb) = (&nodes_a[i], &nodes_b[i]);
        if na.kind == nb.kind && na.schema_id == nb.schema_id {
            matches += compare_params(&na.params, &nb.params);
        }
    }

    matches / max_len as f64
}

/// Jaccard similarity over edge tuples; two empty sets are equivalent.
fn compare_edges(edges_a: &[IREdge], edges_b: &[IREdge]) -> f64 {
    if edges_a.is_empty() && edges_b.is_empty() {
        return 1.0;
    }

    let set_a: HashSet<(&str, &str, &str, &str)> = edges_a
        .iter()
        .map(|e| {
            (
                e.from_node.as_str(),
                e.from_port.as_str(),
                e.to_node.as_str(),
                e.to_port.as_str(),
            )
        })
        .collect();
    let set_b: HashSet<(&str, &str, &str, &str)> = edges_b
        .iter()
        .map(|e| {
            (
                e.from_node.as_str(),
                e.from_port.as_str(),
                e.to_node.as_str(),
                e.to_port.as_str(),
            )
        })
        .collect();

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    if union == 0 {
        1.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Average over the union of parameter names: exact normalized match scores
/// 1.0, a stringified match 0.8, a missing or differing value 0.
fn compare_params(
    params_a: &BTreeMap<String, IRParam>,
    params_b: &BTreeMap<String, IRParam>,
) -> f64 {
    let all_keys: HashSet<&String> = params_a.keys().chain(params_b.keys()).collect();
    if all_keys.is_empty() {
        return 1.0;
    }

    let mut matches = 0.0;
    for key in &all_keys {
        if let (Some(pa), Some(pb)) = (params_a.get(*key), params_b.get(*key)) {
            let va = normalize_value(&pa.value);
            let vb = normalize_value(&pb.value);
            if va == vb {
                matches += 1.0;
            } else if va.py_str() == vb.py_str() {
                matches += 0.8; // Close match
            }
        }
    }

    matches / all_keys.len() as f64
}

// ============================================================================
// NORMALIZATION
// ============================================================================

fn normalize_params(params: &BTreeMap<String, IRParam>) -> BTreeMap<String, IRParam> {
    params
        .iter()
        .map(|(key, param)| {
            (
                key.clone(),
                IRParam {
                    name: param.name.clone(),
                    value: normalize_value(&param.value),
                    param_type: param.param_type.clone(),
                },
            )
        })
        .collect()
}

/// Coerce numeric strings to numbers; lowercase and trim other strings.
fn normalize_value(value: &ParamValue) -> ParamValue {
    match value {
        ParamValue::Str(s) => {
            if s.contains('.') {
                if let Ok(f) = s.trim().parse::<f64>() {
                    return ParamValue::Float(f);
                }
            } else if let Ok(i) = s.trim().parse::<i64>() {
                return ParamValue::Int(i);
            }
            ParamValue::Str(s.to_lowercase().trim().to_string())
        }
        // Non-string values (including lists) pass through unchanged.
        other => other.clone(),
    }
}

/// Kahn's algorithm with a lexicographically sorted candidate queue;
/// unreached nodes (cycles, disconnected leftovers) append in original
/// order.
fn topo_sort(ir: &WorkflowIR) -> Vec<IRNode> {
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let node_map: HashMap<&str, &IRNode> = ir.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    for n in &ir.nodes {
        outgoing.entry(n.id.as_str()).or_default();
        in_degree.entry(n.id.as_str()).or_insert(0);
    }
    for edge in &ir.edges {
        if outgoing.contains_key(edge.from_node.as_str())
            && in_degree.contains_key(edge.to_node.as_str())
        {
            outgoing
                .get_mut(edge.from_node.as_str())
                .unwrap()
                .push(edge.to_node.as_str());
            *in_degree.get_mut(edge.to_node.as_str()).unwrap() += 1;
        }
    }

    let mut queue: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();
    queue.sort_unstable();

    let mut result: Vec<IRNode> = Vec::new();
    while !queue.is_empty() {
        let nid = queue.remove(0);
        if let Some(node) = node_map.get(nid) {
            result.push((*node).clone());
        }
        let mut targets: Vec<&str> = outgoing.get(nid).cloned().unwrap_or_default();
        targets.sort_unstable();
        for target in targets {
            let deg = in_degree.get_mut(target).unwrap();
            *deg -= 1;
            if *deg == 0 {
                queue.push(target);
                queue.sort_unstable();
            }
        }
    }

    let visited: HashSet<String> = result.iter().map(|n| n.id.clone()).collect();
    for node in &ir.nodes {
        if !visited.contains(node.id.as_str()) {
            result.push(node.clone());
        }
    }

    result
}
