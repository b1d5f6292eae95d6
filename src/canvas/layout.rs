// src/canvas/layout.rs
//
// =============================================================================
// ROBOGRAPH: AUTO-LAYOUT (v 0.1 )
// =============================================================================
//
// Layered left-to-right placement (Sugiyama-inspired) for IR nodes that
// arrive without canvas positions. Layers come from longest-path distance
// out of the entry nodes; each layer stacks its nodes vertically and the
// whole diagram is centered on a fixed canvas midpoint.

use std::collections::HashMap;

use crate::ir::{IRNode, NodeKind, NodeUi, WorkflowIR};

// Layout constants.
const NODE_WIDTH: f64 = 180.0;
const NODE_HEIGHT: f64 = 110.0;
const LOGIC_WIDTH: f64 = 240.0;
const LOGIC_HEIGHT: f64 = 200.0;
const COMPARISON_WIDTH: f64 = 260.0;
const COMPARISON_HEIGHT: f64 = 170.0;
const H_GAP: f64 = 100.0; // Horizontal gap between layers
const V_GAP: f64 = 50.0; // Vertical gap between nodes in the same layer
const CANVAS_CENTER_X: f64 = 600.0;
const CANVAS_CENTER_Y: f64 = 400.0;

/// Compute x, y positions for IR nodes using layered layout.
pub struct LayoutEngine;

impl LayoutEngine {
    pub fn new() -> Self {
        Self
    }

    /// Assign positions to every node, modifying `node.ui` in place.
    pub fn layout(&self, ir: &mut WorkflowIR) {
        if ir.nodes.is_empty() {
            return;
        }

        // Adjacency over node IDs.
        let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
        for n in &ir.nodes {
            outgoing.entry(n.id.as_str()).or_default();
            incoming.entry(n.id.as_str()).or_default();
        }
        for edge in &ir.edges {
            if outgoing.contains_key(edge.from_node.as_str())
                && incoming.contains_key(edge.to_node.as_str())
            {
                outgoing
                    .get_mut(edge.from_node.as_str())
                    .unwrap()
                    .push(edge.to_node.as_str());
                incoming
                    .get_mut(edge.to_node.as_str())
                    .unwrap()
                    .push(edge.from_node.as_str());
            }
        }

        let layers = assign_layers(ir, &outgoing, &incoming);

        // Group nodes by layer, preserving IR order within each group.
        let mut layer_groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (idx, node) in ir.nodes.iter().enumerate() {
            let layer = layers.get(node.id.as_str()).copied().unwrap_or(0);
            layer_groups.entry(layer).or_default().push(idx);
        }

        let num_layers = layer_groups.keys().max().copied().unwrap_or(0) + 1;

        // Total width for horizontal centering.
        let mut total_width = 0.0;
        for layer_idx in 0..num_layers {
            let max_w = layer_groups
                .get(&layer_idx)
                .map(|members| {
                    members
                        .iter()
                        .map(|&i| node_size(&ir.nodes[i]).0)
                        .fold(0.0, f64::max)
                })
                .filter(|w| *w > 0.0)
                .unwrap_or(NODE_WIDTH);
            total_width += max_w;
        }
        total_width += H_GAP * (num_layers.saturating_sub(1)) as f64;

        let start_x = CANVAS_CENTER_X - total_width / 2.0;

        // Place layer by layer, stacking vertically within each.
        let mut current_x = start_x;
        for layer_idx in 0..num_layers {
            let members = match layer_groups.get(&layer_idx) {
                Some(m) if !m.is_empty() => m.clone(),
                _ => continue,
            };

            let layer_max_w = members
                .iter()
                .map(|&i| node_size(&ir.nodes[i]).0)
                .fold(0.0, f64::max);

            let layer_height: f64 = members
                .iter()
                .map(|&i| node_size(&ir.nodes[i]).1)
                .sum::<f64>()
                + V_GAP * (members.len().saturating_sub(1)) as f64;

            let start_y = CANVAS_CENTER_Y - layer_height / 2.0;

            let mut current_y = start_y;
            for &i in &members {
                let (w, h) = node_size(&ir.nodes[i]);
                let x = current_x + (layer_max_w - w) / 2.0;
                let y = current_y;

                let node = &mut ir.nodes[i];
                match node.ui.as_mut() {
                    Some(ui) => {
                        ui.x = x;
                        ui.y = y;
                        ui.width = w;
                        ui.height = h;
                    }
                    None => {
                        node.ui = Some(NodeUi {
                            x,
                            y,
                            width: w,
                            height: h,
                            collapsed: false,
                        });
                    }
                }

                current_y += h + V_GAP;
            }

            current_x += layer_max_w + H_GAP;
        }
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Layer numbers via longest path from the entry nodes; unreached nodes land
/// on layer 0. Depth is capped at the node count so a malformed cyclic graph
/// cannot recurse forever.
fn assign_layers<'a>(
    ir: &'a WorkflowIR,
    outgoing: &HashMap<&'a str, Vec<&'a str>>,
    incoming: &HashMap<&'a str, Vec<&'a str>>,
) -> HashMap<&'a str, usize> {
    let mut layers: HashMap<&str, usize> = HashMap::new();
    let max_layer = ir.nodes.len();

    let mut entry_ids: Vec<&str> = ir
        .nodes
        .iter()
        .filter(|n| incoming.get(n.id.as_str()).map_or(true, Vec::is_empty))
        .map(|n| n.id.as_str())
        .collect();
    if entry_ids.is_empty() {
        if let Some(first) = ir.nodes.first() {
            entry_ids.push(first.id.as_str());
        }
    }

    // Iterative longest-path walk.
    let mut stack: Vec<(&str, usize)> = entry_ids.iter().map(|&id| (id, 0)).collect();
    while let Some((node_id, layer)) = stack.pop() {
        if layer > max_layer {
            continue;
        }
        if layers.get(node_id).map_or(false, |&l| l >= layer) {
            continue;
        }
        layers.insert(node_id, layer);
        for &target in outgoing.get(node_id).into_iter().flatten() {
            stack.push((target, layer + 1));
        }
    }

    for node in &ir.nodes {
        layers.entry(node.id.as_str()).or_insert(0);
    }

    layers
}

fn node_size(node: &IRNode) -> (f64, f64) {
    match node.kind {
        NodeKind::Logic => (LOGIC_WIDTH, LOGIC_HEIGHT),
        NodeKind::Comparison => (COMPARISON_WIDTH, COMPARISON_HEIGHT),
        _ => (NODE_WIDTH, NODE_HEIGHT),
    }
}
