// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replica placement across failure partitions.
//!
//! Each replica goes to the partition holding the fewest placed replicas
//! (ties broken by partition name), then to the node in that partition with
//! the most free slots. Equal free capacity is ordered by an FNV hash of the
//! workload and node so placement is stable but not always alphabetical.

use crate::error::EvalError;
use fleet_core::value::fnv1a64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: String,
    pub partition: String,
    /// Free replica slots.
    pub capacity: u32,
}

impl TopologyNode {
    pub fn new(id: impl Into<String>, partition: impl Into<String>, capacity: u32) -> Self {
        Self { id: id.into(), partition: partition.into(), capacity }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub workload: String,
    pub replicas: u32,
    pub nodes: Vec<TopologyNode>,
    /// Upper bound on replicas per partition; `None` is unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_partition: Option<u32>,
}

impl PlacementRequest {
    pub fn new(workload: impl Into<String>, replicas: u32, nodes: Vec<TopologyNode>) -> Self {
        Self { workload: workload.into(), replicas, nodes, max_per_partition: None }
    }

    fleet_core::setters! {
        option { max_per_partition: u32 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub replica: u32,
    pub node: String,
    pub partition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementPlan {
    pub workload: String,
    pub satisfied: bool,
    pub placements: Vec<Placement>,
    pub shortfall: u32,
    /// Replica count per partition, including partitions left empty.
    pub spread: BTreeMap<String, u32>,
}

struct Slot {
    id: String,
    tie: u64,
    free: u32,
}

pub fn place(req: &PlacementRequest) -> Result<PlacementPlan, EvalError> {
    if req.workload.trim().is_empty() {
        return Err(EvalError::invalid("workload", "must not be empty"));
    }
    if req.replicas == 0 {
        return Err(EvalError::invalid("replicas", "must be at least 1"));
    }

    let mut partitions: BTreeMap<String, Vec<Slot>> = BTreeMap::new();
    for node in &req.nodes {
        if node.id.trim().is_empty() || node.partition.trim().is_empty() {
            return Err(EvalError::invalid("nodes", "node id and partition must not be empty"));
        }
        let tie = fnv1a64(format!("{}/{}", req.workload, node.id).as_bytes());
        partitions.entry(node.partition.clone()).or_default().push(Slot {
            id: node.id.clone(),
            tie,
            free: node.capacity,
        });
    }
    let mut spread: BTreeMap<String, u32> = partitions.keys().map(|p| (p.clone(), 0)).collect();

    let mut placements = Vec::new();
    for replica in 1..=req.replicas {
        let candidate = partitions
            .iter()
            .filter(|(name, slots)| {
                let placed = spread.get(*name).copied().unwrap_or(0);
                slots.iter().any(|s| s.free > 0) && req.max_per_partition.is_none_or(|max| placed < max)
            })
            .min_by_key(|(name, _)| (spread.get(*name).copied().unwrap_or(0), (*name).clone()))
            .map(|(name, _)| name.clone());
        let Some(partition) = candidate else {
            break;
        };

        let Some(slots) = partitions.get_mut(&partition) else {
            break;
        };
        let Some(slot) = slots
            .iter_mut()
            .filter(|s| s.free > 0)
            .max_by(|a, b| a.free.cmp(&b.free).then(b.tie.cmp(&a.tie)).then(b.id.cmp(&a.id)))
        else {
            break;
        };
        slot.free -= 1;
        *spread.entry(partition.clone()).or_insert(0) += 1;
        placements.push(Placement { replica, node: slot.id.clone(), partition });
    }

    let shortfall = req.replicas - placements.len() as u32;
    if shortfall > 0 {
        tracing::warn!(workload = %req.workload, shortfall, "topology placement short of capacity");
    }
    Ok(PlacementPlan { workload: req.workload.clone(), satisfied: shortfall == 0, placements, shortfall, spread })
}
