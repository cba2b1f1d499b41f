//! Aggregate statistics of a project's schema.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;
use serde::Serialize;

use crate::inference::InferredRelationship;
use crate::store::{Entity, Field};

/// Number of fields declared with one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldTypeCount {
    #[serde(rename = "type")]
    pub field_type: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub total_entities: usize,
    pub total_fields: usize,
    /// Inferred relationships.
    pub total_relationships: usize,
    /// Stored relationship rows touching the project.
    pub explicit_relationships: usize,
    /// Weakly connected components of the inferred relationship graph.
    /// Entities without inferred relationships count as their own group.
    pub connected_groups: usize,
    /// Most frequent type first; ties by type name.
    pub field_types: Vec<FieldTypeCount>,
}

impl ProjectStats {
    pub fn compute(
        entities: &[Entity],
        fields: &[Field],
        inferred: &[InferredRelationship],
        explicit_relationships: usize,
    ) -> Self {
        Self {
            total_entities: entities.len(),
            total_fields: fields.len(),
            total_relationships: inferred.len(),
            explicit_relationships,
            connected_groups: connected_groups(entities, inferred),
            field_types: field_type_histogram(fields),
        }
    }
}

fn field_type_histogram(fields: &[Field]) -> Vec<FieldTypeCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for field in fields {
        *counts.entry(field.field_type.as_str()).or_default() += 1;
    }

    let mut histogram: Vec<FieldTypeCount> = counts
        .into_iter()
        .map(|(field_type, count)| FieldTypeCount {
            field_type: field_type.to_string(),
            count,
        })
        .collect();
    // Stable sort keeps the BTreeMap's name order within equal counts.
    histogram.sort_by(|a, b| b.count.cmp(&a.count));
    histogram
}

fn connected_groups(entities: &[Entity], inferred: &[InferredRelationship]) -> usize {
    let mut graph = UnGraph::<&str, ()>::with_capacity(entities.len(), inferred.len());
    let nodes: HashMap<&str, _> = entities
        .iter()
        .map(|e| (e.id.as_str(), graph.add_node(e.name.as_str())))
        .collect();

    for rel in inferred {
        if let (Some(&a), Some(&b)) = (
            nodes.get(rel.source_entity_id.as_str()),
            nodes.get(rel.target_entity_id.as_str()),
        ) {
            graph.add_edge(a, b, ());
        }
    }

    connected_components(&graph)
}

impl fmt::Display for ProjectStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "entities:      {}", self.total_entities)?;
        writeln!(f, "fields:        {}", self.total_fields)?;
        writeln!(
            f,
            "relationships: {} inferred, {} explicit",
            self.total_relationships, self.explicit_relationships
        )?;
        writeln!(f, "groups:        {}", self.connected_groups)?;
        write!(f, "field types:")?;
        if self.field_types.is_empty() {
            write!(f, " none")?;
        }
        for entry in &self.field_types {
            write!(f, "\n  {:<12}{}", entry.field_type, entry.count)?;
        }
        Ok(())
    }
}
