//! Entity-relationship diagram synthesis.
//!
//! ```text
//!   entities (alphabetical) ──► nodes ──► GridLayout positions
//!   fields ──► RelationshipInferencer ──► edges
//!   entities + fields + edges ──► ProjectStats
//! ```
//!
//! Everything is recomputed from the store on each call; two calls over
//! unchanged metadata produce identical nodes, positions and edge ids.

mod layout;
mod stats;

pub use layout::{GridLayout, Position};
pub use stats::{FieldTypeCount, ProjectStats};

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::inference::{infer_relationships, EntityResolver, InferredRelationship};
use crate::store::{Entity, Field, MetadataStore, RelationshipType, StoreResult};

/// Node type tag understood by diagram renderers.
pub const ENTITY_NODE_TYPE: &str = "entity";

/// Payload of an entity node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeData {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagramNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub position: Position,
    pub width: u32,
    pub height: u32,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagramEdge {
    /// `edge-{source}-{target}-{field}`.
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
    pub relationship_type: RelationshipType,
    pub field_id: String,
}

impl DiagramEdge {
    pub fn edge_id(source_entity_id: &str, target_entity_id: &str, field_id: &str) -> String {
        format!("edge-{source_entity_id}-{target_entity_id}-{field_id}")
    }
}

impl From<&InferredRelationship> for DiagramEdge {
    fn from(rel: &InferredRelationship) -> Self {
        Self {
            id: Self::edge_id(&rel.source_entity_id, &rel.target_entity_id, &rel.field_id),
            source: rel.source_entity_id.clone(),
            target: rel.target_entity_id.clone(),
            label: rel.label.clone(),
            relationship_type: rel.relationship_type,
            field_id: rel.field_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagram {
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
    pub viewport: Viewport,
}

/// Metadata of one project, loaded once and shared by the projections.
struct ProjectSchema {
    entities: Vec<Entity>,
    fields: Vec<Field>,
    inferred: Vec<InferredRelationship>,
}

/// Builds diagrams and statistics for a project.
pub struct DiagramComposer<'a> {
    store: MetadataStore<'a>,
    resolver: &'a dyn EntityResolver,
    layout: GridLayout,
}

impl<'a> DiagramComposer<'a> {
    pub fn new(store: MetadataStore<'a>, resolver: &'a dyn EntityResolver) -> Self {
        Self {
            store,
            resolver,
            layout: GridLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: GridLayout) -> Self {
        self.layout = layout;
        self
    }

    fn load(&self, project_id: &str) -> StoreResult<ProjectSchema> {
        let entities = self.store.list_entities(project_id)?;
        let fields = self.store.list_project_fields(project_id)?;
        let inferred = infer_relationships(&entities, &fields, self.resolver);
        Ok(ProjectSchema {
            entities,
            fields,
            inferred,
        })
    }

    /// The node/edge graph of a project. `None` if the project does not exist.
    pub fn generate_diagram(&self, project_id: &str) -> StoreResult<Option<Diagram>> {
        if !self.store.project_exists(project_id)? {
            return Ok(None);
        }
        let schema = self.load(project_id)?;

        let mut fields_by_entity: HashMap<&str, Vec<Field>> = HashMap::new();
        for field in &schema.fields {
            fields_by_entity
                .entry(field.entity_id.as_str())
                .or_default()
                .push(field.clone());
        }

        let positions = self.layout.positions(schema.entities.len());
        let nodes: Vec<DiagramNode> = schema
            .entities
            .iter()
            .zip(positions)
            .map(|(entity, position)| DiagramNode {
                id: entity.id.clone(),
                node_type: ENTITY_NODE_TYPE,
                position,
                width: self.layout.node_width,
                height: self.layout.node_height,
                data: NodeData {
                    name: entity.name.clone(),
                    description: entity.description.clone(),
                    fields: fields_by_entity.remove(entity.id.as_str()).unwrap_or_default(),
                },
            })
            .collect();

        let edges: Vec<DiagramEdge> = schema.inferred.iter().map(DiagramEdge::from).collect();

        debug!(project_id, nodes = nodes.len(), edges = edges.len(), "generated diagram");
        Ok(Some(Diagram {
            nodes,
            edges,
            viewport: Viewport::default(),
        }))
    }

    /// Aggregate statistics of a project. `None` if the project does not exist.
    pub fn project_stats(&self, project_id: &str) -> StoreResult<Option<ProjectStats>> {
        if !self.store.project_exists(project_id)? {
            return Ok(None);
        }
        let schema = self.load(project_id)?;
        let explicit = self.store.list_relationships(project_id)?.len();

        Ok(Some(ProjectStats::compute(
            &schema.entities,
            &schema.fields,
            &schema.inferred,
            explicit,
        )))
    }
}
