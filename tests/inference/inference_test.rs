#[cfg(test)]
mod tests {
    use strata::inference::{
        InflectionResolver, MatchRule, NamingConventionResolver, RelationshipInferencer,
    };
    use strata::migrate::SchemaEvolver;
    use strata::store::{
        Database, FieldType, NewEntity, NewField, NewProject, NewRelationship, RelationshipType,
    };

    fn project(entities: &[(&str, &str)]) -> Database {
        let db = Database::open_in_memory().unwrap();
        SchemaEvolver::new(&db).run();
        let store = db.store();
        store.create_project("p1", &NewProject::new("Blog")).unwrap();
        for (id, name) in entities {
            store.create_entity(id, &NewEntity::new("p1", *name)).unwrap();
        }
        db
    }

    fn add_field(db: &Database, entity_id: &str, name: &str) {
        db.store()
            .create_field(
                &format!("{entity_id}.{name}"),
                &NewField::new(entity_id, name, FieldType::Integer),
            )
            .unwrap();
    }

    #[test]
    fn test_post_author_id_resolves_to_author() {
        let db = project(&[("post", "Post"), ("author", "Author")]);
        add_field(&db, "post", "id");
        add_field(&db, "post", "author_id");
        add_field(&db, "author", "id");

        let inferred = RelationshipInferencer::with_naming_conventions(db.store())
            .infer("p1")
            .unwrap();

        assert_eq!(inferred.len(), 1);
        let rel = &inferred[0];
        assert_eq!(rel.source_entity_id, "post");
        assert_eq!(rel.target_entity_id, "author");
        assert_eq!(rel.field_id, "post.author_id");
        assert_eq!(rel.label, "author_id");
        assert_eq!(rel.relationship_type, RelationshipType::ManyToOne);
        assert_eq!(rel.rule, MatchRule::Exact);
    }

    #[test]
    fn test_plural_entity_resolves_when_singular_absent() {
        let db = project(&[("post", "Post"), ("authors", "Authors")]);
        add_field(&db, "post", "author_id");

        let inferred = RelationshipInferencer::with_naming_conventions(db.store())
            .infer("p1")
            .unwrap();

        assert_eq!(inferred.len(), 1);
        assert_eq!(inferred[0].target_entity_name, "Authors");
        assert_eq!(inferred[0].rule, MatchRule::Plural);
    }

    #[test]
    fn test_unresolved_and_plain_id_fields_are_skipped() {
        let db = project(&[("post", "Post")]);
        add_field(&db, "post", "id");
        add_field(&db, "post", "ID");
        add_field(&db, "post", "editor_id");
        add_field(&db, "post", "identifier");

        let inferred = RelationshipInferencer::with_naming_conventions(db.store())
            .infer("p1")
            .unwrap();
        assert!(inferred.is_empty());
    }

    #[test]
    fn test_self_reference_and_case_insensitive_suffix() {
        let db = project(&[("post", "Post")]);
        add_field(&db, "post", "POST_ID");

        let inferred = RelationshipInferencer::with_naming_conventions(db.store())
            .infer("p1")
            .unwrap();
        assert_eq!(inferred.len(), 1);
        assert_eq!(inferred[0].source_entity_id, "post");
        assert_eq!(inferred[0].target_entity_id, "post");
    }

    #[test]
    fn test_explicit_relationships_are_ignored() {
        let db = project(&[("post", "Post"), ("user", "User")]);
        add_field(&db, "post", "owner");
        db.store()
            .create_relationship(
                "r1",
                &NewRelationship::new("post", "user", RelationshipType::ManyToOne),
            )
            .unwrap();

        let inferred = RelationshipInferencer::with_naming_conventions(db.store())
            .infer("p1")
            .unwrap();
        assert!(inferred.is_empty());
    }

    #[test]
    fn test_output_order_follows_entities_then_fields() {
        let db = project(&[("comment", "Comment"), ("post", "Post"), ("user", "User")]);
        add_field(&db, "post", "user_id");
        add_field(&db, "comment", "user_id");
        add_field(&db, "comment", "post_id");

        let inferred = RelationshipInferencer::with_naming_conventions(db.store())
            .infer("p1")
            .unwrap();
        let fields: Vec<&str> = inferred.iter().map(|r| r.field_id.as_str()).collect();
        assert_eq!(
            fields,
            ["comment.user_id", "comment.post_id", "post.user_id"]
        );
    }

    #[test]
    fn test_other_projects_are_not_candidates() {
        let db = project(&[("post", "Post")]);
        add_field(&db, "post", "user_id");
        let store = db.store();
        store.create_project("p2", &NewProject::new("Other")).unwrap();
        store.create_entity("user", &NewEntity::new("p2", "User")).unwrap();

        let inferred = RelationshipInferencer::with_naming_conventions(store)
            .infer("p1")
            .unwrap();
        assert!(inferred.is_empty());
    }

    #[test]
    fn test_inflection_resolver_handles_irregular_plurals() {
        let db = project(&[("task", "Task"), ("people", "People")]);
        add_field(&db, "task", "person_id");

        let naive = RelationshipInferencer::new(db.store(), &NamingConventionResolver)
            .infer("p1")
            .unwrap();
        assert!(naive.is_empty());

        let inflected = RelationshipInferencer::new(db.store(), &InflectionResolver)
            .infer("p1")
            .unwrap();
        assert_eq!(inflected.len(), 1);
        assert_eq!(inflected[0].target_entity_id, "people");
        assert_eq!(inflected[0].rule, MatchRule::Inflected);
    }

    #[test]
    fn test_unknown_project_yields_nothing() {
        let db = project(&[]);
        let inferred = RelationshipInferencer::with_naming_conventions(db.store())
            .infer("nope")
            .unwrap();
        assert!(inferred.is_empty());
    }
}
