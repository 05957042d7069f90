//! Pipeline compilation
//!
//! Compilation turns the generic configuration section tree into the
//! immutable node tree the dispatcher walks. It happens once at startup
//! and once per reload; it is deterministic and side-effect-free, so the
//! same configuration always produces a structurally identical pipeline.
//! Any error rejects the whole tree, never a partially-usable one.

use crate::config::SectionConfig;
use crate::error::ConfigError;

use super::registry::{SectionCtor, SectionRegistry};
use super::{Node, Pipeline};

/// Compile root sections into a pipeline using the built-in registry
pub fn compile_pipeline(sections: &[SectionConfig]) -> Result<Pipeline, ConfigError> {
    compile_with_registry(sections, &SectionRegistry::builtin())
}

/// Compile root sections into a pipeline, resolving section types against
/// the given registry
pub fn compile_with_registry(
    sections: &[SectionConfig],
    registry: &SectionRegistry,
) -> Result<Pipeline, ConfigError> {
    Ok(Pipeline::new(compile_nodes(sections, registry)?))
}

/// Compile a sibling list, preserving document order
fn compile_nodes(
    sections: &[SectionConfig],
    registry: &SectionRegistry,
) -> Result<Vec<Node>, ConfigError> {
    sections
        .iter()
        .map(|section| compile_node(section, registry))
        .collect()
}

fn compile_node(section: &SectionConfig, registry: &SectionRegistry) -> Result<Node, ConfigError> {
    let ctor = registry
        .get(&section.kind)
        .ok_or_else(|| ConfigError::UnknownSection {
            kind: section.kind.clone(),
        })?;

    match ctor {
        SectionCtor::Filter(ctor) => {
            let filter = ctor(section)?;
            let children = compile_nodes(&section.children, registry)?;
            Ok(Node::Filter { filter, children })
        }
        SectionCtor::Handler(ctor) => {
            if !section.children.is_empty() {
                return Err(ConfigError::HandlerWithChildren {
                    kind: section.kind.clone(),
                });
            }
            Ok(Node::Handler(ctor(section)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_config() -> Vec<SectionConfig> {
        vec![
            SectionConfig::new("set-mark").with_param("mark", "seen"),
            SectionConfig::new("marked-with")
                .with_param("mark", "seen")
                .with_child(
                    SectionConfig::new("marked-with")
                        .with_param("mark", "eth0")
                        .with_child(SectionConfig::new("ignore-request")),
                )
                .with_child(SectionConfig::new("preference").with_int_param("value", 255)),
        ]
    }

    #[test]
    fn test_compile_nested_tree() {
        let pipeline = compile_pipeline(&nested_config()).unwrap();
        assert_eq!(pipeline.nodes().len(), 2);

        match &pipeline.nodes()[1] {
            Node::Filter { filter, children } => {
                assert_eq!(filter.kind(), "marked-with");
                assert_eq!(children.len(), 2);
                assert!(matches!(&children[0], Node::Filter { .. }));
                assert!(matches!(&children[1], Node::Handler(_)));
            }
            other => panic!("expected a filter node, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_section_names_the_kind() {
        let sections = vec![SectionConfig::new("bogus-filter")];
        let err = compile_pipeline(&sections).unwrap_err();

        assert!(matches!(&err, ConfigError::UnknownSection { kind } if kind == "bogus-filter"));
        assert!(err.to_string().contains("bogus-filter"));
    }

    #[test]
    fn test_unknown_section_deep_in_tree() {
        let sections = vec![SectionConfig::new("marked-with")
            .with_param("mark", "eth0")
            .with_child(SectionConfig::new("bogus-filter"))];

        let err = compile_pipeline(&sections).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSection { kind } if kind == "bogus-filter"));
    }

    #[test]
    fn test_handler_with_children_is_rejected() {
        let sections = vec![SectionConfig::new("ignore-request")
            .with_child(SectionConfig::new("preference").with_int_param("value", 1))];

        let err = compile_pipeline(&sections).unwrap_err();
        assert!(matches!(err, ConfigError::HandlerWithChildren { kind } if kind == "ignore-request"));
    }

    #[test]
    fn test_missing_parameter_propagates() {
        let sections = vec![SectionConfig::new("marked-with")];
        let err = compile_pipeline(&sections).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingParameter {
                param: "mark",
                ..
            }
        ));
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let sections = nested_config();
        let first = compile_pipeline(&sections).unwrap();
        let second = compile_pipeline(&sections).unwrap();

        // Structural equivalence: identical trees down to every parameter.
        assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }

    #[test]
    fn test_empty_configuration_compiles() {
        let pipeline = compile_pipeline(&[]).unwrap();
        assert!(pipeline.nodes().is_empty());
    }

    #[test]
    fn test_compile_with_empty_registry_rejects_everything() {
        let sections = vec![SectionConfig::new("marked-with").with_param("mark", "eth0")];
        let err = compile_with_registry(&sections, &SectionRegistry::empty()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSection { .. }));
    }
}
