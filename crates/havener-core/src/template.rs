//! Shape-preserving templating of configuration trees

use indexmap::IndexMap;

use crate::error::ShellError;
use crate::node::{ConfigNode, Scalar};
use crate::shell::{CommandRunner, ShellEvaluator};

/// Evaluates shell operators at every string leaf of a [`ConfigNode`] tree
///
/// Rules:
/// - Mappings keep their key set, every value is templated
/// - Sequences keep their length and order, every element is templated
/// - String leaves go through the [`ShellEvaluator`]
/// - Numbers and booleans are copied as-is
/// - `Null` becomes an empty mapping, chart overrides are always map-shaped
pub struct Templater<'a> {
    shell: ShellEvaluator<'a>,
}

impl<'a> Templater<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            shell: ShellEvaluator::new(runner),
        }
    }

    /// Template a tree, returning a new tree of the same shape
    ///
    /// The first failing shell operator aborts the traversal.
    pub fn render(&self, node: &ConfigNode) -> Result<ConfigNode, ShellError> {
        match node {
            ConfigNode::Mapping(map) => map
                .iter()
                .map(|(key, value)| Ok((key.clone(), self.render(value)?)))
                .collect::<Result<IndexMap<_, _>, ShellError>>()
                .map(ConfigNode::Mapping),
            ConfigNode::Sequence(items) => items
                .iter()
                .map(|item| self.render(item))
                .collect::<Result<Vec<_>, ShellError>>()
                .map(ConfigNode::Sequence),
            ConfigNode::Scalar(Scalar::String(s)) => {
                Ok(ConfigNode::string(self.shell.evaluate(s)?))
            }
            ConfigNode::Scalar(scalar) => Ok(ConfigNode::Scalar(scalar.clone())),
            ConfigNode::Null => Ok(ConfigNode::empty_mapping()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellRunner;
    use crate::shell::tests::ScriptedRunner;

    /// Same keys, same sequence lengths, same leaf kinds (Null may become a mapping)
    fn same_shape(before: &ConfigNode, after: &ConfigNode) -> bool {
        match (before, after) {
            (ConfigNode::Mapping(a), ConfigNode::Mapping(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && same_shape(va, vb))
            }
            (ConfigNode::Sequence(a), ConfigNode::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_shape(x, y))
            }
            (ConfigNode::Scalar(Scalar::String(_)), ConfigNode::Scalar(Scalar::String(_))) => true,
            (ConfigNode::Scalar(a), ConfigNode::Scalar(b)) => a == b,
            (ConfigNode::Null, ConfigNode::Mapping(m)) => m.is_empty(),
            _ => false,
        }
    }

    fn tree() -> ConfigNode {
        ConfigNode::from_yaml(
            r#"
global:
  domain: ((shell domain))
  replicas: 2
  debug: false
containers:
  - name: web
    args: ["--port", "((shell port))", "--verbose"]
  - name: sidecar
    env: ~
plain: value
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_render_preserves_shape() {
        let runner = ScriptedRunner::default();
        let input = tree();

        let output = Templater::new(&runner).render(&input).unwrap();

        assert!(same_shape(&input, &output));
        assert_eq!(
            output.get("global").unwrap().get("domain").unwrap().as_str(),
            Some("<domain>")
        );
        assert_eq!(output.get("plain").unwrap().as_str(), Some("value"));
    }

    #[test]
    fn test_render_replaces_sequence_elements_in_place() {
        let runner = ScriptedRunner::default();
        let output = Templater::new(&runner).render(&tree()).unwrap();

        let ConfigNode::Sequence(containers) = output.get("containers").unwrap() else {
            panic!("containers should stay a sequence");
        };
        let ConfigNode::Sequence(args) = containers[0].get("args").unwrap() else {
            panic!("args should stay a sequence");
        };
        let args: Vec<_> = args.iter().filter_map(ConfigNode::as_str).collect();
        assert_eq!(args, vec!["--port", "<port>", "--verbose"]);
    }

    #[test]
    fn test_null_becomes_empty_mapping() {
        let runner = ScriptedRunner::default();
        let templater = Templater::new(&runner);

        assert_eq!(
            templater.render(&ConfigNode::Null).unwrap(),
            ConfigNode::empty_mapping()
        );

        let output = templater.render(&tree()).unwrap();
        let ConfigNode::Sequence(containers) = output.get("containers").unwrap() else {
            panic!("containers should stay a sequence");
        };
        assert_eq!(containers[1].get("env"), Some(&ConfigNode::empty_mapping()));
    }

    #[test]
    fn test_keys_of_different_types_stay_distinct() {
        let runner = ScriptedRunner::default();
        let input = ConfigNode::from_yaml(
            "1: int-key\n'1': ((shell one))\ntrue: bool-key\n'true': s\n",
        )
        .unwrap();

        let output = Templater::new(&runner).render(&input).unwrap();

        assert!(same_shape(&input, &output));
        assert_eq!(output.get("1").unwrap().as_str(), Some("<one>"));
        assert_eq!(
            output.get_key(&serde_yaml::Value::Bool(true)).unwrap().as_str(),
            Some("bool-key")
        );
        assert_eq!(output.get("true").unwrap().as_str(), Some("s"));
    }

    #[test]
    fn test_tree_without_operators_is_unchanged() {
        let runner = ScriptedRunner::default();
        let input = ConfigNode::from_yaml("a:\n  b: [1, two, true]\nc: text\n").unwrap();

        let output = Templater::new(&runner).render(&input).unwrap();

        assert_eq!(output, input);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_failure_returns_error_without_tree() {
        let runner = ScriptedRunner::failing_on("port");
        let input = tree();

        let err = Templater::new(&runner).render(&input).unwrap_err();

        assert_eq!(err.command(), "port");
        // the input is untouched
        assert_eq!(input, tree());
    }

    #[test]
    fn test_render_with_real_shell() {
        let runner = ShellRunner::new();
        let input = ConfigNode::from_yaml(
            "greeting: ((shell echo hi))\nwrapped: a-((shell echo hi))-b\nboth: ((shell echo x)):((shell echo y))\n",
        )
        .unwrap();

        let output = Templater::new(&runner).render(&input).unwrap();

        assert_eq!(output.get("greeting").unwrap().as_str(), Some("hi"));
        assert_eq!(output.get("wrapped").unwrap().as_str(), Some("a-hi-b"));
        assert_eq!(output.get("both").unwrap().as_str(), Some("x:y"));
    }

    #[test]
    fn test_render_with_failing_real_shell() {
        let runner = ShellRunner::new();
        let input = ConfigNode::from_yaml("ok: ((shell echo fine))\nbad: ((shell false))\n").unwrap();

        assert!(Templater::new(&runner).render(&input).is_err());
    }
}
