//! Scoring for XGBoost boosters saved in the JSON model format.
//!
//! Only the parts needed for inference are read: the tree arrays, the base
//! score and the objective. Categorical splits are not supported.

use serde::Deserialize;

use crate::classification::domain::classifier::Classifier;

/// Objectives whose output is a sigmoid over the summed margin.
const LOGISTIC_OBJECTIVES: [&str; 2] = ["binary:logistic", "reg:logistic"];

#[derive(Deserialize)]
struct BoosterDocument {
    learner: Learner,
}

#[derive(Deserialize)]
struct Learner {
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: Objective,
}

#[derive(Deserialize)]
struct GradientBooster {
    name: String,
    model: GbTreeModel,
}

#[derive(Deserialize)]
struct GbTreeModel {
    trees: Vec<TreeDocument>,
}

#[derive(Deserialize)]
struct LearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Deserialize)]
struct Objective {
    name: String,
}

#[derive(Deserialize)]
struct TreeDocument {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// Older releases write booleans, newer ones 0/1 integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(i) => *i != 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Node {
    left: i32,
    right: i32,
    feature: usize,
    /// Split threshold, or the leaf value for leaves.
    value: f32,
    default_left: bool,
}

#[derive(Clone, Debug, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_document(doc: TreeDocument, index: usize) -> Result<Self, String> {
        let n = doc.left_children.len();
        let lengths = [
            doc.right_children.len(),
            doc.split_indices.len(),
            doc.split_conditions.len(),
            doc.default_left.len(),
        ];
        if n == 0 || lengths.iter().any(|&len| len != n) {
            return Err(format!("tree {index}: node arrays are empty or of unequal length"));
        }
        if doc.split_type.iter().any(|&t| t != 0) {
            return Err(format!("tree {index}: categorical splits are not supported"));
        }

        let nodes: Vec<Node> = (0..n)
            .map(|i| Node {
                left: doc.left_children[i],
                right: doc.right_children[i],
                feature: doc.split_indices[i] as usize,
                value: doc.split_conditions[i],
                default_left: doc.default_left[i].is_set(),
            })
            .collect();

        let in_range = |child: i32| child >= 0 && (child as usize) < n;
        for (i, node) in nodes.iter().enumerate() {
            if !node.is_leaf() && !(in_range(node.left) && in_range(node.right)) {
                return Err(format!("tree {index}: node {i} has an out-of-range child"));
            }
        }
        Ok(Self { nodes })
    }

    fn leaf_value(&self, features: &[Option<f64>]) -> Result<f32, String> {
        let mut id = 0usize;
        // Each step moves to a child; a well-formed tree needs at most n steps.
        for _ in 0..=self.nodes.len() {
            let node = &self.nodes[id];
            if node.is_leaf() {
                return Ok(node.value);
            }
            let go_left = match features.get(node.feature) {
                None => return Err(format!("split on feature {} outside the input", node.feature)),
                Some(None) => node.default_left,
                Some(Some(x)) if x.is_nan() => node.default_left,
                Some(Some(x)) => (*x as f32) < node.value,
            };
            id = (if go_left { node.left } else { node.right }) as usize;
        }
        Err("tree walk did not reach a leaf".to_string())
    }
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.left == -1
    }
}

/// Gradient-boosted tree ensemble with a logistic link.
#[derive(Clone, Debug, PartialEq)]
pub struct XgbBooster {
    trees: Vec<Tree>,
    base_margin: f64,
    num_features: Option<usize>,
}

impl XgbBooster {
    pub fn from_json(bytes: &[u8]) -> Result<Self, String> {
        if let Some(format) = non_json_format(bytes) {
            return Err(format!(
                "unsupported {format} model payload: only XGBoost JSON boosters \
                 (save_model with a .json file name) are supported"
            ));
        }
        let doc: BoosterDocument =
            serde_json::from_slice(bytes).map_err(|e| format!("invalid booster JSON: {e}"))?;
        let learner = doc.learner;

        if learner.gradient_booster.name != "gbtree" {
            return Err(format!(
                "unsupported booster '{}', expected gbtree",
                learner.gradient_booster.name
            ));
        }
        if !LOGISTIC_OBJECTIVES.contains(&learner.objective.name.as_str()) {
            return Err(format!(
                "unsupported objective '{}', expected one of {LOGISTIC_OBJECTIVES:?}",
                learner.objective.name
            ));
        }

        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        if !(base_score > 0.0 && base_score < 1.0) {
            return Err(format!("base_score {base_score} is not a probability"));
        }
        let num_features = learner
            .learner_model_param
            .num_feature
            .as_deref()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0);

        let trees = learner
            .gradient_booster
            .model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, doc)| Tree::from_document(doc, i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trees,
            base_margin: (base_score / (1.0 - base_score)).ln(),
            num_features,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> Option<usize> {
        self.num_features
    }

    /// Raw log-odds before the sigmoid.
    pub fn margin(&self, features: &[Option<f64>]) -> Result<f64, String> {
        // Leaves are summed in f32 like the reference predictor.
        let mut sum = 0f32;
        for tree in &self.trees {
            sum += tree.leaf_value(features)?;
        }
        Ok(self.base_margin + sum as f64)
    }
}

impl Classifier for XgbBooster {
    fn probability(&self, features: &[Option<f64>]) -> Result<f64, Box<dyn std::error::Error>> {
        let margin = self.margin(features)?;
        Ok(1.0 / (1.0 + (-margin).exp()))
    }
}

/// Names the payload format when it is clearly not JSON text.
///
/// UBJSON models also open with `{`, but the next byte is a type marker
/// rather than whitespace or a quoted key.
fn non_json_format(bytes: &[u8]) -> Option<&'static str> {
    let mut rest = bytes.iter().copied().skip_while(u8::is_ascii_whitespace);
    match rest.next() {
        None => None,
        Some(b'{') => match rest.find(|b| !b.is_ascii_whitespace()) {
            Some(b'"') | Some(b'}') | None => None,
            Some(_) => Some("UBJSON"),
        },
        Some(_) => Some("binary"),
    }
}

/// Accepts `"5E-1"` as well as the bracketed vector form `"[5E-1]"`.
fn parse_base_score(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let first = trimmed.split(',').next().unwrap_or_default().trim();
    first
        .parse::<f64>()
        .map_err(|_| format!("unparseable base_score '{raw}'"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use serde_json::{json, Value};

    /// One stump per entry: `(feature, threshold, left_leaf, right_leaf, default_left)`.
    pub(crate) fn booster_json(stumps: &[(u32, f32, f32, f32, bool)], base_score: &str) -> Value {
        let trees: Vec<Value> = stumps
            .iter()
            .map(|&(feature, cond, left, right, default_left)| {
                json!({
                    "left_children": [1, -1, -1],
                    "right_children": [2, -1, -1],
                    "split_indices": [feature, 0, 0],
                    "split_conditions": [cond, left, right],
                    "default_left": [u8::from(default_left), 0, 0],
                    "split_type": [0, 0, 0],
                })
            })
            .collect();
        json!({
            "learner": {
                "gradient_booster": {
                    "name": "gbtree",
                    "model": { "trees": trees }
                },
                "learner_model_param": { "base_score": base_score, "num_feature": "168" },
                "objective": { "name": "binary:logistic" }
            },
            "version": [2, 1, 0]
        })
    }

    fn booster(stumps: &[(u32, f32, f32, f32, bool)]) -> XgbBooster {
        let doc = booster_json(stumps, "5E-1");
        XgbBooster::from_json(doc.to_string().as_bytes()).unwrap()
    }

    #[rstest]
    #[case::plain("5E-1", 0.5)]
    #[case::bracketed("[2.5E-1]", 0.25)]
    #[case::spaced(" 0.75 ", 0.75)]
    fn test_parse_base_score(#[case] raw: &str, #[case] expected: f64) {
        assert_relative_eq!(parse_base_score(raw).unwrap(), expected);
    }

    #[test]
    fn test_parse_base_score_rejects_garbage() {
        assert!(parse_base_score("abc").is_err());
    }

    #[test]
    fn test_routes_by_strict_less_than() {
        let b = booster(&[(0, 1.0, -2.0, 3.0, true)]);
        assert_relative_eq!(b.margin(&[Some(0.5)]).unwrap(), -2.0);
        assert_relative_eq!(b.margin(&[Some(1.0)]).unwrap(), 3.0);
    }

    #[rstest]
    #[case::default_left(true, -2.0)]
    #[case::default_right(false, 3.0)]
    fn test_missing_follows_default(#[case] default_left: bool, #[case] expected: f64) {
        let b = booster(&[(1, 1.0, -2.0, 3.0, default_left)]);
        assert_relative_eq!(b.margin(&[Some(0.0), None]).unwrap(), expected);
        assert_relative_eq!(b.margin(&[Some(0.0), Some(f64::NAN)]).unwrap(), expected);
    }

    #[test]
    fn test_probability_sums_trees_with_base_score() {
        let b = booster(&[(0, 1.0, 0.5, -0.5, true), (0, 2.0, 0.25, -0.25, true)]);
        let p = b.probability(&[Some(0.0)]).unwrap();
        assert_relative_eq!(p, 1.0 / (1.0 + (-0.75f64).exp()), epsilon = 1e-6);
    }

    #[test]
    fn test_non_default_base_score_shifts_margin() {
        let doc = booster_json(&[(0, 1.0, 0.0, 0.0, true)], "[2.5E-1]");
        let b = XgbBooster::from_json(doc.to_string().as_bytes()).unwrap();
        assert_relative_eq!(b.margin(&[Some(0.0)]).unwrap(), (1.0f64 / 3.0).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_boolean_default_left_accepted() {
        let mut doc = booster_json(&[(0, 1.0, -1.0, 1.0, false)], "5E-1");
        doc["learner"]["gradient_booster"]["model"]["trees"][0]["default_left"] =
            json!([true, false, false]);
        let b = XgbBooster::from_json(doc.to_string().as_bytes()).unwrap();
        assert_relative_eq!(b.margin(&[None]).unwrap(), -1.0);
    }

    #[test]
    fn test_rejects_unsupported_objective() {
        let mut doc = booster_json(&[(0, 1.0, 0.0, 0.0, true)], "5E-1");
        doc["learner"]["objective"]["name"] = json!("multi:softprob");
        let err = XgbBooster::from_json(doc.to_string().as_bytes()).unwrap_err();
        assert!(err.contains("multi:softprob"));
    }

    #[test]
    fn test_rejects_bad_child_index() {
        let mut doc = booster_json(&[(0, 1.0, 0.0, 0.0, true)], "5E-1");
        doc["learner"]["gradient_booster"]["model"]["trees"][0]["right_children"] =
            json!([7, -1, -1]);
        assert!(XgbBooster::from_json(doc.to_string().as_bytes()).is_err());
    }

    #[test]
    fn test_feature_outside_input_is_error() {
        let b = booster(&[(5, 1.0, 0.0, 0.0, true)]);
        assert!(b.margin(&[Some(1.0)]).is_err());
    }

    #[rstest]
    #[case::ubjson(&b"{L\x00\x00\x00\x00\x00\x00\x00\x07learner{"[..], "UBJSON")]
    #[case::legacy_binary(&b"binf\x00\x00\x00?"[..], "binary")]
    fn test_rejects_non_json_payload(#[case] payload: &[u8], #[case] format: &str) {
        let err = XgbBooster::from_json(payload).unwrap_err();
        assert!(err.contains(format), "{err}");
        assert!(err.contains("only XGBoost JSON boosters"), "{err}");
    }

    #[test]
    fn test_truncated_json_is_not_called_binary() {
        let err = XgbBooster::from_json(b"  {\"learner\": ").unwrap_err();
        assert!(err.starts_with("invalid booster JSON"), "{err}");
    }

    #[test]
    fn test_reads_num_features() {
        let b = booster(&[(0, 1.0, 0.0, 0.0, true)]);
        assert_eq!(b.num_features(), Some(168));
        assert_eq!(b.tree_count(), 1);
    }
}
