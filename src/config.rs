//! Scenario files.
//!
//! A scenario file is a JSON object of named sections. Each section lists
//! the parameters of a family of runs:
//!
//! ```json
//! {
//!   "simulation": {
//!     "seed": [1, 2, 3],
//!     "duration": 60,
//!     "range": 10,
//!     "datarate": 8000000,
//!     "queue": 2,
//!     "window_size": 16,
//!     "listening": 0.000010,
//!     "interarrival": [
//!       {"distribution": "exp", "mean": 0.01},
//!       {"distribution": "exp", "mean": 0.001}
//!     ],
//!     "size": {"distribution": "unif", "min": 32, "max": 1460, "int": 1},
//!     "processing": {"distribution": "const", "value": 0},
//!     "maxsize": 1460,
//!     "output": "out_{seed}_{run}.csv",
//!     "nodes": [[0, 0], [5, 0], [0, 5]]
//!   }
//! }
//! ```
//!
//! Any parameter other than `nodes` given as an array is swept. The runs
//! of a section are the cartesian product of the swept values, taken in
//! key order with the last key varying fastest. The example above yields
//! six runs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SimError, SimResult};
use crate::node::{MacConfig, Position};
use crate::time::VirtualTime;

/// Key whose array value is a list of coordinates, never a sweep.
const NODES_KEY: &str = "nodes";

/// Fully resolved parameters of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Index of this run within its section.
    #[serde(default)]
    pub index: usize,
    pub seed: u64,
    /// Simulated seconds.
    pub duration: f64,
    /// Radio range in metres.
    pub range: f64,
    /// Trace file name with placeholders already substituted.
    #[serde(default)]
    pub output: Option<String>,
    pub nodes: Vec<Position>,
    #[serde(flatten)]
    pub mac: MacConfig,
}

impl RunConfig {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(SimError::Config(format!(
                "duration must be positive, got {}",
                self.duration
            )));
        }
        if !(self.range.is_finite() && self.range >= 0.0) {
            return Err(SimError::Config(format!(
                "range must be non-negative, got {}",
                self.range
            )));
        }
        if self.nodes.is_empty() {
            return Err(SimError::Config("scenario has no nodes".into()));
        }
        self.mac.validate()
    }

    pub fn duration_time(&self) -> VirtualTime {
        VirtualTime::from_secs_f64(self.duration)
    }
}

/// One section of a scenario file, ready to be expanded into runs.
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    /// Parameters shared by every run.
    fixed: Map<String, Value>,
    /// Swept parameters, in key order.
    sweeps: Vec<(String, Vec<Value>)>,
}

impl Scenario {
    /// Read section `section` of the scenario file at `path`.
    pub fn load(path: &Path, section: &str) -> SimResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text, section)
    }

    pub fn from_json(text: &str, section: &str) -> SimResult<Self> {
        let root: Value = serde_json::from_str(text)?;
        Self::from_value(root, section)
    }

    pub fn from_value(root: Value, section: &str) -> SimResult<Self> {
        let Value::Object(mut sections) = root else {
            return Err(SimError::Config(
                "scenario file must be a JSON object of sections".into(),
            ));
        };
        let params = match sections.remove(section) {
            Some(Value::Object(params)) => params,
            Some(_) => {
                return Err(SimError::Config(format!(
                    "section '{section}' is not an object"
                )))
            }
            None => {
                let known: Vec<_> = sections.keys().cloned().collect();
                return Err(SimError::Config(format!(
                    "no section '{section}' (available: {})",
                    known.join(", ")
                )));
            }
        };

        let mut fixed = Map::new();
        let mut sweeps = Vec::new();
        for (key, value) in params {
            match value {
                Value::Array(values) if key != NODES_KEY => {
                    if values.is_empty() {
                        return Err(SimError::Config(format!(
                            "parameter '{key}' sweeps over an empty list"
                        )));
                    }
                    sweeps.push((key, values));
                }
                other => {
                    fixed.insert(key, other);
                }
            }
        }
        sweeps.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Scenario {
            name: section.to_string(),
            fixed,
            sweeps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the swept parameters, in sweep order.
    pub fn sweep_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.sweeps.iter().map(|(k, _)| k.as_str())
    }

    /// Number of runs in this section.
    pub fn run_count(&self) -> usize {
        self.sweeps.iter().map(|(_, v)| v.len()).product()
    }

    /// Parameters of run `index`, validated.
    pub fn run(&self, index: usize) -> SimResult<RunConfig> {
        let count = self.run_count();
        if index >= count {
            return Err(SimError::Config(format!(
                "run {index} out of range: section '{}' has {count} runs",
                self.name
            )));
        }

        let mut params = self.fixed.clone();
        let mut rest = index;
        for (key, values) in self.sweeps.iter().rev() {
            params.insert(key.clone(), values[rest % values.len()].clone());
            rest /= values.len();
        }

        let output = match params.get("output") {
            Some(Value::String(template)) => Some(render_output(template, &params, index)),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(SimError::Config(format!(
                    "output must be a string, got {other}"
                )))
            }
        };
        params.remove("output");

        let mut config: RunConfig = serde_json::from_value(Value::Object(params))
            .map_err(|e| SimError::Config(format!("section '{}' run {index}: {e}", self.name)))?;
        config.index = index;
        config.output = output;
        config.validate()?;
        Ok(config)
    }

    /// Every run of the section, in index order.
    pub fn runs(&self) -> impl Iterator<Item = SimResult<RunConfig>> + '_ {
        (0..self.run_count()).map(|i| self.run(i))
    }
}

/// Substitute `{run}` and `{key}` for every scalar parameter.
fn render_output(template: &str, params: &Map<String, Value>, index: usize) -> String {
    let mut out = template.replace("{run}", &index.to_string());
    for (key, value) in params {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        out = out.replace(&format!("{{{key}}}"), &text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use std::io::Write;

    fn base() -> Value {
        serde_json::json!({
            "seed": 7,
            "duration": 10,
            "range": 10,
            "datarate": 1000000,
            "queue": 2,
            "window_size": 4,
            "listening": 0.001,
            "interarrival": {"distribution": "exp", "mean": 0.5},
            "size": {"distribution": "const", "value": 100},
            "processing": {"distribution": "const", "value": 0},
            "maxsize": 1500,
            "nodes": [[0, 0], [5, 0]]
        })
    }

    fn with(mut section: Value, key: &str, value: Value) -> Value {
        section[key] = value;
        section
    }

    fn scenario(section: Value) -> Scenario {
        Scenario::from_value(serde_json::json!({ "simulation": section }), "simulation").unwrap()
    }

    #[test]
    fn test_single_run() {
        let sc = scenario(base());
        assert_eq!(sc.run_count(), 1);
        let run = sc.run(0).unwrap();
        assert_eq!(run.seed, 7);
        assert_eq!(run.duration_time(), VirtualTime::from_secs_f64(10.0));
        assert_eq!(run.nodes, vec![Position::new(0.0, 0.0), Position::new(5.0, 0.0)]);
        assert_eq!(run.mac.window_size, 4);
        assert_eq!(run.mac.interarrival, Distribution::exponential(0.5));
        assert_eq!(run.output, None);
    }

    #[test]
    fn test_nodes_array_is_not_swept() {
        let sc = scenario(base());
        assert_eq!(sc.sweep_keys().count(), 0);
    }

    #[test]
    fn test_sweep_last_key_fastest() {
        let section = with(base(), "seed", serde_json::json!([1, 2]));
        let section = with(section, "window_size", serde_json::json!([4, 8, 16]));
        let sc = scenario(section);
        assert_eq!(sc.run_count(), 6);
        assert_eq!(sc.sweep_keys().collect::<Vec<_>>(), vec!["seed", "window_size"]);

        let runs: Vec<_> = sc
            .runs()
            .map(|r| {
                let r = r.unwrap();
                (r.seed, r.mac.window_size)
            })
            .collect();
        assert_eq!(
            runs,
            vec![(1, 4), (1, 8), (1, 16), (2, 4), (2, 8), (2, 16)]
        );
    }

    #[test]
    fn test_sweep_over_distributions() {
        let section = with(
            base(),
            "interarrival",
            serde_json::json!([
                {"distribution": "exp", "mean": 0.1},
                {"distribution": "exp", "lambda": 100}
            ]),
        );
        let sc = scenario(section);
        assert_eq!(sc.run_count(), 2);
        assert!((sc.run(1).unwrap().mac.interarrival.mean() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_output_template() {
        let section = with(base(), "seed", serde_json::json!([3, 4]));
        let section = with(section, "output", serde_json::json!("trace_s{seed}_w{window_size}_{run}.csv"));
        let sc = scenario(section);
        assert_eq!(sc.run(0).unwrap().output.as_deref(), Some("trace_s3_w4_0.csv"));
        assert_eq!(sc.run(1).unwrap().output.as_deref(), Some("trace_s4_w4_1.csv"));
    }

    #[test]
    fn test_run_out_of_range() {
        let sc = scenario(base());
        assert!(matches!(sc.run(1), Err(SimError::Config(_))));
    }

    #[test]
    fn test_unknown_section() {
        let err = Scenario::from_value(serde_json::json!({ "a": base() }), "b").unwrap_err();
        assert!(err.to_string().contains("no section 'b'"));
        assert!(!err.is_internal());
    }

    #[test]
    fn test_missing_parameter() {
        let mut section = base();
        section.as_object_mut().unwrap().remove("datarate");
        let sc = scenario(section);
        assert!(matches!(sc.run(0), Err(SimError::Config(_))));
    }

    #[test]
    fn test_invalid_parameter() {
        let sc = scenario(with(base(), "queue", serde_json::json!(0)));
        assert!(matches!(sc.run(0), Err(SimError::Config(_))));
        let sc = scenario(with(base(), "nodes", serde_json::json!([])));
        assert!(matches!(sc.run(0), Err(SimError::Config(_))));
    }

    #[test]
    fn test_empty_sweep_rejected() {
        let result = Scenario::from_value(
            serde_json::json!({ "simulation": with(base(), "seed", serde_json::json!([])) }),
            "simulation",
        );
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let doc = serde_json::json!({ "simulation": base(), "other": base() });
        write!(file, "{doc}").unwrap();

        let sc = Scenario::load(file.path(), "other").unwrap();
        assert_eq!(sc.name(), "other");
        assert_eq!(sc.run(0).unwrap().seed, 7);
    }

    #[test]
    fn test_load_errors() {
        let missing = Scenario::load(Path::new("/nonexistent/scenario.json"), "simulation");
        assert!(matches!(missing, Err(SimError::Io(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            Scenario::load(file.path(), "simulation"),
            Err(SimError::Json(_))
        ));
    }
}
