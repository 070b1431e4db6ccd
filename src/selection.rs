//! Learner choices and the inputs an experiment declares.
//!
//! Every experiment declares its inputs as [`InputSpec`]s: sliders with a
//! range, counters, or a choice among fixed options. A value is checked
//! against its spec before it enters the [`UserSelection`]; rejected values
//! leave the selection untouched.
//!
//! Inputs are bound onto model constants. A slider can set a constant
//! directly or scaled (millimetres on screen, metres in the model) and each
//! choice option carries the constants it implies (picking glycerin sets the
//! fluid density and viscosity).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result type for selection checks.
pub type SelectionResult<T> = Result<T, SelectionError>;

/// Reasons a learner input is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    /// The experiment declares no input with this key
    #[error("Unknown input `{0}`")]
    UnknownInput(String),
    /// A slider or counter value outside its declared range
    #[error("Value {value} for `{key}` is outside [{min}, {max}]")]
    OutOfRange { key: &'static str, value: f64, min: f64, max: f64 },
    /// A choice that is not among the declared options
    #[error("Unknown option `{option}` for `{key}`")]
    UnknownOption { key: &'static str, option: String },
    /// A number given for a choice or the other way round
    #[error("Input `{key}` expects a {expected}")]
    KindMismatch { key: &'static str, expected: &'static str },
    /// Inputs cannot change once a measurement has been taken
    #[error("Input `{0}` is locked after measuring")]
    Locked(String),
}

/// Value supplied by the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Number(f64),
    Choice(String),
}

impl InputValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            InputValue::Number(x) => Some(*x),
            InputValue::Choice(_) => None,
        }
    }

    pub fn as_choice(&self) -> Option<&str> {
        match self {
            InputValue::Choice(id) => Some(id),
            InputValue::Number(_) => None,
        }
    }
}

/// The learner's current choices, keyed by input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSelection {
    values: BTreeMap<String, InputValue>,
}

impl UserSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&InputValue> {
        self.values.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(InputValue::as_number)
    }

    pub fn choice(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(InputValue::as_choice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Whether `key` holds the option `id`.
    pub fn is(&self, key: &str, id: &str) -> bool {
        self.choice(key) == Some(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InputValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn set(&mut self, key: &str, value: InputValue) {
        self.values.insert(key.to_string(), value);
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }
}

/// A constant value implied by a choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Number(f64),
    Text(&'static str),
}

impl Constant {
    fn to_json(self) -> Value {
        match self {
            Constant::Number(x) => Value::from(x),
            Constant::Text(s) => Value::from(s),
        }
    }
}

/// One option of a choice input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChoiceOption {
    pub id: &'static str,
    pub label: &'static str,
    /// Model constants set when this option is picked
    pub constants: &'static [(&'static str, Constant)],
}

/// Shape of an input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputKind {
    /// Continuous slider
    Range { min: f64, max: f64 },
    /// Whole number from 0 to `max`
    Counter { max: u32 },
    /// One of a fixed set of options
    Choice { options: &'static [ChoiceOption] },
}

/// How a numeric input reaches the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Binding {
    /// Only guards and scoring look at it
    Unbound,
    /// Sets the named constant to the value
    Constant(&'static str),
    /// Sets the named constant to `value * factor`
    Scaled { constant: &'static str, factor: f64 },
}

/// Declaration of one input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: InputKind,
    pub binding: Binding,
}

impl InputSpec {
    /// Checks a value against this declaration.
    pub fn validate(&self, value: &InputValue) -> SelectionResult<()> {
        match (self.kind, value) {
            (InputKind::Range { min, max }, InputValue::Number(x)) => {
                if x.is_finite() && (min..=max).contains(x) {
                    Ok(())
                } else {
                    Err(SelectionError::OutOfRange { key: self.key, value: *x, min, max })
                }
            }
            (InputKind::Counter { max }, InputValue::Number(x)) => {
                let max = max as f64;
                if x.is_finite() && x.fract() == 0.0 && (0.0..=max).contains(x) {
                    Ok(())
                } else {
                    Err(SelectionError::OutOfRange { key: self.key, value: *x, min: 0.0, max })
                }
            }
            (InputKind::Choice { options }, InputValue::Choice(id)) => {
                if options.iter().any(|o| o.id == id.as_str()) {
                    Ok(())
                } else {
                    Err(SelectionError::UnknownOption { key: self.key, option: id.clone() })
                }
            }
            (InputKind::Choice { .. }, InputValue::Number(_)) => {
                Err(SelectionError::KindMismatch { key: self.key, expected: "choice" })
            }
            (_, InputValue::Choice(_)) => {
                Err(SelectionError::KindMismatch { key: self.key, expected: "number" })
            }
        }
    }

    fn option(&self, id: &str) -> Option<&'static ChoiceOption> {
        match self.kind {
            InputKind::Choice { options } => options.iter().find(|o| o.id == id),
            _ => None,
        }
    }
}

/// Looks up the declaration of `key`.
pub fn find_input<'a>(inputs: &'a [InputSpec], key: &str) -> SelectionResult<&'a InputSpec> {
    inputs
        .iter()
        .find(|spec| spec.key == key)
        .ok_or_else(|| SelectionError::UnknownInput(key.to_string()))
}

/// Model constant overrides implied by the current selection.
///
/// Inputs are applied in declaration order, so a later input wins when two
/// set the same constant.
pub fn constant_overrides(inputs: &[InputSpec], selection: &UserSelection) -> Map<String, Value> {
    let mut overrides = Map::new();
    for spec in inputs {
        let Some(value) = selection.get(spec.key) else {
            continue;
        };
        match (value, spec.binding) {
            (InputValue::Number(x), Binding::Constant(name)) => {
                overrides.insert(name.to_string(), Value::from(*x));
            }
            (InputValue::Number(x), Binding::Scaled { constant, factor }) => {
                overrides.insert(constant.to_string(), Value::from(x * factor));
            }
            (InputValue::Choice(id), _) => {
                if let Some(option) = spec.option(id) {
                    for (name, constant) in option.constants {
                        overrides.insert(name.to_string(), constant.to_json());
                    }
                }
            }
            _ => {}
        }
    }
    overrides
}

#[cfg(test)]
mod tests {
    use super::*;

    static LIQUIDS: [ChoiceOption; 2] = [
        ChoiceOption {
            id: "water",
            label: "Water",
            constants: &[("fluid_density", Constant::Number(1000.0))],
        },
        ChoiceOption {
            id: "glycerin",
            label: "Glycerin",
            constants: &[
                ("fluid_density", Constant::Number(1260.0)),
                ("fluid_viscosity", Constant::Number(1.41)),
            ],
        },
    ];

    static INPUTS: [InputSpec; 3] = [
        InputSpec {
            key: "liquid",
            label: "Liquid",
            kind: InputKind::Choice { options: &LIQUIDS },
            binding: Binding::Unbound,
        },
        InputSpec {
            key: "radius",
            label: "Ball radius (mm)",
            kind: InputKind::Range { min: 1.0, max: 5.0 },
            binding: Binding::Scaled { constant: "ball_radius", factor: 0.001 },
        },
        InputSpec {
            key: "cubes",
            label: "Ice cubes",
            kind: InputKind::Counter { max: 10 },
            binding: Binding::Unbound,
        },
    ];

    #[test]
    fn test_range_validation() {
        let radius = find_input(&INPUTS, "radius").unwrap();
        assert!(radius.validate(&InputValue::Number(2.0)).is_ok());
        assert!(matches!(
            radius.validate(&InputValue::Number(7.0)),
            Err(SelectionError::OutOfRange { key: "radius", .. })
        ));
        assert!(radius.validate(&InputValue::Number(f64::NAN)).is_err());
        assert!(matches!(
            radius.validate(&InputValue::Choice("big".into())),
            Err(SelectionError::KindMismatch { expected: "number", .. })
        ));
    }

    #[test]
    fn test_counter_accepts_whole_numbers() {
        let cubes = find_input(&INPUTS, "cubes").unwrap();
        assert!(cubes.validate(&InputValue::Number(3.0)).is_ok());
        assert!(cubes.validate(&InputValue::Number(2.5)).is_err());
        assert!(cubes.validate(&InputValue::Number(-1.0)).is_err());
        assert!(cubes.validate(&InputValue::Number(11.0)).is_err());
    }

    #[test]
    fn test_choice_validation() {
        let liquid = find_input(&INPUTS, "liquid").unwrap();
        assert!(liquid.validate(&InputValue::Choice("glycerin".into())).is_ok());
        assert!(matches!(
            liquid.validate(&InputValue::Choice("honey".into())),
            Err(SelectionError::UnknownOption { .. })
        ));
        assert!(liquid.validate(&InputValue::Number(1.0)).is_err());
    }

    #[test]
    fn test_unknown_input() {
        let err = find_input(&INPUTS, "colour").unwrap_err();
        assert_eq!(err, SelectionError::UnknownInput("colour".to_string()));
    }

    #[test]
    fn test_constant_overrides() {
        let mut selection = UserSelection::new();
        selection.set("liquid", InputValue::Choice("glycerin".into()));
        selection.set("radius", InputValue::Number(3.0));
        selection.set("cubes", InputValue::Number(2.0));

        let overrides = constant_overrides(&INPUTS, &selection);
        assert_eq!(overrides["fluid_density"], 1260.0);
        assert_eq!(overrides["fluid_viscosity"], 1.41);
        assert!((overrides["ball_radius"].as_f64().unwrap() - 0.003).abs() < 1e-15);
        assert_eq!(overrides.len(), 3);
    }

    #[test]
    fn test_input_value_serde_is_untagged() {
        let value: InputValue = serde_json::from_str("12.5").unwrap();
        assert_eq!(value, InputValue::Number(12.5));
        let value: InputValue = serde_json::from_str("\"litmus\"").unwrap();
        assert_eq!(value.as_choice(), Some("litmus"));
    }
}
